//! Picks which schedule script an NPC follows today.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::context::DayContext;
use super::definitions::NpcScheduleDef;

/// Stable across runs and platforms, unlike `DefaultHasher`.
pub fn stable_name_hash(name: &str) -> u64 {
    name.bytes()
        .fold(17u64, |h, b| h.wrapping_mul(31).wrapping_add(b as u64))
}

/// Seed for anything random about this NPC's day.
pub fn day_seed(npc_id: &str, days_played: u32) -> u64 {
    (days_played as u64)
        .wrapping_mul(7919)
        .wrapping_add(stable_name_hash(npc_id))
}

/// Every key worth trying today, most specific first.
pub fn schedule_key_candidates(npc_id: &str, day: &DayContext) -> Vec<String> {
    let season = day.season_name();
    let dom = day.calendar.day;
    let dow = day.day_of_week().short_name();
    let married = day.is_married_to_player(npc_id);
    let hearts = day.max_hearts(npc_id);

    let mut keys = Vec::new();

    if let Some(festival) = day.festival {
        if married {
            keys.push(format!("marriage_festival_{}", festival.id()));
        }
        keys.push(format!("festival_{}", festival.id()));
    }

    keys.push(format!("{}_{}", season, dom));
    if married {
        keys.push(format!("marriage_{}_{}", season, dom));
        keys.push(format!("marriage_{}", dow));
    }
    keys.push(dom.to_string());
    for h in (1..=hearts).rev() {
        keys.push(format!("{}_{}", dom, h));
    }
    for h in (1..=hearts).rev() {
        keys.push(format!("{}_{}_{}", season, dow, h));
    }
    keys.push(format!("{}_{}", season, dow));
    keys.push(dow.to_string());
    keys.push(season.to_string());

    if day.calendar.is_raining() {
        let mut rng = StdRng::seed_from_u64(day_seed(npc_id, day.days_played()));
        if rng.gen_bool(0.5) {
            keys.push("rain2".into());
        }
        keys.push("rain".into());
    }

    keys.push(format!("spring_{}", dow));
    keys.push("spring".into());
    keys
}

/// First candidate the NPC actually has a script for.
pub fn select_todays_schedule(def: &NpcScheduleDef, day: &DayContext) -> Option<String> {
    schedule_key_candidates(&def.id, day)
        .into_iter()
        .find(|key| def.has_script(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npcs::definitions::NpcScheduleDef;
    use crate::shared::*;
    use std::collections::HashMap;

    fn def_with(keys: &[&str]) -> NpcScheduleDef {
        NpcScheduleDef {
            id: "lily".into(),
            name: "Lily".into(),
            gender: Gender::Female,
            homes: Vec::new(),
            scripts: keys
                .iter()
                .map(|k| (k.to_string(), "900 Town 10 10".to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_candidates_follow_priority_order() {
        let mut calendar = Calendar::default();
        calendar.day = 3; // Wednesday
        let mut farmers = Farmers::default();
        farmers.players[0].relationships.add_friendship("lily", 250);
        let flags = WorldFlags::default();
        let day = DayContext::new(&calendar, &farmers, &flags, None);

        let keys = schedule_key_candidates("lily", &day);
        assert_eq!(
            keys,
            vec![
                "spring_3", "3", "3_2", "3_1", "spring_Wed_2", "spring_Wed_1", "spring_Wed", "Wed", "spring",
                "spring_Wed", "spring",
            ]
        );
    }

    #[test]
    fn test_festival_and_marriage_keys_come_first() {
        let mut calendar = Calendar::default();
        calendar.day = 13;
        let mut farmers = Farmers::default();
        farmers.players[0].relationships.spouse = Some("lily".into());
        let flags = WorldFlags::default();
        let day = DayContext::new(&calendar, &farmers, &flags, Some(FestivalKind::EggFestival));

        let keys = schedule_key_candidates("lily", &day);
        assert_eq!(keys[0], "marriage_festival_egg_festival");
        assert_eq!(keys[1], "festival_egg_festival");
        assert_eq!(keys[2], "spring_13");
        assert_eq!(keys[3], "marriage_spring_13");
        assert_eq!(keys[4], "marriage_Sat");
    }

    #[test]
    fn test_rain_keys_only_when_raining() {
        let mut calendar = Calendar::default();
        let farmers = Farmers::default();
        let flags = WorldFlags::default();
        {
            let day = DayContext::new(&calendar, &farmers, &flags, None);
            assert!(!schedule_key_candidates("lily", &day).contains(&"rain".to_string()));
        }
        calendar.weather = Weather::Rainy;
        let day = DayContext::new(&calendar, &farmers, &flags, None);
        let keys = schedule_key_candidates("lily", &day);
        let rain = keys.iter().position(|k| k == "rain").unwrap();
        let season = keys.iter().position(|k| k == "spring").unwrap();
        assert!(season < rain);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let mut calendar = Calendar::default();
        calendar.weather = Weather::Rainy;
        let farmers = Farmers::default();
        let flags = WorldFlags::default();
        let def = def_with(&["rain", "rain2"]);
        let first = {
            let day = DayContext::new(&calendar, &farmers, &flags, None);
            select_todays_schedule(&def, &day)
        };
        for _ in 0..5 {
            let day = DayContext::new(&calendar, &farmers, &flags, None);
            assert_eq!(select_todays_schedule(&def, &day), first);
        }
        assert!(first.is_some());
    }

    #[test]
    fn test_falls_back_to_spring_and_none() {
        let calendar = Calendar::default();
        let farmers = Farmers::default();
        let flags = WorldFlags::default();
        let day = DayContext::new(&calendar, &farmers, &flags, None);
        assert_eq!(select_todays_schedule(&def_with(&["spring"]), &day).as_deref(), Some("spring"));
        assert_eq!(select_todays_schedule(&def_with(&["summer"]), &day), None);
    }

    #[test]
    fn test_name_hash_is_stable() {
        assert_eq!(stable_name_hash("lily"), stable_name_hash("lily"));
        assert_ne!(stable_name_hash("lily"), stable_name_hash("lilz"));
    }
}
