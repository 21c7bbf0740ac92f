//! Read-only views the schedule code works against.
//!
//! Systems build a `DayContext` from the world's resources once per run and
//! hand the schedule layer plain borrows, so the interpreter, selection and
//! controller never touch the ECS directly.

use std::collections::HashMap;

use crate::shared::*;

use super::behaviors::BehaviorCatalog;
use super::definitions::NpcScheduleDef;

/// Locations that are only open under some world condition.
enum Gate {
    RequiresFlag(&'static str),
    ClosedByFlag(&'static str),
}

const LOCATION_GATES: &[(&str, Gate)] = &[
    ("CommunityCenter", Gate::RequiresFlag("cc_unlocked")),
    ("JojaMart", Gate::ClosedByFlag("joja_closed")),
    ("Railroad", Gate::RequiresFlag("railroad_open")),
];

/// Map name replacements in force today (festival dressings).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapSubstitutions {
    replacements: HashMap<String, String>,
}

impl MapSubstitutions {
    pub fn for_festival(festival: Option<FestivalKind>) -> Self {
        let replacements = festival
            .map(|f| {
                f.map_substitutions()
                    .iter()
                    .map(|(from, to)| (from.to_string(), to.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Self { replacements }
    }

    pub fn apply<'a>(&'a self, map: &'a str) -> &'a str {
        self.replacements.get(map).map(String::as_str).unwrap_or(map)
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

/// Everything about "today" a schedule may depend on.
pub struct DayContext<'a> {
    pub calendar: &'a Calendar,
    pub farmers: &'a Farmers,
    pub flags: &'a WorldFlags,
    pub festival: Option<FestivalKind>,
    pub substitutions: MapSubstitutions,
}

impl<'a> DayContext<'a> {
    pub fn new(
        calendar: &'a Calendar,
        farmers: &'a Farmers,
        flags: &'a WorldFlags,
        festival: Option<FestivalKind>,
    ) -> Self {
        Self {
            calendar,
            farmers,
            flags,
            festival,
            substitutions: MapSubstitutions::for_festival(festival),
        }
    }

    pub fn season_name(&self) -> &'static str {
        self.calendar.season.key_name()
    }

    pub fn day_of_week(&self) -> DayOfWeek {
        self.calendar.day_of_week()
    }

    pub fn days_played(&self) -> u32 {
        self.calendar.total_days_elapsed()
    }

    /// Any player has at least `points` friendship with the NPC.
    pub fn friendship_meets(&self, npc_id: &str, points: u32) -> bool {
        self.farmers.max_friendship(npc_id) >= points
    }

    pub fn max_hearts(&self, npc_id: &str) -> u8 {
        self.farmers.max_hearts(npc_id)
    }

    /// Mail reached some player, or the id was raised as a world flag.
    pub fn mail_seen(&self, mail_id: &str) -> bool {
        self.farmers.anyone_received_mail(mail_id) || self.flags.has(mail_id)
    }

    pub fn is_married_to_player(&self, npc_id: &str) -> bool {
        self.farmers.is_married_to_player(npc_id)
    }

    pub fn is_location_accessible(&self, map: &str) -> bool {
        LOCATION_GATES
            .iter()
            .filter(|(name, _)| *name == map)
            .all(|(_, gate)| match gate {
                Gate::RequiresFlag(flag) => self.flags.has(flag),
                Gate::ClosedByFlag(flag) => !self.flags.has(flag),
            })
    }
}

/// The per-NPC bundle handed to the interpreter and controller.
pub struct ScheduleEnv<'a> {
    pub def: &'a NpcScheduleDef,
    pub day: &'a DayContext<'a>,
    pub nav: &'a dyn Navigation,
    pub catalog: &'a BehaviorCatalog,
    pub config: &'a ScheduleConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gated_locations_follow_flags() {
        let calendar = Calendar::default();
        let farmers = Farmers::default();
        let mut flags = WorldFlags::default();
        {
            let day = DayContext::new(&calendar, &farmers, &flags, None);
            assert!(!day.is_location_accessible("CommunityCenter"));
            assert!(day.is_location_accessible("JojaMart"));
            assert!(day.is_location_accessible("Saloon"));
        }
        flags.set("cc_unlocked");
        flags.set("joja_closed");
        let day = DayContext::new(&calendar, &farmers, &flags, None);
        assert!(day.is_location_accessible("CommunityCenter"));
        assert!(!day.is_location_accessible("JojaMart"));
    }

    #[test]
    fn test_festival_substitutes_town() {
        let subs = MapSubstitutions::for_festival(Some(FestivalKind::EggFestival));
        assert_eq!(subs.apply("Town"), "Town-Festival");
        assert_eq!(subs.apply("Beach"), "Beach");
        assert!(MapSubstitutions::for_festival(None).is_empty());
    }

    #[test]
    fn test_mail_seen_checks_flags_too() {
        let calendar = Calendar::default();
        let farmers = Farmers::default();
        let mut flags = WorldFlags::default();
        flags.set("beachBridgeFixed");
        let day = DayContext::new(&calendar, &farmers, &flags, None);
        assert!(day.mail_seen("beachBridgeFixed"));
        assert!(!day.mail_seen("ccPantry"));
    }
}
