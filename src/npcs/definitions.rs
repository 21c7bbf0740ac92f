//! NPC schedule definitions: identity, homes, and raw schedule scripts.
//!
//! Populated by DataPlugin from `assets/data/schedules/*.json` during
//! `OnEnter(GameState::Loading)`.

use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::shared::*;

use super::context::DayContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HomeCondition {
    #[default]
    Always,
    MarriedToPlayer,
    Flag(String),
}

/// One possible home. The first candidate whose condition holds wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeCandidate {
    #[serde(default)]
    pub condition: HomeCondition,
    pub map: String,
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_facing_index")]
    pub facing: u8,
}

fn default_facing_index() -> u8 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcScheduleDef {
    pub id: NpcId,
    pub name: String,
    #[serde(default)]
    pub gender: Gender,
    pub homes: Vec<HomeCandidate>,
    /// Schedule key → raw script text.
    pub scripts: HashMap<String, String>,
}

impl NpcScheduleDef {
    /// Where the NPC wakes up (and where `bed` sends them when unmarried).
    pub fn home(&self, day: &DayContext) -> Placement {
        self.homes
            .iter()
            .find(|h| match &h.condition {
                HomeCondition::Always => true,
                HomeCondition::MarriedToPlayer => day.is_married_to_player(&self.id),
                HomeCondition::Flag(flag) => day.flags.has(flag),
            })
            .map(|h| {
                Placement::new(
                    h.map.clone(),
                    h.x,
                    h.y,
                    Facing::from_index(h.facing as i32).unwrap_or_default(),
                )
            })
            .unwrap_or_else(Placement::unset)
    }

    pub fn has_script(&self, key: &str) -> bool {
        self.scripts.contains_key(key)
    }

    pub fn script(&self, key: &str) -> Option<&str> {
        self.scripts.get(key).map(String::as_str)
    }
}

/// All NPC schedule definitions, keyed by NPC id.
#[derive(Resource, Debug, Clone, Default)]
pub struct NpcScheduleRegistry {
    pub npcs: HashMap<NpcId, NpcScheduleDef>,
}

impl NpcScheduleRegistry {
    pub fn get(&self, npc_id: &str) -> Option<&NpcScheduleDef> {
        self.npcs.get(npc_id)
    }

    pub fn insert(&mut self, def: NpcScheduleDef) {
        self.npcs.insert(def.id.clone(), def);
    }

    /// Ids in a stable order, for spawning.
    pub fn sorted_ids(&self) -> Vec<NpcId> {
        let mut ids: Vec<NpcId> = self.npcs.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lily() -> NpcScheduleDef {
        NpcScheduleDef {
            id: "lily".into(),
            name: "Lily".into(),
            gender: Gender::Female,
            homes: vec![
                HomeCandidate {
                    condition: HomeCondition::MarriedToPlayer,
                    map: "FarmHouse".into(),
                    x: 8,
                    y: 4,
                    facing: 3,
                },
                HomeCandidate {
                    condition: HomeCondition::Always,
                    map: "Town".into(),
                    x: 12,
                    y: 20,
                    facing: 2,
                },
            ],
            scripts: HashMap::new(),
        }
    }

    #[test]
    fn test_home_picks_first_matching_candidate() {
        let calendar = Calendar::default();
        let mut farmers = Farmers::default();
        let flags = WorldFlags::default();
        let def = lily();

        let day = DayContext::new(&calendar, &farmers, &flags, None);
        assert_eq!(def.home(&day), Placement::new("Town", 12, 20, Facing::Down));

        farmers.players[0].relationships.spouse = Some("lily".into());
        let day = DayContext::new(&calendar, &farmers, &flags, None);
        assert_eq!(def.home(&day), Placement::new("FarmHouse", 8, 4, Facing::Left));
    }

    #[test]
    fn test_no_home_is_unset() {
        let calendar = Calendar::default();
        let farmers = Farmers::default();
        let flags = WorldFlags::default();
        let day = DayContext::new(&calendar, &farmers, &flags, None);
        let mut def = lily();
        def.homes.clear();
        assert!(def.home(&day).tile.is_unset());
    }
}
