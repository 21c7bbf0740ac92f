//! NPC domain plugin for Townfolk.
//!
//! Owns every townsperson's daily schedule: picking today's script, parsing
//! it, resolving routes across maps and running the behaviors at each stop.
//! Communicates exclusively through shared resources and events.

use bevy::prelude::*;

use crate::shared::*;

pub mod behaviors;
pub mod context;
pub mod controller;
pub mod definitions;
pub mod error;
pub mod resolver;
pub mod schedule;
pub mod script;
pub mod selection;
pub mod spawning;
pub mod syntax;

pub use behaviors::BehaviorCatalog;
pub use controller::ScheduleController;
pub use definitions::NpcScheduleRegistry;

use schedule::{
    apply_replicated_snapshots, broadcast_npc_snapshots, handle_nudges, handle_park_events,
    handle_schedule_reloads, is_authoritative, is_client, rebuild_schedules_on_day_start,
    tick_schedules,
};
use spawning::{spawn_schedule_npcs, SpawnedNpcs};

pub struct NpcPlugin;

impl Plugin for NpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SpawnedNpcs>()
            .init_resource::<NpcScheduleRegistry>()
            .init_resource::<BehaviorCatalog>()
            .init_resource::<ScheduleConfig>()
            .init_resource::<NetworkRole>();

        // Spawn on first entry, revalidate on every later one
        app.add_systems(OnEnter(GameState::Playing), spawn_schedule_npcs);

        // Host: the only side that makes schedule decisions
        app.add_systems(
            Update,
            (
                rebuild_schedules_on_day_start,
                handle_schedule_reloads,
                handle_park_events,
                handle_nudges,
                tick_schedules,
                broadcast_npc_snapshots,
            )
                .chain()
                .run_if(in_state(GameState::Playing))
                .run_if(is_authoritative),
        );

        // Client: mirror whatever the host sends, paused or not
        app.add_systems(Update, apply_replicated_snapshots.run_if(is_client));
    }
}
