//! Data layer: populates the schedule registries at startup.
//!
//! This plugin runs in OnEnter(GameState::Loading), fills the schedule
//! registry, the animation table and the engine config from the embedded
//! assets, then transitions the game into GameState::Playing.
//!
//! No other domain needs to seed these resources. All domain plugins can
//! safely read them once GameState has advanced past Loading.

pub mod animations;
pub mod npcs;

use bevy::prelude::*;

use crate::npcs::{BehaviorCatalog, NpcScheduleRegistry};
use crate::shared::*;

pub struct DataPlugin;

impl Plugin for DataPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Loading), load_all_data);
    }
}

/// Single system that populates every registry and then transitions to Playing.
///
/// A broken animation table or config falls back to the built-in defaults; a
/// broken schedule file only loses that one NPC.
fn load_all_data(
    mut registry: ResMut<NpcScheduleRegistry>,
    mut catalog: ResMut<BehaviorCatalog>,
    mut config: ResMut<ScheduleConfig>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    info!("[Data] Populating registries");

    match animations::load_schedule_config() {
        Ok(loaded) => *config = loaded,
        Err(e) => error!("[Data] {}; using default schedule config", e),
    }

    match animations::load_behavior_catalog() {
        Ok(loaded) => *catalog = loaded,
        Err(e) => error!("[Data] {}; only built-in behaviors available", e),
    }
    info!("[Data]   Animations loaded: {}", catalog.animations.len());

    for problem in npcs::populate_schedules(&mut registry) {
        error!("[Data] {}", problem);
    }
    let scripts: usize = registry.npcs.values().map(|d| d.scripts.len()).sum();
    info!(
        "[Data]   NPCs loaded: {}, schedule scripts loaded: {}",
        registry.npcs.len(),
        scripts
    );

    info!("[Data] All registries populated. Transitioning to Playing.");
    next_state.set(GameState::Playing);
}
