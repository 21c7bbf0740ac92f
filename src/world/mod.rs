//! World domain plugin for Townfolk.
//!
//! Responsible for:
//! - Map tile grids and the warps between maps
//! - The location graph NPCs route through
//! - Per-map tile path search

use bevy::prelude::*;

pub mod graph;
pub mod maps;
pub mod pathfinding;

pub use graph::WorldGraph;
use maps::all_maps;

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(WorldGraph::from_maps(all_maps()))
            .add_systems(Startup, report_world_loaded);
    }
}

fn report_world_loaded(graph: Res<WorldGraph>) {
    info!(
        "[World] {} maps loaded, {} location routes cached",
        graph.map_count(),
        graph.cached_route_count()
    );
}
