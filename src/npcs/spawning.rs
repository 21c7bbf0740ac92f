//! NPC spawning: one entity per registered NPC, each carrying its controller.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::shared::*;

use super::controller::ScheduleController;
use super::schedule::ScheduleServices;

/// Resource tracking which NPCs are currently spawned.
#[derive(Resource, Debug, Default)]
pub struct SpawnedNpcs {
    /// Maps NPC id to entity
    pub entities: HashMap<NpcId, Entity>,
}

/// System: on entering Playing, spawn every NPC the first time and start its day.
///
/// Coming back to Playing after a pause does not respawn anything; the
/// controllers re-check their current leg instead. A client only places its
/// NPCs at home and waits for the host's snapshots.
pub fn spawn_schedule_npcs(
    mut commands: Commands,
    services: ScheduleServices,
    role: Res<NetworkRole>,
    mut spawned: ResMut<SpawnedNpcs>,
    mut existing: Query<&mut ScheduleController>,
) {
    if !spawned.entities.is_empty() {
        if *role == NetworkRole::Client {
            return;
        }
        for mut ctrl in existing.iter_mut() {
            ctrl.mark_needs_revalidation();
        }
        return;
    }

    let day = services.day();
    for id in services.registry_ids() {
        let Some(def) = services.definition(&id) else {
            continue;
        };
        let ctrl = match *role {
            NetworkRole::Client => ScheduleController::mirroring(id.clone(), &def.home(&day)),
            NetworkRole::Host => {
                let mut ctrl = ScheduleController::new(id.clone());
                ctrl.begin_day(&services.env(def, &day));
                ctrl
            }
        };
        let placement = ctrl.placement();
        let entity = commands
            .spawn((
                Npc {
                    id: id.clone(),
                    name: def.name.clone(),
                },
                ctrl,
            ))
            .id();
        debug!("[Schedule] Spawned {} at {} {}", def.name, placement.map, placement.tile);
        spawned.entities.insert(id, entity);
    }
    info!("[Schedule] Spawned {} NPCs", spawned.entities.len());
}
