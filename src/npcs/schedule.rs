//! Systems that drive every NPC's `ScheduleController`.
//!
//! Only the host advances schedules. Clients receive `NpcReplicationEvent`s
//! and mirror them.

use std::collections::HashMap;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;

use crate::shared::*;
use crate::world::WorldGraph;

use super::behaviors::BehaviorCatalog;
use super::context::{DayContext, ScheduleEnv};
use super::controller::{ScheduleController, ScheduleNotice};
use super::definitions::{NpcScheduleDef, NpcScheduleRegistry};

/// Everything a controller reads to make decisions.
#[derive(SystemParam)]
pub struct ScheduleServices<'w> {
    calendar: Res<'w, Calendar>,
    farmers: Res<'w, Farmers>,
    flags: Res<'w, WorldFlags>,
    festival: Res<'w, FestivalState>,
    registry: Res<'w, NpcScheduleRegistry>,
    catalog: Res<'w, BehaviorCatalog>,
    config: Res<'w, ScheduleConfig>,
    graph: Res<'w, WorldGraph>,
}

impl<'w> ScheduleServices<'w> {
    pub fn day(&self) -> DayContext<'_> {
        DayContext::new(&self.calendar, &self.farmers, &self.flags, self.festival.active)
    }

    pub fn definition(&self, npc_id: &str) -> Option<&NpcScheduleDef> {
        self.registry.get(npc_id)
    }

    /// Registered NPC ids in a stable order.
    pub fn registry_ids(&self) -> Vec<NpcId> {
        self.registry.sorted_ids()
    }

    pub fn env<'a>(&'a self, def: &'a NpcScheduleDef, day: &'a DayContext<'a>) -> ScheduleEnv<'a> {
        ScheduleEnv {
            def,
            day,
            nav: &*self.graph,
            catalog: &self.catalog,
            config: &self.config,
        }
    }
}

// ─── Run Conditions ───────────────────────────────────────────────────────────

pub fn is_authoritative(role: Res<NetworkRole>) -> bool {
    *role == NetworkRole::Host
}

pub fn is_client(role: Res<NetworkRole>) -> bool {
    *role == NetworkRole::Client
}

// ─── Host systems ─────────────────────────────────────────────────────────────

/// New day: everyone goes home and loads today's schedule.
pub fn rebuild_schedules_on_day_start(
    mut day_starts: EventReader<DayStartEvent>,
    services: ScheduleServices,
    mut query: Query<(&Npc, &mut ScheduleController)>,
) {
    if day_starts.read().last().is_none() {
        return;
    }
    let day = services.day();
    let mut rebuilt = 0;
    for (npc, mut ctrl) in query.iter_mut() {
        let Some(def) = services.definition(&npc.id) else {
            continue;
        };
        ctrl.begin_day(&services.env(def, &day));
        rebuilt += 1;
    }
    info!(
        "[Schedule] Rebuilt {} schedules for Day {} {:?} ({})",
        rebuilt,
        day.calendar.day,
        day.calendar.season,
        day.day_of_week().short_name()
    );
}

pub fn handle_schedule_reloads(
    mut reloads: EventReader<ScheduleReloadEvent>,
    services: ScheduleServices,
    mut query: Query<(&Npc, &mut ScheduleController)>,
) {
    for event in reloads.read() {
        let Some(def) = services.definition(&event.npc_id) else {
            warn!("[Schedule] Reload for unknown NPC '{}'", event.npc_id);
            continue;
        };
        let day = services.day();
        for (npc, mut ctrl) in query.iter_mut() {
            if npc.id == event.npc_id {
                ctrl.try_load_schedule(event.key.as_deref(), &services.env(def, &day));
            }
        }
    }
}

pub fn handle_park_events(
    mut parks: EventReader<ParkNpcEvent>,
    mut query: Query<(&Npc, &mut ScheduleController)>,
) {
    for event in parks.read() {
        for (npc, mut ctrl) in query.iter_mut() {
            if npc.id != event.npc_id {
                continue;
            }
            if event.parked {
                ctrl.park();
            } else {
                ctrl.unpark();
            }
            debug!("[Schedule] {} parked: {}", npc.id, event.parked);
        }
    }
}

pub fn handle_nudges(
    mut nudges: EventReader<NudgeNpcEvent>,
    services: ScheduleServices,
    mut query: Query<(&Npc, &mut ScheduleController)>,
) {
    for event in nudges.read() {
        let Some(def) = services.definition(&event.npc_id) else {
            continue;
        };
        let day = services.day();
        for (npc, mut ctrl) in query.iter_mut() {
            if npc.id == event.npc_id {
                ctrl.nudge(event.tile, &services.env(def, &day));
            }
        }
    }
}

/// Advance every controller one tick and forward what happened.
pub fn tick_schedules(
    time: Res<Time>,
    services: ScheduleServices,
    mut query: Query<(&Npc, &mut ScheduleController)>,
    mut arrived_writer: EventWriter<NpcArrivedEvent>,
    mut speech_writer: EventWriter<NpcSpeechEvent>,
) {
    let dt_ms = time.delta().as_millis().min(u32::MAX as u128) as u32;
    let now = services.calendar.clock();
    let day = services.day();
    let mut notices = Vec::new();

    for (npc, mut ctrl) in query.iter_mut() {
        let Some(def) = services.definition(&npc.id) else {
            continue;
        };
        if ctrl.check_schedule(now, dt_ms, &services.env(def, &day), &mut notices).is_err() {
            warn!("[Schedule] {} stands still for the rest of the day", npc.id);
        }
        for notice in notices.drain(..) {
            match notice {
                ScheduleNotice::Arrived { map, tile } => {
                    arrived_writer.send(NpcArrivedEvent {
                        npc_id: npc.id.clone(),
                        map,
                        tile,
                    });
                }
                ScheduleNotice::Spoke(text) => {
                    speech_writer.send(NpcSpeechEvent {
                        npc_id: npc.id.clone(),
                        text,
                    });
                }
            }
        }
    }
}

/// Send a snapshot for every NPC whose visible state changed since the last send.
pub fn broadcast_npc_snapshots(
    query: Query<&ScheduleController>,
    mut last_sent: Local<HashMap<NpcId, NpcSnapshot>>,
    mut writer: EventWriter<NpcReplicationEvent>,
) {
    for ctrl in query.iter() {
        let snapshot = ctrl.snapshot();
        if last_sent.get(ctrl.npc_id()) == Some(&snapshot) {
            continue;
        }
        last_sent.insert(snapshot.npc_id.clone(), snapshot.clone());
        writer.send(NpcReplicationEvent { snapshot });
    }
}

// ─── Client systems ───────────────────────────────────────────────────────────

pub fn apply_replicated_snapshots(
    mut events: EventReader<NpcReplicationEvent>,
    mut query: Query<&mut ScheduleController>,
) {
    let mut latest: HashMap<&str, &NpcSnapshot> = HashMap::new();
    for event in events.read() {
        latest.insert(&event.snapshot.npc_id, &event.snapshot);
    }
    if latest.is_empty() {
        return;
    }
    for mut ctrl in query.iter_mut() {
        if let Some(snapshot) = latest.get(ctrl.npc_id()) {
            ctrl.apply_replicated(snapshot);
        }
    }
}
