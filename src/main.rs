use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use bevy::time::TimeUpdateStrategy;

use townfolk::shared::*;
use townfolk::{calendar, data, npcs, world};

/// Simulated time per frame. The loop runs as fast as it can, so one game
/// day (20 game-hours at 10 game-minutes per second) takes a few seconds.
const FRAME_STEP: Duration = Duration::from_millis(100);

fn main() -> AppExit {
    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::ZERO)))
        .add_plugins(LogPlugin::default())
        .add_plugins(StatesPlugin)
        .insert_resource(TimeUpdateStrategy::ManualDuration(FRAME_STEP))
        // Game state
        .init_state::<GameState>()
        // Shared resources
        .init_resource::<Calendar>()
        .init_resource::<Farmers>()
        .init_resource::<WorldFlags>()
        // Events
        .add_event::<DayEndEvent>()
        .add_event::<DayStartEvent>()
        .add_event::<NpcArrivedEvent>()
        .add_event::<NpcSpeechEvent>()
        .add_event::<ScheduleReloadEvent>()
        .add_event::<ParkNpcEvent>()
        .add_event::<NudgeNpcEvent>()
        .add_event::<NpcReplicationEvent>()
        // Domain plugins
        .add_plugins(calendar::CalendarPlugin)
        .add_plugins(world::WorldPlugin)
        .add_plugins(npcs::NpcPlugin)
        // Data loading
        .add_plugins(data::DataPlugin)
        .add_systems(Update, (report_npc_events, exit_after_one_day))
        .run()
}

fn report_npc_events(
    calendar: Res<Calendar>,
    mut arrivals: EventReader<NpcArrivedEvent>,
    mut speech: EventReader<NpcSpeechEvent>,
) {
    for event in arrivals.read() {
        info!("[Demo] {} {} arrived at {} {}", calendar.clock(), event.npc_id, event.map, event.tile);
    }
    for event in speech.read() {
        info!("[Demo] {} {}: \"{}\"", calendar.clock(), event.npc_id, event.text);
    }
}

fn exit_after_one_day(mut day_end: EventReader<DayEndEvent>, mut exit: EventWriter<AppExit>) {
    if day_end.read().last().is_some() {
        info!("[Demo] Day over, exiting");
        exit.send(AppExit::Success);
    }
}
