//! Calendar domain: the clock schedules run against.
//!
//! Responsible for:
//! - Advancing game time (minutes, hours, days, seasons, years)
//! - Ending the day at 2:00 AM (`2600`) with `DayEndEvent`
//! - Rolling over the date, rolling weather and sending `DayStartEvent`
//! - Detecting festival days into `FestivalState`
//! - Pausing / unpausing time based on `GameState`

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::shared::*;

pub struct CalendarPlugin;

impl Plugin for CalendarPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FestivalState>()
            // Settled before anyone picks a schedule for the first day
            .add_systems(OnEnter(GameState::Loading), detect_festival_day)
            .add_systems(OnEnter(GameState::Playing), resume_time)
            .add_systems(OnExit(GameState::Playing), pause_time)
            .add_systems(
                Update,
                tick_time
                    .run_if(in_state(GameState::Playing))
                    .run_if(time_not_paused),
            )
            .add_systems(
                Update,
                process_day_end
                    .after(tick_time)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

// ─── Run Conditions ───────────────────────────────────────────────────────────

fn time_not_paused(calendar: Res<Calendar>) -> bool {
    !calendar.time_paused
}

// ─── State transition hooks ───────────────────────────────────────────────────

fn resume_time(mut calendar: ResMut<Calendar>) {
    calendar.time_paused = false;
    info!(
        "[Calendar] Time resumed at {} Day {} {:?} Year {}",
        calendar.clock(),
        calendar.day,
        calendar.season,
        calendar.year
    );
}

fn pause_time(mut calendar: ResMut<Calendar>) {
    calendar.time_paused = true;
    info!("[Calendar] Time paused at {}", calendar.clock());
}

// ─── Main time-tick system ────────────────────────────────────────────────────

/// Accumulates real delta-seconds and converts them to in-game minutes.
///
/// `time_scale` is game-minutes per real second. The day runs from 6:00 AM
/// to 26:00 (2:00 AM next day). Once the clock hits 26:00 it stops there
/// and `DayEndEvent` goes out; `process_day_end` does the rollover.
fn tick_time(
    time: Res<Time>,
    mut calendar: ResMut<Calendar>,
    mut day_end_writer: EventWriter<DayEndEvent>,
) {
    if calendar.clock() >= ClockTime::DAY_END {
        return;
    }
    calendar.elapsed_real_seconds += time.delta_secs();

    let secs_per_game_minute = if calendar.time_scale > 0.0 {
        1.0 / calendar.time_scale
    } else {
        1.0 / 10.0
    };

    while calendar.elapsed_real_seconds >= secs_per_game_minute {
        calendar.elapsed_real_seconds -= secs_per_game_minute;
        if advance_one_minute(&mut calendar) {
            info!(
                "[Calendar] Day ended: Day {} {:?} Year {}",
                calendar.day, calendar.season, calendar.year
            );
            day_end_writer.send(DayEndEvent {
                day: calendar.day,
                season: calendar.season,
                year: calendar.year,
            });
            calendar.elapsed_real_seconds = 0.0;
            break;
        }
    }
}

/// Advances the calendar by exactly one game-minute. Returns true when the day just ran out.
fn advance_one_minute(calendar: &mut Calendar) -> bool {
    calendar.minute += 1;
    if calendar.minute >= 60 {
        calendar.minute = 0;
        calendar.hour += 1;
    }
    calendar.clock() >= ClockTime::DAY_END
}

/// Moves the calendar to 6:00 AM on the next day, handling season and year rollover.
fn advance_date(calendar: &mut Calendar) {
    calendar.day += 1;
    calendar.hour = 6;
    calendar.minute = 0;
    calendar.elapsed_real_seconds = 0.0;

    if calendar.day > DAYS_PER_SEASON {
        calendar.day = 1;
        let old_season = calendar.season;
        calendar.season = calendar.season.next();
        info!(
            "[Calendar] Season changed: {:?} -> {:?} (Year {})",
            old_season, calendar.season, calendar.year
        );
        if calendar.season == Season::Spring {
            calendar.year += 1;
            info!("[Calendar] New Year! Year {}", calendar.year);
        }
    }
}

// ─── Day-end relay ────────────────────────────────────────────────────────────

/// Reads `DayEndEvent` (from the 2:00 AM rollover or anyone else ending the
/// day early), advances the date, rolls weather and announces the new day.
fn process_day_end(
    mut day_end_reader: EventReader<DayEndEvent>,
    mut day_start_writer: EventWriter<DayStartEvent>,
    mut calendar: ResMut<Calendar>,
    mut festival: ResMut<FestivalState>,
) {
    // Several senders in one frame still end only one day.
    let Some(event) = day_end_reader.read().last() else {
        return;
    };
    if event.day != calendar.day || event.season != calendar.season || event.year != calendar.year {
        debug!("[Calendar] Stale DayEndEvent for Day {} ignored", event.day);
        return;
    }

    advance_date(&mut calendar);
    calendar.weather = roll_weather(calendar.season, calendar.total_days_elapsed());

    info!(
        "[Calendar] New day: Day {} {:?} Year {} ({}), weather {:?}",
        calendar.day,
        calendar.season,
        calendar.year,
        calendar.day_of_week().short_name(),
        calendar.weather
    );
    // Before DayStartEvent goes out, so the rebuild sees today's festival.
    refresh_festival(&calendar, &mut festival);
    day_start_writer.send(DayStartEvent {
        day: calendar.day,
        season: calendar.season,
        year: calendar.year,
    });
}

// ─── Festival detection ───────────────────────────────────────────────────────

fn detect_festival_day(calendar: Res<Calendar>, mut festival: ResMut<FestivalState>) {
    refresh_festival(&calendar, &mut festival);
}

fn refresh_festival(calendar: &Calendar, festival: &mut FestivalState) {
    let today = FestivalKind::for_date(calendar.season, calendar.day);
    if festival.active == today {
        return;
    }
    festival.active = today;
    match today {
        Some(kind) => info!(
            "[Calendar] Festival day! {} on Day {} {:?} Year {}",
            kind.id(),
            calendar.day,
            calendar.season,
            calendar.year
        ),
        None => debug!("[Calendar] Festival over"),
    }
}

// ─── Weather rolling ──────────────────────────────────────────────────────────

/// Rolls a weather result for the given season using weighted probabilities.
/// Seeded from the day number so a replayed day gets the same sky.
///
/// Spring:  60% Sunny, 30% Rainy, 10% Stormy
/// Summer:  70% Sunny, 20% Rainy, 10% Stormy
/// Fall:    50% Sunny, 35% Rainy, 15% Stormy
/// Winter:  40% Sunny, 10% Rainy, 10% Stormy, 40% Snowy
pub fn roll_weather(season: Season, days_elapsed: u32) -> Weather {
    let mut rng = StdRng::seed_from_u64(days_elapsed as u64 ^ 0x5EA5_0000);
    let roll: f32 = rng.gen();

    match season {
        Season::Spring => {
            if roll < 0.60 {
                Weather::Sunny
            } else if roll < 0.90 {
                Weather::Rainy
            } else {
                Weather::Stormy
            }
        }
        Season::Summer => {
            if roll < 0.70 {
                Weather::Sunny
            } else if roll < 0.90 {
                Weather::Rainy
            } else {
                Weather::Stormy
            }
        }
        Season::Fall => {
            if roll < 0.50 {
                Weather::Sunny
            } else if roll < 0.85 {
                Weather::Rainy
            } else {
                Weather::Stormy
            }
        }
        Season::Winter => {
            if roll < 0.40 {
                Weather::Sunny
            } else if roll < 0.50 {
                Weather::Rainy
            } else if roll < 0.60 {
                Weather::Stormy
            } else {
                Weather::Snowy
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
