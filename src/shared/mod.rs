//! Shared components, resources, events, and states for Townfolk.
//!
//! This is the type contract. Every domain plugin imports from here.
//! No domain imports from any other domain directly.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// GAME STATE: top-level state machine
// ═══════════════════════════════════════════════════════════════════════

/// Schedules only advance while `Playing`. Every other state is an external
/// pause (dialogue box open, cutscene running, pause menu).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, States, Default)]
pub enum GameState {
    #[default]
    Loading,
    Playing,
    Paused,
    Dialogue,
    Cutscene,
}

/// Which side of a multi-participant session this process is.
/// Only the host resolves routes and advances schedules.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkRole {
    #[default]
    Host,
    Client,
}

// ═══════════════════════════════════════════════════════════════════════
// CALENDAR
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub fn next(self) -> Self {
        match self {
            Season::Spring => Season::Summer,
            Season::Summer => Season::Fall,
            Season::Fall => Season::Winter,
            Season::Winter => Season::Spring,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Season::Spring => 0,
            Season::Summer => 1,
            Season::Fall => 2,
            Season::Winter => 3,
        }
    }

    /// Lower-case name as it appears in schedule keys (`spring_Mon`, `GOTO season`).
    pub fn key_name(self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
            Season::Winter => "winter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// Three-letter form used in schedule keys.
    pub fn short_name(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Mon",
            DayOfWeek::Tuesday => "Tue",
            DayOfWeek::Wednesday => "Wed",
            DayOfWeek::Thursday => "Thu",
            DayOfWeek::Friday => "Fri",
            DayOfWeek::Saturday => "Sat",
            DayOfWeek::Sunday => "Sun",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    Sunny,
    Rainy,
    Stormy,
    Snowy, // Winter only
}

#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub year: u32,
    pub season: Season,
    pub day: u8,           // 1-28
    pub hour: u8,          // 6-25 (25 = 1:00 AM next day)
    pub minute: u8,        // 0-59
    pub weather: Weather,
    pub time_scale: f32,   // game-minutes per real-second (default ~10)
    pub time_paused: bool,
    pub elapsed_real_seconds: f32, // accumulator for sub-minute ticks
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            year: 1,
            season: Season::Spring,
            day: 1,
            hour: 6,
            minute: 0,
            weather: Weather::Sunny,
            time_scale: 10.0,
            time_paused: false,
            elapsed_real_seconds: 0.0,
        }
    }
}

impl Calendar {
    pub fn day_of_week(&self) -> DayOfWeek {
        let total_days = (self.season.index() as u32 * 28) + (self.day as u32 - 1);
        match total_days % 7 {
            0 => DayOfWeek::Monday,
            1 => DayOfWeek::Tuesday,
            2 => DayOfWeek::Wednesday,
            3 => DayOfWeek::Thursday,
            4 => DayOfWeek::Friday,
            5 => DayOfWeek::Saturday,
            _ => DayOfWeek::Sunday,
        }
    }

    pub fn total_days_elapsed(&self) -> u32 {
        ((self.year - 1) * 112) + (self.season.index() as u32 * 28) + (self.day as u32 - 1)
    }

    /// Current time on the schedule clock.
    pub fn clock(&self) -> ClockTime {
        ClockTime::from_hm(self.hour, self.minute)
    }

    pub fn is_raining(&self) -> bool {
        matches!(self.weather, Weather::Rainy | Weather::Stormy)
    }
}

/// A time of day in the `HHMM` form schedule scripts use (`930` = 9:30 AM,
/// `2530` = 1:30 AM the following morning). Ordering follows the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct ClockTime(u16);

impl ClockTime {
    pub const DAY_START: ClockTime = ClockTime(600);
    pub const DAY_END: ClockTime = ClockTime(2600);

    /// Accepts `HHMM` values with a valid minute part, up to `2600`.
    pub fn from_hhmm(value: u16) -> Option<Self> {
        if value % 100 >= 60 || value > Self::DAY_END.0 {
            return None;
        }
        Some(Self(value))
    }

    pub fn from_hm(hour: u8, minute: u8) -> Self {
        Self(hour as u16 * 100 + minute.min(59) as u16)
    }

    pub fn from_minutes(minutes: u32) -> Self {
        let minutes = minutes.min(26 * 60);
        Self(((minutes / 60) * 100 + minutes % 60) as u16)
    }

    pub fn hhmm(self) -> u16 {
        self.0
    }

    pub fn minutes_of_day(self) -> u32 {
        (self.0 / 100) as u32 * 60 + (self.0 % 100) as u32
    }

    /// Round down to a multiple of `step` minutes.
    pub fn floor_to(self, step: u16) -> Self {
        let step = step.max(1) as u32;
        Self::from_minutes(self.minutes_of_day() / step * step)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 100, self.0 % 100)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// FESTIVALS
// ═══════════════════════════════════════════════════════════════════════

/// Identifies which festival is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FestivalKind {
    EggFestival,     // Spring 13
    Luau,            // Summer 11
    HarvestFestival, // Fall 16
    WinterStar,      // Winter 25
}

impl FestivalKind {
    pub fn for_date(season: Season, day: u8) -> Option<Self> {
        match (season, day) {
            (Season::Spring, 13) => Some(FestivalKind::EggFestival),
            (Season::Summer, 11) => Some(FestivalKind::Luau),
            (Season::Fall, 16) => Some(FestivalKind::HarvestFestival),
            (Season::Winter, 25) => Some(FestivalKind::WinterStar),
            _ => None,
        }
    }

    /// Id used in `festival_<id>` schedule keys.
    pub fn id(self) -> &'static str {
        match self {
            FestivalKind::EggFestival => "egg_festival",
            FestivalKind::Luau => "luau",
            FestivalKind::HarvestFestival => "harvest_festival",
            FestivalKind::WinterStar => "winter_star",
        }
    }

    /// Maps dressed up for the day: (normal map, festival variant).
    pub fn map_substitutions(self) -> &'static [(&'static str, &'static str)] {
        match self {
            FestivalKind::EggFestival | FestivalKind::HarvestFestival => {
                &[("Town", "Town-Festival")]
            }
            FestivalKind::Luau | FestivalKind::WinterStar => &[],
        }
    }
}

/// The festival running today, if any. Written by the calendar domain.
#[derive(Resource, Debug, Clone, Default)]
pub struct FestivalState {
    pub active: Option<FestivalKind>,
}

// ═══════════════════════════════════════════════════════════════════════
// TILES, FACING, PLACEMENT
// ═══════════════════════════════════════════════════════════════════════

/// Facing directions, numbered the way schedule scripts number them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Facing {
    Up,
    Right,
    #[default]
    Down,
    Left,
}

impl Facing {
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Facing::Up),
            1 => Some(Facing::Right),
            2 => Some(Facing::Down),
            3 => Some(Facing::Left),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Facing::Up => 0,
            Facing::Right => 1,
            Facing::Down => 2,
            Facing::Left => 3,
        }
    }

    /// Direction of a single step from `from` to `to`. Vertical wins ties.
    pub fn toward(from: TilePos, to: TilePos) -> Self {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx.abs() > dy.abs() {
            if dx > 0 { Facing::Right } else { Facing::Left }
        } else if dy < 0 {
            Facing::Up
        } else {
            Facing::Down
        }
    }
}

/// A tile coordinate on some map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    /// Sentinel for "never placed". A leg starting here means corrupted content.
    pub const UNSET: TilePos = TilePos { x: i32::MIN, y: i32::MIN };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_unset(self) -> bool {
        self == Self::UNSET
    }

    pub fn manhattan(self, other: TilePos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            write!(f, "(unset)")
        } else {
            write!(f, "({}, {})", self.x, self.y)
        }
    }
}

/// Where a character stands: map, tile and facing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub map: String,
    pub tile: TilePos,
    pub facing: Facing,
}

impl Placement {
    pub fn new(map: impl Into<String>, x: i32, y: i32, facing: Facing) -> Self {
        Self {
            map: map.into(),
            tile: TilePos::new(x, y),
            facing,
        }
    }

    pub fn unset() -> Self {
        Self {
            map: String::new(),
            tile: TilePos::UNSET,
            facing: Facing::Down,
        }
    }
}

/// A fixed tile pair linking two maps: standing on `tile` in the owning map
/// puts the walker on `target_tile` in `target_map`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warp {
    pub tile: TilePos,
    pub target_map: String,
    pub target_tile: TilePos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Undefined,
}

// ═══════════════════════════════════════════════════════════════════════
// NAVIGATION SERVICES: implemented by the world domain
// ═══════════════════════════════════════════════════════════════════════

/// Location graph oracle: which maps to walk through to get from one map to another.
pub trait LocationGraph {
    /// Ordered chain of map names from `start` to `end`, both included.
    fn route(&self, start: &str, end: &str, gender: Gender) -> Option<Vec<String>>;
}

/// Per-map tile path search.
pub trait PathSearch {
    /// Tiles to step on after `start`, ending with `goal`. Empty when already there.
    fn find_path(&self, start: TilePos, goal: TilePos, map: &str, budget: u32) -> Option<Vec<TilePos>>;
}

/// Warp lookup between adjacent maps.
pub trait WarpLookup {
    fn warp_between(&self, from_map: &str, to_map: &str) -> Option<Warp>;
}

/// Everything the schedule runtime needs to know about the world.
pub trait Navigation: LocationGraph + PathSearch + WarpLookup {
    fn has_map(&self, map: &str) -> bool;

    /// The tile could ever be stood on, ignoring anything in the way right now.
    fn is_walkable(&self, _map: &str, _tile: TilePos) -> bool {
        true
    }

    /// Something (a player, a cart, a closed gate) is standing on this tile right now.
    fn is_obstructed(&self, _map: &str, _tile: TilePos) -> bool {
        false
    }
}

// ═══════════════════════════════════════════════════════════════════════
// PLAYERS & RELATIONSHIPS
// ═══════════════════════════════════════════════════════════════════════

pub type NpcId = String;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relationships {
    /// NPC id → friendship points (0-1000, 100 per heart)
    pub friendship: HashMap<NpcId, u32>,
    pub spouse: Option<NpcId>,
}

impl Relationships {
    pub fn hearts(&self, npc_id: &str) -> u8 {
        let points = self.friendship.get(npc_id).copied().unwrap_or(0);
        (points / FRIENDSHIP_PER_HEART).min(MAX_HEARTS) as u8
    }

    pub fn add_friendship(&mut self, npc_id: &str, amount: i32) {
        let entry = self.friendship.entry(npc_id.to_string()).or_insert(0);
        *entry = (*entry as i32 + amount).clamp(0, MAX_FRIENDSHIP as i32) as u32;
    }
}

/// One participant in the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Farmer {
    pub name: String,
    pub relationships: Relationships,
    pub mail_received: HashSet<String>,
}

/// Every participant whose state can gate a schedule.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct Farmers {
    pub players: Vec<Farmer>,
}

impl Default for Farmers {
    fn default() -> Self {
        Self {
            players: vec![Farmer {
                name: "Player".into(),
                ..Default::default()
            }],
        }
    }
}

impl Farmers {
    /// Highest friendship points any player has with this NPC.
    pub fn max_friendship(&self, npc_id: &str) -> u32 {
        self.players
            .iter()
            .filter_map(|p| p.relationships.friendship.get(npc_id).copied())
            .max()
            .unwrap_or(0)
    }

    pub fn max_hearts(&self, npc_id: &str) -> u8 {
        self.players
            .iter()
            .map(|p| p.relationships.hearts(npc_id))
            .max()
            .unwrap_or(0)
    }

    pub fn anyone_received_mail(&self, mail_id: &str) -> bool {
        self.players.iter().any(|p| p.mail_received.contains(mail_id))
    }

    pub fn is_married_to_player(&self, npc_id: &str) -> bool {
        self.players
            .iter()
            .any(|p| p.relationships.spouse.as_deref() == Some(npc_id))
    }
}

/// Global world-state flags (unlocked venues, community milestones).
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldFlags {
    pub flags: HashSet<String>,
}

impl WorldFlags {
    pub fn has(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn set(&mut self, flag: impl Into<String>) {
        self.flags.insert(flag.into());
    }
}

// ═══════════════════════════════════════════════════════════════════════
// NPCs
// ═══════════════════════════════════════════════════════════════════════

#[derive(Component, Debug, Clone)]
pub struct Npc {
    pub id: NpcId,
    pub name: String,
}

/// What an NPC is doing, as far as renderers and remote peers care.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NpcActivity {
    #[default]
    Idle,
    Walking,
    Behavior(String),
    ReturningToEndpoint,
}

/// Read-only copy of an NPC's position/facing/animation triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcSnapshot {
    pub npc_id: NpcId,
    pub map: String,
    pub tile: TilePos,
    pub facing: Facing,
    pub frame: Option<u32>,
    pub offset: (i32, i32),
    pub activity: NpcActivity,
    /// Fraction of the way to the next tile while walking.
    pub step_progress: f32,
    pub route_steps_left: usize,
}

// ═══════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════

/// Spot married NPCs go to when their script says `bed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitingSpot {
    pub map: String,
    pub x: i32,
    pub y: i32,
    pub facing: u8,
}

/// Tunable schedule constants. Loaded from `assets/config/schedule.ron`.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// In-game seconds one tile of walking takes; used to turn arrival times into departures.
    pub seconds_per_tile: f32,
    /// Real-time walking speed.
    pub walk_tiles_per_second: f32,
    pub animation_frame_ms: u32,
    pub path_iteration_budget: u32,
    /// Random pause at each patrol corner, added to the behavior's own offset.
    pub patrol_pause_ms: (u32, u32),
    pub married_waiting_spot: WaitingSpot,
    /// Canonical script used by `NOT friendship` and by inaccessible locations.
    pub default_schedule_key: String,
    /// Schedule clock granularity in minutes.
    pub clock_step_minutes: u16,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            seconds_per_tile: 42.0,
            walk_tiles_per_second: 2.0,
            animation_frame_ms: 100,
            path_iteration_budget: 30_000,
            patrol_pause_ms: (1_000, 3_000),
            married_waiting_spot: WaitingSpot {
                map: "BusStop".into(),
                x: 10,
                y: 3,
                facing: 2,
            },
            default_schedule_key: "spring".into(),
            clock_step_minutes: 10,
        }
    }
}

impl ScheduleConfig {
    pub fn from_ron_str(source: &str) -> Result<Self, String> {
        ron::from_str(source).map_err(|e| format!("Invalid schedule config: {}", e))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS: cross-domain communication
// ═══════════════════════════════════════════════════════════════════════

#[derive(Event, Debug, Clone)]
pub struct DayEndEvent {
    pub day: u8,
    pub season: Season,
    pub year: u32,
}

/// Sent once the calendar has rolled over; schedules are rebuilt on this.
#[derive(Event, Debug, Clone)]
pub struct DayStartEvent {
    pub day: u8,
    pub season: Season,
    pub year: u32,
}

/// An NPC finished a scheduled leg.
#[derive(Event, Debug, Clone)]
pub struct NpcArrivedEvent {
    pub npc_id: NpcId,
    pub map: String,
    pub tile: TilePos,
}

/// One-off spoken line for the dialogue/bubble layer.
#[derive(Event, Debug, Clone)]
pub struct NpcSpeechEvent {
    pub npc_id: NpcId,
    pub text: String,
}

/// Force a specific schedule key, or re-run today's selection when `key` is `None`.
#[derive(Event, Debug, Clone)]
pub struct ScheduleReloadEvent {
    pub npc_id: NpcId,
    pub key: Option<String>,
}

/// Park (or release) an NPC mid-route, e.g. while the player talks to them.
#[derive(Event, Debug, Clone)]
pub struct ParkNpcEvent {
    pub npc_id: NpcId,
    pub parked: bool,
}

/// Something shoved an NPC onto another tile.
#[derive(Event, Debug, Clone)]
pub struct NudgeNpcEvent {
    pub npc_id: NpcId,
    pub tile: TilePos,
}

/// Host → clients state replication.
#[derive(Event, Debug, Clone)]
pub struct NpcReplicationEvent {
    pub snapshot: NpcSnapshot,
}

// ═══════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════

pub const DAYS_PER_SEASON: u8 = 28;

pub const FRIENDSHIP_PER_HEART: u32 = 100;
pub const MAX_HEARTS: u32 = 10;
pub const MAX_FRIENDSHIP: u32 = MAX_HEARTS * FRIENDSHIP_PER_HEART;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_time_parsing_rejects_bad_minutes() {
        assert_eq!(ClockTime::from_hhmm(930).map(|t| t.hhmm()), Some(930));
        assert!(ClockTime::from_hhmm(975).is_none());
        assert!(ClockTime::from_hhmm(2700).is_none());
    }

    #[test]
    fn test_clock_time_minute_conversion() {
        let t = ClockTime::from_hhmm(1230).unwrap();
        assert_eq!(t.minutes_of_day(), 750);
        assert_eq!(ClockTime::from_minutes(750), t);
        assert_eq!(ClockTime::from_minutes(713).floor_to(10).hhmm(), 1150);
    }

    #[test]
    fn test_clock_ordering_follows_time() {
        assert!(ClockTime::from_hhmm(959).unwrap() < ClockTime::from_hhmm(1000).unwrap());
        assert!(ClockTime::from_hm(6, 0) == ClockTime::DAY_START);
    }

    #[test]
    fn test_facing_indices_round_trip_script_numbers() {
        for i in 0..4 {
            assert_eq!(Facing::from_index(i).unwrap().index() as i32, i);
        }
        assert!(Facing::from_index(4).is_none());
    }

    #[test]
    fn test_facing_toward_step() {
        let o = TilePos::new(5, 5);
        assert_eq!(Facing::toward(o, TilePos::new(6, 5)), Facing::Right);
        assert_eq!(Facing::toward(o, TilePos::new(4, 5)), Facing::Left);
        assert_eq!(Facing::toward(o, TilePos::new(5, 4)), Facing::Up);
        assert_eq!(Facing::toward(o, TilePos::new(5, 6)), Facing::Down);
    }

    #[test]
    fn test_farmers_any_player_counts() {
        let mut farmers = Farmers::default();
        farmers.players.push(Farmer {
            name: "Guest".into(),
            ..Default::default()
        });
        farmers.players[1].relationships.add_friendship("lily", 450);
        farmers.players[1].mail_received.insert("ccMovieTheater".into());

        assert_eq!(farmers.max_hearts("lily"), 4);
        assert_eq!(farmers.max_friendship("lily"), 450);
        assert!(farmers.anyone_received_mail("ccMovieTheater"));
        assert!(!farmers.anyone_received_mail("nothing"));
    }

    #[test]
    fn test_schedule_config_ron_overrides_defaults() {
        let cfg = ScheduleConfig::from_ron_str("(seconds_per_tile: 30.0)").unwrap();
        assert_eq!(cfg.seconds_per_tile, 30.0);
        assert_eq!(cfg.clock_step_minutes, 10);
        assert!(ScheduleConfig::from_ron_str("(seconds_per_tile: )").is_err());
    }
}
