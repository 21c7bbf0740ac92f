//! Schedule script interpreter.
//!
//! A script is a `/`-separated list of commands:
//!
//! ```text
//! [a]<time> (<map> <x> <y> [<facing>] | bed) [<behavior>] ["<message>"]
//! ```
//!
//! The first command may instead be a directive: `GOTO <key>`,
//! `NOT friendship <npc> <points> ...`, or `MAIL <id>`. Parsing never fails
//! outward: any problem is logged and the NPC gets an empty schedule.

use bevy::prelude::*;

use crate::shared::*;

use super::behaviors::EndOfRouteAction;
use super::context::ScheduleEnv;
use super::error::ScheduleError;
use super::resolver::RouteResolver;
use super::syntax::{self, Command, Coords, Location, StopCommand};

/// One scheduled stop.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationDescriptor {
    /// When the NPC leaves for this stop.
    pub departure: ClockTime,
    /// The script gave an arrival time; `departure` was worked back from it.
    pub arrival_tagged: bool,
    pub map: String,
    pub tile: TilePos,
    pub facing: Facing,
    pub behavior_name: Option<String>,
    pub behavior: Option<EndOfRouteAction>,
    pub message: Option<String>,
}

impl DestinationDescriptor {
    pub fn placement(&self) -> Placement {
        Placement {
            map: self.map.clone(),
            tile: self.tile,
            facing: self.facing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSchedule {
    /// The key whose commands were used, after following any GOTO.
    pub key: String,
    pub follow_schedule: bool,
    /// A time-0 command moves the NPC here at the start of the day.
    pub start: Option<Placement>,
    pub descriptors: Vec<DestinationDescriptor>,
}

impl ParsedSchedule {
    pub fn empty(key: &str) -> Self {
        Self {
            key: key.to_string(),
            follow_schedule: false,
            start: None,
            descriptors: Vec::new(),
        }
    }

    /// `GOTO no_schedule`: stay put all day.
    pub fn no_schedule(key: &str) -> Self {
        Self::empty(key)
    }
}

/// Where parsing goes next.
enum Step {
    Done(ParsedSchedule),
    Jump(String),
}

pub struct ScheduleInterpreter<'a> {
    env: &'a ScheduleEnv<'a>,
}

impl<'a> ScheduleInterpreter<'a> {
    pub fn new(env: &'a ScheduleEnv<'a>) -> Self {
        Self { env }
    }

    fn npc(&self) -> &str {
        &self.env.def.id
    }

    /// Parse the script stored under `key`.
    pub fn parse_key(&self, key: &str) -> ParsedSchedule {
        match self.env.def.script(key) {
            Some(raw) => self.parse(key, raw),
            None => {
                error!(
                    "[Schedule] {}",
                    ScheduleError::MissingKey {
                        npc: self.npc().to_string(),
                        key: key.to_string(),
                    }
                );
                ParsedSchedule::empty(key)
            }
        }
    }

    /// Parse `raw` as the script for `key`. Never fails; problems are logged.
    pub fn parse(&self, key: &str, raw: &str) -> ParsedSchedule {
        let (parsed, problem) = self.parse_reporting(key, raw);
        match problem {
            Some(err @ ScheduleError::GotoCycle { .. }) => warn!("[Schedule] {}", err),
            Some(err) => error!("[Schedule] {} (key '{}', script \"{}\")", err, key, raw),
            None => {}
        }
        parsed
    }

    /// The schedule `parse` returns, plus the one problem it logs, if any.
    pub fn parse_reporting(&self, key: &str, raw: &str) -> (ParsedSchedule, Option<ScheduleError>) {
        match self.try_parse(key, raw) {
            Ok(parsed) => (parsed, None),
            Err(err) => (ParsedSchedule::empty(key), Some(err)),
        }
    }

    pub fn try_parse(&self, key: &str, raw: &str) -> Result<ParsedSchedule, ScheduleError> {
        let mut visited: Vec<String> = Vec::new();
        let mut current_key = key.to_string();
        let mut current_raw = raw.to_string();

        loop {
            if visited.contains(&current_key) {
                visited.push(current_key);
                return Err(ScheduleError::GotoCycle {
                    npc: self.npc().to_string(),
                    chain: visited,
                });
            }
            visited.push(current_key.clone());

            match self.parse_once(&current_key, &current_raw)? {
                Step::Done(parsed) => return Ok(parsed),
                Step::Jump(next) => {
                    if next == "no_schedule" {
                        return Ok(ParsedSchedule::no_schedule(&current_key));
                    }
                    current_raw = self
                        .env
                        .def
                        .script(&next)
                        .ok_or_else(|| ScheduleError::MissingKey {
                            npc: self.npc().to_string(),
                            key: next.clone(),
                        })?
                        .to_string();
                    current_key = next;
                }
            }
        }
    }

    fn malformed(&self, key: &str, command: &str, reason: impl Into<String>) -> ScheduleError {
        ScheduleError::Malformed {
            npc: self.npc().to_string(),
            key: key.to_string(),
            command: command.to_string(),
            reason: reason.into(),
        }
    }

    fn goto_target(&self, target: &str) -> String {
        if target == "season" {
            self.env.day.season_name().to_string()
        } else {
            target.to_string()
        }
    }

    fn parse_once(&self, key: &str, raw: &str) -> Result<Step, ScheduleError> {
        let commands = syntax::parse_script(raw).map_err(|err| self.malformed(key, raw, err.to_string()))?;
        let Some(first) = commands.first() else {
            return Err(self.malformed(key, raw, "script has no commands"));
        };

        let start = match first {
            Command::Goto(target) => return Ok(Step::Jump(self.goto_target(target))),
            Command::NotFriendship(thresholds) => {
                let met = thresholds
                    .iter()
                    .any(|(npc, points)| self.env.day.friendship_meets(npc, *points));
                if met {
                    return Ok(Step::Jump(self.env.config.default_schedule_key.clone()));
                }
                1
            }
            // Unseen mail skips the command right after the directive too.
            Command::Mail(id) => {
                if self.env.day.mail_seen(id) {
                    1
                } else {
                    2
                }
            }
            Command::Stop(_) => 0,
        };

        if start > 0 {
            if let Some(Command::Goto(target)) = commands.get(start) {
                return Ok(Step::Jump(self.goto_target(target)));
            }
        }

        self.parse_commands(key, commands.get(start..).unwrap_or(&[]))
    }

    fn placement_from(&self, key: &str, command: &str, map: &str, coords: Coords) -> Result<Placement, ScheduleError> {
        let facing = match coords.facing {
            Some(index) => Facing::from_index(index)
                .ok_or_else(|| self.malformed(key, command, format!("bad facing {}", index)))?,
            None => Facing::Down,
        };
        Ok(Placement::new(map, coords.x, coords.y, facing))
    }

    fn parse_commands(&self, key: &str, commands: &[Command<'_>]) -> Result<Step, ScheduleError> {
        let env = self.env;
        let resolver = RouteResolver {
            nav: env.nav,
            substitutions: &env.day.substitutions,
            gender: env.def.gender,
            budget: env.config.path_iteration_budget,
            npc: &env.def.id,
            key,
        };

        let home = env.def.home(env.day);
        let mut cursor = home.clone();
        let mut start = None;
        let mut previous: Option<ClockTime> = None;
        let mut descriptors = Vec::new();

        for command in commands {
            let stop: &StopCommand<'_> = match command {
                Command::Stop(stop) => stop,
                directive => {
                    return Err(self.malformed(
                        key,
                        &format!("{:?}", directive),
                        "directives only lead a script",
                    ))
                }
            };
            let text = stop.text;
            let time = ClockTime::from_hhmm(stop.time)
                .ok_or_else(|| self.malformed(key, text, format!("bad time '{}'", stop.time)))?;

            let mut default_behavior = None;
            let mut placement = match &stop.location {
                Location::Bed if env.day.is_married_to_player(&env.def.id) => {
                    let spot = &env.config.married_waiting_spot;
                    Placement::new(
                        spot.map.clone(),
                        spot.x,
                        spot.y,
                        Facing::from_index(spot.facing as i32).unwrap_or_default(),
                    )
                }
                Location::Bed => {
                    default_behavior = Some("sleep".to_string());
                    home.clone()
                }
                Location::Map { coords: None, .. } => {
                    return Err(self.malformed(key, text, "missing coordinates"));
                }
                Location::Map {
                    name,
                    coords: Some(coords),
                } => self.placement_from(key, text, name, *coords)?,
            };

            if !env.day.is_location_accessible(&placement.map) {
                match env.def.script(&format!("{}_Replacement", placement.map)) {
                    Some(replacement) => {
                        let (map, coords) = syntax::parse_replacement(replacement)
                            .map_err(|err| self.malformed(key, replacement, err.to_string()))?;
                        placement = self.placement_from(key, replacement, map, coords)?;
                    }
                    None => {
                        debug!(
                            "[Schedule] {} can't reach {} today, falling back to '{}'",
                            env.def.id, placement.map, env.config.default_schedule_key
                        );
                        return Ok(Step::Jump(env.config.default_schedule_key.clone()));
                    }
                }
            }

            if placement.tile.is_unset() {
                return Err(self.malformed(key, text, "no home to go to bed in"));
            }
            if !env.nav.has_map(&placement.map) {
                return Err(self.malformed(key, text, format!("unknown map '{}'", placement.map)));
            }

            let behavior_name = stop.behavior.map(str::to_string).or(default_behavior);
            let message = stop.message.map(str::to_string);

            // Time 0 only says where the day starts.
            if stop.time == 0 {
                cursor = placement.clone();
                start = Some(placement);
                continue;
            }

            let behavior = match &behavior_name {
                Some(name) => match env.catalog.resolve(&env.def.id, name) {
                    Ok(action) => Some(action),
                    Err(err) => {
                        // The NPC just idles on arrival; the rest of the day still runs.
                        error!("[Schedule] {} (key '{}')", err, key);
                        None
                    }
                },
                None => message.clone().map(EndOfRouteAction::Message),
            };

            let departure = if stop.arrival_tagged {
                let tiles = resolver
                    .estimate_tiles(&cursor, &placement.map, placement.tile)
                    .unwrap_or(0);
                let departure = arrival_to_departure(time, tiles, env.config.seconds_per_tile, env.config.clock_step_minutes);
                previous.map_or(departure, |p| departure.max(p))
            } else {
                if let Some(p) = previous {
                    if time < p {
                        return Err(ScheduleError::TimeOutOfOrder {
                            npc: env.def.id.clone(),
                            key: key.to_string(),
                            time: time.hhmm(),
                            previous: p.hhmm(),
                        });
                    }
                }
                time
            };

            previous = Some(departure);
            cursor = placement.clone();
            descriptors.push(DestinationDescriptor {
                departure,
                arrival_tagged: stop.arrival_tagged,
                map: placement.map,
                tile: placement.tile,
                facing: placement.facing,
                behavior_name,
                behavior,
                message,
            });
        }

        Ok(Step::Done(ParsedSchedule {
            key: key.to_string(),
            follow_schedule: true,
            start,
            descriptors,
        }))
    }
}

/// Work back from an arrival time: subtract the walk, round down to the clock grid.
pub fn arrival_to_departure(arrival: ClockTime, tiles: usize, seconds_per_tile: f32, step_minutes: u16) -> ClockTime {
    let walk_minutes = (tiles as f32 * seconds_per_tile / 60.0).ceil().max(0.0) as u32;
    ClockTime::from_minutes(arrival.minutes_of_day().saturating_sub(walk_minutes)).floor_to(step_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npcs::behaviors::BehaviorCatalog;
    use crate::npcs::context::DayContext;
    use crate::npcs::definitions::{HomeCandidate, HomeCondition, NpcScheduleDef};
    use crate::world::maps::all_maps;
    use crate::world::WorldGraph;
    use std::collections::HashMap;

    struct Fixture {
        calendar: Calendar,
        farmers: Farmers,
        flags: WorldFlags,
        graph: WorldGraph,
        catalog: BehaviorCatalog,
        config: ScheduleConfig,
        def: NpcScheduleDef,
    }

    impl Fixture {
        fn new(scripts: &[(&str, &str)]) -> Self {
            Self {
                calendar: Calendar::default(),
                farmers: Farmers::default(),
                flags: WorldFlags::default(),
                graph: WorldGraph::from_maps(all_maps()),
                catalog: BehaviorCatalog::default(),
                config: ScheduleConfig::default(),
                def: NpcScheduleDef {
                    id: "lily".into(),
                    name: "Lily".into(),
                    gender: Gender::Female,
                    homes: vec![HomeCandidate {
                        condition: HomeCondition::Always,
                        map: "Town".into(),
                        x: 12,
                        y: 20,
                        facing: 2,
                    }],
                    scripts: scripts
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect::<HashMap<_, _>>(),
                },
            }
        }

        fn parse(&self, key: &str) -> ParsedSchedule {
            let day = DayContext::new(&self.calendar, &self.farmers, &self.flags, None);
            let env = ScheduleEnv {
                def: &self.def,
                day: &day,
                nav: &self.graph,
                catalog: &self.catalog,
                config: &self.config,
            };
            ScheduleInterpreter::new(&env).parse_key(key)
        }

        fn parse_reporting(&self, key: &str) -> (ParsedSchedule, Option<ScheduleError>) {
            let day = DayContext::new(&self.calendar, &self.farmers, &self.flags, None);
            let env = ScheduleEnv {
                def: &self.def,
                day: &day,
                nav: &self.graph,
                catalog: &self.catalog,
                config: &self.config,
            };
            let raw = self.def.script(key).unwrap();
            ScheduleInterpreter::new(&env).parse_reporting(key, raw)
        }

        fn try_parse(&self, key: &str) -> Result<ParsedSchedule, ScheduleError> {
            let day = DayContext::new(&self.calendar, &self.farmers, &self.flags, None);
            let env = ScheduleEnv {
                def: &self.def,
                day: &day,
                nav: &self.graph,
                catalog: &self.catalog,
                config: &self.config,
            };
            let raw = self.def.script(key).unwrap();
            ScheduleInterpreter::new(&env).try_parse(key, raw)
        }
    }

    fn times(parsed: &ParsedSchedule) -> Vec<u16> {
        parsed.descriptors.iter().map(|d| d.departure.hhmm()).collect()
    }

    #[test]
    fn test_basic_commands_and_default_facing() {
        let fx = Fixture::new(&[("spring", "900 Town 10 10/1300 Saloon 5 6 3 \"Howdy\"")]);
        let parsed = fx.parse("spring");
        assert!(parsed.follow_schedule);
        assert_eq!(times(&parsed), vec![900, 1300]);
        assert_eq!(parsed.descriptors[0].facing, Facing::Down);
        assert_eq!(parsed.descriptors[1].facing, Facing::Left);
        assert_eq!(parsed.descriptors[1].message.as_deref(), Some("Howdy"));
        assert_eq!(
            parsed.descriptors[1].behavior,
            Some(EndOfRouteAction::Message("Howdy".into()))
        );
    }

    #[test]
    fn test_goto_cycle_yields_empty_schedule_with_one_error() {
        let fx = Fixture::new(&[("a", "GOTO b"), ("b", "GOTO a")]);
        match fx.try_parse("a") {
            Err(ScheduleError::GotoCycle { chain, .. }) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {:?}", other),
        }
        let parsed = fx.parse("a");
        assert!(parsed.descriptors.is_empty());
        assert!(!parsed.follow_schedule);
    }

    #[test]
    fn test_longer_goto_cycle_reports_a_single_cycle() {
        let fx = Fixture::new(&[("Mon", "GOTO a"), ("a", "GOTO b"), ("b", "GOTO c"), ("c", "GOTO a")]);
        let (parsed, problem) = fx.parse_reporting("Mon");
        assert!(parsed.descriptors.is_empty());
        match problem {
            Some(ScheduleError::GotoCycle { chain, .. }) => {
                assert_eq!(chain, vec!["Mon", "a", "b", "c", "a"]);
            }
            other => panic!("expected one cycle problem, got {:?}", other),
        }
    }

    #[test]
    fn test_goto_season_uses_current_season() {
        let mut fx = Fixture::new(&[("Mon", "GOTO season"), ("summer", "800 Beach 10 5")]);
        fx.calendar.season = Season::Summer;
        let parsed = fx.parse("Mon");
        assert_eq!(parsed.key, "summer");
        assert_eq!(parsed.descriptors[0].map, "Beach");
    }

    #[test]
    fn test_goto_no_schedule_stops_following() {
        let fx = Fixture::new(&[("rain", "GOTO no_schedule")]);
        let parsed = fx.parse("rain");
        assert!(!parsed.follow_schedule);
        assert!(parsed.descriptors.is_empty());
    }

    #[test]
    fn test_unseen_mail_skips_next_command() {
        let fx = Fixture::new(&[("spring", "MAIL unseenId/0900 Town 10 10/1000 Town 20 20")]);
        let parsed = fx.parse("spring");
        assert_eq!(times(&parsed), vec![1000]);
        assert_eq!(parsed.descriptors[0].tile, TilePos::new(20, 20));
    }

    #[test]
    fn test_seen_mail_keeps_next_command() {
        let mut fx = Fixture::new(&[("spring", "MAIL seenId/0900 Town 10 10/1000 Town 20 20")]);
        fx.farmers.players[0].mail_received.insert("seenId".into());
        assert_eq!(times(&fx.parse("spring")), vec![900, 1000]);
    }

    #[test]
    fn test_second_position_goto_is_followed() {
        let mut fx = Fixture::new(&[
            ("Fri", "MAIL ccDone/GOTO party/900 Town 10 10"),
            ("party", "1800 Saloon 8 8"),
        ]);
        fx.flags.set("ccDone");
        let parsed = fx.parse("Fri");
        assert_eq!(parsed.key, "party");
        assert_eq!(times(&parsed), vec![1800]);
    }

    #[test]
    fn test_not_friendship_jumps_to_default_when_met() {
        let mut fx = Fixture::new(&[
            ("Sun", "NOT friendship old_tom 300/1100 Beach 10 5"),
            ("spring", "800 Town 5 15"),
        ]);
        assert_eq!(fx.parse("Sun").key, "Sun");
        fx.farmers.players[0].relationships.add_friendship("old_tom", 300);
        assert_eq!(fx.parse("Sun").key, "spring");
    }

    #[test]
    fn test_not_friendship_checks_every_pair() {
        let mut fx = Fixture::new(&[
            ("Sun", "NOT friendship old_tom 300 margaret 500/1100 Beach 10 5"),
            ("spring", "800 Town 5 15"),
        ]);
        fx.farmers.players[0].relationships.add_friendship("old_tom", 200);
        fx.farmers.players[0].relationships.add_friendship("margaret", 400);
        assert_eq!(fx.parse("Sun").key, "Sun");
        assert_eq!(times(&fx.parse("Sun")), vec![1100]);

        // Only the second pair meets its threshold.
        fx.farmers.players[0].relationships.add_friendship("margaret", 100);
        assert_eq!(fx.parse("Sun").key, "spring");
    }

    #[test]
    fn test_directive_after_the_start_is_malformed() {
        let fx = Fixture::new(&[("spring", "900 Town 10 10/MAIL late")]);
        assert!(matches!(fx.try_parse("spring"), Err(ScheduleError::Malformed { .. })));
    }

    #[test]
    fn test_time_zero_sets_start_without_enqueueing() {
        let fx = Fixture::new(&[("spring", "0 Saloon 5 6 1/900 Town 10 10")]);
        let parsed = fx.parse("spring");
        assert_eq!(parsed.start, Some(Placement::new("Saloon", 5, 6, Facing::Right)));
        assert_eq!(times(&parsed), vec![900]);
    }

    #[test]
    fn test_bed_goes_home_with_sleep() {
        let fx = Fixture::new(&[("spring", "2200 bed")]);
        let parsed = fx.parse("spring");
        let d = &parsed.descriptors[0];
        assert_eq!((d.map.as_str(), d.tile), ("Town", TilePos::new(12, 20)));
        assert!(matches!(d.behavior, Some(EndOfRouteAction::Sleep(_))));
    }

    #[test]
    fn test_bed_when_married_goes_to_waiting_spot() {
        let mut fx = Fixture::new(&[("spring", "2200 bed")]);
        fx.farmers.players[0].relationships.spouse = Some("lily".into());
        let parsed = fx.parse("spring");
        let spot = &fx.config.married_waiting_spot;
        assert_eq!(parsed.descriptors[0].map, spot.map);
        assert_eq!(parsed.descriptors[0].tile, TilePos::new(spot.x, spot.y));
    }

    #[test]
    fn test_inaccessible_location_uses_replacement() {
        let fx = Fixture::new(&[
            ("spring", "900 CommunityCenter 5 5"),
            ("CommunityCenter_Replacement", "Town 28 6 2"),
        ]);
        let parsed = fx.parse("spring");
        assert_eq!(parsed.descriptors[0].map, "Town");
        assert_eq!(parsed.descriptors[0].tile, TilePos::new(28, 6));
    }

    #[test]
    fn test_inaccessible_location_without_replacement_restarts_on_fallback() {
        let fx = Fixture::new(&[("Tue", "900 CommunityCenter 5 5"), ("spring", "800 Town 5 15")]);
        let parsed = fx.parse("Tue");
        assert_eq!(parsed.key, "spring");
        assert_eq!(times(&parsed), vec![800]);
    }

    #[test]
    fn test_arrival_to_departure_conversion() {
        let arrival = ClockTime::from_hhmm(1200).unwrap();
        // 10 tiles * 42s = 7 minutes, 1153 rounds down to 1150.
        assert_eq!(arrival_to_departure(arrival, 10, 42.0, 10).hhmm(), 1150);
        assert_eq!(arrival_to_departure(arrival, 0, 42.0, 10).hhmm(), 1200);
        assert!(arrival_to_departure(arrival, 500, 42.0, 10) <= arrival);
    }

    #[test]
    fn test_arrival_tagged_entry_departs_early_but_not_before_previous() {
        let fx = Fixture::new(&[("spring", "600 Town 12 19/a610 Saloon 8 8")]);
        let parsed = fx.parse("spring");
        let d = &parsed.descriptors[1];
        assert!(d.arrival_tagged);
        assert!(d.departure <= ClockTime::from_hhmm(610).unwrap());
        assert!(d.departure >= parsed.descriptors[0].departure);
    }

    #[test]
    fn test_malformed_commands_are_errors() {
        for script in ["900 Town", "9x0 Town 1 1", "900 Town 1 1 7", "1000 Town 1 1/900 Town 2 2", "900 Narnia 1 1"] {
            let fx = Fixture::new(&[("spring", script)]);
            assert!(fx.try_parse("spring").is_err(), "{} should fail", script);
            assert!(fx.parse("spring").descriptors.is_empty());
        }
    }

    #[test]
    fn test_unknown_behavior_keeps_the_entry() {
        let fx = Fixture::new(&[("spring", "900 Town 10 10 juggle")]);
        let parsed = fx.parse("spring");
        assert_eq!(parsed.descriptors.len(), 1);
        assert_eq!(parsed.descriptors[0].behavior_name.as_deref(), Some("juggle"));
        assert!(parsed.descriptors[0].behavior.is_none());
    }
}
