//! Per-NPC schedule runtime.
//!
//! `ScheduleController` owns the NPC's position, facing and animation frame,
//! the day's queue of stops, and the state machine that walks through it:
//!
//! ```text
//! Idle -> Walking -> EndOfRouteBehavior -> Idle -> ...
//!                           |  ^
//!                   nudged  v  |  back on the spot
//!                   ReturningToEndpoint
//! ```
//!
//! Only one leg or one behavior is ever active; the enum makes that so.

use std::collections::VecDeque;

use bevy::prelude::*;

use crate::shared::*;

use super::behaviors::{ActiveBehavior, AnimationRun, EndOfRouteAction, PatrolRun, PatrolStep};
use super::context::ScheduleEnv;
use super::error::{ErrorTier, ScheduleError};
use super::resolver::{ResolvedRoute, RouteResolver, RouteStep};
use super::script::{DestinationDescriptor, ScheduleInterpreter};
use super::selection::{day_seed, select_todays_schedule};

/// Position, facing and animation frame. Only the controller writes these.
#[derive(Debug, Clone)]
struct NpcBody {
    map: String,
    tile: TilePos,
    facing: Facing,
    frame: Option<u32>,
    offset: (i32, i32),
}

impl NpcBody {
    fn unset() -> Self {
        Self {
            map: String::new(),
            tile: TilePos::UNSET,
            facing: Facing::Down,
            frame: None,
            offset: (0, 0),
        }
    }

    fn place(&mut self, placement: &Placement) {
        self.map = placement.map.clone();
        self.tile = placement.tile;
        self.facing = placement.facing;
        self.frame = None;
        self.offset = (0, 0);
    }

    fn placement(&self) -> Placement {
        Placement {
            map: self.map.clone(),
            tile: self.tile,
            facing: self.facing,
        }
    }

    /// Take one step. Warps keep the facing the walker had.
    fn step_to(&mut self, step: &RouteStep) {
        if step.map == self.map {
            self.facing = Facing::toward(self.tile, step.tile);
        }
        self.map = step.map.clone();
        self.tile = step.tile;
    }
}

#[derive(Debug, Clone)]
pub struct WalkingLeg {
    pub destination: DestinationDescriptor,
    pub route: ResolvedRoute,
    step_progress: f32,
}

#[derive(Debug, Clone)]
pub enum RuntimeState {
    Idle,
    Walking(WalkingLeg),
    EndOfRouteBehavior(ActiveBehavior),
    /// Pushed off the spot; walking back before picking the behavior up again.
    ReturningToEndpoint {
        path: VecDeque<TilePos>,
        step_progress: f32,
        resume: ActiveBehavior,
    },
}

impl RuntimeState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RuntimeState::Idle)
    }

    pub fn is_walking(&self) -> bool {
        matches!(self, RuntimeState::Walking(_))
    }
}

/// Something observers care about that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleNotice {
    Arrived { map: String, tile: TilePos },
    Spoke(String),
}

#[derive(Component, Debug, Clone)]
pub struct ScheduleController {
    npc_id: NpcId,
    body: NpcBody,
    state: RuntimeState,
    queue: VecDeque<DestinationDescriptor>,
    follow_schedule: bool,
    last_loaded_key: Option<String>,
    parked: bool,
    needs_revalidation: bool,
    /// The current route hold has already been reported at `warn!`.
    hold_logged: bool,
    /// Where the last leg ended; patrols and nudges come back here.
    endpoint: Option<Placement>,
    end_of_route_message: Option<String>,
    /// Client side: what the host says the NPC is doing.
    replicated_activity: Option<NpcActivity>,
}

impl ScheduleController {
    pub fn new(npc_id: impl Into<NpcId>) -> Self {
        Self {
            npc_id: npc_id.into(),
            body: NpcBody::unset(),
            state: RuntimeState::Idle,
            queue: VecDeque::new(),
            follow_schedule: false,
            last_loaded_key: None,
            parked: false,
            needs_revalidation: false,
            hold_logged: false,
            endpoint: None,
            end_of_route_message: None,
            replicated_activity: None,
        }
    }

    /// A controller that only shows what the host replicates. It never loads a schedule.
    pub fn mirroring(npc_id: impl Into<NpcId>, start: &Placement) -> Self {
        let mut ctrl = Self::new(npc_id);
        ctrl.body.place(start);
        ctrl
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn npc_id(&self) -> &str {
        &self.npc_id
    }

    pub fn placement(&self) -> Placement {
        self.body.placement()
    }

    pub fn map(&self) -> &str {
        &self.body.map
    }

    pub fn tile(&self) -> TilePos {
        self.body.tile
    }

    pub fn facing(&self) -> Facing {
        self.body.facing
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn queued(&self) -> impl Iterator<Item = &DestinationDescriptor> {
        self.queue.iter()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn follow_schedule(&self) -> bool {
        self.follow_schedule
    }

    pub fn last_loaded_key(&self) -> Option<&str> {
        self.last_loaded_key.as_deref()
    }

    pub fn is_parked(&self) -> bool {
        self.parked
    }

    /// Line the NPC says when talked to at the end of its last leg.
    pub fn end_of_route_message(&self) -> Option<&str> {
        self.end_of_route_message.as_deref()
    }

    pub fn is_returning_to_endpoint(&self) -> bool {
        matches!(self.state, RuntimeState::ReturningToEndpoint { .. })
    }

    pub fn current_route(&self) -> Option<&ResolvedRoute> {
        match &self.state {
            RuntimeState::Walking(leg) => Some(&leg.route),
            _ => None,
        }
    }

    // ─── Loading ────────────────────────────────────────────────────────────

    /// Start a fresh day: wake up at home and load today's schedule.
    pub fn begin_day(&mut self, env: &ScheduleEnv) {
        self.clear_schedule();
        self.parked = false;
        self.needs_revalidation = false;
        self.body.place(&env.def.home(env.day));
        self.try_load_schedule(None, env);
    }

    /// Load `key`, or today's pick when `None`. Whatever was in flight is dropped.
    ///
    /// Returns whether the NPC now follows a schedule.
    pub fn try_load_schedule(&mut self, key: Option<&str>, env: &ScheduleEnv) -> bool {
        self.clear_schedule();

        let key = match key {
            Some(k) => k.to_string(),
            None => match select_todays_schedule(env.def, env.day) {
                Some(k) => k,
                None => {
                    info!("[Schedule] {} has no schedule today", self.npc_id);
                    return false;
                }
            },
        };

        let parsed = ScheduleInterpreter::new(env).parse_key(&key);
        if let Some(start) = &parsed.start {
            self.body.place(start);
        }
        self.queue = parsed.descriptors.into();
        self.follow_schedule = parsed.follow_schedule;
        self.last_loaded_key = Some(parsed.key.clone());

        // Loaded mid-day: skip stops whose successor is already due.
        let now = env.day.calendar.clock();
        while self.queue.len() >= 2 && self.queue[1].departure <= now {
            self.queue.pop_front();
        }

        info!(
            "[Schedule] {} loaded '{}' ({} stops, following: {})",
            self.npc_id,
            parsed.key,
            self.queue.len(),
            self.follow_schedule
        );
        self.follow_schedule
    }

    /// Drop the queue and anything in flight. The NPC stays where it is, idle.
    pub fn clear_schedule(&mut self) {
        self.queue.clear();
        self.state = RuntimeState::Idle;
        self.follow_schedule = false;
        self.last_loaded_key = None;
        self.hold_logged = false;
        self.endpoint = None;
        self.end_of_route_message = None;
        self.body.frame = None;
        self.body.offset = (0, 0);
    }

    // ─── External control ───────────────────────────────────────────────────

    pub fn park(&mut self) {
        self.parked = true;
    }

    /// Resume after a park. The current leg is checked again on the next tick.
    pub fn unpark(&mut self) {
        if self.parked {
            self.parked = false;
            self.needs_revalidation = true;
        }
    }

    pub fn mark_needs_revalidation(&mut self) {
        self.needs_revalidation = true;
    }

    /// Something moved the NPC. Mid-leg it replans; mid-behavior it walks back first.
    pub fn nudge(&mut self, tile: TilePos, env: &ScheduleEnv) {
        if self.body.tile == tile {
            return;
        }
        self.body.tile = tile;
        match std::mem::replace(&mut self.state, RuntimeState::Idle) {
            RuntimeState::Walking(leg) => {
                self.state = RuntimeState::Walking(leg);
                self.needs_revalidation = true;
            }
            RuntimeState::EndOfRouteBehavior(behavior) => {
                self.state = self.return_to_endpoint(behavior, env);
            }
            RuntimeState::ReturningToEndpoint { resume, .. } => {
                self.state = self.return_to_endpoint(resume, env);
            }
            RuntimeState::Idle => {}
        }
    }

    fn return_to_endpoint(&self, resume: ActiveBehavior, env: &ScheduleEnv) -> RuntimeState {
        let home_tile = match &resume {
            ActiveBehavior::Patrol(run) => run.anchor,
            _ => self.endpoint.as_ref().map_or(self.body.tile, |e| e.tile),
        };
        match env
            .nav
            .find_path(self.body.tile, home_tile, &self.body.map, env.config.path_iteration_budget)
        {
            Some(path) if !path.is_empty() => RuntimeState::ReturningToEndpoint {
                path: path.into(),
                step_progress: 0.0,
                resume,
            },
            _ => {
                debug!("[Schedule] {} can't get back to {}, carrying on here", self.npc_id, home_tile);
                RuntimeState::EndOfRouteBehavior(resume)
            }
        }
    }

    /// Begin a square patrol right where the NPC stands.
    pub fn start_activity_walk_in_square(&mut self, width: u32, height: u32, pause_offset_ms: u32, env: &ScheduleEnv) {
        self.endpoint = Some(self.body.placement());
        let run = PatrolRun::new(
            self.body.tile,
            width,
            height,
            pause_offset_ms,
            env.config.patrol_pause_ms,
            day_seed(&self.npc_id, env.day.days_played()),
        );
        self.body.frame = None;
        self.body.offset = (0, 0);
        self.state = RuntimeState::EndOfRouteBehavior(ActiveBehavior::Patrol(run));
    }

    // ─── Tick ───────────────────────────────────────────────────────────────

    /// Advance one tick. `now` is the schedule clock, `dt_ms` the real time since the last tick.
    ///
    /// Content and transient problems are handled here. Only a fatal error is
    /// returned, after the NPC has been reset to idle with an empty queue.
    pub fn check_schedule(
        &mut self,
        now: ClockTime,
        dt_ms: u32,
        env: &ScheduleEnv,
        notices: &mut Vec<ScheduleNotice>,
    ) -> Result<(), ScheduleError> {
        if self.parked {
            return Ok(());
        }
        if self.needs_revalidation {
            self.needs_revalidation = false;
            self.revalidate(env);
        }

        let result = self.advance(now, dt_ms, env, notices);
        if let Err(err) = &result {
            error!("[Schedule] {}", err);
            self.queue.clear();
            self.state = RuntimeState::Idle;
        }
        result
    }

    fn departure_due(&self, now: ClockTime) -> bool {
        self.follow_schedule && self.queue.front().is_some_and(|d| now >= d.departure)
    }

    fn advance(
        &mut self,
        now: ClockTime,
        dt_ms: u32,
        env: &ScheduleEnv,
        notices: &mut Vec<ScheduleNotice>,
    ) -> Result<(), ScheduleError> {
        let speed = env.config.walk_tiles_per_second;
        let due = self.departure_due(now);

        match std::mem::replace(&mut self.state, RuntimeState::Idle) {
            RuntimeState::Idle => self.try_depart(now, env, notices),
            RuntimeState::Walking(mut leg) => {
                leg.step_progress += dt_ms as f32 / 1000.0 * speed;
                while leg.step_progress >= 1.0 {
                    let Some(step) = leg.route.steps.pop_front() else {
                        break;
                    };
                    leg.step_progress -= 1.0;
                    self.body.step_to(&step);
                }
                if leg.route.steps.is_empty() {
                    self.arrive(leg, env, notices);
                } else {
                    self.state = RuntimeState::Walking(leg);
                }
                Ok(())
            }
            RuntimeState::EndOfRouteBehavior(behavior) => {
                self.tick_behavior(behavior, due, dt_ms, env, notices);
                if self.state.is_idle() && due {
                    self.try_depart(now, env, notices)?;
                }
                Ok(())
            }
            RuntimeState::ReturningToEndpoint {
                mut path,
                mut step_progress,
                resume,
            } => {
                if due {
                    // The next leg wins; it starts from wherever the NPC got to.
                    return self.try_depart(now, env, notices);
                }
                step_progress += dt_ms as f32 / 1000.0 * speed;
                while step_progress >= 1.0 {
                    let Some(tile) = path.pop_front() else {
                        break;
                    };
                    step_progress -= 1.0;
                    self.body.facing = Facing::toward(self.body.tile, tile);
                    self.body.tile = tile;
                }
                if path.is_empty() {
                    let mut resume = resume;
                    if let ActiveBehavior::Patrol(run) = &mut resume {
                        run.replan();
                    }
                    if let Some(endpoint) = &self.endpoint {
                        if !matches!(resume, ActiveBehavior::Patrol(_)) {
                            self.body.facing = endpoint.facing;
                        }
                    }
                    self.state = RuntimeState::EndOfRouteBehavior(resume);
                } else {
                    self.state = RuntimeState::ReturningToEndpoint {
                        path,
                        step_progress,
                        resume,
                    };
                }
                Ok(())
            }
        }
    }

    fn tick_behavior(
        &mut self,
        behavior: ActiveBehavior,
        departure_due: bool,
        dt_ms: u32,
        env: &ScheduleEnv,
        notices: &mut Vec<ScheduleNotice>,
    ) {
        match behavior {
            ActiveBehavior::Animation { name, mut run } => {
                if departure_due {
                    run.wind_down();
                }
                if let Some(msg) = run.tick(dt_ms) {
                    notices.push(ScheduleNotice::Spoke(msg));
                }
                self.show_animation(&run);
                if !run.is_done() {
                    self.state = RuntimeState::EndOfRouteBehavior(ActiveBehavior::Animation { name, run });
                }
            }
            ActiveBehavior::Sleep(mut run) => {
                if departure_due {
                    run.wind_down();
                }
                run.tick(dt_ms);
                self.show_animation(&run);
                if !run.is_done() {
                    self.state = RuntimeState::EndOfRouteBehavior(ActiveBehavior::Sleep(run));
                }
            }
            // A patrol just stops where it is when the next leg is due.
            ActiveBehavior::Patrol(_) if departure_due => {}
            ActiveBehavior::Patrol(mut run) => {
                let step = run.tick(
                    self.body.tile,
                    dt_ms,
                    env.config.walk_tiles_per_second,
                    env.nav,
                    &self.body.map,
                    env.config.path_iteration_budget,
                );
                if let PatrolStep::Moved(tile) = step {
                    self.body.facing = Facing::toward(self.body.tile, tile);
                    self.body.tile = tile;
                }
                self.state = RuntimeState::EndOfRouteBehavior(ActiveBehavior::Patrol(run));
            }
        }
        if self.state.is_idle() {
            self.body.frame = None;
            self.body.offset = (0, 0);
        }
    }

    fn show_animation(&mut self, run: &AnimationRun) {
        self.body.frame = run.current_frame();
        self.body.offset = run.offset().unwrap_or((0, 0));
    }

    fn try_depart(
        &mut self,
        now: ClockTime,
        env: &ScheduleEnv,
        notices: &mut Vec<ScheduleNotice>,
    ) -> Result<(), ScheduleError> {
        if !self.departure_due(now) {
            return Ok(());
        }
        if env.nav.is_obstructed(&self.body.map, self.body.tile) {
            debug!("[Schedule] {} waiting, {} {} is obstructed", self.npc_id, self.body.map, self.body.tile);
            return Ok(());
        }
        let Some(destination) = self.queue.front().cloned() else {
            return Ok(());
        };

        let key = self.last_loaded_key.clone().unwrap_or_default();
        let resolver = RouteResolver {
            nav: env.nav,
            substitutions: &env.day.substitutions,
            gender: env.def.gender,
            budget: env.config.path_iteration_budget,
            npc: &self.npc_id,
            key: &key,
        };
        let resolved = resolver.resolve(
            &self.body.map,
            self.body.tile,
            &destination.map,
            destination.tile,
            destination.facing,
            destination.behavior.clone(),
            destination.message.clone(),
        );

        match resolved {
            Ok(route) => {
                self.queue.pop_front();
                self.hold_logged = false;
                self.end_of_route_message = None;
                self.body.frame = None;
                self.body.offset = (0, 0);
                let leg = WalkingLeg {
                    destination,
                    route,
                    step_progress: 0.0,
                };
                if leg.route.steps.is_empty() {
                    self.arrive(leg, env, notices);
                } else {
                    debug!(
                        "[Schedule] {} leaving {} for {} ({} steps)",
                        self.npc_id,
                        self.body.map,
                        leg.route.end_map,
                        leg.route.len()
                    );
                    self.state = RuntimeState::Walking(leg);
                }
                Ok(())
            }
            Err(err) => match err.tier() {
                ErrorTier::Fatal => Err(err),
                ErrorTier::Transient => {
                    if self.hold_logged {
                        debug!("[Schedule] still holding: {}", err);
                    } else {
                        warn!("[Schedule] holding, will retry: {}", err);
                        self.hold_logged = true;
                    }
                    Ok(())
                }
                ErrorTier::Content => {
                    error!("[Schedule] {}; schedule disabled for today", err);
                    self.queue.clear();
                    self.follow_schedule = false;
                    Ok(())
                }
            },
        }
    }

    fn arrive(&mut self, leg: WalkingLeg, env: &ScheduleEnv, notices: &mut Vec<ScheduleNotice>) {
        let route = leg.route;
        self.body.map = route.end_map.clone();
        self.body.tile = route.end_tile;
        self.body.facing = route.facing;
        self.body.frame = None;
        self.body.offset = (0, 0);
        self.endpoint = Some(self.body.placement());
        self.end_of_route_message = route.message.clone();

        notices.push(ScheduleNotice::Arrived {
            map: route.end_map.clone(),
            tile: route.end_tile,
        });
        debug!("[Schedule] {} arrived at {} {}", self.npc_id, route.end_map, route.end_tile);

        let spoken_separately = !matches!(route.behavior, Some(EndOfRouteAction::Message(_)));
        if spoken_separately {
            if let Some(msg) = &route.message {
                notices.push(ScheduleNotice::Spoke(msg.clone()));
            }
        }

        self.state = match route.behavior {
            None => RuntimeState::Idle,
            Some(EndOfRouteAction::Message(msg)) => {
                notices.push(ScheduleNotice::Spoke(msg));
                RuntimeState::Idle
            }
            Some(EndOfRouteAction::SquarePatrol {
                width,
                height,
                pause_offset_ms,
            }) => {
                let seed = day_seed(&self.npc_id, env.day.days_played()) ^ route.end_tile.x as u64;
                RuntimeState::EndOfRouteBehavior(ActiveBehavior::Patrol(PatrolRun::new(
                    route.end_tile,
                    width,
                    height,
                    pause_offset_ms,
                    env.config.patrol_pause_ms,
                    seed,
                )))
            }
            Some(EndOfRouteAction::Sleep(description)) => {
                let run = AnimationRun::new(description, env.config.animation_frame_ms);
                self.start_animation(&run, notices);
                RuntimeState::EndOfRouteBehavior(ActiveBehavior::Sleep(run))
            }
            Some(EndOfRouteAction::Animation { name, description }) => {
                let run = AnimationRun::new(description, env.config.animation_frame_ms);
                self.start_animation(&run, notices);
                RuntimeState::EndOfRouteBehavior(ActiveBehavior::Animation { name, run })
            }
        };
    }

    fn start_animation(&mut self, run: &AnimationRun, notices: &mut Vec<ScheduleNotice>) {
        if let Some(msg) = run.opening_message() {
            notices.push(ScheduleNotice::Spoke(msg.to_string()));
        }
        self.show_animation(run);
    }

    /// Re-check the current leg after a pause or a nudge.
    fn revalidate(&mut self, env: &ScheduleEnv) {
        let RuntimeState::Walking(leg) = std::mem::replace(&mut self.state, RuntimeState::Idle) else {
            return;
        };
        let key = self.last_loaded_key.clone().unwrap_or_default();
        let resolver = RouteResolver {
            nav: env.nav,
            substitutions: &env.day.substitutions,
            gender: env.def.gender,
            budget: env.config.path_iteration_budget,
            npc: &self.npc_id,
            key: &key,
        };
        match resolver.resolve_steps(&self.body.map, self.body.tile, &leg.destination.map, leg.destination.tile) {
            Ok(steps) => {
                let mut leg = leg;
                leg.route.steps = steps.into();
                leg.step_progress = 0.0;
                self.state = RuntimeState::Walking(leg);
            }
            Err(err) => {
                // Put the stop back; the normal departure path retries or disables it.
                debug!("[Schedule] {} leg no longer valid: {}", self.npc_id, err);
                self.queue.push_front(leg.destination);
            }
        }
    }

    // ─── Replication ────────────────────────────────────────────────────────

    pub fn activity(&self) -> NpcActivity {
        if let Some(activity) = &self.replicated_activity {
            return activity.clone();
        }
        match &self.state {
            RuntimeState::Idle => NpcActivity::Idle,
            RuntimeState::Walking(_) => NpcActivity::Walking,
            RuntimeState::EndOfRouteBehavior(b) => NpcActivity::Behavior(b.name()),
            RuntimeState::ReturningToEndpoint { .. } => NpcActivity::ReturningToEndpoint,
        }
    }

    pub fn snapshot(&self) -> NpcSnapshot {
        let (step_progress, route_steps_left) = match &self.state {
            RuntimeState::Walking(leg) => (leg.step_progress, leg.route.len()),
            RuntimeState::ReturningToEndpoint { path, step_progress, .. } => (*step_progress, path.len()),
            RuntimeState::EndOfRouteBehavior(ActiveBehavior::Patrol(run)) => (run.step_progress(), 0),
            _ => (0.0, 0),
        };
        NpcSnapshot {
            npc_id: self.npc_id.clone(),
            map: self.body.map.clone(),
            tile: self.body.tile,
            facing: self.body.facing,
            frame: self.body.frame,
            offset: self.body.offset,
            activity: self.activity(),
            step_progress,
            route_steps_left,
        }
    }

    /// Client side: mirror what the host sent. The local state machine stays idle.
    pub fn apply_replicated(&mut self, snapshot: &NpcSnapshot) {
        self.body.map = snapshot.map.clone();
        self.body.tile = snapshot.tile;
        self.body.facing = snapshot.facing;
        self.body.frame = snapshot.frame;
        self.body.offset = snapshot.offset;
        self.replicated_activity = Some(snapshot.activity.clone());
    }
}
