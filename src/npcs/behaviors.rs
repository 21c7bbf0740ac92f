//! End-of-route behaviors: what an NPC does once it reaches a schedule stop.
//!
//! Behavior names in scripts are resolved once, at parse time, into an
//! `EndOfRouteAction`. When the NPC arrives, the controller turns that into an
//! `ActiveBehavior` and ticks it until the next leg departs.

use std::collections::{HashMap, VecDeque};

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::shared::*;

use super::error::ScheduleError;

/// Frame lists for one named animation, as stored in `assets/data/animations.ron`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AnimationDescription {
    #[serde(default)]
    pub intro: Vec<u32>,
    #[serde(default)]
    pub looping: Vec<u32>,
    #[serde(default)]
    pub outro: Vec<u32>,
    /// Pixel offset applied to the sprite while the animation plays.
    #[serde(default)]
    pub offset: Option<(i32, i32)>,
    /// Line spoken once the loop starts.
    #[serde(default)]
    pub message: Option<String>,
}

impl AnimationDescription {
    /// Lying in bed, used when neither `<npc>_sleep` nor `sleep` is in the table.
    fn default_sleep() -> Self {
        Self {
            intro: Vec::new(),
            looping: vec![20, 21],
            outro: Vec::new(),
            offset: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EndOfRouteAction {
    /// Say a line once, no animation.
    Message(String),
    /// Walk the corners of a `width` x `height` rectangle around the stop, pausing at each one.
    SquarePatrol {
        width: u32,
        height: u32,
        pause_offset_ms: u32,
    },
    /// Sleep animation, looping until the next leg.
    Sleep(AnimationDescription),
    Animation {
        name: String,
        description: AnimationDescription,
    },
}

impl EndOfRouteAction {
    pub fn label(&self) -> String {
        match self {
            EndOfRouteAction::Message(_) => "message".into(),
            EndOfRouteAction::SquarePatrol { width, height, .. } => format!("square_{}_{}", width, height),
            EndOfRouteAction::Sleep(_) => "sleep".into(),
            EndOfRouteAction::Animation { name, .. } => name.clone(),
        }
    }
}

/// Named animation table.
#[derive(Resource, Debug, Clone, Default)]
pub struct BehaviorCatalog {
    pub animations: HashMap<String, AnimationDescription>,
}

impl BehaviorCatalog {
    pub fn from_ron_str(source: &str) -> Result<Self, String> {
        let animations: HashMap<String, AnimationDescription> =
            ron::from_str(source).map_err(|e| format!("Invalid animation table: {}", e))?;
        Ok(Self { animations })
    }

    /// Resolve a behavior name for a given NPC.
    ///
    /// `square_<w>_<h>[_<ms>]` is a patrol; `sleep` prefers `<npc>_sleep`;
    /// anything else is looked up as-is and then as `<npc>_<name>`.
    pub fn resolve(&self, npc_id: &str, name: &str) -> Result<EndOfRouteAction, ScheduleError> {
        let unknown = || ScheduleError::UnknownBehavior {
            npc: npc_id.to_string(),
            name: name.to_string(),
        };

        if let Some(rest) = name.strip_prefix("square_") {
            let parts: Vec<u32> = rest
                .split('_')
                .map(|p| p.parse::<u32>())
                .collect::<Result<_, _>>()
                .map_err(|_| unknown())?;
            return match parts.as_slice() {
                [w, h] if *w > 0 && *h > 0 => Ok(EndOfRouteAction::SquarePatrol {
                    width: *w,
                    height: *h,
                    pause_offset_ms: 0,
                }),
                [w, h, ms] if *w > 0 && *h > 0 => Ok(EndOfRouteAction::SquarePatrol {
                    width: *w,
                    height: *h,
                    pause_offset_ms: *ms,
                }),
                _ => Err(unknown()),
            };
        }

        let own_sleep = format!("{}_sleep", npc_id);
        if name == "sleep" || name == own_sleep {
            let description = self
                .animations
                .get(&own_sleep)
                .or_else(|| self.animations.get("sleep"))
                .cloned()
                .unwrap_or_else(AnimationDescription::default_sleep);
            return Ok(EndOfRouteAction::Sleep(description));
        }

        let prefixed = format!("{}_{}", npc_id, name);
        self.animations
            .get(name)
            .map(|d| (name.to_string(), d))
            .or_else(|| self.animations.get(&prefixed).map(|d| (prefixed.clone(), d)))
            .map(|(name, d)| EndOfRouteAction::Animation {
                name,
                description: d.clone(),
            })
            .ok_or_else(unknown)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// RUNTIME
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimPhase {
    Intro,
    Loop,
    Outro,
    Done,
}

/// Plays intro frames once, loops until told to wind down, then plays the outro.
#[derive(Debug, Clone)]
pub struct AnimationRun {
    description: AnimationDescription,
    phase: AnimPhase,
    index: usize,
    elapsed_ms: u32,
    frame_ms: u32,
}

impl AnimationRun {
    pub fn new(description: AnimationDescription, frame_ms: u32) -> Self {
        let phase = if !description.intro.is_empty() {
            AnimPhase::Intro
        } else if !description.looping.is_empty() {
            AnimPhase::Loop
        } else {
            AnimPhase::Done
        };
        Self {
            description,
            phase,
            index: 0,
            elapsed_ms: 0,
            frame_ms: frame_ms.max(1),
        }
    }

    pub fn phase(&self) -> AnimPhase {
        self.phase
    }

    pub fn offset(&self) -> Option<(i32, i32)> {
        self.description.offset
    }

    /// The follow-up line, if the run starts straight in its loop.
    pub fn opening_message(&self) -> Option<&str> {
        if self.phase == AnimPhase::Loop && self.elapsed_ms == 0 && self.index == 0 {
            self.description.message.as_deref()
        } else {
            None
        }
    }

    fn frames(&self) -> &[u32] {
        match self.phase {
            AnimPhase::Intro => &self.description.intro,
            AnimPhase::Loop => &self.description.looping,
            AnimPhase::Outro => &self.description.outro,
            AnimPhase::Done => &[],
        }
    }

    pub fn current_frame(&self) -> Option<u32> {
        self.frames().get(self.index).copied()
    }

    /// Advance by `dt_ms`. Returns the follow-up message when the intro hands over to the loop.
    pub fn tick(&mut self, dt_ms: u32) -> Option<String> {
        let mut message = None;
        self.elapsed_ms += dt_ms;
        while self.elapsed_ms >= self.frame_ms && self.phase != AnimPhase::Done {
            self.elapsed_ms -= self.frame_ms;
            self.index += 1;
            if self.index < self.frames().len() {
                continue;
            }
            self.index = 0;
            match self.phase {
                AnimPhase::Intro => {
                    self.phase = if self.description.looping.is_empty() {
                        AnimPhase::Done
                    } else {
                        AnimPhase::Loop
                    };
                    message = self.description.message.clone();
                }
                AnimPhase::Loop => {}
                AnimPhase::Outro | AnimPhase::Done => self.phase = AnimPhase::Done,
            }
        }
        message
    }

    /// Leave the loop: play the outro, or stop right away when there is none.
    pub fn wind_down(&mut self) {
        if matches!(self.phase, AnimPhase::Intro | AnimPhase::Loop) {
            self.index = 0;
            self.elapsed_ms = 0;
            self.phase = if self.description.outro.is_empty() {
                AnimPhase::Done
            } else {
                AnimPhase::Outro
            };
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == AnimPhase::Done
    }
}

/// Walks the corners of a rectangle centered on the arrival tile.
#[derive(Debug, Clone)]
pub struct PatrolRun {
    pub anchor: TilePos,
    corners: [TilePos; 4],
    next_corner: usize,
    leg: VecDeque<TilePos>,
    step_progress: f32,
    pause_remaining_ms: u32,
    pause_offset_ms: u32,
    pause_range_ms: (u32, u32),
    rng: StdRng,
}

/// What a patrol tick did to the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatrolStep {
    Waiting,
    Moved(TilePos),
}

impl PatrolRun {
    pub fn new(anchor: TilePos, width: u32, height: u32, pause_offset_ms: u32, pause_range_ms: (u32, u32), seed: u64) -> Self {
        let (w, h) = (width as i32, height as i32);
        // Odd sizes lean half a tile toward +x/+y.
        let top_left = anchor.offset(-(w / 2), -(h / 2));
        Self {
            anchor,
            corners: [
                top_left,
                top_left.offset(w, 0),
                top_left.offset(w, h),
                top_left.offset(0, h),
            ],
            next_corner: 0,
            leg: VecDeque::new(),
            step_progress: 0.0,
            pause_remaining_ms: 0,
            pause_offset_ms,
            pause_range_ms,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn corners(&self) -> &[TilePos; 4] {
        &self.corners
    }

    pub fn step_progress(&self) -> f32 {
        self.step_progress
    }

    fn start_pause(&mut self) {
        let (lo, hi) = self.pause_range_ms;
        let roll = if hi > lo { self.rng.gen_range(lo..=hi) } else { lo };
        self.pause_remaining_ms = self.pause_offset_ms + roll;
    }

    fn corner_reached(&mut self) {
        self.next_corner = (self.next_corner + 1) % self.corners.len();
        self.start_pause();
    }

    pub fn tick(
        &mut self,
        current: TilePos,
        dt_ms: u32,
        tiles_per_second: f32,
        nav: &dyn Navigation,
        map: &str,
        budget: u32,
    ) -> PatrolStep {
        if self.pause_remaining_ms > 0 {
            self.pause_remaining_ms = self.pause_remaining_ms.saturating_sub(dt_ms);
            return PatrolStep::Waiting;
        }

        if self.leg.is_empty() {
            let target = self.corners[self.next_corner];
            match nav.find_path(current, target, map, budget) {
                Some(path) if path.is_empty() => {
                    self.corner_reached();
                    return PatrolStep::Waiting;
                }
                Some(path) => self.leg = path.into(),
                None => {
                    // Corner blocked (wall, water); skip it.
                    debug!("[Schedule] patrol corner {} on {} unreachable, skipping", target, map);
                    self.corner_reached();
                    return PatrolStep::Waiting;
                }
            }
        }

        self.step_progress += dt_ms as f32 / 1000.0 * tiles_per_second;
        if self.step_progress < 1.0 {
            return PatrolStep::Waiting;
        }
        self.step_progress -= 1.0;
        let Some(next) = self.leg.pop_front() else {
            return PatrolStep::Waiting;
        };
        if self.leg.is_empty() {
            self.step_progress = 0.0;
            self.corner_reached();
        }
        PatrolStep::Moved(next)
    }

    /// Forget the current leg; the next tick replans from wherever the walker is.
    pub fn replan(&mut self) {
        self.leg.clear();
        self.step_progress = 0.0;
    }
}

/// The behavior an NPC is currently running at the end of a leg.
#[derive(Debug, Clone)]
pub enum ActiveBehavior {
    Animation { name: String, run: AnimationRun },
    Sleep(AnimationRun),
    Patrol(PatrolRun),
}

impl ActiveBehavior {
    pub fn name(&self) -> String {
        match self {
            ActiveBehavior::Animation { name, .. } => name.clone(),
            ActiveBehavior::Sleep(_) => "sleep".into(),
            ActiveBehavior::Patrol(run) => {
                let c = run.corners();
                format!("square_{}_{}", c[1].x - c[0].x, c[3].y - c[0].y)
            }
        }
    }

    pub fn frame(&self) -> Option<u32> {
        match self {
            ActiveBehavior::Animation { run, .. } | ActiveBehavior::Sleep(run) => run.current_frame(),
            ActiveBehavior::Patrol(_) => None,
        }
    }

    pub fn offset(&self) -> (i32, i32) {
        match self {
            ActiveBehavior::Animation { run, .. } | ActiveBehavior::Sleep(run) => run.offset().unwrap_or((0, 0)),
            ActiveBehavior::Patrol(_) => (0, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::maps::all_maps;
    use crate::world::WorldGraph;

    fn catalog() -> BehaviorCatalog {
        BehaviorCatalog::from_ron_str(
            r#"{
                "sleep": (looping: [1, 2]),
                "margaret_sleep": (looping: [7]),
                "knead": (intro: [3], looping: [4, 5], outro: [6], offset: Some((0, -4)), message: Some("Fresh bread!")),
                "old_tom_fish": (looping: [9]),
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_square_names_parse_dimensions() {
        let c = catalog();
        assert_eq!(
            c.resolve("lily", "square_3_2").unwrap(),
            EndOfRouteAction::SquarePatrol { width: 3, height: 2, pause_offset_ms: 0 }
        );
        assert_eq!(
            c.resolve("lily", "square_4_4_500").unwrap(),
            EndOfRouteAction::SquarePatrol { width: 4, height: 4, pause_offset_ms: 500 }
        );
        assert!(c.resolve("lily", "square_x_2").is_err());
        assert!(c.resolve("lily", "square_0_2").is_err());
    }

    #[test]
    fn test_sleep_prefers_npc_specific_animation() {
        let c = catalog();
        match c.resolve("margaret", "sleep").unwrap() {
            EndOfRouteAction::Sleep(d) => assert_eq!(d.looping, vec![7]),
            other => panic!("expected sleep, got {:?}", other),
        }
        match c.resolve("lily", "sleep").unwrap() {
            EndOfRouteAction::Sleep(d) => assert_eq!(d.looping, vec![1, 2]),
            other => panic!("expected sleep, got {:?}", other),
        }
        // Empty table still has a built-in sleep.
        assert!(matches!(
            BehaviorCatalog::default().resolve("lily", "sleep"),
            Ok(EndOfRouteAction::Sleep(_))
        ));
    }

    #[test]
    fn test_named_animation_falls_back_to_npc_prefix() {
        let c = catalog();
        match c.resolve("old_tom", "fish").unwrap() {
            EndOfRouteAction::Animation { name, .. } => assert_eq!(name, "old_tom_fish"),
            other => panic!("expected animation, got {:?}", other),
        }
        assert!(matches!(
            c.resolve("lily", "fish"),
            Err(ScheduleError::UnknownBehavior { .. })
        ));
    }

    #[test]
    fn test_animation_runs_intro_loop_outro() {
        let c = catalog();
        let EndOfRouteAction::Animation { description, .. } = c.resolve("margaret", "knead").unwrap() else {
            panic!("expected animation");
        };
        let mut run = AnimationRun::new(description, 100);
        assert_eq!(run.phase(), AnimPhase::Intro);
        assert_eq!(run.current_frame(), Some(3));

        let msg = run.tick(100);
        assert_eq!(msg.as_deref(), Some("Fresh bread!"));
        assert_eq!(run.phase(), AnimPhase::Loop);
        assert_eq!(run.current_frame(), Some(4));

        // Loops forever.
        assert!(run.tick(1_000).is_none());
        assert_eq!(run.phase(), AnimPhase::Loop);

        run.wind_down();
        assert_eq!(run.phase(), AnimPhase::Outro);
        assert_eq!(run.current_frame(), Some(6));
        run.tick(100);
        assert!(run.is_done());
    }

    #[test]
    fn test_patrol_visits_corners_and_pauses() {
        let graph = WorldGraph::from_maps(all_maps());
        let anchor = TilePos::new(2, 20);
        let mut patrol = PatrolRun::new(anchor, 2, 2, 0, (0, 0), 7);
        let mut tile = anchor;
        let mut visited = Vec::new();
        for _ in 0..200 {
            if let PatrolStep::Moved(next) = patrol.tick(tile, 250, 2.0, &graph, "Town", 1000) {
                assert_eq!(tile.manhattan(next), 1);
                tile = next;
                if patrol.corners().contains(&tile) && visited.last() != Some(&tile) {
                    visited.push(tile);
                }
            }
        }
        assert!(visited.contains(&TilePos::new(1, 19)));
        assert!(visited.contains(&TilePos::new(3, 19)));
        assert!(visited.contains(&TilePos::new(3, 21)));
        assert!(visited.contains(&TilePos::new(1, 21)));
    }

    #[test]
    fn test_patrol_square_is_centered_on_the_stop() {
        let anchor = TilePos::new(10, 10);
        let patrol = PatrolRun::new(anchor, 2, 2, 0, (0, 0), 1);
        let c = patrol.corners();
        assert_eq!(*c, [
            TilePos::new(9, 9),
            TilePos::new(11, 9),
            TilePos::new(11, 11),
            TilePos::new(9, 11),
        ]);
        assert_eq!(((c[0].x + c[2].x) / 2, (c[0].y + c[2].y) / 2), (anchor.x, anchor.y));
        assert_eq!(ActiveBehavior::Patrol(patrol).name(), "square_2_2");

        // Walked tiles fall on both sides of the stop on both axes.
        let graph = WorldGraph::from_maps(all_maps());
        let anchor = TilePos::new(24, 15);
        let mut patrol = PatrolRun::new(anchor, 3, 2, 0, (0, 0), 3);
        let mut tile = anchor;
        let mut walked = vec![tile];
        for _ in 0..300 {
            if let PatrolStep::Moved(next) = patrol.tick(tile, 250, 2.0, &graph, "Town", 1000) {
                tile = next;
                walked.push(tile);
            }
        }
        assert!(walked.iter().any(|t| t.x < anchor.x) && walked.iter().any(|t| t.x > anchor.x));
        assert!(walked.iter().any(|t| t.y < anchor.y) && walked.iter().any(|t| t.y > anchor.y));
        assert!(walked.iter().all(|t| (t.x - anchor.x).abs() <= 2 && (t.y - anchor.y).abs() <= 1));
    }
}
