//! Multi-map route resolution.
//!
//! Turns "go from here to (map, tile)" into a flat list of tile steps that
//! may cross several maps. The location graph gives the chain of maps; for
//! every hop we walk to the warp tile and continue from the warp's landing
//! tile on the next map.

use std::collections::VecDeque;

use crate::shared::*;

use super::behaviors::EndOfRouteAction;
use super::context::MapSubstitutions;
use super::error::{RouteError, ScheduleError};

/// One tile to stand on. Consecutive steps on different maps are a warp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStep {
    pub map: String,
    pub tile: TilePos,
}

/// A leg ready to walk.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub steps: VecDeque<RouteStep>,
    pub end_map: String,
    pub end_tile: TilePos,
    pub facing: Facing,
    pub behavior: Option<EndOfRouteAction>,
    pub message: Option<String>,
}

impl ResolvedRoute {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

pub struct RouteResolver<'a> {
    pub nav: &'a dyn Navigation,
    pub substitutions: &'a MapSubstitutions,
    pub gender: Gender,
    pub budget: u32,
    pub npc: &'a str,
    pub key: &'a str,
}

impl<'a> RouteResolver<'a> {
    fn wrap(&self, hop: String, source: RouteError) -> ScheduleError {
        ScheduleError::Route {
            npc: self.npc.to_string(),
            key: self.key.to_string(),
            hop,
            source,
        }
    }

    /// Tile steps from `(start_map, start_tile)` to `(end_map, end_tile)`.
    pub fn resolve_steps(
        &self,
        start_map: &str,
        start_tile: TilePos,
        end_map: &str,
        end_tile: TilePos,
    ) -> Result<Vec<RouteStep>, ScheduleError> {
        if start_tile.is_unset() {
            return Err(ScheduleError::UnsetStartTile {
                npc: self.npc.to_string(),
                key: self.key.to_string(),
            });
        }
        let whole_hop = || format!("{} -> {}", start_map, end_map);
        for map in [start_map, end_map] {
            if !self.nav.has_map(map) {
                return Err(self.wrap(whole_hop(), RouteError::UnknownMap(map.to_string())));
            }
        }

        let chain = self
            .nav
            .route(start_map, end_map, self.gender)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                self.wrap(
                    whole_hop(),
                    RouteError::NoConnection {
                        from: start_map.to_string(),
                        to: end_map.to_string(),
                    },
                )
            })?;

        let mut steps = Vec::new();
        let mut current = start_tile;

        for pair in chain.windows(2) {
            let (from, to) = (pair[0].as_str(), pair[1].as_str());
            let hop = format!("{} -> {}", from, to);
            let walk_map = self.substitutions.apply(from);
            if !self.nav.has_map(walk_map) {
                return Err(self.wrap(hop, RouteError::UnknownMap(walk_map.to_string())));
            }
            let warp = self.nav.warp_between(walk_map, to).ok_or_else(|| {
                self.wrap(
                    hop.clone(),
                    RouteError::MissingWarp {
                        from: from.to_string(),
                        to: to.to_string(),
                    },
                )
            })?;
            let path = self
                .nav
                .find_path(current, warp.tile, walk_map, self.budget)
                .ok_or_else(|| {
                    self.wrap(
                        hop.clone(),
                        RouteError::PathBlocked {
                            map: walk_map.to_string(),
                            from: current,
                            to: warp.tile,
                        },
                    )
                })?;
            steps.extend(path.into_iter().map(|tile| RouteStep {
                map: walk_map.to_string(),
                tile,
            }));
            steps.push(RouteStep {
                map: self.substitutions.apply(to).to_string(),
                tile: warp.target_tile,
            });
            current = warp.target_tile;
        }

        let last = chain.last().map(String::as_str).unwrap_or(end_map);
        let walk_map = self.substitutions.apply(last);
        if current != end_tile && !self.nav.is_walkable(walk_map, end_tile) {
            return Err(self.wrap(
                format!("{} {} -> {}", walk_map, current, end_tile),
                RouteError::UnwalkableGoal {
                    map: walk_map.to_string(),
                    tile: end_tile,
                },
            ));
        }
        let path = self
            .nav
            .find_path(current, end_tile, walk_map, self.budget)
            .ok_or_else(|| {
                self.wrap(
                    format!("{} {} -> {}", walk_map, current, end_tile),
                    RouteError::PathBlocked {
                        map: walk_map.to_string(),
                        from: current,
                        to: end_tile,
                    },
                )
            })?;
        steps.extend(path.into_iter().map(|tile| RouteStep {
            map: walk_map.to_string(),
            tile,
        }));
        Ok(steps)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &self,
        start_map: &str,
        start_tile: TilePos,
        end_map: &str,
        end_tile: TilePos,
        facing: Facing,
        behavior: Option<EndOfRouteAction>,
        message: Option<String>,
    ) -> Result<ResolvedRoute, ScheduleError> {
        let steps = self.resolve_steps(start_map, start_tile, end_map, end_tile)?;
        Ok(ResolvedRoute {
            steps: steps.into(),
            end_map: self.substitutions.apply(end_map).to_string(),
            end_tile,
            facing,
            behavior,
            message,
        })
    }

    /// Number of tiles a leg would take, for arrival-time estimates.
    pub fn estimate_tiles(&self, start: &Placement, end_map: &str, end_tile: TilePos) -> Option<usize> {
        self.resolve_steps(&start.map, start.tile, end_map, end_tile)
            .ok()
            .map(|steps| steps.len())
    }
}
