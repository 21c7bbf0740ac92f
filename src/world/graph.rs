//! Location graph over map warps.
//!
//! `WorldGraph` owns every `MapDef`, precomputes the map-to-map routes with a
//! BFS per gender at load, and answers the navigation queries the schedule
//! runtime makes. It is the default `Navigation` implementation.

use std::collections::{HashMap, HashSet, VecDeque};

use bevy::prelude::*;

use super::maps::MapDef;
use super::pathfinding::find_tile_path;
use crate::shared::*;

const GENDERS: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Undefined];

#[derive(Resource, Debug, Clone, Default)]
pub struct WorldGraph {
    maps: HashMap<String, MapDef>,
    /// (start, end, gender) → chain of map names, both ends included.
    routes: HashMap<(String, String, Gender), Vec<String>>,
    /// Tiles something is standing on right now (players, carts, closed gates).
    obstructions: HashSet<(String, TilePos)>,
}

impl WorldGraph {
    pub fn from_maps(maps: Vec<MapDef>) -> Self {
        let maps: HashMap<String, MapDef> = maps.into_iter().map(|m| (m.name.clone(), m)).collect();
        let mut graph = Self {
            maps,
            routes: HashMap::new(),
            obstructions: HashSet::new(),
        };
        graph.precompute_routes();
        graph
    }

    pub fn map(&self, name: &str) -> Option<&MapDef> {
        self.maps.get(name)
    }

    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    pub fn cached_route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn obstruct(&mut self, map: &str, tile: TilePos) {
        self.obstructions.insert((map.to_string(), tile));
    }

    pub fn clear_obstruction(&mut self, map: &str, tile: TilePos) {
        self.obstructions.remove(&(map.to_string(), tile));
    }

    /// Festival copies route like the map they dress up.
    fn base_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.maps
            .get(name)
            .and_then(|m| m.variant_of.as_deref())
            .unwrap_or(name)
    }

    fn precompute_routes(&mut self) {
        let mut names: Vec<&String> = self
            .maps
            .values()
            .filter(|m| m.variant_of.is_none())
            .map(|m| &m.name)
            .collect();
        names.sort();

        let mut routes = HashMap::new();
        for &gender in &GENDERS {
            for start in &names {
                for (end, chain) in self.bfs_from(start, gender) {
                    routes.insert(((*start).clone(), end, gender), chain);
                }
            }
        }
        self.routes = routes;
    }

    /// Every reachable map from `start`, with the chain that reaches it.
    fn bfs_from(&self, start: &str, gender: Gender) -> Vec<(String, Vec<String>)> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, Vec<String>)> = VecDeque::new();
        let mut found = Vec::new();
        visited.insert(start);
        queue.push_back((start, vec![start.to_string()]));

        while let Some((current, chain)) = queue.pop_front() {
            found.push((current.to_string(), chain.clone()));
            let Some(map) = self.maps.get(current) else {
                continue;
            };
            for warp in &map.warps {
                let next = warp.target_map.as_str();
                let Some(next_map) = self.maps.get(next) else {
                    continue;
                };
                if !next_map.admits(gender) || !visited.insert(next) {
                    continue;
                }
                let mut next_chain = chain.clone();
                next_chain.push(next.to_string());
                queue.push_back((next, next_chain));
            }
        }
        found
    }
}

impl LocationGraph for WorldGraph {
    fn route(&self, start: &str, end: &str, gender: Gender) -> Option<Vec<String>> {
        let start = self.base_name(start);
        let end = self.base_name(end);
        self.routes
            .get(&(start.to_string(), end.to_string(), gender))
            .cloned()
    }
}

impl PathSearch for WorldGraph {
    fn find_path(&self, start: TilePos, goal: TilePos, map: &str, budget: u32) -> Option<Vec<TilePos>> {
        let map = self.maps.get(map)?;
        find_tile_path(map, start, goal, budget)
    }
}

impl WarpLookup for WorldGraph {
    fn warp_between(&self, from_map: &str, to_map: &str) -> Option<Warp> {
        let from = self.maps.get(from_map)?;
        let to = self.base_name(to_map);
        from.warp_to(to).cloned()
    }
}

impl Navigation for WorldGraph {
    fn has_map(&self, map: &str) -> bool {
        self.maps.contains_key(map)
    }

    fn is_walkable(&self, map: &str, tile: TilePos) -> bool {
        self.maps.get(map).is_some_and(|m| m.is_walkable(tile))
    }

    fn is_obstructed(&self, map: &str, tile: TilePos) -> bool {
        self.obstructions.contains(&(map.to_string(), tile))
    }
}
