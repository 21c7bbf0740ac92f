//! Per-map tile path search.
//!
//! 4-neighbour A* over a `MapDef` with a Manhattan heuristic. The search
//! gives up after `budget` node expansions so a pathological map can't stall
//! the tick. Paths are planned once; nothing here tracks moving obstacles.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use super::maps::MapDef;
use crate::shared::TilePos;

/// Neighbour order: up, right, down, left. Fixed so equal-cost paths come out the same every time.
const STEPS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Tiles to walk after `start`, ending with `goal`.
///
/// Returns `Some(vec![])` when already standing on the goal and `None` when
/// the goal is blocked, unreachable, or the budget ran out. The start tile
/// itself is never checked for walkability (an NPC may be standing in bed).
pub fn find_tile_path(map: &MapDef, start: TilePos, goal: TilePos, budget: u32) -> Option<Vec<TilePos>> {
    if start == goal {
        return Some(Vec::new());
    }
    if !map.is_walkable(goal) {
        return None;
    }

    let mut frontier = BinaryHeap::new();
    let mut came_from: HashMap<TilePos, TilePos> = HashMap::new();
    let mut cost_so_far: HashMap<TilePos, u32> = HashMap::new();
    // Insertion counter breaks ties between equal f-scores deterministically.
    let mut seq: u64 = 0;

    frontier.push(Reverse((start.manhattan(goal), seq, start.x, start.y)));
    cost_so_far.insert(start, 0);

    let mut expansions = 0u32;
    while let Some(Reverse((_, _, x, y))) = frontier.pop() {
        let current = TilePos::new(x, y);
        if current == goal {
            let mut path = vec![current];
            let mut node = current;
            while let Some(&prev) = came_from.get(&node) {
                if prev == start {
                    break;
                }
                path.push(prev);
                node = prev;
            }
            path.reverse();
            return Some(path);
        }

        expansions += 1;
        if expansions > budget {
            return None;
        }

        let current_cost = cost_so_far.get(&current).copied().unwrap_or(u32::MAX);
        for (dx, dy) in STEPS {
            let next = current.offset(dx, dy);
            if !map.is_walkable(next) {
                continue;
            }
            let new_cost = current_cost.saturating_add(1);
            let better = cost_so_far.get(&next).map_or(true, |&c| new_cost < c);
            if better {
                cost_so_far.insert(next, new_cost);
                came_from.insert(next, current);
                seq += 1;
                frontier.push(Reverse((new_cost + next.manhattan(goal), seq, next.x, next.y)));
            }
        }
    }

    None
}
