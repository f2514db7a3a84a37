//! Grid pathfinding, line of sight, and corridor smoothing.
//!
//! A* runs on the 8-connected tile grid with a hard node budget: this
//! is a per-tick real-time system, and a capped search that sometimes
//! fails beats an exact one that stalls the tick. Callers treat `None`
//! as "walk straight and let the walkability test sort it out".

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::constants::PATHFINDING_MAX_NODES;
use crate::math::{Fixed, Vec2Fixed, SQRT_2};
use crate::tilemap::TileMap;

/// A candidate node in the A* open set.
///
/// Ordered as a min-heap on f-cost, then h-cost, then coordinates, so
/// ties never depend on insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    x: i32,
    y: i32,
    f_cost: Fixed,
    h_cost: Fixed,
    tie_breaker: u64,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for min-heap behavior.
        match other.f_cost.cmp(&self.f_cost) {
            Ordering::Equal => match other.h_cost.cmp(&self.h_cost) {
                Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
                ord => ord,
            },
            ord => ord,
        }
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[inline]
fn tie_breaker(x: i32, y: i32) -> u64 {
    ((y as u32 as u64) << 32) | (x as u32 as u64)
}

/// Neighbor offsets with step costs: cardinals first, then diagonals.
fn neighbor_deltas() -> [(i32, i32, Fixed); 8] {
    [
        (0, -1, Fixed::ONE),
        (0, 1, Fixed::ONE),
        (-1, 0, Fixed::ONE),
        (1, 0, Fixed::ONE),
        (-1, -1, SQRT_2),
        (1, -1, SQRT_2),
        (-1, 1, SQRT_2),
        (1, 1, SQRT_2),
    ]
}

#[inline]
fn manhattan(x1: i32, y1: i32, x2: i32, y2: i32) -> Fixed {
    Fixed::from_num((x1 - x2).abs() + (y1 - y2).abs())
}

/// Find a tile path between two world points.
///
/// `occupied` holds tiles currently under living agents; they are
/// treated as blocked, which gives coarse mutual avoidance without any
/// reservation system.
///
/// Returns tile-center waypoints from the node after the start tile
/// through the goal. `Some(vec![])` means start and goal share a tile.
/// `None` means no route was found within [`PATHFINDING_MAX_NODES`]
/// expansions; that is a budget outcome, not an error.
#[must_use]
pub fn find_path(
    start: Vec2Fixed,
    end: Vec2Fixed,
    map: &TileMap,
    occupied: &HashSet<(i32, i32)>,
) -> Option<Vec<Vec2Fixed>> {
    let (start_x, start_y) = map.tile_coords_of(start);
    let (end_x, end_y) = map.tile_coords_of(end);

    if (start_x, start_y) == (end_x, end_y) {
        return Some(Vec::new());
    }

    let mut open: BinaryHeap<OpenNode> = BinaryHeap::new();
    let mut came_from: HashMap<(i32, i32), (i32, i32)> = HashMap::new();
    let mut g_score: HashMap<(i32, i32), Fixed> = HashMap::new();
    let mut closed: HashSet<(i32, i32)> = HashSet::new();

    let start_h = manhattan(start_x, start_y, end_x, end_y);
    g_score.insert((start_x, start_y), Fixed::ZERO);
    open.push(OpenNode {
        x: start_x,
        y: start_y,
        f_cost: start_h,
        h_cost: start_h,
        tie_breaker: tie_breaker(start_x, start_y),
    });

    let mut nodes_explored = 0u32;

    while let Some(current) = open.pop() {
        nodes_explored += 1;
        if nodes_explored > PATHFINDING_MAX_NODES {
            return None;
        }

        let current_key = (current.x, current.y);
        if !closed.insert(current_key) {
            continue; // stale heap entry
        }

        if current_key == (end_x, end_y) {
            return Some(reconstruct(map, &came_from, current_key, (start_x, start_y)));
        }

        let current_g = g_score.get(&current_key).copied().unwrap_or(Fixed::MAX);

        for (dx, dy, step_cost) in neighbor_deltas() {
            let nx = current.x + dx;
            let ny = current.y + dy;
            let key = (nx, ny);

            if closed.contains(&key) {
                continue;
            }
            if occupied.contains(&key) {
                closed.insert(key);
                continue;
            }
            if !map.is_traversable(nx, ny) {
                closed.insert(key);
                continue;
            }
            if dx != 0 && dy != 0 {
                // No slipping through a corner where both orthogonal
                // neighbors are solid.
                let side_a = map.is_traversable(current.x + dx, current.y);
                let side_b = map.is_traversable(current.x, current.y + dy);
                if !side_a && !side_b {
                    continue;
                }
            }

            let tentative_g = current_g + step_cost;
            let known_g = g_score.get(&key).copied().unwrap_or(Fixed::MAX);
            if tentative_g < known_g {
                came_from.insert(key, current_key);
                g_score.insert(key, tentative_g);
                let h = manhattan(nx, ny, end_x, end_y);
                open.push(OpenNode {
                    x: nx,
                    y: ny,
                    f_cost: tentative_g + h,
                    h_cost: h,
                    tie_breaker: tie_breaker(nx, ny),
                });
            }
        }
    }

    None
}

/// Walk the parent chain back from the goal, emitting tile centers and
/// dropping the start tile itself.
fn reconstruct(
    map: &TileMap,
    came_from: &HashMap<(i32, i32), (i32, i32)>,
    goal: (i32, i32),
    start: (i32, i32),
) -> Vec<Vec2Fixed> {
    let mut path = Vec::new();
    let mut current = goal;
    while current != start {
        path.push(map.tile_center(current.0, current.1));
        match came_from.get(&current) {
            Some(&prev) => current = prev,
            None => break,
        }
    }
    path.reverse();
    path
}

/// Check for an unobstructed straight line between two world points.
///
/// Samples the segment at one-third-tile steps. The tile containing
/// `start` never blocks (a shooter hugging a wall can still see out of
/// its own tile); any other sampled tile that blocks sight fails.
#[must_use]
pub fn has_line_of_sight(start: Vec2Fixed, end: Vec2Fixed, map: &TileMap) -> bool {
    let total = start.distance(end);
    if total == Fixed::ZERO {
        return true;
    }

    let step = map.tile_size() / Fixed::from_num(3);
    let num_steps: i64 = (total / step).ceil().to_num();
    let num_steps = num_steps.max(1);

    let start_tile = map.tile_coords_of(start);

    for i in 0..=num_steps {
        let t = Fixed::from_num(i) / Fixed::from_num(num_steps);
        let sample = start.lerp(end, t);

        if sample.x < Fixed::ZERO || sample.y < Fixed::ZERO {
            return false;
        }
        let coords = map.tile_coords_of(sample);
        let Some(tile) = map.tile(coords.0, coords.1) else {
            return false;
        };
        if coords != start_tile && tile.kind.blocks_sight() {
            return false;
        }
    }

    true
}

/// Remove interior waypoints that the agent can skip by walking
/// straight ("string pulling").
///
/// Keeps the first point as an anchor and advances until sight from the
/// anchor to a candidate breaks, then commits the last visible point as
/// the new anchor. The result never routes a segment through a
/// sight-blocking tile.
#[must_use]
pub fn smooth_path(path: Vec<Vec2Fixed>, map: &TileMap) -> Vec<Vec2Fixed> {
    if path.len() < 3 {
        return path;
    }

    let mut smoothed = vec![path[0]];
    let mut last_committed = path[0];
    let mut anchor = 0usize;

    for i in 2..path.len() {
        if !has_line_of_sight(path[anchor], path[i], map) {
            if path[i - 1] != last_committed {
                smoothed.push(path[i - 1]);
                last_committed = path[i - 1];
            }
            anchor = i - 1;
        }
    }

    let last = path[path.len() - 1];
    if last != last_committed {
        smoothed.push(last);
    }

    smoothed
}
