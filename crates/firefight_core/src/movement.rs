//! The per-agent movement executor.
//!
//! [`advance_agent`] resolves one tick of movement toward a desired
//! destination: path acquisition and waypoint following, axis-separated
//! wall sliding, arrival snapping, crowd handling, and the stuck
//! recovery behaviors that keep agents from wedging permanently against
//! terrain or each other.
//!
//! Failure semantics: a failed path lookup is not an error. The agent
//! falls back to walking straight at the target and the walkability
//! test throttles it; persistent failure shows up only as a rising
//! stuck counter.

use crate::collision::{is_position_walkable, ObstacleSet, Walkability};
use crate::components::{Agent, AgentKind, EntityId, PathCache};
use crate::constants::{
    ARRIVAL_THRESHOLD, STUCK_RESCUE_MAX_RADIUS_TILES, STUCK_TIMEOUT_TICKS,
};
use crate::math::{fixed_ratio, Fixed, Vec2Fixed};
use crate::pathfinding::{find_path, smooth_path};
use crate::rng::GameRng;
use crate::tilemap::TileMap;

/// Result of one movement tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveOutcome {
    /// The agent's position actually changed.
    pub moved: bool,
    /// Entity in the way, reported only when no movement happened.
    pub blocked_by: Option<EntityId>,
}

/// Cardinal probe directions for corner detection.
const CARDINALS: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// Displacements smaller than this don't count as movement.
fn motion_epsilon() -> Fixed {
    fixed_ratio(1, 1000)
}

/// Convert a tile-center waypoint into the agent's top-left frame.
fn node_top_left(node_center: Vec2Fixed, size: Vec2Fixed) -> Vec2Fixed {
    let two = Fixed::from_num(2);
    Vec2Fixed::new(node_center.x - size.x / two, node_center.y - size.y / two)
}

fn tile_blocks_at(map: &TileMap, point: Vec2Fixed) -> bool {
    map.tile_at_point(point)
        .is_some_and(|t| t.kind.blocks_movement())
}

/// Resolve one tick of movement for `agent` toward `desired`.
///
/// The caller owns keeping `obstacles` in sync afterwards (via
/// [`ObstacleSet::update_position`]) so that later movers in the same
/// phase collide against this agent's new position.
pub fn advance_agent(
    agent: &mut Agent,
    desired: Option<Vec2Fixed>,
    map: &TileMap,
    obstacles: &ObstacleSet,
    rng: &mut GameRng,
    tick: u64,
) -> MoveOutcome {
    let original = agent.position;
    let size = agent.size;
    let side = agent.kind.side();
    let ignore = Some(agent.id);
    let rescue_threshold = STUCK_TIMEOUT_TICKS / 2;

    let walk_here = is_position_walkable(original, size, map, ignore, side, obstacles);
    let embedded_in_tile = tile_blocks_at(map, original);

    // Embedded-in-wall failsafe. Destructible-tile churn or a degenerate
    // spawn can leave an agent standing inside terrain; after enough
    // failed ticks, ring-search outward and teleport to open ground.
    if !walk_here.walkable && embedded_in_tile {
        agent.stuck_counter += 1;
        if agent.stuck_counter > rescue_threshold {
            if let Some(rescue) = find_rescue_spot(agent, map, obstacles) {
                agent.position = rescue;
            }
            agent.clear_path();
            agent.stuck_counter = 0;
            return MoveOutcome::default();
        }
    } else if walk_here.walkable {
        agent.stuck_counter = 0;
    }
    // Blocked by an agent rather than a tile: no failsafe counting, the
    // crowd handling below deals with it.

    let Some(intended) = desired else {
        agent.clear_path();
        return MoveOutcome::default();
    };

    acquire_path_if_needed(agent, intended, map, obstacles);
    let actual_target = follow_waypoints(agent, intended);

    let delta = actual_target - original;
    let dist = original.distance(actual_target);

    let mut new_pos = original;
    let mut moved = false;
    let mut blocked_by: Option<EntityId> = None;
    let eps = motion_epsilon();

    if dist <= ARRIVAL_THRESHOLD {
        // Inside the arrival window: walk the exact remaining vector
        // instead of a full-speed step, so arrival never oscillates.
        if dist > eps {
            let ratio = if agent.speed >= dist {
                Fixed::ONE
            } else {
                agent.speed / dist
            };
            new_pos = original + delta * ratio;
            moved = true;
        }
    } else {
        let step = if dist < agent.speed {
            delta
        } else {
            delta * (agent.speed / dist)
        };
        let potential = original + step;

        // Resolve X then Y independently so a blocked diagonal still
        // slides along the open axis.
        let mut provisional = original;
        let x_check = is_position_walkable(
            Vec2Fixed::new(potential.x, original.y),
            size,
            map,
            ignore,
            side,
            obstacles,
        );
        if x_check.walkable {
            provisional.x = potential.x;
        } else if let Some(b) = x_check.blocked_by {
            blocked_by = Some(b);
        }

        let y_check = is_position_walkable(
            Vec2Fixed::new(provisional.x, potential.y),
            size,
            map,
            ignore,
            side,
            obstacles,
        );
        if y_check.walkable {
            provisional.y = potential.y;
        } else {
            if let Some(b) = y_check.blocked_by {
                blocked_by = Some(b);
            }
            if x_check.walkable && provisional.x == potential.x {
                provisional.y = original.y;
            } else if !x_check.walkable {
                provisional.x = original.x;
            }
        }

        // Fully blocked by agents: try the Y-then-X combination before
        // giving up for this tick.
        if provisional == original && (x_check.blocked_by.is_some() || y_check.blocked_by.is_some())
        {
            let y_first = is_position_walkable(
                Vec2Fixed::new(original.x, potential.y),
                size,
                map,
                ignore,
                side,
                obstacles,
            );
            if y_first.walkable {
                let both = is_position_walkable(potential, size, map, ignore, side, obstacles);
                if both.walkable {
                    provisional = potential;
                } else {
                    provisional = Vec2Fixed::new(original.x, potential.y);
                    if let Some(b) = both.blocked_by {
                        blocked_by = Some(b);
                    }
                }
            } else if let Some(b) = y_first.blocked_by {
                blocked_by = Some(b);
            }
        }

        new_pos = provisional;
        moved = (new_pos.x - original.x).abs() > eps || (new_pos.y - original.y).abs() > eps;

        if moved {
            let dist_after = new_pos.distance(actual_target);
            if dist_after <= ARRIVAL_THRESHOLD && dist_after > eps {
                let ratio = if agent.speed >= dist_after {
                    Fixed::ONE
                } else {
                    agent.speed / dist_after
                };
                new_pos = original + (actual_target - original) * ratio;
            }
        } else if dist > ARRIVAL_THRESHOLD && blocked_by.is_none() {
            // Identify who is in the way even when both axis probes
            // individually failed on terrain.
            let combined = is_position_walkable(potential, size, map, ignore, side, obstacles);
            if !combined.walkable {
                if let Some(b) = combined.blocked_by {
                    blocked_by = Some(b);
                }
            }
        }
    }

    if moved {
        let displacement = new_pos - original;
        agent.last_movement_vector = if displacement.length() > fixed_ratio(1, 100) {
            displacement.normalize()
        } else {
            Vec2Fixed::ZERO
        };
        agent.last_moved_tick = tick;
    } else {
        agent.last_movement_vector = Vec2Fixed::ZERO;
    }

    // Crowd handling: a squadmate in the way means the current corridor
    // is contested, so reroute much sooner than the generic timeout.
    if !moved {
        if let Some(blocker) = blocked_by {
            if agent.squad_id.is_some() && obstacles.squad_of(blocker) == agent.squad_id {
                agent.stuck_counter = (agent.stuck_counter + 1).min(STUCK_TIMEOUT_TICKS);
                if agent.stuck_counter > STUCK_TIMEOUT_TICKS / 4 {
                    agent.clear_path();
                }
            }
        } else if agent.stuck_counter > STUCK_TIMEOUT_TICKS / 4
            && agent.kind != AgentKind::Player
        {
            agent.clear_path();
            agent.stuck_counter = 0;
        }
    }

    // Clamp into map bounds, then re-validate: if the resolved spot is
    // somehow unwalkable, revert the whole tick.
    let max_x = map.pixel_width() - size.x;
    let max_y = map.pixel_height() - size.y;
    new_pos.x = new_pos.x.clamp(Fixed::ZERO, max_x);
    new_pos.y = new_pos.y.clamp(Fixed::ZERO, max_y);

    let final_check = is_position_walkable(new_pos, size, map, ignore, side, obstacles);
    if !final_check.walkable {
        new_pos = original;
        moved = false;
        agent.stuck_counter = (agent.stuck_counter + 1).min(STUCK_TIMEOUT_TICKS);
        agent.clear_path();
        if final_check.blocked_by.is_some() {
            blocked_by = final_check.blocked_by;
        }
    }

    revalidate_path(agent, map, obstacles);

    // Corner escape: stationary on open ground with nobody in the way
    // but walls on two or more cardinal sides. After a short patience
    // period, nudge toward a random open side and force a replan.
    if !moved && walk_here.walkable && blocked_by.is_none() && agent.kind != AgentKind::Player {
        let ts = map.tile_size();
        let mut wall_count = 0;
        let mut open_dirs: Vec<(i32, i32)> = Vec::new();
        for (dx, dy) in CARDINALS {
            let probe = original
                + Vec2Fixed::new(Fixed::from_num(dx) * ts, Fixed::from_num(dy) * ts);
            if tile_blocks_at(map, probe) {
                wall_count += 1;
            } else {
                open_dirs.push((dx, dy));
            }
        }
        if wall_count >= 2 {
            agent.stuck_counter += 1;
            if agent.stuck_counter > rescue_threshold {
                if !open_dirs.is_empty() {
                    let (dx, dy) = *rng.pick(&open_dirs);
                    let half_width = (size.x / Fixed::from_num(2)).floor();
                    let nudge = half_width.max(Fixed::from_num(8));
                    new_pos = original
                        + Vec2Fixed::new(Fixed::from_num(dx) * nudge, Fixed::from_num(dy) * nudge);
                }
                agent.clear_path();
                agent.stuck_counter = 0;
                agent.position = new_pos;
                return MoveOutcome {
                    moved: true,
                    blocked_by: None,
                };
            }
        }
    }

    agent.position = new_pos;

    MoveOutcome {
        moved,
        blocked_by: if moved { None } else { blocked_by },
    }
}

/// Ring-search outward for the nearest spot that is walkable and not
/// inside a blocking tile. Radius is bounded; `None` if nothing opens up.
fn find_rescue_spot(agent: &Agent, map: &TileMap, obstacles: &ObstacleSet) -> Option<Vec2Fixed> {
    let ts = map.tile_size();
    for radius in 1..=STUCK_RESCUE_MAX_RADIUS_TILES {
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                if dx.abs() != radius && dy.abs() != radius {
                    continue; // only the ring edge
                }
                let candidate = agent.position
                    + Vec2Fixed::new(Fixed::from_num(dx) * ts, Fixed::from_num(dy) * ts);
                let walk = is_position_walkable(
                    candidate,
                    agent.size,
                    map,
                    Some(agent.id),
                    agent.kind.side(),
                    obstacles,
                );
                if walk.walkable && !tile_blocks_at(map, candidate) {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

/// Request a fresh path when the cache is exhausted and the target is
/// farther than the arrival threshold.
fn acquire_path_if_needed(
    agent: &mut Agent,
    intended: Vec2Fixed,
    map: &TileMap,
    obstacles: &ObstacleSet,
) {
    let needs_path = match &agent.path {
        None => true,
        Some(path) => !path.has_remaining(),
    };
    if !needs_path {
        return;
    }

    if agent.position.distance(intended) > ARRIVAL_THRESHOLD {
        let occupied = obstacles.occupied_tiles(map, Some(agent.id));
        match find_path(agent.center(), intended, map, &occupied) {
            Some(nodes) if !nodes.is_empty() => {
                agent.path = Some(PathCache {
                    nodes: smooth_path(nodes, map),
                    cursor: 0,
                });
            }
            _ => agent.clear_path(),
        }
    } else {
        agent.clear_path();
    }
}

/// Pick the tick's immediate sub-target from the waypoint cache,
/// advancing the cursor on arrival. Falls back to the raw intended
/// target once the path is spent.
fn follow_waypoints(agent: &mut Agent, intended: Vec2Fixed) -> Vec2Fixed {
    let size = agent.size;
    let position = agent.position;
    let waypoint_tolerance = ARRIVAL_THRESHOLD * fixed_ratio(12, 10);

    let mut target = intended;
    let mut drop_path = false;

    if let Some(path) = agent.path.as_mut() {
        if path.has_remaining() {
            let node_tl = node_top_left(path.nodes[path.cursor], size);
            target = node_tl;
            if position.distance(node_tl) < waypoint_tolerance {
                path.cursor += 1;
                if path.has_remaining() {
                    target = node_top_left(path.nodes[path.cursor], size);
                } else {
                    target = intended;
                    drop_path = true;
                }
            }
        }
    }
    if drop_path {
        agent.clear_path();
    }
    target
}

/// Make sure the next cached waypoint is still walkable for the agent's
/// bounding box (walls get shot open and agents wander); skip ahead to
/// the first valid node, or clear the cache to force a replan.
fn revalidate_path(agent: &mut Agent, map: &TileMap, obstacles: &ObstacleSet) {
    let Some(path) = agent.path.as_ref() else { return };
    if !path.has_remaining() {
        return;
    }

    let size = agent.size;
    let side = agent.kind.side();
    let ignore = Some(agent.id);

    let mut valid_index = None;
    for i in path.cursor..path.nodes.len() {
        let node_tl = node_top_left(path.nodes[i], size);
        let walk: Walkability = is_position_walkable(node_tl, size, map, ignore, side, obstacles);
        if walk.walkable {
            valid_index = Some(i);
            break;
        }
    }

    match valid_index {
        Some(i) => {
            if let Some(path) = agent.path.as_mut() {
                path.cursor = i;
            }
        }
        None => agent.clear_path(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::AgentKind;
    use crate::constants::AGENT_SIZE;
    use crate::tilemap::{TileKind, TileMap};

    fn v(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    fn open_map(size: u32) -> TileMap {
        TileMap::filled(size, size, TileKind::Grass)
    }

    fn walker(id: EntityId, pos: Vec2Fixed) -> Agent {
        let mut agent = Agent::base(id, AgentKind::Enemy, pos, 50);
        agent.speed = Fixed::from_num(2);
        agent
    }

    #[test]
    fn test_walks_toward_target() {
        let map = open_map(20);
        let mut agent = walker(1, v(30, 30));
        let mut rng = GameRng::from_seed(1);

        let outcome = advance_agent(
            &mut agent,
            Some(v(100, 30)),
            &map,
            &ObstacleSet::default(),
            &mut rng,
            1,
        );

        assert!(outcome.moved);
        assert!(agent.position.x > Fixed::from_num(30));
        // Waypoints are tile centers, so y may drift a fraction.
        assert!((agent.position.y - Fixed::from_num(30)).abs() < Fixed::from_num(2));
        assert!(agent.last_movement_vector.x > Fixed::ZERO);
    }

    #[test]
    fn test_no_target_clears_path_and_stays() {
        let map = open_map(10);
        let mut agent = walker(1, v(30, 30));
        agent.path = Some(PathCache {
            nodes: vec![v(50, 50)],
            cursor: 0,
        });
        let mut rng = GameRng::from_seed(1);

        let outcome = advance_agent(&mut agent, None, &map, &ObstacleSet::default(), &mut rng, 1);

        assert!(!outcome.moved);
        assert!(agent.path.is_none());
        assert_eq!(agent.position, v(30, 30));
    }

    #[test]
    fn test_slides_along_wall() {
        // Wall row directly below; a southeast push should still make
        // eastward progress.
        let mut map = open_map(20);
        for x in 0..20 {
            map.set_kind(x, 4, TileKind::Wall);
        }
        // Tile row 4 spans y 56..70; stand just above it.
        let start = Vec2Fixed::new(Fixed::from_num(30), Fixed::from_num(56) - AGENT_SIZE);
        let mut agent = walker(1, start);
        let mut rng = GameRng::from_seed(1);

        let target = start + v(40, 40);
        let outcome = advance_agent(
            &mut agent,
            Some(target),
            &map,
            &ObstacleSet::default(),
            &mut rng,
            1,
        );

        assert!(outcome.moved);
        assert!(agent.position.x > start.x, "should slide east");
        assert_eq!(agent.position.y, start.y, "wall must stop southward part");
    }

    #[test]
    fn test_arrival_snaps_exact_remaining() {
        let map = open_map(20);
        let start = v(30, 30);
        let mut agent = walker(1, start);
        agent.speed = Fixed::from_num(5);
        let mut rng = GameRng::from_seed(1);

        // Three pixels away, inside the arrival threshold.
        let target = start + v(3, 0);
        let outcome = advance_agent(
            &mut agent,
            Some(target),
            &map,
            &ObstacleSet::default(),
            &mut rng,
            1,
        );

        assert!(outcome.moved);
        assert_eq!(agent.position, target, "must not overshoot");
    }

    #[test]
    fn test_embedded_in_wall_rescue() {
        // An agent inside a wall tile past the stuck threshold
        // relocates to the nearest walkable tile.
        let mut map = open_map(20);
        map.set_kind(5, 5, TileKind::Wall);
        let inside_wall = v(72, 72); // tile (5,5) spans 70..84
        let mut agent = walker(1, inside_wall);
        agent.stuck_counter = STUCK_TIMEOUT_TICKS / 2 + 1;
        let mut rng = GameRng::from_seed(1);

        let outcome = advance_agent(
            &mut agent,
            Some(v(140, 140)),
            &map,
            &ObstacleSet::default(),
            &mut rng,
            1,
        );

        assert!(!outcome.moved);
        assert_eq!(agent.stuck_counter, 0);
        assert!(agent.path.is_none());
        let coords = map.tile_coords_of(agent.position);
        assert_ne!(coords, (5, 5), "must leave the wall tile");
        assert!(map.is_traversable(coords.0, coords.1));
    }

    #[test]
    fn test_blocked_by_agent_reports_id() {
        // Corridor one tile high so the mover cannot route around.
        let mut map = open_map(20);
        for x in 0..20 {
            map.set_kind(x, 1, TileKind::Wall);
            map.set_kind(x, 3, TileKind::Wall);
        }
        let mover = walker(1, v(30, 30));
        let blocker = walker(2, v(42, 30));

        let mut agents = crate::components::AgentStorage::new();
        agents.insert(mover.clone());
        agents.insert(blocker);
        let obstacles = ObstacleSet::snapshot(&agents, &[]);

        let mut agent = mover;
        let mut rng = GameRng::from_seed(1);
        let outcome = advance_agent(
            &mut agent,
            Some(v(60, 30)),
            &map,
            &obstacles,
            &mut rng,
            1,
        );

        assert!(!outcome.moved);
        assert_eq!(outcome.blocked_by, Some(2));
    }

    #[test]
    fn test_squadmate_block_forces_early_reroute() {
        let map = open_map(20);
        let mut mover = walker(1, v(30, 30));
        mover.squad_id = Some(100);
        mover.stuck_counter = STUCK_TIMEOUT_TICKS / 4; // one short of the reroute line
        mover.path = Some(PathCache {
            nodes: vec![v(63, 37)],
            cursor: 0,
        });
        // Close enough that the collision buffer already overlaps: the
        // crowding counter accumulates instead of resetting.
        let mut blocker = walker(2, v(40, 30));
        blocker.squad_id = Some(100);

        let mut agents = crate::components::AgentStorage::new();
        agents.insert(mover.clone());
        agents.insert(blocker);
        let obstacles = ObstacleSet::snapshot(&agents, &[]);

        let mut rng = GameRng::from_seed(1);
        let outcome = advance_agent(
            &mut mover,
            Some(v(60, 30)),
            &map,
            &obstacles,
            &mut rng,
            1,
        );

        assert!(!outcome.moved);
        assert!(mover.path.is_none(), "contested corridor must be replanned");
    }

    #[test]
    fn test_position_clamped_to_map() {
        let map = open_map(10);
        let mut agent = walker(1, v(1, 1));
        agent.speed = Fixed::from_num(5);
        let mut rng = GameRng::from_seed(1);

        advance_agent(
            &mut agent,
            Some(v(-50, -50)),
            &map,
            &ObstacleSet::default(),
            &mut rng,
            1,
        );

        assert!(agent.position.x >= Fixed::ZERO);
        assert!(agent.position.y >= Fixed::ZERO);
    }

    #[test]
    fn test_waypoint_cursor_advances() {
        let map = open_map(20);
        let start = v(30, 30);
        let mut agent = walker(1, start);
        // First node is within the waypoint tolerance, second is far.
        let near = agent.center() + v(2, 0);
        agent.path = Some(PathCache {
            nodes: vec![near, v(150, 35)],
            cursor: 0,
        });
        let mut rng = GameRng::from_seed(1);

        advance_agent(
            &mut agent,
            Some(v(200, 35)),
            &map,
            &ObstacleSet::default(),
            &mut rng,
            1,
        );

        let path = agent.path.expect("path retained");
        assert_eq!(path.cursor, 1, "near node should be consumed");
    }

    #[test]
    fn test_stationary_agent_zeroes_movement_vector() {
        let map = open_map(10);
        let mut agent = walker(1, v(30, 30));
        agent.last_movement_vector = Vec2Fixed::SOUTH;
        let mut rng = GameRng::from_seed(1);

        // Target underneath our feet: no movement at all.
        advance_agent(
            &mut agent,
            Some(v(30, 30)),
            &map,
            &ObstacleSet::default(),
            &mut rng,
            1,
        );

        assert_eq!(agent.last_movement_vector, Vec2Fixed::ZERO);
    }
}
