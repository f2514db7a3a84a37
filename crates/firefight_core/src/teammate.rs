//! Teammate AI: formation following, threat response, and squad orders.
//!
//! Teammates resolve a single movement target per tick from a strict
//! priority ladder (evasion, hold, waypoints, commanded move, formation
//! slot) and otherwise reuse the same movement and combat machinery as
//! everyone else. Formation targets are smoothed exponentially so a
//! twitchy player doesn't whip the escort around.

use crate::collision::{is_position_walkable, ObstacleSet};
use crate::components::{
    Agent, AgentKind, AgentStorage, EntityId, Side, TargetView,
};
use crate::constants::{
    AGENT_SIZE, AI_PATIENCE_THRESHOLD, ARRIVAL_THRESHOLD, COMPASS_16, DEFEND_RADIUS_TILES,
    FORMATION_POSITION_TOLERANCE, FORMATION_TARGET_LERP_FACTOR, GUNSHOT_VOLUME,
    STUCK_TIMEOUT_TICKS, TEAMMATE_BULLET_DAMAGE_MAX, TEAMMATE_BULLET_DAMAGE_MIN,
    TEAMMATE_BULLET_MAX_TRAVEL, TEAMMATE_BULLET_SPEED, TEAMMATE_SHOOT_COOLDOWN_TICKS,
    UNDER_FIRE_DURATION_TICKS,
};
use crate::events::{AudioCue, TickEvents};
use crate::math::{fixed_ratio, Fixed, Vec2Fixed};
use crate::movement::advance_agent;
use crate::pathfinding::has_line_of_sight;
use crate::projectile::Bullet;
use crate::rng::GameRng;
use crate::squad::{formation_position, FormationShape};
use crate::tilemap::TileMap;

/// Player state the teammate controller needs: formation anchor point
/// and the smoothed facing used to orient formation offsets.
#[derive(Debug, Clone, Copy)]
pub struct PlayerSnapshot {
    /// Player center after this tick's movement.
    pub center: Vec2Fixed,
    /// Smoothed average movement direction.
    pub avg_direction: Vec2Fixed,
}

/// Advance one tick for every living teammate.
pub fn update_teammates(
    agents: &mut AgentStorage,
    obstacles: &mut ObstacleSet,
    enemy_targets: &[TargetView],
    player: &PlayerSnapshot,
    map: &TileMap,
    formation_shape: FormationShape,
    tick: u64,
    rng: &mut GameRng,
    bullets: &mut Vec<Bullet>,
    events: &mut TickEvents,
) {
    let teammate_ids = agents.living_ids_of_kind(AgentKind::Teammate);
    // Repulsion reads start-of-phase positions so the nudge is
    // symmetric rather than order-dependent.
    let phase_positions: Vec<(EntityId, Vec2Fixed)> = teammate_ids
        .iter()
        .filter_map(|id| agents.get(*id).map(|a| (a.id, a.position)))
        .collect();

    for (index, id) in teammate_ids.iter().enumerate() {
        let Some(agent) = agents.get_mut(*id) else { continue };

        if !agent.evasion.active {
            separate_from_teammates(agent, &phase_positions);
            unstick_from_terrain(agent, map, obstacles, rng);
            obstacles.update_position(agent.id, agent.position);
        }

        if run_evasion(agent, map, obstacles, rng, tick) {
            continue;
        }

        settle_hold_arrival(agent);
        acquire_and_fire(agent, enemy_targets, map, tick, rng, bullets, events);

        let final_target = resolve_movement_target(
            agent,
            player,
            index,
            teammate_ids.len(),
            formation_shape,
            map,
        );
        agent.target_position = final_target;

        let original = agent.position;
        let outcome = if let Some(target) = final_target {
            advance_agent(agent, Some(target), map, obstacles, rng, tick)
        } else {
            Default::default()
        };
        obstacles.update_position(agent.id, agent.position);

        settle_after_movement(agent, final_target, original, outcome.moved, outcome.blocked_by, obstacles, tick);
    }
}

/// Continuous pairwise repulsion: overlapping teammates push each other
/// apart proportionally to penetration depth.
fn separate_from_teammates(agent: &mut Agent, phase_positions: &[(EntityId, Vec2Fixed)]) {
    let min_dist = AGENT_SIZE * fixed_ratio(9, 10);
    for (other_id, other_pos) in phase_positions {
        if *other_id == agent.id {
            continue;
        }
        let delta = agent.position - *other_pos;
        let dist = delta.length();
        if dist > Fixed::ZERO && dist < min_dist {
            let push = fixed_ratio(1, 4) * (min_dist - dist) / min_dist;
            agent.position = agent.position + delta * (push * AGENT_SIZE / dist);
        }
    }
}

/// Embedded in terrain or overlapping something after the repulsion
/// pass: nudge a short hop in a random direction, a few tries only.
/// Still stuck afterwards is left to the movement executor's recovery.
fn unstick_from_terrain(
    agent: &mut Agent,
    map: &TileMap,
    obstacles: &ObstacleSet,
    rng: &mut GameRng,
) {
    let here = is_position_walkable(
        agent.position,
        agent.size,
        map,
        Some(agent.id),
        Side::Friendly,
        obstacles,
    );
    if here.walkable {
        return;
    }

    let hop = AGENT_SIZE * fixed_ratio(1, 2);
    for _ in 0..8 {
        let direction = *rng.pick(&COMPASS_16);
        let candidate = agent.position + direction * hop;
        let walk = is_position_walkable(
            candidate,
            agent.size,
            map,
            Some(agent.id),
            Side::Friendly,
            obstacles,
        );
        if walk.walkable {
            agent.position = candidate;
            return;
        }
    }
}

/// Teammate evasion movement; on completion the pre-evasion orders are
/// restored (holding teammates just resume holding). Returns `true`
/// when the tick was consumed.
fn run_evasion(
    agent: &mut Agent,
    map: &TileMap,
    obstacles: &mut ObstacleSet,
    rng: &mut GameRng,
    tick: u64,
) -> bool {
    if !agent.evasion.active {
        return false;
    }
    let Some(evade_target) = agent.evasion.target else {
        agent.evasion.active = false;
        return false;
    };

    advance_agent(agent, Some(evade_target), map, obstacles, rng, tick);
    obstacles.update_position(agent.id, agent.position);

    let arrived =
        agent.position.distance(evade_target) < ARRIVAL_THRESHOLD * Fixed::from_num(2);
    let expired =
        tick > agent.evasion.last_trigger_tick + UNDER_FIRE_DURATION_TICKS * 2;
    if arrived || expired {
        agent.evasion.active = false;
        agent.evasion.target = None;

        let holding = agent
            .orders
            .as_ref()
            .is_some_and(|o| o.holding_position);
        if !holding {
            agent.target_position = agent.evasion.saved_target;
            if let Some(orders) = agent.orders.as_mut() {
                orders.waypoint_queue = agent
                    .evasion
                    .saved_waypoints
                    .take()
                    .unwrap_or_default();
                orders.commanded_move_tick = agent.evasion.saved_commanded_tick;
            }
        }
        agent.evasion.saved_target = None;
        agent.evasion.saved_waypoints = None;
        agent.evasion.saved_commanded_tick = None;
        agent.clear_path();
        if let Some(orders) = agent.orders.as_mut() {
            orders.formation_anchor = None;
        }
    }
    true
}

/// A commanded hold that has reached its spot stops being a commanded
/// move (the teammate keeps holding there).
fn settle_hold_arrival(agent: &mut Agent) {
    let Some(orders) = agent.orders.as_mut() else { return };
    if !orders.holding_position || orders.commanded_move_tick.is_none() {
        return;
    }
    let Some(hold) = orders.hold_target else { return };
    if agent.position.distance(hold) <= ARRIVAL_THRESHOLD {
        orders.commanded_move_tick = None;
        agent.path = None;
    }
}

/// Threat detection and fire, mirroring enemy detection with teammate
/// stats.
fn acquire_and_fire(
    agent: &mut Agent,
    enemy_targets: &[TargetView],
    map: &TileMap,
    tick: u64,
    rng: &mut GameRng,
    bullets: &mut Vec<Bullet>,
    events: &mut TickEvents,
) {
    let mut closest: Option<(TargetView, Fixed)> = None;
    let mut best = agent.detection_range;

    for target in enemy_targets {
        if target.health == 0 {
            continue;
        }
        let dist = agent.position.distance(target.rect.pos);
        if dist >= best {
            continue;
        }
        if !has_line_of_sight(agent.center(), target.center(), map) {
            continue;
        }
        best = dist;
        closest = Some((*target, dist));
    }

    let Some((target, dist)) = closest else {
        agent.target_entity_id = None;
        return;
    };
    agent.target_entity_id = Some(target.id);

    if dist <= agent.shoot_range
        && tick.saturating_sub(agent.last_shot_tick) > TEAMMATE_SHOOT_COOLDOWN_TICKS
    {
        let profile = crate::combat::ShotProfile {
            bullet_speed: TEAMMATE_BULLET_SPEED,
            damage_min: TEAMMATE_BULLET_DAMAGE_MIN,
            damage_max: TEAMMATE_BULLET_DAMAGE_MAX,
            max_travel: TEAMMATE_BULLET_MAX_TRAVEL,
        };
        if let Some(bullet) = crate::combat::fire_at(
            agent.id,
            Side::Friendly,
            agent.center(),
            &target,
            &profile,
            rng,
        ) {
            bullets.push(bullet);
            agent.last_shot_tick = tick;
            events.audio.push(AudioCue::TeammateShot {
                volume: GUNSHOT_VOLUME * fixed_ratio(8, 10),
            });
        }
    }
}

/// The target-priority ladder. Highest first: hold position, waypoint
/// queue head, explicit commanded move, smoothed formation slot.
/// (Evasion was handled before this point.)
fn resolve_movement_target(
    agent: &mut Agent,
    player: &PlayerSnapshot,
    formation_index: usize,
    active_count: usize,
    shape: FormationShape,
    map: &TileMap,
) -> Option<Vec2Fixed> {
    let position = agent.position;
    let size = agent.size;
    let Some(orders) = agent.orders.as_mut() else {
        return None;
    };

    if orders.holding_position {
        if let Some(hold) = orders.hold_target {
            orders.formation_anchor = None;
            return if position.distance(hold) > ARRIVAL_THRESHOLD {
                Some(hold)
            } else {
                None
            };
        }
    }

    if !orders.waypoint_queue.is_empty() {
        orders.formation_anchor = None;
        let mut target = orders.waypoint_queue[0];
        if position.distance(target) <= ARRIVAL_THRESHOLD {
            let completed = orders.waypoint_queue.pop_front();
            agent.path = None;
            if let Some(&next) = orders.waypoint_queue.front() {
                target = next;
            } else if let Some(completed) = completed {
                // The last waypoint becomes a hold order.
                orders.holding_position = true;
                orders.hold_target = Some(completed);
                orders.commanded_move_tick = None;
                target = completed;
            }
        }
        return Some(target);
    }

    if orders.commanded_move_tick.is_some() {
        if let Some(target) = agent.target_position {
            orders.formation_anchor = None;
            return Some(target);
        }
    }

    // Formation: chase a smoothed anchor that exponentially approaches
    // the ideal slot, clamped inside the map.
    let ideal = formation_position(
        size,
        player.center,
        player.avg_direction,
        formation_index,
        shape,
    );
    let _ = active_count;

    let mut anchor = orders.formation_anchor.unwrap_or(position);
    anchor = anchor.lerp(ideal, FORMATION_TARGET_LERP_FACTOR);
    anchor.x = anchor.x.clamp(Fixed::ZERO, map.pixel_width() - size.x);
    anchor.y = anchor.y.clamp(Fixed::ZERO, map.pixel_height() - size.y);
    orders.formation_anchor = Some(anchor);

    if position.distance(anchor) > FORMATION_POSITION_TOLERANCE {
        Some(anchor)
    } else {
        None
    }
}

/// Post-movement bookkeeping: commanded-move completion, stuck counter
/// upkeep, and the patience rule for friendlies in the way.
fn settle_after_movement(
    agent: &mut Agent,
    final_target: Option<Vec2Fixed>,
    original: Vec2Fixed,
    moved: bool,
    blocked_by: Option<EntityId>,
    obstacles: &ObstacleSet,
    tick: u64,
) {
    if moved {
        if let Some(target) = final_target {
            let queue_empty = agent
                .orders
                .as_ref()
                .is_some_and(|o| o.waypoint_queue.is_empty());
            let holding = agent
                .orders
                .as_ref()
                .is_some_and(|o| o.holding_position);
            let commanded = agent
                .orders
                .as_ref()
                .and_then(|o| o.commanded_move_tick)
                .is_some();
            if commanded && !holding && queue_empty
                && agent.position.distance(target) <= ARRIVAL_THRESHOLD
            {
                if let Some(orders) = agent.orders.as_mut() {
                    orders.commanded_move_tick = None;
                }
                agent.path = None;
            }
        }

        let drifted = (agent.position.x - original.x).abs() > fixed_ratio(1, 10)
            || (agent.position.y - original.y).abs() > fixed_ratio(1, 10);
        if drifted {
            agent.stuck_counter = 0;
            agent.last_moved_tick = tick;
        } else if final_target.is_none() {
            agent.stuck_counter = 0;
        } else {
            agent.stuck_counter += 1;
        }
        return;
    }

    let Some(_) = final_target else {
        agent.stuck_counter = 0;
        return;
    };

    agent.stuck_counter += 1;

    if let Some(blocker) = blocked_by {
        let friendly_blocker = matches!(
            obstacles.kind_of(blocker),
            Some(AgentKind::Teammate | AgentKind::Player)
        );
        if friendly_blocker
            && agent.stuck_counter >= AI_PATIENCE_THRESHOLD / 3
            && agent.stuck_counter < STUCK_TIMEOUT_TICKS
            && !agent.evasion.active
        {
            // A friendly will move on its own; wait in place instead of
            // pathing around them.
            agent.path = None;
        }
    }

    if agent.stuck_counter >= STUCK_TIMEOUT_TICKS {
        agent.stuck_counter = 0;
        agent.path = None;
        if let Some(orders) = agent.orders.as_mut() {
            orders.formation_anchor = None;
        }

        if agent.evasion.active {
            agent.evasion.active = false;
            agent.evasion.target = None;
        } else {
            let (holding, queue_empty, commanded) = match agent.orders.as_ref() {
                Some(o) => (
                    o.holding_position,
                    o.waypoint_queue.is_empty(),
                    o.commanded_move_tick.is_some(),
                ),
                None => (false, true, false),
            };
            let idle_formation =
                !commanded && queue_empty && agent.target_entity_id.is_none();
            if !holding && !idle_formation && queue_empty && agent.target_entity_id.is_none() {
                // A commanded move that cannot complete is abandoned.
                agent.target_position = None;
                if let Some(orders) = agent.orders.as_mut() {
                    orders.commanded_move_tick = None;
                }
            }
        }
    }
}

// ============================================================================
// Orders
// ============================================================================

/// Recall: send every living teammate to its formation slot around the
/// player, clearing all other orders.
pub fn apply_recall(
    agents: &mut AgentStorage,
    player: &PlayerSnapshot,
    shape: FormationShape,
    tick: u64,
) {
    let ids = agents.living_ids_of_kind(AgentKind::Teammate);
    for (index, id) in ids.iter().enumerate() {
        let Some(agent) = agents.get_mut(*id) else { continue };
        let slot = formation_position(
            agent.size,
            player.center,
            player.avg_direction,
            index,
            shape,
        );
        agent.target_position = Some(slot);
        agent.target_entity_id = None;
        agent.path = None;
        agent.evasion.active = false;
        agent.evasion.target = None;
        if let Some(orders) = agent.orders.as_mut() {
            orders.commanded_move_tick = Some(tick);
            orders.waypoint_queue.clear();
            orders.holding_position = false;
            orders.hold_target = None;
            orders.formation_anchor = None;
        }
    }
}

/// Move order for the selected teammates, formation-relative to the
/// clicked point. Queued orders append a waypoint; plain orders replace
/// everything and hold at the destination.
pub fn apply_move_order(
    agents: &mut AgentStorage,
    selected: &[EntityId],
    destination: Vec2Fixed,
    queued: bool,
    player: &PlayerSnapshot,
    shape: FormationShape,
    tick: u64,
) {
    let living: Vec<EntityId> = agents
        .living_ids_of_kind(AgentKind::Teammate)
        .into_iter()
        .filter(|id| selected.contains(id))
        .collect();
    if living.is_empty() {
        return;
    }

    for (index, id) in living.iter().enumerate() {
        let Some(agent) = agents.get_mut(*id) else { continue };
        let slot = formation_position(
            agent.size,
            destination,
            player.avg_direction,
            index,
            shape,
        );

        let Some(orders) = agent.orders.as_mut() else { continue };
        if queued {
            orders.waypoint_queue.push_back(slot);
            if orders.waypoint_queue.len() == 1 {
                agent.target_position = Some(slot);
            }
            orders.holding_position = false;
            orders.hold_target = None;
        } else {
            agent.target_position = Some(slot);
            orders.holding_position = true;
            orders.hold_target = Some(slot);
            orders.waypoint_queue.clear();
        }
        orders.commanded_move_tick = Some(tick);
        orders.formation_anchor = None;
        agent.target_entity_id = None;
        agent.path = None;
    }
}

/// Defend order: distribute every living teammate evenly on a circle
/// around the point, each snapped to the nearest walkable spot.
pub fn apply_defend_order(
    agents: &mut AgentStorage,
    map: &TileMap,
    point: Vec2Fixed,
    radius_tiles: u32,
    tick: u64,
) {
    let ids = agents.living_ids_of_kind(AgentKind::Teammate);
    let count = ids.len().max(1);
    let radius = Fixed::from_num(radius_tiles) * map.tile_size();

    for (index, id) in ids.iter().enumerate() {
        let Some(agent) = agents.get_mut(*id) else { continue };
        let direction = COMPASS_16[(index * COMPASS_16.len() / count) % COMPASS_16.len()];
        let ideal = point + direction * radius;
        let spot = nearest_walkable_spot(ideal, agent.size, map, radius);

        agent.target_position = Some(spot);
        agent.target_entity_id = None;
        agent.path = None;
        agent.evasion.active = false;
        agent.evasion.target = None;
        if let Some(orders) = agent.orders.as_mut() {
            orders.commanded_move_tick = Some(tick);
            orders.waypoint_queue.clear();
            orders.holding_position = false;
            orders.hold_target = None;
            orders.formation_anchor = None;
        }
    }
}

/// Default defend-order ring radius, in tiles.
#[must_use]
pub const fn default_defend_radius_tiles() -> u32 {
    DEFEND_RADIUS_TILES
}

/// Spiral outward from `ideal` in one-pixel rings over the compass
/// directions until terrain accepts the spot. Only terrain matters
/// here; agents will shuffle themselves apart on arrival.
fn nearest_walkable_spot(
    ideal: Vec2Fixed,
    size: Vec2Fixed,
    map: &TileMap,
    search_radius: Fixed,
) -> Vec2Fixed {
    let empty = ObstacleSet::default();
    let fits = |pos: Vec2Fixed| {
        is_position_walkable(pos, size, map, None, Side::Friendly, &empty).walkable
    };

    if fits(ideal) {
        return ideal;
    }

    let max_r: i64 = search_radius.to_num();
    for r in 1..=max_r {
        let ring = Fixed::from_num(r);
        for direction in COMPASS_16 {
            let candidate = ideal + direction * ring;
            if fits(candidate) {
                return candidate;
            }
        }
    }
    // Nothing nearby: hand the ideal spot to pathfinding and let the
    // stuck machinery sort it out.
    ideal
}
