//! Squad coordination: formations, patrol, regrouping, and engagement.
//!
//! A squad is a handful of enemies sharing one target, one patrol
//! destination, and one formation. Members never pick their own
//! destinations; each tick the coordinator computes a focal point
//! (engaged target, regroup centroid, or patrol target), derives every
//! member's formation slot from it, and delegates the actual stepping
//! to the movement executor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collision::{is_position_walkable, ObstacleSet};
use crate::components::{Agent, AgentStorage, EntityId, Side, TargetView};
use crate::config::SimConfig;
use crate::constants::{
    ARRIVAL_THRESHOLD, ENEMY_SIGHTED_BASE_NOTE_HZ, ENEMY_SIGHTED_SOUND_CHANCE_PERCENT,
    ENEMY_SIGHTED_SOUND_COOLDOWN_TICKS, FORMATION_OFFSETS_COLUMN, FORMATION_OFFSETS_DIAMOND,
    FORMATION_OFFSETS_LINE, SQUAD_PATROL_IDLE_TICKS, SQUAD_PATROL_MAX_DISTANCE,
    SQUAD_POST_COMBAT_REGROUP_GRACE_TICKS, SQUAD_REGROUP_CHECK_INTERVAL_TICKS,
    SQUAD_REGROUP_COHESION_RADIUS, SQUAD_REGROUP_DURATION_MAX_TICKS, SQUAD_REGROUP_FIRE_RANGE,
    SQUAD_REGROUP_MAX_SPREAD, STUCK_TIMEOUT_TICKS, UNDER_FIRE_DURATION_TICKS, VOICE_SOUND_VOLUME,
};
use crate::events::{AudioCue, TickEvents};
use crate::math::{fixed_ratio, Fixed, Vec2Fixed};
use crate::movement::advance_agent;
use crate::pathfinding::has_line_of_sight;
use crate::projectile::Bullet;
use crate::rng::GameRng;
use crate::sector::Sector;
use crate::tilemap::TileMap;
use crate::variants::{EnemyVariant, ShotSound, VariantStats};

/// Named relative-offset layouts for squads and teammates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormationShape {
    /// One trailing flank plus two wings.
    #[default]
    Diamond,
    /// Line abreast.
    Line,
    /// Single file; forced while regrouping.
    Column,
}

impl FormationShape {
    /// All shapes, in cycle order.
    pub const ALL: [Self; 3] = [Self::Diamond, Self::Line, Self::Column];

    /// Base offsets for this shape, authored facing +x.
    #[must_use]
    pub const fn offsets(self) -> &'static [Vec2Fixed; 3] {
        match self {
            Self::Diamond => &FORMATION_OFFSETS_DIAMOND,
            Self::Line => &FORMATION_OFFSETS_LINE,
            Self::Column => &FORMATION_OFFSETS_COLUMN,
        }
    }

    /// Next shape in the player's formation-cycle order.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Diamond => Self::Line,
            Self::Line => Self::Column,
            Self::Column => Self::Diamond,
        }
    }
}

/// Fixed squad composition: slot index is position in this table.
pub const SQUAD_COMPOSITION: [EnemyVariant; 3] = [
    EnemyVariant::Grenadier,
    EnemyVariant::Soldier,
    EnemyVariant::Soldier,
];

/// A coordinated group of enemies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Squad {
    /// Unique id.
    pub id: EntityId,
    /// Member agent ids; order defines formation slot assignment.
    pub member_ids: Vec<EntityId>,
    /// Current patrol destination.
    pub patrol_target: Option<Vec2Fixed>,
    /// Unit vector the formation faces along.
    pub orientation: Vec2Fixed,
    /// Current formation layout.
    pub formation_shape: FormationShape,
    /// Shared engagement target.
    pub target_entity_id: Option<EntityId>,
    /// Mid-regroup flag.
    pub is_regrouping: bool,
    /// Centroid the squad is collapsing onto while regrouping.
    pub regroup_point: Option<Vec2Fixed>,
    /// Tick regrouping started.
    pub regroup_start_tick: u64,
    /// Tick of the last regroup-condition check.
    pub last_regroup_check_tick: u64,
    /// Tick of the last contact with the enemy; 0 = never.
    pub squad_alert_tick: u64,
    /// Tick of the last patrol decision.
    pub last_patrol_activity_tick: u64,
    /// Sector this squad patrols, if assigned.
    pub sector_id: Option<u32>,
    /// Guardian squads protect intel and are exempt from despawning.
    pub is_objective_guardian: bool,
}

impl Squad {
    /// A fresh squad around the given members.
    #[must_use]
    pub fn new(id: EntityId, member_ids: Vec<EntityId>, shape: FormationShape) -> Self {
        Self {
            id,
            member_ids,
            patrol_target: None,
            orientation: Vec2Fixed::SOUTH,
            formation_shape: shape,
            target_entity_id: None,
            is_regrouping: false,
            regroup_point: None,
            regroup_start_tick: 0,
            last_regroup_check_tick: 0,
            squad_alert_tick: 0,
            last_patrol_activity_tick: 0,
            sector_id: None,
            is_objective_guardian: false,
        }
    }
}

/// Rate limiting for the global "enemy sighted" bark, shared by squads
/// and independent enemies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertState {
    /// Tick of the last bark.
    pub last_sighted_sound_tick: u64,
    /// A bark already fired this tick; reset by the tick driver.
    pub fired_this_tick: bool,
}

impl AlertState {
    /// Roll the sighting bark for a freshly acquired target.
    pub fn roll_sighting_bark(&mut self, tick: u64, rng: &mut GameRng, events: &mut TickEvents) {
        if self.fired_this_tick {
            return;
        }
        if tick <= self.last_sighted_sound_tick + ENEMY_SIGHTED_SOUND_COOLDOWN_TICKS {
            return;
        }
        if !rng.percent(ENEMY_SIGHTED_SOUND_CHANCE_PERCENT) {
            return;
        }
        let jitter = rng.roll_range(0, 200) as i64 - 100;
        events.audio.push(AudioCue::EnemySighted {
            frequency_hz: (ENEMY_SIGHTED_BASE_NOTE_HZ as i64 + jitter).max(0) as u32,
            volume: VOICE_SOUND_VOLUME,
        });
        self.last_sighted_sound_tick = tick;
        self.fired_this_tick = true;
    }
}

/// Read-only per-tick context shared by the enemy controllers.
pub struct EnemyPhase<'a> {
    /// The map grid.
    pub map: &'a TileMap,
    /// Tuning knobs and variant stats.
    pub config: &'a SimConfig,
    /// Sector partition of the map.
    pub sectors: &'a [Sector],
    /// Current tick.
    pub tick: u64,
}

/// Compute a member's formation slot position.
///
/// The shape's base offset for the slot is rotated by the squad's
/// orientation and anchored at the focal point, shifted by half the
/// member's size so the member's top-left frame lands on the slot.
/// Pure function of its inputs.
#[must_use]
pub fn formation_position(
    member_size: Vec2Fixed,
    focal_point: Vec2Fixed,
    orientation: Vec2Fixed,
    slot_index: usize,
    shape: FormationShape,
) -> Vec2Fixed {
    let offsets = shape.offsets();
    let base = offsets[slot_index % offsets.len()];
    let rotated = base.rotated_by(orientation);
    let two = Fixed::from_num(2);
    Vec2Fixed::new(
        focal_point.x + rotated.x - member_size.x / two,
        focal_point.y + rotated.y - member_size.y / two,
    )
}

/// Match living members to composition slots in encounter order: the
/// first grenadier takes slot 0, the first two soldiers take slots 1
/// and 2. Members beyond the composition get no slot.
#[must_use]
pub fn assign_slots(members: &[&Agent]) -> HashMap<EntityId, usize> {
    let mut slots = HashMap::new();
    let mut grenadiers = 0usize;
    let mut soldiers = 0usize;

    for member in members {
        match member.variant {
            Some(EnemyVariant::Grenadier) if grenadiers < 1 => {
                slots.insert(member.id, 0);
                grenadiers += 1;
            }
            Some(EnemyVariant::Soldier) if soldiers < 2 => {
                slots.insert(member.id, 1 + soldiers);
                soldiers += 1;
            }
            _ => {}
        }
    }
    slots
}

/// Fallback slot for a member that missed slot assignment: the first
/// composition slot of its variant, else 0.
fn fallback_slot(variant: Option<EnemyVariant>) -> usize {
    variant
        .and_then(|v| SQUAD_COMPOSITION.iter().position(|&c| c == v))
        .unwrap_or(0)
}

/// Advance one tick for every squad.
///
/// `friendly_targets` is the snapshot of the player and living
/// teammates taken after their own movement this tick; targets are
/// resolved against it once per squad and reused for range checks and
/// firing.
pub fn update_squads(
    squads: &mut Vec<Squad>,
    agents: &mut AgentStorage,
    obstacles: &mut ObstacleSet,
    friendly_targets: &[TargetView],
    phase: &EnemyPhase<'_>,
    alert: &mut AlertState,
    rng: &mut GameRng,
    bullets: &mut Vec<Bullet>,
    events: &mut TickEvents,
) {
    prune_squads(squads, agents);

    for squad in squads.iter_mut() {
        let living: Vec<EntityId> = squad
            .member_ids
            .iter()
            .copied()
            .filter(|id| agents.get(*id).is_some_and(Agent::is_alive))
            .collect();
        if living.is_empty() {
            continue;
        }

        detect_targets(squad, &living, agents, friendly_targets, phase, alert, rng, events);

        let slot_map = {
            let members: Vec<&Agent> = living.iter().filter_map(|id| agents.get(*id)).collect();
            assign_slots(&members)
        };

        run_regroup_checks(squad, &living, agents, &slot_map, phase);

        // Resolve the engagement target once; every range and fire
        // decision below reuses this view.
        let resolved_target = squad.target_entity_id.and_then(|id| {
            friendly_targets
                .iter()
                .find(|t| t.id == id && t.health > 0)
                .copied()
        });
        if squad.target_entity_id.is_some() && resolved_target.is_none() {
            squad.target_entity_id = None;
        }

        let focal_point =
            compute_focal_point(squad, &living, agents, resolved_target.as_ref(), phase, rng, obstacles);

        step_members(
            squad,
            &living,
            &slot_map,
            focal_point,
            resolved_target.as_ref(),
            agents,
            obstacles,
            phase,
            rng,
            bullets,
            events,
        );
    }
}

/// Remove dead members from rosters, and dead squads from the list.
pub fn prune_squads(squads: &mut Vec<Squad>, agents: &AgentStorage) {
    for squad in squads.iter_mut() {
        squad
            .member_ids
            .retain(|id| agents.get(*id).is_some_and(Agent::is_alive));
    }
    squads.retain(|squad| {
        if squad.member_ids.is_empty() {
            debug!(squad = squad.id, "squad eliminated");
            false
        } else {
            true
        }
    });
}

/// Shared detection: the closest visible friendly across all members
/// becomes the squad target. Fresh contact rolls the sighting bark and
/// cancels any regroup in progress.
fn detect_targets(
    squad: &mut Squad,
    living: &[EntityId],
    agents: &AgentStorage,
    friendly_targets: &[TargetView],
    phase: &EnemyPhase<'_>,
    alert: &mut AlertState,
    rng: &mut GameRng,
    events: &mut TickEvents,
) {
    let mut closest: Option<(EntityId, Fixed)> = None;

    for id in living {
        let Some(member) = agents.get(*id) else { continue };
        for target in friendly_targets {
            if target.health == 0 {
                continue;
            }
            let dist = member.position.distance(target.rect.pos);
            if dist >= member.detection_range {
                continue;
            }
            if !has_line_of_sight(member.center(), target.center(), phase.map) {
                continue;
            }
            if closest.map_or(true, |(_, best)| dist < best) {
                closest = Some((target.id, dist));
            }
        }
    }

    match closest {
        Some((target_id, _)) => {
            if squad.target_entity_id != Some(target_id) {
                alert.roll_sighting_bark(phase.tick, rng, events);
            }
            squad.target_entity_id = Some(target_id);
            squad.squad_alert_tick = phase.tick;

            if squad.is_regrouping {
                // Contact preempts regrouping immediately.
                squad.is_regrouping = false;
                squad.regroup_point = None;
                squad.last_patrol_activity_tick = phase.tick;
            }
        }
        None => squad.target_entity_id = None,
    }
}

/// Periodic regroup entry check plus per-tick exit check.
fn run_regroup_checks(
    squad: &mut Squad,
    living: &[EntityId],
    agents: &AgentStorage,
    slot_map: &HashMap<EntityId, usize>,
    phase: &EnemyPhase<'_>,
) {
    let tick = phase.tick;

    if !squad.is_regrouping
        && tick > squad.last_regroup_check_tick + SQUAD_REGROUP_CHECK_INTERVAL_TICKS
    {
        squad.last_regroup_check_tick = tick;

        let centroid = member_centroid(living, agents);
        let mut max_spread = Fixed::ZERO;
        for id in living {
            if let Some(member) = agents.get(*id) {
                max_spread = max_spread.max(member.center().distance(centroid));
            }
        }

        let too_spread = max_spread > SQUAD_REGROUP_MAX_SPREAD;
        let post_combat = squad.target_entity_id.is_none()
            && squad.squad_alert_tick > 0
            && tick < squad.squad_alert_tick + SQUAD_POST_COMBAT_REGROUP_GRACE_TICKS
            && too_spread;

        if (too_spread && squad.target_entity_id.is_none()) || post_combat {
            squad.is_regrouping = true;
            squad.regroup_point = Some(centroid);
            squad.regroup_start_tick = tick;
            squad.formation_shape = FormationShape::Column;
            // The rally point is the current centroid, so there is no
            // meaningful approach direction; default facing applies.
            squad.orientation = Vec2Fixed::SOUTH;
            squad.target_entity_id = None;
            squad.patrol_target = None;
        }
    }

    if squad.is_regrouping {
        let Some(regroup_point) = squad.regroup_point else {
            squad.is_regrouping = false;
            return;
        };

        let mut in_position = 0usize;
        for id in living {
            let Some(member) = agents.get(*id) else { continue };
            let slot = slot_map
                .get(id)
                .copied()
                .unwrap_or_else(|| fallback_slot(member.variant));
            let spot = formation_position(
                member.size,
                regroup_point,
                squad.orientation,
                slot,
                squad.formation_shape,
            );
            if member.position.distance(spot) < SQUAD_REGROUP_COHESION_RADIUS {
                in_position += 1;
            }
        }

        let cohesion_met = in_position >= living.len().saturating_sub(1).max(1);
        let timed_out = tick > squad.regroup_start_tick + SQUAD_REGROUP_DURATION_MAX_TICKS;
        if cohesion_met || timed_out {
            squad.is_regrouping = false;
            squad.regroup_point = None;
            // Schedule a patrol refresh shortly after re-forming.
            squad.last_patrol_activity_tick =
                (tick + 100).saturating_sub(SQUAD_PATROL_IDLE_TICKS);
        }
    }
}

/// Average of member centers.
fn member_centroid(living: &[EntityId], agents: &AgentStorage) -> Vec2Fixed {
    let mut sum = Vec2Fixed::ZERO;
    let mut count = 0;
    for id in living {
        if let Some(member) = agents.get(*id) {
            sum = sum + member.center();
            count += 1;
        }
    }
    if count == 0 {
        Vec2Fixed::ZERO
    } else {
        sum * (Fixed::ONE / Fixed::from_num(count))
    }
}

/// Average of member top-left positions, the anchor used for patrol
/// fallbacks.
fn member_average_position(living: &[EntityId], agents: &AgentStorage) -> Vec2Fixed {
    let mut sum = Vec2Fixed::ZERO;
    let mut count = 0;
    for id in living {
        if let Some(member) = agents.get(*id) {
            sum = sum + member.position;
            count += 1;
        }
    }
    if count == 0 {
        Vec2Fixed::ZERO
    } else {
        sum * (Fixed::ONE / Fixed::from_num(count))
    }
}

/// Decide the squad's focal point for this tick: regroup point when
/// regrouping, the engaged target's center when fighting, otherwise the
/// patrol target (refreshing it as needed).
fn compute_focal_point(
    squad: &mut Squad,
    living: &[EntityId],
    agents: &AgentStorage,
    resolved_target: Option<&TargetView>,
    phase: &EnemyPhase<'_>,
    rng: &mut GameRng,
    obstacles: &ObstacleSet,
) -> Vec2Fixed {
    if squad.is_regrouping {
        if let Some(point) = squad.regroup_point {
            return point;
        }
    }

    if let Some(target) = resolved_target {
        let focal = target.center();
        let centroid = member_centroid(living, agents);
        let toward = (focal - centroid).normalize();
        if toward != Vec2Fixed::ZERO {
            squad.orientation = toward;
        }
        return focal;
    }

    refresh_patrol_target(squad, living, agents, phase, rng, obstacles);

    squad
        .patrol_target
        .unwrap_or_else(|| member_average_position(living, agents))
}

/// Patrol target upkeep: pick a fresh destination when there is none,
/// when the leader has arrived, or when the squad has idled too long.
fn refresh_patrol_target(
    squad: &mut Squad,
    living: &[EntityId],
    agents: &AgentStorage,
    phase: &EnemyPhase<'_>,
    rng: &mut GameRng,
    obstacles: &ObstacleSet,
) {
    let tick = phase.tick;
    let mut needs_new = false;

    match squad.patrol_target {
        None => needs_new = true,
        Some(target) => {
            let leader = living
                .iter()
                .filter_map(|id| agents.get(*id))
                .find(|m| m.variant.is_some_and(EnemyVariant::is_leaderly))
                .or_else(|| living.first().and_then(|id| agents.get(*id)));
            if let Some(leader) = leader {
                if leader.position.distance(target) < ARRIVAL_THRESHOLD * Fixed::from_num(5) {
                    needs_new = true;
                    squad.last_patrol_activity_tick = tick;
                }
            }
        }
    }

    if tick.saturating_sub(squad.last_patrol_activity_tick) > SQUAD_PATROL_IDLE_TICKS {
        needs_new = true;
    }
    if !needs_new {
        return;
    }

    let assigned_sector = squad
        .sector_id
        .and_then(|sid| phase.sectors.iter().find(|s| s.id == sid));

    if let Some(sector) = assigned_sector {
        let probe_size = living
            .first()
            .and_then(|id| agents.get(*id))
            .map_or(Vec2Fixed::ZERO, |m| m.size);
        for _ in 0..20 {
            let (tile_x, tile_y) = sector.random_tile(rng);
            let candidate = Vec2Fixed::new(
                Fixed::from_num(tile_x) * phase.map.tile_size(),
                Fixed::from_num(tile_y) * phase.map.tile_size(),
            );
            let walk = is_position_walkable(
                candidate,
                probe_size,
                phase.map,
                None,
                Side::Hostile,
                obstacles,
            );
            if walk.walkable {
                squad.patrol_target = Some(candidate);
                squad.last_patrol_activity_tick = tick;
                return;
            }
        }
        // All probes landed on blocked ground; retry next refresh.
    } else {
        let anchor = member_average_position(living, agents);
        squad.patrol_target = Some(anchor + rng.offset_within(SQUAD_PATROL_MAX_DISTANCE));
        squad.last_patrol_activity_tick = tick;
    }
}

/// Enemy-style evasion movement for one tick. Returns `true` when the
/// tick was consumed by the dodge.
pub(crate) fn enemy_evasion_tick(
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
    let expired = tick
        > agent.evasion.last_trigger_tick + UNDER_FIRE_DURATION_TICKS * 3 / 2;
    if arrived || expired {
        agent.evasion.active = false;
        agent.evasion.target = None;
        agent.evasion.saved_target = None;
        agent.clear_path();
    }
    true
}

/// Audio cue for one variant's weapon.
pub(crate) fn shot_cue(stats: &VariantStats) -> AudioCue {
    match stats.shot_sound {
        ShotSound::Rifle => AudioCue::SoldierShot {
            volume: stats.shot_volume,
        },
        ShotSound::Heavy => AudioCue::HeavyShot {
            volume: stats.shot_volume,
        },
    }
}

/// Move every member toward its formation slot and fire when allowed.
fn step_members(
    squad: &mut Squad,
    living: &[EntityId],
    slot_map: &HashMap<EntityId, usize>,
    focal_point: Vec2Fixed,
    resolved_target: Option<&TargetView>,
    agents: &mut AgentStorage,
    obstacles: &mut ObstacleSet,
    phase: &EnemyPhase<'_>,
    rng: &mut GameRng,
    bullets: &mut Vec<Bullet>,
    events: &mut TickEvents,
) {
    let tick = phase.tick;
    let ts = phase.map.tile_size();
    let half_tile = ts * fixed_ratio(1, 2);

    for id in living {
        let Some(agent) = agents.get_mut(*id) else { continue };

        if enemy_evasion_tick(agent, phase.map, obstacles, rng, tick) {
            continue;
        }

        let slot_target = match slot_map.get(id) {
            Some(&slot) => formation_position(
                agent.size,
                focal_point,
                squad.orientation,
                slot,
                squad.formation_shape,
            ),
            None => {
                let two = Fixed::from_num(2);
                Vec2Fixed::new(
                    focal_point.x - agent.size.x / two,
                    focal_point.y - agent.size.y / two,
                )
            }
        };

        let outcome = advance_agent(agent, Some(slot_target), phase.map, obstacles, rng, tick);
        obstacles.update_position(agent.id, agent.position);

        if outcome.moved {
            agent.stuck_counter = 0;
        } else if (agent.position.x - slot_target.x).abs() > half_tile
            || (agent.position.y - slot_target.y).abs() > half_tile
        {
            agent.stuck_counter += 1;
        }

        if agent.stuck_counter >= STUCK_TIMEOUT_TICKS {
            agent.stuck_counter = 0;
            agent.clear_path();
            if squad.patrol_target.is_some()
                && squad.target_entity_id.is_none()
                && !squad.is_regrouping
            {
                // Shake the shared destination loose rather than let
                // the whole squad grind against the same blockage.
                if let Some(patrol) = squad.patrol_target.as_mut() {
                    *patrol = *patrol + rng.offset_within(ts * fixed_ratio(3, 2));
                }
                squad.last_patrol_activity_tick =
                    (tick + 10).saturating_sub(SQUAD_PATROL_IDLE_TICKS);
            }
        }

        let Some(target) = resolved_target else { continue };

        // While regrouping, members only return fire at point-blank
        // range; otherwise engagement is unrestricted.
        let target_dist = agent.position.distance(target.rect.pos);
        let may_shoot = !squad.is_regrouping || target_dist < SQUAD_REGROUP_FIRE_RANGE;
        if !may_shoot || target_dist > agent.shoot_range {
            continue;
        }
        if !has_line_of_sight(agent.center(), target.center(), phase.map) {
            continue;
        }

        let Some(variant) = agent.variant else { continue };
        let stats = phase.config.variants.get(variant);
        if tick.saturating_sub(agent.last_shot_tick) <= stats.shoot_cooldown_ticks {
            continue;
        }

        let profile = crate::combat::ShotProfile {
            bullet_speed: stats.bullet_speed,
            damage_min: stats.damage_min,
            damage_max: stats.damage_max,
            max_travel: stats.bullet_max_travel,
        };
        if let Some(bullet) = crate::combat::fire_at(
            agent.id,
            Side::Hostile,
            agent.center(),
            target,
            &profile,
            rng,
        ) {
            bullets.push(bullet);
            agent.last_shot_tick = tick;
            events.audio.push(shot_cue(stats));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::AgentKind;
    use crate::math::Rect;
    use crate::sector::sectors_for_map;
    use crate::tilemap::TileKind;
    use crate::variants::VariantTable;

    fn v(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    fn enemy(id: EntityId, variant: EnemyVariant, pos: Vec2Fixed, squad: EntityId) -> Agent {
        let table = VariantTable::builtin();
        let stats = table.get(variant);
        let mut agent = Agent::base(id, AgentKind::Enemy, pos, stats.max_health);
        agent.variant = Some(variant);
        agent.squad_id = Some(squad);
        agent.speed = crate::constants::ENEMY_SPEED * stats.speed_multiplier;
        agent.detection_range = stats.detection_range;
        agent.shoot_range = stats.shoot_range;
        agent
    }

    struct Fixture {
        map: TileMap,
        config: SimConfig,
        sectors: Vec<Sector>,
        agents: AgentStorage,
        squads: Vec<Squad>,
    }

    impl Fixture {
        fn new() -> Self {
            let map = TileMap::filled(60, 60, TileKind::Grass);
            let sectors = sectors_for_map(&map);
            Self {
                map,
                config: SimConfig::default(),
                sectors,
                agents: AgentStorage::new(),
                squads: Vec::new(),
            }
        }

        fn standard_squad(&mut self, squad_id: EntityId, anchor: Vec2Fixed) -> Vec<EntityId> {
            let ids = vec![squad_id + 1, squad_id + 2, squad_id + 3];
            self.agents
                .insert(enemy(ids[0], EnemyVariant::Grenadier, anchor, squad_id));
            self.agents.insert(enemy(
                ids[1],
                EnemyVariant::Soldier,
                anchor + v(20, 0),
                squad_id,
            ));
            self.agents.insert(enemy(
                ids[2],
                EnemyVariant::Soldier,
                anchor + v(0, 20),
                squad_id,
            ));
            self.squads
                .push(Squad::new(squad_id, ids.clone(), FormationShape::Diamond));
            ids
        }

        fn tick(&mut self, tick: u64, friendly_targets: &[TargetView]) -> TickEvents {
            let mut events = TickEvents::default();
            let mut rng = GameRng::from_seed(tick);
            let mut alert = AlertState::default();
            let mut bullets = Vec::new();
            let mut obstacles = ObstacleSet::snapshot(&self.agents, &[]);
            let phase = EnemyPhase {
                map: &self.map,
                config: &self.config,
                sectors: &self.sectors,
                tick,
            };
            update_squads(
                &mut self.squads,
                &mut self.agents,
                &mut obstacles,
                friendly_targets,
                &phase,
                &mut alert,
                &mut rng,
                &mut bullets,
                &mut events,
            );
            events
        }
    }

    fn player_view(id: EntityId, pos: Vec2Fixed) -> TargetView {
        TargetView {
            id,
            rect: Rect::new(pos, Vec2Fixed::new(crate::constants::AGENT_SIZE, crate::constants::AGENT_SIZE)),
            health: 100,
            speed: crate::constants::PLAYER_SPEED,
            last_movement_vector: Vec2Fixed::ZERO,
        }
    }

    #[test]
    fn test_formation_position_is_pure() {
        let size = v(10, 10);
        let focal = v(100, 100);
        let orientation = Vec2Fixed::SOUTH;
        let a = formation_position(size, focal, orientation, 1, FormationShape::Diamond);
        let b = formation_position(size, focal, orientation, 1, FormationShape::Diamond);
        assert_eq!(a, b);
    }

    #[test]
    fn test_diamond_slots_are_distinct() {
        // Three slots, Diamond shape, focal (100,100), orientation
        // (0,1): three distinct non-overlapping positions matching the
        // offset table rotated by (0,1).
        let size = v(10, 10);
        let focal = v(100, 100);
        let orientation = Vec2Fixed::SOUTH;

        let positions: Vec<_> = (0..3)
            .map(|slot| formation_position(size, focal, orientation, slot, FormationShape::Diamond))
            .collect();

        for i in 0..3 {
            for j in (i + 1)..3 {
                let gap = positions[i].distance(positions[j]);
                assert!(gap > Fixed::from_num(10), "slots {i}/{j} overlap");
            }
        }

        // Hand-rotate the table: (x, y) * (0, 1) => (-y, x).
        for (slot, expected_offset) in FORMATION_OFFSETS_DIAMOND.iter().enumerate() {
            let expected = Vec2Fixed::new(
                focal.x - expected_offset.y - Fixed::from_num(5),
                focal.y + expected_offset.x - Fixed::from_num(5),
            );
            assert_eq!(positions[slot], expected, "slot {slot}");
        }
    }

    #[test]
    fn test_slot_assignment_by_composition() {
        let grenadier = enemy(1, EnemyVariant::Grenadier, v(0, 0), 100);
        let soldier_a = enemy(2, EnemyVariant::Soldier, v(0, 0), 100);
        let soldier_b = enemy(3, EnemyVariant::Soldier, v(0, 0), 100);
        let extra = enemy(4, EnemyVariant::Soldier, v(0, 0), 100);

        let members = vec![&soldier_a, &grenadier, &soldier_b, &extra];
        let slots = assign_slots(&members);

        assert_eq!(slots.get(&1), Some(&0), "grenadier anchors slot 0");
        assert_eq!(slots.get(&2), Some(&1));
        assert_eq!(slots.get(&3), Some(&2));
        assert_eq!(slots.get(&4), None, "composition is full");
    }

    #[test]
    fn test_detection_within_radius_engages_in_one_tick() {
        // A player one pixel inside the detection radius with clear
        // line of sight flips the squad to engaging within one tick.
        let mut fx = Fixture::new();
        let ids = fx.standard_squad(100, v(300, 300));
        let soldier_id = ids[1];
        let detection = fx.agents.get(soldier_id).unwrap().detection_range;

        let player_pos = Vec2Fixed::new(
            fx.agents.get(soldier_id).unwrap().position.x + detection - Fixed::ONE,
            fx.agents.get(soldier_id).unwrap().position.y,
        );
        let player = player_view(1, player_pos);

        fx.tick(1, &[player]);

        assert_eq!(fx.squads[0].target_entity_id, Some(1));
        assert_eq!(fx.squads[0].squad_alert_tick, 1);
    }

    #[test]
    fn test_no_detection_through_wall() {
        let mut fx = Fixture::new();
        fx.standard_squad(100, v(300, 300));
        // Solid wall column between squad and player.
        for y in 0..60 {
            fx.map.set_kind(30, y, TileKind::Wall);
        }
        let player = player_view(1, v(500, 304));

        fx.tick(1, &[player]);

        assert_eq!(fx.squads[0].target_entity_id, None);
    }

    #[test]
    fn test_dead_members_are_pruned_and_empty_squads_removed() {
        let mut fx = Fixture::new();
        let ids = fx.standard_squad(100, v(300, 300));
        for id in &ids {
            fx.agents.get_mut(*id).unwrap().health.current = 0;
        }

        fx.tick(1, &[]);

        assert!(fx.squads.is_empty());
    }

    #[test]
    fn test_spread_squad_enters_regroup() {
        let mut fx = Fixture::new();
        let ids = fx.standard_squad(100, v(100, 100));
        // Fling one member far out so spread exceeds the threshold.
        fx.agents.get_mut(ids[2]).unwrap().position = v(700, 700);
        // Move past the first check interval.
        let tick = SQUAD_REGROUP_CHECK_INTERVAL_TICKS + 1;

        fx.tick(tick, &[]);

        let squad = &fx.squads[0];
        assert!(squad.is_regrouping);
        assert!(squad.regroup_point.is_some());
        assert_eq!(squad.formation_shape, FormationShape::Column);
        assert_eq!(squad.regroup_start_tick, tick);
    }

    #[test]
    fn test_regroup_always_terminates() {
        // Regroup termination property: even with members pinned in
        // place (zero speed), the squad leaves Regrouping within the
        // maximum duration.
        let mut fx = Fixture::new();
        let ids = fx.standard_squad(100, v(100, 100));
        fx.agents.get_mut(ids[2]).unwrap().position = v(700, 700);
        for id in &ids {
            fx.agents.get_mut(*id).unwrap().speed = Fixed::ZERO;
        }

        let start = SQUAD_REGROUP_CHECK_INTERVAL_TICKS + 1;
        fx.tick(start, &[]);
        assert!(fx.squads[0].is_regrouping);

        let mut exit_tick = None;
        for tick in (start + 1)..=(start + SQUAD_REGROUP_DURATION_MAX_TICKS + 2) {
            fx.tick(tick, &[]);
            if !fx.squads[0].is_regrouping {
                exit_tick = Some(tick);
                break;
            }
        }

        let exit_tick = exit_tick.expect("regroup never ended");
        assert!(exit_tick <= start + SQUAD_REGROUP_DURATION_MAX_TICKS + 1);
    }

    #[test]
    fn test_target_preempts_regroup() {
        let mut fx = Fixture::new();
        let ids = fx.standard_squad(100, v(300, 300));
        fx.agents.get_mut(ids[2]).unwrap().position = v(900, 300);

        let start = SQUAD_REGROUP_CHECK_INTERVAL_TICKS + 1;
        fx.tick(start, &[]);
        assert!(fx.squads[0].is_regrouping);

        // A visible player appears: regroup must break immediately.
        let player = player_view(1, v(320, 320));
        fx.tick(start + 1, &[player]);

        assert!(!fx.squads[0].is_regrouping);
        assert_eq!(fx.squads[0].target_entity_id, Some(1));
    }

    #[test]
    fn test_members_fire_at_target_in_range() {
        let mut fx = Fixture::new();
        fx.standard_squad(100, v(300, 300));
        let player = player_view(1, v(340, 300));

        let mut events = TickEvents::default();
        let mut rng = GameRng::from_seed(7);
        let mut alert = AlertState::default();
        let mut bullets = Vec::new();
        let mut obstacles = ObstacleSet::snapshot(&fx.agents, &[]);
        let phase = EnemyPhase {
            map: &fx.map,
            config: &fx.config,
            sectors: &fx.sectors,
            tick: 100,
        };
        update_squads(
            &mut fx.squads,
            &mut fx.agents,
            &mut obstacles,
            &[player],
            &phase,
            &mut alert,
            &mut rng,
            &mut bullets,
            &mut events,
        );

        assert!(!bullets.is_empty(), "in-range members with LOS must fire");
        for bullet in &bullets {
            assert_eq!(bullet.owner_side, Side::Hostile);
            assert!(bullet.damage > 0);
        }
        assert!(!events.audio.is_empty(), "shots emit audio cues");
    }

    #[test]
    fn test_patrol_target_selected_in_assigned_sector() {
        let mut fx = Fixture::new();
        fx.standard_squad(100, v(100, 100));
        fx.squads[0].sector_id = Some(4);

        fx.tick(1, &[]);

        let patrol = fx.squads[0].patrol_target.expect("patrol target picked");
        let sector = fx.sectors[4];
        let (tx, ty) = fx.map.tile_coords_of(patrol);
        assert!(sector.contains_tile(tx, ty), "patrol {patrol:?} outside sector");
    }
}
