//! Controller for independent (non-squad) enemies.
//!
//! Bosses and the commander roam solo: a plain patrol/engage state
//! machine with no formation. Detection, firing, evasion, and stuck
//! recovery reuse the same machinery as squad members; only the
//! destination selection differs.

use crate::collision::ObstacleSet;
use crate::components::{Agent, AgentKind, AgentStorage, EntityId, Side, TargetView};
use crate::constants::{
    ARRIVAL_THRESHOLD, COMPASS_16, SQUAD_PATROL_IDLE_TICKS, SQUAD_PATROL_MAX_DISTANCE,
    STUCK_TIMEOUT_TICKS,
};
use crate::events::TickEvents;
use crate::math::{fixed_ratio, Fixed, Vec2Fixed};
use crate::movement::advance_agent;
use crate::pathfinding::has_line_of_sight;
use crate::projectile::Bullet;
use crate::rng::GameRng;
use crate::squad::{enemy_evasion_tick, shot_cue, AlertState, EnemyPhase};
use crate::tilemap::TileKind;

/// Percent chance an eligible patrol refresh actually repicks, so solo
/// enemies don't thrash their destination every tick.
const PATROL_REPICK_CHANCE_PERCENT: u32 = 30;

/// Advance one tick for every living non-squad enemy.
pub fn update_independents(
    agents: &mut AgentStorage,
    obstacles: &mut ObstacleSet,
    friendly_targets: &[TargetView],
    phase: &EnemyPhase<'_>,
    alert: &mut AlertState,
    rng: &mut GameRng,
    bullets: &mut Vec<Bullet>,
    events: &mut TickEvents,
) {
    let solo_ids: Vec<EntityId> = {
        let mut ids: Vec<EntityId> = agents
            .iter()
            .filter(|a| a.kind == AgentKind::Enemy && a.squad_id.is_none() && a.is_alive())
            .map(|a| a.id)
            .collect();
        ids.sort_unstable();
        ids
    };

    for id in solo_ids {
        let Some(agent) = agents.get_mut(id) else { continue };

        if enemy_evasion_tick(agent, phase.map, obstacles, rng, phase.tick) {
            continue;
        }

        let engaged = acquire_and_engage(agent, friendly_targets, phase, alert, rng, bullets, events);
        if !engaged {
            refresh_solo_patrol(agent, phase, rng);
        }

        let destination = agent.target_position.or(agent.patrol_target);
        let outcome = advance_agent(agent, destination, phase.map, obstacles, rng, phase.tick);
        obstacles.update_position(agent.id, agent.position);

        if outcome.moved {
            agent.stuck_counter = 0;
        } else if destination.is_some() {
            agent.stuck_counter += 1;
        }
        if agent.stuck_counter >= STUCK_TIMEOUT_TICKS {
            agent.stuck_counter = 0;
            agent.clear_path();
            agent.patrol_target = None;
        }
    }
}

/// Detection plus firing. Returns `true` when a target is engaged.
fn acquire_and_engage(
    agent: &mut Agent,
    friendly_targets: &[TargetView],
    phase: &EnemyPhase<'_>,
    alert: &mut AlertState,
    rng: &mut GameRng,
    bullets: &mut Vec<Bullet>,
    events: &mut TickEvents,
) -> bool {
    let mut closest: Option<(TargetView, Fixed)> = None;
    let mut best = agent.detection_range;

    for target in friendly_targets {
        if target.health == 0 {
            continue;
        }
        let dist = agent.position.distance(target.rect.pos);
        if dist >= best {
            continue;
        }
        if !has_line_of_sight(agent.center(), target.center(), phase.map) {
            continue;
        }
        best = dist;
        closest = Some((*target, dist));
    }

    let Some((target, dist)) = closest else {
        agent.target_entity_id = None;
        agent.target_position = None;
        return false;
    };

    if agent.target_entity_id.is_none() {
        alert.roll_sighting_bark(phase.tick, rng, events);
    }
    agent.target_entity_id = Some(target.id);
    agent.target_position = Some(target.rect.pos);
    agent.patrol_target = None;

    let Some(variant) = agent.variant else { return true };
    let stats = phase.config.variants.get(variant);

    if dist <= agent.shoot_range
        && phase.tick.saturating_sub(agent.last_shot_tick) > stats.shoot_cooldown_ticks
    {
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
            &target,
            &profile,
            rng,
        ) {
            bullets.push(bullet);
            agent.last_shot_tick = phase.tick;
            events.audio.push(shot_cue(stats));
        }
    }

    true
}

/// Pick a fresh patrol point near the agent, on open ground inside the
/// map interior. Eligibility is gated on arrival or idling; an eligible
/// refresh only repicks some of the time, so patrols look unhurried.
fn refresh_solo_patrol(agent: &mut Agent, phase: &EnemyPhase<'_>, rng: &mut GameRng) {
    let arrived = agent
        .patrol_target
        .is_some_and(|p| agent.position.distance(p) < ARRIVAL_THRESHOLD);
    let idled = phase.tick.saturating_sub(agent.last_patrol_activity_tick)
        > SQUAD_PATROL_IDLE_TICKS / 2;

    if agent.patrol_target.is_some() && !arrived && !idled {
        return;
    }

    if agent.patrol_target.is_none() || rng.percent(PATROL_REPICK_CHANCE_PERCENT) {
        let direction = *rng.pick(&COMPASS_16);
        let distance = rng.unit() * SQUAD_PATROL_MAX_DISTANCE * fixed_ratio(3, 4);
        let candidate = agent.position + direction * distance;

        let ts = phase.map.tile_size();
        let clamped = Vec2Fixed::new(
            candidate
                .x
                .clamp(ts, phase.map.pixel_width() - ts * Fixed::from_num(2)),
            candidate
                .y
                .clamp(ts, phase.map.pixel_height() - ts * Fixed::from_num(2)),
        );

        let (tile_x, tile_y) = phase.map.tile_coords_of(clamped);
        let tile_open = phase
            .map
            .tile(tile_x, tile_y)
            .is_some_and(|t| !matches!(t.kind, TileKind::Wall | TileKind::Water));
        if tile_open {
            agent.patrol_target = Some(clamped);
            agent.clear_path();
        }
    }
    agent.last_patrol_activity_tick = phase.tick;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::math::Rect;
    use crate::sector::sectors_for_map;
    use crate::tilemap::TileMap;
    use crate::variants::{EnemyVariant, VariantTable};

    fn v(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    fn boss(id: EntityId, pos: Vec2Fixed) -> Agent {
        let table = VariantTable::builtin();
        let stats = table.get(EnemyVariant::Boss);
        let mut agent = Agent::base(id, AgentKind::Enemy, pos, stats.max_health);
        agent.variant = Some(EnemyVariant::Boss);
        agent.speed = crate::constants::ENEMY_SPEED * stats.speed_multiplier;
        agent.detection_range = stats.detection_range;
        agent.shoot_range = stats.shoot_range;
        agent
    }

    fn player_view(id: EntityId, pos: Vec2Fixed) -> TargetView {
        TargetView {
            id,
            rect: Rect::new(
                pos,
                Vec2Fixed::new(crate::constants::AGENT_SIZE, crate::constants::AGENT_SIZE),
            ),
            health: 100,
            speed: crate::constants::PLAYER_SPEED,
            last_movement_vector: Vec2Fixed::ZERO,
        }
    }

    struct Fixture {
        map: TileMap,
        config: SimConfig,
        agents: AgentStorage,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                map: TileMap::filled(60, 60, TileKind::Grass),
                config: SimConfig::default(),
                agents: AgentStorage::new(),
            }
        }

        fn tick(&mut self, tick: u64, targets: &[TargetView]) -> (Vec<Bullet>, TickEvents) {
            let sectors = sectors_for_map(&self.map);
            let mut events = TickEvents::default();
            let mut rng = GameRng::from_seed(tick);
            let mut alert = AlertState::default();
            let mut bullets = Vec::new();
            let mut obstacles = ObstacleSet::snapshot(&self.agents, &[]);
            let phase = EnemyPhase {
                map: &self.map,
                config: &self.config,
                sectors: &sectors,
                tick,
            };
            update_independents(
                &mut self.agents,
                &mut obstacles,
                targets,
                &phase,
                &mut alert,
                &mut rng,
                &mut bullets,
                &mut events,
            );
            (bullets, events)
        }
    }

    #[test]
    fn test_engages_visible_player() {
        let mut fx = Fixture::new();
        fx.agents.insert(boss(5, v(300, 300)));
        let player = player_view(1, v(400, 300));

        let (bullets, events) = fx.tick(100, &[player]);

        let agent = fx.agents.get(5).unwrap();
        assert_eq!(agent.target_entity_id, Some(1));
        assert_eq!(agent.target_position, Some(v(400, 300)));
        assert!(agent.patrol_target.is_none());
        assert!(!bullets.is_empty(), "in range and off cooldown: must fire");
        assert!(!events.audio.is_empty());
    }

    #[test]
    fn test_cooldown_blocks_repeat_fire() {
        let mut fx = Fixture::new();
        let mut agent = boss(5, v(300, 300));
        agent.last_shot_tick = 95;
        fx.agents.insert(agent);
        let player = player_view(1, v(400, 300));

        // Boss cooldown is 40 ticks; only 5 have passed.
        let (bullets, _) = fx.tick(100, &[player]);
        assert!(bullets.is_empty());
        // Target is still tracked even while the weapon cycles.
        assert_eq!(fx.agents.get(5).unwrap().target_entity_id, Some(1));
    }

    #[test]
    fn test_lost_target_returns_to_patrol() {
        let mut fx = Fixture::new();
        let mut agent = boss(5, v(300, 300));
        agent.target_entity_id = Some(1);
        agent.target_position = Some(v(400, 300));
        fx.agents.insert(agent);

        // Nobody visible anymore.
        fx.tick(200, &[]);

        let agent = fx.agents.get(5).unwrap();
        assert!(agent.target_entity_id.is_none());
        assert!(agent.target_position.is_none());
    }

    #[test]
    fn test_patrol_point_lands_on_open_interior() {
        let mut fx = Fixture::new();
        fx.agents.insert(boss(5, v(300, 300)));

        // Run with varied seeds until a patrol target appears.
        let mut seen = false;
        for tick in 1..200 {
            fx.tick(tick * 1000, &[]);
            if let Some(patrol) = fx.agents.get(5).unwrap().patrol_target {
                let (tx, ty) = fx.map.tile_coords_of(patrol);
                let tile = fx.map.tile(tx, ty).expect("patrol target inside map");
                assert!(!matches!(tile.kind, TileKind::Wall | TileKind::Water));
                assert!(patrol.x >= fx.map.tile_size());
                assert!(patrol.y >= fx.map.tile_size());
                seen = true;
                break;
            }
        }
        assert!(seen, "no patrol target picked across 200 eligible ticks");
    }

    #[test]
    fn test_stuck_timeout_clears_patrol() {
        let mut fx = Fixture::new();
        let mut agent = boss(5, v(300, 300));
        agent.speed = Fixed::ZERO; // pinned: every tick fails to move
        agent.patrol_target = Some(v(600, 600));
        agent.stuck_counter = STUCK_TIMEOUT_TICKS - 1;
        agent.last_patrol_activity_tick = 999_000; // not idle yet
        fx.agents.insert(agent);

        fx.tick(999_001, &[]);

        let agent = fx.agents.get(5).unwrap();
        assert_eq!(agent.stuck_counter, 0);
        assert!(agent.patrol_target.is_none(), "timeout abandons the destination");
    }

    #[test]
    fn test_dead_solo_enemies_are_skipped() {
        let mut fx = Fixture::new();
        let mut corpse = boss(5, v(300, 300));
        corpse.health.current = 0;
        fx.agents.insert(corpse);
        let player = player_view(1, v(310, 300));

        let (bullets, _) = fx.tick(100, &[player]);
        assert!(bullets.is_empty());
        assert!(fx.agents.get(5).unwrap().target_entity_id.is_none());
    }
}
