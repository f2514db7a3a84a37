//! World initialization and population control.
//!
//! Everything here is best-effort placement with bounded retries: a
//! spawn that finds no valid spot is logged and skipped, never fatal.
//! The population-control passes retry on their next scheduled check.

use tracing::{debug, warn};

use crate::collision::{is_position_walkable, ObstacleSet};
use crate::components::{
    Agent, AgentKind, AgentStorage, EntityId, IdAllocator, IntelItem, PlayerState, Side,
    TeammateOrders,
};
use crate::config::SimConfig;
use crate::constants::{
    AGENT_SIZE, COMPASS_16, ENEMY_SPEED, INTEL_ITEM_SIZE, PLAYER_HEALTH, PLAYER_SPEED,
    SQUAD_RESPAWN_ATTEMPTS, SQUAD_RESPAWN_MIN_PLAYER_DISTANCE, TEAMMATE_COUNT,
    TEAMMATE_DETECTION_RADIUS, TEAMMATE_HEALTH, TEAMMATE_SHOOT_RANGE, TEAMMATE_SPEED,
};
use crate::math::{Fixed, Rect, Vec2Fixed};
use crate::objectives::{Objective, ObjectiveKind};
use crate::rng::GameRng;
use crate::sector::{sector_for_position, Sector};
use crate::squad::{formation_position, FormationShape, Squad, SQUAD_COMPOSITION};
use crate::tilemap::{TileKind, TileMap};
use crate::variants::EnemyVariant;

/// Placement attempts for a single solo enemy.
const SOLO_SPAWN_ATTEMPTS: u32 = 100;
/// Placement attempts for a squad's sector focal point.
const FOCAL_POINT_ATTEMPTS: u32 = 50;
/// Minimum enemy spawn distance from the player's starting area, in tiles.
const MIN_SPAWN_DISTANCE_TILES: i32 = 15;

/// Everything `initialize_world` builds.
#[derive(Debug, Clone)]
pub struct World {
    /// All agents, player included.
    pub agents: AgentStorage,
    /// Enemy squads.
    pub squads: Vec<Squad>,
    /// Collectible intel.
    pub intel: Vec<IntelItem>,
    /// Mission objectives.
    pub objectives: Vec<Objective>,
    /// The player's id.
    pub player_id: EntityId,
}

/// Build an enemy agent of the given variant at a position.
#[must_use]
pub fn build_enemy(
    id: EntityId,
    variant: EnemyVariant,
    squad_id: Option<EntityId>,
    position: Vec2Fixed,
    config: &SimConfig,
) -> Agent {
    let stats = config.variants.get(variant);
    let mut agent = Agent::base(id, AgentKind::Enemy, position, stats.max_health);
    agent.variant = Some(variant);
    agent.squad_id = squad_id;
    agent.speed = ENEMY_SPEED * stats.speed_multiplier;
    agent.detection_range = stats.detection_range;
    agent.shoot_range = stats.shoot_range;
    agent
}

/// Place one solo enemy at a random open tile, away from the player's
/// starting area and any friendly's detection bubble.
#[must_use]
pub fn spawn_single_enemy(
    variant: EnemyVariant,
    squad_id: Option<EntityId>,
    map: &TileMap,
    config: &SimConfig,
    obstacles: &ObstacleSet,
    keep_away_from: Vec2Fixed,
    exclusion_zone: Option<Rect>,
    rng: &mut GameRng,
    ids: &mut IdAllocator,
) -> Option<Agent> {
    let ts = map.tile_size();
    let min_distance = Fixed::from_num(MIN_SPAWN_DISTANCE_TILES) * ts;
    let size = Vec2Fixed::new(AGENT_SIZE, AGENT_SIZE);

    for _ in 0..SOLO_SPAWN_ATTEMPTS {
        let tile_x = 1 + rng.index(map.width_tiles().saturating_sub(2) as usize) as i32;
        let tile_y = 1 + rng.index(map.height_tiles().saturating_sub(2) as usize) as i32;

        let Some(tile) = map.tile(tile_x, tile_y) else { continue };
        if tile.kind.blocks_movement() {
            continue;
        }

        let two = Fixed::from_num(2);
        let position = Vec2Fixed::new(
            Fixed::from_num(tile_x) * ts + (ts - AGENT_SIZE) / two,
            Fixed::from_num(tile_y) * ts + (ts - AGENT_SIZE) / two,
        );

        if let Some(zone) = exclusion_zone {
            if zone.intersects(Rect::new(position, size)) {
                continue;
            }
        }
        if position.distance(keep_away_from) <= min_distance {
            continue;
        }
        if !is_position_walkable(position, size, map, None, Side::Hostile, obstacles).walkable {
            continue;
        }

        let too_close_to_friendly = obstacles.items().iter().any(|o| {
            matches!(o.kind, Some(AgentKind::Player | AgentKind::Teammate))
                && position.distance(o.rect.pos) < TEAMMATE_DETECTION_RADIUS
        });
        if too_close_to_friendly {
            continue;
        }

        return Some(build_enemy(ids.alloc(), variant, squad_id, position, config));
    }

    warn!(?variant, "no valid spawn position found for solo enemy");
    None
}

/// Spawn a full squad anchored in a sector. Members place individually
/// (scattered) and converge on the focal point through normal patrol
/// movement.
#[must_use]
pub fn spawn_squad_in_sector(
    sector: &Sector,
    map: &TileMap,
    config: &SimConfig,
    obstacles: &ObstacleSet,
    keep_away_from: Vec2Fixed,
    exclusion_zone: Option<Rect>,
    is_guardian: bool,
    rng: &mut GameRng,
    ids: &mut IdAllocator,
) -> Option<(Squad, Vec<Agent>)> {
    let size = Vec2Fixed::new(AGENT_SIZE, AGENT_SIZE);

    let mut focal_point = None;
    for _ in 0..FOCAL_POINT_ATTEMPTS {
        let (tile_x, tile_y) = sector.random_tile(rng);
        let candidate = map.tile_center(tile_x, tile_y);
        if let Some(zone) = exclusion_zone {
            if zone.intersects(Rect::new(candidate, size)) {
                continue;
            }
        }
        if is_position_walkable(candidate, size, map, None, Side::Hostile, obstacles).walkable {
            focal_point = Some(candidate);
            break;
        }
    }
    let Some(focal_point) = focal_point else {
        warn!(sector = sector.id, "no focal point found for squad spawn");
        return None;
    };

    let squad_id = ids.alloc();
    let mut members = Vec::new();
    let mut local_obstacles = obstacles.clone();

    for &variant in &SQUAD_COMPOSITION {
        if let Some(mut member) = spawn_single_enemy(
            variant,
            Some(squad_id),
            map,
            config,
            &local_obstacles,
            keep_away_from,
            exclusion_zone,
            rng,
            ids,
        ) {
            member.sector_id = Some(sector.id);
            local_obstacles.insert_agent(&member);
            members.push(member);
        }
    }

    if members.is_empty() {
        return None;
    }

    let member_ids = members.iter().map(|m| m.id).collect();
    let shape = *rng.pick(&FormationShape::ALL);
    let mut squad = Squad::new(squad_id, member_ids, shape);
    squad.sector_id = Some(sector.id);
    squad.is_objective_guardian = is_guardian;
    squad.patrol_target = Some(focal_point);
    Some((squad, members))
}

/// Spawn a replacement squad with every member standing directly in
/// formation around a random distant anchor. All three members must fit
/// or the attempt is discarded.
#[must_use]
pub fn spawn_formation_squad(
    map: &TileMap,
    config: &SimConfig,
    obstacles: &ObstacleSet,
    player_position: Vec2Fixed,
    exclusion_zone: Option<Rect>,
    tick: u64,
    rng: &mut GameRng,
    ids: &mut IdAllocator,
) -> Option<(Squad, Vec<Agent>)> {
    let size = Vec2Fixed::new(AGENT_SIZE, AGENT_SIZE);
    let orientations = [
        Vec2Fixed::SOUTH,
        Vec2Fixed::new(Fixed::ZERO, Fixed::from_num(-1)),
        Vec2Fixed::new(Fixed::ONE, Fixed::ZERO),
        Vec2Fixed::new(Fixed::from_num(-1), Fixed::ZERO),
    ];

    for _ in 0..SQUAD_RESPAWN_ATTEMPTS {
        let tile_x = 3 + rng.index(map.width_tiles().saturating_sub(6) as usize) as i32;
        let tile_y = 3 + rng.index(map.height_tiles().saturating_sub(6) as usize) as i32;
        let anchor = map.tile_center(tile_x, tile_y);

        if anchor.distance(player_position) < SQUAD_RESPAWN_MIN_PLAYER_DISTANCE {
            continue;
        }
        if let Some(zone) = exclusion_zone {
            if zone.intersects(Rect::new(anchor, size)) {
                continue;
            }
        }

        let shape = *rng.pick(&FormationShape::ALL);
        let orientation = *rng.pick(&orientations);

        let mut placements = Vec::new();
        let mut local_obstacles = obstacles.clone();
        let mut all_fit = true;

        for (slot, &variant) in SQUAD_COMPOSITION.iter().enumerate() {
            let position = formation_position(size, anchor, orientation, slot, shape);
            if !is_position_walkable(position, size, map, None, Side::Hostile, &local_obstacles)
                .walkable
            {
                all_fit = false;
                break;
            }
            // Temporary marker so squadmates don't stack.
            let marker = Agent::base(u64::MAX - slot as u64, AgentKind::Enemy, position, 1);
            local_obstacles.insert_agent(&marker);
            placements.push((variant, position));
        }
        if !all_fit {
            continue;
        }

        let squad_id = ids.alloc();
        let members: Vec<Agent> = placements
            .into_iter()
            .map(|(variant, position)| {
                build_enemy(ids.alloc(), variant, Some(squad_id), position, config)
            })
            .collect();
        let member_ids = members.iter().map(|m| m.id).collect();

        let mut squad = Squad::new(squad_id, member_ids, shape);
        squad.orientation = orientation;
        squad.patrol_target = Some(anchor);
        squad.last_patrol_activity_tick = tick;
        debug!(squad = squad.id, "squad respawned in formation");
        return Some((squad, members));
    }

    warn!("failed to respawn squad in formation");
    None
}

/// Respawn pass: keep squad and generic-boss populations topped up.
///
/// Runs inside the enemy phase. Disabled entirely when the config's
/// respawn delay is `None`.
pub fn respawn_pass(
    agents: &mut AgentStorage,
    squads: &mut Vec<Squad>,
    map: &TileMap,
    config: &SimConfig,
    player_position: Vec2Fixed,
    exclusion_zone: Option<Rect>,
    tick: u64,
    last_respawn_tick: &mut u64,
    rng: &mut GameRng,
    ids: &mut IdAllocator,
) {
    let Some(delay) = config.respawn_delay_ticks else { return };
    if tick <= last_respawn_tick.saturating_add(delay) {
        return;
    }

    if (squads.len() as u32) < config.max_enemy_squads {
        let obstacles = ObstacleSet::snapshot(agents, &[]);
        if let Some((squad, members)) = spawn_formation_squad(
            map,
            config,
            &obstacles,
            player_position,
            exclusion_zone,
            tick,
            rng,
            ids,
        ) {
            for member in members {
                agents.insert(member);
            }
            squads.push(squad);
            *last_respawn_tick = tick;
        }
    }

    let generic_boss_count = agents
        .iter()
        .filter(|a| {
            a.is_alive()
                && a.squad_id.is_none()
                && a.variant == Some(EnemyVariant::Boss)
                && !a.is_hvt
        })
        .count() as u32;

    if generic_boss_count < config.max_generic_bosses && tick > last_respawn_tick.saturating_add(delay)
    {
        let obstacles = ObstacleSet::snapshot(agents, &[]);
        if let Some(boss) = spawn_single_enemy(
            EnemyVariant::Boss,
            None,
            map,
            config,
            &obstacles,
            player_position,
            exclusion_zone,
            rng,
            ids,
        ) {
            debug!(boss = boss.id, "generic boss respawned");
            agents.insert(boss);
            *last_respawn_tick = tick;
        }
    }
}

/// Dynamic population control: despawn non-guardian squads that drifted
/// too far from the player, and spawn fresh squads into the annulus
/// between the spawn and despawn radii. A zero squad target disables
/// the spawning half entirely.
pub fn dynamic_population_pass(
    agents: &mut AgentStorage,
    squads: &mut Vec<Squad>,
    map: &TileMap,
    config: &SimConfig,
    sectors: &[Sector],
    player_position: Vec2Fixed,
    exclusion_zone: Option<Rect>,
    rng: &mut GameRng,
    ids: &mut IdAllocator,
) {
    let ts = map.tile_size();
    let despawn_radius = Fixed::from_num(config.squad_despawn_radius_tiles) * ts;
    let spawn_radius = Fixed::from_num(config.squad_spawn_radius_tiles) * ts;

    // Despawning.
    let mut kept = Vec::with_capacity(squads.len());
    for squad in squads.drain(..) {
        if squad.is_objective_guardian {
            kept.push(squad);
            continue;
        }
        let mut centroid = Vec2Fixed::ZERO;
        let mut count = 0u32;
        for id in &squad.member_ids {
            if let Some(member) = agents.get(*id) {
                centroid = centroid + member.center();
                count += 1;
            }
        }
        if count > 0 {
            centroid = centroid * (Fixed::ONE / Fixed::from_num(count));
        }
        if count > 0 && centroid.distance(player_position) > despawn_radius {
            debug!(squad = squad.id, "despawning distant squad");
            for id in &squad.member_ids {
                agents.remove(*id);
            }
        } else {
            kept.push(squad);
        }
    }
    *squads = kept;

    // Spawning.
    let active_dynamic = squads.iter().filter(|s| !s.is_objective_guardian).count() as u32;
    if config.active_squad_limit <= active_dynamic {
        return;
    }
    let to_spawn = config.active_squad_limit - active_dynamic;

    let candidate_sectors: Vec<&Sector> = sectors
        .iter()
        .filter(|sector| {
            let dist = sector.center_px(map).distance(player_position);
            dist > spawn_radius && dist < despawn_radius
        })
        .collect();
    if candidate_sectors.is_empty() {
        return;
    }

    for _ in 0..to_spawn {
        let sector = candidate_sectors[rng.index(candidate_sectors.len())];
        let obstacles = ObstacleSet::snapshot(agents, &[]);
        if let Some((squad, members)) = spawn_squad_in_sector(
            sector,
            map,
            config,
            &obstacles,
            player_position,
            exclusion_zone,
            false,
            rng,
            ids,
        ) {
            debug!(squad = squad.id, sector = sector.id, "dynamically spawned squad");
            for member in members {
                agents.insert(member);
            }
            squads.push(squad);
        }
    }
}

/// Build the starting world: player, teammates, intel, enemy roster,
/// guardian squads, and objectives.
#[must_use]
pub fn initialize_world(
    map: &TileMap,
    config: &SimConfig,
    sectors: &[Sector],
    rng: &mut GameRng,
    ids: &mut IdAllocator,
) -> World {
    let mut agents = AgentStorage::new();
    let mut squads = Vec::new();

    let player = create_player_at_center(map, ids);
    let player_id = player.id;
    let player_center = player.center();
    agents.insert(player);

    for teammate in create_teammates(map, &agents, player_id, rng, ids) {
        agents.insert(teammate);
    }

    let intel = place_intel_items(map, config, sectors, &agents, rng, ids);

    // Solo heavies first: the commander, the HVT boss, then the
    // generic bosses.
    let obstacles = ObstacleSet::snapshot(&agents, &intel);
    let commander_id = spawn_single_enemy(
        EnemyVariant::HvBoss,
        None,
        map,
        config,
        &obstacles,
        player_center,
        None,
        rng,
        ids,
    )
    .map(|mut boss| {
        boss.is_hvt = true;
        let id = boss.id;
        agents.insert(boss);
        id
    });
    if commander_id.is_none() {
        warn!("failed to place the enemy commander; objective skipped");
    }

    let obstacles = ObstacleSet::snapshot(&agents, &intel);
    let hvt_id = spawn_single_enemy(
        EnemyVariant::Boss,
        None,
        map,
        config,
        &obstacles,
        player_center,
        None,
        rng,
        ids,
    )
    .map(|mut boss| {
        boss.is_hvt = true;
        let id = boss.id;
        agents.insert(boss);
        id
    });
    if hvt_id.is_none() {
        warn!("failed to place the HVT boss; objective skipped");
    }

    for _ in 0..config.max_generic_bosses {
        let obstacles = ObstacleSet::snapshot(&agents, &intel);
        if let Some(boss) = spawn_single_enemy(
            EnemyVariant::Boss,
            None,
            map,
            config,
            &obstacles,
            player_center,
            None,
            rng,
            ids,
        ) {
            agents.insert(boss);
        }
    }

    // One guardian squad per sector that holds an intel item.
    let mut guarded_sectors: Vec<u32> = intel
        .iter()
        .filter_map(|item| sector_for_position(item.rect.pos, map, sectors).map(|s| s.id))
        .collect();
    guarded_sectors.sort_unstable();
    guarded_sectors.dedup();

    for sector_id in guarded_sectors {
        let Some(sector) = sectors.iter().find(|s| s.id == sector_id) else { continue };
        let obstacles = ObstacleSet::snapshot(&agents, &intel);
        if let Some((squad, members)) = spawn_squad_in_sector(
            sector,
            map,
            config,
            &obstacles,
            player_center,
            None,
            true,
            rng,
            ids,
        ) {
            for member in members {
                agents.insert(member);
            }
            squads.push(squad);
        }
    }

    let objectives = create_objectives(config, commander_id, hvt_id);

    World {
        agents,
        squads,
        intel,
        objectives,
        player_id,
    }
}

/// Player spawn at the map center, scanning for open ground if the
/// center is blocked.
pub(crate) fn create_player_at_center(map: &TileMap, ids: &mut IdAllocator) -> Agent {
    let ts = map.tile_size();
    let two = Fixed::from_num(2);
    let centered = |tile_x: i32, tile_y: i32| {
        Vec2Fixed::new(
            Fixed::from_num(tile_x) * ts + (ts - AGENT_SIZE) / two,
            Fixed::from_num(tile_y) * ts + (ts - AGENT_SIZE) / two,
        )
    };
    let size = Vec2Fixed::new(AGENT_SIZE, AGENT_SIZE);
    let empty = ObstacleSet::default();
    let fits = |pos: Vec2Fixed| {
        is_position_walkable(pos, size, map, None, Side::Friendly, &empty).walkable
    };

    let mut position = centered(map.width_tiles() as i32 / 2, map.height_tiles() as i32 / 2);
    if !fits(position) {
        let mut found = false;
        'scan: for row in 0..map.height_tiles() as i32 {
            for col in 0..map.width_tiles() as i32 {
                let open_kind = map.tile(col, row).is_some_and(|t| {
                    matches!(
                        t.kind,
                        TileKind::Road | TileKind::Grass | TileKind::BuildingFloor | TileKind::Empty
                    )
                });
                if open_kind && fits(centered(col, row)) {
                    position = centered(col, row);
                    found = true;
                    break 'scan;
                }
            }
        }
        if !found {
            warn!("no walkable player spawn found; defaulting near the corner");
            position = Vec2Fixed::new(ts * two, ts * two);
        }
    }

    let mut player = Agent::base(ids.alloc(), AgentKind::Player, position, PLAYER_HEALTH);
    player.speed = PLAYER_SPEED;
    player.last_movement_vector = Vec2Fixed::SOUTH;
    player.pilot = Some(PlayerState::default());
    player
}

/// Teammates spawn on an annulus two to four tiles out from the player,
/// keeping two tiles of spacing from each other.
fn create_teammates(
    map: &TileMap,
    agents: &AgentStorage,
    player_id: EntityId,
    rng: &mut GameRng,
    ids: &mut IdAllocator,
) -> Vec<Agent> {
    let ts = map.tile_size();
    let two = Fixed::from_num(2);
    let size = Vec2Fixed::new(AGENT_SIZE, AGENT_SIZE);
    let min_spacing = ts * two;
    let player_center = agents
        .get(player_id)
        .map_or(Vec2Fixed::ZERO, Agent::center);

    let mut teammates: Vec<Agent> = Vec::with_capacity(TEAMMATE_COUNT);

    for i in 0..TEAMMATE_COUNT {
        let mut placed = None;
        let mut obstacles = ObstacleSet::snapshot(agents, &[]);
        for teammate in &teammates {
            obstacles.insert_agent(teammate);
        }

        for _ in 0..30 {
            let direction = *rng.pick(&COMPASS_16);
            let distance = min_spacing + rng.unit() * min_spacing;
            let candidate = Vec2Fixed::new(
                player_center.x - AGENT_SIZE / two + direction.x * distance,
                player_center.y - AGENT_SIZE / two + direction.y * distance,
            );

            if !is_position_walkable(candidate, size, map, None, Side::Friendly, &obstacles)
                .walkable
            {
                continue;
            }
            let crowded = teammates
                .iter()
                .any(|t| candidate.distance(t.position) < min_spacing);
            if !crowded {
                placed = Some(candidate);
                break;
            }
        }

        let position = placed.unwrap_or_else(|| {
            // Last resort: a fixed ring spot; overlap is resolved by
            // the teammates' own separation behavior.
            warn!(index = i, "teammate using fallback ring spawn");
            let direction = COMPASS_16[(i * COMPASS_16.len() / TEAMMATE_COUNT) % COMPASS_16.len()];
            Vec2Fixed::new(
                player_center.x + direction.x * min_spacing,
                player_center.y + direction.y * min_spacing,
            )
        });

        let mut teammate = Agent::base(ids.alloc(), AgentKind::Teammate, position, TEAMMATE_HEALTH);
        teammate.speed = TEAMMATE_SPEED;
        teammate.detection_range = TEAMMATE_DETECTION_RADIUS;
        teammate.shoot_range = TEAMMATE_SHOOT_RANGE;
        teammate.orders = Some(TeammateOrders::default());
        teammates.push(teammate);
    }

    teammates
}

/// Place intel items in distinct random sectors.
fn place_intel_items(
    map: &TileMap,
    config: &SimConfig,
    sectors: &[Sector],
    agents: &AgentStorage,
    rng: &mut GameRng,
    ids: &mut IdAllocator,
) -> Vec<IntelItem> {
    let ts = map.tile_size();
    let two = Fixed::from_num(2);
    let size = Vec2Fixed::new(INTEL_ITEM_SIZE, INTEL_ITEM_SIZE);

    // Shuffle sector visit order.
    let mut order: Vec<usize> = (0..sectors.len()).collect();
    for i in (1..order.len()).rev() {
        order.swap(i, rng.index(i + 1));
    }

    let mut intel = Vec::new();
    for sector_index in order {
        if intel.len() as u32 >= config.intel_to_collect {
            break;
        }
        let sector = &sectors[sector_index];

        let obstacles = ObstacleSet::snapshot(agents, &intel);
        let mut placed = false;
        for _ in 0..100 {
            let (tile_x, tile_y) = sector.random_tile(rng);
            let open = map.tile(tile_x, tile_y).is_some_and(|t| {
                !matches!(t.kind, TileKind::Wall | TileKind::Water)
            });
            if !open {
                continue;
            }
            let position = Vec2Fixed::new(
                Fixed::from_num(tile_x) * ts + (ts - INTEL_ITEM_SIZE) / two,
                Fixed::from_num(tile_y) * ts + (ts - INTEL_ITEM_SIZE) / two,
            );
            if is_position_walkable(position, size, map, None, Side::Hostile, &obstacles).walkable {
                intel.push(IntelItem {
                    id: ids.alloc(),
                    rect: Rect::new(position, size),
                    is_collected: false,
                });
                placed = true;
                break;
            }
        }
        if !placed {
            warn!(sector = sector.id, "no intel placement found in sector");
        }
    }

    if (intel.len() as u32) < config.intel_to_collect {
        warn!(
            placed = intel.len(),
            required = config.intel_to_collect,
            "failed to place all intel items"
        );
    }
    intel
}

/// Objectives derived from the spawned roster.
fn create_objectives(
    config: &SimConfig,
    commander_id: Option<EntityId>,
    hvt_id: Option<EntityId>,
) -> Vec<Objective> {
    let mut objectives = Vec::new();

    if let Some(target) = commander_id {
        objectives.push(Objective {
            id: "obj-eliminate-commander".to_owned(),
            kind: ObjectiveKind::EliminateCommander { target },
            description: "Eliminate the enemy commander".to_owned(),
            is_completed: false,
        });
    }
    if let Some(target) = hvt_id {
        objectives.push(Objective {
            id: "obj-eliminate-hvt".to_owned(),
            kind: ObjectiveKind::EliminateTarget { target },
            description: "Eliminate the HVT".to_owned(),
            is_completed: false,
        });
    }
    objectives.push(Objective {
        id: "obj-intel".to_owned(),
        kind: ObjectiveKind::CollectIntel {
            required: config.intel_to_collect,
            collected: 0,
        },
        description: format!("Collect {} intel items", config.intel_to_collect),
        is_completed: false,
    });

    objectives
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::sectors_for_map;

    fn world_fixture(seed: u64) -> (TileMap, SimConfig, Vec<Sector>, GameRng, IdAllocator) {
        let mut map = TileMap::filled(90, 90, TileKind::Grass);
        map.seal_border();
        let sectors = sectors_for_map(&map);
        (
            map,
            SimConfig::default(),
            sectors,
            GameRng::from_seed(seed),
            IdAllocator::new(),
        )
    }

    #[test]
    fn test_world_has_full_roster() {
        let (map, config, sectors, mut rng, mut ids) = world_fixture(1);
        let world = initialize_world(&map, &config, &sectors, &mut rng, &mut ids);

        let player = world.agents.get(world.player_id).expect("player exists");
        assert_eq!(player.kind, AgentKind::Player);
        assert!(player.pilot.is_some());

        let teammates = world.agents.living_ids_of_kind(AgentKind::Teammate);
        assert_eq!(teammates.len(), TEAMMATE_COUNT);

        assert_eq!(world.intel.len() as u32, config.intel_to_collect);

        // Commander + HVT + generic bosses are solo.
        let solos: Vec<_> = world
            .agents
            .iter()
            .filter(|a| a.kind == AgentKind::Enemy && a.squad_id.is_none())
            .collect();
        assert_eq!(solos.len() as u32, 2 + config.max_generic_bosses);
        assert!(solos.iter().any(|a| a.variant == Some(EnemyVariant::HvBoss)));

        // Guardian squads cover the intel sectors.
        assert!(!world.squads.is_empty());
        assert!(world.squads.iter().all(|s| s.is_objective_guardian));

        // Objectives reference real agents.
        assert!(world.objectives.len() >= 3);
        for objective in &world.objectives {
            if let ObjectiveKind::EliminateTarget { target }
            | ObjectiveKind::EliminateCommander { target } = objective.kind
            {
                assert!(world.agents.get(target).is_some());
                assert!(world.agents.get(target).unwrap().is_hvt);
            }
        }
    }

    #[test]
    fn test_world_members_spawn_on_walkable_ground() {
        let (map, config, sectors, mut rng, mut ids) = world_fixture(2);
        let world = initialize_world(&map, &config, &sectors, &mut rng, &mut ids);

        for agent in world.agents.iter() {
            let (tx, ty) = map.tile_coords_of(agent.position);
            assert!(
                map.is_traversable(tx, ty),
                "agent {} spawned inside terrain",
                agent.id
            );
        }
    }

    #[test]
    fn test_squad_members_carry_squad_and_sector() {
        let (map, config, sectors, mut rng, mut ids) = world_fixture(3);
        let world = initialize_world(&map, &config, &sectors, &mut rng, &mut ids);

        for squad in &world.squads {
            assert!(squad.sector_id.is_some());
            for id in &squad.member_ids {
                let member = world.agents.get(*id).expect("member exists");
                assert_eq!(member.squad_id, Some(squad.id));
                assert_eq!(member.sector_id, squad.sector_id);
            }
        }
    }

    #[test]
    fn test_formation_respawn_places_members_in_formation() {
        let (map, config, _, mut rng, mut ids) = world_fixture(4);
        let player_position = Vec2Fixed::new(Fixed::from_num(630), Fixed::from_num(630));

        let (squad, members) = spawn_formation_squad(
            &map,
            &config,
            &ObstacleSet::default(),
            player_position,
            None,
            50,
            &mut rng,
            &mut ids,
        )
        .expect("open map always has room");

        assert_eq!(members.len(), SQUAD_COMPOSITION.len());
        let anchor = squad.patrol_target.expect("anchor recorded");
        assert!(anchor.distance(player_position) >= SQUAD_RESPAWN_MIN_PLAYER_DISTANCE);

        // Each member sits exactly on its formation slot.
        for (slot, member) in members.iter().enumerate() {
            let expected = formation_position(
                member.size,
                anchor,
                squad.orientation,
                slot,
                squad.formation_shape,
            );
            assert_eq!(member.position, expected);
        }
        assert_eq!(squad.last_patrol_activity_tick, 50);
    }

    #[test]
    fn test_respawn_pass_disabled_by_default() {
        let (map, config, _, mut rng, mut ids) = world_fixture(5);
        let mut agents = AgentStorage::new();
        let mut squads = Vec::new();
        let mut last_respawn = 0;

        respawn_pass(
            &mut agents,
            &mut squads,
            &map,
            &config, // respawn_delay_ticks: None
            Vec2Fixed::ZERO,
            None,
            10_000,
            &mut last_respawn,
            &mut rng,
            &mut ids,
        );

        assert!(agents.is_empty());
        assert!(squads.is_empty());
    }

    #[test]
    fn test_respawn_pass_tops_up_squads() {
        let (map, mut config, _, mut rng, mut ids) = world_fixture(6);
        config.respawn_delay_ticks = Some(100);
        config.max_enemy_squads = 1;
        config.max_generic_bosses = 0;
        let mut agents = AgentStorage::new();
        let mut squads = Vec::new();
        let mut last_respawn = 0;

        respawn_pass(
            &mut agents,
            &mut squads,
            &map,
            &config,
            Vec2Fixed::ZERO,
            None,
            500,
            &mut last_respawn,
            &mut rng,
            &mut ids,
        );

        assert_eq!(squads.len(), 1);
        assert_eq!(agents.len(), SQUAD_COMPOSITION.len());
        assert_eq!(last_respawn, 500);
    }

    #[test]
    fn test_dynamic_pass_despawns_distant_squads() {
        let (map, config, sectors, mut rng, mut ids) = world_fixture(7);
        let mut agents = AgentStorage::new();

        let squad_id = ids.alloc();
        let far = Vec2Fixed::new(Fixed::from_num(1200), Fixed::from_num(1200));
        let member = build_enemy(ids.alloc(), EnemyVariant::Soldier, Some(squad_id), far, &config);
        let member_id = member.id;
        agents.insert(member);
        let mut squads = vec![Squad::new(squad_id, vec![member_id], FormationShape::Diamond)];

        // Player at the origin corner: the squad is far outside the
        // despawn radius (90 tiles = 1260 px... the diagonal is ~1700).
        dynamic_population_pass(
            &mut agents,
            &mut squads,
            &map,
            &config,
            &sectors,
            Vec2Fixed::ZERO,
            None,
            &mut rng,
            &mut ids,
        );

        assert!(squads.is_empty(), "distant squad must despawn");
        assert!(agents.get(member_id).is_none(), "members removed with it");
    }

    #[test]
    fn test_guardian_squads_never_despawn() {
        let (map, config, sectors, mut rng, mut ids) = world_fixture(8);
        let mut agents = AgentStorage::new();

        let squad_id = ids.alloc();
        let far = Vec2Fixed::new(Fixed::from_num(1200), Fixed::from_num(1200));
        let member = build_enemy(ids.alloc(), EnemyVariant::Soldier, Some(squad_id), far, &config);
        let member_id = member.id;
        agents.insert(member);
        let mut squad = Squad::new(squad_id, vec![member_id], FormationShape::Diamond);
        squad.is_objective_guardian = true;
        let mut squads = vec![squad];

        dynamic_population_pass(
            &mut agents,
            &mut squads,
            &map,
            &config,
            &sectors,
            Vec2Fixed::ZERO,
            None,
            &mut rng,
            &mut ids,
        );

        assert_eq!(squads.len(), 1);
        assert!(agents.get(member_id).is_some());
    }
}
