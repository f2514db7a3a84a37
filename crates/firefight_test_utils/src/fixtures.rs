//! Test fixtures: maps, agents, and ready-to-fight simulations.

use fixed::types::I32F32;

use firefight_core::components::{Agent, AgentKind, EntityId, TeammateOrders};
use firefight_core::config::SimConfig;
use firefight_core::constants::{
    AGENT_SIZE, ENEMY_SPEED, TEAMMATE_DETECTION_RADIUS, TEAMMATE_SHOOT_RANGE, TEAMMATE_SPEED,
};
use firefight_core::math::Vec2Fixed;
use firefight_core::simulation::Simulation;
use firefight_core::tilemap::{TileKind, TileMap};
use firefight_core::variants::{EnemyVariant, VariantTable};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: in simulation code, never use floats. This exists purely for
/// convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Shorthand fixed-point vector from integers.
#[must_use]
pub fn vec2(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::new(fixed(x), fixed(y))
}

/// An all-grass map with a sealed border, the standard arena.
#[must_use]
pub fn arena(size_tiles: u32) -> TileMap {
    let mut map = TileMap::filled(size_tiles, size_tiles, TileKind::Grass);
    map.seal_border();
    map
}

/// An arena split down the middle by a destructible wall with one gap.
#[must_use]
pub fn walled_arena(size_tiles: u32) -> TileMap {
    let mut map = arena(size_tiles);
    let mid = size_tiles as i32 / 2;
    let gap = size_tiles as i32 / 2;
    for y in 1..(size_tiles as i32 - 1) {
        if y != gap {
            map.set_kind(mid, y, TileKind::Wall);
        }
    }
    map
}

/// A fully initialized small-world simulation.
#[must_use]
pub fn small_world(seed: u64) -> Simulation {
    Simulation::new(arena(60), SimConfig::default(), seed)
}

/// A player-only simulation for hand-built scenarios.
#[must_use]
pub fn bare_world(seed: u64) -> Simulation {
    Simulation::bare(arena(60), SimConfig::default(), seed)
}

/// Build an enemy of the given variant with its stat-table numbers.
#[must_use]
pub fn enemy_fixture(id: EntityId, variant: EnemyVariant, position: Vec2Fixed) -> Agent {
    let table = VariantTable::builtin();
    let stats = table.get(variant);
    let mut agent = Agent::base(id, AgentKind::Enemy, position, stats.max_health);
    agent.variant = Some(variant);
    agent.speed = ENEMY_SPEED * stats.speed_multiplier;
    agent.detection_range = stats.detection_range;
    agent.shoot_range = stats.shoot_range;
    agent
}

/// Build a teammate with standard stats and empty orders.
#[must_use]
pub fn teammate_fixture(id: EntityId, position: Vec2Fixed) -> Agent {
    let mut agent = Agent::base(id, AgentKind::Teammate, position, 100);
    agent.speed = TEAMMATE_SPEED;
    agent.detection_range = TEAMMATE_DETECTION_RADIUS;
    agent.shoot_range = TEAMMATE_SHOOT_RANGE;
    agent.orders = Some(TeammateOrders::default());
    agent
}

/// Agent-sized square, matching every combatant's bounding box.
#[must_use]
pub fn agent_size() -> Vec2Fixed {
    Vec2Fixed::new(AGENT_SIZE, AGENT_SIZE)
}
