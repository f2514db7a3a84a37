//! Bullet advancement and collision resolution.
//!
//! Each bullet is a tiny state machine evaluated once per tick with
//! exactly four terminal outcomes: travel budget spent, left the map,
//! hit a destructible-or-not tile, or hit the first eligible agent.
//! No penetration, and never friendly fire across the owner's side.

use serde::{Deserialize, Serialize};

use crate::combat::maybe_trigger_evasion;
use crate::components::{AgentKind, AgentStorage, EntityId, Side};
use crate::constants::{BULLET_SIZE, PLAYER_BULLET_WALL_DAMAGE};
use crate::events::{DamageEvent, TickEvents};
use crate::math::{fixed_serde, Fixed, Rect, Vec2Fixed};
use crate::rng::GameRng;
use crate::tilemap::{TileKind, TileMap};

/// A bullet in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bullet {
    /// Top-left corner in world pixels.
    pub position: Vec2Fixed,
    /// Displacement per tick.
    pub velocity: Vec2Fixed,
    /// Agent that fired this bullet.
    pub owner: EntityId,
    /// Side the owner fights for; selects the eligible target set.
    pub owner_side: Side,
    /// Damage rolled once at spawn.
    pub damage: u32,
    /// Total flight budget in pixels.
    #[serde(with = "fixed_serde")]
    pub max_travel: Fixed,
    /// Distance covered so far, summed per-step.
    #[serde(with = "fixed_serde")]
    pub traveled: Fixed,
}

impl Bullet {
    /// Bounding rectangle.
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.position, Vec2Fixed::new(BULLET_SIZE, BULLET_SIZE))
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> Vec2Fixed {
        self.rect().center()
    }
}

/// Advance every bullet one tick and resolve collisions.
///
/// Tile hits: the player's bullets apply a flat structure-damage
/// constant, everyone else applies their rolled damage. Agent hits:
/// damage is floored at zero health, the victim's dodge roll fires, and
/// a victim reduced to zero has its movement and targeting state
/// cleared so the corpse stops steering.
pub fn update_bullets(
    bullets: &mut Vec<Bullet>,
    agents: &mut AgentStorage,
    map: &mut TileMap,
    player_id: EntityId,
    tick: u64,
    rng: &mut GameRng,
    events: &mut TickEvents,
) {
    let candidate_ids = agents.sorted_ids();
    let mut survivors = Vec::with_capacity(bullets.len());

    'bullets: for mut bullet in bullets.drain(..) {
        bullet.position = bullet.position + bullet.velocity;
        bullet.traveled = bullet.traveled + bullet.velocity.length();

        if bullet.traveled >= bullet.max_travel {
            continue;
        }

        if bullet.position.x < Fixed::ZERO
            || bullet.position.x > map.pixel_width()
            || bullet.position.y < Fixed::ZERO
            || bullet.position.y > map.pixel_height()
        {
            continue;
        }

        let (tile_x, tile_y) = map.tile_coords_of(bullet.center());
        if let Some(tile) = map.tile(tile_x, tile_y) {
            if matches!(tile.kind, TileKind::Wall | TileKind::Fence) {
                let structure_damage = if bullet.owner == player_id {
                    PLAYER_BULLET_WALL_DAMAGE
                } else {
                    bullet.damage
                };
                map.damage_tile(tile_x, tile_y, structure_damage);
                continue;
            }
        }

        let bullet_rect = bullet.rect();
        for &id in &candidate_ids {
            let Some(agent) = agents.get_mut(id) else { continue };
            if agent.kind.side() != bullet.owner_side.opponent() || !agent.is_alive() {
                continue;
            }
            if !bullet_rect.intersects(agent.rect()) {
                continue;
            }

            let dealt = agent.health.apply_damage(bullet.damage);
            agent.last_time_hit = tick;
            events.damage.push(DamageEvent {
                attacker: bullet.owner,
                target: id,
                amount: dealt,
            });

            if agent.kind != AgentKind::Player {
                maybe_trigger_evasion(agent, bullet.velocity, tick, rng);
            }

            if !agent.is_alive() {
                agent.clear_movement_state();
                events.deaths.push(id);
            }

            // First hit consumes the bullet.
            continue 'bullets;
        }

        survivors.push(bullet);
    }

    *bullets = survivors;
}
