//! Player movement and shooting.
//!
//! The player is the one agent driven by input intent rather than AI.
//! Movement is axis-separated against the walkability test like
//! everyone else's, but never pathfinds; the shell points, the player
//! walks.

use crate::collision::{is_position_walkable, ObstacleSet};
use crate::components::{Agent, Side};
use crate::constants::{
    BULLET_SIZE, GUNSHOT_VOLUME, PLAYER_BULLET_DAMAGE_MAX, PLAYER_BULLET_DAMAGE_MIN,
    PLAYER_BULLET_MAX_TRAVEL, PLAYER_BULLET_SPEED, PLAYER_SHOOT_COOLDOWN_TICKS,
};
use crate::events::{AudioCue, TickEvents};
use crate::math::{Fixed, Vec2Fixed};
use crate::projectile::Bullet;
use crate::rng::GameRng;
use crate::tilemap::TileMap;

/// Per-tick movement intent: one bit per direction, diagonals allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveIntent {
    /// Move up (negative y).
    pub up: bool,
    /// Move down.
    pub down: bool,
    /// Move left.
    pub left: bool,
    /// Move right.
    pub right: bool,
}

impl MoveIntent {
    /// Normalized direction vector for this intent; zero when idle.
    #[must_use]
    pub fn direction(self) -> Vec2Fixed {
        let mut dir = Vec2Fixed::ZERO;
        if self.up {
            dir.y = dir.y - Fixed::ONE;
        }
        if self.down {
            dir.y = dir.y + Fixed::ONE;
        }
        if self.left {
            dir.x = dir.x - Fixed::ONE;
        }
        if self.right {
            dir.x = dir.x + Fixed::ONE;
        }
        dir.normalize()
    }
}

/// Resolve one tick of player movement.
///
/// X and Y resolve independently so walls are slid along rather than
/// stopping the player dead. Also maintains the movement-direction
/// history that orients teammate formations, and the stationary-tick
/// counter.
pub fn update_player_movement(
    agent: &mut Agent,
    intent: MoveIntent,
    map: &TileMap,
    obstacles: &ObstacleSet,
) {
    let original = agent.position;
    let direction = intent.direction();

    if direction != Vec2Fixed::ZERO {
        agent.last_movement_vector = direction;
        if let Some(pilot) = agent.pilot.as_mut() {
            pilot.push_direction(direction);
        }

        let step = direction * agent.speed;
        let potential = agent.position + step;

        let x_probe = Vec2Fixed::new(potential.x, agent.position.y);
        if is_position_walkable(x_probe, agent.size, map, Some(agent.id), Side::Friendly, obstacles)
            .walkable
        {
            agent.position.x = potential.x;
        }
        let y_probe = Vec2Fixed::new(agent.position.x, potential.y);
        if is_position_walkable(y_probe, agent.size, map, Some(agent.id), Side::Friendly, obstacles)
            .walkable
        {
            agent.position.y = potential.y;
        }
    } else {
        agent.last_movement_vector = Vec2Fixed::ZERO;
    }

    let max_x = map.pixel_width() - agent.size.x;
    let max_y = map.pixel_height() - agent.size.y;
    agent.position.x = agent.position.x.clamp(Fixed::ZERO, max_x);
    agent.position.y = agent.position.y.clamp(Fixed::ZERO, max_y);

    if let Some(pilot) = agent.pilot.as_mut() {
        if agent.position == original {
            pilot.stationary_ticks += 1;
        } else {
            pilot.stationary_ticks = 0;
        }
    }
}

/// Fire at a world point, honoring the shot cooldown.
///
/// No prediction here: the shell aims where the player clicked.
pub fn player_shoot(
    agent: &mut Agent,
    aim_point: Vec2Fixed,
    tick: u64,
    rng: &mut GameRng,
    events: &mut TickEvents,
) -> Option<Bullet> {
    if tick.saturating_sub(agent.last_shot_tick) < PLAYER_SHOOT_COOLDOWN_TICKS {
        return None;
    }

    let center = agent.center();
    let to_target = aim_point - center;
    let dist = to_target.length();
    let velocity = if dist > Fixed::ZERO {
        to_target * (PLAYER_BULLET_SPEED / dist)
    } else {
        Vec2Fixed::ZERO
    };

    let damage = rng.roll_range(PLAYER_BULLET_DAMAGE_MIN, PLAYER_BULLET_DAMAGE_MAX);
    if damage == 0 {
        return None;
    }

    agent.last_shot_tick = tick;
    events.audio.push(AudioCue::PlayerShot {
        volume: GUNSHOT_VOLUME,
    });

    let half = BULLET_SIZE / Fixed::from_num(2);
    Some(Bullet {
        position: Vec2Fixed::new(center.x - half, center.y - half),
        velocity,
        owner: agent.id,
        owner_side: Side::Friendly,
        damage,
        max_travel: PLAYER_BULLET_MAX_TRAVEL,
        traveled: Fixed::ZERO,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AgentKind, PlayerState};
    use crate::constants::PLAYER_SPEED;
    use crate::tilemap::TileKind;

    fn v(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    fn player_at(pos: Vec2Fixed) -> Agent {
        let mut agent = Agent::base(1, AgentKind::Player, pos, 100);
        agent.speed = PLAYER_SPEED;
        agent.pilot = Some(PlayerState::default());
        agent
    }

    fn open_map() -> TileMap {
        TileMap::filled(20, 20, TileKind::Grass)
    }

    #[test]
    fn test_moves_along_intent() {
        let map = open_map();
        let mut agent = player_at(v(100, 100));

        update_player_movement(
            &mut agent,
            MoveIntent {
                right: true,
                ..Default::default()
            },
            &map,
            &ObstacleSet::default(),
        );

        assert!(agent.position.x > Fixed::from_num(100));
        assert_eq!(agent.position.y, Fixed::from_num(100));
        assert_eq!(agent.last_movement_vector.x, Fixed::ONE);
        assert_eq!(agent.pilot.as_ref().unwrap().stationary_ticks, 0);
        assert_eq!(agent.pilot.as_ref().unwrap().movement_history.len(), 1);
    }

    #[test]
    fn test_diagonal_is_normalized() {
        let map = open_map();
        let mut agent = player_at(v(100, 100));

        update_player_movement(
            &mut agent,
            MoveIntent {
                right: true,
                down: true,
                ..Default::default()
            },
            &map,
            &ObstacleSet::default(),
        );

        let moved = agent.position - v(100, 100);
        let epsilon = Fixed::from_num(1) / Fixed::from_num(100);
        assert!((moved.length() - PLAYER_SPEED).abs() < epsilon, "no diagonal speed boost");
    }

    #[test]
    fn test_idle_counts_stationary_ticks() {
        let map = open_map();
        let mut agent = player_at(v(100, 100));

        for _ in 0..5 {
            update_player_movement(&mut agent, MoveIntent::default(), &map, &ObstacleSet::default());
        }

        assert_eq!(agent.pilot.as_ref().unwrap().stationary_ticks, 5);
        assert_eq!(agent.last_movement_vector, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_wall_stops_one_axis_only() {
        let mut map = open_map();
        for x in 0..20 {
            map.set_kind(x, 9, TileKind::Wall); // row y 126..140
        }
        let start = Vec2Fixed::new(Fixed::from_num(100), Fixed::from_num(126) - crate::constants::AGENT_SIZE);
        let mut agent = player_at(start);

        update_player_movement(
            &mut agent,
            MoveIntent {
                right: true,
                down: true,
                ..Default::default()
            },
            &map,
            &ObstacleSet::default(),
        );

        assert!(agent.position.x > start.x, "slides east along the wall");
        assert_eq!(agent.position.y, start.y, "wall blocks south");
    }

    #[test]
    fn test_shoot_rolls_damage_and_respects_cooldown() {
        let mut agent = player_at(v(100, 100));
        let mut rng = GameRng::from_seed(4);
        let mut events = TickEvents::default();

        let bullet = player_shoot(&mut agent, v(300, 100), 100, &mut rng, &mut events)
            .expect("cooldown clear");
        assert!((PLAYER_BULLET_DAMAGE_MIN..=PLAYER_BULLET_DAMAGE_MAX).contains(&bullet.damage));
        assert!(bullet.velocity.x > Fixed::ZERO);
        assert_eq!(events.audio.len(), 1);

        // Immediately again: blocked by cooldown, no cue.
        let again = player_shoot(&mut agent, v(300, 100), 101, &mut rng, &mut events);
        assert!(again.is_none());
        assert_eq!(events.audio.len(), 1);
    }
}
