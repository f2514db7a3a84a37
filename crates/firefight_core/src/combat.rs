//! Combat math: target-lead prediction, damage rolls, bullet spawning,
//! and the shared evasive-dodge trigger.

use crate::components::{Agent, AgentKind, EntityId, Side, TargetView};
use crate::constants::{
    BULLET_SIZE, EVASIVE_COOLDOWN_TICKS, EVASIVE_DODGE_CHANCE_PERCENT, EVASIVE_STRAFE_DISTANCE,
};
use crate::math::{Fixed, Vec2Fixed};
use crate::projectile::Bullet;
use crate::rng::GameRng;

/// Fixed-point iterations of the intercept estimate.
pub const PREDICTION_ITERATIONS: u32 = 2;

/// Predict where a moving target will be when a bullet arrives.
///
/// Iterates time-to-intercept = distance / bullet speed, then re-aims
/// at `target_center + velocity * time`. Two rounds of this fixed-point
/// approximation are accurate enough at game speeds; an exact quadratic
/// solve buys nothing here. A stationary target (or a degenerate bullet
/// speed) aims at the current center.
#[must_use]
pub fn predict_target_position(
    shooter_center: Vec2Fixed,
    target: &TargetView,
    bullet_speed: Fixed,
) -> Vec2Fixed {
    let target_center = target.center();

    if target.last_movement_vector == Vec2Fixed::ZERO
        || target.speed == Fixed::ZERO
        || bullet_speed <= Fixed::ZERO
    {
        return target_center;
    }

    let velocity = target.last_movement_vector * target.speed;
    let mut predicted = target_center;

    for _ in 0..PREDICTION_ITERATIONS {
        let time_to_intercept = shooter_center.distance(predicted) / bullet_speed;
        predicted = target_center + velocity * time_to_intercept;
    }

    predicted
}

/// Everything variant- or role-specific about one shot.
#[derive(Debug, Clone, Copy)]
pub struct ShotProfile {
    /// Bullet speed in pixels per tick.
    pub bullet_speed: Fixed,
    /// Damage roll lower bound, inclusive.
    pub damage_min: u32,
    /// Damage roll upper bound, inclusive.
    pub damage_max: u32,
    /// Bullet flight budget in pixels.
    pub max_travel: Fixed,
}

/// Spawn a bullet from `shooter_center` at the predicted intercept of
/// `target`.
///
/// The damage roll happens here, once, so the value is fixed for the
/// bullet's whole flight and visible to replays. A roll of zero is
/// discarded defensively rather than spawning a no-op bullet.
#[must_use]
pub fn fire_at(
    owner: EntityId,
    owner_side: Side,
    shooter_center: Vec2Fixed,
    target: &TargetView,
    profile: &ShotProfile,
    rng: &mut GameRng,
) -> Option<Bullet> {
    let predicted = predict_target_position(shooter_center, target, profile.bullet_speed);

    let to_predicted = predicted - shooter_center;
    let dist = to_predicted.length();
    let velocity = if dist > Fixed::ZERO {
        to_predicted * (profile.bullet_speed / dist)
    } else {
        Vec2Fixed::ZERO
    };

    let damage = rng.roll_range(profile.damage_min, profile.damage_max);
    if damage == 0 {
        return None;
    }

    let half = BULLET_SIZE / Fixed::from_num(2);
    Some(Bullet {
        position: Vec2Fixed::new(shooter_center.x - half, shooter_center.y - half),
        velocity,
        owner,
        owner_side,
        damage,
        max_travel: profile.max_travel,
        traveled: Fixed::ZERO,
    })
}

/// Roll an evasive maneuver for an agent that just took a hit.
///
/// On a win the agent strafes perpendicular to the incoming bullet,
/// with a random sign per axis so the dodge direction is not
/// predictable. Teammates park their current orders for restoration
/// when the dodge ends; enemies simply drop theirs.
pub fn maybe_trigger_evasion(
    agent: &mut Agent,
    bullet_velocity: Vec2Fixed,
    tick: u64,
    rng: &mut GameRng,
) {
    if tick <= agent.evasion.last_trigger_tick + EVASIVE_COOLDOWN_TICKS {
        return;
    }
    if !rng.percent(EVASIVE_DODGE_CHANCE_PERCENT) {
        return;
    }

    agent.evasion.active = true;
    agent.evasion.last_trigger_tick = tick;

    match agent.kind {
        AgentKind::Teammate => {
            if let Some(orders) = agent.orders.as_mut() {
                orders.formation_anchor = None;
                if orders.holding_position {
                    agent.evasion.saved_target = orders.hold_target;
                    agent.evasion.saved_waypoints = None;
                    agent.evasion.saved_commanded_tick = None;
                } else {
                    agent.evasion.saved_target = agent.target_position;
                    agent.evasion.saved_waypoints = Some(orders.waypoint_queue.clone());
                    agent.evasion.saved_commanded_tick = orders.commanded_move_tick;
                }
                orders.waypoint_queue.clear();
            }
        }
        _ => {
            agent.evasion.saved_target = agent.target_position;
        }
    }

    let incoming = bullet_velocity.normalize();
    let strafe_x = if rng.coin_flip() { -incoming.y } else { incoming.y };
    let strafe_y = if rng.coin_flip() { incoming.x } else { -incoming.x };

    agent.evasion.target = Some(
        agent.position
            + Vec2Fixed::new(
                strafe_x * EVASIVE_STRAFE_DISTANCE,
                strafe_y * EVASIVE_STRAFE_DISTANCE,
            ),
    );
    agent.clear_path();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Agent, AgentKind, TeammateOrders};
    use crate::math::Rect;

    fn v(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    fn target_at(pos: Vec2Fixed, movement: Vec2Fixed, speed: i32) -> TargetView {
        TargetView {
            id: 9,
            rect: Rect::new(pos, v(10, 10)),
            health: 100,
            speed: Fixed::from_num(speed),
            last_movement_vector: movement,
        }
    }

    #[test]
    fn test_stationary_target_aims_at_center() {
        let target = target_at(v(100, 100), Vec2Fixed::ZERO, 2);
        let aim = predict_target_position(v(0, 0), &target, Fixed::from_num(3));
        assert_eq!(aim, v(105, 105));
    }

    #[test]
    fn test_moving_target_is_led() {
        let east = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
        let target = target_at(v(100, 100), east, 2);
        let aim = predict_target_position(v(0, 105), &target, Fixed::from_num(3));
        // Lead must be ahead of the current center along +x.
        assert!(aim.x > Fixed::from_num(105));
        assert_eq!(aim.y, Fixed::from_num(105));
    }

    #[test]
    fn test_prediction_is_pure() {
        let east = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
        let target = target_at(v(100, 100), east, 2);
        let a = predict_target_position(v(0, 0), &target, Fixed::from_num(3));
        let b = predict_target_position(v(0, 0), &target, Fixed::from_num(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_bullet_speed_falls_back_to_center() {
        let east = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
        let target = target_at(v(100, 100), east, 2);
        let aim = predict_target_position(v(0, 0), &target, Fixed::ZERO);
        assert_eq!(aim, v(105, 105));
    }

    #[test]
    fn test_fire_at_rolls_damage_in_range() {
        let profile = ShotProfile {
            bullet_speed: Fixed::from_num(3),
            damage_min: 7,
            damage_max: 19,
            max_travel: Fixed::from_num(364),
        };
        let target = target_at(v(100, 0), Vec2Fixed::ZERO, 0);
        let mut rng = GameRng::from_seed(5);

        for _ in 0..50 {
            let bullet = fire_at(1, Side::Friendly, v(0, 5), &target, &profile, &mut rng)
                .expect("positive damage range always spawns");
            assert!((7..=19).contains(&bullet.damage));
            assert_eq!(bullet.owner, 1);
            assert_eq!(bullet.traveled, Fixed::ZERO);
            // Velocity points toward the target at the profile speed.
            assert!(bullet.velocity.x > Fixed::ZERO);
            let speed = bullet.velocity.length();
            assert!((speed - Fixed::from_num(3)).abs() < Fixed::from_num(1) / Fixed::from_num(100));
        }
    }

    #[test]
    fn test_evasion_respects_cooldown() {
        let mut agent = Agent::base(1, AgentKind::Enemy, v(50, 50), 50);
        agent.evasion.last_trigger_tick = 100;
        let mut rng = GameRng::from_seed(1);

        maybe_trigger_evasion(&mut agent, Vec2Fixed::SOUTH, 101, &mut rng);
        assert!(!agent.evasion.active);
    }

    #[test]
    fn test_evasion_strafes_perpendicular() {
        let mut rng = GameRng::from_seed(2);
        // Roll until a dodge actually triggers.
        for attempt in 0..100 {
            let mut agent = Agent::base(1, AgentKind::Enemy, v(50, 50), 50);
            maybe_trigger_evasion(
                &mut agent,
                Vec2Fixed::new(Fixed::from_num(2), Fixed::ZERO),
                1000 + attempt * 100,
                &mut rng,
            );
            if agent.evasion.active {
                let target = agent.evasion.target.expect("dodge sets a target");
                let offset = target - agent.position;
                // Incoming fire is along +x; the strafe must be pure y.
                assert_eq!(offset.x, Fixed::ZERO);
                let epsilon = Fixed::from_num(1) / Fixed::from_num(1000);
                assert!((offset.y.abs() - EVASIVE_STRAFE_DISTANCE).abs() < epsilon);
                return;
            }
        }
        panic!("dodge never triggered across 100 attempts");
    }

    #[test]
    fn test_teammate_evasion_saves_orders() {
        let mut rng = GameRng::from_seed(3);
        for attempt in 0..100 {
            let mut agent = Agent::base(1, AgentKind::Teammate, v(50, 50), 100);
            let mut orders = TeammateOrders::default();
            orders.waypoint_queue.push_back(v(80, 80));
            orders.commanded_move_tick = Some(5);
            agent.orders = Some(orders);
            agent.target_position = Some(v(70, 70));

            maybe_trigger_evasion(&mut agent, Vec2Fixed::SOUTH, 1000 + attempt * 100, &mut rng);
            if agent.evasion.active {
                assert_eq!(agent.evasion.saved_target, Some(v(70, 70)));
                assert_eq!(agent.evasion.saved_commanded_tick, Some(5));
                let saved = agent.evasion.saved_waypoints.as_ref().unwrap();
                assert_eq!(saved.len(), 1);
                assert!(agent.orders.as_ref().unwrap().waypoint_queue.is_empty());
                return;
            }
        }
        panic!("dodge never triggered across 100 attempts");
    }
}
