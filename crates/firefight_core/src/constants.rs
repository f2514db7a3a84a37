//! Tuning constants for the simulation.
//!
//! Distances are world pixels, durations are simulation ticks. The
//! original balance was authored against a 14-pixel tile and a 20 Hz
//! tick, and every value here keeps that frame of reference.

use crate::math::{fixed_ratio, Fixed, Vec2Fixed};

/// Size of one map tile in world pixels.
pub const TILE_SIZE: Fixed = Fixed::const_from_int(14);

// ============================================================================
// Agents
// ============================================================================

/// Player/teammate/enemy bounding-box edge (0.7 tiles).
pub const AGENT_SIZE: Fixed = fixed_ratio(98, 10);

/// Player movement speed in pixels per tick.
pub const PLAYER_SPEED: Fixed = fixed_ratio(36, 100);
/// Player maximum health.
pub const PLAYER_HEALTH: u32 = 100;
/// Player shot cooldown in ticks.
pub const PLAYER_SHOOT_COOLDOWN_TICKS: u64 = 17;
/// Player bullet speed in pixels per tick.
pub const PLAYER_BULLET_SPEED: Fixed = fixed_ratio(32, 10);
/// Player bullet damage roll, inclusive.
pub const PLAYER_BULLET_DAMAGE_MIN: u32 = 7;
/// Player bullet damage roll, inclusive.
pub const PLAYER_BULLET_DAMAGE_MAX: u32 = 19;
/// Flat damage player bullets deal to destructible tiles.
pub const PLAYER_BULLET_WALL_DAMAGE: u32 = 25;
/// Player bullet flight budget (26 tiles).
pub const PLAYER_BULLET_MAX_TRAVEL: Fixed = Fixed::const_from_int(364);
/// Ticks without movement before the player counts as stationary.
pub const PLAYER_STATIONARY_THRESHOLD_TICKS: u32 = 50;
/// Length of the player movement-direction history ring.
pub const PLAYER_MOVEMENT_HISTORY_LEN: usize = 20;
/// Minimum history entries before the smoothed average is trusted.
pub const PLAYER_MOVEMENT_HISTORY_MIN: usize = 3;

/// Teammate movement speed in pixels per tick.
pub const TEAMMATE_SPEED: Fixed = fixed_ratio(36, 100);
/// Teammate maximum health.
pub const TEAMMATE_HEALTH: u32 = 100;
/// Number of teammates fielded alongside the player.
pub const TEAMMATE_COUNT: usize = 3;
/// Teammate threat-detection radius (24 tiles).
pub const TEAMMATE_DETECTION_RADIUS: Fixed = Fixed::const_from_int(336);
/// Teammate effective fire range (21 tiles).
pub const TEAMMATE_SHOOT_RANGE: Fixed = Fixed::const_from_int(294);
/// Teammate shot cooldown in ticks.
pub const TEAMMATE_SHOOT_COOLDOWN_TICKS: u64 = 25;
/// Teammate bullet speed in pixels per tick.
pub const TEAMMATE_BULLET_SPEED: Fixed = fixed_ratio(32, 10);
/// Teammate bullet damage roll, inclusive.
pub const TEAMMATE_BULLET_DAMAGE_MIN: u32 = 7;
/// Teammate bullet damage roll, inclusive.
pub const TEAMMATE_BULLET_DAMAGE_MAX: u32 = 14;
/// Teammate bullet flight budget (24 tiles).
pub const TEAMMATE_BULLET_MAX_TRAVEL: Fixed = Fixed::const_from_int(336);

/// Base enemy movement speed; per-variant multipliers apply on top.
pub const ENEMY_SPEED: Fixed = fixed_ratio(29, 100);
/// Base enemy detection radius (27 tiles); variants multiply this.
pub const ENEMY_DETECTION_RADIUS: Fixed = Fixed::const_from_int(378);

// ============================================================================
// Projectiles
// ============================================================================

/// Bullet bounding-box edge (0.2 tiles).
pub const BULLET_SIZE: Fixed = fixed_ratio(28, 10);

// ============================================================================
// Tiles
// ============================================================================

/// Durability of a destructible wall tile.
pub const WALL_HEALTH: u32 = 100;
/// Durability of a fence tile.
pub const FENCE_HEALTH: u32 = 30;

// ============================================================================
// Movement executor
// ============================================================================

/// Distance at which a movement target counts as reached (half a tile).
pub const ARRIVAL_THRESHOLD: Fixed = Fixed::const_from_int(7);
/// Consecutive blocked ticks before drastic stuck recovery.
pub const STUCK_TIMEOUT_TICKS: u32 = 120;
/// Ring-search radius (in tiles) for the embedded-in-wall failsafe.
pub const STUCK_RESCUE_MAX_RADIUS_TILES: i32 = 10;
/// Ticks of patience before a crowded agent gives up politely.
pub const AI_PATIENCE_THRESHOLD: u32 = 60;
/// A* node-expansion budget; search aborts past this.
pub const PATHFINDING_MAX_NODES: u32 = 250;

// ============================================================================
// Evasive maneuvers
// ============================================================================

/// Minimum ticks between evasive-dodge attempts per agent.
pub const EVASIVE_COOLDOWN_TICKS: u64 = 20;
/// Sidestep distance when dodging incoming fire (5 tiles).
pub const EVASIVE_STRAFE_DISTANCE: Fixed = Fixed::const_from_int(70);
/// Percent chance a hit triggers an evasive maneuver.
pub const EVASIVE_DODGE_CHANCE_PERCENT: u32 = 50;
/// Base duration an agent stays "under fire" after a dodge.
pub const UNDER_FIRE_DURATION_TICKS: u64 = 30;

// ============================================================================
// Squads
// ============================================================================

/// Idle ticks before a squad picks a fresh patrol target.
pub const SQUAD_PATROL_IDLE_TICKS: u64 = 140;
/// Maximum patrol-offset distance from the squad centroid (50 tiles).
pub const SQUAD_PATROL_MAX_DISTANCE: Fixed = Fixed::const_from_int(700);
/// Member spread (from centroid) that triggers a regroup (25 tiles).
pub const SQUAD_REGROUP_MAX_SPREAD: Fixed = Fixed::const_from_int(350);
/// Radius around a formation slot that counts as regrouped (10 tiles).
pub const SQUAD_REGROUP_COHESION_RADIUS: Fixed = Fixed::const_from_int(140);
/// Ticks between regroup-condition checks.
pub const SQUAD_REGROUP_CHECK_INTERVAL_TICKS: u64 = 150;
/// Hard cap on time spent regrouping; guarantees termination.
pub const SQUAD_REGROUP_DURATION_MAX_TICKS: u64 = 600;
/// Post-combat window in which a spread squad still regroups.
pub const SQUAD_POST_COMBAT_REGROUP_GRACE_TICKS: u64 = 200;
/// While regrouping, members only return fire inside this range (5 tiles).
pub const SQUAD_REGROUP_FIRE_RANGE: Fixed = Fixed::const_from_int(70);

/// Minimum squad-anchor distance from the player when respawning (25 tiles).
pub const SQUAD_RESPAWN_MIN_PLAYER_DISTANCE: Fixed = Fixed::const_from_int(350);
/// Placement attempts for a full-formation squad respawn.
pub const SQUAD_RESPAWN_ATTEMPTS: u32 = 15;

// ============================================================================
// Audio cue hints
// ============================================================================

/// Default gunshot volume hint.
pub const GUNSHOT_VOLUME: Fixed = fixed_ratio(2, 10);
/// Heavy-weapon gunshot volume hint.
pub const HEAVY_GUNSHOT_VOLUME: Fixed = fixed_ratio(25, 100);
/// UI cue volume hint.
pub const UI_SOUND_VOLUME: Fixed = fixed_ratio(3, 10);
/// Voice/alert cue volume hint.
pub const VOICE_SOUND_VOLUME: Fixed = fixed_ratio(4, 10);
/// Ticks between "enemy sighted" barks.
pub const ENEMY_SIGHTED_SOUND_COOLDOWN_TICKS: u64 = 160;
/// Percent chance a fresh sighting produces a bark.
pub const ENEMY_SIGHTED_SOUND_CHANCE_PERCENT: u32 = 40;
/// Base frequency hint for the sighted bark, jittered +/-100 Hz.
pub const ENEMY_SIGHTED_BASE_NOTE_HZ: u32 = 600;

// ============================================================================
// Formations
// ============================================================================

/// Distance tolerance for a teammate sitting in its formation slot.
pub const FORMATION_POSITION_TOLERANCE: Fixed = Fixed::const_from_int(7);
/// Per-tick fraction of the gap a smoothed formation target closes.
pub const FORMATION_TARGET_LERP_FACTOR: Fixed = fixed_ratio(8, 100);

/// Diamond: one trailing flank slot plus two wings.
pub const FORMATION_OFFSETS_DIAMOND: [Vec2Fixed; 3] = [
    Vec2Fixed::new(Fixed::const_from_int(-42), Fixed::const_from_int(0)),
    Vec2Fixed::new(Fixed::const_from_int(-21), Fixed::const_from_int(-42)),
    Vec2Fixed::new(Fixed::const_from_int(-21), Fixed::const_from_int(42)),
];

/// Line abreast, perpendicular to the facing direction.
pub const FORMATION_OFFSETS_LINE: [Vec2Fixed; 3] = [
    Vec2Fixed::new(Fixed::const_from_int(0), Fixed::const_from_int(-56)),
    Vec2Fixed::new(Fixed::const_from_int(0), Fixed::const_from_int(56)),
    Vec2Fixed::new(Fixed::const_from_int(0), Fixed::const_from_int(84)),
];

/// Single file trailing the focal point.
pub const FORMATION_OFFSETS_COLUMN: [Vec2Fixed; 3] = [
    Vec2Fixed::new(Fixed::const_from_int(-35), Fixed::const_from_int(0)),
    Vec2Fixed::new(Fixed::const_from_int(-63), Fixed::const_from_int(0)),
    Vec2Fixed::new(Fixed::const_from_int(-91), Fixed::const_from_int(0)),
];

// ============================================================================
// Orders
// ============================================================================

/// Default ring radius for the defend order, in tiles.
pub const DEFEND_RADIUS_TILES: u32 = 5;

// ============================================================================
// Objectives
// ============================================================================

/// Intel items required to complete the collection objective.
pub const NUM_INTEL_TO_COLLECT: u32 = 3;
/// Intel item bounding-box edge (0.8 tiles).
pub const INTEL_ITEM_SIZE: Fixed = fixed_ratio(112, 10);
/// Player distance at which the extraction point triggers (1.5 tiles).
pub const EXTRACTION_TRIGGER_RADIUS: Fixed = Fixed::const_from_int(21);

/// Sixteen compass-point unit vectors, used wherever the simulation
/// needs an evenly spread direction without trigonometry: defend-ring
/// placement and randomized unstick nudges.
pub const COMPASS_16: [Vec2Fixed; 16] = [
    Vec2Fixed::new(Fixed::const_from_int(1), Fixed::const_from_int(0)),
    Vec2Fixed::new(fixed_ratio(92_388, 100_000), fixed_ratio(38_268, 100_000)),
    Vec2Fixed::new(fixed_ratio(70_711, 100_000), fixed_ratio(70_711, 100_000)),
    Vec2Fixed::new(fixed_ratio(38_268, 100_000), fixed_ratio(92_388, 100_000)),
    Vec2Fixed::new(Fixed::const_from_int(0), Fixed::const_from_int(1)),
    Vec2Fixed::new(fixed_ratio(-38_268, 100_000), fixed_ratio(92_388, 100_000)),
    Vec2Fixed::new(fixed_ratio(-70_711, 100_000), fixed_ratio(70_711, 100_000)),
    Vec2Fixed::new(fixed_ratio(-92_388, 100_000), fixed_ratio(38_268, 100_000)),
    Vec2Fixed::new(Fixed::const_from_int(-1), Fixed::const_from_int(0)),
    Vec2Fixed::new(fixed_ratio(-92_388, 100_000), fixed_ratio(-38_268, 100_000)),
    Vec2Fixed::new(fixed_ratio(-70_711, 100_000), fixed_ratio(-70_711, 100_000)),
    Vec2Fixed::new(fixed_ratio(-38_268, 100_000), fixed_ratio(-92_388, 100_000)),
    Vec2Fixed::new(Fixed::const_from_int(0), Fixed::const_from_int(-1)),
    Vec2Fixed::new(fixed_ratio(38_268, 100_000), fixed_ratio(-92_388, 100_000)),
    Vec2Fixed::new(fixed_ratio(70_711, 100_000), fixed_ratio(-70_711, 100_000)),
    Vec2Fixed::new(fixed_ratio(92_388, 100_000), fixed_ratio(-38_268, 100_000)),
];
