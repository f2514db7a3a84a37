//! Enemy variant identities and their stat tables.
//!
//! Variant dispatch is a tagged enum plus one stats table, so per-variant
//! numbers live in exactly one place instead of being scattered across
//! branch arms in every combat function.

use serde::{Deserialize, Serialize};

use crate::constants::{
    ENEMY_DETECTION_RADIUS, GUNSHOT_VOLUME, HEAVY_GUNSHOT_VOLUME,
};
use crate::error::{GameError, Result};
use crate::math::{fixed_ratio, fixed_serde, Fixed};

/// Enemy soldier variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnemyVariant {
    /// Rank-and-file rifleman; fills the two trailing squad slots.
    #[default]
    Soldier,
    /// Squad leader with a slow, hard-hitting launcher.
    Grenadier,
    /// Solo heavy; also used for high-value elimination targets.
    Boss,
    /// The enemy commander. Highest health and damage in the roster.
    HvBoss,
}

impl EnemyVariant {
    /// All variants, in stat-table order.
    pub const ALL: [Self; 4] = [Self::Soldier, Self::Grenadier, Self::Boss, Self::HvBoss];

    /// Variants that anchor a squad's formation (used to pick the
    /// "leader-ish" member for patrol arrival checks).
    #[must_use]
    pub const fn is_leaderly(self) -> bool {
        matches!(self, Self::Grenadier | Self::Boss | Self::HvBoss)
    }
}

/// Which shot cue the audio collaborator should play for a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShotSound {
    /// Light rifle crack.
    Rifle,
    /// Heavy thump (grenadier and boss weapons).
    Heavy,
}

/// Combat and movement numbers for one enemy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantStats {
    /// Maximum health.
    pub max_health: u32,
    /// Multiplier applied to the base enemy speed.
    #[serde(with = "fixed_serde")]
    pub speed_multiplier: Fixed,
    /// Detection radius in world pixels.
    #[serde(with = "fixed_serde")]
    pub detection_range: Fixed,
    /// Effective fire range in world pixels.
    #[serde(with = "fixed_serde")]
    pub shoot_range: Fixed,
    /// Ticks between shots.
    pub shoot_cooldown_ticks: u64,
    /// Bullet speed in pixels per tick.
    #[serde(with = "fixed_serde")]
    pub bullet_speed: Fixed,
    /// Damage roll lower bound, inclusive.
    pub damage_min: u32,
    /// Damage roll upper bound, inclusive.
    pub damage_max: u32,
    /// Bullet flight budget in pixels.
    #[serde(with = "fixed_serde")]
    pub bullet_max_travel: Fixed,
    /// Audio cue kind for this variant's weapon.
    pub shot_sound: ShotSound,
    /// Volume hint for the shot cue.
    #[serde(with = "fixed_serde")]
    pub shot_volume: Fixed,
}

/// Stats for all four variants.
///
/// The built-in table is the shipped balance; a RON override can be
/// loaded for tuning experiments without recompiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantTable {
    /// Soldier stats.
    pub soldier: VariantStats,
    /// Grenadier stats.
    pub grenadier: VariantStats,
    /// Boss stats.
    pub boss: VariantStats,
    /// Commander stats.
    pub hv_boss: VariantStats,
}

impl VariantTable {
    /// The shipped balance table.
    #[must_use]
    pub fn builtin() -> Self {
        let detect_boosted = ENEMY_DETECTION_RADIUS * fixed_ratio(11, 10);
        Self {
            soldier: VariantStats {
                max_health: 50,
                speed_multiplier: Fixed::ONE,
                detection_range: ENEMY_DETECTION_RADIUS,
                shoot_range: Fixed::from_num(252),
                shoot_cooldown_ticks: 34,
                bullet_speed: fixed_ratio(22, 10),
                damage_min: 1,
                damage_max: 5,
                bullet_max_travel: Fixed::from_num(294),
                shot_sound: ShotSound::Rifle,
                shot_volume: GUNSHOT_VOLUME * fixed_ratio(9, 10),
            },
            grenadier: VariantStats {
                max_health: 80,
                speed_multiplier: fixed_ratio(85, 100),
                detection_range: detect_boosted,
                shoot_range: Fixed::from_num(168),
                shoot_cooldown_ticks: 40,
                bullet_speed: fixed_ratio(17, 10),
                damage_min: 3,
                damage_max: 10,
                bullet_max_travel: Fixed::from_num(238),
                shot_sound: ShotSound::Heavy,
                shot_volume: HEAVY_GUNSHOT_VOLUME * fixed_ratio(9, 10),
            },
            boss: VariantStats {
                max_health: 100,
                speed_multiplier: fixed_ratio(70, 100),
                detection_range: detect_boosted,
                shoot_range: Fixed::from_num(336),
                shoot_cooldown_ticks: 40,
                bullet_speed: fixed_ratio(22, 10),
                damage_min: 3,
                damage_max: 6,
                bullet_max_travel: Fixed::from_num(364),
                shot_sound: ShotSound::Heavy,
                shot_volume: HEAVY_GUNSHOT_VOLUME,
            },
            hv_boss: VariantStats {
                max_health: 350,
                speed_multiplier: fixed_ratio(80, 100),
                detection_range: detect_boosted,
                shoot_range: Fixed::from_num(336),
                shoot_cooldown_ticks: 40,
                bullet_speed: fixed_ratio(22, 10),
                damage_min: 5,
                damage_max: 12,
                bullet_max_travel: Fixed::from_num(364),
                shot_sound: ShotSound::Heavy,
                shot_volume: HEAVY_GUNSHOT_VOLUME * fixed_ratio(11, 10),
            },
        }
    }

    /// Stats for one variant.
    #[must_use]
    pub fn get(&self, variant: EnemyVariant) -> &VariantStats {
        match variant {
            EnemyVariant::Soldier => &self.soldier,
            EnemyVariant::Grenadier => &self.grenadier,
            EnemyVariant::Boss => &self.boss,
            EnemyVariant::HvBoss => &self.hv_boss,
        }
    }

    /// Parse an override table from a RON string.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] on malformed input.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::DataParseError(e.to_string()))
    }
}

impl Default for VariantTable {
    fn default() -> Self {
        Self::builtin()
    }
}
