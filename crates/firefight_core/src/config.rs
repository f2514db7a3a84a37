//! Simulation configuration.
//!
//! Population caps and spawn pacing, separated from code so headless
//! balance runs can sweep them. Loadable from RON like the variant
//! stat table.

use serde::{Deserialize, Serialize};

use crate::constants::NUM_INTEL_TO_COLLECT;
use crate::error::{GameError, Result};
use crate::variants::VariantTable;

/// Tunable population and pacing knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Hard cap on simultaneously active squads counted by the respawn
    /// pass (guardian squads included).
    pub max_enemy_squads: u32,
    /// Cap on living non-squad, non-HVT bosses.
    pub max_generic_bosses: u32,
    /// Ticks between respawn attempts. `None` disables respawning of
    /// squads and generic bosses entirely.
    pub respawn_delay_ticks: Option<u64>,
    /// Target count for dynamically spawned (non-guardian) squads.
    /// Zero disables the dynamic spawn pass.
    pub active_squad_limit: u32,
    /// Ticks between dynamic population-control passes.
    pub spawn_check_interval_ticks: u64,
    /// Dynamic squads spawn outside this radius (in tiles) from the player.
    pub squad_spawn_radius_tiles: u32,
    /// Non-guardian squads beyond this radius (in tiles) are despawned.
    pub squad_despawn_radius_tiles: u32,
    /// Intel items required to complete the collection objective.
    pub intel_to_collect: u32,
    /// Per-variant combat stats.
    pub variants: VariantTable,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_enemy_squads: 12,
            max_generic_bosses: 2,
            respawn_delay_ticks: None,
            active_squad_limit: 0,
            spawn_check_interval_ticks: 200,
            squad_spawn_radius_tiles: 70,
            squad_despawn_radius_tiles: 90,
            intel_to_collect: NUM_INTEL_TO_COLLECT,
            variants: VariantTable::builtin(),
        }
    }
}

impl SimConfig {
    /// Parse a config from a RON string.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] on malformed input.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::DataParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_disables_respawn_and_dynamic_spawn() {
        let config = SimConfig::default();
        assert_eq!(config.respawn_delay_ticks, None);
        assert_eq!(config.active_squad_limit, 0);
    }

    #[test]
    fn test_ron_roundtrip() {
        let config = SimConfig::default();
        let text = ron::to_string(&config).unwrap();
        assert_eq!(SimConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_despawn_radius_wider_than_spawn_radius() {
        let config = SimConfig::default();
        assert!(config.squad_despawn_radius_tiles > config.squad_spawn_radius_tiles);
    }
}
