//! Events emitted by a simulation tick.
//!
//! The core never performs IO. Sound, rendering flashes, and UI updates
//! are driven by the shell from these fire-and-forget notifications;
//! dropping them on the floor must never affect the simulation.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::math::{fixed_serde, Fixed};

/// An audio cue with volume/frequency hints for the audio collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCue {
    /// The player fired.
    PlayerShot {
        /// Volume hint, 0..1.
        #[serde(with = "fixed_serde")]
        volume: Fixed,
    },
    /// A teammate fired.
    TeammateShot {
        /// Volume hint.
        #[serde(with = "fixed_serde")]
        volume: Fixed,
    },
    /// An enemy rifleman fired.
    SoldierShot {
        /// Volume hint.
        #[serde(with = "fixed_serde")]
        volume: Fixed,
    },
    /// An enemy heavy weapon fired.
    HeavyShot {
        /// Volume hint.
        #[serde(with = "fixed_serde")]
        volume: Fixed,
    },
    /// An enemy squad called out a fresh sighting.
    EnemySighted {
        /// Tone frequency hint in Hz.
        frequency_hz: u32,
        /// Volume hint.
        #[serde(with = "fixed_serde")]
        volume: Fixed,
    },
    /// An objective was completed this tick.
    ObjectiveComplete {
        /// Volume hint.
        #[serde(with = "fixed_serde")]
        volume: Fixed,
    },
    /// The player picked up an intel item.
    IntelCollected {
        /// Volume hint.
        #[serde(with = "fixed_serde")]
        volume: Fixed,
    },
}

/// One bullet hit that dealt damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Owner of the bullet.
    pub attacker: EntityId,
    /// Agent that took the hit.
    pub target: EntityId,
    /// Damage actually applied (post health floor).
    pub amount: u32,
}

/// Everything observable that happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Audio cues, in emission order.
    pub audio: Vec<AudioCue>,
    /// Damage applied by bullets this tick.
    pub damage: Vec<DamageEvent>,
    /// Agents that died this tick.
    pub deaths: Vec<EntityId>,
    /// Ids of objectives completed this tick.
    pub objectives_completed: Vec<String>,
    /// Number of intel items collected this tick.
    pub intel_collected: u32,
    /// All primary objectives done and extraction reached.
    pub game_won: bool,
    /// The player died this tick.
    pub game_over: bool,
}
