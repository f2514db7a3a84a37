//! # Firefight Core
//!
//! Deterministic simulation core for a tile-based, top-down tactical
//! shooter: a player, an AI fire team, and squads of AI enemies
//! fighting across a destructible tile map in a fixed-timestep loop.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (one seeded RNG threaded through state)
//! - No floating-point math (fixed-point throughout)
//!
//! Rendering, audio playback, map generation, and raw input live in
//! the shell; the core consumes a [`tilemap::TileMap`], accepts a
//! [`simulation::PlayerInput`] per tick, and reports what happened via
//! [`events::TickEvents`].
//!
//! ## Crate Structure
//!
//! - [`simulation`] - The tick driver and whole-game state
//! - [`squad`] - Squad coordination: formations, patrol, regrouping
//! - [`independent`] - Solo high-value enemy control
//! - [`teammate`] - Allied AI and squad orders
//! - [`movement`] - The per-agent movement executor
//! - [`pathfinding`] - A*, line of sight, corridor smoothing
//! - [`collision`] - Walkability against terrain and agents
//! - [`projectile`] - Bullet advancement and resolution
//! - [`combat`] - Lead prediction, damage rolls, evasion
//! - [`math`] - Fixed-point scalar and vector math

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod collision;
pub mod combat;
pub mod components;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod independent;
pub mod math;
pub mod movement;
pub mod objectives;
pub mod pathfinding;
pub mod player;
pub mod projectile;
pub mod rng;
pub mod sector;
pub mod simulation;
pub mod spawn;
pub mod squad;
pub mod teammate;
pub mod tilemap;
pub mod variants;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::components::{
        Agent, AgentKind, AgentStorage, EntityId, Health, IdAllocator, IntelItem, Side,
    };
    pub use crate::config::SimConfig;
    pub use crate::error::{GameError, Result};
    pub use crate::events::{AudioCue, TickEvents};
    pub use crate::math::{Fixed, Rect, Vec2Fixed};
    pub use crate::player::MoveIntent;
    pub use crate::projectile::Bullet;
    pub use crate::rng::GameRng;
    pub use crate::simulation::{PlayerInput, Simulation, SquadOrder};
    pub use crate::squad::{FormationShape, Squad};
    pub use crate::tilemap::{Tile, TileKind, TileMap};
    pub use crate::variants::EnemyVariant;
}
