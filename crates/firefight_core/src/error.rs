//! Error types for the simulation core.
//!
//! Errors here cover API misuse and malformed data only. In-tick
//! degradations (failed paths, failed spawn placement, dangling entity
//! references) are self-healing and never surface as errors; the
//! simulation must keep ticking.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for simulation API failures.
#[derive(Debug, Error)]
pub enum GameError {
    /// Referenced agent does not exist in storage.
    #[error("Agent not found: {0}")]
    AgentNotFound(u64),

    /// The agent exists but lacks the capability for the request,
    /// e.g. issuing a squad order to an enemy.
    #[error("Invalid agent state: {0}")]
    InvalidAgentState(String),

    /// A tuning table or config string failed to parse.
    #[error("Failed to parse data: {0}")]
    DataParseError(String),

    /// Invalid simulation state (serialization failures and the like).
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
