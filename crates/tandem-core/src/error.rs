//! Engine error taxonomy
//!
//! Out-of-range parameters clamp rather than fail; errors are reserved for
//! state-machine violations the caller must handle. Playback errors are
//! local and recoverable: the deck stays in its last-good state.

use thiserror::Error;

use crate::types::DeckId;

/// Errors surfaced by the engine's control path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A parameter was invalid in a way that cannot be resolved by clamping
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Operation requires a loaded track
    #[error("deck {0} has no track loaded")]
    NotLoaded(DeckId),

    /// A recording tap is already active; stop it before starting another
    #[error("a recording is already in progress")]
    AlreadyRecording,

    /// A transition is already running on this engine
    #[error("engine is busy with another transition")]
    Busy,

    /// The recording writer failed while encoding output
    #[error("encode failed: {0}")]
    Encode(String),
}
