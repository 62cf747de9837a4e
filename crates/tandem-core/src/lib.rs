//! Tandem core: a two-deck mixing engine
//!
//! The engine renders blocks of summed deck output on demand. Each deck is
//! a transport state machine over an in-memory track with a fixed effect
//! chain (filter, echo, convolution reverb); the decks meet at an
//! equal-power crossfader. Position is derived arithmetically from a
//! shared sample clock, so any thread can read it without touching the
//! audio path. Recording, spectrum analysis and automated transitions tap
//! the same engine.

pub mod effect;
pub mod engine;
pub mod error;
pub mod record;
pub mod sync;
pub mod transition;
pub mod types;

pub use engine::{DeckSnapshot, MixEngine};
pub use error::EngineError;
pub use types::*;
