//! Playback engine: decks, mixer, analysers and the render loop

mod analyser;
mod deck;
#[allow(clippy::module_inception)]
mod engine;
mod mixer;

pub use analyser::{AnalyserTap, ANALYSER_BINS, ANALYSER_FFT_SIZE};
pub use deck::{Deck, EngineClock, TransportAtomics};
pub use engine::{DeckSnapshot, MixEngine};
pub use mixer::Mixer;
