//! voice-out: text-to-speech traits with silent and mock backends
//!
//! Synthesis hands back a [`Playback`] handle that the caller polls for
//! completion and may stop early. When no real synthesizer is available the
//! [`SilentTts`] backend returns a [`TimedPlayback`] whose duration tracks the
//! text length, so anything timed against speech keeps working.

mod types;
pub use types::{TtsConfig, Voice, KNOWN_VOICES};

mod error;
pub use error::{Result, SpeechError};

mod traits;
pub use traits::{Playback, TtsEngine};

mod timed;
pub use timed::{SilentTts, TimedPlayback};

mod command;
pub use command::CommandTts;

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::{MockTts, SpokenLog};

pub mod plugin;
