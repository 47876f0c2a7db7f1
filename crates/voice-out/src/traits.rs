use crate::{Result, Voice};

/// Handle to an utterance that is playing (or pretending to).
pub trait Playback: Send {
    /// True once playback has ended on its own or after [`Playback::stop`].
    fn is_finished(&mut self) -> bool;

    /// Cut playback short. Must be idempotent.
    fn stop(&mut self);
}

pub trait TtsEngine: Send + Sync {
    /// Synthesize `text` with `voice` and start playing it.
    fn synthesize(&self, text: &str, voice: &Voice) -> Result<Box<dyn Playback>>;

    fn name(&self) -> &str;
}
