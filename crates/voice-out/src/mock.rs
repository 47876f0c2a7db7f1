use crate::{Playback, Result, SpeechError, TimedPlayback, TtsEngine, Voice};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Every `(voice, text)` pair a [`MockTts`] was asked to speak.
pub type SpokenLog = Arc<Mutex<Vec<(String, String)>>>;

/// Records utterances and plays each for a fixed duration.
pub struct MockTts {
    duration: Duration,
    fail: bool,
    spoken: SpokenLog,
}

impl MockTts {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            fail: false,
            spoken: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock whose synthesis always fails, to exercise fallbacks.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Duration::ZERO)
        }
    }

    pub fn log(&self) -> SpokenLog {
        Arc::clone(&self.spoken)
    }
}

impl TtsEngine for MockTts {
    fn synthesize(&self, text: &str, voice: &Voice) -> Result<Box<dyn Playback>> {
        self.spoken
            .lock()
            .push((voice.as_str().to_string(), text.to_string()));
        if self.fail {
            return Err(SpeechError::Synthesis("mock failure".to_string()));
        }
        Ok(Box::new(TimedPlayback::new(self.duration)))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
