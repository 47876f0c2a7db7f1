use crate::{Playback, Result, TtsConfig, TtsEngine, Voice};
use std::time::{Duration, Instant};
use tracing::debug;

/// Playback that produces no sound and simply lasts for `duration`.
pub struct TimedPlayback {
    started: Instant,
    duration: Duration,
    stopped: bool,
}

impl TimedPlayback {
    pub fn new(duration: Duration) -> Self {
        Self {
            started: Instant::now(),
            duration,
            stopped: false,
        }
    }

    /// Duration an utterance of `text` would take at the configured rate.
    pub fn for_text(text: &str, cfg: &TtsConfig) -> Self {
        let chars = text.chars().count() as u64;
        let ms = (chars * cfg.ms_per_char).max(cfg.min_ms);
        Self::new(Duration::from_millis(ms))
    }
}

impl Playback for TimedPlayback {
    fn is_finished(&mut self) -> bool {
        self.stopped || self.started.elapsed() >= self.duration
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Fallback engine: logs the text and simulates its duration.
pub struct SilentTts {
    cfg: TtsConfig,
}

impl SilentTts {
    pub fn new(cfg: TtsConfig) -> Self {
        Self { cfg }
    }
}

impl TtsEngine for SilentTts {
    fn synthesize(&self, text: &str, voice: &Voice) -> Result<Box<dyn Playback>> {
        debug!("[{}] {}", voice.as_str(), text);
        Ok(Box::new(TimedPlayback::for_text(text, &self.cfg)))
    }

    fn name(&self) -> &str {
        "silent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_playback_respects_minimum() {
        let cfg = TtsConfig {
            ms_per_char: 10,
            min_ms: 500,
        };
        let p = TimedPlayback::for_text("hi", &cfg);
        assert_eq!(p.duration, Duration::from_millis(500));
        let p = TimedPlayback::for_text(&"a".repeat(100), &cfg);
        assert_eq!(p.duration, Duration::from_millis(1000));
    }

    #[test]
    fn test_stop_finishes_immediately() {
        let mut p = TimedPlayback::new(Duration::from_secs(60));
        assert!(!p.is_finished());
        p.stop();
        assert!(p.is_finished());
    }
}
