use crate::device_sync::{ChannelId, DeviceStateSync, SpeakerToken};
use crate::text::clean_text;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use voice_out::{Playback, TimedPlayback, TtsConfig, TtsEngine, Voice};

pub type CompletionHook = Box<dyn Fn(ChannelId) + Send + Sync>;

type PlaybackSlot = Arc<Mutex<Option<Box<dyn Playback>>>>;

/// Handle to one live utterance.
#[derive(Clone)]
struct SpeechSession {
    id: u64,
    text: Arc<str>,
    stop_requested: Arc<AtomicBool>,
    playback: PlaybackSlot,
}

impl SpeechSession {
    fn interrupt(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(p) = self.playback.lock().as_mut() {
            p.stop();
        }
    }

    fn stopped(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub started: u64,
    pub completed: u64,
    pub interrupted: u64,
    pub tts_fallbacks: u64,
}

/// One voiced speech pipeline bound to the shared device.
pub struct OutputChannel {
    id: ChannelId,
    voice: Voice,
    tts: Arc<dyn TtsEngine>,
    tts_cfg: TtsConfig,
    device: Arc<DeviceStateSync>,
    poll: Duration,
    next_session: AtomicU64,
    live: Mutex<Option<SpeechSession>>,
    /// Serializes speak and stop so the device owner and `live` agree.
    claim: Mutex<()>,
    hooks: RwLock<Vec<CompletionHook>>,
    started: AtomicU64,
    completed: AtomicU64,
    interrupted: AtomicU64,
    tts_fallbacks: AtomicU64,
}

impl OutputChannel {
    pub fn new(
        id: ChannelId,
        voice: Voice,
        tts: Arc<dyn TtsEngine>,
        tts_cfg: TtsConfig,
        device: Arc<DeviceStateSync>,
        poll: Duration,
    ) -> Self {
        Self {
            id,
            voice,
            tts,
            tts_cfg,
            device,
            poll: poll.max(Duration::from_millis(1)),
            next_session: AtomicU64::new(0),
            live: Mutex::new(None),
            claim: Mutex::new(()),
            hooks: RwLock::new(Vec::new()),
            started: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            interrupted: AtomicU64::new(0),
            tts_fallbacks: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    pub fn is_speaking(&self) -> bool {
        self.live.lock().is_some()
    }

    /// Text of the utterance currently playing.
    pub fn current_text(&self) -> Option<String> {
        self.live.lock().as_ref().map(|s| s.text.to_string())
    }

    /// Run `hook` after every utterance that finishes on its own.
    pub fn on_complete(&self, hook: CompletionHook) {
        self.hooks.write().push(hook);
    }

    /// Start speaking `text`, silently replacing any utterance in flight.
    /// Returns false when the text is empty after cleanup.
    pub fn speak(self: &Arc<Self>, text: &str) -> bool {
        let text = clean_text(text);
        if text.is_empty() {
            debug!("{} channel: nothing to say", self.id);
            return false;
        }

        let session = SpeechSession {
            id: self.next_session.fetch_add(1, Ordering::Relaxed) + 1,
            text: Arc::from(text.as_str()),
            stop_requested: Arc::new(AtomicBool::new(false)),
            playback: Arc::new(Mutex::new(None)),
        };
        let previous = {
            let _claim = self.claim.lock();
            // The device owner moves first so the old worker's completion
            // can no longer match it.
            self.device.request_speaking(self.token(session.id));
            self.live.lock().replace(session.clone())
        };
        if let Some(prev) = previous {
            prev.interrupt();
            self.interrupted.fetch_add(1, Ordering::Relaxed);
            debug!("{} channel: session {} interrupted by {}", self.id, prev.id, session.id);
        }
        self.started.fetch_add(1, Ordering::Relaxed);

        let this = Arc::clone(self);
        let spawn = thread::Builder::new()
            .name(format!("speech-{}", self.id))
            .spawn(move || this.run_session(session));
        if let Err(e) = spawn {
            warn!("{} channel: could not start speech worker: {e}", self.id);
            self.stop();
            return false;
        }
        true
    }

    /// Stop any utterance and put the device in idle for this channel.
    pub fn stop(&self) -> bool {
        let _claim = self.claim.lock();
        let previous = self.live.lock().take();
        let was_live = previous.is_some();
        if let Some(prev) = previous {
            prev.interrupt();
            self.interrupted.fetch_add(1, Ordering::Relaxed);
            debug!("{} channel: session {} stopped", self.id, prev.id);
        }
        self.device.request_idle_for(self.id);
        was_live
    }

    /// Show the thinking cue, generate the text, then speak it.
    pub fn process_and_speak<F>(self: &Arc<Self>, generate: F) -> bool
    where
        F: FnOnce() -> String,
    {
        self.show_thinking();
        let text = generate();
        if clean_text(&text).is_empty() {
            self.settle_idle();
            return false;
        }
        self.speak(&text)
    }

    pub fn show_thinking(&self) {
        self.device.request_thinking(self.id);
    }

    /// Back to idle after thinking, unless an utterance took over meanwhile.
    pub fn settle_idle(&self) {
        if !self.is_speaking() {
            self.device.request_idle_for(self.id);
        }
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
            tts_fallbacks: self.tts_fallbacks.load(Ordering::Relaxed),
        }
    }

    fn token(&self, session: u64) -> SpeakerToken {
        SpeakerToken {
            channel: self.id,
            session,
        }
    }

    fn run_session(&self, session: SpeechSession) {
        let playback = match self.tts.synthesize(&session.text, &self.voice) {
            Ok(p) => p,
            Err(e) => {
                self.tts_fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!("{} channel: {} unavailable ({e}), simulating", self.id, self.tts.name());
                Box::new(TimedPlayback::for_text(&session.text, &self.tts_cfg))
            }
        };
        {
            let mut slot = session.playback.lock();
            let mut playback = playback;
            if session.stopped() {
                playback.stop();
                return;
            }
            *slot = Some(playback);
        }

        loop {
            if session.stopped() {
                return;
            }
            let finished = session
                .playback
                .lock()
                .as_mut()
                .map_or(true, |p| p.is_finished());
            if finished {
                break;
            }
            thread::sleep(self.poll);
        }
        if session.stopped() {
            return;
        }

        {
            let mut live = self.live.lock();
            if live.as_ref().map(|s| s.id) == Some(session.id) {
                *live = None;
            }
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.device.finish_speaking(self.token(session.id));
        debug!("{} channel: session {} finished", self.id, session.id);

        for hook in self.hooks.read().iter() {
            hook(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_sync::{ChannelCues, DeviceState};
    use device_link::{DeviceCommand, MockLink, SentLog};
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;
    use voice_out::{MockTts, SilentTts};

    fn cues() -> (ChannelCues, ChannelCues) {
        (
            ChannelCues {
                talk: DeviceCommand::Talk,
                stop: DeviceCommand::Stop,
            },
            ChannelCues {
                talk: DeviceCommand::Gift,
                stop: DeviceCommand::GiftStop,
            },
        )
    }

    fn channel_with(
        id: ChannelId,
        tts: Arc<dyn TtsEngine>,
        tts_cfg: TtsConfig,
    ) -> (Arc<OutputChannel>, Arc<DeviceStateSync>, SentLog) {
        let link = MockLink::new();
        let log = link.log();
        let (p, g) = cues();
        let device = Arc::new(DeviceStateSync::new(Box::new(link), p, g));
        let ch = Arc::new(OutputChannel::new(
            id,
            Voice::new("es-MX-JorgeNeural"),
            tts,
            tts_cfg,
            Arc::clone(&device),
            Duration::from_millis(5),
        ));
        (ch, device, log)
    }

    fn channel(speech: Duration) -> (Arc<OutputChannel>, Arc<DeviceStateSync>, SentLog) {
        channel_with(
            ChannelId::Primary,
            Arc::new(MockTts::new(speech)),
            TtsConfig::default(),
        )
    }

    fn wait_until(limit: Duration, f: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < limit {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        f()
    }

    #[test]
    fn test_natural_completion_goes_idle_and_runs_hooks() {
        let (ch, device, log) = channel(Duration::from_millis(30));
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        ch.on_complete(Box::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(ch.speak("hola"));
        assert!(ch.is_speaking());
        assert!(wait_until(Duration::from_secs(2), || hits.load(Ordering::SeqCst) == 1));
        assert!(!ch.is_speaking());
        assert_eq!(device.state(), DeviceState::Idle);
        assert_eq!(*log.lock(), vec![DeviceCommand::Talk, DeviceCommand::Stop]);
    }

    #[test]
    fn test_back_to_back_speak_never_sends_stale_stop() {
        // 10ms per char: the first line lasts 100ms, the second 400ms
        let (ch, device, log) = channel_with(
            ChannelId::Primary,
            Arc::new(SilentTts::new(TtsConfig {
                ms_per_char: 10,
                min_ms: 0,
            })),
            TtsConfig::default(),
        );
        ch.speak("primera..");
        thread::sleep(Duration::from_millis(20));
        ch.speak("una segunda frase bastante mas larga....");
        // past the point where the first line would have ended on its own
        thread::sleep(Duration::from_millis(180));
        assert_eq!(device.state(), DeviceState::Speaking(ChannelId::Primary));
        assert_eq!(*log.lock(), vec![DeviceCommand::Talk]);
        assert!(wait_until(Duration::from_secs(2), || !ch.is_speaking()));
        assert_eq!(*log.lock(), vec![DeviceCommand::Talk, DeviceCommand::Stop]);
        assert_eq!(ch.stats().interrupted, 1);
        assert_eq!(ch.stats().completed, 1);
    }

    #[test]
    fn test_replacing_speaker_moves_device_owner_before_release() {
        let (ch, device, log) = channel(Duration::from_secs(5));
        ch.speak("la primera frase");
        ch.speak("la segunda frase");
        // a completion from the replaced session must not stop the new one
        device.finish_speaking(ch.token(1));
        assert_eq!(device.state(), DeviceState::Speaking(ChannelId::Primary));
        assert_eq!(*log.lock(), vec![DeviceCommand::Talk]);
        assert_eq!(ch.current_text().as_deref(), Some("la segunda frase"));
        device.finish_speaking(ch.token(2));
        assert_eq!(device.state(), DeviceState::Idle);
        assert_eq!(*log.lock(), vec![DeviceCommand::Talk, DeviceCommand::Stop]);
        ch.stop();
    }

    #[test]
    fn test_stop_goes_idle_without_hooks() {
        let (ch, device, log) = channel(Duration::from_secs(5));
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        ch.on_complete(Box::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        ch.speak("algo largo");
        assert!(ch.stop());
        thread::sleep(Duration::from_millis(30));
        assert_eq!(device.state(), DeviceState::Idle);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(*log.lock(), vec![DeviceCommand::Talk, DeviceCommand::Stop]);
    }

    #[test]
    fn test_empty_text_is_ignored() {
        let (ch, _device, log) = channel(Duration::from_millis(10));
        assert!(!ch.speak("   🎈 "));
        assert!(!ch.is_speaking());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_process_and_speak_shows_thinking_first() {
        let (ch, _device, log) = channel(Duration::from_millis(10));
        assert!(ch.process_and_speak(|| "respuesta".to_string()));
        assert!(wait_until(Duration::from_secs(2), || !ch.is_speaking()));
        assert_eq!(
            *log.lock(),
            vec![DeviceCommand::Thinking, DeviceCommand::Talk, DeviceCommand::Stop]
        );
    }

    #[test]
    fn test_process_and_speak_empty_result_returns_to_idle() {
        let (ch, device, log) = channel(Duration::from_millis(10));
        assert!(!ch.process_and_speak(String::new));
        assert_eq!(device.state(), DeviceState::Idle);
        assert_eq!(*log.lock(), vec![DeviceCommand::Thinking, DeviceCommand::Stop]);
    }

    #[test]
    fn test_failing_tts_falls_back_to_timed_playback() {
        let (ch, _device, log) = channel_with(
            ChannelId::Gift,
            Arc::new(MockTts::failing()),
            TtsConfig {
                ms_per_char: 1,
                min_ms: 10,
            },
        );
        ch.speak("gracias");
        assert!(wait_until(Duration::from_secs(2), || !ch.is_speaking()));
        assert_eq!(ch.stats().tts_fallbacks, 1);
        assert_eq!(*log.lock(), vec![DeviceCommand::Gift, DeviceCommand::GiftStop]);
    }
}
