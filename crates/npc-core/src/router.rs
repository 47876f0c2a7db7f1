use crate::channel::OutputChannel;
use crate::collaborator::{guarded, ContentSource};
use crate::{Event, EventQueue, Mode};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Called with `(new, old)` after every mode change.
pub type ModeObserver = Box<dyn Fn(Mode, Mode) + Send + Sync>;

const UNKNOWN_MODE_LINE: &str = "¡Modo desconocido! Mi programación está más rota que mi corazón.";
const BROKEN_SOURCE_LINE: &str = "¡Mi cerebro de payaso se descompuso!";

/// Owns the active mode and maps it to a content source.
pub struct ContentRouter {
    mode: RwLock<Mode>,
    transition: Mutex<()>,
    sources: RwLock<HashMap<Mode, Arc<dyn ContentSource>>>,
    observers: RwLock<Vec<ModeObserver>>,
    queue: Arc<EventQueue>,
    primary: Arc<OutputChannel>,
    mode_changes: AtomicU64,
    fallbacks: AtomicU64,
}

impl ContentRouter {
    pub fn new(initial: Mode, queue: Arc<EventQueue>, primary: Arc<OutputChannel>) -> Self {
        Self {
            mode: RwLock::new(initial),
            transition: Mutex::new(()),
            sources: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
            queue,
            primary,
            mode_changes: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn register(&self, mode: Mode, source: Arc<dyn ContentSource>) {
        self.sources.write().insert(mode, source);
    }

    pub fn has_source(&self, mode: Mode) -> bool {
        self.sources.read().contains_key(&mode)
    }

    pub fn on_mode_change(&self, observer: ModeObserver) {
        self.observers.write().push(observer);
    }

    pub fn current_mode(&self) -> Mode {
        *self.mode.read()
    }

    /// Switch to `new`. Returns false when it already is the active mode.
    pub fn change_mode(&self, new: Mode) -> bool {
        let _transition = self.transition.lock();
        let old = self.current_mode();
        if old == new {
            return false;
        }

        self.primary.stop();
        let dropped = self.queue.clear();
        *self.mode.write() = new;
        self.mode_changes.fetch_add(1, Ordering::Relaxed);
        info!("mode {old} -> {new}, {dropped} pending events dropped");

        for observer in self.observers.read().iter() {
            guarded("mode observer", || {
                observer(new, old);
                Ok(())
            });
        }

        if let Some(source) = self.source(new) {
            let intro = guarded(source.name(), || source.intro()).flatten();
            if let Some(text) = intro {
                self.primary.speak(&text);
            }
        }
        true
    }

    /// Produce the reply for `batch` under `mode`. Never fails.
    pub fn generate(&self, mode: Mode, batch: &[Event]) -> String {
        let Some(source) = self.source(mode) else {
            warn!("no content source registered for {mode}");
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
            return UNKNOWN_MODE_LINE.to_string();
        };
        if batch.is_empty() {
            return source.idle();
        }
        match guarded(source.name(), || source.respond(batch)) {
            Some(text) if !text.trim().is_empty() => text,
            Some(_) => source.idle(),
            None => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                BROKEN_SOURCE_LINE.to_string()
            }
        }
    }

    /// Active mode together with the switch count it was read at.
    pub fn mode_epoch(&self) -> (Mode, u64) {
        let _transition = self.transition.lock();
        (self.current_mode(), self.mode_changes())
    }

    /// Run `f` unless the mode switched after `epoch`. A switch arriving
    /// meanwhile waits until `f` returns.
    pub fn unless_switched<R>(&self, epoch: u64, f: impl FnOnce() -> R) -> Option<R> {
        let _transition = self.transition.lock();
        (self.mode_changes() == epoch).then(f)
    }

    pub fn mode_changes(&self) -> u64 {
        self.mode_changes.load(Ordering::Relaxed)
    }

    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    fn source(&self, mode: Mode) -> Option<Arc<dyn ContentSource>> {
        self.sources.read().get(&mode).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_sync::{ChannelCues, ChannelId, DeviceStateSync};
    use device_link::{DeviceCommand, MockLink, SentLog};
    use std::time::Duration;
    use voice_out::{MockTts, SpokenLog, TtsConfig, Voice};

    struct Fixed {
        intro: Option<&'static str>,
        fail: bool,
    }

    impl ContentSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn intro(&self) -> anyhow::Result<Option<String>> {
            Ok(self.intro.map(str::to_string))
        }

        fn respond(&self, batch: &[Event]) -> anyhow::Result<String> {
            if self.fail {
                anyhow::bail!("source down");
            }
            Ok(format!("{} eventos", batch.len()))
        }

        fn idle(&self) -> String {
            "silencio".to_string()
        }
    }

    fn router() -> (Arc<ContentRouter>, Arc<EventQueue>, SentLog, SpokenLog) {
        let link = MockLink::new();
        let sent = link.log();
        let device = Arc::new(DeviceStateSync::new(
            Box::new(link),
            ChannelCues {
                talk: DeviceCommand::Talk,
                stop: DeviceCommand::Stop,
            },
            ChannelCues {
                talk: DeviceCommand::Gift,
                stop: DeviceCommand::GiftStop,
            },
        ));
        let tts = MockTts::new(Duration::from_secs(5));
        let spoken = tts.log();
        let primary = Arc::new(OutputChannel::new(
            ChannelId::Primary,
            Voice::new("es-MX-JorgeNeural"),
            Arc::new(tts),
            TtsConfig::default(),
            device,
            Duration::from_millis(5),
        ));
        let queue = Arc::new(EventQueue::new(10));
        let router = Arc::new(ContentRouter::new(
            Mode::OpenChat,
            Arc::clone(&queue),
            primary,
        ));
        router.register(Mode::OpenChat, Arc::new(Fixed { intro: None, fail: false }));
        router.register(
            Mode::Joke,
            Arc::new(Fixed {
                intro: Some("un chiste"),
                fail: false,
            }),
        );
        router.register(Mode::Threat, Arc::new(Fixed { intro: None, fail: true }));
        (router, queue, sent, spoken)
    }

    #[test]
    fn test_same_mode_is_a_no_op() {
        let (router, queue, sent, _) = router();
        queue.enqueue(Event::comment("ana", "hola"));
        assert!(!router.change_mode(Mode::OpenChat));
        assert_eq!(queue.len(), 1);
        assert!(sent.lock().is_empty());
        assert_eq!(router.mode_changes(), 0);
    }

    #[test]
    fn test_change_clears_queue_notifies_and_speaks_intro() {
        let (router, queue, _, spoken) = router();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        router.on_mode_change(Box::new(move |new, old| s.lock().push((new, old))));
        queue.enqueue(Event::comment("ana", "hola"));
        queue.enqueue(Event::comment("beto", "hey"));

        assert!(router.change_mode(Mode::Joke));
        assert!(queue.is_empty());
        assert_eq!(router.current_mode(), Mode::Joke);
        assert_eq!(*seen.lock(), vec![(Mode::Joke, Mode::OpenChat)]);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(spoken.lock()[0].1, "un chiste");
    }

    #[test]
    fn test_generate_never_fails() {
        let (router, _, _, _) = router();
        let batch = vec![Event::comment("ana", "hola"), Event::comment("beto", "hey")];
        assert_eq!(router.generate(Mode::OpenChat, &batch), "2 eventos");
        assert_eq!(router.generate(Mode::OpenChat, &[]), "silencio");
        assert_eq!(router.generate(Mode::Threat, &batch), BROKEN_SOURCE_LINE);
        assert_eq!(router.generate(Mode::Song, &batch), UNKNOWN_MODE_LINE);
        assert_eq!(router.fallbacks(), 2);
    }

    #[test]
    fn test_panicking_observer_does_not_abort_change() {
        let (router, _, _, _) = router();
        #[allow(clippy::panic)]
        router.on_mode_change(Box::new(|_, _| panic!("ui crashed")));
        assert!(router.change_mode(Mode::Threat));
        assert_eq!(router.current_mode(), Mode::Threat);
    }
}
