use crate::channel::OutputChannel;
use crate::router::ContentRouter;
use crate::EventQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

enum Signal {
    Wake,
    Shutdown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebounceStats {
    pub batches: u64,
    pub events: u64,
    pub spurious_wakes: u64,
    pub stale_replies: u64,
}

/// Single-flight consumer: settle, drain, generate, speak.
pub struct DebounceProcessor {
    queue: Arc<EventQueue>,
    router: Arc<ContentRouter>,
    primary: Arc<OutputChannel>,
    settle: Duration,
    processing: AtomicBool,
    signals: Mutex<Option<SyncSender<Signal>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    batches: AtomicU64,
    events: AtomicU64,
    spurious: AtomicU64,
    stale: AtomicU64,
}

/// Clears the processing flag however the drain ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DebounceProcessor {
    pub fn new(
        queue: Arc<EventQueue>,
        router: Arc<ContentRouter>,
        primary: Arc<OutputChannel>,
        settle: Duration,
    ) -> Self {
        Self {
            queue,
            router,
            primary,
            settle,
            processing: AtomicBool::new(false),
            signals: Mutex::new(None),
            worker: Mutex::new(None),
            batches: AtomicU64::new(0),
            events: AtomicU64::new(0),
            spurious: AtomicU64::new(0),
            stale: AtomicU64::new(0),
        }
    }

    /// Spawn the consumer thread. Calling it twice is a no-op.
    pub fn start(self: &Arc<Self>) -> std::io::Result<()> {
        let mut signals = self.signals.lock();
        if signals.is_some() {
            return Ok(());
        }
        // One slot: wakes that arrive while a wake is pending coalesce.
        let (tx, rx) = mpsc::sync_channel(1);
        let this = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("debounce".to_string())
            .spawn(move || this.run(rx))?;
        *signals = Some(tx);
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Ask the consumer to process. Returns false when it is not running.
    pub fn wake(&self) -> bool {
        let signals = self.signals.lock();
        let Some(tx) = signals.as_ref() else {
            return false;
        };
        match tx.try_send(Signal::Wake) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Settle, drain and answer one batch on the calling thread.
    /// Returns the text handed to the primary channel, or None when nothing
    /// was drained or the mode switched before the reply could be spoken.
    pub fn process_once(&self) -> Option<String> {
        if self.processing.swap(true, Ordering::SeqCst) {
            debug!("debounce already in flight");
            return None;
        }
        let _in_flight = InFlight(&self.processing);

        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
        let batch = self.queue.drain_all();
        if batch.is_empty() {
            self.spurious.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let (mode, epoch) = self.router.mode_epoch();
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.events.fetch_add(batch.len() as u64, Ordering::Relaxed);
        debug!("answering {} events in {mode}", batch.len());

        let reply = self
            .router
            .unless_switched(epoch, || self.primary.show_thinking())
            .map(|()| self.router.generate(mode, &batch));
        let spoken = reply
            .as_deref()
            .and_then(|text| self.router.unless_switched(epoch, || self.primary.speak(text)));
        match spoken {
            Some(true) => {}
            Some(false) => self.primary.settle_idle(),
            None => {
                // the switch already reset the device and may be speaking an intro
                self.stale.fetch_add(1, Ordering::Relaxed);
                debug!("dropping {mode} reply, mode switched while generating");
                return None;
            }
        }
        reply
    }

    pub fn shutdown(&self) {
        let tx = self.signals.lock().take();
        if let Some(tx) = tx {
            // A full slot means a wake is pending; dropping the sender ends
            // the loop once it drains.
            let _ = tx.try_send(Signal::Shutdown);
        }
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("debounce thread panicked");
            }
        }
    }

    pub fn stats(&self) -> DebounceStats {
        DebounceStats {
            batches: self.batches.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            spurious_wakes: self.spurious.load(Ordering::Relaxed),
            stale_replies: self.stale.load(Ordering::Relaxed),
        }
    }

    fn run(&self, rx: Receiver<Signal>) {
        info!("debounce consumer started (settle {:?})", self.settle);
        while let Ok(signal) = rx.recv() {
            match signal {
                Signal::Wake => {
                    self.process_once();
                    // Events that landed while generating are picked up now
                    // unless the reply is playing; completion re-arms then.
                    if !self.queue.is_empty() && !self.primary.is_speaking() {
                        self.wake();
                    }
                }
                Signal::Shutdown => break,
            }
        }
        info!("debounce consumer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::ContentSource;
    use crate::device_sync::{ChannelCues, ChannelId, DeviceStateSync};
    use crate::{Event, Mode};
    use device_link::{DeviceCommand, NullLink};
    use std::time::Instant;
    use voice_out::{MockTts, TtsConfig, Voice};

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<usize>>,
    }

    impl ContentSource for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn respond(&self, batch: &[Event]) -> anyhow::Result<String> {
            self.batches.lock().push(batch.len());
            Ok(format!("{} eventos", batch.len()))
        }

        fn idle(&self) -> String {
            String::new()
        }
    }

    fn processor(settle: Duration) -> (Arc<DebounceProcessor>, Arc<EventQueue>, Arc<Recorder>) {
        let device = Arc::new(DeviceStateSync::new(
            Box::new(NullLink),
            ChannelCues {
                talk: DeviceCommand::Talk,
                stop: DeviceCommand::Stop,
            },
            ChannelCues {
                talk: DeviceCommand::Gift,
                stop: DeviceCommand::GiftStop,
            },
        ));
        let primary = Arc::new(OutputChannel::new(
            ChannelId::Primary,
            Voice::new("es-MX-JorgeNeural"),
            Arc::new(MockTts::new(Duration::from_millis(10))),
            TtsConfig::default(),
            device,
            Duration::from_millis(5),
        ));
        let queue = Arc::new(EventQueue::new(100));
        let router = Arc::new(ContentRouter::new(Mode::OpenChat, Arc::clone(&queue), Arc::clone(&primary)));
        let recorder = Arc::new(Recorder::default());
        router.register(Mode::OpenChat, Arc::clone(&recorder) as Arc<dyn ContentSource>);
        let debounce = Arc::new(DebounceProcessor::new(
            Arc::clone(&queue),
            router,
            primary,
            settle,
        ));
        (debounce, queue, recorder)
    }

    #[test]
    fn test_empty_queue_is_a_spurious_wake() {
        let (debounce, _queue, recorder) = processor(Duration::ZERO);
        assert_eq!(debounce.process_once(), None);
        assert_eq!(debounce.stats().spurious_wakes, 1);
        assert!(recorder.batches.lock().is_empty());
        assert!(!debounce.is_processing());
    }

    #[test]
    fn test_events_within_settle_window_form_one_batch() {
        let (debounce, queue, recorder) = processor(Duration::from_millis(100));
        let d = Arc::clone(&debounce);
        let handle = thread::spawn(move || d.process_once());
        thread::sleep(Duration::from_millis(10));
        for name in ["ana", "beto", "carla"] {
            queue.enqueue(Event::comment(name, "hola"));
        }
        let reply = handle.join().unwrap();
        assert_eq!(reply.as_deref(), Some("3 eventos"));
        assert_eq!(*recorder.batches.lock(), vec![3]);
    }

    #[test]
    fn test_overlapping_drain_is_refused() {
        let (debounce, queue, recorder) = processor(Duration::from_millis(80));
        queue.enqueue(Event::comment("ana", "hola"));
        let d = Arc::clone(&debounce);
        let handle = thread::spawn(move || d.process_once());
        thread::sleep(Duration::from_millis(10));
        assert!(debounce.is_processing());
        assert_eq!(debounce.process_once(), None);
        handle.join().unwrap();
        assert_eq!(*recorder.batches.lock(), vec![1]);
    }

    #[test]
    fn test_consumer_thread_answers_wakes() {
        let (debounce, queue, recorder) = processor(Duration::from_millis(10));
        debounce.start().unwrap();
        queue.enqueue(Event::comment("ana", "hola"));
        assert!(debounce.wake());
        let start = Instant::now();
        while recorder.batches.lock().is_empty() && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*recorder.batches.lock(), vec![1]);
        debounce.shutdown();
        assert!(!debounce.wake());
    }
}
