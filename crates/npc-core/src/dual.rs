use crate::channel::OutputChannel;
use crate::collaborator::{guarded, GiftAcknowledger};
use crate::config::GiftConfig;
use crate::debounce::DebounceProcessor;
use crate::device_sync::DeviceStateSync;
use crate::router::ContentRouter;
use crate::{Event, EventQueue, GiftInfo, Mode};
use device_link::DeviceCommand;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Consecutive gifts with no idle gap longer than the streak timeout.
#[derive(Clone, Copy, Debug, Default)]
pub struct GiftStreak {
    pub count: u32,
    pub best: u32,
    pub last_event: Option<Instant>,
}

/// Gift-side happenings, for UI hooks.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GiftNotice {
    Gift {
        user: String,
        gift: GiftInfo,
        streak: u32,
        text: String,
    },
    Combo {
        gifts: usize,
        streak: u32,
        text: String,
    },
    Celebration {
        streak: u32,
        text: String,
    },
    StreakEnded {
        streak: u32,
        text: Option<String>,
    },
}

pub type GiftObserver = Box<dyn Fn(&GiftNotice) + Send + Sync>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GiftStats {
    pub received: u64,
    pub dropped: u64,
    pub combos: u64,
    pub celebrations: u64,
}

/// Ingress: gifts go straight to the gift channel, everything else is
/// queued for the debounce consumer.
pub struct DualRouter {
    queue: Arc<EventQueue>,
    router: Arc<ContentRouter>,
    debounce: Arc<DebounceProcessor>,
    primary: Arc<OutputChannel>,
    gift: Arc<OutputChannel>,
    device: Arc<DeviceStateSync>,
    acknowledger: Arc<dyn GiftAcknowledger>,
    cfg: GiftConfig,
    enabled: AtomicBool,
    streak: Mutex<GiftStreak>,
    observers: RwLock<Vec<GiftObserver>>,
    received: AtomicU64,
    dropped: AtomicU64,
    combos: AtomicU64,
    celebrations: AtomicU64,
}

impl DualRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<EventQueue>,
        router: Arc<ContentRouter>,
        debounce: Arc<DebounceProcessor>,
        primary: Arc<OutputChannel>,
        gift: Arc<OutputChannel>,
        device: Arc<DeviceStateSync>,
        acknowledger: Arc<dyn GiftAcknowledger>,
        mut cfg: GiftConfig,
    ) -> Self {
        cfg.celebrate_every = cfg.celebrate_every.max(1);
        Self {
            queue,
            router,
            debounce,
            primary,
            gift,
            device,
            acknowledger,
            enabled: AtomicBool::new(cfg.enabled),
            cfg,
            streak: Mutex::new(GiftStreak::default()),
            observers: RwLock::new(Vec::new()),
            received: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            combos: AtomicU64::new(0),
            celebrations: AtomicU64::new(0),
        }
    }

    pub fn on_gift_notice(&self, observer: GiftObserver) {
        self.observers.write().push(observer);
    }

    /// Route one event. Returns whether it was accepted.
    pub fn submit(&self, event: Event) -> bool {
        if event.is_gift() {
            return self.handle_gift(&event);
        }
        let accepted = self.queue.enqueue(event);
        if accepted {
            self.nudge();
        }
        accepted
    }

    /// Acknowledge several simultaneous gifts with one utterance.
    pub fn submit_gift_combo(&self, events: &[Event]) -> bool {
        let gifts: Vec<(String, GiftInfo)> = events
            .iter()
            .filter(|e| e.is_gift())
            .map(|e| (e.source_id().to_string(), GiftInfo::parse(e.text())))
            .collect();
        if gifts.is_empty() {
            return false;
        }
        if !self.gifts_enabled() {
            self.dropped.fetch_add(gifts.len() as u64, Ordering::Relaxed);
            debug!("gift processing disabled, dropping combo of {}", gifts.len());
            return false;
        }

        let (before, streak) = self.bump_streak(gifts.len() as u32);
        self.received.fetch_add(gifts.len() as u64, Ordering::Relaxed);
        self.combos.fetch_add(1, Ordering::Relaxed);
        self.device.send_cue(&DeviceCommand::GiftCombo);

        let mut text = String::new();
        self.gift.process_and_speak(|| {
            text = guarded("gift combo", || self.acknowledger.combo(&gifts, streak))
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("¡{} regalos a la vez! ¡Gracias a todos!", gifts.len()));
            text.clone()
        });
        self.notify(&GiftNotice::Combo {
            gifts: gifts.len(),
            streak,
            text,
        });

        let every = self.cfg.celebrate_every;
        if before / every < streak / every {
            self.celebrate(streak);
        }
        true
    }

    /// Reset the streak if the last gift is older than the timeout.
    pub fn check_streak_timeout(&self) -> Option<u32> {
        self.check_streak_timeout_at(Instant::now())
    }

    pub fn check_streak_timeout_at(&self, now: Instant) -> Option<u32> {
        let ended = {
            let mut st = self.streak.lock();
            match st.last_event {
                Some(last)
                    if st.count > 0
                        && now.saturating_duration_since(last) > self.cfg.streak_timeout() =>
                {
                    let ended = st.count;
                    st.count = 0;
                    st.last_event = None;
                    ended
                }
                _ => return None,
            }
        };
        info!("gift streak of {ended} ended after {:?} idle", self.cfg.streak_timeout());
        self.notify_streak_end(ended);
        Some(ended)
    }

    /// Administrative reset; returns the streak that was discarded.
    pub fn reset_streak(&self) -> u32 {
        let ended = {
            let mut st = self.streak.lock();
            let ended = st.count;
            st.count = 0;
            st.last_event = None;
            ended
        };
        if ended > 0 {
            info!("gift streak of {ended} reset");
            self.notify_streak_end(ended);
        }
        ended
    }

    pub fn streak(&self) -> GiftStreak {
        *self.streak.lock()
    }

    pub fn set_gifts_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!("gift processing {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn gifts_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn change_mode(&self, mode: Mode) -> bool {
        self.router.change_mode(mode)
    }

    pub fn current_mode(&self) -> Mode {
        self.router.current_mode()
    }

    /// Wake the debounce consumer regardless of what is playing.
    pub fn force_process(&self) -> bool {
        self.debounce.wake()
    }

    pub fn clear_queue(&self) -> usize {
        self.queue.clear()
    }

    pub fn stats(&self) -> GiftStats {
        GiftStats {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            combos: self.combos.load(Ordering::Relaxed),
            celebrations: self.celebrations.load(Ordering::Relaxed),
        }
    }

    fn handle_gift(&self, event: &Event) -> bool {
        if !self.gifts_enabled() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("gift processing disabled, dropping gift from {}", event.source_id());
            return false;
        }
        let user = event.source_id();
        let gift = GiftInfo::parse(event.text());
        let (_, streak) = self.bump_streak(1);
        self.received.fetch_add(1, Ordering::Relaxed);
        debug!("gift {gift} from {user}, streak {streak}");

        if gift.quantity > self.cfg.combo_quantity {
            self.device.send_cue(&DeviceCommand::GiftCombo);
        }

        let mut text = String::new();
        self.gift.process_and_speak(|| {
            text = guarded("gift acknowledger", || {
                self.acknowledger.acknowledge(user, &gift, streak)
            })
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("¡Gracias {user}! ¡Tu regalo me llena de alegría!"));
            text.clone()
        });
        self.notify(&GiftNotice::Gift {
            user: user.to_string(),
            gift,
            streak,
            text,
        });

        if streak % self.cfg.celebrate_every == 0 {
            self.celebrate(streak);
        }
        true
    }

    /// Returns the streak before and after adding `n` gifts.
    fn bump_streak(&self, n: u32) -> (u32, u32) {
        let mut st = self.streak.lock();
        let before = st.count;
        st.count = st.count.saturating_add(n);
        st.best = st.best.max(st.count);
        st.last_event = Some(Instant::now());
        (before, st.count)
    }

    fn celebrate(&self, streak: u32) {
        self.celebrations.fetch_add(1, Ordering::Relaxed);
        self.device.send_cue(&DeviceCommand::GiftCelebration);
        let text = guarded("gift celebration", || self.acknowledger.celebrate(streak))
            .unwrap_or_else(|| format!("¡Racha de {streak} regalos!"));
        info!("gift streak celebration at {streak}");
        self.notify(&GiftNotice::Celebration { streak, text });
    }

    fn notify_streak_end(&self, streak: u32) {
        let text = guarded("gift streak end", || Ok(self.acknowledger.streak_ended(streak))).flatten();
        self.notify(&GiftNotice::StreakEnded { streak, text });
    }

    fn notify(&self, notice: &GiftNotice) {
        for observer in self.observers.read().iter() {
            guarded("gift observer", || {
                observer(notice);
                Ok(())
            });
        }
    }

    /// Wake the consumer only when nothing would pick the event up anyway.
    fn nudge(&self) {
        if !self.debounce.is_processing() && !self.primary.is_speaking() {
            self.debounce.wake();
        }
    }
}
