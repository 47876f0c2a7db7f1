//! The explicit context object wiring every core component together.

use crate::channel::OutputChannel;
use crate::chat::ChatPolicy;
use crate::collaborator::{BasicThanks, ContentSource, GiftAcknowledger};
use crate::debounce::DebounceProcessor;
use crate::device_sync::{ChannelCues, ChannelId, DeviceState, DeviceStateSync};
use crate::dual::{DualRouter, GiftObserver};
use crate::router::{ContentRouter, ModeObserver};
use crate::{Event, EventQueue, Mode, NpcConfig, Result};
use chat_model::ChatModel;
use device_link::{DeviceLink, NullLink};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use voice_out::{SilentTts, TtsEngine, Voice};

/// Point-in-time view for operators.
#[derive(Clone, Debug, Serialize)]
pub struct SystemStatus {
    pub mode: Mode,
    pub mode_name: String,
    pub queue_len: usize,
    pub queue_capacity: usize,
    pub processing: bool,
    pub primary_speaking: bool,
    pub gift_speaking: bool,
    pub device_state: DeviceState,
    pub device_connected: bool,
    pub device_link: String,
    pub gift_streak: u32,
    pub best_streak: u32,
    pub gifts_enabled: bool,
}

#[derive(Default)]
pub struct NpcContextBuilder {
    config: NpcConfig,
    link: Option<Box<dyn DeviceLink>>,
    tts: Option<Arc<dyn TtsEngine>>,
    sources: Vec<(Mode, Arc<dyn ContentSource>)>,
    acknowledger: Option<Arc<dyn GiftAcknowledger>>,
    chat_model: Option<Arc<dyn ChatModel>>,
}

impl NpcContextBuilder {
    pub fn new(config: NpcConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn device_link(mut self, link: Box<dyn DeviceLink>) -> Self {
        self.link = Some(link);
        self
    }

    pub fn tts(mut self, tts: Arc<dyn TtsEngine>) -> Self {
        self.tts = Some(tts);
        self
    }

    /// Content source for `mode`. Open chat defaults to [`ChatPolicy`].
    pub fn source(mut self, mode: Mode, source: Arc<dyn ContentSource>) -> Self {
        self.sources.push((mode, source));
        self
    }

    pub fn sources(mut self, sources: impl IntoIterator<Item = (Mode, Arc<dyn ContentSource>)>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn gift_acknowledger(mut self, acknowledger: Arc<dyn GiftAcknowledger>) -> Self {
        self.acknowledger = Some(acknowledger);
        self
    }

    pub fn chat_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.chat_model = Some(model);
        self
    }

    pub fn build(self) -> Result<NpcContext> {
        let config = self.config;
        config.validate()?;

        let speech = &config.speech;
        let link = self.link.unwrap_or_else(|| Box::new(NullLink));
        let tts = self
            .tts
            .unwrap_or_else(|| Arc::new(SilentTts::new(speech.tts_config())));

        let device = Arc::new(DeviceStateSync::new(
            link,
            ChannelCues {
                talk: speech.primary.talk_cue.clone(),
                stop: speech.primary.stop_cue.clone(),
            },
            ChannelCues {
                talk: speech.gift.talk_cue.clone(),
                stop: speech.gift.stop_cue.clone(),
            },
        ));
        let channel = |id: ChannelId, voice: &str| {
            Arc::new(OutputChannel::new(
                id,
                Voice::new(voice),
                Arc::clone(&tts),
                speech.tts_config(),
                Arc::clone(&device),
                speech.poll_interval(),
            ))
        };
        let primary = channel(ChannelId::Primary, &speech.primary.voice);
        let gift = channel(ChannelId::Gift, &speech.gift.voice);

        let queue = Arc::new(EventQueue::new(config.queue.capacity));
        let router = Arc::new(ContentRouter::new(
            config.initial_mode,
            Arc::clone(&queue),
            Arc::clone(&primary),
        ));

        let custom_chat = self.sources.iter().any(|(m, _)| *m == Mode::OpenChat);
        let chat = if custom_chat {
            None
        } else {
            let policy = Arc::new(ChatPolicy::new(config.chat.clone(), self.chat_model));
            router.register(Mode::OpenChat, Arc::clone(&policy) as Arc<dyn ContentSource>);
            Some(policy)
        };
        for (mode, source) in self.sources {
            router.register(mode, source);
        }
        if let Some(policy) = &chat {
            let policy = Arc::clone(policy);
            router.on_mode_change(Box::new(move |_new, old| {
                if old == Mode::OpenChat {
                    let forgotten = policy.clear_repetitions();
                    debug!("left open chat, forgot {forgotten} tracked questions");
                }
            }));
        }

        let cue_device = Arc::clone(&device);
        router.on_mode_change(Box::new(move |new, _old| {
            if let Some(cue) = new.entry_cue() {
                cue_device.send_cue(&cue);
            }
        }));

        let debounce = Arc::new(DebounceProcessor::new(
            Arc::clone(&queue),
            Arc::clone(&router),
            Arc::clone(&primary),
            config.debounce.settle(),
        ));
        let rearm = Arc::downgrade(&debounce);
        let pending = Arc::clone(&queue);
        primary.on_complete(Box::new(move |_| {
            if pending.is_empty() {
                return;
            }
            if let Some(debounce) = rearm.upgrade() {
                debounce.wake();
            }
        }));

        let acknowledger = self
            .acknowledger
            .unwrap_or_else(|| Arc::new(BasicThanks));
        let dual = Arc::new(DualRouter::new(
            Arc::clone(&queue),
            Arc::clone(&router),
            Arc::clone(&debounce),
            Arc::clone(&primary),
            Arc::clone(&gift),
            Arc::clone(&device),
            acknowledger,
            config.gifts.clone(),
        ));

        debounce.start()?;
        info!(
            "npc core ready: mode {}, device {}, tts {}",
            config.initial_mode,
            device.link_name(),
            tts.name()
        );

        Ok(NpcContext {
            config,
            queue,
            device,
            primary,
            gift,
            router,
            debounce,
            dual,
            chat,
            shut_down: AtomicBool::new(false),
        })
    }
}

/// Every core component, constructed once and shared by reference.
pub struct NpcContext {
    config: NpcConfig,
    queue: Arc<EventQueue>,
    device: Arc<DeviceStateSync>,
    primary: Arc<OutputChannel>,
    gift: Arc<OutputChannel>,
    router: Arc<ContentRouter>,
    debounce: Arc<DebounceProcessor>,
    dual: Arc<DualRouter>,
    chat: Option<Arc<ChatPolicy>>,
    shut_down: AtomicBool,
}

impl NpcContext {
    pub fn builder(config: NpcConfig) -> NpcContextBuilder {
        NpcContextBuilder::new(config)
    }

    pub fn submit(&self, event: Event) -> bool {
        self.dual.submit(event)
    }

    pub fn submit_gift_combo(&self, events: &[Event]) -> bool {
        self.dual.submit_gift_combo(events)
    }

    pub fn change_mode(&self, mode: Mode) -> bool {
        self.router.change_mode(mode)
    }

    pub fn current_mode(&self) -> Mode {
        self.router.current_mode()
    }

    pub fn check_streak_timeout(&self) -> Option<u32> {
        self.dual.check_streak_timeout()
    }

    pub fn force_process(&self) -> bool {
        self.dual.force_process()
    }

    pub fn clear_queue(&self) -> usize {
        self.dual.clear_queue()
    }

    pub fn reset_streak(&self) -> u32 {
        self.dual.reset_streak()
    }

    pub fn set_gifts_enabled(&self, enabled: bool) {
        self.dual.set_gifts_enabled(enabled);
    }

    pub fn on_mode_change(&self, observer: ModeObserver) {
        self.router.on_mode_change(observer);
    }

    pub fn on_gift_notice(&self, observer: GiftObserver) {
        self.dual.on_gift_notice(observer);
    }

    pub fn status(&self) -> SystemStatus {
        let mode = self.router.current_mode();
        let streak = self.dual.streak();
        SystemStatus {
            mode,
            mode_name: mode.display_name().to_string(),
            queue_len: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            processing: self.debounce.is_processing(),
            primary_speaking: self.primary.is_speaking(),
            gift_speaking: self.gift.is_speaking(),
            device_state: self.device.state(),
            device_connected: self.device.is_connected(),
            device_link: self.device.link_name(),
            gift_streak: streak.count,
            best_streak: streak.best,
            gifts_enabled: self.dual.gifts_enabled(),
        }
    }

    /// Stop both channels, reset the device and end the consumer thread.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.debounce.shutdown();
        self.primary.stop();
        self.gift.stop();
        self.device.reset();
        self.device.close();
        info!("npc core shut down");
    }

    pub fn config(&self) -> &NpcConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn device(&self) -> &Arc<DeviceStateSync> {
        &self.device
    }

    pub fn primary(&self) -> &Arc<OutputChannel> {
        &self.primary
    }

    pub fn gift(&self) -> &Arc<OutputChannel> {
        &self.gift
    }

    pub fn router(&self) -> &Arc<ContentRouter> {
        &self.router
    }

    pub fn debounce(&self) -> &Arc<DebounceProcessor> {
        &self.debounce
    }

    pub fn dual(&self) -> &Arc<DualRouter> {
        &self.dual
    }

    /// The built-in open-chat policy, unless a custom source replaced it.
    pub fn chat(&self) -> Option<&Arc<ChatPolicy>> {
        self.chat.as_ref()
    }
}

impl Drop for NpcContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
