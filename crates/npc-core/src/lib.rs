//! npc-core: event ingestion, debouncing and dual-channel orchestration
//!
//! Inbound events enter through [`DualRouter::submit`]. Gifts go straight to
//! the gift [`OutputChannel`]; everything else waits in the [`EventQueue`]
//! until the [`DebounceProcessor`] drains it as one batch, asks the
//! [`ContentRouter`] for a reply under the active [`Mode`], and hands the
//! text to the primary channel. Both channels drive the one physical device
//! exclusively through [`DeviceStateSync`].
//!
//! [`NpcContext`] builds and owns all of it.

mod error;
pub use error::{NpcError, Result};

pub mod config;
pub use config::NpcConfig;

pub mod text;

mod event;
pub use event::{Event, EventCategory, GiftInfo};

mod queue;
pub use queue::{EventQueue, QueueStats};

mod mode;
pub use mode::Mode;

mod collaborator;
pub use collaborator::{BasicThanks, ContentSource, GiftAcknowledger};

mod device_sync;
pub use device_sync::{ChannelCues, ChannelId, DeviceState, DeviceStateSync, DeviceStats, SpeakerToken};

mod channel;
pub use channel::{ChannelStats, CompletionHook, OutputChannel};

mod router;
pub use router::{ContentRouter, ModeObserver};

mod chat;
pub use chat::{ChatPolicy, ChatStats};

mod debounce;
pub use debounce::{DebounceProcessor, DebounceStats};

mod dual;
pub use dual::{DualRouter, GiftNotice, GiftObserver, GiftStats, GiftStreak};

mod context;
pub use context::{NpcContext, NpcContextBuilder, SystemStatus};

pub mod metrics;
