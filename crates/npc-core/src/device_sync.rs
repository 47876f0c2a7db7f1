use device_link::{DeviceCommand, DeviceLink};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// One of the two speech pipelines sharing the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    Primary,
    Gift,
}

impl ChannelId {
    fn index(self) -> usize {
        match self {
            ChannelId::Primary => 0,
            ChannelId::Gift => 1,
        }
    }

    fn other(self) -> ChannelId {
        match self {
            ChannelId::Primary => ChannelId::Gift,
            ChannelId::Gift => ChannelId::Primary,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelId::Primary => "primary",
            ChannelId::Gift => "gift",
        })
    }
}

/// Logical device state. `Speaking` records which channel owns the mouth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Idle,
    Thinking,
    Speaking(ChannelId),
}

/// Identifies one utterance; only the owning token can end a speaking state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpeakerToken {
    pub channel: ChannelId,
    pub session: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelCues {
    pub talk: DeviceCommand,
    pub stop: DeviceCommand,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub sent: u64,
    pub suppressed: u64,
    pub headless: u64,
    pub failed: u64,
}

struct State {
    current: DeviceState,
    owner: Option<SpeakerToken>,
    /// Latest live session per channel, so a finishing owner can hand the
    /// device to the other channel instead of going idle under it.
    active: [Option<u64>; 2],
}

/// Guarded IDLE/THINKING/SPEAKING machine in front of the device link.
///
/// A transition is decided under the state lock; the link lock is taken
/// before the state lock is released, so writes reach the wire in the order
/// their transitions were decided while no state lock is held over I/O.
pub struct DeviceStateSync {
    state: Mutex<State>,
    link: Mutex<Box<dyn DeviceLink>>,
    cues: [ChannelCues; 2],
    sent: AtomicU64,
    suppressed: AtomicU64,
    headless: AtomicU64,
    failed: AtomicU64,
}

impl DeviceStateSync {
    pub fn new(link: Box<dyn DeviceLink>, primary: ChannelCues, gift: ChannelCues) -> Self {
        Self {
            state: Mutex::new(State {
                current: DeviceState::Idle,
                owner: None,
                active: [None, None],
            }),
            link: Mutex::new(link),
            cues: [primary, gift],
            sent: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            headless: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    fn cues(&self, channel: ChannelId) -> &ChannelCues {
        &self.cues[channel.index()]
    }

    pub fn state(&self) -> DeviceState {
        self.state.lock().current
    }

    pub fn is_connected(&self) -> bool {
        self.link.lock().is_connected()
    }

    pub fn link_name(&self) -> String {
        self.link.lock().name().to_string()
    }

    /// Claim the speaking state for `token`, replacing any earlier session of
    /// the same channel.
    pub fn request_speaking(&self, token: SpeakerToken) {
        let mut st = self.state.lock();
        st.active[token.channel.index()] = Some(token.session);
        st.owner = Some(token);
        let target = DeviceState::Speaking(token.channel);
        let cmd = self.cues(token.channel).talk.clone();
        self.transition(st, target, cmd);
    }

    /// Natural end of the utterance identified by `token`. Ignored unless the
    /// token still owns the device.
    pub fn finish_speaking(&self, token: SpeakerToken) {
        let mut st = self.state.lock();
        let slot = &mut st.active[token.channel.index()];
        if *slot == Some(token.session) {
            *slot = None;
        }
        if st.owner != Some(token) {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            debug!(
                "ignoring completion of {} session {}, device owned by {:?}",
                token.channel, token.session, st.owner
            );
            return;
        }
        self.release(st, token.channel);
    }

    /// Explicit "go idle" from `channel`. Ignored while the other channel
    /// owns the speaking state.
    pub fn request_idle_for(&self, channel: ChannelId) {
        let mut st = self.state.lock();
        st.active[channel.index()] = None;
        if let DeviceState::Speaking(owner) = st.current {
            if owner != channel {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                debug!("{channel} idle request ignored, {owner} is speaking");
                return;
            }
        }
        self.release(st, channel);
    }

    /// Unconditional idle.
    pub fn request_idle(&self) {
        let mut st = self.state.lock();
        st.active = [None, None];
        let cmd = match (st.current, st.owner) {
            (DeviceState::Speaking(channel), _) => self.cues(channel).stop.clone(),
            (_, Some(token)) => self.cues(token.channel).stop.clone(),
            _ => self.cues(ChannelId::Primary).stop.clone(),
        };
        st.owner = None;
        self.transition(st, DeviceState::Idle, cmd);
    }

    /// Processing cue for `channel`. Ignored while the other channel speaks.
    pub fn request_thinking(&self, channel: ChannelId) {
        let mut st = self.state.lock();
        if let DeviceState::Speaking(owner) = st.current {
            if owner != channel {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                debug!("{channel} thinking request ignored, {owner} is speaking");
                return;
            }
        }
        st.owner = None;
        self.transition(st, DeviceState::Thinking, DeviceCommand::Thinking);
    }

    /// Fire-and-forget animation cue that does not change the logical state.
    pub fn send_cue(&self, cmd: &DeviceCommand) -> bool {
        let mut link = self.link.lock();
        self.write(link.as_mut(), cmd)
    }

    /// Send RESET and return to idle.
    pub fn reset(&self) -> bool {
        let mut st = self.state.lock();
        st.current = DeviceState::Idle;
        st.owner = None;
        st.active = [None, None];
        let mut link = self.link.lock();
        drop(st);
        self.write(link.as_mut(), &DeviceCommand::Reset)
    }

    pub fn close(&self) {
        self.link.lock().close();
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            sent: self.sent.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            headless: self.headless.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Give the device to the other channel if it still has a live session,
    /// otherwise go idle with `channel`'s stop cue.
    fn release(&self, mut st: parking_lot::MutexGuard<'_, State>, channel: ChannelId) {
        let other = channel.other();
        if let Some(session) = st.active[other.index()] {
            let token = SpeakerToken {
                channel: other,
                session,
            };
            st.owner = Some(token);
            let cmd = self.cues(other).talk.clone();
            self.transition(st, DeviceState::Speaking(other), cmd);
        } else {
            st.owner = None;
            let cmd = self.cues(channel).stop.clone();
            self.transition(st, DeviceState::Idle, cmd);
        }
    }

    fn transition(
        &self,
        mut st: parking_lot::MutexGuard<'_, State>,
        target: DeviceState,
        cmd: DeviceCommand,
    ) {
        if st.current == target {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            debug!("device already {target:?}, not resending {cmd}");
            return;
        }
        debug!("device {:?} -> {target:?} ({cmd})", st.current);
        st.current = target;
        let mut link = self.link.lock();
        drop(st);
        self.write(link.as_mut(), &cmd);
    }

    fn write(&self, link: &mut dyn DeviceLink, cmd: &DeviceCommand) -> bool {
        if !link.is_connected() {
            self.headless.fetch_add(1, Ordering::Relaxed);
            debug!("device not connected, skipping {cmd}");
            return false;
        }
        match link.send(cmd) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!("device send {cmd} failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_link::{MockLink, NullLink};

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

    fn sync() -> (DeviceStateSync, device_link::SentLog) {
        let link = MockLink::new();
        let log = link.log();
        let (p, g) = cues();
        (DeviceStateSync::new(Box::new(link), p, g), log)
    }

    fn tok(channel: ChannelId, session: u64) -> SpeakerToken {
        SpeakerToken { channel, session }
    }

    #[test]
    fn test_repeated_requests_send_once() {
        let (dev, log) = sync();
        dev.request_thinking(ChannelId::Primary);
        dev.request_thinking(ChannelId::Primary);
        dev.request_speaking(tok(ChannelId::Primary, 1));
        dev.request_speaking(tok(ChannelId::Primary, 2));
        dev.request_idle();
        dev.request_idle();
        assert_eq!(
            *log.lock(),
            vec![DeviceCommand::Thinking, DeviceCommand::Talk, DeviceCommand::Stop]
        );
        assert_eq!(dev.stats().suppressed, 3);
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let (dev, log) = sync();
        dev.request_speaking(tok(ChannelId::Primary, 1));
        dev.request_speaking(tok(ChannelId::Primary, 2));
        dev.finish_speaking(tok(ChannelId::Primary, 1));
        assert_eq!(dev.state(), DeviceState::Speaking(ChannelId::Primary));
        dev.finish_speaking(tok(ChannelId::Primary, 2));
        assert_eq!(dev.state(), DeviceState::Idle);
        assert_eq!(*log.lock(), vec![DeviceCommand::Talk, DeviceCommand::Stop]);
    }

    #[test]
    fn test_gift_preempts_then_hands_back() {
        let (dev, log) = sync();
        dev.request_speaking(tok(ChannelId::Primary, 1));
        dev.request_speaking(tok(ChannelId::Gift, 1));
        dev.finish_speaking(tok(ChannelId::Gift, 1));
        assert_eq!(dev.state(), DeviceState::Speaking(ChannelId::Primary));
        dev.finish_speaking(tok(ChannelId::Primary, 1));
        assert_eq!(
            *log.lock(),
            vec![
                DeviceCommand::Talk,
                DeviceCommand::Gift,
                DeviceCommand::Talk,
                DeviceCommand::Stop
            ]
        );
    }

    #[test]
    fn test_other_channel_cannot_idle_or_think() {
        let (dev, log) = sync();
        dev.request_speaking(tok(ChannelId::Gift, 7));
        dev.request_idle_for(ChannelId::Primary);
        dev.request_thinking(ChannelId::Primary);
        assert_eq!(dev.state(), DeviceState::Speaking(ChannelId::Gift));
        dev.request_idle_for(ChannelId::Gift);
        assert_eq!(*log.lock(), vec![DeviceCommand::Gift, DeviceCommand::GiftStop]);
    }

    #[test]
    fn test_headless_still_tracks_state() {
        let (p, g) = cues();
        let dev = DeviceStateSync::new(Box::new(NullLink::default()), p, g);
        dev.request_speaking(tok(ChannelId::Primary, 1));
        assert_eq!(dev.state(), DeviceState::Speaking(ChannelId::Primary));
        assert_eq!(dev.stats().headless, 1);
        assert_eq!(dev.stats().sent, 0);
    }

    #[test]
    fn test_reset_and_cues() {
        let (dev, log) = sync();
        dev.request_speaking(tok(ChannelId::Primary, 1));
        assert!(dev.send_cue(&DeviceCommand::Happy));
        assert!(dev.reset());
        assert_eq!(dev.state(), DeviceState::Idle);
        assert_eq!(
            *log.lock(),
            vec![DeviceCommand::Talk, DeviceCommand::Happy, DeviceCommand::Reset]
        );
    }
}
