use crate::NpcContext;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct CoreGauges {
    pub queue_len: IntGauge,
    pub queue_accepted: IntGauge,
    pub queue_rejected: IntGauge,
    pub queue_evicted: IntGauge,
    pub batches: IntGauge,
    pub spurious_wakes: IntGauge,
    pub stale_replies: IntGauge,
    pub mode_changes: IntGauge,
    pub content_fallbacks: IntGauge,
    pub device_sent: IntGauge,
    pub device_suppressed: IntGauge,
    pub device_headless: IntGauge,
    pub primary_utterances: IntGauge,
    pub gift_utterances: IntGauge,
    pub llm_calls: IntGauge,
    pub llm_timeouts: IntGauge,
    pub anti_spam: IntGauge,
    pub gifts_received: IntGauge,
    pub gift_celebrations: IntGauge,
    pub gift_streak: IntGauge,
}

/// Prometheus view of the core's counters, refreshed by [`MetricsHub::observe`].
#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub core: CoreGauges,
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, String> {
    let g = IntGauge::new(name, help).map_err(|e| format!("metrics init error: {e}"))?;
    registry
        .register(Box::new(g.clone()))
        .map_err(|e| format!("metrics register error: {e}"))?;
    Ok(g)
}

fn as_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let r = &registry;
        let core = CoreGauges {
            queue_len: gauge(r, "npc_queue_len", "Events waiting for the debounce consumer")?,
            queue_accepted: gauge(r, "npc_queue_accepted", "Events accepted into the queue")?,
            queue_rejected: gauge(r, "npc_queue_rejected", "Events dropped as empty after cleanup")?,
            queue_evicted: gauge(r, "npc_queue_evicted", "Events evicted by overflow")?,
            batches: gauge(r, "npc_batches", "Batches answered")?,
            spurious_wakes: gauge(r, "npc_spurious_wakes", "Wakes that found an empty queue")?,
            stale_replies: gauge(r, "npc_stale_replies", "Replies dropped because the mode switched")?,
            mode_changes: gauge(r, "npc_mode_changes", "Mode transitions")?,
            content_fallbacks: gauge(r, "npc_content_fallbacks", "Replies replaced by a fallback line")?,
            device_sent: gauge(r, "npc_device_sent", "Commands written to the device")?,
            device_suppressed: gauge(r, "npc_device_suppressed", "Redundant device transitions collapsed")?,
            device_headless: gauge(r, "npc_device_headless", "Commands skipped with no device connected")?,
            primary_utterances: gauge(r, "npc_primary_utterances", "Utterances started on the primary channel")?,
            gift_utterances: gauge(r, "npc_gift_utterances", "Utterances started on the gift channel")?,
            llm_calls: gauge(r, "npc_llm_calls", "Language model requests")?,
            llm_timeouts: gauge(r, "npc_llm_timeouts", "Language model requests abandoned at the deadline")?,
            anti_spam: gauge(r, "npc_anti_spam", "Repeated questions answered with the anti-spam line")?,
            gifts_received: gauge(r, "npc_gifts_received", "Gifts acknowledged")?,
            gift_celebrations: gauge(r, "npc_gift_celebrations", "Streak celebrations")?,
            gift_streak: gauge(r, "npc_gift_streak", "Current gift streak")?,
        };
        Ok(Self { registry, core })
    }

    /// Copy the current counters of `ctx` into the gauges.
    pub fn observe(&self, ctx: &NpcContext) {
        let c = &self.core;
        let queue = ctx.queue().stats();
        c.queue_len.set(as_i64(ctx.queue().len() as u64));
        c.queue_accepted.set(as_i64(queue.accepted));
        c.queue_rejected.set(as_i64(queue.rejected));
        c.queue_evicted.set(as_i64(queue.evicted));

        let debounce = ctx.debounce().stats();
        c.batches.set(as_i64(debounce.batches));
        c.spurious_wakes.set(as_i64(debounce.spurious_wakes));
        c.stale_replies.set(as_i64(debounce.stale_replies));
        c.mode_changes.set(as_i64(ctx.router().mode_changes()));
        c.content_fallbacks.set(as_i64(ctx.router().fallbacks()));

        let device = ctx.device().stats();
        c.device_sent.set(as_i64(device.sent));
        c.device_suppressed.set(as_i64(device.suppressed));
        c.device_headless.set(as_i64(device.headless));
        c.primary_utterances.set(as_i64(ctx.primary().stats().started));
        c.gift_utterances.set(as_i64(ctx.gift().stats().started));

        if let Some(chat) = ctx.chat() {
            let chat = chat.stats();
            c.llm_calls.set(as_i64(chat.llm_calls));
            c.llm_timeouts.set(as_i64(chat.timeouts));
            c.anti_spam.set(as_i64(chat.anti_spam));
        }

        let gifts = ctx.dual().stats();
        c.gifts_received.set(as_i64(gifts.received));
        c.gift_celebrations.set(as_i64(gifts.celebrations));
        c.gift_streak.set(i64::from(ctx.dual().streak().count));
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Event, NpcConfig};

    #[test]
    fn test_observe_and_encode() {
        let ctx = NpcContext::builder(NpcConfig::default()).build().unwrap();
        ctx.queue().enqueue(Event::comment("ana", "hola"));
        let hub = MetricsHub::new().unwrap();
        hub.observe(&ctx);
        assert_eq!(hub.core.queue_accepted.get(), 1);
        let text = hub.encode_text();
        assert!(text.contains("npc_queue_accepted 1"));
        assert!(text.contains("npc_gift_streak 0"));
        ctx.shutdown();
    }
}
