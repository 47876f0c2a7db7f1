use crate::text::{clean_text, truncate, MAX_EVENT_CHARS};
use crate::Event;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Bounded FIFO of pending non-gift events.
///
/// Every operation holds the lock only for the collection update; text
/// normalization runs before the lock is taken.
pub struct EventQueue {
    inner: Mutex<VecDeque<Event>>,
    capacity: usize,
    accepted: AtomicU64,
    rejected: AtomicU64,
    evicted: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub accepted: u64,
    pub rejected: u64,
    pub evicted: u64,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Append `event`, evicting the oldest entry when full. Returns false if
    /// the text is empty after normalization.
    pub fn enqueue(&self, event: Event) -> bool {
        let text = truncate(&clean_text(event.text()), MAX_EVENT_CHARS);
        if text.is_empty() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!("dropping empty event from {}", event.source_id());
            return false;
        }
        let event = event.with_text(text);

        let evicted = {
            let mut q = self.inner.lock();
            let evicted = if q.len() >= self.capacity {
                q.pop_front()
            } else {
                None
            };
            q.push_back(event);
            evicted
        };
        if let Some(old) = evicted {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            debug!("queue full, evicted event {} from {}", old.id(), old.source_id());
        }
        self.accepted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Take everything pending, in arrival order.
    pub fn drain_all(&self) -> Vec<Event> {
        let mut q = self.inner.lock();
        q.drain(..).collect()
    }

    /// Drop everything pending; returns how many events were discarded.
    pub fn clear(&self) -> usize {
        let mut q = self.inner.lock();
        let n = q.len();
        q.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}
