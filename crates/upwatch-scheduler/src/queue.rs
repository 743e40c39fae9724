//! Min-heap of probe deadlines shared by the dispatcher and callers.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use upwatch_core::ServiceId;

/// One pending firing. Only valid while `token` matches the slot's token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry {
    pub at: Instant,
    pub service_id: ServiceId,
    pub token: u64,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.token.cmp(&other.token))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: Mutex<BinaryHeap<Reverse<TimerEntry>>>,
    notify: Notify,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry and wake the dispatcher.
    pub async fn push(&self, entry: TimerEntry) {
        self.heap.lock().await.push(Reverse(entry));
        self.notify.notify_one();
    }

    /// Earliest deadline, if any.
    pub async fn next_deadline(&self) -> Option<Instant> {
        self.heap.lock().await.peek().map(|Reverse(entry)| entry.at)
    }

    /// Pop every entry due at or before `now`, earliest first.
    pub async fn pop_due(&self, now: Instant) -> Vec<TimerEntry> {
        let mut heap = self.heap.lock().await;
        let mut due = Vec::new();
        while heap.peek().is_some_and(|Reverse(entry)| entry.at <= now) {
            if let Some(Reverse(entry)) = heap.pop() {
                due.push(entry);
            }
        }
        due
    }

    /// Resolves after the next `push`.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }

    pub async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.heap.lock().await.is_empty()
    }
}
