//! Per-consumer broadcast signaling between one producer and many consumers.
//!
//! Each registered consumer owns a signaled flag. The producer's
//! [`BroadcastSignal::notify`] raises every lowered flag and wakes the
//! consumer behind it; a consumer's wait/clear cycle lowers its own flag
//! again. A consumer that stops clearing (dead connection) leaves its flag
//! raised, which is exactly the staleness condition `notify` reclaims.
//! The producer never blocks on any consumer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::trace;

/// Identifies one logical consumer (one streaming connection) for its
/// lifetime. Never reused across connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

/// How a [`BroadcastSignal::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A new frame was published since the consumer's last clear.
    Signaled,
    /// The producer shut down; no further signal will come this period.
    Closed,
}

struct Slot {
    signaled: bool,
    activity: Instant,
    notify: Arc<Notify>,
}

impl Slot {
    fn new() -> Self {
        Self {
            signaled: false,
            activity: Instant::now(),
            notify: Arc::new(Notify::new()),
        }
    }
}

struct Table {
    slots: HashMap<ConsumerId, Slot>,
    next_id: u64,
    closed: bool,
}

pub struct BroadcastSignal {
    table: Mutex<Table>,
    stale_after: Duration,
}

impl BroadcastSignal {
    /// `stale_after` bounds how long a signaled-but-uncleared consumer stays
    /// registered across [`notify`](Self::notify) calls.
    pub fn new(stale_after: Duration) -> Self {
        Self {
            table: Mutex::new(Table {
                slots: HashMap::new(),
                next_id: 0,
                closed: false,
            }),
            stale_after,
        }
    }

    /// Register a new consumer. Flag starts lowered, activity starts now.
    pub fn register(&self) -> ConsumerId {
        let mut table = self.table.lock().unwrap();
        let id = ConsumerId(table.next_id);
        table.next_id += 1;
        table.slots.insert(id, Slot::new());
        id
    }

    /// Drop a consumer's slot. Idempotent; a stale sweep may get there first.
    pub fn deregister(&self, id: ConsumerId) {
        let mut table = self.table.lock().unwrap();
        table.slots.remove(&id);
    }

    /// Suspend until `id` has been signaled since its last clear.
    ///
    /// An unseen `id` is registered on entry, atomically with the flag check:
    /// the table lock covers both, and wakeups carry a permit, so a `notify`
    /// landing between the check and the suspension still wakes this waiter.
    /// The lock is never held while suspended.
    pub async fn wait(&self, id: ConsumerId) -> WaitOutcome {
        loop {
            let notify = {
                let mut table = self.table.lock().unwrap();
                let closed = table.closed;
                let slot = table.slots.entry(id).or_insert_with(Slot::new);
                if slot.signaled {
                    return WaitOutcome::Signaled;
                }
                if closed {
                    return WaitOutcome::Closed;
                }
                Arc::clone(&slot.notify)
            };
            // A permit stored by notify_one survives this gap.
            notify.notified().await;
        }
    }

    /// Lower `id`'s flag and refresh its activity timestamp. Called by the
    /// consumer after it has taken the current frame, before the next wait.
    pub fn clear(&self, id: ConsumerId) {
        let mut table = self.table.lock().unwrap();
        if let Some(slot) = table.slots.get_mut(&id) {
            slot.signaled = false;
            slot.activity = Instant::now();
        }
    }

    /// Producer side: raise every lowered flag and wake its consumer, then
    /// reclaim every consumer whose flag has stayed raised longer than the
    /// staleness window. Returns the number reclaimed. Never blocks.
    pub fn notify(&self) -> usize {
        let now = Instant::now();
        let mut table = self.table.lock().unwrap();
        let mut stale = Vec::new();
        for (&id, slot) in table.slots.iter_mut() {
            if !slot.signaled {
                slot.signaled = true;
                slot.activity = now;
                slot.notify.notify_one();
            } else if now.duration_since(slot.activity) > self.stale_after {
                stale.push(id);
            }
        }
        for id in &stale {
            trace!(?id, "reclaiming stale consumer");
            table.slots.remove(id);
        }
        stale.len()
    }

    /// Producer side, on shutdown: wake every waiter so it observes
    /// [`WaitOutcome::Closed`] instead of blocking into the next period.
    /// Consumers already signaled still consume their final frame first.
    pub fn close(&self) {
        let mut table = self.table.lock().unwrap();
        table.closed = true;
        for slot in table.slots.values() {
            slot.notify.notify_one();
        }
    }

    /// Producer side, on startup of a new running period.
    pub fn reopen(&self) {
        let mut table = self.table.lock().unwrap();
        table.closed = false;
    }

    pub fn consumer_count(&self) -> usize {
        self.table.lock().unwrap().slots.len()
    }

    #[cfg(test)]
    fn is_registered(&self, id: ConsumerId) -> bool {
        self.table.lock().unwrap().slots.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{sleep, timeout};

    const STALE: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn notify_before_wait_is_not_missed() {
        let signal = BroadcastSignal::new(STALE);
        let id = signal.register();
        signal.notify();
        let outcome = timeout(Duration::from_secs(1), signal.wait(id))
            .await
            .expect("wait should return immediately");
        assert_eq!(outcome, WaitOutcome::Signaled);
    }

    #[tokio::test]
    async fn wait_blocks_until_notify() {
        let signal = Arc::new(BroadcastSignal::new(STALE));
        let id = signal.register();

        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.wait(id).await })
        };

        sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        signal.notify();
        let outcome = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Signaled);
    }

    #[tokio::test]
    async fn clear_lowers_the_flag() {
        let signal = BroadcastSignal::new(STALE);
        let id = signal.register();
        signal.notify();
        assert_eq!(signal.wait(id).await, WaitOutcome::Signaled);
        signal.clear(id);

        // Lowered again: a fresh wait must block until the next notify.
        let blocked = timeout(Duration::from_millis(30), signal.wait(id)).await;
        assert!(blocked.is_err());
    }

    #[tokio::test]
    async fn wait_registers_unseen_consumer() {
        let signal = Arc::new(BroadcastSignal::new(STALE));
        let id = signal.register();
        signal.deregister(id);
        assert_eq!(signal.consumer_count(), 0);

        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.wait(id).await })
        };
        sleep(Duration::from_millis(20)).await;
        assert_eq!(signal.consumer_count(), 1);

        signal.notify();
        assert_eq!(waiter.await.unwrap(), WaitOutcome::Signaled);
    }

    #[tokio::test]
    async fn all_stale_consumers_reclaimed_in_one_sweep() {
        let signal = BroadcastSignal::new(STALE);
        let abandoned: Vec<_> = (0..3).map(|_| signal.register()).collect();
        let live = signal.register();

        // Everyone gets signaled; nobody clears except the live consumer.
        signal.notify();
        assert_eq!(signal.wait(live).await, WaitOutcome::Signaled);
        signal.clear(live);

        std::thread::sleep(STALE + Duration::from_millis(10));
        let reclaimed = signal.notify();
        assert_eq!(reclaimed, 3);
        for id in abandoned {
            assert!(!signal.is_registered(id));
        }
        assert!(signal.is_registered(live));
    }

    #[tokio::test]
    async fn close_unblocks_waiters() {
        let signal = Arc::new(BroadcastSignal::new(STALE));
        let id = signal.register();

        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.wait(id).await })
        };
        sleep(Duration::from_millis(20)).await;

        signal.close();
        let outcome = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("close should wake the waiter")
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Closed);
    }

    #[tokio::test]
    async fn signaled_consumer_still_takes_final_frame_after_close() {
        let signal = BroadcastSignal::new(STALE);
        let id = signal.register();
        signal.notify();
        signal.close();
        // The raised flag wins over the closed state.
        assert_eq!(signal.wait(id).await, WaitOutcome::Signaled);
        signal.clear(id);
        assert_eq!(signal.wait(id).await, WaitOutcome::Closed);
    }

    #[tokio::test]
    async fn reopen_allows_a_new_period() {
        let signal = BroadcastSignal::new(STALE);
        let id = signal.register();
        signal.close();
        assert_eq!(signal.wait(id).await, WaitOutcome::Closed);
        signal.reopen();
        signal.notify();
        assert_eq!(signal.wait(id).await, WaitOutcome::Signaled);
    }
}
