//! Consumer signals and the producer trigger fabric.
//!
//! Workers raise signals ("redraw", "derived state ready"); consumers
//! subscribe and wait. Each subscription is a bounded(1) crossbeam
//! channel used as a latch: a notify against a subscriber that has not
//! drained its previous notification is absorbed, so a slow consumer
//! sees one wakeup for any number of missed events and never
//! accumulates a queue.
//!
//! The [`TriggerFabric`] is the other direction: producers request
//! engine passes through it without knowing worker internals.

use std::sync::Mutex;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::time::Duration;

use updraft_core::SubscriberId;

use crate::compute::ComputeHandle;
use crate::scheduler::TriggerHandle;

// ── Signal ───────────────────────────────────────────────────────

struct SignalInner {
    next_id: u64,
    /// Insertion-ordered so notifies hit subscribers deterministically.
    subscribers: IndexMap<SubscriberId, Sender<()>>,
}

/// One named notification channel with edge-coalescing semantics.
pub struct Signal {
    name: &'static str,
    inner: Mutex<SignalInner>,
}

impl Signal {
    /// Create a signal with no subscribers.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(SignalInner {
                next_id: 0,
                subscribers: IndexMap::new(),
            }),
        }
    }

    /// The signal's name, used in log lines.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a new subscriber. Dropping the returned subscription
    /// unregisters it; the registry reaps it on the next notify.
    pub fn subscribe(&self) -> SignalSubscription {
        let mut inner = self.inner.lock().unwrap();
        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;
        let (tx, rx) = crossbeam_channel::bounded(1);
        inner.subscribers.insert(id, tx);
        SignalSubscription { id, rx }
    }

    /// Wake every live subscriber.
    ///
    /// A subscriber whose latch is already full is left as-is (it will
    /// wake once and observe the latest state). Subscribers whose
    /// receiving end is gone are removed.
    pub fn notify(&self) {
        let mut inner = self.inner.lock().unwrap();
        let mut dead: SmallVec<[SubscriberId; 4]> = SmallVec::new();
        for (&id, tx) in &inner.subscribers {
            match tx.try_send(()) {
                Ok(()) => {}
                Err(TrySendError::Full(())) => {}
                Err(TrySendError::Disconnected(())) => dead.push(id),
            }
        }
        for id in dead {
            inner.subscribers.shift_remove(&id);
            log::debug!("signal '{}' dropped dead subscriber {id}", self.name);
        }
    }

    /// Number of live subscribers, as of the last reap.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ── SignalSubscription ───────────────────────────────────────────

/// A consumer's end of a signal.
#[derive(Debug)]
pub struct SignalSubscription {
    id: SubscriberId,
    rx: Receiver<()>,
}

impl SignalSubscription {
    /// This subscription's identity within its signal.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Drain a pending notification without blocking. Returns true if
    /// one was pending.
    pub fn try_take(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// Block until the next notification. Returns false if the signal
    /// itself was dropped.
    pub fn wait(&self) -> bool {
        self.rx.recv().is_ok()
    }

    /// Block until the next notification or `timeout`. Returns true
    /// only when a notification arrived.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

// ── Signals ──────────────────────────────────────────────────────

/// The engine's fixed set of consumer signals.
#[derive(Debug)]
pub struct Signals {
    redraw: Signal,
    derived_ready: Signal,
}

impl Signals {
    pub(crate) fn new() -> Self {
        Self {
            redraw: Signal::new("redraw"),
            derived_ready: Signal::new("derived-ready"),
        }
    }

    /// Raised by the merge worker after every tick: the fused snapshot
    /// may have changed and displays should repaint.
    pub fn redraw(&self) -> &Signal {
        &self.redraw
    }

    /// Raised by the compute worker when a pass produced a derived
    /// result different from the previous one.
    pub fn derived_ready(&self) -> &Signal {
        &self.derived_ready
    }
}

// ── TriggerFabric ────────────────────────────────────────────────

/// Producer-facing triggers for the two engine passes.
///
/// Cheap to clone; handed out by
/// [`FlightSession::fabric`](crate::session::FlightSession::fabric) to
/// driver threads and UI code. The blackboard already schedules a
/// merge after every write, so the fabric is for out-of-band reasons
/// to run a pass: an edited task, a reloaded profile, a test nudging
/// the pipeline.
#[derive(Clone, Debug)]
pub struct TriggerFabric {
    merge: TriggerHandle,
    compute: ComputeHandle,
}

impl TriggerFabric {
    pub(crate) fn new(merge: TriggerHandle, compute: ComputeHandle) -> Self {
        Self { merge, compute }
    }

    /// Request a merge pass.
    pub fn schedule_merge(&self) {
        self.merge.trigger();
    }

    /// Request a compute pass; it runs only if the fix advanced since
    /// the last one.
    pub fn trigger_compute(&self) {
        self.compute.trigger();
    }

    /// Request a compute pass even though no new sensor data arrived.
    pub fn force_compute(&self) {
        self.compute.force_trigger();
    }
}

const _: fn() = || {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Signal>();
    assert_send_sync::<Signals>();
    assert_send_sync::<SignalSubscription>();
    assert_send_sync::<TriggerFabric>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn notify_wakes_subscriber() {
        let signal = Signal::new("test");
        let sub = signal.subscribe();
        assert!(!sub.try_take());
        signal.notify();
        assert!(sub.try_take());
        assert!(!sub.try_take(), "latch drained");
    }

    #[test]
    fn notifications_coalesce_while_undrained() {
        let signal = Signal::new("test");
        let sub = signal.subscribe();
        for _ in 0..5 {
            signal.notify();
        }
        assert!(sub.try_take());
        assert!(!sub.try_take(), "five notifies latch exactly once");
    }

    #[test]
    fn dropped_subscriber_is_reaped_on_notify() {
        let signal = Signal::new("test");
        let a = signal.subscribe();
        let b = signal.subscribe();
        assert_eq!(signal.subscriber_count(), 2);
        assert_ne!(a.id(), b.id());

        drop(a);
        signal.notify();
        assert_eq!(signal.subscriber_count(), 1);
        assert!(b.try_take());
    }

    #[test]
    fn wait_blocks_until_notify() {
        let signal = std::sync::Arc::new(Signal::new("test"));
        let sub = signal.subscribe();

        let notifier = {
            let signal = std::sync::Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                signal.notify();
            })
        };

        assert!(sub.wait_timeout(Duration::from_secs(2)));
        notifier.join().unwrap();
    }

    #[test]
    fn wait_timeout_expires_quietly() {
        let signal = Signal::new("test");
        let sub = signal.subscribe();
        assert!(!sub.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn subscriber_ids_are_never_reused() {
        let signal = Signal::new("test");
        let a_id = signal.subscribe().id();
        // First subscription dropped; reaped on next notify.
        signal.notify();
        let b = signal.subscribe();
        assert_ne!(a_id, b.id());
    }
}
