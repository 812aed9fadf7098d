//! The scheduled worker base: a named thread with a sticky trigger.
//!
//! Both engine workers (merge and compute) are instances of
//! [`ScheduledWorker`] with different tick bodies. The worker owns one
//! OS thread that parks until triggered, debounces bursts of triggers
//! into a single tick, enforces a minimum spacing between tick starts,
//! and rests after each tick. All control flows through one mutex and
//! one condvar, so every sleep is interruptible by `trigger()` and
//! `stop()`.
//!
//! ```text
//! trigger() ──┐
//!             v
//!   [boundary: stop? suspend? pending?]
//!             v pending
//!   [delay: coalesce trigger burst]
//!             v
//!   [period_min: spacing from last tick start]
//!             v
//!   consume pending, tick(cancel)
//!             v
//!   [idle_min: unconditional rest]
//!             └──> back to boundary
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use updraft_core::CancelToken;

// ── WorkerTiming ─────────────────────────────────────────────────

/// Timing parameters for one scheduled worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerTiming {
    /// Minimum spacing between tick starts. Continuous triggers produce
    /// ticks no closer than this, start to start.
    pub period_min: Duration,
    /// Unconditional rest after each tick. Caps worst-case CPU use on
    /// a busy bus. Triggers arriving during the rest stay pending.
    pub idle_min: Duration,
    /// Wait between a trigger arriving and the tick running. Triggers
    /// landing during the wait coalesce into the same tick because the
    /// pending flag is consumed only after it.
    pub delay: Duration,
}

// ── Worker state ─────────────────────────────────────────────────

/// Lifecycle state of a scheduled worker, observable from any thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, thread not yet spawned.
    Idle,
    /// Thread running, ticking on triggers.
    Running,
    /// Thread parked at a tick boundary until resume.
    Suspended,
    /// Stop requested, thread winding down.
    Stopping,
    /// Thread exited.
    Stopped,
}

// ── Tickable ─────────────────────────────────────────────────────

/// The body a scheduled worker runs.
pub trait Tickable: Send {
    /// Run one unit of work.
    ///
    /// Never invoked concurrently with itself and never while the
    /// worker is suspended. Infallible by signature: implementations
    /// absorb their own failures and log them. `cancel` fires when the
    /// worker is told to stop, letting long passes bail at their own
    /// checkpoints.
    fn tick(&mut self, cancel: &CancelToken);
}

// ── Shared control block ─────────────────────────────────────────

#[derive(Debug)]
struct Control {
    state: WorkerState,
    /// Sticky trigger. Set by `trigger()`, consumed at tick start.
    pending: bool,
    suspend: bool,
    stop: bool,
}

struct Shared {
    ctl: Mutex<Control>,
    cv: Condvar,
    cancel: CancelToken,
}

/// Cheap cloneable handle that requests a tick from a worker.
#[derive(Clone)]
pub struct TriggerHandle {
    shared: Arc<Shared>,
}

impl TriggerHandle {
    /// Request one tick. Sticky and coalescing: any number of calls
    /// before the next tick cause exactly one extra tick. Callable from
    /// any thread in any worker state.
    pub fn trigger(&self) {
        let mut ctl = self.shared.ctl.lock().unwrap();
        ctl.pending = true;
        drop(ctl);
        self.shared.cv.notify_all();
    }
}

impl std::fmt::Debug for TriggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerHandle").finish()
    }
}

// ── ScheduledWorker ──────────────────────────────────────────────

/// A named worker thread driven by a sticky trigger.
///
/// The tick body moves into the thread on [`start`](Self::start);
/// control stays here. Dropping the worker stops and joins it.
pub struct ScheduledWorker {
    name: &'static str,
    timing: WorkerTiming,
    shared: Arc<Shared>,
    tickable: Option<Box<dyn Tickable>>,
    thread: Option<JoinHandle<()>>,
}

impl ScheduledWorker {
    /// Create a worker in the [`Idle`](WorkerState::Idle) state.
    pub fn new(name: &'static str, timing: WorkerTiming, tickable: Box<dyn Tickable>) -> Self {
        Self {
            name,
            timing,
            shared: Arc::new(Shared {
                ctl: Mutex::new(Control {
                    state: WorkerState::Idle,
                    pending: false,
                    suspend: false,
                    stop: false,
                }),
                cv: Condvar::new(),
                cancel: CancelToken::new(),
            }),
            tickable: Some(tickable),
            thread: None,
        }
    }

    /// The worker's thread name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.shared.ctl.lock().unwrap().state
    }

    /// A handle for waking this worker from other threads.
    pub fn trigger_handle(&self) -> TriggerHandle {
        TriggerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Request one tick. See [`TriggerHandle::trigger`].
    pub fn trigger(&self) {
        self.trigger_handle().trigger();
    }

    /// Spawn the worker thread. No-op unless the worker is Idle.
    pub fn start(&mut self) {
        {
            let mut ctl = self.shared.ctl.lock().unwrap();
            if ctl.state != WorkerState::Idle {
                log::warn!("worker '{}' start ignored in state {:?}", self.name, ctl.state);
                return;
            }
            ctl.state = WorkerState::Running;
        }

        let tickable = match self.tickable.take() {
            Some(t) => t,
            None => return,
        };
        let shared = Arc::clone(&self.shared);
        let timing = self.timing;
        let name = self.name;
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || run_loop(&shared, timing, tickable, name))
            .expect("failed to spawn worker thread");
        self.thread = Some(handle);
        log::debug!("worker '{}' started", self.name);
    }

    /// Ask the worker to park at its next tick boundary. The running
    /// tick, if any, completes first.
    pub fn suspend(&self) {
        let mut ctl = self.shared.ctl.lock().unwrap();
        ctl.suspend = true;
        drop(ctl);
        self.shared.cv.notify_all();
    }

    /// Wake a suspended worker. Pending triggers accumulated while
    /// suspended run normally.
    pub fn resume(&self) {
        let mut ctl = self.shared.ctl.lock().unwrap();
        ctl.suspend = false;
        drop(ctl);
        self.shared.cv.notify_all();
    }

    /// Request termination and fire the cancel token. Observed at the
    /// next tick boundary or cancel checkpoint; callers await the
    /// thread separately via [`join`](Self::join).
    pub fn stop(&self) {
        let mut ctl = self.shared.ctl.lock().unwrap();
        ctl.stop = true;
        match ctl.state {
            WorkerState::Idle => ctl.state = WorkerState::Stopped,
            WorkerState::Running | WorkerState::Suspended => ctl.state = WorkerState::Stopping,
            WorkerState::Stopping | WorkerState::Stopped => {}
        }
        drop(ctl);
        self.shared.cancel.set();
        self.shared.cv.notify_all();
    }

    /// Join the worker thread. Returns false if the thread panicked.
    /// Harmless to call on a never-started worker.
    pub fn join(&mut self) -> bool {
        match self.thread.take() {
            Some(handle) => handle.join().is_ok(),
            None => true,
        }
    }
}

impl Drop for ScheduledWorker {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

impl std::fmt::Debug for ScheduledWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledWorker")
            .field("name", &self.name)
            .field("timing", &self.timing)
            .field("state", &self.state())
            .finish()
    }
}

// ── Worker loop ──────────────────────────────────────────────────

/// Wait on the condvar until `deadline`, returning early when stop or
/// (if `heed_suspend`) suspend is requested.
fn wait_until<'a>(
    shared: &'a Shared,
    mut ctl: MutexGuard<'a, Control>,
    deadline: Instant,
    heed_suspend: bool,
) -> MutexGuard<'a, Control> {
    loop {
        if ctl.stop || (heed_suspend && ctl.suspend) {
            return ctl;
        }
        let now = Instant::now();
        if now >= deadline {
            return ctl;
        }
        let (guard, _) = shared.cv.wait_timeout(ctl, deadline - now).unwrap();
        ctl = guard;
    }
}

fn run_loop(shared: &Shared, timing: WorkerTiming, mut tickable: Box<dyn Tickable>, name: &str) {
    let mut last_start: Option<Instant> = None;
    let mut ctl = shared.ctl.lock().unwrap();

    'outer: loop {
        // Tick boundary: park until triggered, honoring suspend first.
        loop {
            if ctl.stop {
                break 'outer;
            }
            if ctl.suspend {
                if ctl.state != WorkerState::Suspended {
                    ctl.state = WorkerState::Suspended;
                    log::debug!("worker '{name}' suspended");
                }
                ctl = shared.cv.wait(ctl).unwrap();
                continue;
            }
            if ctl.state == WorkerState::Suspended {
                ctl.state = WorkerState::Running;
                log::debug!("worker '{name}' resumed");
            }
            if ctl.pending {
                break;
            }
            ctl = shared.cv.wait(ctl).unwrap();
        }

        // Debounce so a burst of triggers lands in one tick. Pending is
        // not consumed yet: triggers arriving now coalesce.
        if !timing.delay.is_zero() {
            ctl = wait_until(shared, ctl, Instant::now() + timing.delay, true);
            if ctl.stop || ctl.suspend {
                continue 'outer;
            }
        }

        // Enforce minimum spacing between tick starts.
        if let Some(prev) = last_start {
            ctl = wait_until(shared, ctl, prev + timing.period_min, true);
            if ctl.stop || ctl.suspend {
                continue 'outer;
            }
        }

        ctl.pending = false;
        drop(ctl);
        last_start = Some(Instant::now());
        tickable.tick(&shared.cancel);
        ctl = shared.ctl.lock().unwrap();

        // Unconditional rest. Only stop cuts it short; a suspend is
        // picked up at the boundary.
        if !timing.idle_min.is_zero() {
            ctl = wait_until(shared, ctl, Instant::now() + timing.idle_min, false);
        }
    }

    ctl.state = WorkerState::Stopped;
    drop(ctl);
    shared.cv.notify_all();
    log::debug!("worker '{name}' stopped");
}

const _: fn() = || {
    fn assert_send_sync<T: Send + Sync>() {}
    fn assert_send<T: Send>() {}
    assert_send_sync::<TriggerHandle>();
    assert_send::<ScheduledWorker>();
};
