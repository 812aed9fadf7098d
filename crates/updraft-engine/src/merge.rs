//! The merge worker: folds the winning source into the current
//! snapshot, runs the cheap calculators, and bridges device settings.

use std::sync::Arc;

use updraft_core::CancelToken;

use crate::blackboard::Blackboard;
use crate::calc::CalcState;
use crate::compute::ComputeHandle;
use crate::device::{BridgeState, SinkRegistry};
use crate::scheduler::Tickable;
use crate::signals::Signals;

/// Tick body of the merge worker.
///
/// Owns the calculator and bridge state; nothing else reads them, so
/// they need no lock of their own.
pub(crate) struct MergeTick {
    blackboard: Arc<Blackboard>,
    signals: Arc<Signals>,
    sinks: Arc<SinkRegistry>,
    compute: ComputeHandle,
    calc: CalcState,
    bridge: BridgeState,
}

impl MergeTick {
    pub(crate) fn new(
        blackboard: Arc<Blackboard>,
        signals: Arc<Signals>,
        sinks: Arc<SinkRegistry>,
        compute: ComputeHandle,
    ) -> Self {
        let devices = blackboard.device_count();
        Self {
            blackboard,
            signals,
            sinks,
            compute,
            calc: CalcState::new(),
            bridge: BridgeState::new(devices),
        }
    }
}

impl Tickable for MergeTick {
    fn tick(&mut self, _cancel: &CancelToken) {
        // The settings lock and the blackboard lock are taken one
        // after the other, never together.
        let settings = self.compute.settings();
        let outcome = self
            .blackboard
            .merge_cycle(&mut self.calc, &mut self.bridge, &settings);

        if !outcome.changes.is_empty() {
            for change in &outcome.changes {
                log::debug!(
                    "device {} reported {:?} = {}",
                    change.device,
                    change.kind,
                    change.value
                );
                self.compute.apply_change(change);
                self.sinks.fan_out(change);
            }
            // One forced pass per batch, not one per change.
            self.compute.force_trigger();
        }

        if outcome.summary.fix_event() {
            self.compute.trigger();
        }

        self.signals.redraw().notify();
    }
}
