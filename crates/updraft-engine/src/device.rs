//! Device setting fan-out: registered sinks and the bridge's
//! change-detection state.
//!
//! When a device reports a setting (the pilot turned a knob on an
//! instrument), the merge worker collects the change under the
//! blackboard lock, applies it to the shared computation settings, and
//! echoes it to every other registered device so the cockpit stays in
//! agreement. Each change forwards exactly once: the bridge keeps
//! last-forwarded validity marks per device and absorbs echoes whose
//! value already matches the settings.

use std::sync::Mutex;

use indexmap::IndexMap;
use smallvec::SmallVec;

use updraft_core::{ComputeSettings, DeviceId, SensorSnapshot, SettingsSink, Validity};

// ── Setting changes ──────────────────────────────────────────────

/// Which shared setting a device reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SettingKind {
    MacCready,
    Ballast,
    Bugs,
    Qnh,
}

/// One device-reported change captured during a merge tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SettingChange {
    pub device: DeviceId,
    pub kind: SettingKind,
    pub value: f64,
}

impl SettingChange {
    /// Write this change into the shared settings.
    pub(crate) fn apply(&self, settings: &mut ComputeSettings) {
        match self.kind {
            SettingKind::MacCready => settings.mac_cready = self.value,
            SettingKind::Ballast => settings.ballast_fraction = self.value,
            SettingKind::Bugs => settings.bugs = self.value,
            SettingKind::Qnh => settings.qnh_hpa = self.value,
        }
    }

    /// True when the settings already carry this value, within the
    /// per-kind tolerance devices round to.
    fn already_applied(&self, settings: &ComputeSettings) -> bool {
        match self.kind {
            SettingKind::MacCready => (self.value - settings.mac_cready).abs() <= 0.01,
            SettingKind::Ballast => (self.value - settings.ballast_fraction).abs() <= 0.01,
            SettingKind::Bugs => (self.value - settings.bugs).abs() <= 0.01,
            SettingKind::Qnh => (self.value - settings.qnh_hpa).abs() <= 0.05,
        }
    }
}

/// Scratch list for one tick's collected changes.
pub(crate) type SettingChanges = SmallVec<[SettingChange; 4]>;

// ── BridgeState ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default)]
struct SeenMarks {
    mac_cready: Validity,
    ballast: Validity,
    bugs: Validity,
    qnh: Validity,
}

/// Last-forwarded marks per device slot.
///
/// Owned by the merge worker; `collect` runs under the blackboard lock
/// and is a handful of comparisons per device.
#[derive(Debug)]
pub(crate) struct BridgeState {
    seen: Vec<SeenMarks>,
}

impl BridgeState {
    pub(crate) fn new(device_count: usize) -> Self {
        Self {
            seen: vec![SeenMarks::default(); device_count],
        }
    }

    /// Gather device-reported setting values whose validity advanced
    /// past the last-forwarded mark. A value that merely echoes the
    /// current settings updates its mark without producing a change, so
    /// push-backs never re-trigger themselves.
    pub(crate) fn collect<'a>(
        &mut self,
        slots: impl Iterator<Item = &'a SensorSnapshot>,
        settings: &ComputeSettings,
    ) -> SettingChanges {
        let mut changes = SettingChanges::new();
        for (index, snapshot) in slots.enumerate() {
            let Some(marks) = self.seen.get_mut(index) else {
                break;
            };
            let report = &snapshot.settings;
            let device = DeviceId(index);

            let candidates = [
                (
                    SettingKind::MacCready,
                    report.mac_cready,
                    report.mac_cready_available,
                    &mut marks.mac_cready,
                ),
                (
                    SettingKind::Ballast,
                    report.ballast_fraction,
                    report.ballast_available,
                    &mut marks.ballast,
                ),
                (
                    SettingKind::Bugs,
                    report.bugs,
                    report.bugs_available,
                    &mut marks.bugs,
                ),
                (
                    SettingKind::Qnh,
                    report.qnh_hpa,
                    report.qnh_available,
                    &mut marks.qnh,
                ),
            ];
            for (kind, value, available, mark) in candidates {
                if !available.modified_since(*mark) {
                    continue;
                }
                *mark = available;
                let change = SettingChange {
                    device,
                    kind,
                    value,
                };
                if !change.already_applied(settings) {
                    changes.push(change);
                }
            }
        }
        changes
    }
}

// ── SinkRegistry ─────────────────────────────────────────────────

/// Registered outgoing-setting channels, one per device slot.
pub(crate) struct SinkRegistry {
    sinks: Mutex<IndexMap<DeviceId, Box<dyn SettingsSink>>>,
}

impl SinkRegistry {
    pub(crate) fn new() -> Self {
        Self {
            sinks: Mutex::new(IndexMap::new()),
        }
    }

    /// Register (or replace) the sink for a device slot.
    pub(crate) fn register(&self, device: DeviceId, sink: Box<dyn SettingsSink>) {
        let previous = self.sinks.lock().unwrap().insert(device, sink);
        if previous.is_some() {
            log::debug!("replaced settings sink for device {device}");
        }
    }

    /// Remove a device's sink, if any.
    pub(crate) fn unregister(&self, device: DeviceId) {
        self.sinks.lock().unwrap().shift_remove(&device);
    }

    /// Push `change` to every registered sink except the device that
    /// reported it. Sink failures are logged and skipped; one deaf
    /// device never blocks the rest.
    pub(crate) fn fan_out(&self, change: &SettingChange) {
        let mut sinks = self.sinks.lock().unwrap();
        for (&device, sink) in sinks.iter_mut() {
            if device == change.device {
                continue;
            }
            let result = match change.kind {
                SettingKind::MacCready => sink.put_mac_cready(change.value),
                SettingKind::Ballast => sink.put_ballast(change.value),
                SettingKind::Bugs => sink.put_bugs(change.value),
                SettingKind::Qnh => sink.put_qnh(change.value),
            };
            match result {
                Ok(()) => {}
                Err(updraft_core::DeviceError::Unsupported) => {
                    log::debug!("device {device} does not accept {:?}", change.kind);
                }
                Err(e) => {
                    log::warn!("settings push to device {device} failed: {e}");
                }
            }
        }
    }

    /// Push a direct command to every registered sink. Unlike the
    /// bridged settings there is no reporting device to skip and no
    /// merged state to echo-absorb; the same failure policy applies.
    pub(crate) fn broadcast(
        &self,
        what: &str,
        mut put: impl FnMut(&mut dyn SettingsSink) -> Result<(), updraft_core::DeviceError>,
    ) {
        let mut sinks = self.sinks.lock().unwrap();
        for (&device, sink) in sinks.iter_mut() {
            match put(sink.as_mut()) {
                Ok(()) => {}
                Err(updraft_core::DeviceError::Unsupported) => {
                    log::debug!("device {device} does not accept {what}");
                }
                Err(e) => {
                    log::warn!("{what} push to device {device} failed: {e}");
                }
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("sinks", &self.sinks.lock().unwrap().len())
            .finish()
    }
}

const _: fn() = || {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SinkRegistry>();
};
