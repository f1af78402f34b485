use crate::ootx::OotxDecoder;
use crate::payload::decode_calibration;
use crate::slots::LighthouseTable;
use crate::sweep::SweepAccumulator;
use crate::sync::SyncTracker;
use crate::timing::{MAX_PULSE_LENGTH, SYNC_THRESHOLD};
use lh_core::{
    Axis, LighthouseCalibration, MeasurementBundle, PulseEvent, MAX_NUM_LIGHTHOUSES,
    MAX_NUM_SENSORS,
};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Receives the products of light-capture decoding.
pub trait LightcapListener {
    /// A lighthouse calibration record was decoded (or refreshed).
    fn on_lighthouse(&mut self, _record: &LighthouseCalibration) {}
    /// A sweep cycle completed for an identified lighthouse.
    fn on_measurement(&mut self, _bundle: MeasurementBundle) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseClass {
    Malformed,
    Sync,
    Sweep,
}

/// Classify a raw pulse by sensor index and length.
pub fn classify(pulse: &PulseEvent) -> PulseClass {
    if usize::from(pulse.sensor) >= MAX_NUM_SENSORS || pulse.duration > MAX_PULSE_LENGTH {
        PulseClass::Malformed
    } else if pulse.duration > SYNC_THRESHOLD {
        PulseClass::Sync
    } else {
        PulseClass::Sweep
    }
}

/// Decoding state of one tracker.
#[derive(Debug, Clone)]
pub struct TrackerLightcap {
    serial: String,
    sync: SyncTracker,
    sweep: SweepAccumulator,
    ootx: [OotxDecoder; MAX_NUM_LIGHTHOUSES],
    /// Lighthouse table slot identified through each per-cycle slot's OOTX stream.
    lighthouse: [Option<usize>; MAX_NUM_LIGHTHOUSES],
}

impl TrackerLightcap {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            sync: SyncTracker::default(),
            sweep: SweepAccumulator::default(),
            ootx: Default::default(),
            lighthouse: [None; MAX_NUM_LIGHTHOUSES],
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn sync(&self) -> &SyncTracker {
        &self.sync
    }

    pub fn ootx(&self, slot: usize) -> Option<&OotxDecoder> {
        self.ootx.get(slot)
    }

    fn handle_sync(
        &mut self,
        table: &mut LighthouseTable,
        pulse: &PulseEvent,
        listener: &mut impl LightcapListener,
    ) {
        let acode = self.sync.demodulate(pulse.duration);
        self.flush(table, listener);
        let sync = self.sync.on_sync(pulse.timecode, pulse.duration, acode);
        let Some(decoder) = self.ootx.get_mut(sync.slot) else {
            return;
        };
        let Some(payload) = decoder.feed(sync.bit) else {
            return;
        };
        let record = match decode_calibration(&payload, pulse.timecode) {
            Ok(record) => record,
            Err(err) => {
                warn!("tracker {}: dropping OOTX packet: {err}", self.serial);
                return;
            }
        };
        if let Some(idx) = table.register(record.clone()) {
            if self.lighthouse[sync.slot] != Some(idx) {
                info!(
                    "tracker {}: slot {} is lighthouse {}",
                    self.serial, sync.slot, record.serial
                );
            }
            self.lighthouse[sync.slot] = Some(idx);
            listener.on_lighthouse(&record);
        }
    }

    fn handle_sweep(&mut self, pulse: &PulseEvent) {
        if self.sync.select_active().is_none() {
            return;
        }
        self.sweep
            .record(usize::from(pulse.sensor), pulse.timecode, pulse.duration);
    }

    /// Emit the accumulated sweep as a bundle and clear it.
    ///
    /// Nothing is emitted until the active slot's lighthouse is known.
    fn flush(&mut self, table: &LighthouseTable, listener: &mut impl LightcapListener) {
        if self.sweep.is_empty() {
            return;
        }
        let Some(active) = self.sync.active() else {
            self.sweep.clear();
            return;
        };
        let hits = self.sweep.drain(active.start_time);
        let Some(record) = self.lighthouse[active.slot].and_then(|idx| table.get(idx)) else {
            debug!(
                "tracker {}: {} hits from unidentified slot {} discarded",
                self.serial,
                hits.len(),
                active.slot
            );
            return;
        };
        listener.on_measurement(MeasurementBundle {
            lighthouse: record.serial.clone(),
            tracker: self.serial.clone(),
            axis: Axis::from_acode(active.acode),
            sync_time: active.start_time,
            hits,
        });
    }
}

/// Light-capture decoder for all trackers sharing one set of lighthouses.
#[derive(Debug, Clone, Default)]
pub struct LightcapDriver {
    lighthouses: LighthouseTable,
    trackers: BTreeMap<String, TrackerLightcap>,
}

impl LightcapDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lighthouses(&self) -> &LighthouseTable {
        &self.lighthouses
    }

    pub fn tracker(&self, serial: &str) -> Option<&TrackerLightcap> {
        self.trackers.get(serial)
    }

    /// Process one pulse from `tracker`, creating its decoding state on first use.
    pub fn handle_pulse(
        &mut self,
        tracker: &str,
        pulse: PulseEvent,
        listener: &mut impl LightcapListener,
    ) {
        let state = self
            .trackers
            .entry(tracker.to_string())
            .or_insert_with(|| TrackerLightcap::new(tracker));
        match classify(&pulse) {
            PulseClass::Malformed => {}
            PulseClass::Sync => state.handle_sync(&mut self.lighthouses, &pulse, listener),
            PulseClass::Sweep => state.handle_sweep(&pulse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_sensor_and_length() {
        assert_eq!(classify(&PulseEvent::new(0, 32, 100)), PulseClass::Malformed);
        assert_eq!(classify(&PulseEvent::new(0, 3, 6751)), PulseClass::Malformed);
        assert_eq!(classify(&PulseEvent::new(0, 3, 6750)), PulseClass::Sync);
        assert_eq!(classify(&PulseEvent::new(0, 3, 2751)), PulseClass::Sync);
        assert_eq!(classify(&PulseEvent::new(0, 3, 2750)), PulseClass::Sweep);
    }

    #[derive(Default)]
    struct Count(usize);

    impl LightcapListener for Count {
        fn on_measurement(&mut self, _bundle: MeasurementBundle) {
            self.0 += 1;
        }
    }

    #[test]
    fn sweeps_before_identification_are_discarded() {
        let mut driver = LightcapDriver::new();
        let mut count = Count::default();
        for cycle in 0..4u32 {
            let t = 400_000 * (cycle + 1);
            driver.handle_pulse("T", PulseEvent::new(t, 0, 3000), &mut count);
            driver.handle_pulse("T", PulseEvent::new(t + 200_000, 1, 100), &mut count);
        }
        assert_eq!(count.0, 0);
        assert!(driver.tracker("T").is_some());
    }
}
