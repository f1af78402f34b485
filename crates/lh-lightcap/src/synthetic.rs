//! Synthetic pulse trains from two lighthouses.
//!
//! Used by tests to drive the decoder end to end. Each cycle both lighthouses
//! flash a sync pulse (slot 0, then slot 1 20 000 ticks later) carrying one
//! OOTX bit each; one of them then sweeps. The sweeping lighthouse alternates
//! every cycle and the swept axis every two cycles.

use crate::ootx::encode_frame;
use crate::payload::{encode_calibration, PayloadError};
use crate::timing::{sweep_ticks, ACODE_STEP, SYNC_THRESHOLD};
use lh_core::{Axis, LighthouseCalibration, PulseEvent, Real};

/// Ticks between consecutive cycles.
pub const CYCLE_TICKS: u32 = 400_000;
/// Offset of the second lighthouse's sync flash.
pub const SECOND_SYNC_OFFSET: u32 = 20_000;
/// Width of generated sweep pulses.
pub const SWEEP_PULSE_TICKS: u16 = 100;

#[derive(Debug, Clone)]
pub struct PulseTrain {
    frames: [Vec<bool>; 2],
    cycle: usize,
    first_cycle_time: u32,
}

impl PulseTrain {
    /// A train broadcasting the OOTX packets of `records` in slots 0 and 1.
    pub fn new(records: [&LighthouseCalibration; 2]) -> Result<Self, PayloadError> {
        Ok(Self {
            frames: [
                encode_frame(&encode_calibration(records[0])?),
                encode_frame(&encode_calibration(records[1])?),
            ],
            cycle: 0,
            first_cycle_time: CYCLE_TICKS,
        })
    }

    /// Number of cycles needed for every OOTX packet to be seen once in full.
    pub fn cycles_per_broadcast(&self) -> usize {
        self.frames[0].len().max(self.frames[1].len())
    }

    pub fn cycle(&self) -> usize {
        self.cycle
    }

    /// Timecode of the next cycle's first sync flash.
    pub fn cycle_time(&self) -> u32 {
        self.first_cycle_time
            .wrapping_add(CYCLE_TICKS.wrapping_mul(self.cycle as u32))
    }

    /// Slot and axis swept during the next cycle.
    pub fn sweeping(&self) -> (usize, Axis) {
        let axis = if (self.cycle / 2) % 2 == 0 {
            Axis::Azimuth
        } else {
            Axis::Elevation
        };
        (self.cycle % 2, axis)
    }

    fn acode(&self, slot: usize) -> u8 {
        let (sweeping, axis) = self.sweeping();
        let frame = &self.frames[slot];
        let data = frame[self.cycle % frame.len()];
        let skip = slot != sweeping;
        axis.index() as u8 | (u8::from(data) << 1) | (u8::from(skip) << 2)
    }

    /// Emit the next cycle: two sync flashes followed by one sweep pulse per
    /// `(sensor, angle)` hit of the sweeping lighthouse.
    pub fn next_cycle(&mut self, hits: &[(u16, Real)]) -> Vec<PulseEvent> {
        let t0 = self.cycle_time();
        let t1 = t0.wrapping_add(SECOND_SYNC_OFFSET);
        let len0 = SYNC_THRESHOLD + 250 + ACODE_STEP * u16::from(self.acode(0));
        let len1 = SYNC_THRESHOLD + 250 + ACODE_STEP * u16::from(self.acode(1));
        let sweep_start = match self.sweeping().0 {
            0 => t0.wrapping_add(u32::from(len0)),
            _ => t1,
        };

        let mut pulses = vec![PulseEvent::new(t0, 0, len0), PulseEvent::new(t1, 0, len1)];
        let mut sweeps: Vec<PulseEvent> = hits
            .iter()
            .map(|&(sensor, angle)| {
                let mid = sweep_start.wrapping_add(sweep_ticks(angle));
                PulseEvent::new(
                    mid.wrapping_sub(u32::from(SWEEP_PULSE_TICKS / 2)),
                    sensor,
                    SWEEP_PULSE_TICKS,
                )
            })
            .collect();
        sweeps.sort_by_key(|p| p.timecode.wrapping_sub(t0));
        pulses.extend(sweeps);
        self.cycle += 1;
        pulses
    }
}
