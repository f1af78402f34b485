use crate::timing::{
    ACODE_STEP, RESET_GAP, SAME_FLASH_GAP, SECOND_LIGHTHOUSE_GAP, SYNC_THRESHOLD,
};
use lh_core::MAX_NUM_LIGHTHOUSES;

/// Acode bit announcing that the lighthouse will not sweep this cycle.
const SKIP_BIT: u8 = 0b100;
/// Acode bit carrying the OOTX data bit.
const DATA_BIT: u8 = 0b010;

/// The lighthouse whose sweep is currently being accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSweep {
    /// Per-cycle slot, 0 for the first sync of the cycle.
    pub slot: usize,
    pub start_time: u32,
    pub acode: u8,
}

/// Outcome of one sync pulse: which slot it belongs to and its OOTX bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncBit {
    pub slot: usize,
    pub bit: bool,
}

/// Per-tracker sync-cycle state.
///
/// Within a cycle the first lighthouse to flash takes slot 0 and the second
/// takes slot 1, identified by the gap between their sync pulses.
#[derive(Debug, Clone)]
pub struct SyncTracker {
    recent_sync_time: u32,
    current: usize,
    start_time: [u32; MAX_NUM_LIGHTHOUSES],
    max_length: [u32; MAX_NUM_LIGHTHOUSES],
    acode: [Option<u8>; MAX_NUM_LIGHTHOUSES],
    active: Option<ActiveSweep>,
    acode_offset: f64,
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self {
            recent_sync_time: 0,
            current: 0,
            start_time: [0; MAX_NUM_LIGHTHOUSES],
            max_length: [0; MAX_NUM_LIGHTHOUSES],
            acode: [None; MAX_NUM_LIGHTHOUSES],
            active: None,
            acode_offset: 0.0,
        }
    }
}

impl SyncTracker {
    /// Demodulate a sync pulse length into its 3-bit acode and update the
    /// running estimate of the length offset.
    pub fn demodulate(&mut self, length: u16) -> u8 {
        let length = length.max(SYNC_THRESHOLD);
        let residual = ((i32::from(length) + 250) % 500) - 250;
        self.acode_offset = self.acode_offset * 0.9 + 0.1 * f64::from(residual);
        ((length - SYNC_THRESHOLD) / ACODE_STEP) as u8
    }

    /// Smoothed deviation of sync lengths from the nominal acode grid, ticks.
    pub fn acode_offset(&self) -> f64 {
        self.acode_offset
    }

    /// Advance the cycle state for a sync pulse with the given acode.
    pub fn on_sync(&mut self, timecode: u32, length: u16, acode: u8) -> SyncBit {
        let length = u32::from(length);
        let gap = timecode.wrapping_sub(self.recent_sync_time);
        if gap < SAME_FLASH_GAP {
            self.recent_sync_time = timecode;
            let cur = self.current;
            if length > self.max_length[cur] {
                self.max_length[cur] = length;
                self.start_time[cur] = timecode.wrapping_add(length);
                self.acode[cur] = Some(acode);
            }
        } else if gap < SECOND_LIGHTHOUSE_GAP {
            self.active = None;
            self.recent_sync_time = timecode;
            self.current = 1;
            self.start_time[1] = timecode;
            self.max_length[1] = 2 * length;
            self.acode[1] = Some(acode);
        } else if gap > RESET_GAP {
            self.acode = [None; MAX_NUM_LIGHTHOUSES];
            self.active = None;
            self.recent_sync_time = timecode;
            self.current = 0;
            self.start_time[0] = timecode.wrapping_add(length);
            self.max_length[0] = length;
            self.acode[0] = Some(acode);
        }
        SyncBit {
            slot: self.current,
            bit: acode & DATA_BIT != 0,
        }
    }

    /// Pick the lighthouse sweeping now: the last slot whose acode does not
    /// carry the skip bit.
    pub fn select_active(&mut self) -> Option<ActiveSweep> {
        self.active = None;
        for (slot, acode) in self.acode.iter().enumerate() {
            if let Some(acode) = *acode {
                if acode & SKIP_BIT == 0 {
                    self.active = Some(ActiveSweep {
                        slot,
                        start_time: self.start_time[slot],
                        acode,
                    });
                }
            }
        }
        self.active
    }

    pub fn active(&self) -> Option<ActiveSweep> {
        self.active
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }
}
