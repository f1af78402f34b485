use lh_core::{SweepHit, MAX_NUM_SENSORS};

/// Per-sensor strongest hit within the current sweep.
#[derive(Debug, Clone)]
pub struct SweepAccumulator {
    length: [u16; MAX_NUM_SENSORS],
    time: [u32; MAX_NUM_SENSORS],
}

impl Default for SweepAccumulator {
    fn default() -> Self {
        Self {
            length: [0; MAX_NUM_SENSORS],
            time: [0; MAX_NUM_SENSORS],
        }
    }
}

impl SweepAccumulator {
    /// Keep the hit if it is longer than the one already held for `sensor`.
    pub fn record(&mut self, sensor: usize, timecode: u32, length: u16) {
        if sensor < MAX_NUM_SENSORS && self.length[sensor] < length {
            self.length[sensor] = length;
            self.time[sensor] = timecode;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.length.iter().all(|&l| l == 0)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Convert held hits to mid-pulse offsets from `sweep_start` and clear.
    pub fn drain(&mut self, sweep_start: u32) -> Vec<SweepHit> {
        let hits = self
            .length
            .iter()
            .zip(&self.time)
            .enumerate()
            .filter(|(_, (&length, _))| length != 0)
            .map(|(sensor, (&length, &time))| SweepHit {
                sensor: sensor as u16,
                angle: time
                    .wrapping_sub(sweep_start)
                    .wrapping_add(u32::from(length) / 2),
                time,
                duration: length,
            })
            .collect();
        self.clear();
        hits
    }
}
