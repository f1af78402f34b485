use lh_core::{LighthouseCalibration, MAX_NUM_LIGHTHOUSES};
use log::warn;

/// Driver-wide table of identified lighthouses, keyed by slot index.
///
/// A record is stored in the slot already holding its serial, otherwise in the
/// first free slot. Slots are never released.
#[derive(Debug, Clone, Default)]
pub struct LighthouseTable {
    slots: [Option<LighthouseCalibration>; MAX_NUM_LIGHTHOUSES],
}

impl LighthouseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record`, returning the slot it landed in.
    ///
    /// Returns `None` (and drops the record) when the table is full of other
    /// serials.
    pub fn register(&mut self, record: LighthouseCalibration) -> Option<usize> {
        let mut free = None;
        let mut matched = None;
        for (idx, slot) in self.slots.iter().enumerate() {
            match slot {
                None if free.is_none() => free = Some(idx),
                Some(existing) if existing.serial == record.serial => {
                    matched = Some(idx);
                    break;
                }
                _ => {}
            }
        }
        let Some(idx) = matched.or(free) else {
            warn!(
                "more than {MAX_NUM_LIGHTHOUSES} lighthouses visible, dropping OOTX data from {}",
                record.serial
            );
            return None;
        };
        self.slots[idx] = Some(record);
        Some(idx)
    }

    pub fn get(&self, idx: usize) -> Option<&LighthouseCalibration> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LighthouseCalibration> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
