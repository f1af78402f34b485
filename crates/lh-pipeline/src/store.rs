//! Measurement acceptance, storage and time binning.

use crate::config::Thresholds;
use lh_core::{mean, Light, MeasurementBundle, Pulse, Real};
use lh_lightcap::timing::{sweep_angle, ticks_to_seconds};
use log::debug;
use std::collections::BTreeMap;

/// Convert a decoded bundle into angles (radians) and durations (seconds).
pub fn light_from_bundle(bundle: &MeasurementBundle) -> Light {
    Light {
        lighthouse: bundle.lighthouse.clone(),
        tracker: bundle.tracker.clone(),
        axis: bundle.axis,
        pulses: bundle
            .hits
            .iter()
            .map(|hit| Pulse {
                sensor: hit.sensor,
                angle: sweep_angle(hit.angle),
                duration: ticks_to_seconds(u32::from(hit.duration)),
            })
            .collect(),
    }
}

/// Drops implausible pulses and bundles left with too few of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceFilter {
    max_angle: Real,
    min_duration: Real,
    min_count: usize,
}

impl AcceptanceFilter {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            max_angle: thresholds.angle.to_radians(),
            min_duration: thresholds.duration * 1e-6,
            min_count: thresholds.count,
        }
    }

    /// Keep pulses within `max_angle` of the lighthouse's optical axis on
    /// either side and long enough to be trusted. Sweep angles are centred
    /// on zero, so the bound is symmetric.
    pub fn filter(&self, mut light: Light) -> Option<Light> {
        let before = light.pulses.len();
        light
            .pulses
            .retain(|p| p.angle.abs() <= self.max_angle && p.duration >= self.min_duration);
        if light.pulses.len() < self.min_count {
            debug!(
                "dropping bundle {}/{}: {} of {} pulses usable",
                light.tracker,
                light.lighthouse,
                light.pulses.len(),
                before
            );
            return None;
        }
        Some(light)
    }
}

/// Time-stamped bundles recorded since recording started.
#[derive(Debug, Clone, Default)]
pub struct MeasurementStore {
    entries: Vec<(Real, Light)>,
}

impl MeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stamp: Real, light: Light) {
        self.entries.push((stamp, light));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove and return everything recorded.
    pub fn take(&mut self) -> Vec<(Real, Light)> {
        std::mem::take(&mut self.entries)
    }
}

/// Raw samples of one sensor, per axis.
pub type SensorSamples = BTreeMap<u16, [Vec<Real>; 2]>;

/// Measurements regrouped by tracker, lighthouse and time bin.
#[derive(Debug, Clone, Default)]
pub struct TimeBins {
    resolution: Real,
    bins: BTreeMap<String, BTreeMap<String, BTreeMap<i64, SensorSamples>>>,
}

impl TimeBins {
    /// Bin index of a timestamp: the nearest multiple of `resolution`.
    pub fn bin_index(stamp: Real, resolution: Real) -> i64 {
        (stamp / resolution).round() as i64
    }

    pub fn new(measurements: &[(Real, Light)], resolution: Real) -> Self {
        let mut bins: BTreeMap<String, BTreeMap<String, BTreeMap<i64, SensorSamples>>> =
            BTreeMap::new();
        for (stamp, light) in measurements {
            let cell = bins
                .entry(light.tracker.clone())
                .or_default()
                .entry(light.lighthouse.clone())
                .or_default()
                .entry(Self::bin_index(*stamp, resolution))
                .or_default();
            for pulse in &light.pulses {
                cell.entry(pulse.sensor).or_default()[light.axis.index()].push(pulse.angle);
            }
        }
        Self { resolution, bins }
    }

    pub fn resolution(&self) -> Real {
        self.resolution
    }

    /// Centre time of a bin, seconds.
    pub fn bin_stamp(&self, bin: i64) -> Real {
        bin as Real * self.resolution
    }

    pub fn trackers(&self) -> impl Iterator<Item = &str> {
        self.bins.keys().map(String::as_str)
    }

    /// Bins of one (tracker, lighthouse) pair in time order.
    pub fn epochs<'a>(
        &'a self,
        tracker: &str,
        lighthouse: &str,
    ) -> impl Iterator<Item = (i64, &'a SensorSamples)> + 'a {
        self.bins
            .get(tracker)
            .and_then(|by_lh| by_lh.get(lighthouse))
            .into_iter()
            .flat_map(|by_bin| by_bin.iter().map(|(bin, samples)| (*bin, samples)))
    }

    /// Number of (tracker, lighthouse, bin) cells.
    pub fn len(&self) -> usize {
        self.bins
            .values()
            .flat_map(|by_lh| by_lh.values())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mean `[azimuth, elevation]` of every sensor sampled on both axes.
pub fn mean_angles(samples: &SensorSamples) -> Vec<(u16, [Real; 2])> {
    samples
        .iter()
        .filter_map(|(sensor, [az, el])| Some((*sensor, [mean(az)?, mean(el)?])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lh_core::{Axis, SweepHit};

    fn light(tracker: &str, axis: Axis, pulses: &[(u16, Real, Real)]) -> Light {
        Light {
            lighthouse: "L".into(),
            tracker: tracker.into(),
            axis,
            pulses: pulses
                .iter()
                .map(|&(sensor, angle, duration)| Pulse {
                    sensor,
                    angle,
                    duration,
                })
                .collect(),
        }
    }

    #[test]
    fn bundle_conversion_uses_tick_geometry() {
        let bundle = MeasurementBundle {
            lighthouse: "L".into(),
            tracker: "T".into(),
            axis: Axis::Elevation,
            sync_time: 0,
            hits: vec![SweepHit {
                sensor: 3,
                angle: 200_000,
                time: 199_950,
                duration: 480,
            }],
        };
        let light = light_from_bundle(&bundle);
        assert_eq!(light.axis, Axis::Elevation);
        assert_eq!(light.pulses[0].sensor, 3);
        assert_eq!(light.pulses[0].angle, 0.0);
        assert!((light.pulses[0].duration - 1e-5).abs() < 1e-15);
    }

    #[test]
    fn filter_drops_wide_angles_and_short_pulses() {
        let filter = AcceptanceFilter::new(&Thresholds {
            count: 2,
            angle: 60.0,
            duration: 1.0,
        });
        let accepted = filter
            .filter(light(
                "T",
                Axis::Azimuth,
                &[
                    (0, 0.1, 2e-6),
                    (1, -1.2, 2e-6),
                    (2, 0.2, 0.5e-6),
                    (3, -0.3, 1e-6),
                ],
            ))
            .unwrap();
        let sensors: Vec<u16> = accepted.pulses.iter().map(|p| p.sensor).collect();
        assert_eq!(sensors, [0, 3]);

        assert!(filter
            .filter(light("T", Axis::Azimuth, &[(0, 0.1, 2e-6), (1, 1.1, 2e-6)]))
            .is_none());
    }

    #[test]
    fn angle_bound_is_symmetric_about_the_optical_axis() {
        let filter = AcceptanceFilter::new(&Thresholds {
            count: 1,
            angle: 60.0,
            duration: 1.0,
        });
        let bound = 60.0_f64.to_radians();
        let accepted = filter
            .filter(light(
                "T",
                Axis::Elevation,
                &[
                    (0, -(bound - 1e-3), 2e-6),
                    (1, -(bound + 1e-3), 2e-6),
                    (2, -1.5, 2e-6),
                    (3, bound - 1e-3, 2e-6),
                    (4, bound + 1e-3, 2e-6),
                ],
            ))
            .unwrap();
        let sensors: Vec<u16> = accepted.pulses.iter().map(|p| p.sensor).collect();
        assert_eq!(sensors, [0, 3]);
    }

    #[test]
    fn binning_rounds_to_nearest_and_needs_both_axes() {
        let measurements = vec![
            (0.96, light("T", Axis::Azimuth, &[(1, 0.10, 1e-5), (2, 0.3, 1e-5)])),
            (1.04, light("T", Axis::Azimuth, &[(1, 0.20, 1e-5)])),
            (1.01, light("T", Axis::Elevation, &[(1, -0.4, 1e-5)])),
            (1.06, light("T", Axis::Elevation, &[(1, -0.2, 1e-5)])),
        ];
        let bins = TimeBins::new(&measurements, 0.1);
        assert_eq!(bins.len(), 2);
        let epochs: Vec<_> = bins.epochs("T", "L").collect();
        assert_eq!(epochs[0].0, 10);
        assert_eq!(epochs[1].0, 11);

        let means = mean_angles(epochs[0].1);
        assert_eq!(means.len(), 1, "sensor 2 has no elevation");
        assert_eq!(means[0].0, 1);
        assert!((means[0].1[0] - 0.15).abs() < 1e-12);
        assert!((means[0].1[1] + 0.4).abs() < 1e-12);
        assert!(mean_angles(epochs[1].1).is_empty());
        assert!((bins.bin_stamp(11) - 1.1).abs() < 1e-12);
        assert_eq!(bins.epochs("T", "other").count(), 0);
    }

    #[test]
    fn take_drains_the_store() {
        let mut store = MeasurementStore::new();
        store.push(0.0, light("T", Axis::Azimuth, &[]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.take().len(), 1);
        assert!(store.is_empty());
    }
}
