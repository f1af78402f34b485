//! Closed-form relative transform between two lighthouses.
//!
//! Each tracker epoch seen by both lighthouses gives one direct estimate
//! `master_from_slave = master_from_tracker * slave_from_tracker⁻¹`. The
//! estimates are averaged, nearby epochs counting more than distant ones. The
//! nonlinear solver refines the result.

use crate::quaternion_fit::dominant_quaternion;
use anyhow::{bail, Result};
use lh_core::{Iso3, Real, Vec3};
use nalgebra::{Matrix4, Translation3, Vector4};

/// Poses of one tracker epoch observed from the master and from a slave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosePair {
    pub master_from_tracker: Iso3,
    pub slave_from_tracker: Iso3,
}

impl PosePair {
    /// Direct `master_from_slave` estimate from this epoch.
    pub fn master_from_slave(&self) -> Iso3 {
        self.master_from_tracker * self.slave_from_tracker.inverse()
    }

    /// Confidence of this epoch's estimate.
    ///
    /// PnP depth error grows with the square of the tracker's range, so an
    /// epoch counts inversely to the summed squared ranges from both
    /// lighthouses. Non-finite poses weigh nothing.
    pub fn weight(&self) -> Real {
        let range2 = self.master_from_tracker.translation.vector.norm_squared()
            + self.slave_from_tracker.translation.vector.norm_squared();
        if range2.is_finite() && range2 > 0.0 {
            1.0 / range2
        } else {
            0.0
        }
    }
}

/// Candidate rotations spread this widely have no meaningful mean.
const MIN_ROTATION_GAP: Real = 1e-3;

/// Weighted mean of rigid transforms.
///
/// Translations are averaged arithmetically. The rotation is the weighted
/// chordal mean: the dominant eigenvector of `sum(w * q * qᵀ)`, which ignores
/// quaternion sign. Fails when no sample has positive weight or when the
/// rotations are too spread for the mean to be unique.
pub fn weighted_mean_isometry(samples: &[(Iso3, Real)]) -> Result<Iso3> {
    let usable: Vec<&(Iso3, Real)> = samples
        .iter()
        .filter(|(_, w)| w.is_finite() && *w > 0.0)
        .collect();
    let total: Real = usable.iter().map(|(_, w)| w).sum();
    if usable.is_empty() || total <= 0.0 {
        bail!("no pose with positive weight to average");
    }

    let translation = usable
        .iter()
        .fold(Vec3::zeros(), |acc, (iso, w)| acc + iso.translation.vector * *w)
        / total;

    let mut moment = Matrix4::<Real>::zeros();
    for (iso, w) in &usable {
        let q = iso.rotation;
        let v = Vector4::new(q.w, q.i, q.j, q.k);
        moment += v * v.transpose() * (*w / total);
    }
    let (rotation, gap) = dominant_quaternion(&moment);
    if gap < MIN_ROTATION_GAP {
        bail!("candidate rotations disagree too much to average");
    }
    Ok(Iso3::from_parts(Translation3::from(translation), rotation))
}

/// Initial `master_from_slave` from paired tracker poses.
pub fn estimate_master_from_slave(pairs: &[PosePair]) -> Result<Iso3> {
    if pairs.is_empty() {
        bail!("no epochs observed by both lighthouses");
    }
    let candidates: Vec<(Iso3, Real)> = pairs
        .iter()
        .map(|p| (p.master_from_slave(), p.weight()))
        .collect();
    weighted_mean_isometry(&candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Isometry3, Rotation3, UnitQuaternion};

    fn make_iso(angles: (Real, Real, Real), t: (Real, Real, Real)) -> Iso3 {
        let rot = Rotation3::from_euler_angles(angles.0, angles.1, angles.2);
        Isometry3::from_parts(Translation3::new(t.0, t.1, t.2), rot.into())
    }

    #[test]
    fn recovers_exact_relative_transform() {
        let master_from_slave = make_iso((0.1, -0.6, 0.05), (1.5, 0.0, 0.5));
        let pairs: Vec<PosePair> = (0..5)
            .map(|i| {
                let k = i as Real;
                let m_t = make_iso((3.0 + 0.05 * k, 0.1, -0.2 * k), (0.1 * k, -0.2, 2.0 + 0.1 * k));
                PosePair {
                    master_from_tracker: m_t,
                    slave_from_tracker: master_from_slave.inverse() * m_t,
                }
            })
            .collect();
        let est = estimate_master_from_slave(&pairs).unwrap();
        assert!((est.translation.vector - master_from_slave.translation.vector).norm() < 1e-9);
        assert!(est.rotation.angle_to(&master_from_slave.rotation) < 1e-9);
    }

    #[test]
    fn averaging_handles_opposite_quaternion_signs() {
        let a = make_iso((0.0, 0.0, 0.2), (1.0, 0.0, 0.0));
        let mut b = a;
        b.rotation = UnitQuaternion::new_unchecked(-a.rotation.into_inner());
        let avg = weighted_mean_isometry(&[(a, 1.0), (b, 1.0)]).unwrap();
        assert!(avg.rotation.angle_to(&a.rotation) < 1e-12);
    }

    #[test]
    fn distant_epochs_count_less() {
        let master_from_slave = make_iso((0.0, -0.6, 0.0), (1.5, 0.0, 0.5));
        let pair = |m_t: Iso3| PosePair {
            master_from_tracker: m_t,
            slave_from_tracker: master_from_slave.inverse() * m_t,
        };
        let near = pair(make_iso((3.0, 0.0, 0.0), (0.0, 0.0, 1.0)));
        let mut far = pair(make_iso((3.0, 0.0, 0.0), (0.0, 0.0, 6.0)));
        // A bad PnP depth on the distant epoch.
        far.master_from_tracker.translation.vector.z += 0.4;
        assert!(near.weight() > far.weight());

        let est = estimate_master_from_slave(&[near, far]).unwrap();
        let err = (est.translation.vector - master_from_slave.translation.vector).norm();
        // An unweighted mean would be off by exactly half the depth error.
        assert!(err < 0.1, "translation error {err}");
    }

    #[test]
    fn opposed_rotations_have_no_mean() {
        let a = make_iso((0.0, 0.0, 0.0), (0.0, 0.0, 0.0));
        let b = make_iso((std::f64::consts::PI, 0.0, 0.0), (0.0, 0.0, 0.0));
        assert!(weighted_mean_isometry(&[(a, 1.0), (b, 1.0)]).is_err());
    }

    #[test]
    fn empty_or_weightless_input_is_an_error() {
        assert!(estimate_master_from_slave(&[]).is_err());
        assert!(weighted_mean_isometry(&[(Iso3::identity(), 0.0)]).is_err());
    }
}
