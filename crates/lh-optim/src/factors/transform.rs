//! Residual tying a slave lighthouse to the master through a shared tracker epoch.

use super::rotation::{angle_axis_to_quaternion, quaternion_to_angle_axis, rotate};
use nalgebra::{DVector, DVectorView, RealField, SVector, Vector3};

fn split<T: RealField>(v: DVectorView<'_, T>) -> (Vector3<T>, Vector3<T>) {
    (
        Vector3::new(v[0].clone(), v[1].clone(), v[2].clone()),
        Vector3::new(v[3].clone(), v[4].clone(), v[5].clone()),
    )
}

/// Residual `[t_err; r_err]` comparing `master_from_tracker` with
/// `master_from_slave * slave_from_tracker`.
///
/// - `t_err = t_mt - (R_ms * t_st + t_ms)`
/// - `r_err = angle_axis(q_mt * (q_ms * q_st)⁻¹)`
///
/// The translation term compares full compositions, not raw translation
/// differences, so it vanishes exactly at the true `master_from_slave` for
/// any slave rotation.
pub fn lighthouse_transform_residual_generic<T: RealField>(
    master_from_slave: DVectorView<'_, T>,
    master_from_tracker: DVectorView<'_, T>,
    slave_from_tracker: DVectorView<'_, T>,
) -> SVector<T, 6> {
    debug_assert!(master_from_slave.len() == 6, "transform must have 6 params");
    debug_assert!(master_from_tracker.len() == 6, "pose must have 6 params");
    debug_assert!(slave_from_tracker.len() == 6, "pose must have 6 params");

    let (t_ms, r_ms) = split(master_from_slave);
    let (t_mt, r_mt) = split(master_from_tracker);
    let (t_st, r_st) = split(slave_from_tracker);

    let q_ms = angle_axis_to_quaternion(&r_ms);
    let q_mt = angle_axis_to_quaternion(&r_mt);
    let q_st = angle_axis_to_quaternion(&r_st);

    let t_err = t_mt - (rotate(&q_ms, &t_st) + t_ms);
    let q_pred = q_ms * q_st;
    let r_err = quaternion_to_angle_axis(&(q_mt * q_pred.conjugate()));

    SVector::<T, 6>::new(
        t_err.x.clone(),
        t_err.y.clone(),
        t_err.z.clone(),
        r_err.x.clone(),
        r_err.y.clone(),
        r_err.z.clone(),
    )
}

/// `f64` convenience wrapper around [`lighthouse_transform_residual_generic`].
pub fn lighthouse_transform_residual(
    master_from_slave: &DVector<f64>,
    master_from_tracker: &DVector<f64>,
    slave_from_tracker: &DVector<f64>,
) -> SVector<f64, 6> {
    lighthouse_transform_residual_generic(
        master_from_slave.as_view(),
        master_from_tracker.as_view(),
        slave_from_tracker.as_view(),
    )
}
