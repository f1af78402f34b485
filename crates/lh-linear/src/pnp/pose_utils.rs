//! Sensor-cloud alignment and reprojection helpers shared by the PnP solvers.

use super::PnpError;
use crate::quaternion_fit::dominant_quaternion;
use lh_core::{Iso3, Mat3, Pt2, Pt3, Real, Vec3};
use nalgebra::{Matrix4, Translation3};

/// Below this relative eigenvalue gap the alignment rotation is ambiguous.
const MIN_ALIGNMENT_GAP: Real = 1e-9;

/// `lighthouse_from_tracker` aligning tracker-frame sensor positions with
/// their reconstructed lighthouse-frame positions (Horn's quaternion method).
///
/// A reconstruction is known only up to sign, so a cloud entirely behind the
/// lighthouse is mirrored to the front. A cloud straddling the lighthouse's
/// `z = 0` plane cannot be lit by one sweep and is rejected, as are clouds
/// whose rotation is not unique (collinear sensors).
pub(super) fn pose_from_points(tracker: &[Pt3], lighthouse: &[Vec3]) -> Result<Iso3, PnpError> {
    if tracker.len() != lighthouse.len() || tracker.len() < 3 {
        return Err(PnpError::DegeneratePoints);
    }
    let behind = lighthouse.iter().filter(|p| p.z < 0.0).count();
    let sign = match behind {
        0 => 1.0,
        b if b == lighthouse.len() => -1.0,
        _ => return Err(PnpError::DegeneratePoints),
    };

    let n = tracker.len() as Real;
    let c_t = tracker.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords) / n;
    let c_l = lighthouse.iter().fold(Vec3::zeros(), |acc, p| acc + p * sign) / n;

    // s[(i, j)] = sum of a_i * b_j over centred tracker (a) and lighthouse (b) points.
    let mut s = Mat3::zeros();
    for (pt, pl) in tracker.iter().zip(lighthouse) {
        s += (pt.coords - c_t) * (pl * sign - c_l).transpose();
    }
    let (sxx, sxy, sxz) = (s[(0, 0)], s[(0, 1)], s[(0, 2)]);
    let (syx, syy, syz) = (s[(1, 0)], s[(1, 1)], s[(1, 2)]);
    let (szx, szy, szz) = (s[(2, 0)], s[(2, 1)], s[(2, 2)]);
    #[rustfmt::skip]
    let horn = Matrix4::new(
        sxx + syy + szz, syz - szy,        szx - sxz,        sxy - syx,
        syz - szy,       sxx - syy - szz,  sxy + syx,        szx + sxz,
        szx - sxz,       sxy + syx,        -sxx + syy - szz, syz + szy,
        sxy - syx,       szx + sxz,        syz + szy,        -sxx - syy + szz,
    );

    let (rotation, gap) = dominant_quaternion(&horn);
    if gap < MIN_ALIGNMENT_GAP {
        return Err(PnpError::DegeneratePoints);
    }
    let t = c_l - rotation * c_t;
    Ok(Iso3::from_parts(Translation3::from(t), rotation))
}

/// Mean distance between observed and predicted normalised image points.
///
/// Infinite when a point falls behind the lighthouse.
pub(super) fn reprojection_error(pose: &Iso3, world: &[Pt3], image: &[Pt2]) -> Real {
    let mut sum = 0.0;
    for (pw, uv) in world.iter().zip(image) {
        let pc = pose.transform_point(pw);
        if pc.z <= 0.0 {
            return Real::INFINITY;
        }
        sum += ((pc.x / pc.z - uv.x).powi(2) + (pc.y / pc.z - uv.y).powi(2)).sqrt();
    }
    sum / world.len().max(1) as Real
}
