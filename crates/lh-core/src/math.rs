//! Mathematical utilities and type definitions.
//!
//! Rigid transforms travel between crates as 6-vectors
//! `[tx, ty, tz, rx, ry, rz]`: a translation followed by an angle-axis
//! rotation whose norm is the rotation angle in radians.

use anyhow::{ensure, Result};
use nalgebra::{
    Isometry3, Matrix3, Point2, Point3, Quaternion, Translation3, UnitQuaternion, Vector2,
    Vector3,
};

/// Scalar type used throughout the workspace (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;
/// Unit quaternion rotation.
pub type Quat = UnitQuaternion<Real>;
/// Compact rigid transform `[tx, ty, tz, rx, ry, rz]`.
pub type Transform6 = [Real; 6];

/// The identity transform in 6-vector form.
pub const IDENTITY6: Transform6 = [0.0; 6];

/// Convert an `Iso3` into a 6-vector `[tx, ty, tz, rx, ry, rz]`.
pub fn iso3_to_vec6(pose: &Iso3) -> Transform6 {
    let t = pose.translation.vector;
    let r = pose.rotation.scaled_axis();
    [t.x, t.y, t.z, r.x, r.y, r.z]
}

/// Convert a 6-vector `[tx, ty, tz, rx, ry, rz]` into an `Iso3`.
pub fn vec6_to_iso3(v: &Transform6) -> Iso3 {
    let rot = UnitQuaternion::from_scaled_axis(Vec3::new(v[3], v[4], v[5]));
    Iso3::from_parts(Translation3::new(v[0], v[1], v[2]), rot)
}

/// Convert a translation + quaternion `[x, y, z, qx, qy, qz, qw]` into an `Iso3`.
///
/// The quaternion is normalized; a zero quaternion is rejected.
pub fn pose7_to_iso3(v: &[Real]) -> Result<Iso3> {
    ensure!(
        v.len() == 7,
        "expected transform [x, y, z, qx, qy, qz, qw] of length 7, got {}",
        v.len()
    );
    let q = Quaternion::new(v[6], v[3], v[4], v[5]);
    ensure!(q.norm() > 0.0, "transform quaternion has zero norm");
    let rot = UnitQuaternion::from_quaternion(q);
    Ok(Iso3::from_parts(Translation3::new(v[0], v[1], v[2]), rot))
}

/// Convert an `Iso3` into `[x, y, z, qx, qy, qz, qw]`.
pub fn iso3_to_pose7(pose: &Iso3) -> [Real; 7] {
    let t = pose.translation.vector;
    let q = pose.rotation.quaternion();
    [t.x, t.y, t.z, q.i, q.j, q.k, q.w]
}

/// Geodesic angle (radians) between two rotations.
pub fn rotation_distance(a: &Quat, b: &Quat) -> Real {
    a.angle_to(b)
}

/// Arithmetic mean of a sample list, `None` when empty.
pub fn mean(samples: &[Real]) -> Option<Real> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<Real>() / samples.len() as Real)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec6_round_trips_through_iso3() {
        let v = [0.3, -1.2, 2.5, 0.1, -0.4, 0.25];
        let back = iso3_to_vec6(&vec6_to_iso3(&v));
        for (a, b) in v.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-12, "{a} vs {b}");
        }
    }

    #[test]
    fn zero_rotation_maps_to_identity() {
        let iso = vec6_to_iso3(&IDENTITY6);
        assert_eq!(iso, Iso3::identity());
        assert_eq!(iso3_to_vec6(&iso), IDENTITY6);
    }

    #[test]
    fn pose7_rejects_bad_input() {
        assert!(pose7_to_iso3(&[0.0; 6]).is_err());
        assert!(pose7_to_iso3(&[0.0; 7]).is_err());
        let iso = pose7_to_iso3(&[1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 2.0]).unwrap();
        assert!((iso.rotation.angle()).abs() < 1e-12);
        assert_eq!(iso.translation.vector, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn pose7_matches_vec6() {
        let iso = vec6_to_iso3(&[0.5, 0.0, -0.5, 0.0, 0.7, 0.0]);
        let p7 = iso3_to_pose7(&iso);
        let back = pose7_to_iso3(&p7).unwrap();
        assert!(rotation_distance(&iso.rotation, &back.rotation) < 1e-12);
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }
}
