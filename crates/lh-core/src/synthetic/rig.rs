//! Synthetic trackers, poses and ideal sweep angles.

use crate::{Iso3, Pt3, Real, SensorExtrinsic, TrackerGeometry, Vec3};
use nalgebra::{Translation3, UnitQuaternion};

/// A puck-like constellation of `n` sensors on a dome of radius `radius`.
///
/// Sensors are spread over rings at different heights so that no four of
/// them are coplanar. Normals point away from the dome centre.
pub fn dome_sensors(n: usize, radius: Real) -> Vec<SensorExtrinsic> {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..n)
        .map(|i| {
            // Fibonacci lattice over the upper hemisphere.
            let z = 1.0 - (i as Real + 0.5) / n as Real;
            let r = (1.0 - z * z).sqrt();
            let phi = golden * i as Real;
            let normal = Vec3::new(r * phi.cos(), r * phi.sin(), z);
            SensorExtrinsic {
                position: Pt3::from(normal * radius),
                normal,
            }
        })
        .collect()
}

/// Tracker geometry with a dome constellation.
pub fn dome_tracker(serial: &str, n: usize, radius: Real) -> TrackerGeometry {
    TrackerGeometry {
        serial: serial.to_string(),
        sensors: dome_sensors(n, radius),
    }
}

/// `n` tracker poses drifting around `center`, each with a different attitude.
///
/// Poses map tracker coordinates into the frame `center` is expressed in.
pub fn wander_poses(n: usize, center: Vec3, step: Real) -> Vec<Iso3> {
    (0..n)
        .map(|i| {
            let k = i as Real;
            let t = center + Vec3::new(step * k.sin(), step * (0.7 * k).cos() - step, 0.5 * step * k);
            let axis = Vec3::new(0.3 + 0.1 * k, -0.2, 1.0).normalize();
            // Tilt the dome back towards the -z direction so its sensors face
            // a lighthouse sitting near the origin.
            let facing = UnitQuaternion::from_scaled_axis(Vec3::new(std::f64::consts::PI, 0.0, 0.0));
            let rot = UnitQuaternion::from_scaled_axis(axis * (0.15 * k - 0.3)) * facing;
            Iso3::from_parts(Translation3::from(t), rot)
        })
        .collect()
}

/// Ideal `[azimuth, elevation]` sweep angles of a point in a lighthouse frame.
///
/// Returns `None` for points behind the lighthouse (`z <= 0`).
pub fn sweep_angles(p_lighthouse: &Pt3) -> Option<[Real; 2]> {
    if p_lighthouse.z <= 0.0 {
        return None;
    }
    Some([
        p_lighthouse.x.atan2(p_lighthouse.z),
        p_lighthouse.y.atan2(p_lighthouse.z),
    ])
}

/// Ideal sweep angles of every sensor for a tracker posed at `lighthouse_from_tracker`.
pub fn project_sensors(
    lighthouse_from_tracker: &Iso3,
    sensors: &[SensorExtrinsic],
) -> Vec<Option<[Real; 2]>> {
    sensors
        .iter()
        .map(|s| sweep_angles(&lighthouse_from_tracker.transform_point(&s.position)))
        .collect()
}
