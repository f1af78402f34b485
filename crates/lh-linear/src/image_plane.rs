use lh_core::{LighthouseCalibration, Pt2, Real};
use std::f64::consts::PI;

/// Field of view of the synthetic camera standing in for a lighthouse (120°).
pub const FIELD_OF_VIEW: Real = 2.0 * PI / 3.0;
/// Width of the synthetic image.
pub const IMAGE_WIDTH: Real = 1.0;

/// Pinhole image plane a lighthouse's sweep angles are projected onto.
///
/// An angle pair `(az, el)` lands at `focal * (tan(az), tan(el))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlane {
    pub focal: Real,
}

impl Default for ImagePlane {
    fn default() -> Self {
        Self::from_fov(FIELD_OF_VIEW, IMAGE_WIDTH)
    }
}

impl ImagePlane {
    pub fn from_fov(fov: Real, width: Real) -> Self {
        Self {
            focal: 0.5 * width / (0.5 * fov).tan(),
        }
    }

    pub fn project(&self, angles: [Real; 2]) -> Pt2 {
        Pt2::new(self.focal * angles[0].tan(), self.focal * angles[1].tan())
    }

    /// Image point to normalised coordinates (unit focal length).
    pub fn normalize(&self, p: &Pt2) -> Pt2 {
        Pt2::new(p.x / self.focal, p.y / self.focal)
    }
}

/// Apply a lighthouse's motor corrections to an `[azimuth, elevation]` pair.
///
/// Both axes are corrected from the raw value of the other axis.
pub fn correct_angles(raw: [Real; 2], cal: &LighthouseCalibration) -> [Real; 2] {
    let mut out = raw;
    for (a, corrected) in out.iter_mut().enumerate() {
        let m = &cal.motors[a];
        let cross = raw[1 - a];
        *corrected = raw[a]
            - Real::from(m.phase)
            - Real::from(m.tilt) * cross
            - Real::from(m.curve) * cross * cross
            - Real::from(m.gib_mag) * (cross + Real::from(m.gib_phase)).cos();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lh_core::MotorCalibration;

    #[test]
    fn default_plane_has_half_width_at_sixty_degrees() {
        let plane = ImagePlane::default();
        assert!((plane.focal - 0.5 / (PI / 3.0).tan()).abs() < 1e-12);
        let edge = plane.project([PI / 3.0, 0.0]);
        assert!((edge.x - 0.5).abs() < 1e-12);
        assert_eq!(edge.y, 0.0);
    }

    #[test]
    fn normalize_recovers_tangent() {
        let plane = ImagePlane::default();
        let p = plane.normalize(&plane.project([0.3, -0.2]));
        assert!((p.x - 0.3f64.tan()).abs() < 1e-12);
        assert!((p.y + 0.2f64.tan()).abs() < 1e-12);
    }

    #[test]
    fn correction_uses_uncorrected_cross_axis() {
        let cal = LighthouseCalibration {
            motors: [
                MotorCalibration {
                    phase: 0.01,
                    tilt: 0.1,
                    curve: 0.0,
                    gib_phase: 0.0,
                    gib_mag: 0.0,
                },
                MotorCalibration {
                    phase: 0.0,
                    tilt: 0.0,
                    curve: 0.5,
                    gib_phase: 0.25,
                    gib_mag: 0.002,
                },
            ],
            ..Default::default()
        };
        let raw = [0.2, -0.4];
        let c = correct_angles(raw, &cal);
        let phase0 = Real::from(0.01f32);
        let tilt0 = Real::from(0.1f32);
        assert!((c[0] - (0.2 - phase0 - tilt0 * -0.4)).abs() < 1e-12);
        let expected1 = -0.4 - 0.5 * 0.2 * 0.2 - Real::from(0.002f32) * (0.2 as Real + 0.25).cos();
        assert!((c[1] - expected1).abs() < 1e-12);
    }

    #[test]
    fn zero_calibration_is_identity() {
        let c = correct_angles([0.1, 0.2], &LighthouseCalibration::default());
        assert_eq!(c, [0.1, 0.2]);
    }
}
