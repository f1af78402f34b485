//! Deterministic noise helpers for synthetic datasets.
//!
//! The functions here avoid any RNG crate so that synthetic datasets stay
//! stable across versions and platforms.

use crate::Real;

/// Deterministic uniform angle noise in `[-max_abs_rad, +max_abs_rad]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UniformAngleNoise {
    /// Base seed controlling the pseudo-random sequence.
    pub seed: u64,
    /// Maximum absolute per-axis noise (radians).
    pub max_abs_rad: Real,
}

impl UniformAngleNoise {
    /// Sample deterministic `[azimuth, elevation]` noise for an `(epoch, sensor)` key.
    #[inline]
    pub fn sample(&self, epoch: usize, sensor: usize) -> [Real; 2] {
        let max_abs = self.max_abs_rad.abs();
        if max_abs == 0.0 {
            return [0.0, 0.0];
        }

        let key = mix_key(self.seed, epoch, sensor);
        let u = u64_to_unit_f64(splitmix64(key));
        let v = u64_to_unit_f64(splitmix64(key ^ 0x94D0_49BB_1331_11EB));
        [(u - 0.5) * 2.0 * max_abs, (v - 0.5) * 2.0 * max_abs]
    }

    /// Apply noise to an angle pair.
    #[inline]
    pub fn apply(&self, epoch: usize, sensor: usize, angles: [Real; 2]) -> [Real; 2] {
        let n = self.sample(epoch, sensor);
        [angles[0] + n[0], angles[1] + n[1]]
    }
}

#[inline]
fn mix_key(seed: u64, epoch: usize, sensor: usize) -> u64 {
    seed ^ (epoch as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (sensor as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn u64_to_unit_f64(x: u64) -> Real {
    // 53 high bits -> [0, 1)
    (x >> 11) as Real * (1.0 / (1u64 << 53) as Real)
}
