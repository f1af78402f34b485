//! Deterministic synthetic data generation helpers.
//!
//! Small building blocks for constructing synthetic calibration problems:
//! - tracker sensor constellations with outward normals,
//! - tracker pose sequences,
//! - ideal sweep angles of each sensor as seen from a lighthouse,
//! - deterministic pseudo-random angle noise.
//!
//! Everything here is seeded explicitly and ordered deterministically.

pub mod noise;
pub mod rig;
