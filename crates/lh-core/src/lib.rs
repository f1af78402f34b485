//! Core math and data model for lighthouse calibration.
//!
//! This crate contains the pieces every other crate in the workspace agrees on:
//! - linear algebra type aliases (`Real`, `Vec3`, `Pt3`, `Iso3`, ...),
//! - conversions between rigid transforms and the compact 6-vector
//!   `[tx, ty, tz, rx, ry, rz]` (translation + angle-axis) used on the wire,
//!   in the calibration file and in the optimizer,
//! - the shared data model: pulse events, decoded lighthouse calibration
//!   records, measurement bundles and tracker sensor geometry,
//! - deterministic synthetic data helpers for tests.
//!
//! Frame convention: `a_from_b` (or `aTb`) maps coordinates expressed in frame
//! `b` into frame `a`.

/// Linear algebra type aliases and transform helpers.
pub mod math;
/// Deterministic synthetic data generation helpers.
///
/// Used by tests across the workspace; not intended for production use.
pub mod synthetic;
mod types;

pub use math::*;
pub use types::*;
