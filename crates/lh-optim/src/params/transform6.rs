//! 6D transform parameters `[tx, ty, tz, rx, ry, rz]`.

use anyhow::{ensure, Result};
use lh_core::Transform6;
use nalgebra::{DVector, DVectorView};

pub fn transform6_to_dvec(t: &Transform6) -> DVector<f64> {
    DVector::from_row_slice(t)
}

pub fn dvec_to_transform6(v: DVectorView<'_, f64>) -> Result<Transform6> {
    ensure!(
        v.len() == 6,
        "expected transform vector of length 6, got {}",
        v.len()
    );
    Ok([v[0], v[1], v[2], v[3], v[4], v[5]])
}
