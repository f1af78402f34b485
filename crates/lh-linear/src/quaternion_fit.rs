//! Best-fit rotations as the dominant eigenvector of a 4x4 symmetric matrix.
//!
//! Both the sensor-cloud alignment used by PnP and the averaging of relative
//! lighthouse rotations reduce to maximising `qᵀ N q` over unit quaternions.

use lh_core::{Quat, Real};
use nalgebra::{linalg::SymmetricEigen, Matrix4, Quaternion};

/// Unit quaternion maximising `qᵀ N q`, with `q` laid out as `(w, x, y, z)`,
/// and the gap between the two largest eigenvalues of `N` relative to its
/// largest eigenvalue magnitude.
///
/// A gap near zero means the maximiser is not unique.
pub(crate) fn dominant_quaternion(n: &Matrix4<Real>) -> (Quat, Real) {
    let eig = SymmetricEigen::new(*n);
    let mut order = [0usize, 1, 2, 3];
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let v = eig.eigenvectors.column(order[0]);
    let q = Quat::from_quaternion(Quaternion::new(v[0], v[1], v[2], v[3]));

    let scale = eig.eigenvalues.amax();
    let gap = if scale > 0.0 {
        (eig.eigenvalues[order[0]] - eig.eigenvalues[order[1]]) / scale
    } else {
        0.0
    };
    (q, gap)
}
