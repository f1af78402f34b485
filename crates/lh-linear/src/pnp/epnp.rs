//! EPnP (Efficient Perspective-n-Point) for 4+ points.
//!
//! Every point is written as a weighted sum of four control points placed on
//! the principal axes of the point cloud. The control points' lighthouse-frame
//! coordinates lie in the null space of a `2n x 12` system; the null-space
//! combination is found for one to three basis vectors from the distance
//! constraints between control points, refined by Gauss-Newton, and the
//! candidate with the lowest reprojection error wins.

use super::pose_utils::{pose_from_points, reprojection_error};
use super::{PnpError, MIN_CORRESPONDENCES};
use lh_core::{Iso3, Mat3, Pt2, Pt3, Real, Vec3};
use log::debug;
use nalgebra::{linalg::SymmetricEigen, DMatrix, DVector};

/// Control point pairs, in the order distance constraints are stacked.
const PAIRS: [(usize, usize); 6] = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];

const BETA_ITERATIONS: usize = 5;

/// EPnP pose estimate `lighthouse_from_tracker` from tracker-frame points and
/// normalised image coordinates.
pub fn epnp(world: &[Pt3], image: &[Pt2]) -> Result<Iso3, PnpError> {
    let n = world.len();
    if image.len() != n {
        return Err(PnpError::MismatchedInput {
            points: n,
            images: image.len(),
        });
    }
    if n < MIN_CORRESPONDENCES {
        return Err(PnpError::NotEnoughPoints(n));
    }

    let control_w = control_points(world)?;
    let alphas = barycentric(world, &control_w)?;

    let mut m = DMatrix::<Real>::zeros(2 * n, 12);
    for (i, (a, uv)) in alphas.iter().zip(image.iter()).enumerate() {
        let r0 = 2 * i;
        let r1 = 2 * i + 1;
        for (j, &alpha) in a.iter().enumerate() {
            let c = 3 * j;
            m[(r0, c)] = alpha;
            m[(r0, c + 2)] = -uv.x * alpha;
            m[(r1, c + 1)] = alpha;
            m[(r1, c + 2)] = -uv.y * alpha;
        }
    }

    let mtm = m.transpose() * &m;
    let eig = SymmetricEigen::new(mtm);
    let mut order: Vec<usize> = (0..12).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
    // Null-space basis, smallest eigenvalue first.
    let v: [DVector<Real>; 4] =
        std::array::from_fn(|i| eig.eigenvectors.column(order[i]).into_owned());

    let l = l_6x10(&v);
    let rho = DVector::from_iterator(
        6,
        PAIRS
            .iter()
            .map(|&(a, b)| (control_w[a] - control_w[b]).norm_squared()),
    );

    let candidates = [
        betas_from_four(&l, &rho)?,
        betas_from_two(&l, &rho)?,
        betas_from_three(&l, &rho)?,
    ];

    let mut best: Option<(Iso3, Real)> = None;
    for mut betas in candidates {
        refine_betas(&l, &rho, &mut betas);
        let Some((pose, err)) = pose_for_betas(&betas, &v, &alphas, world, image) else {
            continue;
        };
        if err.is_finite() && best.as_ref().map_or(true, |(_, e)| err < *e) {
            best = Some((pose, err));
        }
    }
    let (pose, err) = best.ok_or(PnpError::DegeneratePoints)?;
    debug!("EPnP on {n} points, reprojection error {err:.3e}");
    Ok(pose)
}

/// Centroid plus one point along each principal axis, scaled by its spread.
///
/// Planar or collinear clouds have a vanishing axis and are rejected.
fn control_points(world: &[Pt3]) -> Result<[Vec3; 4], PnpError> {
    let n = world.len() as Real;
    let centroid = world.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords) / n;

    let mut cov = Mat3::zeros();
    for p in world {
        let d = p.coords - centroid;
        cov += d * d.transpose();
    }
    cov /= n;

    let eig = SymmetricEigen::new(cov);
    let largest = eig.eigenvalues.amax();
    if largest <= 0.0 || eig.eigenvalues.iter().any(|&l| l <= 1e-12 * largest) {
        return Err(PnpError::DegeneratePoints);
    }
    let mut control = [centroid; 4];
    for i in 0..3 {
        let scale = eig.eigenvalues[i].sqrt();
        control[i + 1] = centroid + eig.eigenvectors.column(i).into_owned() * scale;
    }
    Ok(control)
}

/// Coordinates of every point in the control-point basis.
fn barycentric(world: &[Pt3], control: &[Vec3; 4]) -> Result<Vec<[Real; 4]>, PnpError> {
    let basis = Mat3::from_columns(&[
        control[1] - control[0],
        control[2] - control[0],
        control[3] - control[0],
    ]);
    let basis_inv = basis.try_inverse().ok_or(PnpError::DegeneratePoints)?;
    Ok(world
        .iter()
        .map(|p| {
            let c = basis_inv * (p.coords - control[0]);
            [1.0 - c.x - c.y - c.z, c.x, c.y, c.z]
        })
        .collect())
}

/// Control-point block `j` of a 12-vector.
fn block(v: &DVector<Real>, j: usize) -> Vec3 {
    Vec3::new(v[3 * j], v[3 * j + 1], v[3 * j + 2])
}

/// Squared control-point distances as quadratic forms in the betas.
///
/// Columns: b00 b01 b11 b02 b12 b22 b03 b13 b23 b33.
fn l_6x10(v: &[DVector<Real>; 4]) -> DMatrix<Real> {
    let mut l = DMatrix::zeros(6, 10);
    for (row, &(a, b)) in PAIRS.iter().enumerate() {
        let dv: [Vec3; 4] = std::array::from_fn(|i| block(&v[i], a) - block(&v[i], b));
        let d = |p: usize, q: usize| dv[p].dot(&dv[q]);
        let coeffs = [
            d(0, 0),
            2.0 * d(0, 1),
            d(1, 1),
            2.0 * d(0, 2),
            2.0 * d(1, 2),
            d(2, 2),
            2.0 * d(0, 3),
            2.0 * d(1, 3),
            2.0 * d(2, 3),
            d(3, 3),
        ];
        for (col, c) in coeffs.into_iter().enumerate() {
            l[(row, col)] = c;
        }
    }
    l
}

fn least_squares(a: DMatrix<Real>, b: &DVector<Real>) -> Result<DVector<Real>, PnpError> {
    a.svd(true, true)
        .solve(b, 1e-12)
        .map_err(|_| PnpError::SvdFailed)
}

/// Four basis vectors: solve for b00 b01 b02 b03 and read the betas off the
/// first row of the outer product.
fn betas_from_four(l: &DMatrix<Real>, rho: &DVector<Real>) -> Result<[Real; 4], PnpError> {
    let b = least_squares(l.select_columns(&[0, 1, 3, 6]), rho)?;
    let (sign, b0) = if b[0] < 0.0 {
        (-1.0, (-b[0]).sqrt())
    } else {
        (1.0, b[0].sqrt())
    };
    if b0 == 0.0 {
        return Ok([0.0; 4]);
    }
    Ok([b0, sign * b[1] / b0, sign * b[2] / b0, sign * b[3] / b0])
}

fn two_betas(b00: Real, b01: Real, b11: Real) -> [Real; 2] {
    let mut betas = if b00 < 0.0 {
        [(-b00).sqrt(), if b11 < 0.0 { (-b11).sqrt() } else { 0.0 }]
    } else {
        [b00.sqrt(), if b11 > 0.0 { b11.sqrt() } else { 0.0 }]
    };
    if b01 < 0.0 {
        betas[0] = -betas[0];
    }
    betas
}

/// Two basis vectors: solve for b00 b01 b11.
fn betas_from_two(l: &DMatrix<Real>, rho: &DVector<Real>) -> Result<[Real; 4], PnpError> {
    let b = least_squares(l.select_columns(&[0, 1, 2]), rho)?;
    let [b0, b1] = two_betas(b[0], b[1], b[2]);
    Ok([b0, b1, 0.0, 0.0])
}

/// Three basis vectors: solve for b00 b01 b11 b02 b12.
fn betas_from_three(l: &DMatrix<Real>, rho: &DVector<Real>) -> Result<[Real; 4], PnpError> {
    let b = least_squares(l.select_columns(&[0, 1, 2, 3, 4]), rho)?;
    let [b0, b1] = two_betas(b[0], b[1], b[2]);
    let b2 = if b0 != 0.0 { b[3] / b0 } else { 0.0 };
    Ok([b0, b1, b2, 0.0])
}

/// Gauss-Newton on the distance constraints `L * beta_products = rho`.
fn refine_betas(l: &DMatrix<Real>, rho: &DVector<Real>, betas: &mut [Real; 4]) {
    for _ in 0..BETA_ITERATIONS {
        let [b0, b1, b2, b3] = *betas;
        let mut a = DMatrix::<Real>::zeros(6, 4);
        let mut r = DVector::<Real>::zeros(6);
        for i in 0..6 {
            let row = |k: usize| l[(i, k)];
            a[(i, 0)] = 2.0 * row(0) * b0 + row(1) * b1 + row(3) * b2 + row(6) * b3;
            a[(i, 1)] = row(1) * b0 + 2.0 * row(2) * b1 + row(4) * b2 + row(7) * b3;
            a[(i, 2)] = row(3) * b0 + row(4) * b1 + 2.0 * row(5) * b2 + row(8) * b3;
            a[(i, 3)] = row(6) * b0 + row(7) * b1 + row(8) * b2 + 2.0 * row(9) * b3;
            r[i] = rho[i]
                - (row(0) * b0 * b0
                    + row(1) * b0 * b1
                    + row(2) * b1 * b1
                    + row(3) * b0 * b2
                    + row(4) * b1 * b2
                    + row(5) * b2 * b2
                    + row(6) * b0 * b3
                    + row(7) * b1 * b3
                    + row(8) * b2 * b3
                    + row(9) * b3 * b3);
        }
        let Ok(dx) = least_squares(a, &r) else {
            return;
        };
        for (beta, d) in betas.iter_mut().zip(dx.iter()) {
            *beta += d;
        }
    }
}

/// Pose and reprojection error for one beta combination.
fn pose_for_betas(
    betas: &[Real; 4],
    v: &[DVector<Real>; 4],
    alphas: &[[Real; 4]],
    world: &[Pt3],
    image: &[Pt2],
) -> Option<(Iso3, Real)> {
    let mut ccs = [Vec3::zeros(); 4];
    for (beta, vi) in betas.iter().zip(v) {
        for (j, cc) in ccs.iter_mut().enumerate() {
            *cc += block(vi, j) * *beta;
        }
    }
    let pcs: Vec<Vec3> = alphas
        .iter()
        .map(|a| ccs[0] * a[0] + ccs[1] * a[1] + ccs[2] * a[2] + ccs[3] * a[3])
        .collect();
    let pose = pose_from_points(world, &pcs).ok()?;
    let err = reprojection_error(&pose, world, image);
    Some((pose, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lh_core::synthetic::rig::{dome_sensors, sweep_angles};
    use nalgebra::{Rotation3, Translation3};

    fn observe(pose: &Iso3, world: &[Pt3]) -> Vec<Pt2> {
        world
            .iter()
            .map(|p| {
                let a = sweep_angles(&pose.transform_point(p)).unwrap();
                Pt2::new(a[0].tan(), a[1].tan())
            })
            .collect()
    }

    #[test]
    fn epnp_recovers_pose_synthetic() {
        let world: Vec<Pt3> = dome_sensors(12, 0.08).iter().map(|s| s.position).collect();
        let gt = Iso3::from_parts(
            Translation3::new(0.2, -0.1, 2.0),
            Rotation3::from_euler_angles(2.9, 0.2, -0.4).into(),
        );
        let est = epnp(&world, &observe(&gt, &world)).unwrap();
        let dt = (est.translation.vector - gt.translation.vector).norm();
        let dr = est.rotation.angle_to(&gt.rotation);
        assert!(dt < 1e-4, "translation error too large: {dt}");
        assert!(dr < 1e-4, "rotation error too large: {dr}");
    }

    #[test]
    fn l_matrix_reproduces_control_distances() {
        // With a single exact basis vector the first column alone explains rho.
        let control = [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.1, 0.0, 1.0),
            Vec3::new(0.0, 0.2, 1.1),
            Vec3::new(0.0, 0.0, 1.3),
        ];
        let mut v0 = DVector::zeros(12);
        for (j, c) in control.iter().enumerate() {
            v0[3 * j] = c.x;
            v0[3 * j + 1] = c.y;
            v0[3 * j + 2] = c.z;
        }
        let zero = DVector::zeros(12);
        let l = l_6x10(&[v0, zero.clone(), zero.clone(), zero]);
        for (row, &(a, b)) in PAIRS.iter().enumerate() {
            let d2 = (control[a] - control[b]).norm_squared();
            assert!((l[(row, 0)] - d2).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_too_few_points() {
        let world = [Pt3::new(0.0, 0.0, 0.0); 3];
        let image = [Pt2::new(0.0, 0.0); 3];
        assert_eq!(epnp(&world, &image).unwrap_err(), PnpError::NotEnoughPoints(3));
    }

    #[test]
    fn rejects_coplanar_points() {
        let world: Vec<Pt3> = (0..6)
            .map(|i| Pt3::new(i as Real * 0.1, (i * i) as Real * 0.05, 0.0))
            .collect();
        let gt = Iso3::translation(0.0, 0.0, 2.0);
        assert_eq!(
            epnp(&world, &observe(&gt, &world)).unwrap_err(),
            PnpError::DegeneratePoints
        );
    }
}
