use lh_core::{Iso3, Pt2, Pt3, Real, Vec3};
use nalgebra::{Matrix2x3, Matrix3, Matrix3x6, Matrix6, Translation3, UnitQuaternion, Vector2, Vector6};

/// Sum of squared normalised reprojection residuals, `None` if any point is
/// behind the lighthouse.
fn squared_cost(pose: &Iso3, world: &[Pt3], image: &[Pt2]) -> Option<Real> {
    let mut cost = 0.0;
    for (pw, uv) in world.iter().zip(image) {
        let pc = pose.transform_point(pw);
        if pc.z <= 0.0 {
            return None;
        }
        cost += (pc.x / pc.z - uv.x).powi(2) + (pc.y / pc.z - uv.y).powi(2);
    }
    Some(cost)
}

/// Gauss-Newton refinement of `lighthouse_from_tracker` on normalised
/// reprojection error.
///
/// Updates are applied on the left, `T <- exp(delta) * T`. Steps that do not
/// lower the cost stop the iteration, so the result is never worse than
/// `initial`.
pub fn refine_pose(initial: Iso3, world: &[Pt3], image: &[Pt2], max_iters: usize) -> Iso3 {
    let Some(mut cost) = squared_cost(&initial, world, image) else {
        return initial;
    };
    let mut pose = initial;
    for _ in 0..max_iters {
        let mut jtj = Matrix6::<Real>::zeros();
        let mut jtr = Vector6::<Real>::zeros();
        for (pw, uv) in world.iter().zip(image) {
            let pc = pose.transform_point(pw);
            let iz = 1.0 / pc.z;
            let r = Vector2::new(pc.x * iz - uv.x, pc.y * iz - uv.y);
            let d_proj = Matrix2x3::new(
                iz,
                0.0,
                -pc.x * iz * iz,
                0.0,
                iz,
                -pc.y * iz * iz,
            );
            let mut d_point = Matrix3x6::<Real>::zeros();
            d_point
                .fixed_view_mut::<3, 3>(0, 0)
                .copy_from(&Matrix3::identity());
            d_point
                .fixed_view_mut::<3, 3>(0, 3)
                .copy_from(&(-pc.coords.cross_matrix()));
            let j = d_proj * d_point;
            jtj += j.transpose() * j;
            jtr += j.transpose() * r;
        }
        let Some(chol) = jtj.cholesky() else {
            break;
        };
        let delta = -chol.solve(&jtr);
        let rot = UnitQuaternion::from_scaled_axis(Vec3::new(delta[3], delta[4], delta[5]));
        let t = rot * pose.translation.vector + Vec3::new(delta[0], delta[1], delta[2]);
        let candidate = Iso3::from_parts(Translation3::from(t), rot * pose.rotation);
        match squared_cost(&candidate, world, image) {
            Some(c) if c <= cost => {
                pose = candidate;
                cost = c;
            }
            _ => break,
        }
        if delta.norm() < 1e-14 {
            break;
        }
    }
    pose
}
