//! Angle-axis / quaternion conversions that stay differentiable at zero
//! rotation.

use nalgebra::{convert, Quaternion, RealField, Vector3};

/// Unit quaternion of an angle-axis vector.
pub fn angle_axis_to_quaternion<T: RealField>(aa: &Vector3<T>) -> Quaternion<T> {
    let theta2 = aa.norm_squared();
    if theta2 > T::zero() {
        let theta = theta2.sqrt();
        let half = theta.clone() * convert::<f64, T>(0.5);
        let k = half.clone().sin() / theta;
        Quaternion::new(
            half.cos(),
            aa.x.clone() * k.clone(),
            aa.y.clone() * k.clone(),
            aa.z.clone() * k,
        )
    } else {
        // First-order expansion keeps the derivative exact at the origin.
        let k = convert::<f64, T>(0.5);
        Quaternion::new(
            T::one(),
            aa.x.clone() * k.clone(),
            aa.y.clone() * k.clone(),
            aa.z.clone() * k,
        )
    }
}

/// Angle-axis vector of a unit quaternion, with the angle in `[-π, π]`.
pub fn quaternion_to_angle_axis<T: RealField>(q: &Quaternion<T>) -> Vector3<T> {
    let (w, x, y, z) = (q.w.clone(), q.i.clone(), q.j.clone(), q.k.clone());
    let sin_sq = x.clone() * x.clone() + y.clone() * y.clone() + z.clone() * z.clone();
    let k = if sin_sq > T::zero() {
        let sin_theta = sin_sq.sqrt();
        // q and -q are the same rotation; pick the shorter angle.
        let two_theta = if w < T::zero() {
            convert::<f64, T>(2.0) * (-sin_theta.clone()).atan2(-w)
        } else {
            convert::<f64, T>(2.0) * sin_theta.clone().atan2(w)
        };
        two_theta / sin_theta
    } else {
        convert::<f64, T>(2.0)
    };
    Vector3::new(x * k.clone(), y * k.clone(), z * k)
}

/// Rotate `v` by unit quaternion `q`.
pub fn rotate<T: RealField>(q: &Quaternion<T>, v: &Vector3<T>) -> Vector3<T> {
    let p = Quaternion::from_imag(v.clone());
    (q.clone() * p * q.conjugate()).imag()
}
