//! Residual models evaluated by the backends.
//!
//! Models are generic over `nalgebra::RealField` so the same code serves plain
//! `f64` evaluation and the backend's automatic differentiation.

pub mod rotation;
pub mod transform;

pub use transform::lighthouse_transform_residual;
