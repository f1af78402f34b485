//! Perspective-n-Point pose estimation for lighthouse sweeps.
//!
//! A lighthouse is treated as a pinhole camera whose normalised image
//! coordinates are `(tan(azimuth), tan(elevation))`. The solvers estimate
//! `lighthouse_from_tracker`: the transform taking tracker-frame sensor
//! positions into the lighthouse frame.

use crate::ImagePlane;
use lh_core::{Iso3, Pt2, Pt3};
use thiserror::Error;

mod epnp;
mod pose_utils;
mod refine;

pub use epnp::epnp;
pub use refine::refine_pose;

/// Minimum number of correspondences a pose is estimated from.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Errors that can occur during PnP estimation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PnpError {
    /// Fewer correspondences than the solver needs.
    #[error("need at least {MIN_CORRESPONDENCES} point correspondences, got {0}")]
    NotEnoughPoints(usize),
    /// Point and image lists differ in length.
    #[error("{points} points but {images} image observations")]
    MismatchedInput { points: usize, images: usize },
    /// Points are coplanar or collinear, or no candidate pose fits.
    #[error("degenerate point configuration")]
    DegeneratePoints,
    /// A linear solve (SVD) failed.
    #[error("svd failed in PnP")]
    SvdFailed,
}

/// PnP entry points.
#[derive(Debug, Clone, Copy)]
pub struct PnpSolver;

impl PnpSolver {
    /// EPnP followed by Gauss-Newton refinement, from normalised image points.
    pub fn solve(world: &[Pt3], normalized: &[Pt2]) -> Result<Iso3, PnpError> {
        let initial = epnp(world, normalized)?;
        Ok(refine_pose(initial, world, normalized, 20))
    }

    /// Same as [`PnpSolver::solve`] for points on `plane`.
    pub fn solve_on_plane(
        world: &[Pt3],
        image: &[Pt2],
        plane: &ImagePlane,
    ) -> Result<Iso3, PnpError> {
        let normalized: Vec<Pt2> = image.iter().map(|p| plane.normalize(p)).collect();
        Self::solve(world, &normalized)
    }
}
