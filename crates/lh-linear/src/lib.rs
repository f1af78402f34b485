//! Closed-form and small iterative estimators.
//!
//! - [`ImagePlane`] and [`correct_angles`]: turn sweep angle pairs into
//!   pinhole image points, optionally applying a lighthouse's decoded motor
//!   corrections first.
//! - [`PnpSolver`]: EPnP for 4+ points with Gauss-Newton refinement, returning
//!   `lighthouse_from_tracker` poses.
//! - [`estimate_master_from_slave`]: closed-form initial guess for the
//!   relative transform between two lighthouses from paired tracker poses,
//!   weighting each epoch by how far the tracker was from the lighthouses.

mod image_plane;
pub mod pnp;
mod quaternion_fit;
mod registration;

pub use image_plane::*;
pub use pnp::{PnpError, PnpSolver};
pub use registration::*;
