//! Shared data model.

mod lighthouse;
mod measurement;
mod pulse;
mod tracker;

pub use lighthouse::*;
pub use measurement::*;
pub use pulse::*;
pub use tracker::*;
