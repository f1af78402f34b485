//! Backend-independent intermediate representation of the registration problem.

mod types;

pub use types::{BlockRole, ParamBlock, ParamId, ProblemIR, ResidualBlock, RobustLoss, BLOCK_DIM};
