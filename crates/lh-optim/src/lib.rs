//! Non-linear optimization of lighthouse registrations built on tiny-solver.
//!
//! Problems are first expressed in a small backend-independent IR
//! ([`ir::ProblemIR`]): named 6D blocks, either free slave transforms or
//! constant epoch poses, and residual blocks referring to them by id. The
//! tiny-solver backend compiles the IR into a solver-native problem. The only
//! problem shipped here is [`problems::lighthouse_registration`].

pub mod backend;
pub mod factors;
pub mod ir;
pub mod params;
pub mod problems;

pub use problems::lighthouse_registration::{
    optimize_lighthouse_registration, LighthousePoses, RegistrationDataset, RegistrationResult,
    RegistrationSolveOptions, SolveStatus,
};
