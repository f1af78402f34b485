//! Conversions between workspace types and solver parameter vectors.

pub mod transform6;
