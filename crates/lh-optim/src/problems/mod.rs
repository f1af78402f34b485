//! Problem builders on top of the IR.

pub mod lighthouse_registration;
