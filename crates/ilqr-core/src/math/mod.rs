//! Mathematical utilities
//!
//! Numerical integrators used by the discrete-time models and
//! finite-difference Jacobians used to linearize them.

pub mod integrator;
pub mod jacobian;

pub use integrator::*;
pub use jacobian::*;
