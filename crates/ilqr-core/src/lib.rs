//! # iLQR Core
//!
//! Numeric building blocks and the dynamics interface consumed by the
//! iterative-LQR model predictive controller in `ilqr-mpc`.
//!
//! ## Modules
//!
//! - [`math`]: Numerical utilities (integrators, finite-difference Jacobians)
//! - [`dynamics`]: The [`Dynamics`] contract and reference system models
//!   (linear system, cart-pole, quadrotor)

pub mod math;
pub mod dynamics;

pub use dynamics::{Dynamics, Linearization};

/// Gravity constant [m/s²]
pub const GRAVITY: f64 = 9.81;
