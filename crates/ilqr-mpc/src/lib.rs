//! Model predictive control by iterative LQR
//!
//! Solves finite-horizon optimal control problems with a quadratic cost
//! over states and inputs and nonlinear dynamics:
//!
//! ```text
//! minimize    Σ_{t=0}^{T-1} ½ τ_tᵀ Q_t τ_t + p_tᵀ τ_t,   τ_t = [x_t; u_t]
//! subject to  x_{t+1} = f(x_t, u_t, t·dt)
//!             x_0 = x_init
//! ```
//!
//! # Components
//!
//! - [`cost`]: Quadratic cost weights and evaluation
//! - [`lqr`]: One linearize-and-solve pass (backward and forward recursion)
//! - [`mpc`]: Fixed-budget iLQR driver with best-iterate tracking
//! - [`controller`]: Receding-horizon closed loop around the driver
//! - [`trajectory`]: Solved trajectories and feedback policies
//! - [`config`]: Driver and controller configuration
//!
//! Dynamics models live in `ilqr-core`.

pub mod config;
pub mod controller;
pub mod cost;
pub mod lqr;
pub mod mpc;
pub mod trajectory;

// Re-exports
pub use config::{ControllerConfig, MpcConfig, RegularizationConfig, WarmStart};
pub use controller::{ControllerError, RecedingHorizon};
pub use cost::QuadCost;
pub use lqr::{Lqr, LqrError, SolveMode};
pub use mpc::{IterationRecord, Mpc, MpcSolution};
pub use trajectory::{FeedbackPolicy, InputSequence, Solution, StateSequence, Trajectory};
