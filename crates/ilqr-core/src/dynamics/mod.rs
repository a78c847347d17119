//! Dynamics models
//!
//! - The [`Dynamics`] contract consumed by the solver
//! - Linear time-invariant system (exact LQR reference)
//! - Cart-pole
//! - Quadrotor (Euler-angle, body-frame velocities)

pub mod system;
pub mod linear;
pub mod cartpole;
pub mod quadrotor;

pub use system::*;
pub use linear::*;
pub use cartpole::*;
pub use quadrotor::*;
