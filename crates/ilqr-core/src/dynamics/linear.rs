//! Linear time-invariant dynamics
//!
//! x_{t+1} = A x_t + B u_t
//!
//! iLQR on this model reduces to exact LQR, which makes it the reference
//! system for validating the solver.

use nalgebra::{DMatrix, DVector};

use super::{Dynamics, Linearization};

/// Discrete linear system with analytic Jacobians
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    pub a: DMatrix<f64>,
    pub b: DMatrix<f64>,
}

impl LinearSystem {
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>) -> Self {
        debug_assert_eq!(a.nrows(), a.ncols(), "A must be square");
        debug_assert_eq!(a.nrows(), b.nrows(), "A and B must have the same number of rows");
        Self { a, b }
    }

    /// Double integrator with one input (force per unit mass)
    ///
    /// State [position, velocity], zero-order hold on acceleration.
    pub fn double_integrator(dt: f64) -> Self {
        Self::new(
            DMatrix::from_row_slice(2, 2, &[1.0, dt, 0.0, 1.0]),
            DMatrix::from_row_slice(2, 1, &[0.5 * dt * dt, dt]),
        )
    }
}

impl Dynamics for LinearSystem {
    fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    fn input_dim(&self) -> usize {
        self.b.ncols()
    }

    fn state_transition(&self, state: &DVector<f64>, input: &DVector<f64>, _t: f64) -> DVector<f64> {
        &self.a * state + &self.b * input
    }

    fn linearize(&self, _state: &DVector<f64>, _input: &DVector<f64>, _t: f64) -> Linearization {
        Linearization::new(self.a.clone(), self.b.clone())
    }
}
