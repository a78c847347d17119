//! Dynamics interface
//!
//! The contract every system model must satisfy to be optimized:
//!
//! x_{t+1} = f(x_t, u_t, t)
//! y_t     = h(x_t, u_t, t)
//!
//! together with the first-order approximation around a point:
//!
//! δx_{t+1} ≈ A δx_t + B δu_t,   A = ∂f/∂x,  B = ∂f/∂u
//!
//! Models may override [`Dynamics::linearize`] with analytic Jacobians;
//! the default uses central finite differences.

use nalgebra::{DMatrix, DVector};

use crate::math::finite_difference_jacobian;

/// Discrete-time dynamical system
pub trait Dynamics {
    /// Length of the state vector
    fn state_dim(&self) -> usize;

    /// Length of the input vector
    fn input_dim(&self) -> usize;

    /// Next state from the current state and input.
    ///
    /// `t` is the time of the step, i.e. step index times the timestep.
    fn state_transition(&self, state: &DVector<f64>, input: &DVector<f64>, t: f64) -> DVector<f64>;

    /// Observation of the system. Defaults to the full state.
    fn observation(&self, state: &DVector<f64>, _input: &DVector<f64>, _t: f64) -> DVector<f64> {
        state.clone()
    }

    /// Jacobians of the state transition at `(state, input, t)`.
    fn linearize(&self, state: &DVector<f64>, input: &DVector<f64>, t: f64) -> Linearization {
        Linearization::finite_difference(self, state, input, t)
    }
}

impl<D: Dynamics + ?Sized> Dynamics for &D {
    fn state_dim(&self) -> usize {
        (**self).state_dim()
    }

    fn input_dim(&self) -> usize {
        (**self).input_dim()
    }

    fn state_transition(&self, state: &DVector<f64>, input: &DVector<f64>, t: f64) -> DVector<f64> {
        (**self).state_transition(state, input, t)
    }

    fn observation(&self, state: &DVector<f64>, input: &DVector<f64>, t: f64) -> DVector<f64> {
        (**self).observation(state, input, t)
    }

    fn linearize(&self, state: &DVector<f64>, input: &DVector<f64>, t: f64) -> Linearization {
        (**self).linearize(state, input, t)
    }
}

/// First-order approximation of the dynamics at a trajectory point
#[derive(Debug, Clone, PartialEq)]
pub struct Linearization {
    /// ∂f/∂x (n_state × n_state)
    pub a: DMatrix<f64>,
    /// ∂f/∂u (n_state × n_ctrl)
    pub b: DMatrix<f64>,
}

impl Linearization {
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>) -> Self {
        debug_assert_eq!(a.nrows(), a.ncols());
        debug_assert_eq!(a.nrows(), b.nrows());
        Self { a, b }
    }

    /// Linearize any model by central finite differences
    pub fn finite_difference<D: Dynamics + ?Sized>(
        dynamics: &D,
        state: &DVector<f64>,
        input: &DVector<f64>,
        t: f64,
    ) -> Self {
        let a = finite_difference_jacobian(|x| dynamics.state_transition(x, input, t), state);
        let b = finite_difference_jacobian(|u| dynamics.state_transition(state, u, t), input);
        Self { a, b }
    }

    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    pub fn input_dim(&self) -> usize {
        self.b.ncols()
    }

    /// Combined Jacobian F = [A B] with respect to τ = [x; u]
    pub fn stacked(&self) -> DMatrix<f64> {
        let n = self.state_dim();
        let m = self.input_dim();
        let mut f = DMatrix::zeros(n, n + m);
        f.columns_mut(0, n).copy_from(&self.a);
        f.columns_mut(n, m).copy_from(&self.b);
        f
    }

    /// Propagate a perturbation: δx' = A δx + B δu
    pub fn propagate(&self, dx: &DVector<f64>, du: &DVector<f64>) -> DVector<f64> {
        &self.a * dx + &self.b * du
    }
}
