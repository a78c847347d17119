//! Solved trajectories
//!
//! Output of one LQR solve: for each batch element, the rolled-out
//! state sequence (T+1 states, initial state included), the input
//! sequence (T inputs) and the accumulated cost. A solve in
//! [`SolveMode::Retain`](crate::lqr::SolveMode) also keeps the local
//! feedback policy computed by the backward pass.

use nalgebra::{DMatrix, DVector};

use ilqr_core::Dynamics;

/// State sequence of one problem instance
pub type StateSequence = Vec<DVector<f64>>;

/// Input sequence of one problem instance
pub type InputSequence = Vec<DVector<f64>>;

/// Time-varying affine feedback around a nominal trajectory
///
/// u_t = ū_t + K_t (x_t − x̄_t) + k_t
#[derive(Debug, Clone)]
pub struct FeedbackPolicy {
    /// K_t (n_ctrl × n_state)
    pub gains: Vec<DMatrix<f64>>,
    /// k_t (n_ctrl)
    pub offsets: Vec<DVector<f64>>,
    /// x̄_t, the states the dynamics were linearized around
    pub nominal_states: StateSequence,
    /// ū_t
    pub nominal_inputs: InputSequence,
}

impl FeedbackPolicy {
    pub fn horizon(&self) -> usize {
        self.gains.len()
    }

    /// Input prescribed at step `t` for state `x`
    pub fn input(&self, t: usize, x: &DVector<f64>) -> DVector<f64> {
        &self.nominal_inputs[t] + &self.gains[t] * (x - &self.nominal_states[t]) + &self.offsets[t]
    }
}

/// Solved trajectory of a single problem instance
#[derive(Debug, Clone)]
pub struct Trajectory {
    /// x_0 … x_T
    pub states: StateSequence,
    /// u_0 … u_{T-1}
    pub inputs: InputSequence,
    /// Σ_t ½ τ_tᵀQ_tτ_t + p_tᵀτ_t
    pub cost: f64,
    /// Feedback law from the backward pass, if retained
    pub policy: Option<FeedbackPolicy>,
}

impl Trajectory {
    pub fn horizon(&self) -> usize {
        self.inputs.len()
    }

    pub fn initial_state(&self) -> &DVector<f64> {
        &self.states[0]
    }

    pub fn final_state(&self) -> &DVector<f64> {
        &self.states[self.states.len() - 1]
    }

    /// The input a receding-horizon controller applies
    pub fn first_input(&self) -> &DVector<f64> {
        &self.inputs[0]
    }

    /// Inputs advanced by one step, the last input repeated to keep length T
    pub fn shifted_inputs(&self) -> InputSequence {
        let mut shifted: InputSequence = self.inputs.iter().skip(1).cloned().collect();
        shifted.push(self.inputs[self.inputs.len() - 1].clone());
        shifted
    }

    /// Observations along the trajectory, one per input
    pub fn observations<D: Dynamics + ?Sized>(&self, dynamics: &D, dt: f64) -> Vec<DVector<f64>> {
        self.states
            .iter()
            .zip(&self.inputs)
            .enumerate()
            .map(|(t, (x, u))| dynamics.observation(x, u, t as f64 * dt))
            .collect()
    }
}

/// Batch of solved trajectories, one per problem instance
#[derive(Debug, Clone)]
pub struct Solution {
    pub trajectories: Vec<Trajectory>,
}

impl Solution {
    pub fn batch_size(&self) -> usize {
        self.trajectories.len()
    }

    pub fn horizon(&self) -> usize {
        self.trajectories.first().map_or(0, Trajectory::horizon)
    }

    /// Per-instance costs
    pub fn costs(&self) -> Vec<f64> {
        self.trajectories.iter().map(|t| t.cost).collect()
    }

    /// Sum of the per-instance costs
    pub fn total_cost(&self) -> f64 {
        self.trajectories.iter().map(|t| t.cost).sum()
    }

    pub fn states(&self) -> Vec<StateSequence> {
        self.trajectories.iter().map(|t| t.states.clone()).collect()
    }

    pub fn inputs(&self) -> Vec<InputSequence> {
        self.trajectories.iter().map(|t| t.inputs.clone()).collect()
    }

    /// Take the input sequences, discarding everything else
    pub fn into_inputs(self) -> Vec<InputSequence> {
        self.trajectories.into_iter().map(|t| t.inputs).collect()
    }

    /// Split into (states, inputs, costs)
    pub fn into_parts(self) -> (Vec<StateSequence>, Vec<InputSequence>, Vec<f64>) {
        let mut states = Vec::with_capacity(self.trajectories.len());
        let mut inputs = Vec::with_capacity(self.trajectories.len());
        let mut costs = Vec::with_capacity(self.trajectories.len());
        for trajectory in self.trajectories {
            states.push(trajectory.states);
            inputs.push(trajectory.inputs);
            costs.push(trajectory.cost);
        }
        (states, inputs, costs)
    }
}
