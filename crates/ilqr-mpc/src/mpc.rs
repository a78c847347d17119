//! Model Predictive Control driver
//!
//! Iterative LQR over a fixed horizon:
//!
//! ```text
//! minimize    Σ_t ½ τ_tᵀQ_tτ_t + p_tᵀτ_t
//! subject to  x_{t+1} = f(x_t, u_t)
//!             x_0 = x_init
//! ```
//!
//! Each iteration linearizes the dynamics around the previous iterate's
//! inputs and solves the resulting LQR problem. The iteration budget is
//! fixed: the driver keeps the best iterate seen and always returns a
//! result, converged or not. It finds a local optimum only.
//!
//! Best tracking accepts an iterate when `cost ≤ best_cost + eps`, so
//! near-ties go to the later iterate and the tracked cost may rise by up
//! to `eps` per iteration.

use log::debug;
use nalgebra::DVector;

use ilqr_core::Dynamics;

use crate::config::{MpcConfig, RegularizationConfig};
use crate::cost::QuadCost;
use crate::lqr::{Lqr, LqrError, SolveMode};
use crate::trajectory::{InputSequence, Solution, StateSequence, Trajectory};

/// Outcome of one iteration for one batch element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    pub batch: usize,
    /// Cost of this iterate
    pub cost: f64,
    /// Best cost after this iterate was considered
    pub best_cost: f64,
    /// Whether this iterate became the best one
    pub accepted: bool,
}

/// Final solve plus the history of the iterations leading to it
#[derive(Debug, Clone)]
pub struct MpcSolution {
    pub solution: Solution,
    pub history: Vec<IterationRecord>,
}

impl MpcSolution {
    pub fn trajectories(&self) -> &[Trajectory] {
        &self.solution.trajectories
    }

    pub fn states(&self) -> Vec<StateSequence> {
        self.solution.states()
    }

    pub fn inputs(&self) -> Vec<InputSequence> {
        self.solution.inputs()
    }

    pub fn costs(&self) -> Vec<f64> {
        self.solution.costs()
    }

    /// Iteration records of one batch element, in order
    pub fn history_of(&self, batch: usize) -> impl Iterator<Item = &IterationRecord> {
        self.history.iter().filter(move |r| r.batch == batch)
    }

    /// Split into (states, inputs, costs)
    pub fn into_parts(self) -> (Vec<StateSequence>, Vec<InputSequence>, Vec<f64>) {
        self.solution.into_parts()
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    inputs: InputSequence,
    cost: f64,
}

/// iLQR-based MPC driver
#[derive(Debug, Clone)]
pub struct Mpc<D: Dynamics> {
    system: D,
    horizon: usize,
    step: usize,
    eps: f64,
    regularization: RegularizationConfig,
}

impl<D: Dynamics> Mpc<D> {
    /// Create a driver
    ///
    /// # Arguments
    /// * `system` - Dynamics to optimize over
    /// * `horizon` - Number of timesteps T
    /// * `step` - Number of iLQR iterations before the final solve
    /// * `eps` - Slack when accepting an iterate as the best one
    pub fn new(system: D, horizon: usize, step: usize, eps: f64) -> Self {
        Self {
            system,
            horizon,
            step,
            eps,
            regularization: RegularizationConfig::default(),
        }
    }

    pub fn from_config(system: D, config: &MpcConfig) -> Self {
        Self::new(system, config.horizon, config.max_iterations, config.tolerance)
            .with_regularization(config.regularization)
    }

    pub fn with_regularization(mut self, regularization: RegularizationConfig) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn system(&self) -> &D {
        &self.system
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn max_iterations(&self) -> usize {
        self.step
    }

    pub fn tolerance(&self) -> f64 {
        self.eps
    }

    fn lqr<'a>(&'a self, cost: &'a QuadCost, mode: SolveMode) -> Result<Lqr<'a, D>, LqrError> {
        Ok(Lqr::new(&self.system, cost, self.horizon)?
            .with_regularization(self.regularization)
            .with_mode(mode))
    }

    /// Run the driver.
    ///
    /// `x_init` holds one initial state per batch element, `current_u`
    /// optionally one nominal input sequence per batch element. Errors
    /// from the LQR solver are returned unchanged.
    pub fn solve(
        &self,
        cost: &QuadCost,
        x_init: &[DVector<f64>],
        dt: f64,
        current_u: Option<&[InputSequence]>,
    ) -> Result<MpcSolution, LqrError> {
        let mut best: Vec<Option<Candidate>> = vec![None; x_init.len()];
        let mut history = Vec::with_capacity(self.step * x_init.len());
        let mut nominal: Option<Vec<InputSequence>> = current_u.map(<[_]>::to_vec);

        for iteration in 0..self.step {
            // Iterates only hand their inputs forward, as constants
            let solution = self
                .lqr(cost, SolveMode::Frozen)?
                .solve(x_init, dt, nominal.as_deref())?;

            for (batch, (trajectory, slot)) in solution.trajectories.iter().zip(&mut best).enumerate() {
                let accepted = match slot {
                    None => true,
                    Some(candidate) => trajectory.cost <= candidate.cost + self.eps,
                };
                if accepted {
                    *slot = Some(Candidate {
                        inputs: trajectory.inputs.clone(),
                        cost: trajectory.cost,
                    });
                }

                let best_cost = slot.as_ref().map_or(trajectory.cost, |c| c.cost);
                debug!(
                    "iteration {iteration} batch {batch}: cost {:.6e}, best {best_cost:.6e}{}",
                    trajectory.cost,
                    if accepted { " (accepted)" } else { "" }
                );
                history.push(IterationRecord {
                    iteration,
                    batch,
                    cost: trajectory.cost,
                    best_cost,
                    accepted,
                });
            }

            nominal = Some(solution.into_inputs());
        }

        // With a single iteration the final solve repeats it from the
        // caller's nominal; with none it is the only solve.
        let warm_start: Option<Vec<InputSequence>> = if self.step > 1 {
            best.into_iter().map(|c| c.map(|c| c.inputs)).collect()
        } else {
            current_u.map(<[_]>::to_vec)
        };

        let solution = self
            .lqr(cost, SolveMode::Retain)?
            .solve(x_init, dt, warm_start.as_deref())?;

        Ok(MpcSolution { solution, history })
    }
}
