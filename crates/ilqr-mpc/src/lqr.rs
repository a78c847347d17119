//! Linear-Quadratic Regulator solver
//!
//! One linearize-and-solve pass of iterative LQR:
//!
//! 1. Roll the nominal inputs ū through the nonlinear dynamics to get x̄.
//! 2. Backward recursion (t = T−1 … 0), in perturbation coordinates
//!    around (x̄, ū):
//!
//! ```text
//! Q̂_t = Q_t + Fᵀ V_{t+1} F          F = [A_t B_t]
//! q̂_t = (Q_t τ̄_t + p_t) + Fᵀ v_{t+1}
//! K_t = −Q̂_uu⁻¹ Q̂_ux                k_t = −Q̂_uu⁻¹ q̂_u
//! V_t = Q̂_xx + Q̂_xu K_t + K_tᵀ Q̂_ux + K_tᵀ Q̂_uu K_t
//! v_t = q̂_x + Q̂_xu k_t + K_tᵀ q̂_u + K_tᵀ Q̂_uu k_t
//! ```
//!
//!    The last step has no successor, so Q̂_{T−1} = Q_{T−1}.
//! 3. Forward recursion from x_init with u_t = ū_t + K_t(x_t − x̄_t) + k_t,
//!    stepping the true nonlinear dynamics and accumulating the cost.
//!
//! For linear dynamics a single pass is exact LQR.

use log::{trace, warn};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use thiserror::Error;

use ilqr_core::Dynamics;

use crate::config::RegularizationConfig;
use crate::cost::{tau, QuadCost};
use crate::trajectory::{FeedbackPolicy, InputSequence, Solution, Trajectory};

/// LQR errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LqrError {
    #[error("Batch is empty")]
    EmptyBatch,
    #[error("Horizon must contain at least one step")]
    ZeroHorizon,
    #[error("Batch size mismatch for {what}: expected {expected}, got {got}")]
    BatchMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Horizon mismatch for {what}: expected {expected}, got {got}")]
    HorizonMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Invalid state dimension: expected {expected}, got {got}")]
    StateDimension { expected: usize, got: usize },
    #[error("Invalid input dimension: expected {expected}, got {got}")]
    InputDimension { expected: usize, got: usize },
    #[error("Invalid cost dimension: expected {expected}, got {got}")]
    CostDimension { expected: usize, got: usize },
    #[error("Cost matrix is not square: {rows}x{cols}")]
    NonSquareCost { rows: usize, cols: usize },
    #[error("Invalid timestep: {0}")]
    InvalidTimestep(f64),
    #[error("Invalid regularization: {0}")]
    InvalidRegularization(&'static str),
    #[error("Q_uu is singular at batch {batch}, step {step} (damping reached {regularization})")]
    Singular {
        batch: usize,
        step: usize,
        regularization: f64,
    },
    #[error("Non-finite value at batch {batch}, step {step}")]
    NonFinite { batch: usize, step: usize },
}

impl LqrError {
    /// Whether the failure happened inside the recursion rather than
    /// during validation
    pub fn is_numerical(&self) -> bool {
        matches!(self, Self::Singular { .. } | Self::NonFinite { .. })
    }
}

/// Whether a solve keeps its backward-pass products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveMode {
    /// Trajectories only; the nominal is a constant for the next iterate
    Frozen,
    /// Trajectories plus the feedback policy they were produced by
    #[default]
    Retain,
}

/// LQR solver bound to a system, a cost and a horizon
#[derive(Debug)]
pub struct Lqr<'a, D: Dynamics + ?Sized> {
    dynamics: &'a D,
    cost: &'a QuadCost,
    horizon: usize,
    regularization: RegularizationConfig,
    mode: SolveMode,
}

impl<'a, D: Dynamics + ?Sized> Lqr<'a, D> {
    /// Bind the solver, checking the cost against the system dimensions
    pub fn new(dynamics: &'a D, cost: &'a QuadCost, horizon: usize) -> Result<Self, LqrError> {
        if horizon == 0 {
            return Err(LqrError::ZeroHorizon);
        }
        if cost.horizon() != horizon {
            return Err(LqrError::HorizonMismatch {
                what: "cost",
                expected: horizon,
                got: cost.horizon(),
            });
        }
        let expected = dynamics.state_dim() + dynamics.input_dim();
        if cost.tau_dim() != expected {
            return Err(LqrError::CostDimension {
                expected,
                got: cost.tau_dim(),
            });
        }

        Ok(Self {
            dynamics,
            cost,
            horizon,
            regularization: RegularizationConfig::default(),
            mode: SolveMode::default(),
        })
    }

    pub fn with_regularization(mut self, regularization: RegularizationConfig) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn with_mode(mut self, mode: SolveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn mode(&self) -> SolveMode {
        self.mode
    }

    /// Solve every batch element.
    ///
    /// `x_init` holds one initial state per batch element; `u_nominal`,
    /// if given, one input sequence of length T per batch element.
    /// Without it the nominal inputs are zero.
    pub fn solve(
        &self,
        x_init: &[DVector<f64>],
        dt: f64,
        u_nominal: Option<&[InputSequence]>,
    ) -> Result<Solution, LqrError> {
        self.validate(x_init, dt, u_nominal)?;

        let n_ctrl = self.dynamics.input_dim();
        let zeros = vec![DVector::zeros(n_ctrl); self.horizon];

        let trajectories = x_init
            .iter()
            .enumerate()
            .map(|(b, x0)| {
                let u_bar = u_nominal.map_or(zeros.as_slice(), |u| u[b].as_slice());
                self.solve_single(b, x0, dt, u_bar)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Solution { trajectories })
    }

    fn validate(
        &self,
        x_init: &[DVector<f64>],
        dt: f64,
        u_nominal: Option<&[InputSequence]>,
    ) -> Result<(), LqrError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(LqrError::InvalidTimestep(dt));
        }
        self.regularization.validate()?;
        if x_init.is_empty() {
            return Err(LqrError::EmptyBatch);
        }
        let batch = x_init.len();
        if !self.cost.is_broadcast() && self.cost.batch_size() != batch {
            return Err(LqrError::BatchMismatch {
                what: "cost",
                expected: batch,
                got: self.cost.batch_size(),
            });
        }

        let n_state = self.dynamics.state_dim();
        if let Some(x0) = x_init.iter().find(|x0| x0.len() != n_state) {
            return Err(LqrError::StateDimension {
                expected: n_state,
                got: x0.len(),
            });
        }

        if let Some(u) = u_nominal {
            if u.len() != batch {
                return Err(LqrError::BatchMismatch {
                    what: "nominal input",
                    expected: batch,
                    got: u.len(),
                });
            }
            let n_ctrl = self.dynamics.input_dim();
            for sequence in u {
                if sequence.len() != self.horizon {
                    return Err(LqrError::HorizonMismatch {
                        what: "nominal input",
                        expected: self.horizon,
                        got: sequence.len(),
                    });
                }
                if let Some(u_t) = sequence.iter().find(|u_t| u_t.len() != n_ctrl) {
                    return Err(LqrError::InputDimension {
                        expected: n_ctrl,
                        got: u_t.len(),
                    });
                }
            }
        }

        Ok(())
    }

    fn solve_single(
        &self,
        batch: usize,
        x0: &DVector<f64>,
        dt: f64,
        u_bar: &[DVector<f64>],
    ) -> Result<Trajectory, LqrError> {
        let x_bar = self.nominal_rollout(batch, x0, dt, u_bar)?;
        let (gains, offsets) = self.backward(batch, dt, &x_bar, u_bar)?;
        let (states, inputs, cost) = self.forward(batch, x0, dt, &x_bar, u_bar, &gains, &offsets)?;

        let policy = match self.mode {
            SolveMode::Frozen => None,
            SolveMode::Retain => Some(FeedbackPolicy {
                gains,
                offsets,
                nominal_states: x_bar,
                nominal_inputs: u_bar.to_vec(),
            }),
        };

        Ok(Trajectory {
            states,
            inputs,
            cost,
            policy,
        })
    }

    /// x̄_0 … x̄_{T−1}; the terminal state never enters the recursion
    fn nominal_rollout(
        &self,
        batch: usize,
        x0: &DVector<f64>,
        dt: f64,
        u_bar: &[DVector<f64>],
    ) -> Result<Vec<DVector<f64>>, LqrError> {
        let mut x_bar = Vec::with_capacity(self.horizon);
        x_bar.push(x0.clone());
        for t in 0..self.horizon - 1 {
            let next = self.dynamics.state_transition(&x_bar[t], &u_bar[t], t as f64 * dt);
            if !next.iter().all(|v| v.is_finite()) {
                return Err(LqrError::NonFinite { batch, step: t });
            }
            x_bar.push(next);
        }
        Ok(x_bar)
    }

    fn backward(
        &self,
        batch: usize,
        dt: f64,
        x_bar: &[DVector<f64>],
        u_bar: &[DVector<f64>],
    ) -> Result<(Vec<DMatrix<f64>>, Vec<DVector<f64>>), LqrError> {
        let n = self.dynamics.state_dim();
        let m = self.dynamics.input_dim();

        let mut gains = vec![DMatrix::zeros(m, n); self.horizon];
        let mut offsets = vec![DVector::zeros(m); self.horizon];
        let mut value: Option<(DMatrix<f64>, DVector<f64>)> = None;

        for t in (0..self.horizon).rev() {
            let tau_bar = tau(&x_bar[t], &u_bar[t]);
            let grad = self.cost.gradient(batch, t, &tau_bar);

            let (q_hat, q_vec) = match &value {
                None => (self.cost.q(batch, t).clone(), grad),
                Some((v_mat, v_vec)) => {
                    let f = self
                        .dynamics
                        .linearize(&x_bar[t], &u_bar[t], t as f64 * dt)
                        .stacked();
                    let f_t = f.transpose();
                    (self.cost.q(batch, t) + &f_t * v_mat * &f, grad + &f_t * v_vec)
                }
            };

            if !q_hat.iter().chain(q_vec.iter()).all(|v| v.is_finite()) {
                return Err(LqrError::NonFinite { batch, step: t });
            }

            let q_xx = q_hat.view((0, 0), (n, n));
            let q_xu = q_hat.view((0, n), (n, m));
            let q_ux = q_hat.view((n, 0), (m, n));
            let q_uu = q_hat.view((n, n), (m, m)).into_owned();
            let q_x = q_vec.rows(0, n);
            let q_u = q_vec.rows(n, m);

            let chol = self.factor(batch, t, &q_uu)?;
            let k_mat = -chol.solve(&q_ux);
            let k_vec = -chol.solve(&q_u);

            let k_mat_t = k_mat.transpose();
            let v_mat = &q_xx + &q_xu * &k_mat + &k_mat_t * &q_ux + &k_mat_t * &q_uu * &k_mat;
            let v_mat = (&v_mat + v_mat.transpose()) * 0.5;
            let v_vec = &q_x + &q_xu * &k_vec + &k_mat_t * &q_u + &k_mat_t * &q_uu * &k_vec;

            gains[t] = k_mat;
            offsets[t] = k_vec;
            value = Some((v_mat, v_vec));
        }

        Ok((gains, offsets))
    }

    /// Cholesky factor of Q_uu + μI with Levenberg-style damping
    fn factor(&self, batch: usize, step: usize, q_uu: &DMatrix<f64>) -> Result<Cholesky<f64, Dyn>, LqrError> {
        let reg = &self.regularization;
        let identity = DMatrix::<f64>::identity(q_uu.nrows(), q_uu.ncols());
        let mut mu = reg.initial;

        loop {
            let damped = if mu > 0.0 { q_uu + &identity * mu } else { q_uu.clone() };
            if let Some(chol) = Cholesky::new(damped) {
                if mu > reg.initial {
                    warn!("Q_uu damped with mu = {mu:e} at batch {batch}, step {step}");
                }
                return Ok(chol);
            }

            match reg.escalate(mu) {
                Some(next) => {
                    trace!("Q_uu factorization failed at step {step}, damping {mu:e} -> {next:e}");
                    mu = next;
                }
                None => {
                    return Err(LqrError::Singular {
                        batch,
                        step,
                        regularization: mu,
                    })
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn forward(
        &self,
        batch: usize,
        x0: &DVector<f64>,
        dt: f64,
        x_bar: &[DVector<f64>],
        u_bar: &[DVector<f64>],
        gains: &[DMatrix<f64>],
        offsets: &[DVector<f64>],
    ) -> Result<(Vec<DVector<f64>>, Vec<DVector<f64>>, f64), LqrError> {
        let mut states = Vec::with_capacity(self.horizon + 1);
        let mut inputs = Vec::with_capacity(self.horizon);
        let mut cost = 0.0;

        let mut x = x0.clone();
        for t in 0..self.horizon {
            let u = &u_bar[t] + &gains[t] * (&x - &x_bar[t]) + &offsets[t];
            cost += self.cost.stage_cost(batch, t, &tau(&x, &u));

            let next = self.dynamics.state_transition(&x, &u, t as f64 * dt);
            if !cost.is_finite() || !next.iter().chain(u.iter()).all(|v| v.is_finite()) {
                return Err(LqrError::NonFinite { batch, step: t });
            }

            states.push(std::mem::replace(&mut x, next));
            inputs.push(u);
        }
        states.push(x);

        Ok((states, inputs, cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ilqr_core::dynamics::LinearSystem;

    fn double_integrator() -> LinearSystem {
        LinearSystem::double_integrator(0.1)
    }

    fn unit_cost(batch: usize, horizon: usize) -> QuadCost {
        QuadCost::tiled(DMatrix::identity(3, 3), DVector::zeros(3), batch, horizon).unwrap()
    }

    fn state(x: f64, v: f64) -> DVector<f64> {
        DVector::from_vec(vec![x, v])
    }

    #[test]
    fn test_output_lengths() {
        let sys = double_integrator();
        let cost = unit_cost(1, 7);
        let lqr = Lqr::new(&sys, &cost, 7).unwrap();

        let solution = lqr.solve(&[state(1.0, 0.0), state(-2.0, 0.5)], 0.1, None).unwrap();

        assert_eq!(solution.batch_size(), 2);
        for traj in &solution.trajectories {
            assert_eq!(traj.states.len(), 8);
            assert_eq!(traj.inputs.len(), 7);
            assert_eq!(traj.policy.as_ref().map(FeedbackPolicy::horizon), Some(7));
        }
    }

    #[test]
    fn test_initial_state_preserved() {
        let sys = double_integrator();
        let cost = unit_cost(1, 4);
        let lqr = Lqr::new(&sys, &cost, 4).unwrap();
        let x0 = state(0.3, -0.2);

        let solution = lqr.solve(&[x0.clone()], 0.1, None).unwrap();

        assert_eq!(solution.trajectories[0].states[0], x0);
    }

    #[test]
    fn test_frozen_mode_drops_policy() {
        let sys = double_integrator();
        let cost = unit_cost(1, 4);
        let lqr = Lqr::new(&sys, &cost, 4).unwrap().with_mode(SolveMode::Frozen);

        let solution = lqr.solve(&[state(1.0, 0.0)], 0.1, None).unwrap();

        assert!(solution.trajectories[0].policy.is_none());
    }

    #[test]
    fn test_reported_cost_matches_trajectory() {
        let sys = double_integrator();
        let cost = unit_cost(1, 6);
        let lqr = Lqr::new(&sys, &cost, 6).unwrap();

        let solution = lqr.solve(&[state(1.0, 1.0)], 0.1, None).unwrap();
        let traj = &solution.trajectories[0];

        assert_relative_eq!(
            traj.cost,
            cost.evaluate(0, &traj.states, &traj.inputs),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rollout_obeys_dynamics() {
        let sys = double_integrator();
        let cost = unit_cost(1, 5);
        let lqr = Lqr::new(&sys, &cost, 5).unwrap();

        let solution = lqr.solve(&[state(2.0, -1.0)], 0.1, None).unwrap();
        let traj = &solution.trajectories[0];

        for t in 0..5 {
            let next = sys.state_transition(&traj.states[t], &traj.inputs[t], 0.0);
            assert_relative_eq!(traj.states[t + 1], next, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_policy_reproduces_inputs() {
        let sys = double_integrator();
        let cost = unit_cost(1, 5);
        let lqr = Lqr::new(&sys, &cost, 5).unwrap();

        let solution = lqr.solve(&[state(2.0, -1.0)], 0.1, None).unwrap();
        let traj = &solution.trajectories[0];
        let policy = traj.policy.as_ref().unwrap();

        for t in 0..5 {
            assert_relative_eq!(policy.input(t, &traj.states[t]), traj.inputs[t], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rejects_wrong_state_dimension() {
        let sys = double_integrator();
        let cost = unit_cost(1, 3);
        let lqr = Lqr::new(&sys, &cost, 3).unwrap();

        let err = lqr.solve(&[DVector::zeros(3)], 0.1, None).unwrap_err();

        assert_eq!(err, LqrError::StateDimension { expected: 2, got: 3 });
        assert!(!err.is_numerical());
    }

    #[test]
    fn test_rejects_nominal_of_wrong_length() {
        let sys = double_integrator();
        let cost = unit_cost(1, 3);
        let lqr = Lqr::new(&sys, &cost, 3).unwrap();
        let u: Vec<InputSequence> = vec![vec![DVector::zeros(1); 2]];

        let err = lqr.solve(&[state(0.0, 0.0)], 0.1, Some(&u)).unwrap_err();

        assert_eq!(
            err,
            LqrError::HorizonMismatch {
                what: "nominal input",
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn test_rejects_nominal_of_wrong_width() {
        let sys = double_integrator();
        let cost = unit_cost(1, 2);
        let lqr = Lqr::new(&sys, &cost, 2).unwrap();
        let u: Vec<InputSequence> = vec![vec![DVector::zeros(2); 2]];

        let err = lqr.solve(&[state(0.0, 0.0)], 0.1, Some(&u)).unwrap_err();

        assert_eq!(err, LqrError::InputDimension { expected: 1, got: 2 });
    }

    #[test]
    fn test_rejects_batch_mismatch() {
        let sys = double_integrator();
        let cost = unit_cost(3, 2);
        let lqr = Lqr::new(&sys, &cost, 2).unwrap();

        let err = lqr.solve(&vec![state(0.0, 0.0); 2], 0.1, None).unwrap_err();

        assert_eq!(
            err,
            LqrError::BatchMismatch {
                what: "cost",
                expected: 2,
                got: 3
            }
        );
    }

    #[test]
    fn test_rejects_cost_for_other_system() {
        let sys = double_integrator();
        let cost = QuadCost::tiled(DMatrix::identity(4, 4), DVector::zeros(4), 1, 2).unwrap();

        let err = Lqr::new(&sys, &cost, 2).unwrap_err();

        assert_eq!(err, LqrError::CostDimension { expected: 3, got: 4 });
    }

    #[test]
    fn test_rejects_horizon_mismatch_and_bad_timestep() {
        let sys = double_integrator();
        let cost = unit_cost(1, 2);

        assert_eq!(
            Lqr::new(&sys, &cost, 3).unwrap_err(),
            LqrError::HorizonMismatch {
                what: "cost",
                expected: 3,
                got: 2
            }
        );
        assert_eq!(Lqr::new(&sys, &cost, 0).unwrap_err(), LqrError::ZeroHorizon);

        let lqr = Lqr::new(&sys, &cost, 2).unwrap();
        let err = lqr.solve(&[state(0.0, 0.0)], f64::NAN, None).unwrap_err();
        assert!(matches!(err, LqrError::InvalidTimestep(_)));
    }

    #[test]
    fn test_zero_input_weight_is_damped() {
        // Q_uu vanishes at the last step without an input weight
        let sys = double_integrator();
        let q = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1.0, 0.0]));
        let cost = QuadCost::tiled(q, DVector::zeros(3), 1, 3).unwrap();
        let lqr = Lqr::new(&sys, &cost, 3).unwrap();

        let solution = lqr.solve(&[state(1.0, 0.0)], 0.1, None).unwrap();

        let traj = &solution.trajectories[0];
        assert!(traj.cost.is_finite());
        assert!(traj.states.iter().all(|x| x.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_singular_without_damping_is_an_error() {
        let sys = double_integrator();
        let q = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1.0, 0.0]));
        let cost = QuadCost::tiled(q, DVector::zeros(3), 1, 3).unwrap();
        let no_damping = RegularizationConfig {
            initial: 0.0,
            min: 1e-6,
            factor: 10.0,
            max: 0.0,
        };
        let lqr = Lqr::new(&sys, &cost, 3).unwrap().with_regularization(no_damping);

        let err = lqr.solve(&[state(1.0, 0.0)], 0.1, None).unwrap_err();

        assert_eq!(
            err,
            LqrError::Singular {
                batch: 0,
                step: 2,
                regularization: 0.0
            }
        );
        assert!(err.is_numerical());
    }

    #[test]
    fn test_regularization_that_cannot_grow_is_rejected() {
        let sys = double_integrator();
        let q = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1.0, 0.0]));
        let cost = QuadCost::tiled(q, DVector::zeros(3), 1, 3).unwrap();
        let zero_floor = RegularizationConfig {
            initial: 0.0,
            min: 0.0,
            factor: 10.0,
            max: 1e10,
        };
        let lqr = Lqr::new(&sys, &cost, 3).unwrap().with_regularization(zero_floor);

        let err = lqr.solve(&[state(1.0, 0.0)], 0.1, None).unwrap_err();

        assert_eq!(err, LqrError::InvalidRegularization("min must be positive"));
        assert!(!err.is_numerical());
    }

    #[test]
    fn test_non_finite_dynamics_is_reported() {
        struct Exploding;

        impl Dynamics for Exploding {
            fn state_dim(&self) -> usize {
                1
            }

            fn input_dim(&self) -> usize {
                1
            }

            fn state_transition(&self, x: &DVector<f64>, _u: &DVector<f64>, _t: f64) -> DVector<f64> {
                x.map(|v| if v > 1.0 { f64::INFINITY } else { v * 10.0 })
            }
        }

        let cost = QuadCost::tiled(DMatrix::identity(2, 2), DVector::zeros(2), 1, 4).unwrap();
        let lqr = Lqr::new(&Exploding, &cost, 4).unwrap();

        let err = lqr.solve(&[DVector::from_vec(vec![0.5])], 0.1, None).unwrap_err();

        assert_eq!(err, LqrError::NonFinite { batch: 0, step: 1 });
    }
}
