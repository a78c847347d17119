//! Receding-horizon controller
//!
//! Closed loop around the MPC driver: each call to
//! [`RecedingHorizon::update`] solves over the full horizon from the
//! measured state and applies only the first input. The rest of the
//! solution seeds the next call when warm starting is enabled.

use log::debug;
use nalgebra::DVector;
use thiserror::Error;

use ilqr_core::Dynamics;

use crate::config::{ControllerConfig, WarmStart};
use crate::cost::QuadCost;
use crate::lqr::LqrError;
use crate::mpc::{Mpc, MpcSolution};
use crate::trajectory::InputSequence;

/// Controller errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    #[error("Solver error: {0}")]
    Solver(#[from] LqrError),
    #[error("No solution available yet")]
    NotInitialized,
    #[error("Invalid state dimension: expected {expected}, got {got}")]
    StateDimension { expected: usize, got: usize },
    #[error("Step {step} is outside the horizon of {horizon}")]
    StepOutOfRange { step: usize, horizon: usize },
}

/// Receding-horizon controller over a single problem instance
///
/// The cost is expressed in error coordinates: with a goal set, the
/// driver sees `x − goal` instead of `x`.
#[derive(Debug)]
pub struct RecedingHorizon<D: Dynamics> {
    mpc: Mpc<D>,
    cost: QuadCost,
    dt: f64,
    warm_start: WarmStart,
    goal: Option<DVector<f64>>,
    nominal: Option<InputSequence>,
    last_solution: Option<MpcSolution>,
    time: f64,
}

impl<D: Dynamics> RecedingHorizon<D> {
    pub fn new(system: D, cost: QuadCost, config: &ControllerConfig) -> Result<Self, LqrError> {
        if !config.dt.is_finite() || config.dt < 0.0 {
            return Err(LqrError::InvalidTimestep(config.dt));
        }
        config.mpc.regularization.validate()?;
        if cost.batch_size() != 1 {
            return Err(LqrError::BatchMismatch {
                what: "cost",
                expected: 1,
                got: cost.batch_size(),
            });
        }
        if cost.horizon() != config.mpc.horizon {
            return Err(LqrError::HorizonMismatch {
                what: "cost",
                expected: config.mpc.horizon,
                got: cost.horizon(),
            });
        }
        let expected = system.state_dim() + system.input_dim();
        if cost.tau_dim() != expected {
            return Err(LqrError::CostDimension {
                expected,
                got: cost.tau_dim(),
            });
        }

        Ok(Self {
            mpc: Mpc::from_config(system, &config.mpc),
            cost,
            dt: config.dt,
            warm_start: config.warm_start,
            goal: None,
            nominal: None,
            last_solution: None,
            time: 0.0,
        })
    }

    pub fn system(&self) -> &D {
        self.mpc.system()
    }

    pub fn set_goal(&mut self, goal: DVector<f64>) -> Result<(), ControllerError> {
        self.check_state(&goal)?;
        self.goal = Some(goal);
        Ok(())
    }

    pub fn clear_goal(&mut self) {
        self.goal = None;
    }

    pub fn goal(&self) -> Option<&DVector<f64>> {
        self.goal.as_ref()
    }

    /// Elapsed controller time [s]
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn last_solution(&self) -> Option<&MpcSolution> {
        self.last_solution.as_ref()
    }

    /// Warm start the next solve will use
    pub fn nominal(&self) -> Option<&InputSequence> {
        self.nominal.as_ref()
    }

    /// Drop the warm start, the last solution and the elapsed time
    pub fn reset(&mut self) {
        self.nominal = None;
        self.last_solution = None;
        self.time = 0.0;
    }

    fn check_state(&self, state: &DVector<f64>) -> Result<(), ControllerError> {
        let expected = self.mpc.system().state_dim();
        if state.len() != expected {
            return Err(ControllerError::StateDimension {
                expected,
                got: state.len(),
            });
        }
        Ok(())
    }

    fn error_state(&self, state: &DVector<f64>) -> DVector<f64> {
        match &self.goal {
            Some(goal) => state - goal,
            None => state.clone(),
        }
    }

    /// Solve from `state` and return the input to apply now
    pub fn update(&mut self, state: &DVector<f64>) -> Result<DVector<f64>, ControllerError> {
        self.check_state(state)?;

        let x_init = [self.error_state(state)];
        let nominal = self.nominal.take().map(|u| vec![u]);
        let solution = self.mpc.solve(&self.cost, &x_init, self.dt, nominal.as_deref())?;

        let trajectory = solution
            .trajectories()
            .first()
            .ok_or(ControllerError::NotInitialized)?;
        let input = trajectory.first_input().clone();
        debug!("t = {:.3}: cost {:.6e}", self.time, trajectory.cost);

        self.nominal = match self.warm_start {
            WarmStart::None => None,
            WarmStart::Shift => Some(trajectory.shifted_inputs()),
        };
        self.last_solution = Some(solution);
        self.time += self.dt;

        Ok(input)
    }

    /// Input the last solution's feedback law prescribes at `step` for `state`
    pub fn feedback(&self, step: usize, state: &DVector<f64>) -> Result<DVector<f64>, ControllerError> {
        self.check_state(state)?;

        let policy = self
            .last_solution
            .as_ref()
            .and_then(|s| s.trajectories().first())
            .and_then(|t| t.policy.as_ref())
            .ok_or(ControllerError::NotInitialized)?;
        if step >= policy.horizon() {
            return Err(ControllerError::StepOutOfRange {
                step,
                horizon: policy.horizon(),
            });
        }

        Ok(policy.input(step, &self.error_state(state)))
    }
}
