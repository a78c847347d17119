//! Controller configuration
//!
//! Parameters for the iLQR solver, the MPC driver and the
//! receding-horizon loop.

use serde::{Deserialize, Serialize};

use crate::lqr::LqrError;

/// MPC driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpcConfig {
    /// Number of timesteps in the horizon (T)
    pub horizon: usize,
    /// Number of iLQR iterations before the final solve
    pub max_iterations: usize,
    /// Slack when accepting a new iterate as the best one
    pub tolerance: f64,
    /// Damping applied when Q_uu cannot be factored
    pub regularization: RegularizationConfig,
}

impl Default for MpcConfig {
    fn default() -> Self {
        Self {
            horizon: 10,
            max_iterations: 10,
            tolerance: 1e-4,
            regularization: RegularizationConfig::default(),
        }
    }
}

/// Levenberg-style damping of Q_uu in the backward recursion
///
/// The factorization of `Q_uu + μI` is first attempted with
/// `μ = initial`; on failure μ grows to `max(min, μ·factor)` until the
/// factorization succeeds or μ exceeds `max`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegularizationConfig {
    pub initial: f64,
    pub min: f64,
    pub factor: f64,
    pub max: f64,
}

impl Default for RegularizationConfig {
    fn default() -> Self {
        Self {
            initial: 0.0,
            min: 1e-6,
            factor: 10.0,
            max: 1e10,
        }
    }
}

impl RegularizationConfig {
    /// Check that escalation strictly increases μ and stops at `max`
    pub fn validate(&self) -> Result<(), LqrError> {
        let values = [self.initial, self.min, self.factor, self.max];
        if !values.iter().all(|v| v.is_finite()) {
            return Err(LqrError::InvalidRegularization("values must be finite"));
        }
        if self.initial < 0.0 {
            return Err(LqrError::InvalidRegularization("initial must be non-negative"));
        }
        if self.min <= 0.0 {
            return Err(LqrError::InvalidRegularization("min must be positive"));
        }
        if self.factor <= 1.0 {
            return Err(LqrError::InvalidRegularization("factor must exceed 1"));
        }
        if self.max < self.initial {
            return Err(LqrError::InvalidRegularization("max must not be below initial"));
        }
        Ok(())
    }

    /// Next damping value after a failed factorization, or `None` once the
    /// ceiling is exceeded or μ would stop growing
    pub fn escalate(&self, mu: f64) -> Option<f64> {
        let next = (mu * self.factor).max(self.min);
        (next > mu && next <= self.max).then_some(next)
    }
}

/// How the receding-horizon controller seeds each solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarmStart {
    /// Start every solve from a zero input sequence
    None,
    /// Drop the applied input and repeat the last one
    Shift,
}

/// Receding-horizon controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Driver configuration
    pub mpc: MpcConfig,
    /// Controller period, also the model timestep [s]
    pub dt: f64,
    /// Warm-start policy between control steps
    pub warm_start: WarmStart,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mpc: MpcConfig::default(),
            dt: 0.01,
            warm_start: WarmStart::Shift,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_escalation_sequence() {
        let reg = RegularizationConfig::default();

        assert_eq!(reg.escalate(reg.initial), Some(1e-6));
        assert_relative_eq!(reg.escalate(1e-6).unwrap_or(0.0), 1e-5, max_relative = 1e-12);
        assert_eq!(reg.escalate(1e10), None);
    }

    #[test]
    fn test_escalation_terminates() {
        let reg = RegularizationConfig::default();
        let mut mu = reg.initial;
        let mut steps = 0;

        while let Some(next) = reg.escalate(mu) {
            mu = next;
            steps += 1;
        }

        assert!(steps <= 17);
        assert!(mu <= reg.max);
    }

    #[test]
    fn test_escalation_stops_when_mu_cannot_grow() {
        let zero_floor = RegularizationConfig {
            min: 0.0,
            ..RegularizationConfig::default()
        };
        assert_eq!(zero_floor.escalate(0.0), None);

        let unit_factor = RegularizationConfig {
            factor: 1.0,
            ..RegularizationConfig::default()
        };
        assert_eq!(unit_factor.escalate(1e-6), None);
    }

    #[test]
    fn test_validate() {
        assert!(RegularizationConfig::default().validate().is_ok());

        let no_damping = RegularizationConfig {
            max: 0.0,
            ..RegularizationConfig::default()
        };
        assert!(no_damping.validate().is_ok());

        let rejected = [
            RegularizationConfig { min: 0.0, ..RegularizationConfig::default() },
            RegularizationConfig { factor: 1.0, ..RegularizationConfig::default() },
            RegularizationConfig { initial: -1.0, ..RegularizationConfig::default() },
            RegularizationConfig { max: f64::INFINITY, ..RegularizationConfig::default() },
            RegularizationConfig { initial: 1.0, max: 0.5, ..RegularizationConfig::default() },
        ];
        for config in rejected {
            assert!(matches!(
                config.validate(),
                Err(LqrError::InvalidRegularization(_))
            ));
        }
    }

    #[test]
    fn test_default_driver_matches_reference_defaults() {
        let config = MpcConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert_relative_eq!(config.tolerance, 1e-4);
    }
}
