//! Cart-pole dynamics
//!
//! State [x, ẋ, θ, θ̇], input [F] (horizontal force on the cart).
//!
//! temp = (F + m_p·l·θ̇²·sin θ) / (m_c + m_p)
//! θ̈    = (g·sin θ − cos θ·temp) / (l·(4/3 − m_p·cos²θ / (m_c + m_p)))
//! ẍ    = temp − m_p·l·θ̈·cos θ / (m_c + m_p)
//!
//! Discretized with an explicit Euler step of length `dt`.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::Dynamics;
use crate::math::euler;
use crate::GRAVITY;

/// Cart-pole parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartPoleParams {
    /// Integration step [s]
    pub dt: f64,
    /// Pole length [m]
    pub length: f64,
    /// Cart mass [kg]
    pub cart_mass: f64,
    /// Pole mass [kg]
    pub pole_mass: f64,
    /// Gravitational acceleration [m/s²]
    pub gravity: f64,
}

impl Default for CartPoleParams {
    fn default() -> Self {
        Self {
            dt: 0.01,
            length: 1.5,
            cart_mass: 20.0,
            pole_mass: 10.0,
            gravity: GRAVITY,
        }
    }
}

/// Cart-pole model
#[derive(Debug, Clone)]
pub struct CartPole {
    pub params: CartPoleParams,
}

impl CartPole {
    pub fn new(params: CartPoleParams) -> Self {
        Self { params }
    }

    /// Continuous-time state derivative
    pub fn state_derivative(&self, state: &DVector<f64>, force: f64) -> DVector<f64> {
        let p = &self.params;
        let (x_dot, theta, theta_dot) = (state[1], state[2], state[3]);
        let (sin_theta, cos_theta) = theta.sin_cos();

        let total_mass = p.cart_mass + p.pole_mass;
        let pole_mass_length = p.pole_mass * p.length;

        let temp = (force + pole_mass_length * theta_dot * theta_dot * sin_theta) / total_mass;
        let theta_acc = (p.gravity * sin_theta - cos_theta * temp)
            / (p.length * (4.0 / 3.0 - p.pole_mass * cos_theta * cos_theta / total_mass));
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        DVector::from_vec(vec![x_dot, x_acc, theta_dot, theta_acc])
    }
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new(CartPoleParams::default())
    }
}

impl Dynamics for CartPole {
    fn state_dim(&self) -> usize {
        4
    }

    fn input_dim(&self) -> usize {
        1
    }

    fn state_transition(&self, state: &DVector<f64>, input: &DVector<f64>, t: f64) -> DVector<f64> {
        euler(state, t, self.params.dt, |_t, x| self.state_derivative(x, input[0]))
    }
}
