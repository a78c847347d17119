//! Quadrotor dynamics
//!
//! Rigid-body quadrotor in Euler-angle form with body-frame velocities
//! (z-down convention, thrust along body −z):
//!
//! [φ̇ θ̇ ψ̇]ᵀ = W(φ, θ)·ω
//! Jω̇       = −ω × Jω + τ
//! v̇        = v × ω + R(φ, θ, ψ)ᵀ·g·e₃ − T/m·e₃
//! ṗ        = R(φ, θ, ψ)·v
//!
//! where:
//! - φ, θ, ψ: roll, pitch, yaw
//! - ω: body angular velocity
//! - v: body velocity
//! - p: position (world frame)
//! - T: collective thrust, τ: body moments
//!
//! State layout `[φ, θ, ψ, ωx, ωy, ωz, vx, vy, vz, x, y, z]`,
//! input layout `[T, τx, τy, τz]`. Integrated with one RK4 step per
//! state transition.

use nalgebra::{DVector, Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use super::Dynamics;
use crate::math::rk4;
use crate::GRAVITY;

/// Quadrotor parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuadrotorParams {
    /// Integration step [s]
    pub dt: f64,
    /// Mass [kg]
    pub mass: f64,
    /// Principal moments of inertia [kg·m²] (body frame)
    pub inertia: Vector3<f64>,
    /// Gravitational acceleration [m/s²]
    pub gravity: f64,
}

impl QuadrotorParams {
    /// Create parameters with diagonal inertia
    pub fn new(dt: f64, mass: f64, inertia_diag: Vector3<f64>) -> Self {
        Self {
            dt,
            mass,
            inertia: inertia_diag,
            gravity: GRAVITY,
        }
    }

    /// Full inertia tensor
    pub fn inertia_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_diagonal(&self.inertia)
    }

    /// Hover thrust for this quadrotor
    pub fn hover_thrust(&self) -> f64 {
        self.mass * self.gravity
    }
}

impl Default for QuadrotorParams {
    fn default() -> Self {
        Self::new(
            0.001,
            1.0,
            Vector3::new(0.01466, 0.01466, 0.02848),
        )
    }
}

/// Quadrotor dynamics model
#[derive(Debug, Clone)]
pub struct Quadrotor {
    pub params: QuadrotorParams,
}

impl Quadrotor {
    pub const ROLL: usize = 0;
    pub const PITCH: usize = 1;
    pub const YAW: usize = 2;
    pub const ANGULAR_VELOCITY: usize = 3;
    pub const VELOCITY: usize = 6;
    pub const X: usize = 9;
    pub const Y: usize = 10;
    pub const Z: usize = 11;

    pub const THRUST: usize = 0;
    pub const MOMENT: usize = 1;

    pub fn new(params: QuadrotorParams) -> Self {
        Self { params }
    }

    /// Input holding the vehicle level and stationary
    pub fn hover_input(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.params.hover_thrust(), 0.0, 0.0, 0.0])
    }

    /// Rotation from body to world for the attitude part of `state`
    pub fn rotation(state: &DVector<f64>) -> Rotation3<f64> {
        Rotation3::from_euler_angles(state[Self::ROLL], state[Self::PITCH], state[Self::YAW])
    }

    /// Continuous-time state derivative
    pub fn state_derivative(&self, state: &DVector<f64>, input: &DVector<f64>) -> DVector<f64> {
        let p = &self.params;
        let (roll, pitch) = (state[Self::ROLL], state[Self::PITCH]);
        let omega = state.fixed_rows::<3>(Self::ANGULAR_VELOCITY).into_owned();
        let velocity = state.fixed_rows::<3>(Self::VELOCITY).into_owned();
        let thrust = input[Self::THRUST];
        let moment = input.fixed_rows::<3>(Self::MOMENT).into_owned();

        let (s_ph, c_ph) = roll.sin_cos();
        let c_th = pitch.cos();
        let t_th = pitch.tan();

        // Euler-angle kinematics
        let roll_dot = omega.x + omega.z * (c_ph * t_th) + omega.y * (s_ph * t_th);
        let pitch_dot = omega.y * c_ph - omega.z * s_ph;
        let yaw_dot = omega.z * (c_ph / c_th) + omega.y * (s_ph / c_th);

        // ω̇ = J⁻¹(−ω × Jω + τ)
        let j = p.inertia;
        let omega_dot = (-omega.cross(&j.component_mul(&omega)) + moment).component_div(&j);

        // Body-frame translational dynamics
        let rotation = Self::rotation(state);
        let gravity_body = rotation.inverse() * Vector3::new(0.0, 0.0, p.gravity);
        let velocity_dot =
            velocity.cross(&omega) + gravity_body - Vector3::new(0.0, 0.0, thrust / p.mass);

        let position_dot = rotation * velocity;

        let mut deriv = DVector::zeros(12);
        deriv[Self::ROLL] = roll_dot;
        deriv[Self::PITCH] = pitch_dot;
        deriv[Self::YAW] = yaw_dot;
        deriv.fixed_rows_mut::<3>(Self::ANGULAR_VELOCITY).copy_from(&omega_dot);
        deriv.fixed_rows_mut::<3>(Self::VELOCITY).copy_from(&velocity_dot);
        deriv.fixed_rows_mut::<3>(Self::X).copy_from(&position_dot);
        deriv
    }
}

impl Default for Quadrotor {
    fn default() -> Self {
        Self::new(QuadrotorParams::default())
    }
}

impl Dynamics for Quadrotor {
    fn state_dim(&self) -> usize {
        12
    }

    fn input_dim(&self) -> usize {
        4
    }

    fn state_transition(&self, state: &DVector<f64>, input: &DVector<f64>, t: f64) -> DVector<f64> {
        rk4(state, t, self.params.dt, |_t, x| self.state_derivative(x, input))
    }
}
