//! Numerical integration methods
//!
//! Fixed-step schemes that turn a continuous-time vector field into the
//! discrete state transition consumed by the solver.

use nalgebra::DVector;

/// Classic 4th-order Runge-Kutta step
///
/// Solves dx/dt = f(t, x) over a single step of length `dt`.
///
/// # Arguments
/// * `x` - Current state
/// * `t` - Current time
/// * `dt` - Time step
/// * `f` - Derivative function f(t, x) -> dx/dt
///
/// # Returns
/// New state after integration
pub fn rk4<F>(x: &DVector<f64>, t: f64, dt: f64, f: F) -> DVector<f64>
where
    F: Fn(f64, &DVector<f64>) -> DVector<f64>,
{
    let k1 = f(t, x);
    let k2 = f(t + dt / 2.0, &(x + &k1 * (dt / 2.0)));
    let k3 = f(t + dt / 2.0, &(x + &k2 * (dt / 2.0)));
    let k4 = f(t + dt, &(x + &k3 * dt));

    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

/// Explicit Euler step (first-order)
///
/// Less accurate than RK4 but matches models that are defined directly
/// as `x + dt * f(x)`.
pub fn euler<F>(x: &DVector<f64>, t: f64, dt: f64, f: F) -> DVector<f64>
where
    F: Fn(f64, &DVector<f64>) -> DVector<f64>,
{
    x + f(t, x) * dt
}
