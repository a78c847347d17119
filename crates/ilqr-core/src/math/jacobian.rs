//! Finite-difference Jacobians
//!
//! Default linearization for models that do not provide analytic
//! derivatives.

use nalgebra::{DMatrix, DVector};

/// Approximate the Jacobian of `f: Rⁿ → Rᵐ` at `x` using central differences.
///
/// Uses step size `h_j = ε^(1/3) · max(|x_j|, 1)` per component, which
/// balances truncation and round-off error for a second-order scheme.
/// Requires `2n + 1` evaluations of `f`.
///
/// ```
/// use ilqr_core::math::finite_difference_jacobian;
/// use nalgebra::DVector;
///
/// // f(x) = [x0², x0·x1], J = [[2·x0, 0], [x1, x0]]
/// let x = DVector::from_vec(vec![3.0, 4.0]);
/// let j = finite_difference_jacobian(
///     |x: &DVector<f64>| DVector::from_vec(vec![x[0] * x[0], x[0] * x[1]]),
///     &x,
/// );
/// assert!((j[(0, 0)] - 6.0).abs() < 1e-6);
/// assert!((j[(1, 0)] - 4.0).abs() < 1e-6);
/// assert!((j[(1, 1)] - 3.0).abs() < 1e-6);
/// ```
pub fn finite_difference_jacobian<F>(mut f: F, x: &DVector<f64>) -> DMatrix<f64>
where
    F: FnMut(&DVector<f64>) -> DVector<f64>,
{
    let step = f64::EPSILON.cbrt();
    let rows = f(x).len();
    let mut jac = DMatrix::zeros(rows, x.len());

    let mut x_pert = x.clone();
    for j in 0..x.len() {
        let h = step * x[j].abs().max(1.0);

        x_pert[j] = x[j] + h;
        let f_plus = f(&x_pert);
        x_pert[j] = x[j] - h;
        let f_minus = f(&x_pert);
        x_pert[j] = x[j];

        jac.set_column(j, &((f_plus - f_minus) / (2.0 * h)));
    }

    jac
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_map_is_exact() {
        let a = DMatrix::from_row_slice(2, 3, &[1.0, -2.0, 0.5, 3.0, 0.0, -1.0]);
        let x = DVector::from_vec(vec![0.3, -1.2, 7.0]);

        let j = finite_difference_jacobian(|x| &a * x, &x);

        assert_relative_eq!(j, a, epsilon = 1e-8);
    }

    #[test]
    fn test_trigonometric() {
        let x = DVector::from_vec(vec![0.7, 1.3]);
        let j = finite_difference_jacobian(
            |x| DVector::from_vec(vec![x[0].sin() * x[1], x[1].cos()]),
            &x,
        );

        assert_relative_eq!(j[(0, 0)], 0.7_f64.cos() * 1.3, epsilon = 1e-8);
        assert_relative_eq!(j[(0, 1)], 0.7_f64.sin(), epsilon = 1e-8);
        assert_relative_eq!(j[(1, 0)], 0.0, epsilon = 1e-8);
        assert_relative_eq!(j[(1, 1)], -1.3_f64.sin(), epsilon = 1e-8);
    }

    #[test]
    fn test_output_dimension_differs_from_input() {
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let j = finite_difference_jacobian(
            |x| DVector::from_vec(vec![x[0] + x[1], x[0] - x[1], 2.0 * x[0]]),
            &x,
        );

        assert_eq!(j.shape(), (3, 2));
        assert_relative_eq!(j[(2, 0)], 2.0, epsilon = 1e-8);
    }
}
