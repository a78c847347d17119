//! Quadratic stage cost
//!
//! c_t(τ_t) = ½ τ_tᵀ Q_t τ_t + p_tᵀ τ_t,   τ_t = [x_t; u_t]
//!
//! One `(Q_t, p_t)` pair per timestep and per batch element. A cost
//! holding a single batch element is broadcast over any batch size.

use nalgebra::{DMatrix, DVector};

use crate::lqr::LqrError;

/// Concatenate state and input into τ = [x; u]
pub fn tau(state: &DVector<f64>, input: &DVector<f64>) -> DVector<f64> {
    let n = state.len();
    let mut tau = DVector::zeros(n + input.len());
    tau.rows_mut(0, n).copy_from(state);
    tau.rows_mut(n, input.len()).copy_from(input);
    tau
}

/// Time-varying quadratic cost over a horizon, for a batch of problems
#[derive(Debug, Clone, PartialEq)]
pub struct QuadCost {
    /// Q[b][t], symmetric (n_state + n_ctrl)²
    q: Vec<Vec<DMatrix<f64>>>,
    /// p[b][t], length n_state + n_ctrl
    p: Vec<Vec<DVector<f64>>>,
}

impl QuadCost {
    /// Build from per-batch, per-timestep weights.
    ///
    /// Every `Q_t` is replaced by its symmetric part, which leaves the
    /// quadratic form unchanged.
    pub fn new(q: Vec<Vec<DMatrix<f64>>>, p: Vec<Vec<DVector<f64>>>) -> Result<Self, LqrError> {
        if q.is_empty() {
            return Err(LqrError::EmptyBatch);
        }
        if p.len() != q.len() {
            return Err(LqrError::BatchMismatch {
                what: "p",
                expected: q.len(),
                got: p.len(),
            });
        }

        let horizon = q[0].len();
        if horizon == 0 {
            return Err(LqrError::ZeroHorizon);
        }
        let dim = q[0][0].nrows();

        for (q_b, p_b) in q.iter().zip(&p) {
            for (what, len) in [("Q", q_b.len()), ("p", p_b.len())] {
                if len != horizon {
                    return Err(LqrError::HorizonMismatch {
                        what,
                        expected: horizon,
                        got: len,
                    });
                }
            }
            for q_t in q_b {
                if q_t.nrows() != q_t.ncols() {
                    return Err(LqrError::NonSquareCost {
                        rows: q_t.nrows(),
                        cols: q_t.ncols(),
                    });
                }
                if q_t.nrows() != dim {
                    return Err(LqrError::CostDimension {
                        expected: dim,
                        got: q_t.nrows(),
                    });
                }
            }
            if let Some(p_t) = p_b.iter().find(|p_t| p_t.len() != dim) {
                return Err(LqrError::CostDimension {
                    expected: dim,
                    got: p_t.len(),
                });
            }
        }

        let q = q
            .into_iter()
            .map(|q_b| q_b.into_iter().map(|q_t| (&q_t + q_t.transpose()) * 0.5).collect())
            .collect();

        Ok(Self { q, p })
    }

    /// Same weights at every timestep of every batch element
    pub fn tiled(
        q: DMatrix<f64>,
        p: DVector<f64>,
        batch: usize,
        horizon: usize,
    ) -> Result<Self, LqrError> {
        Self::new(vec![vec![q; horizon]; batch], vec![vec![p; horizon]; batch])
    }

    /// Per-timestep weights shared by every batch element
    pub fn broadcast(
        q: Vec<DMatrix<f64>>,
        p: Vec<DVector<f64>>,
        batch: usize,
    ) -> Result<Self, LqrError> {
        Self::new(vec![q; batch], vec![p; batch])
    }

    pub fn batch_size(&self) -> usize {
        self.q.len()
    }

    pub fn horizon(&self) -> usize {
        self.q[0].len()
    }

    /// Length of τ, i.e. n_state + n_ctrl
    pub fn tau_dim(&self) -> usize {
        self.q[0][0].nrows()
    }

    /// Whether a single set of weights serves every batch element
    pub fn is_broadcast(&self) -> bool {
        self.q.len() == 1
    }

    fn row(&self, batch: usize) -> usize {
        if self.is_broadcast() {
            0
        } else {
            batch
        }
    }

    pub fn q(&self, batch: usize, t: usize) -> &DMatrix<f64> {
        &self.q[self.row(batch)][t]
    }

    pub fn p(&self, batch: usize, t: usize) -> &DVector<f64> {
        &self.p[self.row(batch)][t]
    }

    /// ½ τᵀQ_tτ + p_tᵀτ
    pub fn stage_cost(&self, batch: usize, t: usize, tau: &DVector<f64>) -> f64 {
        0.5 * tau.dot(&(self.q(batch, t) * tau)) + self.p(batch, t).dot(tau)
    }

    /// ∂c_t/∂τ = Q_tτ + p_t
    pub fn gradient(&self, batch: usize, t: usize, tau: &DVector<f64>) -> DVector<f64> {
        self.q(batch, t) * tau + self.p(batch, t)
    }

    /// Total cost of a state/input sequence (terminal state excluded)
    pub fn evaluate(&self, batch: usize, states: &[DVector<f64>], inputs: &[DVector<f64>]) -> f64 {
        states
            .iter()
            .zip(inputs)
            .enumerate()
            .map(|(t, (x, u))| self.stage_cost(batch, t, &tau(x, u)))
            .sum()
    }

    /// Apply `f` to every Q_t, e.g. to scale a single diagonal weight
    pub fn map_q<F>(mut self, mut f: F) -> Result<Self, LqrError>
    where
        F: FnMut(usize, &mut DMatrix<f64>),
    {
        for q_b in &mut self.q {
            for (t, q_t) in q_b.iter_mut().enumerate() {
                f(t, q_t);
            }
        }
        Self::new(self.q, self.p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tau_layout() {
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let u = DVector::from_vec(vec![3.0]);
        assert_eq!(tau(&x, &u), DVector::from_vec(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_stage_cost_and_gradient() {
        let q = DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 4.0]));
        let p = DVector::from_vec(vec![1.0, -1.0]);
        let cost = QuadCost::tiled(q, p, 1, 3).unwrap();
        let tau = DVector::from_vec(vec![1.0, 2.0]);

        // ½(2·1 + 4·4) + (1 − 2)
        assert_relative_eq!(cost.stage_cost(0, 0, &tau), 8.0, epsilon = 1e-12);
        assert_eq!(cost.gradient(0, 2, &tau), DVector::from_vec(vec![3.0, 7.0]));
    }

    #[test]
    fn test_asymmetric_q_is_symmetrized() {
        let q = DMatrix::from_row_slice(2, 2, &[1.0, 4.0, 0.0, 1.0]);
        let cost = QuadCost::tiled(q.clone(), DVector::zeros(2), 1, 1).unwrap();
        let tau = DVector::from_vec(vec![0.3, -0.7]);

        assert_eq!(cost.q(0, 0), &DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]));
        assert_relative_eq!(
            cost.stage_cost(0, 0, &tau),
            0.5 * tau.dot(&(&q * &tau)),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_broadcast_single_batch() {
        let cost = QuadCost::tiled(DMatrix::identity(3, 3), DVector::zeros(3), 1, 2).unwrap();
        assert!(cost.is_broadcast());
        assert_eq!(cost.q(5, 1), &DMatrix::identity(3, 3));
    }

    #[test]
    fn test_broadcast_per_step_weights() {
        let q = vec![DMatrix::identity(2, 2), DMatrix::identity(2, 2) * 3.0];
        let p = vec![DVector::zeros(2), DVector::zeros(2)];
        let cost = QuadCost::broadcast(q, p, 4).unwrap();

        assert_eq!(cost.batch_size(), 4);
        assert_eq!(cost.horizon(), 2);
        assert_eq!(cost.q(3, 1)[(0, 0)], 3.0);
    }

    #[test]
    fn test_rejects_mismatched_p() {
        let err = QuadCost::tiled(DMatrix::identity(3, 3), DVector::zeros(2), 1, 2).unwrap_err();
        assert_eq!(err, LqrError::CostDimension { expected: 3, got: 2 });
    }

    #[test]
    fn test_rejects_non_square_q() {
        let err = QuadCost::tiled(DMatrix::zeros(3, 2), DVector::zeros(3), 1, 2).unwrap_err();
        assert_eq!(err, LqrError::NonSquareCost { rows: 3, cols: 2 });
    }

    #[test]
    fn test_rejects_ragged_horizon() {
        let q = vec![
            vec![DMatrix::identity(2, 2); 3],
            vec![DMatrix::identity(2, 2); 2],
        ];
        let p = vec![vec![DVector::zeros(2); 3], vec![DVector::zeros(2); 2]];

        let err = QuadCost::new(q, p).unwrap_err();
        assert_eq!(
            err,
            LqrError::HorizonMismatch {
                what: "Q",
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(QuadCost::new(vec![], vec![]).unwrap_err(), LqrError::EmptyBatch);
        assert_eq!(
            QuadCost::tiled(DMatrix::identity(2, 2), DVector::zeros(2), 1, 0).unwrap_err(),
            LqrError::ZeroHorizon
        );
    }

    #[test]
    fn test_map_q_sets_weight() {
        let cost = QuadCost::tiled(DMatrix::identity(3, 3), DVector::zeros(3), 2, 4)
            .unwrap()
            .map_q(|_, q| q[(2, 2)] = 1e10)
            .unwrap();

        assert_eq!(cost.q(1, 3)[(2, 2)], 1e10);
        assert_eq!(cost.q(0, 0)[(1, 1)], 1.0);
    }

    #[test]
    fn test_evaluate_sums_stages() {
        let cost = QuadCost::tiled(DMatrix::identity(2, 2), DVector::zeros(2), 1, 2).unwrap();
        let states = vec![DVector::from_vec(vec![1.0]), DVector::from_vec(vec![2.0])];
        let inputs = vec![DVector::from_vec(vec![0.0]), DVector::from_vec(vec![1.0])];

        assert_relative_eq!(cost.evaluate(0, &states, &inputs), 0.5 + 2.5, epsilon = 1e-12);
    }
}
