//! Dense reference discretization: a chain of grounded springs.
//!
//! Each of `n` masses hangs on its own spring whose stiffness interpolates
//! linearly between a void and a solid value in the filtered density,
//!
//!   k_i(ρ) = k_min + (k_max − k_min) ρ_i,
//!
//! and carries an external load f_i. The design variables are the unfiltered
//! densities σ, smoothed into ρ by a row-stochastic neighbor filter H and
//! boxed into [0, 1] through slack variables. The objective is the load's
//! work f·u, so the optimizer stiffens the chain as far as the bounds allow.
//!
//! The model is deliberately small and dense: it exercises every block of
//! the state and every path of the driver, with an exact Newton matrix that
//! fits in a `DMatrix`. Real applications implement [`KktSystem`] on top of
//! their own assembly instead.
//!
//! First-order conditions of the barrier subproblem, in block order:
//!
//!   ρ:   (k_max − k_min) u∘λ_u + λ_σ = 0
//!   u:   f + K(ρ) λ_u = 0
//!   σ:   −Hᵀ λ_σ − z_l + z_u = 0
//!   λ_u: K(ρ) u − f = 0
//!   λ_σ: ρ − H σ = 0
//!   s_l: z_l − μ/s_l = 0
//!   z_l: s_l − σ = 0
//!   s_u: z_u − μ/s_u = 0
//!   z_u: σ + s_u − 1 = 0
//!
//! The assembler returns the negated left-hand sides as the Newton
//! right-hand side and their exact Jacobian as the matrix.

use crate::linalg::sparse::{self, SparseCsc};
use crate::state::{BlockState, Segment};
use crate::system::{KktSystem, NewtonMatrix, SystemError};
use nalgebra::{DMatrix, DVector};

/// Grounded-spring chain model.
#[derive(Debug, Clone)]
pub struct SpringChain {
    n: usize,
    stiffness_min: f64,
    stiffness_max: f64,
    load: Vec<f64>,
    volume_fraction: f64,
    filter: SparseCsc,
}

impl SpringChain {
    /// Chain of `n` springs under a unit load each, starting from the given
    /// volume fraction.
    pub fn new(n: usize, volume_fraction: f64) -> Self {
        Self::with_load(n, volume_fraction, vec![1.0; n])
    }

    /// Chain with an explicit load vector.
    pub fn with_load(n: usize, volume_fraction: f64, load: Vec<f64>) -> Self {
        assert!(n > 0);
        assert_eq!(load.len(), n);
        Self {
            n,
            stiffness_min: 0.2,
            stiffness_max: 1.0,
            load,
            volume_fraction,
            filter: neighbor_filter(n),
        }
    }

    /// Number of springs.
    pub fn len(&self) -> usize {
        self.n
    }

    /// True iff the chain is empty. Never the case for a constructed chain.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// The density filter matrix.
    pub fn filter(&self) -> &SparseCsc {
        &self.filter
    }

    fn stiffness(&self, density: &[f64]) -> Vec<f64> {
        density
            .iter()
            .map(|&rho| self.stiffness_min + (self.stiffness_max - self.stiffness_min) * rho)
            .collect()
    }

    fn block_offset(&self, seg: Segment) -> usize {
        seg.index() * self.n
    }

    fn flatten(&self, state: &BlockState) -> DVector<f64> {
        let mut out = DVector::zeros(9 * self.n);
        for seg in Segment::ALL {
            let offset = self.block_offset(seg);
            for (i, &v) in state.block(seg).iter().enumerate() {
                out[offset + i] = v;
            }
        }
        out
    }

    fn unflatten(&self, vector: &DVector<f64>) -> BlockState {
        let mut out = BlockState::zeros(self.n, self.n);
        for seg in Segment::ALL {
            let offset = self.block_offset(seg);
            for (i, v) in out.block_mut(seg).iter_mut().enumerate() {
                *v = vector[offset + i];
            }
        }
        out
    }

    fn rhs_at(&self, state: &BlockState, barrier_size: f64) -> BlockState {
        let n = self.n;
        let jump = self.stiffness_max - self.stiffness_min;

        let density = state.block(Segment::Density);
        let displacement = state.block(Segment::Displacement);
        let unfiltered = state.block(Segment::UnfilteredDensity);
        let lambda_u = state.block(Segment::DisplacementMultiplier);
        let lambda_sigma = state.block(Segment::UnfilteredDensityMultiplier);
        let lower_slack = state.block(Segment::DensityLowerSlack);
        let lower_mult = state.block(Segment::DensityLowerSlackMultiplier);
        let upper_slack = state.block(Segment::DensityUpperSlack);
        let upper_mult = state.block(Segment::DensityUpperSlackMultiplier);

        let stiffness = self.stiffness(density);

        let mut filtered_sigma = vec![0.0; n];
        sparse::mul_vec(&self.filter, unfiltered, &mut filtered_sigma);
        let mut filter_t_lambda = vec![0.0; n];
        sparse::mul_transpose_vec(&self.filter, lambda_sigma, &mut filter_t_lambda);

        let mut rhs = BlockState::zeros(n, n);
        for i in 0..n {
            rhs.block_mut(Segment::Density)[i] =
                -(jump * displacement[i] * lambda_u[i] + lambda_sigma[i]);
            rhs.block_mut(Segment::Displacement)[i] =
                -(self.load[i] + stiffness[i] * lambda_u[i]);
            rhs.block_mut(Segment::UnfilteredDensity)[i] =
                filter_t_lambda[i] + lower_mult[i] - upper_mult[i];
            rhs.block_mut(Segment::DisplacementMultiplier)[i] =
                self.load[i] - stiffness[i] * displacement[i];
            rhs.block_mut(Segment::UnfilteredDensityMultiplier)[i] =
                filtered_sigma[i] - density[i];
            rhs.block_mut(Segment::DensityLowerSlack)[i] =
                barrier_size / lower_slack[i] - lower_mult[i];
            rhs.block_mut(Segment::DensityLowerSlackMultiplier)[i] =
                unfiltered[i] - lower_slack[i];
            rhs.block_mut(Segment::DensityUpperSlack)[i] =
                barrier_size / upper_slack[i] - upper_mult[i];
            rhs.block_mut(Segment::DensityUpperSlackMultiplier)[i] =
                1.0 - unfiltered[i] - upper_slack[i];
        }
        rhs
    }
}

/// Exact Newton matrix of the spring chain, stored dense.
#[derive(Debug, Clone)]
pub struct SpringChainMatrix {
    jacobian: DMatrix<f64>,
    block_len: usize,
}

impl NewtonMatrix for SpringChainMatrix {
    fn vmult_block(&self, row: Segment, col: Segment, x: &[f64], y: &mut [f64]) {
        let row_offset = row.index() * self.block_len;
        let col_offset = col.index() * self.block_len;
        for i in 0..self.block_len {
            let mut acc = 0.0;
            for (j, &xj) in x.iter().enumerate() {
                acc += self.jacobian[(row_offset + i, col_offset + j)] * xj;
            }
            y[i] = acc;
        }
    }
}

impl KktSystem for SpringChain {
    type Matrix = SpringChainMatrix;

    fn initial_state(&self) -> BlockState {
        let r = self.volume_fraction;
        let mut state = BlockState::zeros(self.n, self.n);
        state.block_mut(Segment::Density).fill(r);
        state.block_mut(Segment::UnfilteredDensity).fill(r);
        state.block_mut(Segment::UnfilteredDensityMultiplier).fill(r);
        state.block_mut(Segment::DensityLowerSlack).fill(r);
        state.block_mut(Segment::DensityLowerSlackMultiplier).fill(50.0);
        state.block_mut(Segment::DensityUpperSlack).fill(1.0 - r);
        state.block_mut(Segment::DensityUpperSlackMultiplier).fill(50.0);
        state
    }

    fn assemble(
        &mut self,
        state: &BlockState,
        barrier_size: f64,
    ) -> Result<(SpringChainMatrix, BlockState), SystemError> {
        let n = self.n;
        let jump = self.stiffness_max - self.stiffness_min;

        let density = state.block(Segment::Density);
        let displacement = state.block(Segment::Displacement);
        let lambda_u = state.block(Segment::DisplacementMultiplier);
        let lower_slack = state.block(Segment::DensityLowerSlack);
        let upper_slack = state.block(Segment::DensityUpperSlack);
        let stiffness = self.stiffness(density);

        let off = |seg: Segment| self.block_offset(seg);
        let mut jac = DMatrix::zeros(9 * n, 9 * n);

        for i in 0..n {
            // Stationarity in ρ.
            jac[(off(Segment::Density) + i, off(Segment::Displacement) + i)] = jump * lambda_u[i];
            jac[(off(Segment::Density) + i, off(Segment::DisplacementMultiplier) + i)] =
                jump * displacement[i];
            jac[(off(Segment::Density) + i, off(Segment::UnfilteredDensityMultiplier) + i)] = 1.0;

            // Stationarity in u.
            jac[(off(Segment::Displacement) + i, off(Segment::Density) + i)] = jump * lambda_u[i];
            jac[(off(Segment::Displacement) + i, off(Segment::DisplacementMultiplier) + i)] =
                stiffness[i];

            // Stationarity in σ (filter part added below).
            jac[(off(Segment::UnfilteredDensity) + i, off(Segment::DensityLowerSlackMultiplier) + i)] =
                -1.0;
            jac[(off(Segment::UnfilteredDensity) + i, off(Segment::DensityUpperSlackMultiplier) + i)] =
                1.0;

            // Elasticity constraint.
            jac[(off(Segment::DisplacementMultiplier) + i, off(Segment::Density) + i)] =
                jump * displacement[i];
            jac[(off(Segment::DisplacementMultiplier) + i, off(Segment::Displacement) + i)] =
                stiffness[i];

            // Filter constraint (filter part added below).
            jac[(off(Segment::UnfilteredDensityMultiplier) + i, off(Segment::Density) + i)] = 1.0;

            // Lower-bound complementarity and constraint.
            jac[(off(Segment::DensityLowerSlack) + i, off(Segment::DensityLowerSlack) + i)] =
                barrier_size / (lower_slack[i] * lower_slack[i]);
            jac[(off(Segment::DensityLowerSlack) + i, off(Segment::DensityLowerSlackMultiplier) + i)] =
                1.0;
            jac[(off(Segment::DensityLowerSlackMultiplier) + i, off(Segment::UnfilteredDensity) + i)] =
                -1.0;
            jac[(off(Segment::DensityLowerSlackMultiplier) + i, off(Segment::DensityLowerSlack) + i)] =
                1.0;

            // Upper-bound complementarity and constraint.
            jac[(off(Segment::DensityUpperSlack) + i, off(Segment::DensityUpperSlack) + i)] =
                barrier_size / (upper_slack[i] * upper_slack[i]);
            jac[(off(Segment::DensityUpperSlack) + i, off(Segment::DensityUpperSlackMultiplier) + i)] =
                1.0;
            jac[(off(Segment::DensityUpperSlackMultiplier) + i, off(Segment::UnfilteredDensity) + i)] =
                1.0;
            jac[(off(Segment::DensityUpperSlackMultiplier) + i, off(Segment::DensityUpperSlack) + i)] =
                1.0;
        }

        // Filter couplings: −Hᵀ into the σ stationarity, −H into the filter
        // constraint.
        for (col, col_view) in self.filter.outer_iterator().enumerate() {
            for (row, &val) in col_view.iter() {
                jac[(off(Segment::UnfilteredDensity) + col, off(Segment::UnfilteredDensityMultiplier) + row)] =
                    -val;
                jac[(off(Segment::UnfilteredDensityMultiplier) + row, off(Segment::UnfilteredDensity) + col)] =
                    -val;
            }
        }

        let rhs = self.rhs_at(state, barrier_size);
        Ok((
            SpringChainMatrix {
                jacobian: jac,
                block_len: n,
            },
            rhs,
        ))
    }

    fn residual(
        &mut self,
        state: &BlockState,
        barrier_size: f64,
    ) -> Result<BlockState, SystemError> {
        Ok(self.rhs_at(state, barrier_size))
    }

    fn solve(
        &mut self,
        matrix: &SpringChainMatrix,
        rhs: &BlockState,
    ) -> Result<BlockState, SystemError> {
        let b = self.flatten(rhs);
        let solution = matrix
            .jacobian
            .clone()
            .lu()
            .solve(&b)
            .ok_or_else(|| SystemError::SingularSystem("spring chain Newton matrix".to_string()))?;
        Ok(self.unflatten(&solution))
    }

    fn objective(&mut self, state: &BlockState) -> Result<f64, SystemError> {
        let displacement = state.block(Segment::Displacement);
        Ok(self
            .load
            .iter()
            .zip(displacement.iter())
            .map(|(f, u)| f * u)
            .sum())
    }
}

/// Row-stochastic neighbor-averaging filter with hat weights over the
/// 1-neighborhood.
fn neighbor_filter(n: usize) -> SparseCsc {
    let mut triplets = Vec::new();
    for i in 0..n {
        let lo = i.saturating_sub(1);
        let hi = (i + 1).min(n - 1);
        let weights: Vec<(usize, f64)> = (lo..=hi)
            .map(|j| (j, 1.5 - i.abs_diff(j) as f64))
            .collect();
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        for (j, w) in weights {
            triplets.push((i, j, w / total));
        }
    }
    sparse::from_triplets(n, n, triplets)
}
