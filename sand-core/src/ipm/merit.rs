//! Exact l1 merit function and the adaptive penalty multiplier.
//!
//! The merit of a trial state is the compliance objective plus the penalty-
//! weighted l1 norms of the equality-constraint residual blocks. It is the
//! yardstick by which the watchdog judges step acceptability.

use super::DriverStats;
use crate::state::{BlockState, Segment};
use crate::system::{KktSystem, NewtonMatrix, SystemError};
use std::time::Instant;

/// Perturbation of the forward difference estimating the merit's
/// directional derivative.
pub const MERIT_PROBE_STEP: f64 = 1e-4;

/// Damping factor of the penalty estimate denominator.
const PENALTY_DAMPING: f64 = 0.05;

/// Exact l1 merit of `test_solution` at the given barrier parameter.
///
/// merit = objective + ρ · Σ ‖rhs block‖₁ over the equality-constraint
/// blocks, with the right-hand side from the system's residual-only
/// evaluation. Pure: repeated calls on the same state return identical
/// values.
pub fn exact_merit<S: KktSystem>(
    system: &mut S,
    test_solution: &BlockState,
    barrier_size: f64,
    penalty_multiplier: f64,
    stats: &mut DriverStats,
) -> Result<f64, SystemError> {
    let start = Instant::now();
    let objective = system.objective(test_solution)?;
    let residual = system.residual(test_solution, barrier_size)?;
    let constraint_merit: f64 = Segment::EQUALITY
        .iter()
        .map(|&seg| residual.block_l1_norm(seg))
        .sum();
    stats.merit += start.elapsed();
    stats.merit_evaluations += 1;
    Ok(objective + penalty_multiplier * constraint_merit)
}

/// Forward-difference estimate of the merit's directional derivative at
/// `state` along `step`.
pub fn merit_directional_derivative<S: KktSystem>(
    system: &mut S,
    state: &BlockState,
    step: &BlockState,
    barrier_size: f64,
    penalty_multiplier: f64,
    stats: &mut DriverStats,
) -> Result<f64, SystemError> {
    let mut probe = state.clone();
    probe.axpy(MERIT_PROBE_STEP, step);
    let ahead = exact_merit(system, &probe, barrier_size, penalty_multiplier, stats)?;
    let here = exact_merit(system, state, barrier_size, penalty_multiplier, stats)?;
    Ok((ahead - here) / MERIT_PROBE_STEP)
}

/// Update the merit penalty multiplier from the freshly assembled Newton
/// system and its unscaled step (Nocedal & Wright, eq. 18.36).
///
/// The trial value combines the step's curvature and gradient content over
/// the decision blocks against the ∞-norm of the constraint violations. The
/// multiplier only ever ratchets upward; a zero constraint norm means the
/// current state is exactly feasible and no update is needed. Returns whether
/// the multiplier changed.
pub fn update_penalty_multiplier<M: NewtonMatrix>(
    matrix: &M,
    rhs: &BlockState,
    step: &BlockState,
    penalty_multiplier: &mut f64,
) -> bool {
    let mut hess_part = 0.0;
    let mut grad_part = 0.0;
    let mut scratch = Vec::new();

    for &row in &Segment::DECISION {
        for &col in &Segment::DECISION {
            scratch.clear();
            scratch.resize(step.block(row).len(), 0.0);
            matrix.vmult_block(row, col, step.block(col), &mut scratch);
            hess_part += dot(step.block(row), &scratch);
        }
        grad_part -= dot(rhs.block(row), step.block(row));
    }

    let constraint_norm: f64 = Segment::EQUALITY
        .iter()
        .map(|&seg| rhs.block_linf_norm(seg))
        .sum();
    if constraint_norm == 0.0 {
        return false;
    }

    let trial = if hess_part > 0.0 {
        (grad_part + 0.5 * hess_part) / (PENALTY_DAMPING * constraint_norm)
    } else {
        grad_part / (PENALTY_DAMPING * constraint_norm)
    };

    if trial > *penalty_multiplier {
        *penalty_multiplier = trial;
        true
    } else {
        false
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Matrix with identity decision blocks.
    struct IdentityMatrix;

    impl NewtonMatrix for IdentityMatrix {
        fn vmult_block(&self, row: Segment, col: Segment, x: &[f64], y: &mut [f64]) {
            if row == col {
                y.copy_from_slice(x);
            } else {
                y.fill(0.0);
            }
        }
    }

    #[test]
    fn test_penalty_update_ratchets() {
        let mut rhs = BlockState::zeros(1, 1);
        rhs.block_mut(Segment::Density)[0] = -1.0;
        rhs.block_mut(Segment::DisplacementMultiplier)[0] = 2.0;

        let mut step = BlockState::zeros(1, 1);
        step.block_mut(Segment::Density)[0] = 1.0;

        // hess_part = 1, grad_part = -(-1 * 1) = 1, constraint_norm = 2
        // trial = (1 + 0.5) / (0.05 * 2) = 15
        let mut penalty = 1.0;
        assert!(update_penalty_multiplier(&IdentityMatrix, &rhs, &step, &mut penalty));
        assert!((penalty - 15.0).abs() < 1e-12);

        // A smaller trial must not lower the multiplier.
        let mut small_step = BlockState::zeros(1, 1);
        small_step.block_mut(Segment::Density)[0] = 1e-3;
        assert!(!update_penalty_multiplier(
            &IdentityMatrix,
            &rhs,
            &small_step,
            &mut penalty
        ));
        assert!((penalty - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_penalty_update_skips_when_feasible() {
        // All equality blocks zero: exactly feasible, no update.
        let rhs = BlockState::zeros(1, 1);
        let mut step = BlockState::zeros(1, 1);
        step.block_mut(Segment::Density)[0] = 1.0;

        let mut penalty = 3.0;
        assert!(!update_penalty_multiplier(&IdentityMatrix, &rhs, &step, &mut penalty));
        assert_eq!(penalty, 3.0);
    }

    #[test]
    fn test_penalty_update_negative_curvature_drops_hessian_term() {
        struct NegativeMatrix;
        impl NewtonMatrix for NegativeMatrix {
            fn vmult_block(&self, row: Segment, col: Segment, x: &[f64], y: &mut [f64]) {
                if row == col {
                    for (out, v) in y.iter_mut().zip(x) {
                        *out = -v;
                    }
                } else {
                    y.fill(0.0);
                }
            }
        }

        let mut rhs = BlockState::zeros(1, 1);
        rhs.block_mut(Segment::Density)[0] = -1.0;
        rhs.block_mut(Segment::DisplacementMultiplier)[0] = 2.0;
        let mut step = BlockState::zeros(1, 1);
        step.block_mut(Segment::Density)[0] = 1.0;

        // hess_part = -1 <= 0: trial = grad_part / (0.05 * 2) = 10
        let mut penalty = 1.0;
        assert!(update_penalty_multiplier(&NegativeMatrix, &rhs, &step, &mut penalty));
        assert!((penalty - 10.0).abs() < 1e-12);
    }
}
