//! Step computation and step-size selection.
//!
//! A full Newton step is cut back by the fraction-to-boundary rule so the
//! slack and slack-multiplier blocks stay strictly interior; a separate
//! backtracking line search produces merit-decreasing scaled steps for the
//! watchdog's fallback paths.

use super::merit::{exact_merit, merit_directional_derivative, update_penalty_multiplier};
use super::{diagnostics_enabled, DriverStats};
use crate::state::{BlockState, Segment};
use crate::system::{KktSystem, SystemError};
use std::time::Instant;

/// Lower clamp of the fraction-to-boundary factor.
const FRACTION_TO_BOUNDARY_MIN: f64 = 0.8;

/// Upper clamp of the fraction-to-boundary factor.
const FRACTION_TO_BOUNDARY_MAX: f64 = 0.99999;

/// Bisection iterations for the step-length search. 50 halvings of [0, 1]
/// exhaust double precision.
const BISECTION_ITERS: usize = 50;

/// Fraction-to-boundary factor τ = clamp(1 − μ, 0.8, 0.99999).
///
/// The boundary margin tracks the barrier parameter: early (large μ) passes
/// keep well clear of the boundary, late passes may approach it.
pub fn fraction_to_boundary(barrier_size: f64) -> f64 {
    (1.0 - barrier_size).clamp(FRACTION_TO_BOUNDARY_MIN, FRACTION_TO_BOUNDARY_MAX)
}

/// Largest primal and dual step lengths in [0, 1] keeping the guarded blocks
/// of τ·state + α·step non-negative.
///
/// The primal length guards the two slack blocks, the dual length the two
/// slack-multiplier blocks; the two searches are independent bisections.
/// Always returns a result: (0, 0) can only occur when τ·state itself
/// violates non-negativity, which means the caller handed in a state that was
/// not strictly interior.
pub fn max_feasible_step_sizes(
    state: &BlockState,
    step: &BlockState,
    barrier_size: f64,
) -> (f64, f64) {
    let tau = fraction_to_boundary(barrier_size);

    let mut step_size_s_low = 0.0;
    let mut step_size_s_high = 1.0;
    let mut step_size_z_low = 0.0;
    let mut step_size_z_high = 1.0;

    for _ in 0..BISECTION_ITERS {
        let step_size_s = 0.5 * (step_size_s_low + step_size_s_high);
        let step_size_z = 0.5 * (step_size_z_low + step_size_z_high);

        if keeps_non_negative(state, step, tau, step_size_s, &Segment::SLACKS) {
            step_size_s_low = step_size_s;
        } else {
            step_size_s_high = step_size_s;
        }

        if keeps_non_negative(state, step, tau, step_size_z, &Segment::SLACK_MULTIPLIERS) {
            step_size_z_low = step_size_z;
        } else {
            step_size_z_high = step_size_z;
        }
    }

    (step_size_s_low, step_size_z_low)
}

fn keeps_non_negative(
    state: &BlockState,
    step: &BlockState,
    tau: f64,
    alpha: f64,
    segments: &[Segment],
) -> bool {
    segments.iter().all(|&seg| {
        state
            .block(seg)
            .iter()
            .zip(step.block(seg))
            .all(|(&x, &d)| tau * x + alpha * d >= 0.0)
    })
}

/// Assemble and solve the Newton system at `state`, update the penalty
/// multiplier from the unscaled step, and return the step with its primal
/// blocks scaled by the primal step length and its multiplier blocks by the
/// dual step length.
pub fn find_max_step<S: KktSystem>(
    system: &mut S,
    state: &BlockState,
    barrier_size: f64,
    penalty_multiplier: &mut f64,
    stats: &mut DriverStats,
) -> Result<BlockState, SystemError> {
    let start = Instant::now();
    let (matrix, rhs) = system.assemble(state, barrier_size)?;
    stats.assembly += start.elapsed();

    let start = Instant::now();
    let step = system.solve(&matrix, &rhs)?;
    stats.linear_solve += start.elapsed();
    stats.newton_solves += 1;

    if update_penalty_multiplier(&matrix, &rhs, &step, penalty_multiplier)
        && diagnostics_enabled()
    {
        eprintln!("penalty multiplier updated to {:.6e}", penalty_multiplier);
    }

    let (step_size_s, step_size_z) = max_feasible_step_sizes(state, &step, barrier_size);

    let mut max_step = step;
    for &seg in &Segment::PRIMAL_STEP {
        max_step.scale_block(seg, step_size_s);
    }
    for &seg in &Segment::DUAL_STEP {
        max_step.scale_block(seg, step_size_z);
    }
    Ok(max_step)
}

/// Backtracking line search along `max_step` from `state`.
///
/// Starting at step size 1, halve until the merit satisfies the sufficient-
/// decrease test against a forward-difference directional derivative. If no
/// size passes within the halving budget, the last halved size is used
/// anyway: global progress is still bounded by the outer iteration cap, so
/// this is a soft failure rather than a fatal one.
pub fn take_scaled_step<S: KktSystem>(
    system: &mut S,
    state: &BlockState,
    max_step: &BlockState,
    barrier_size: f64,
    penalty_multiplier: f64,
    descent_requirement: f64,
    max_halvings: usize,
    stats: &mut DriverStats,
) -> Result<BlockState, SystemError> {
    let derivative = merit_directional_derivative(
        system,
        state,
        max_step,
        barrier_size,
        penalty_multiplier,
        stats,
    )?;
    let base_merit = exact_merit(system, state, barrier_size, penalty_multiplier, stats)?;

    let mut step_size = 1.0;
    for _ in 0..max_halvings {
        let mut trial = state.clone();
        trial.axpy(step_size, max_step);
        let trial_merit = exact_merit(system, &trial, barrier_size, penalty_multiplier, stats)?;
        if trial_merit < base_merit + step_size * descent_requirement * derivative {
            return Ok(trial);
        }
        step_size /= 2.0;
    }

    let mut fallback = state.clone();
    fallback.axpy(step_size, max_step);
    Ok(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_fraction_to_boundary_clamps() {
        assert_eq!(fraction_to_boundary(25.0), 0.8);
        assert_eq!(fraction_to_boundary(0.1), 0.9);
        assert!((fraction_to_boundary(0.0005) - 0.9995).abs() < 1e-12);
        assert_eq!(fraction_to_boundary(0.0), 0.99999);
        assert_eq!(fraction_to_boundary(-1.0), 0.99999);
    }

    #[test]
    fn test_step_sizes_full_step_when_unobstructed() {
        let mut state = BlockState::zeros(2, 1);
        for &seg in Segment::SLACKS.iter().chain(&Segment::SLACK_MULTIPLIERS) {
            state.block_mut(seg).fill(1.0);
        }
        // Positive step: no boundary in the way.
        let mut step = BlockState::zeros(2, 1);
        for &seg in Segment::SLACKS.iter().chain(&Segment::SLACK_MULTIPLIERS) {
            step.block_mut(seg).fill(0.5);
        }
        let (s, z) = max_feasible_step_sizes(&state, &step, 0.1);
        assert!(s > 1.0 - 1e-12 && s <= 1.0);
        assert!(z > 1.0 - 1e-12 && z <= 1.0);
    }

    #[test]
    fn test_step_sizes_respect_boundary() {
        // τ = 0.9 at μ = 0.1; slack 1.0, step -2.0: the boundary sits at
        // α = 0.9 / 2 = 0.45.
        let mut state = BlockState::zeros(1, 1);
        for &seg in Segment::SLACKS.iter().chain(&Segment::SLACK_MULTIPLIERS) {
            state.block_mut(seg).fill(1.0);
        }
        let mut step = BlockState::zeros(1, 1);
        step.block_mut(Segment::DensityLowerSlack)[0] = -2.0;
        let (s, z) = max_feasible_step_sizes(&state, &step, 0.1);
        assert!((s - 0.45).abs() < 1e-12);
        assert!(z > 1.0 - 1e-12);
    }

    #[test]
    fn test_step_sizes_randomized_bounds_hold() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let mut state = BlockState::zeros(4, 3);
            let mut step = BlockState::zeros(4, 3);
            for &seg in Segment::SLACKS.iter().chain(&Segment::SLACK_MULTIPLIERS) {
                for x in state.block_mut(seg) {
                    *x = rng.gen_range(0.01..2.0);
                }
                for d in step.block_mut(seg) {
                    *d = rng.gen_range(-2.0..2.0);
                }
            }
            let barrier_size = rng.gen_range(1e-4..30.0);
            let tau = fraction_to_boundary(barrier_size);
            let (s, z) = max_feasible_step_sizes(&state, &step, barrier_size);

            assert!((0.0..=1.0).contains(&s));
            assert!((0.0..=1.0).contains(&z));
            assert!(keeps_non_negative(&state, &step, tau, s, &Segment::SLACKS));
            assert!(keeps_non_negative(
                &state,
                &step,
                tau,
                z,
                &Segment::SLACK_MULTIPLIERS
            ));
        }
    }

    #[test]
    fn test_zero_step_against_interior_state_is_full_length() {
        let mut state = BlockState::zeros(3, 1);
        for &seg in Segment::SLACKS.iter().chain(&Segment::SLACK_MULTIPLIERS) {
            state.block_mut(seg).fill(0.25);
        }
        let step = BlockState::zeros(3, 1);
        let (s, z) = max_feasible_step_sizes(&state, &step, 1.0);
        assert!(s > 1.0 - 1e-12);
        assert!(z > 1.0 - 1e-12);
    }
}
