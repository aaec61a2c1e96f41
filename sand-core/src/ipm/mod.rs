//! Interior-point optimization driver.
//!
//! Barrier continuation wrapped around a watchdog-globalized Newton
//! iteration. Each outer pass solves the current barrier subproblem to the
//! KKT tolerance through repeated watchdog cycles, then shrinks the barrier
//! parameter by the more aggressive of a linear and a superlinear schedule
//! until it reaches its floor and the final subproblem converges.

pub mod merit;
pub mod step;
pub mod termination;
pub mod watchdog;

use crate::problem::{OptimizeResult, SolveInfo, SolveStatus, SolverError, SolverSettings};
use crate::state::Segment;
use crate::system::KktSystem;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use termination::check_convergence;
use watchdog::watchdog_cycle;

pub use termination::Convergence;

/// Low-level diagnostics gate: set SAND_VERBOSE to 2 or higher.
pub(crate) fn diagnostics_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var("SAND_VERBOSE")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .map(|n| n >= 2)
            .unwrap_or(false)
    })
}

/// Phase timings and work counters accumulated over a run.
#[derive(Debug, Default)]
pub struct DriverStats {
    /// Time spent assembling Newton systems.
    pub assembly: Duration,

    /// Time spent in linear solves.
    pub linear_solve: Duration,

    /// Time spent evaluating the merit function.
    pub merit: Duration,

    /// Newton systems assembled and solved.
    pub newton_solves: usize,

    /// Merit function evaluations.
    pub merit_evaluations: usize,
}

/// Barrier parameter for the next outer pass: the more aggressive of linear
/// and superlinear shrinkage, floored.
pub fn next_barrier(barrier_size: f64, settings: &SolverSettings) -> f64 {
    let linear = barrier_size * settings.barrier_multiplier;
    let superlinear = barrier_size.powf(settings.barrier_exponent);
    linear.min(superlinear).max(settings.barrier_min)
}

/// Run the interior-point iteration on `system` to completion.
///
/// Returns the final state and diagnostics, or an error if the settings are
/// invalid, the initial state is not strictly interior, or the system's
/// assembly/solve fails (fatal, no retries).
pub fn optimize<S: KktSystem>(
    system: &mut S,
    settings: &SolverSettings,
) -> Result<OptimizeResult, SolverError> {
    settings.validate().map_err(SolverError::InvalidSettings)?;

    let mut state = system.initial_state();
    for &seg in Segment::SLACKS.iter().chain(&Segment::SLACK_MULTIPLIERS) {
        if !state.block_is_strictly_positive(seg) {
            return Err(SolverError::InfeasibleStart(format!(
                "{seg:?} block must be strictly positive"
            )));
        }
    }

    let start = Instant::now();
    let mut stats = DriverStats::default();
    let mut barrier_size = settings.barrier_init;
    let mut penalty_multiplier = settings.penalty_init;
    let mut iteration_number = 0usize;
    let mut outer_iterations = 0usize;
    let mut residual_l1 = f64::NAN;
    let mut status = SolveStatus::Optimal;

    if settings.verbose {
        println!("SAND interior-point solver");
        println!("==========================");
        println!(
            "Problem: density dofs = {}, displacement dofs = {}",
            state.density_len(),
            state.displacement_len()
        );
        println!(
            "Barrier: {:.1} -> {:.1e}, iteration budget {}",
            settings.barrier_init, settings.barrier_min, settings.max_iter
        );
        println!();
        println!(
            "{:>6} {:>12} {:>12} {:>12} {:>12} {:>14}",
            "Iter", "Barrier", "Res l1", "Res linf", "Penalty", "Step"
        );
        println!("{}", "-".repeat(74));
    }

    'outer: loop {
        if iteration_number >= settings.max_iter {
            status = SolveStatus::MaxIters;
            break;
        }
        if barrier_size <= settings.barrier_min {
            let report = check_convergence(system, &state, barrier_size, settings.tol_kkt)?;
            residual_l1 = report.residual_l1;
            if report.converged {
                break;
            }
        }

        // Solve the current barrier subproblem.
        let mut converged = false;
        while !converged && iteration_number < settings.max_iter {
            let outcome = watchdog_cycle(
                system,
                &mut state,
                barrier_size,
                &mut penalty_multiplier,
                settings,
                &mut stats,
            )?;
            iteration_number += outcome.iterations;

            if !state.is_finite() {
                status = SolveStatus::NumericalError;
                break 'outer;
            }

            system.checkpoint(&state, iteration_number);

            let report = check_convergence(system, &state, barrier_size, settings.tol_kkt)?;
            residual_l1 = report.residual_l1;
            converged = report.converged;

            if settings.verbose {
                println!(
                    "{:>6} {:>12.4e} {:>12.4e} {:>12.4e} {:>12.4e} {:>14}",
                    iteration_number,
                    barrier_size,
                    report.residual_l1,
                    report.residual_linf,
                    penalty_multiplier,
                    outcome.strategy.label()
                );
            }
        }

        outer_iterations += 1;
        barrier_size = next_barrier(barrier_size, settings);
        if settings.verbose {
            println!(
                "barrier size reduced to {:.4e} at iteration {}",
                barrier_size, iteration_number
            );
        }
    }

    if settings.verbose {
        println!("{}", "-".repeat(74));
        println!("Status: {status}");
        println!("Iterations: {iteration_number}");
    }

    let objective = system.objective(&state)?;

    Ok(OptimizeResult {
        status,
        objective,
        info: SolveInfo {
            iterations: iteration_number,
            outer_iterations,
            barrier_size,
            penalty_multiplier,
            residual_l1,
            solve_time_ms: start.elapsed().as_millis() as u64,
            assembly_time_ms: stats.assembly.as_millis() as u64,
            linear_solve_time_ms: stats.linear_solve.as_millis() as u64,
            merit_time_ms: stats.merit.as_millis() as u64,
            newton_solves: stats.newton_solves,
            merit_evaluations: stats.merit_evaluations,
        },
        state,
    })
}
