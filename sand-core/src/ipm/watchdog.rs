//! Non-monotone watchdog line-search controller.
//!
//! One cycle lets the Newton iteration run "uphill" for a bounded number of
//! full steps before demanding sufficient merit decrease against a snapshot
//! taken at the start of the cycle. Near the central path, full Newton steps
//! often raise the exact merit for an iteration or two while still making
//! progress; insisting on monotone decrease there forces tiny damped steps.
//! If no speculative step meets the goal, a cascade of backtracked steps
//! restores guaranteed descent.

use super::merit::{exact_merit, merit_directional_derivative};
use super::step::{find_max_step, take_scaled_step};
use super::{diagnostics_enabled, DriverStats};
use crate::problem::SolverSettings;
use crate::state::BlockState;
use crate::system::{KktSystem, SystemError};

/// How a cycle arrived at its accepted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStrategy {
    /// Full Newton steps; the `steps`-th one met the goal merit.
    FullNewton {
        /// Speculative steps taken, 1-based.
        steps: usize,
    },
    /// Backtracked step from the end of the speculative phase.
    StretchFromCurrent,
    /// Rescaled first step from the cycle's starting snapshot.
    RescaledWatchdog,
    /// Fresh Newton step taken from the backtracked stretch state.
    NewtonFromStretch,
}

impl StepStrategy {
    /// Short label for progress tables.
    pub fn label(&self) -> &'static str {
        match self {
            StepStrategy::FullNewton { .. } => "newton",
            StepStrategy::StretchFromCurrent => "stretch",
            StepStrategy::RescaledWatchdog => "watchdog",
            StepStrategy::NewtonFromStretch => "stretch+newton",
        }
    }
}

/// Result of one watchdog cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleOutcome {
    /// Iterations charged against the global budget.
    pub iterations: usize,

    /// Which path produced the accepted state.
    pub strategy: StepStrategy,
}

/// Run one watchdog cycle, advancing `current_state` in place.
///
/// Speculative phase: up to `max_uphill_steps` full Newton steps are applied
/// unconditionally. After each one, the merit is compared against
/// `merit(snapshot) + descent_requirement · d`, where `d` is the forward-
/// difference directional derivative of the merit at the snapshot along the
/// first step of the cycle. Acceptance after the k-th step costs k
/// iterations.
///
/// Fallback phase (no speculative step accepted): a fresh Newton step at the
/// advanced state is backtracked into a "stretch" state, and one of three
/// steps is accepted: the stretch state itself, a backtracked step from the
/// snapshot along the saved first step, or a backtracked fresh Newton step
/// from the stretch state. These cost `max_uphill_steps + 1` or `+ 2`
/// iterations.
pub fn watchdog_cycle<S: KktSystem>(
    system: &mut S,
    current_state: &mut BlockState,
    barrier_size: f64,
    penalty_multiplier: &mut f64,
    settings: &SolverSettings,
    stats: &mut DriverStats,
) -> Result<CycleOutcome, SystemError> {
    let watchdog_state = current_state.clone();

    // First speculative step. Its direction anchors the goal merit for the
    // whole cycle.
    let watchdog_step = find_max_step(system, current_state, barrier_size, penalty_multiplier, stats)?;
    current_state.add_assign(&watchdog_step);

    let mut goal_merit = 0.0;
    for k in 0..settings.max_uphill_steps {
        if k > 0 {
            let step =
                find_max_step(system, current_state, barrier_size, penalty_multiplier, stats)?;
            current_state.add_assign(&step);
        }

        let current_merit =
            exact_merit(system, current_state, barrier_size, *penalty_multiplier, stats)?;
        let derivative = merit_directional_derivative(
            system,
            &watchdog_state,
            &watchdog_step,
            barrier_size,
            *penalty_multiplier,
            stats,
        )?;
        let watchdog_merit =
            exact_merit(system, &watchdog_state, barrier_size, *penalty_multiplier, stats)?;
        goal_merit = watchdog_merit + settings.descent_requirement * derivative;

        if diagnostics_enabled() {
            eprintln!(
                "uphill step {}: merit {:.6e}, goal {:.6e}",
                k + 1,
                current_merit,
                goal_merit
            );
        }

        if current_merit < goal_merit {
            return Ok(CycleOutcome {
                iterations: k + 1,
                strategy: StepStrategy::FullNewton { steps: k + 1 },
            });
        }
    }

    // No speculative step met the goal: fall back to damped steps.
    let current_step =
        find_max_step(system, current_state, barrier_size, penalty_multiplier, stats)?;
    let stretch_state = take_scaled_step(
        system,
        current_state,
        &current_step,
        barrier_size,
        *penalty_multiplier,
        settings.descent_requirement,
        settings.max_step_halvings,
        stats,
    )?;

    let current_merit =
        exact_merit(system, current_state, barrier_size, *penalty_multiplier, stats)?;
    let watchdog_merit =
        exact_merit(system, &watchdog_state, barrier_size, *penalty_multiplier, stats)?;
    let stretch_merit =
        exact_merit(system, &stretch_state, barrier_size, *penalty_multiplier, stats)?;

    if current_merit < watchdog_merit || stretch_merit < goal_merit {
        *current_state = stretch_state;
        Ok(CycleOutcome {
            iterations: settings.max_uphill_steps + 1,
            strategy: StepStrategy::StretchFromCurrent,
        })
    } else if stretch_merit > watchdog_merit {
        *current_state = take_scaled_step(
            system,
            &watchdog_state,
            &watchdog_step,
            barrier_size,
            *penalty_multiplier,
            settings.descent_requirement,
            settings.max_step_halvings,
            stats,
        )?;
        Ok(CycleOutcome {
            iterations: settings.max_uphill_steps + 1,
            strategy: StepStrategy::RescaledWatchdog,
        })
    } else {
        let stretch_step =
            find_max_step(system, &stretch_state, barrier_size, penalty_multiplier, stats)?;
        *current_state = take_scaled_step(
            system,
            &stretch_state,
            &stretch_step,
            barrier_size,
            *penalty_multiplier,
            settings.descent_requirement,
            settings.max_step_halvings,
            stats,
        )?;
        Ok(CycleOutcome {
            iterations: settings.max_uphill_steps + 2,
            strategy: StepStrategy::NewtonFromStretch,
        })
    }
}
