//! Solver settings, status and result types.

use crate::state::BlockState;
use crate::system::SystemError;
use std::fmt;
use thiserror::Error;

/// Settings for the interior-point driver.
///
/// The defaults reproduce the reference algorithm: barrier continuation from
/// 25 down to 5e-4 with the more aggressive of linear (×0.8) and superlinear
/// (^1.2) shrinkage, up to 8 speculative uphill steps per watchdog cycle, and
/// a global budget of 10000 iterations.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Initial barrier parameter μ.
    pub barrier_init: f64,

    /// Barrier floor; continuation never shrinks μ below this.
    pub barrier_min: f64,

    /// Linear shrink factor applied to μ after inner convergence.
    pub barrier_multiplier: f64,

    /// Superlinear shrink exponent applied to μ after inner convergence.
    pub barrier_exponent: f64,

    /// Global iteration budget.
    pub max_iter: usize,

    /// Speculative (merit-increasing) Newton steps allowed per watchdog cycle.
    pub max_uphill_steps: usize,

    /// Sufficient-decrease fraction of the merit's directional derivative.
    pub descent_requirement: f64,

    /// KKT tolerance: converged when ‖rhs‖₁ < tol_kkt · μ.
    pub tol_kkt: f64,

    /// Initial merit penalty multiplier ρ.
    pub penalty_init: f64,

    /// Step-size halvings attempted by the backtracking line search.
    pub max_step_halvings: usize,

    /// Print a banner and per-cycle progress table.
    pub verbose: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        // The global budget can be tightened from the environment without
        // touching call sites.
        let max_iter = std::env::var("SAND_MAX_ITER")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(10_000);

        Self {
            barrier_init: 25.0,
            barrier_min: 5e-4,
            barrier_multiplier: 0.8,
            barrier_exponent: 1.2,
            max_iter,
            max_uphill_steps: 8,
            descent_requirement: 1e-4,
            tol_kkt: 1e-2,
            penalty_init: 1.0,
            max_step_halvings: 10,
            verbose: false,
        }
    }
}

impl SolverSettings {
    /// Validate settings against the requirements of the algorithm.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.barrier_init > 0.0) {
            return Err(format!("barrier_init ({}) must be positive", self.barrier_init));
        }
        if !(self.barrier_min > 0.0) || self.barrier_min > self.barrier_init {
            return Err(format!(
                "barrier_min ({}) must be in (0, barrier_init]",
                self.barrier_min
            ));
        }
        if !(self.barrier_multiplier > 0.0 && self.barrier_multiplier < 1.0) {
            return Err(format!(
                "barrier_multiplier ({}) must be in (0, 1)",
                self.barrier_multiplier
            ));
        }
        if !(self.barrier_exponent > 1.0) {
            return Err(format!(
                "barrier_exponent ({}) must be greater than 1",
                self.barrier_exponent
            ));
        }
        if self.max_uphill_steps == 0 {
            return Err("max_uphill_steps must be at least 1".to_string());
        }
        if !(self.descent_requirement > 0.0) {
            return Err(format!(
                "descent_requirement ({}) must be positive",
                self.descent_requirement
            ));
        }
        if !(self.tol_kkt > 0.0) {
            return Err(format!("tol_kkt ({}) must be positive", self.tol_kkt));
        }
        if !(self.penalty_init > 0.0) {
            return Err(format!("penalty_init ({}) must be positive", self.penalty_init));
        }
        if self.max_step_halvings == 0 {
            return Err("max_step_halvings must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Barrier reached its floor and the KKT residual tolerance holds.
    Optimal,

    /// Global iteration budget exhausted.
    MaxIters,

    /// The state picked up non-finite values.
    NumericalError,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::MaxIters => write!(f, "MaxIters"),
            SolveStatus::NumericalError => write!(f, "Numerical Error"),
        }
    }
}

/// Result of a run with the final state and diagnostics.
#[derive(Debug, Clone)]
pub struct OptimizeResult {
    /// Termination status.
    pub status: SolveStatus,

    /// Final primal-dual state.
    pub state: BlockState,

    /// Compliance objective at the final state.
    pub objective: f64,

    /// Detailed solve information.
    pub info: SolveInfo,
}

/// Detailed solve information and diagnostics.
#[derive(Debug, Clone)]
pub struct SolveInfo {
    /// Iterations consumed (watchdog accounting, not Newton solves).
    pub iterations: usize,

    /// Barrier continuation passes completed.
    pub outer_iterations: usize,

    /// Final barrier parameter μ.
    pub barrier_size: f64,

    /// Final merit penalty multiplier ρ.
    pub penalty_multiplier: f64,

    /// l1 norm of the KKT right-hand side at the final state.
    pub residual_l1: f64,

    /// Total wall time (milliseconds).
    pub solve_time_ms: u64,

    /// Time spent assembling Newton systems (milliseconds).
    pub assembly_time_ms: u64,

    /// Time spent in linear solves (milliseconds).
    pub linear_solve_time_ms: u64,

    /// Time spent evaluating the merit function (milliseconds).
    pub merit_time_ms: u64,

    /// Newton systems assembled and solved.
    pub newton_solves: usize,

    /// Merit function evaluations.
    pub merit_evaluations: usize,
}

/// Errors terminating a run.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Settings failed validation.
    #[error("invalid solver settings: {0}")]
    InvalidSettings(String),

    /// A slack or slack-multiplier block of the initial state is not
    /// strictly positive. The interior-point iteration cannot start from
    /// such a point; this is a caller error, not retried.
    #[error("initial state is not strictly interior: {0}")]
    InfeasibleStart(String),

    /// The assembler or linear solver failed. Fatal; the driver performs no
    /// retries.
    #[error(transparent)]
    System(#[from] SystemError),
}
