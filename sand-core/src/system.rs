//! Interface to the problem-dependent Newton machinery.
//!
//! The optimization driver is independent of the spatial discretization.
//! Everything it needs from the physical model goes through [`KktSystem`]:
//! assembling the linearized KKT system, evaluating its right-hand side on
//! its own, solving for a Newton direction, and evaluating the compliance
//! objective. Implementations may be a full finite-element assembly or the
//! small dense reference model shipped in this crate.

use crate::state::{BlockState, Segment};
use thiserror::Error;

/// Errors reported by a [`KktSystem`] implementation.
///
/// These are fatal to the current run: the driver has no recovery strategy
/// for a failed assembly or linear solve and propagates them to the caller.
#[derive(Debug, Error)]
pub enum SystemError {
    /// The Newton matrix could not be factorized or solved.
    #[error("linear solve failed: {0}")]
    SingularSystem(String),

    /// Implementation-specific failure.
    #[error("{0}")]
    Message(String),
}

/// Block access to an assembled Newton matrix.
///
/// The penalty-multiplier estimate needs curvature information restricted to
/// the decision-variable blocks. Implementations expose it as block
/// matrix-vector products rather than by handing out raw storage.
pub trait NewtonMatrix {
    /// y = M[row, col] * x for one block of the matrix. `x` has the column
    /// block's length, `y` the row block's length; `y` is overwritten.
    fn vmult_block(&self, row: Segment, col: Segment, x: &[f64], y: &mut [f64]);
}

/// The discretized KKT system of the barrier subproblem.
///
/// All methods must be deterministic for fixed inputs. `assemble` produces
/// the Newton system (matrix and right-hand side); `solve` returns the
/// additive step for the given right-hand side; `residual` is the cheap
/// rhs-only evaluation used by the merit function and the convergence check.
/// Equality constraints such as a volume constraint must be respected by
/// construction of the matrix, not by post-processing the step.
pub trait KktSystem {
    /// Assembled Newton matrix.
    type Matrix: NewtonMatrix;

    /// Starting point for the optimization. The slack and slack-multiplier
    /// blocks must be strictly positive.
    fn initial_state(&self) -> BlockState;

    /// Build the Newton system linearized at `state` for the given barrier
    /// parameter.
    fn assemble(
        &mut self,
        state: &BlockState,
        barrier_size: f64,
    ) -> Result<(Self::Matrix, BlockState), SystemError>;

    /// Evaluate only the right-hand side at `state`. Must agree with the
    /// vector returned by [`KktSystem::assemble`] at the same arguments.
    fn residual(&mut self, state: &BlockState, barrier_size: f64)
        -> Result<BlockState, SystemError>;

    /// Solve the assembled system for a Newton step.
    fn solve(
        &mut self,
        matrix: &Self::Matrix,
        rhs: &BlockState,
    ) -> Result<BlockState, SystemError>;

    /// The compliance objective: a linear functional of the displacement
    /// block (boundary traction work).
    fn objective(&mut self, state: &BlockState) -> Result<f64, SystemError>;

    /// Observability hook, invoked after every accepted watchdog cycle with
    /// the new current state and the global iteration count. Output writers
    /// (visualization, export) hang off this; the default does nothing.
    fn checkpoint(&mut self, _state: &BlockState, _iteration: usize) {}
}
