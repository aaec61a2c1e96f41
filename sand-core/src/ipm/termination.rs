//! Convergence check for the barrier subproblem.

use crate::state::BlockState;
use crate::system::{KktSystem, SystemError};

/// Norms of the KKT right-hand side and the resulting verdict.
#[derive(Debug, Clone, Copy)]
pub struct Convergence {
    /// l1 norm of the right-hand side.
    pub residual_l1: f64,

    /// linf norm of the right-hand side.
    pub residual_linf: f64,

    /// True iff residual_l1 < tol_kkt · barrier_size.
    pub converged: bool,
}

/// Check whether `state` satisfies the barrier-relaxed KKT tolerance.
///
/// Pure predicate over the system's residual-only evaluation: the current
/// subproblem counts as solved once the l1 norm of the right-hand side drops
/// below `tol_kkt` times the barrier parameter, so the tolerance tightens as
/// the barrier shrinks.
pub fn check_convergence<S: KktSystem>(
    system: &mut S,
    state: &BlockState,
    barrier_size: f64,
    tol_kkt: f64,
) -> Result<Convergence, SystemError> {
    let residual = system.residual(state, barrier_size)?;
    let residual_l1 = residual.l1_norm();
    let residual_linf = residual.linf_norm();
    Ok(Convergence {
        residual_l1,
        residual_linf,
        converged: residual_l1 < tol_kkt * barrier_size,
    })
}
