//! SAND topology optimization core.
//!
//! This library computes optimal material-density distributions by solving
//! the simultaneous analysis-and-design (SAND) formulation of structural
//! topology optimization with a primal-dual interior point method:
//!
//! - **Barrier continuation**: a sequence of barrier subproblems with the
//!   barrier parameter shrunk from 25 down to 5e-4 by the more aggressive of
//!   a linear and a superlinear schedule.
//! - **Watchdog line search**: a non-monotone globalization that tolerates a
//!   bounded number of merit-increasing full Newton steps before falling back
//!   to classical backtracking.
//! - **Fraction-to-boundary rule**: primal and dual step lengths that keep
//!   slack and multiplier variables strictly positive.
//! - **Exact l1 merit function** with an adaptively ratcheted penalty
//!   multiplier (Nocedal & Wright, eq. 18.36).
//!
//! The spatial discretization is pluggable: the driver sees the physical
//! model only through the [`KktSystem`] trait (assemble, residual-only,
//! solve, objective). A dense grounded-spring reference model,
//! [`SpringChain`], ships with the crate for tests and examples.
//!
//! # Example
//!
//! ```
//! use sand_core::{optimize, SolverSettings, SpringChain};
//!
//! let mut chain = SpringChain::new(8, 0.5);
//! let settings = SolverSettings::default();
//! let result = optimize(&mut chain, &settings).unwrap();
//! println!("{}: compliance {:.4}", result.status, result.objective);
//! ```

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod ipm;
pub mod linalg;
pub mod problem;
pub mod spring_chain;
pub mod state;
pub mod system;

pub use ipm::{next_barrier, optimize, Convergence, DriverStats};
pub use problem::{OptimizeResult, SolveInfo, SolveStatus, SolverError, SolverSettings};
pub use spring_chain::SpringChain;
pub use state::{BlockState, Segment};
pub use system::{KktSystem, NewtonMatrix, SystemError};
