//! Linear solves with convergence recording and implicit gradients.
//!
//! # Core Types
//!
//! - [`Solver`] - Runs solves on the backend an execution policy selects
//! - [`solve_linear`] / [`solve_linear_gradient`] - Solves on the default
//!   CPU solver
//! - [`SolveTape`] - Scoped recorder of every solve issued on the thread
//! - [`SolveInfo`] - Iterations, residuals and convergence of one solve
//! - [`Trajectory`] - Residual norm at each iteration
//!
//! Operators and solve configuration come from [`plume_backend`]:
//! [`jit_compile_linear`], [`Solve`] and [`SolveMethod`] are re-exported
//! here for convenience.

mod error;
mod info;
mod solver;
mod tape;

pub use error::{Result, SolveError};
pub use info::{Residual, SolveInfo, Trajectory};
pub use plume_backend::{jit_compile_linear, LinearFunction, LinearOperator, Solve, SolveMethod};
pub use solver::{solve_linear, solve_linear_gradient, Solver};
pub use tape::SolveTape;
