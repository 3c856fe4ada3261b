//! Error types for linear solves.

use plume_backend::BackendError;
use plume_core::PlumeError;
use thiserror::Error;

use crate::info::SolveInfo;

/// Result alias for solve operations.
pub type Result<T> = std::result::Result<T, SolveError>;

/// Errors returned by [`solve_linear`](crate::solve_linear).
///
/// When a solve fails after running, its [`SolveInfo`] has already been
/// appended to the active tape, if any.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    /// Backend selection or execution failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Invalid operator, right-hand side or configuration.
    #[error(transparent)]
    Core(#[from] PlumeError),

    /// The residual did not reach the tolerance within `max_iterations`.
    #[error(
        "{} did not converge within {} iterations (residual {:e})",
        .info.method(),
        .info.iterations(),
        .info.residual().max()
    )]
    NotConverged { info: Box<SolveInfo> },

    /// A residual became NaN or infinite.
    #[error("{} diverged after {} iterations", .info.method(), .info.iterations())]
    Diverged { info: Box<SolveInfo> },
}

impl SolveError {
    /// The record of the failed solve, for errors raised after solving.
    pub fn info(&self) -> Option<&SolveInfo> {
        match self {
            SolveError::NotConverged { info } | SolveError::Diverged { info } => Some(info),
            _ => None,
        }
    }
}
