//! Linear solves routed through the backend scheduler.

use plume_backend::{
    global_scheduler, BackendRegistry, DenseOperator, ExecutionPolicy, LinearOperator,
    ResidualHistory, Scheduler, Solve,
};
use plume_core::Tensor;
use tracing::{debug, warn};

use crate::error::{Result, SolveError};
use crate::info::{SolveInfo, Trajectory};
use crate::tape;

/// Runs linear solves on the backend an [`ExecutionPolicy`] selects and
/// records them on the active [`SolveTape`](crate::SolveTape).
#[derive(Clone)]
pub struct Solver {
    scheduler: Scheduler,
}

/// Solves on the [`global_scheduler`].
impl Default for Solver {
    fn default() -> Self {
        Self {
            scheduler: global_scheduler().clone(),
        }
    }
}

impl Solver {
    pub fn new(registry: BackendRegistry, policy: ExecutionPolicy) -> Self {
        Self {
            scheduler: Scheduler::new(registry, policy),
        }
    }

    /// A solver over the CPU backend with the given policy.
    pub fn with_policy(policy: ExecutionPolicy) -> Self {
        Self::new(BackendRegistry::with_cpu(), policy)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Solves `op(x) = rhs` for `x`.
    ///
    /// Each batch entry of `rhs` is solved independently. Fails with
    /// [`SolveError::NotConverged`] or [`SolveError::Diverged`] after
    /// recording the solve.
    pub fn solve_linear(&self, op: &dyn LinearOperator, rhs: &Tensor, solve: &Solve) -> Result<Tensor> {
        self.run(op, rhs, solve, false)
    }

    /// Solves the adjoint system `opᵀ(g) = dl_dx` of a previous solve.
    ///
    /// `g` is the gradient of the loss with respect to that solve's
    /// right-hand side. Symmetric operators are reused as they are. Others
    /// are traced into a dense matrix over one batch entry of `dl_dx` and
    /// transposed, which costs one operator application per element of that
    /// entry; the transposed matrix then solves every batch entry.
    pub fn solve_linear_gradient(
        &self,
        op: &dyn LinearOperator,
        dl_dx: &Tensor,
        solve: &Solve,
    ) -> Result<Tensor> {
        let adjoint_solve = Solve {
            x0: None,
            ..solve.clone()
        };
        if op.is_symmetric() {
            return self.run(op, dl_dx, &adjoint_solve, true);
        }
        let adjoint = DenseOperator::trace(op, &dl_dx.shape().non_batch())?.transposed();
        self.run(&adjoint, dl_dx, &adjoint_solve, true)
    }

    fn run(&self, op: &dyn LinearOperator, rhs: &Tensor, solve: &Solve, gradient: bool) -> Result<Tensor> {
        let recording = tape::active_recording();
        let (solution, trajectory) = if recording == Some(true) {
            let mut history = ResidualHistory::default();
            let solution = self.scheduler.solve_linear(op, rhs, solve, &mut history)?;
            (solution, Some(Trajectory::new(history.residuals)))
        } else {
            (self.scheduler.solve_linear(op, rhs, solve, &mut ())?, None)
        };
        let info = SolveInfo::new(solve, solution, trajectory);
        debug!(
            operator = op.name(),
            method = %info.method(),
            iterations = info.iterations(),
            residual = info.residual().max(),
            gradient,
            "linear solve finished"
        );
        if recording.is_some() {
            tape::record(info.clone(), gradient);
        }

        if info.diverged() {
            warn!(method = %info.method(), iterations = info.iterations(), "linear solve diverged");
            return Err(SolveError::Diverged { info: Box::new(info) });
        }
        if !info.converged() {
            warn!(
                method = %info.method(),
                iterations = info.iterations(),
                residual = info.residual().max(),
                "linear solve did not converge"
            );
            return Err(SolveError::NotConverged { info: Box::new(info) });
        }
        Ok(info.x().clone())
    }
}

/// Solves `op(x) = rhs` on the default CPU solver.
///
/// See [`Solver::solve_linear`].
pub fn solve_linear(op: &dyn LinearOperator, rhs: &Tensor, solve: &Solve) -> Result<Tensor> {
    Solver::default().solve_linear(op, rhs, solve)
}

/// Gradient of a linear solve with respect to its right-hand side.
///
/// See [`Solver::solve_linear_gradient`].
pub fn solve_linear_gradient(op: &dyn LinearOperator, dl_dx: &Tensor, solve: &Solve) -> Result<Tensor> {
    Solver::default().solve_linear_gradient(op, dl_dx, solve)
}
