//! Reference backend running every primitive on the host.

use plume_core::{Dim, Tensor};
use tracing::debug;

use crate::backend::{
    BackendCapabilities, BackendKind, BinaryOp, ComputeBackend, Cost, Operation, ReduceOp,
    WorkloadHint,
};
use crate::error::BackendError;
use crate::iterative::{bicgstab, conjugate_gradient};
use crate::linear::{LinearOperator, LinearSolution, Solve, SolveMethod, SolveMonitor};

/// Runs every [`Operation`] directly on [`Tensor`]'s ndarray buffers.
///
/// Its cost estimate is the element count times the iteration bound, with
/// no transfer term.
///
/// ```
/// use plume_backend::{ComputeBackend, CpuBackend, SolveMethod};
///
/// assert_eq!(CpuBackend.name(), "cpu");
/// assert!(CpuBackend.capabilities().solvers.contains(&SolveMethod::BiCgStab));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            kind: BackendKind::Cpu,
            bulk_efficient: false,
            streaming_efficient: true,
            solvers: vec![SolveMethod::Cg, SolveMethod::BiCgStab],
        }
    }

    fn supports(&self, _op: &Operation) -> bool {
        true
    }

    fn estimate_cost(&self, _op: &Operation, workload: &WorkloadHint) -> Option<Cost> {
        Some(Cost {
            compute: (workload.element_count * workload.iterations.max(1)) as f64,
            transfer: 0.0,
        })
    }

    fn binary(&self, op: BinaryOp, a: &Tensor, b: &Tensor) -> Result<Tensor, BackendError> {
        Ok(op.apply(a, b)?)
    }

    fn reduce(&self, op: ReduceOp, x: &Tensor, dims: &[&str]) -> Result<Tensor, BackendError> {
        Ok(op.apply(x, dims))
    }

    fn stack(&self, values: &[Tensor], dim: Dim) -> Result<Tensor, BackendError> {
        Ok(Tensor::stack(values, dim)?)
    }

    fn unstack(&self, x: &Tensor, dim: &str) -> Result<Vec<Tensor>, BackendError> {
        Ok(x.unstack(dim)?)
    }

    fn solve_linear(
        &self,
        op: &dyn LinearOperator,
        rhs: &Tensor,
        solve: &Solve,
        monitor: &mut dyn SolveMonitor,
    ) -> Result<LinearSolution, BackendError> {
        solve.validate()?;
        let method = solve.method.resolve(op);
        debug!(operator = op.name(), %method, shape = %rhs.shape(), "cpu linear solve");
        let solution = match method {
            SolveMethod::Cg => conjugate_gradient(op, rhs, solve, monitor)?,
            SolveMethod::BiCgStab | SolveMethod::Auto => bicgstab(op, rhs, solve, monitor)?,
        };
        Ok(solution)
    }
}
