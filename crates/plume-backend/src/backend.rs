//! The capability contract every numeric backend implements.

use std::fmt;

use plume_core::{Dim, Tensor};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::linear::{LinearOperator, LinearSolution, Solve, SolveMethod, SolveMonitor};

/// A compute backend that executes tensor primitives.
///
/// Backends register themselves and advertise capabilities. The scheduler
/// selects backends based on the requested [`Operation`] and execution
/// policy. Geometry stacks (`stack`), field masks (`reduce`), effects
/// (`binary`) and linear solves (`solve_linear`) reach backends only
/// through a [`Scheduler`](crate::Scheduler).
///
/// # Implementing a Backend
///
/// ```ignore
/// use plume_backend::*;
///
/// pub struct MyGpuBackend {
///     // device handles
/// }
///
/// impl ComputeBackend for MyGpuBackend {
///     fn name(&self) -> &str { "my-gpu" }
///
///     fn capabilities(&self) -> BackendCapabilities {
///         BackendCapabilities {
///             kind: BackendKind::Gpu,
///             bulk_efficient: true,
///             streaming_efficient: false,
///             solvers: vec![SolveMethod::Cg],
///         }
///     }
///
///     fn supports(&self, op: &Operation) -> bool {
///         matches!(op, Operation::LinearSolve(SolveMethod::Cg))
///     }
///
///     // ...
/// }
/// ```
pub trait ComputeBackend: Send + Sync {
    /// Registry key; also what [`ExecutionPolicy::Named`](crate::ExecutionPolicy::Named) matches.
    fn name(&self) -> &str;

    fn capabilities(&self) -> BackendCapabilities;

    /// Returns `true` if this backend can run the given operation.
    fn supports(&self, op: &Operation) -> bool;

    /// Estimates the cost of an operation with the given workload.
    ///
    /// Returns `None` if the operation is not supported.
    fn estimate_cost(&self, op: &Operation, workload: &WorkloadHint) -> Option<Cost>;

    /// Elementwise combination of two tensors, broadcasting by name.
    fn binary(&self, op: BinaryOp, a: &Tensor, b: &Tensor) -> Result<Tensor, BackendError>;

    /// Reduction over the named dimensions.
    fn reduce(&self, op: ReduceOp, x: &Tensor, dims: &[&str]) -> Result<Tensor, BackendError>;

    /// Stacks tensors along a new dimension.
    fn stack(&self, values: &[Tensor], dim: Dim) -> Result<Tensor, BackendError>;

    /// Splits a tensor along a dimension.
    fn unstack(&self, x: &Tensor, dim: &str) -> Result<Vec<Tensor>, BackendError>;

    /// Solves `op(x) = rhs` for `x`, reporting every iteration to `monitor`.
    fn solve_linear(
        &self,
        op: &dyn LinearOperator,
        rhs: &Tensor,
        solve: &Solve,
        monitor: &mut dyn SolveMonitor,
    ) -> Result<LinearSolution, BackendError>;
}

/// A primitive a backend may be asked to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Binary(BinaryOp),
    Reduce(ReduceOp),
    Stack,
    Unstack,
    LinearSolve(SolveMethod),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Binary(op) => write!(f, "binary {op:?}"),
            Operation::Reduce(op) => write!(f, "reduce {op:?}"),
            Operation::Stack => f.write_str("stack"),
            Operation::Unstack => f.write_str("unstack"),
            Operation::LinearSolve(method) => write!(f, "linear solve ({method})"),
        }
    }
}

/// Elementwise binary operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Division yielding 0 where the divisor is 0.
    SafeDiv,
}

impl BinaryOp {
    /// Applies the operation with [`Tensor`]'s own broadcasting.
    pub fn apply(self, a: &Tensor, b: &Tensor) -> plume_core::Result<Tensor> {
        match self {
            BinaryOp::Add => a.try_add(b),
            BinaryOp::Sub => a.try_sub(b),
            BinaryOp::Mul => a.try_mul(b),
            BinaryOp::Div => a.try_div(b),
            BinaryOp::SafeDiv => a.safe_div(b),
        }
    }
}

/// Reductions over named dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    Sum,
    Mean,
    Max,
    Min,
    MaxAbs,
}

impl ReduceOp {
    /// Applies the reduction.
    pub fn apply(self, x: &Tensor, dims: &[&str]) -> Tensor {
        match self {
            ReduceOp::Sum => x.sum_over(dims),
            ReduceOp::Mean => x.mean_over(dims),
            ReduceOp::Max => x.max_over(dims),
            ReduceOp::Min => x.min_over(dims),
            ReduceOp::MaxAbs => x.max_abs_over(dims),
        }
    }
}

/// What a backend advertises to the scheduler.
#[derive(Clone, Debug)]
pub struct BackendCapabilities {
    pub kind: BackendKind,
    /// Pays off on tensors with many elements.
    pub bulk_efficient: bool,
    /// Whether this backend is efficient for small, latency-bound work.
    pub streaming_efficient: bool,
    /// Iterative linear solvers the backend implements.
    pub solvers: Vec<SolveMethod>,
}

/// Device class, matched by [`ExecutionPolicy::PreferKind`](crate::ExecutionPolicy::PreferKind).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BackendKind {
    Cpu,
    Gpu,
    /// Anything else, e.g. a remote or SIMD backend.
    Custom(String),
}

/// Size of a pending operation, used to pick between backends.
#[derive(Clone, Debug, Default)]
pub struct WorkloadHint {
    pub element_count: usize,
    pub input_bytes: usize,
    pub output_bytes: usize,
    /// Upper bound on operator applications, for iterative solves.
    pub iterations: usize,
}

impl WorkloadHint {
    /// One `f64` in, one out.
    pub fn single() -> Self {
        Self {
            element_count: 1,
            input_bytes: 8,
            output_bytes: 8,
            iterations: 1,
        }
    }

    pub fn bulk(count: usize, bytes_per_element: usize) -> Self {
        Self {
            element_count: count,
            input_bytes: count * bytes_per_element,
            output_bytes: count * bytes_per_element,
            iterations: 1,
        }
    }

    /// Element count and byte size of `x` at its dtype.
    pub fn for_tensor(x: &Tensor) -> Self {
        Self::bulk(x.len(), (x.dtype().bits() / 8) as usize)
    }

    /// Like [`for_tensor`](Self::for_tensor), bounded by `solve.max_iterations`.
    pub fn for_solve(rhs: &Tensor, solve: &Solve) -> Self {
        Self {
            iterations: solve.max_iterations.max(1),
            ..Self::for_tensor(rhs)
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.input_bytes + self.output_bytes
    }
}

/// Relative cost estimate. Only comparisons between backends are meaningful.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cost {
    pub compute: f64,
    /// Moving data to and from the device.
    pub transfer: f64,
}

impl Cost {
    pub fn total(&self) -> f64 {
        self.compute + self.transfer
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::spatial;

    #[test]
    fn test_workload_hint_for_tensor() {
        let x = Tensor::zeros(spatial(&[("x", 4)])).cast(plume_core::DType::Float32);
        let hint = WorkloadHint::for_tensor(&x);
        assert_eq!(hint.element_count, 4);
        assert_eq!(hint.total_bytes(), 32);
        assert_eq!(WorkloadHint::single().iterations, 1);
    }

    #[test]
    fn test_workload_hint_for_solve() {
        let rhs = Tensor::zeros(spatial(&[("x", 10), ("y", 10)]));
        let solve = Solve {
            max_iterations: 50,
            ..Solve::default()
        };
        let hint = WorkloadHint::for_solve(&rhs, &solve);
        assert_eq!(hint.element_count, 100);
        assert_eq!(hint.input_bytes, 800);
        assert_eq!(hint.iterations, 50);
    }

    #[test]
    fn test_cost_total() {
        let cost = Cost {
            compute: 2.5,
            transfer: 0.5,
        };
        assert_eq!(cost.total(), 3.0);
        assert_eq!(Cost::zero().total(), 0.0);
    }

    #[test]
    fn test_binary_op_apply() {
        let a = Tensor::scalar(6.0);
        let b = Tensor::scalar(0.0);
        assert_eq!(BinaryOp::SafeDiv.apply(&a, &b).unwrap().as_scalar().unwrap(), 0.0);
        assert_eq!(BinaryOp::Sub.apply(&a, &b).unwrap().as_scalar().unwrap(), 6.0);
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(
            Operation::LinearSolve(SolveMethod::BiCgStab).to_string(),
            "linear solve (biCGstab)"
        );
    }
}
