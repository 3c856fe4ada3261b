//! Backend-aware dispatch.
//!
//! The [`Scheduler`] owns a [`BackendRegistry`] and an [`ExecutionPolicy`]
//! and routes every tensor primitive to the backend the policy selects.
//! Geometry stacks, field masks and effects dispatch through the
//! process-wide [`global_scheduler`].

use std::sync::{Arc, OnceLock};

use plume_core::{Dim, Tensor};
use tracing::trace;

use crate::backend::{BinaryOp, ComputeBackend, Operation, ReduceOp, WorkloadHint};
use crate::error::BackendError;
use crate::linear::{LinearOperator, LinearSolution, Solve, SolveMonitor};
use crate::policy::ExecutionPolicy;
use crate::registry::BackendRegistry;

/// Workloads at or above this many elements prefer bulk-efficient backends.
const BULK_THRESHOLD: usize = 10_000;

/// Scheduler that selects backends for tensor primitives.
///
/// # Example
///
/// ```
/// use plume_backend::{BackendRegistry, ExecutionPolicy, Operation, Scheduler, WorkloadHint};
///
/// let scheduler = Scheduler::new(BackendRegistry::with_cpu(), ExecutionPolicy::Auto);
/// let backend = scheduler
///     .select_backend(&Operation::Stack, &WorkloadHint::single())
///     .unwrap();
/// assert_eq!(backend.name(), "cpu");
/// ```
#[derive(Clone)]
pub struct Scheduler {
    registry: BackendRegistry,
    policy: ExecutionPolicy,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(BackendRegistry::with_cpu(), ExecutionPolicy::Auto)
    }
}

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

/// The scheduler shared by every crate that dispatches tensor primitives.
///
/// Unless [`install_global_scheduler`] ran first, this is the CPU backend
/// under [`ExecutionPolicy::Auto`].
pub fn global_scheduler() -> &'static Scheduler {
    GLOBAL.get_or_init(Scheduler::default)
}

/// Replaces the default global scheduler. Must run before the first
/// [`global_scheduler`] call; fails with [`BackendError::AlreadyInstalled`]
/// afterwards.
pub fn install_global_scheduler(scheduler: Scheduler) -> Result<(), BackendError> {
    GLOBAL.set(scheduler).map_err(|_| BackendError::AlreadyInstalled)
}

impl Scheduler {
    /// Creates a new scheduler with the given registry and policy.
    pub fn new(registry: BackendRegistry, policy: ExecutionPolicy) -> Self {
        Self { registry, policy }
    }

    /// Returns a reference to the backend registry.
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Returns a mutable reference to the backend registry.
    pub fn registry_mut(&mut self) -> &mut BackendRegistry {
        &mut self.registry
    }

    /// Returns the current execution policy.
    pub fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    /// Sets the execution policy.
    pub fn set_policy(&mut self, policy: ExecutionPolicy) {
        self.policy = policy;
    }

    /// Selects the backend for an operation.
    pub fn select_backend(
        &self,
        op: &Operation,
        workload: &WorkloadHint,
    ) -> Result<&Arc<dyn ComputeBackend>, BackendError> {
        let selected = match &self.policy {
            ExecutionPolicy::Auto => self.select_auto(op, workload),
            ExecutionPolicy::PreferKind(kind) => self
                .registry
                .of_kind(kind)
                .find(|b| b.supports(op))
                .or_else(|| self.registry.supporting(op).next()),
            ExecutionPolicy::Named(name) => {
                let backend = self
                    .registry
                    .get(name)
                    .ok_or_else(|| BackendError::BackendNotFound(name.clone()))?;
                if !backend.supports(op) {
                    return Err(BackendError::Unsupported(format!("{op} on '{name}'")));
                }
                Some(backend)
            }
            ExecutionPolicy::MinimizeCost => self.select_min_cost(op, workload),
        };
        let backend = selected.ok_or_else(|| BackendError::NoBackendAvailable(op.to_string()))?;
        trace!(backend = backend.name(), %op, "selected backend");
        Ok(backend)
    }

    fn select_auto(
        &self,
        op: &Operation,
        workload: &WorkloadHint,
    ) -> Option<&Arc<dyn ComputeBackend>> {
        let candidates: Vec<_> = self.registry.supporting(op).collect();
        if workload.element_count >= BULK_THRESHOLD {
            if let Some(bulk) = candidates.iter().find(|b| b.capabilities().bulk_efficient) {
                return Some(*bulk);
            }
        }
        candidates
            .iter()
            .find(|b| b.capabilities().streaming_efficient)
            .copied()
            .or_else(|| candidates.first().copied())
    }

    fn select_min_cost(
        &self,
        op: &Operation,
        workload: &WorkloadHint,
    ) -> Option<&Arc<dyn ComputeBackend>> {
        self.registry
            .supporting(op)
            .filter_map(|b| b.estimate_cost(op, workload).map(|cost| (b, cost.total())))
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(backend, _)| backend)
    }

    /// Elementwise combination on the selected backend.
    pub fn binary(&self, op: BinaryOp, a: &Tensor, b: &Tensor) -> Result<Tensor, BackendError> {
        let workload = WorkloadHint::for_tensor(a);
        self.select_backend(&Operation::Binary(op), &workload)?
            .binary(op, a, b)
    }

    /// Reduction on the selected backend.
    pub fn reduce(&self, op: ReduceOp, x: &Tensor, dims: &[&str]) -> Result<Tensor, BackendError> {
        let workload = WorkloadHint::for_tensor(x);
        self.select_backend(&Operation::Reduce(op), &workload)?
            .reduce(op, x, dims)
    }

    /// Stacking on the selected backend.
    pub fn stack(&self, values: &[Tensor], dim: Dim) -> Result<Tensor, BackendError> {
        let count = values.iter().map(Tensor::len).sum();
        self.select_backend(&Operation::Stack, &WorkloadHint::bulk(count, 8))?
            .stack(values, dim)
    }

    /// Unstacking on the selected backend.
    pub fn unstack(&self, x: &Tensor, dim: &str) -> Result<Vec<Tensor>, BackendError> {
        self.select_backend(&Operation::Unstack, &WorkloadHint::for_tensor(x))?
            .unstack(x, dim)
    }

    /// Linear solve on the selected backend.
    ///
    /// `Auto` is resolved against the operator before selection, so only
    /// backends implementing the concrete method are considered.
    pub fn solve_linear(
        &self,
        op: &dyn LinearOperator,
        rhs: &Tensor,
        solve: &Solve,
        monitor: &mut dyn SolveMonitor,
    ) -> Result<LinearSolution, BackendError> {
        let method = solve.method.resolve(op);
        let workload = WorkloadHint::for_solve(rhs, solve);
        self.select_backend(&Operation::LinearSolve(method), &workload)?
            .solve_linear(op, rhs, solve, monitor)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .finish()
    }
}
