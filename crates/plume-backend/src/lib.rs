//! Compute backend abstraction for plume.
//!
//! This crate provides the capability contract simulation code runs
//! against, a reference CPU implementation, and the iterative solvers
//! behind implicit steps.
//!
//! # Core Types
//!
//! - [`ComputeBackend`] - Trait for execution backends
//! - [`BackendRegistry`] - Collection of available backends
//! - [`ExecutionPolicy`] - How to choose backends
//! - [`Scheduler`] - Routes primitives to the selected backend
//! - [`global_scheduler`] - The scheduler geometry, fields and effects use
//! - [`CpuBackend`] - Default CPU backend (always available)
//! - [`Solve`] / [`LinearOperator`] - Linear-solve configuration and operators
//!
//! # Example
//!
//! ```
//! use plume_backend::{BackendRegistry, CpuBackend, ExecutionPolicy, Scheduler};
//! use std::sync::Arc;
//!
//! let mut registry = BackendRegistry::new();
//! registry.register(Arc::new(CpuBackend));
//!
//! let scheduler = Scheduler::new(registry, ExecutionPolicy::Auto);
//! ```

mod backend;
mod cpu;
mod error;
pub mod iterative;
mod linear;
mod policy;
mod registry;
mod scheduler;

pub use backend::{
    BackendCapabilities, BackendKind, BinaryOp, ComputeBackend, Cost, Operation, ReduceOp,
    WorkloadHint,
};
pub use cpu::CpuBackend;
pub use error::BackendError;
pub use linear::{
    jit_compile_linear, DenseOperator, LinearFunction, LinearOperator, LinearSolution,
    ResidualHistory, Solve, SolveMethod, SolveMonitor,
};
pub use policy::ExecutionPolicy;
pub use registry::BackendRegistry;
pub use scheduler::{global_scheduler, install_global_scheduler, Scheduler};
