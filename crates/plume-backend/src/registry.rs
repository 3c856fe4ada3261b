//! Named collection of backends the scheduler chooses from.

use std::sync::Arc;

use tracing::debug;

use crate::backend::{BackendKind, ComputeBackend, Operation};

/// Backends available to a [`Scheduler`](crate::Scheduler), unique by name.
///
/// Order matters: automatic selection breaks ties by registration order.
///
/// # Example
///
/// ```
/// use plume_backend::{BackendRegistry, CpuBackend, Operation, SolveMethod};
/// use std::sync::Arc;
///
/// let mut registry = BackendRegistry::new();
/// registry.register(Arc::new(CpuBackend));
///
/// let solvers: Vec<_> = registry
///     .supporting(&Operation::LinearSolve(SolveMethod::Cg))
///     .map(|b| b.name())
///     .collect();
/// assert_eq!(solvers, ["cpu"]);
/// ```
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn ComputeBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding only [`CpuBackend`](crate::CpuBackend).
    pub fn with_cpu() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::CpuBackend));
        registry
    }

    /// Adds a backend, replacing any backend registered under the same
    /// name in place. Returns the replaced backend.
    pub fn register(&mut self, backend: Arc<dyn ComputeBackend>) -> Option<Arc<dyn ComputeBackend>> {
        debug!(backend = backend.name(), "registering backend");
        match self.position(backend.name()) {
            Some(index) => Some(std::mem::replace(&mut self.backends[index], backend)),
            None => {
                self.backends.push(backend);
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn ComputeBackend>> {
        self.position(name).map(|index| self.backends.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ComputeBackend>> {
        self.backends.iter().find(|b| b.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ComputeBackend>> {
        self.backends.iter()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Backends that can run `op`, in registration order.
    ///
    /// The iterator borrows only the registry, so the backends it yields
    /// outlive `op`.
    pub fn supporting(&self, op: &Operation) -> impl Iterator<Item = &Arc<dyn ComputeBackend>> + '_ {
        let op = *op;
        self.backends.iter().filter(move |b| b.supports(&op))
    }

    pub fn of_kind(&self, kind: &BackendKind) -> impl Iterator<Item = &Arc<dyn ComputeBackend>> + '_ {
        let kind = kind.clone();
        self.backends
            .iter()
            .filter(move |b| b.capabilities().kind == kind)
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.backends.iter().position(|b| b.name() == name)
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CpuBackend, SolveMethod};

    #[test]
    fn test_with_cpu() {
        let registry = BackendRegistry::with_cpu();
        assert_eq!(registry.names(), ["cpu"]);
        assert!(registry.contains("cpu"));
        assert!(registry.get("gpu").is_none());
        assert!(BackendRegistry::new().is_empty());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = BackendRegistry::with_cpu();
        let replaced = registry.register(Arc::new(CpuBackend));
        assert_eq!(replaced.map(|b| b.name().to_string()), Some("cpu".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut registry = BackendRegistry::with_cpu();
        assert!(registry.remove("gpu").is_none());
        assert!(registry.remove("cpu").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_by_operation_and_kind() {
        let registry = BackendRegistry::with_cpu();
        let solve = Operation::LinearSolve(SolveMethod::BiCgStab);
        assert_eq!(registry.supporting(&solve).count(), 1);
        assert_eq!(registry.of_kind(&BackendKind::Cpu).count(), 1);
        assert_eq!(registry.of_kind(&BackendKind::Gpu).count(), 0);
    }

    #[test]
    fn test_lookup_outlives_operation() {
        let registry = BackendRegistry::with_cpu();
        let found = {
            let op = Operation::Stack;
            registry.supporting(&op).next()
        };
        assert_eq!(found.map(|b| b.name()), Some("cpu"));
    }

    #[test]
    fn test_debug_lists_names() {
        assert_eq!(format!("{:?}", BackendRegistry::with_cpu()), "[\"cpu\"]");
    }
}
