//! Records of finished linear solves.

use std::ops::Range;

use plume_backend::{LinearSolution, Solve, SolveMethod};
use plume_core::Tensor;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Residual norms, one per solver iteration.
///
/// Each entry holds the max-abs residual of every batch entry at that
/// iteration.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trajectory {
    residuals: Vec<Tensor>,
}

impl Trajectory {
    pub fn new(residuals: Vec<Tensor>) -> Self {
        Self { residuals }
    }

    pub fn len(&self) -> usize {
        self.residuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residuals.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tensor> {
        self.residuals.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tensor> {
        self.residuals.iter()
    }

    pub fn as_slice(&self) -> &[Tensor] {
        &self.residuals
    }

    /// The first `n` iterations, or all of them if there are fewer.
    pub fn first(&self, n: usize) -> Trajectory {
        self.slice(0..n)
    }

    /// The last `n` iterations, or all of them if there are fewer.
    pub fn last(&self, n: usize) -> Trajectory {
        let len = self.len();
        self.slice(len.saturating_sub(n)..len)
    }

    /// Iterations in `range`, clamped to the recorded length.
    pub fn slice(&self, range: Range<usize>) -> Trajectory {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Trajectory::new(self.residuals[start..end].to_vec())
    }

    /// Largest residual over the batch at each iteration.
    pub fn max_values(&self) -> Vec<f64> {
        self.residuals.iter().map(Tensor::max_abs).collect()
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Tensor;
    type IntoIter = std::slice::Iter<'a, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.residuals.iter()
    }
}

/// Final residual of a solve and, if recorded, its history.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Residual {
    norm: Tensor,
    trajectory: Option<Trajectory>,
}

impl Residual {
    /// Max-abs residual per batch entry after the last iteration.
    pub fn norm(&self) -> &Tensor {
        &self.norm
    }

    /// Largest final residual over all batch entries.
    pub fn max(&self) -> f64 {
        self.norm.max_abs()
    }

    /// Per-iteration history; `None` unless the tape records trajectories.
    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.trajectory.as_ref()
    }
}

/// Everything known about one finished linear solve.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolveInfo {
    solve: Solve,
    method: SolveMethod,
    x: Tensor,
    iteration_counts: Tensor,
    residual: Residual,
    converged: Tensor,
    diverged: Tensor,
}

impl SolveInfo {
    pub(crate) fn new(solve: &Solve, solution: LinearSolution, trajectory: Option<Trajectory>) -> Self {
        Self {
            solve: solve.clone(),
            method: solution.method,
            x: solution.x,
            iteration_counts: solution.iterations,
            residual: Residual {
                norm: solution.residual,
                trajectory,
            },
            converged: solution.converged,
            diverged: solution.diverged,
        }
    }

    /// The configuration the solve ran with.
    pub fn solve(&self) -> &Solve {
        &self.solve
    }

    /// The method actually used; never [`SolveMethod::Auto`].
    pub fn method(&self) -> SolveMethod {
        self.method
    }

    /// The final estimate, also for failed solves.
    pub fn x(&self) -> &Tensor {
        &self.x
    }

    /// Largest iteration count over all batch entries.
    pub fn iterations(&self) -> usize {
        self.iteration_counts.max_abs() as usize
    }

    /// Iterations per batch entry.
    pub fn iteration_counts(&self) -> &Tensor {
        &self.iteration_counts
    }

    pub fn residual(&self) -> &Residual {
        &self.residual
    }

    /// Every batch entry reached the tolerance.
    pub fn converged(&self) -> bool {
        self.converged.data().iter().all(|c| *c != 0.0)
    }

    /// Some batch entry produced a non-finite residual.
    pub fn diverged(&self) -> bool {
        self.diverged.data().iter().any(|d| *d != 0.0)
    }

    /// Convergence per batch entry (1 or 0).
    pub fn converged_entries(&self) -> &Tensor {
        &self.converged
    }
}
