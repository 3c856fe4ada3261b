//! Linear operators, solve configuration and solve results.
//!
//! Operators are opaque: a solver only ever applies them to tensors. The
//! [`jit_compile_linear`] wrapper marks a closure as linear (and optionally
//! symmetric), which lets [`SolveMethod::Auto`] pick conjugate gradients and
//! lets adjoint solves reuse the forward operator.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use plume_core::{PlumeError, Result, Shape, Tensor};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Operators
// ============================================================================

/// A linear map from tensors to tensors.
///
/// Any `Fn(&Tensor) -> Result<Tensor>` is an operator. Batched inputs must
/// be handled independently per batch entry.
pub trait LinearOperator {
    /// Applies the operator.
    fn apply(&self, x: &Tensor) -> Result<Tensor>;

    /// Returns `true` if the operator equals its own transpose.
    fn is_symmetric(&self) -> bool {
        false
    }

    /// Name used in logs.
    fn name(&self) -> &str {
        "operator"
    }
}

impl<F> LinearOperator for F
where
    F: Fn(&Tensor) -> Result<Tensor>,
{
    fn apply(&self, x: &Tensor) -> Result<Tensor> {
        self(x)
    }
}

/// A closure tagged as a linear function.
#[derive(Clone)]
pub struct LinearFunction<F> {
    f: F,
    symmetric: bool,
    name: String,
}

/// Marks `f` as a linear function of its argument.
///
/// ```
/// use plume_backend::{jit_compile_linear, LinearOperator};
/// use plume_core::{laplace, Extrapolation};
///
/// let op = jit_compile_linear(|x: &plume_core::Tensor| laplace(x, 1.0, Extrapolation::Zero))
///     .symmetric()
///     .named("laplace");
/// assert!(op.is_symmetric());
/// ```
pub fn jit_compile_linear<F>(f: F) -> LinearFunction<F>
where
    F: Fn(&Tensor) -> Result<Tensor>,
{
    LinearFunction {
        f,
        symmetric: false,
        name: "linear_function".to_string(),
    }
}

impl<F> LinearFunction<F> {
    /// Declares the function symmetric.
    pub fn symmetric(mut self) -> Self {
        self.symmetric = true;
        self
    }

    /// Sets the name reported in logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> LinearOperator for LinearFunction<F>
where
    F: Fn(&Tensor) -> Result<Tensor>,
{
    fn apply(&self, x: &Tensor) -> Result<Tensor> {
        (self.f)(x)
    }

    fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for LinearFunction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearFunction")
            .field("name", &self.name)
            .field("symmetric", &self.symmetric)
            .finish()
    }
}

/// Explicit matrix of an operator, built by applying it to unit tensors.
///
/// Rows and columns index the flattened values of `shape`. Only meant for
/// the modest problem sizes adjoint solves of opaque operators see.
///
/// Inputs may carry batch dims outside `shape`. The matrix is applied to
/// each batch entry, so one unbatched slice is enough to trace.
#[derive(Clone, Debug)]
pub struct DenseOperator {
    shape: Shape,
    matrix: Array2<f64>,
    name: String,
}

impl DenseOperator {
    /// Materializes `op` on tensors shaped like `template`.
    ///
    /// Costs one application of `op` per element of `template`.
    pub fn trace(op: &dyn LinearOperator, template: &Shape) -> Result<Self> {
        let n = template.volume();
        let mut matrix = Array2::zeros((n, n));
        let mut unit = vec![0.0; n];
        for col in 0..n {
            unit[col] = 1.0;
            let column = op
                .apply(&Tensor::from_vec(template.clone(), unit.clone())?)?
                .aligned(template)?;
            unit[col] = 0.0;
            for (row, value) in column.iter().enumerate() {
                matrix[[row, col]] = *value;
            }
        }
        Ok(Self {
            shape: template.clone(),
            matrix,
            name: format!("traced({})", op.name()),
        })
    }

    /// The transposed operator.
    pub fn transposed(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            matrix: self.matrix.t().to_owned(),
            name: format!("{}ᵀ", self.name),
        }
    }

    /// The matrix, rows indexing outputs.
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }
}

impl LinearOperator for DenseOperator {
    fn apply(&self, x: &Tensor) -> Result<Tensor> {
        let batch = x.shape().batch().without(&self.shape.names());
        let full = batch.concat(&self.shape)?;
        let rows = Array2::from_shape_vec(
            (batch.volume(), self.shape.volume()),
            x.aligned(&full)?.iter().copied().collect(),
        )
        .map_err(|e| PlumeError::shape_mismatch(full.to_string(), e.to_string()))?;
        let y = rows.dot(&self.matrix.t());
        Tensor::from_vec(full, y.iter().copied().collect())
    }

    fn is_symmetric(&self) -> bool {
        self.matrix == self.matrix.t()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Iterative solver algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolveMethod {
    /// Conjugate gradients for symmetric operators, BiCGStab otherwise.
    #[default]
    Auto,
    /// Conjugate gradients. Requires a symmetric positive definite operator.
    Cg,
    /// Stabilized bi-conjugate gradients.
    BiCgStab,
}

impl SolveMethod {
    /// Picks a concrete method for an operator.
    pub fn resolve(self, op: &dyn LinearOperator) -> SolveMethod {
        match self {
            SolveMethod::Auto if op.is_symmetric() => SolveMethod::Cg,
            SolveMethod::Auto => SolveMethod::BiCgStab,
            other => other,
        }
    }
}

impl fmt::Display for SolveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolveMethod::Auto => "auto",
            SolveMethod::Cg => "CG",
            SolveMethod::BiCgStab => "biCGstab",
        })
    }
}

impl FromStr for SolveMethod {
    type Err = PlumeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(SolveMethod::Auto),
            "CG" => Ok(SolveMethod::Cg),
            "biCG" | "biCGstab" | "biCG-stab" => Ok(SolveMethod::BiCgStab),
            other => Err(PlumeError::invalid(format!("unknown solve method '{other}'"))),
        }
    }
}

/// Configuration of one linear solve.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Solve {
    /// Algorithm.
    pub method: SolveMethod,
    /// Tolerance relative to the largest right-hand-side value.
    pub rel_tol: f64,
    /// Absolute tolerance.
    pub abs_tol: f64,
    /// Initial guess; zeros when absent.
    pub x0: Option<Tensor>,
    /// Iteration cap.
    pub max_iterations: usize,
}

impl Default for Solve {
    fn default() -> Self {
        Self {
            method: SolveMethod::Auto,
            rel_tol: 1e-5,
            abs_tol: 1e-5,
            x0: None,
            max_iterations: 1000,
        }
    }
}

impl Solve {
    /// Creates a configuration with default initial guess and iteration cap.
    pub fn new(method: SolveMethod, rel_tol: f64, abs_tol: f64) -> Self {
        Self {
            method,
            rel_tol,
            abs_tol,
            ..Self::default()
        }
    }

    /// Sets the initial guess.
    pub fn with_x0(mut self, x0: Tensor) -> Self {
        self.x0 = Some(x0);
        self
    }

    /// Sets the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Rejects negative or non-finite tolerances.
    pub fn validate(&self) -> Result<()> {
        for (name, tol) in [("rel_tol", self.rel_tol), ("abs_tol", self.abs_tol)] {
            if !tol.is_finite() || tol < 0.0 {
                return Err(PlumeError::invalid(format!(
                    "{name} must be a non-negative number, got {tol}"
                )));
            }
        }
        Ok(())
    }

    /// Per-batch tolerance on the max-abs residual:
    /// `max(rel_tol * max|rhs|, abs_tol)`.
    pub fn tolerance(&self, rhs: &Tensor) -> Tensor {
        let inner = rhs.shape().non_batch();
        let names = inner.names();
        let abs_tol = self.abs_tol;
        rhs.max_abs_over(&names)
            .map(|m| (self.rel_tol * m).max(abs_tol))
    }
}

// ============================================================================
// Results
// ============================================================================

/// Receives residual norms while a solve runs.
pub trait SolveMonitor {
    /// Called once per iteration with the max-abs residual of every batch
    /// entry.
    fn on_iteration(&mut self, iteration: usize, residual: &Tensor);
}

impl SolveMonitor for () {
    fn on_iteration(&mut self, _iteration: usize, _residual: &Tensor) {}
}

/// Monitor that keeps every residual it is shown.
#[derive(Clone, Debug, Default)]
pub struct ResidualHistory {
    pub residuals: Vec<Tensor>,
}

impl SolveMonitor for ResidualHistory {
    fn on_iteration(&mut self, _iteration: usize, residual: &Tensor) {
        self.residuals.push(residual.clone());
    }
}

/// Outcome of an iterative solve.
///
/// Per-batch quantities are tensors over the right-hand side's batch
/// dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearSolution {
    /// The solution.
    pub x: Tensor,
    /// Concrete method that ran.
    pub method: SolveMethod,
    /// Iterations performed per batch entry.
    pub iterations: Tensor,
    /// Final max-abs residual per batch entry.
    pub residual: Tensor,
    /// 1 where the entry met its tolerance.
    pub converged: Tensor,
    /// 1 where the residual became non-finite.
    pub diverged: Tensor,
}

impl LinearSolution {
    /// Largest per-entry iteration count.
    pub fn max_iterations(&self) -> usize {
        self.iterations.data().iter().fold(0.0f64, |a, b| a.max(*b)) as usize
    }

    /// Returns `true` if every batch entry converged.
    pub fn all_converged(&self) -> bool {
        self.converged.data().iter().all(|c| *c != 0.0)
    }

    /// Returns `true` if any batch entry diverged.
    pub fn any_diverged(&self) -> bool {
        self.diverged.data().iter().any(|d| *d != 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::{batch, spatial};

    #[test]
    fn test_method_parsing() {
        assert_eq!("CG".parse::<SolveMethod>().unwrap(), SolveMethod::Cg);
        assert_eq!("biCG".parse::<SolveMethod>().unwrap(), SolveMethod::BiCgStab);
        assert_eq!("biCGstab".parse::<SolveMethod>().unwrap(), SolveMethod::BiCgStab);
        assert!("GMRES".parse::<SolveMethod>().is_err());
    }

    #[test]
    fn test_auto_resolution() {
        let plain = |x: &Tensor| -> Result<Tensor> { Ok(x.clone()) };
        let sym = jit_compile_linear(|x: &Tensor| Ok(x.scale(2.0))).symmetric();
        assert_eq!(SolveMethod::Auto.resolve(&plain), SolveMethod::BiCgStab);
        assert_eq!(SolveMethod::Auto.resolve(&sym), SolveMethod::Cg);
        assert_eq!(SolveMethod::BiCgStab.resolve(&sym), SolveMethod::BiCgStab);
    }

    #[test]
    fn test_tolerance_per_batch() {
        let rhs = Tensor::from_vec(
            batch("b", 2).concat(&spatial(&[("x", 2)])).unwrap(),
            vec![1.0, -4.0, 0.0, 0.0],
        )
        .unwrap();
        let solve = Solve::new(SolveMethod::Cg, 0.1, 1e-3);
        let tol = solve.tolerance(&rhs);
        assert_eq!(tol.shape().names(), vec!["b"]);
        assert!((tol.values()[0] - 0.4).abs() < 1e-12);
        assert_eq!(tol.values()[1], 1e-3);
    }

    #[test]
    fn test_validate_rejects_negative_tolerance() {
        assert!(Solve::new(SolveMethod::Cg, -1.0, 0.0).validate().is_err());
        assert!(Solve::default().validate().is_ok());
    }

    #[test]
    fn test_dense_operator_transpose() {
        let shape = spatial(&[("x", 3)]);
        let shift = |x: &Tensor| plume_core::stencil::shifted(x, "x", 1, plume_core::Extrapolation::Zero);
        let dense = DenseOperator::trace(&shift, &shape).unwrap();
        assert!(!dense.is_symmetric());
        let x = Tensor::from_vec(shape.clone(), vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(dense.apply(&x).unwrap().values(), vec![2.0, 3.0, 0.0]);
        assert_eq!(dense.transposed().apply(&x).unwrap().values(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_dense_operator_applies_per_batch_entry() {
        let shape = spatial(&[("x", 3)]);
        let shift = |x: &Tensor| plume_core::stencil::shifted(x, "x", 1, plume_core::Extrapolation::Zero);
        let dense = DenseOperator::trace(&shift, &shape).unwrap();
        let x = Tensor::from_vec(
            batch("b", 2).concat(&shape).unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
        .unwrap();
        let y = dense.apply(&x).unwrap();
        assert_eq!(y.shape().names(), vec!["b", "x"]);
        assert_eq!(y.values(), vec![2.0, 3.0, 0.0, 5.0, 6.0, 0.0]);
        assert_eq!(dense.matrix().dim(), (3, 3));
    }

    #[test]
    fn test_residual_history_records() {
        let mut history = ResidualHistory::default();
        history.on_iteration(1, &Tensor::scalar(0.5));
        history.on_iteration(2, &Tensor::scalar(0.25));
        assert_eq!(history.residuals.len(), 2);
    }
}
