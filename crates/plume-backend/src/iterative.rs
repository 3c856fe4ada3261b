//! Batched Krylov solvers.
//!
//! Every batch entry of the right-hand side is an independent system. Inner
//! products reduce over all non-batch dimensions, so step sizes are per-batch
//! tensors that broadcast back onto the iterates. Entries that have met their
//! tolerance are frozen by zeroing their step sizes.

use plume_core::{Result, Shape, Tensor};
use tracing::trace;

use crate::linear::{LinearOperator, LinearSolution, Solve, SolveMethod, SolveMonitor};

struct Problem<'a> {
    rhs: &'a Tensor,
    /// Names of the dimensions inner products reduce over.
    inner: Vec<String>,
    batch: Shape,
    tolerance: Tensor,
}

impl<'a> Problem<'a> {
    fn new(rhs: &'a Tensor, solve: &Solve) -> Self {
        Self {
            rhs,
            inner: rhs
                .shape()
                .non_batch()
                .names()
                .into_iter()
                .map(String::from)
                .collect(),
            batch: rhs.shape().batch(),
            tolerance: solve.tolerance(rhs),
        }
    }

    fn dims(&self) -> Vec<&str> {
        self.inner.iter().map(String::as_str).collect()
    }

    fn dot(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        a.dot(b, &self.dims())
    }

    fn residual_norm(&self, r: &Tensor) -> Tensor {
        r.max_abs_over(&self.dims())
    }

    fn converged(&self, residual: &Tensor) -> Result<Tensor> {
        residual.less_equal(&self.tolerance)
    }

    fn initial_guess(&self, solve: &Solve) -> Result<Tensor> {
        match &solve.x0 {
            Some(x0) => x0.broadcast_to(self.rhs.shape()),
            None => Ok(Tensor::zeros(self.rhs.shape().clone()).cast(self.rhs.dtype())),
        }
    }
}

/// Running per-batch bookkeeping shared by both solvers.
struct Progress {
    iterations: Tensor,
    residual: Tensor,
    converged: Tensor,
}

impl Progress {
    fn start(problem: &Problem<'_>, r: &Tensor) -> Result<Self> {
        let residual = problem.residual_norm(r);
        Ok(Self {
            iterations: Tensor::zeros(problem.batch.clone()),
            converged: problem.converged(&residual)?,
            residual,
        })
    }

    fn all_converged(&self) -> bool {
        self.converged.data().iter().all(|c| *c != 0.0)
    }

    fn active(&self) -> Tensor {
        self.converged.map(|c| 1.0 - c)
    }

    /// Records one iteration; returns `false` once a residual is non-finite.
    fn advance(
        &mut self,
        problem: &Problem<'_>,
        active: &Tensor,
        r: &Tensor,
        iteration: usize,
        monitor: &mut dyn SolveMonitor,
    ) -> Result<bool> {
        self.iterations = self.iterations.try_add(active)?;
        self.residual = problem.residual_norm(r);
        self.converged = problem.converged(&self.residual)?;
        monitor.on_iteration(iteration, &self.residual);
        trace!(iteration, residual = %self.residual, "solver iteration");
        Ok(self.residual.is_finite())
    }

    fn finish(self, x: Tensor, method: SolveMethod) -> LinearSolution {
        let diverged = self
            .residual
            .map(|r| if r.is_finite() { 0.0 } else { 1.0 });
        LinearSolution {
            x,
            method,
            iterations: self.iterations,
            residual: self.residual,
            converged: self.converged,
            diverged,
        }
    }
}

/// Conjugate gradients.
pub fn conjugate_gradient(
    op: &dyn LinearOperator,
    rhs: &Tensor,
    solve: &Solve,
    monitor: &mut dyn SolveMonitor,
) -> Result<LinearSolution> {
    let problem = Problem::new(rhs, solve);
    let mut x = problem.initial_guess(solve)?;
    let mut r = rhs.try_sub(&op.apply(&x)?)?;
    let mut p = r.clone();
    let mut rr = problem.dot(&r, &r)?;
    let mut progress = Progress::start(&problem, &r)?;

    for iteration in 1..=solve.max_iterations {
        if progress.all_converged() {
            break;
        }
        let active = progress.active();
        let ap = op.apply(&p)?;
        let alpha = rr.safe_div(&problem.dot(&p, &ap)?)?.try_mul(&active)?;
        x = x.try_add(&p.try_mul(&alpha)?)?;
        r = r.try_sub(&ap.try_mul(&alpha)?)?;
        let rr_next = problem.dot(&r, &r)?;
        let beta = rr_next.safe_div(&rr)?;
        p = r.try_add(&p.try_mul(&beta)?)?;
        rr = rr_next;
        if !progress.advance(&problem, &active, &r, iteration, monitor)? {
            break;
        }
    }
    Ok(progress.finish(x, SolveMethod::Cg))
}

/// Stabilized bi-conjugate gradients.
pub fn bicgstab(
    op: &dyn LinearOperator,
    rhs: &Tensor,
    solve: &Solve,
    monitor: &mut dyn SolveMonitor,
) -> Result<LinearSolution> {
    let problem = Problem::new(rhs, solve);
    let mut x = problem.initial_guess(solve)?;
    let mut r = rhs.try_sub(&op.apply(&x)?)?;
    let r_hat = r.clone();
    let batch = problem.batch.clone();
    let mut rho = Tensor::ones(batch.clone());
    let mut alpha = Tensor::ones(batch.clone());
    let mut omega = Tensor::ones(batch);
    let mut v = Tensor::zeros(rhs.shape().clone());
    let mut p = Tensor::zeros(rhs.shape().clone());
    let mut progress = Progress::start(&problem, &r)?;

    for iteration in 1..=solve.max_iterations {
        if progress.all_converged() {
            break;
        }
        let active = progress.active();
        let rho_next = problem.dot(&r_hat, &r)?;
        let beta = rho_next.safe_div(&rho)?.try_mul(&alpha.safe_div(&omega)?)?;
        p = r.try_add(&p.try_sub(&v.try_mul(&omega)?)?.try_mul(&beta)?)?;
        v = op.apply(&p)?;
        alpha = rho_next
            .safe_div(&problem.dot(&r_hat, &v)?)?
            .try_mul(&active)?;
        let s = r.try_sub(&v.try_mul(&alpha)?)?;
        let t = op.apply(&s)?;
        omega = problem
            .dot(&t, &s)?
            .safe_div(&problem.dot(&t, &t)?)?
            .try_mul(&active)?;
        x = x
            .try_add(&p.try_mul(&alpha)?)?
            .try_add(&s.try_mul(&omega)?)?;
        r = s.try_sub(&t.try_mul(&omega)?)?;
        rho = rho_next;
        if !progress.advance(&problem, &active, &r, iteration, monitor)? {
            break;
        }
    }
    Ok(progress.finish(x, SolveMethod::BiCgStab))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::{jit_compile_linear, ResidualHistory};
    use plume_core::{batch, laplace, spatial, Dim, Extrapolation};

    fn neg_laplace(x: &Tensor) -> Result<Tensor> {
        Ok(-laplace(x, 1.0, Extrapolation::Zero)?)
    }

    fn rhs() -> Tensor {
        Tensor::from_vec(spatial(&[("x", 6)]), vec![1.0, 0.0, -2.0, 3.0, 0.5, -1.0]).unwrap()
    }

    #[test]
    fn test_cg_solves_laplace() {
        let b = rhs();
        let solve = Solve::new(SolveMethod::Cg, 0.0, 1e-10).with_max_iterations(50);
        let solution = conjugate_gradient(&neg_laplace, &b, &solve, &mut ()).unwrap();
        assert!(solution.all_converged());
        // CG on an n-dimensional SPD system terminates in at most n steps.
        assert!(solution.max_iterations() <= 6);
        let check = neg_laplace(&solution.x).unwrap();
        assert!(check.all_close(&b, 1e-8));
    }

    #[test]
    fn test_bicgstab_solves_nonsymmetric() {
        // Upwind-like operator: 2 x_i - x_{i-1}.
        let op = jit_compile_linear(|x: &Tensor| {
            let left = plume_core::stencil::shifted(x, "x", -1, Extrapolation::Zero)?;
            x.scale(2.0).try_sub(&left)
        });
        let b = rhs();
        let solve = Solve::new(SolveMethod::BiCgStab, 0.0, 1e-10).with_max_iterations(100);
        let solution = bicgstab(&op, &b, &solve, &mut ()).unwrap();
        assert!(solution.all_converged());
        assert!(op.apply(&solution.x).unwrap().all_close(&b, 1e-8));
    }

    #[test]
    fn test_batched_entries_are_independent() {
        let b0 = rhs();
        let b1 = rhs().scale(0.0);
        let b = Tensor::stack(&[b0.clone(), b1], Dim::batch("b", 0)).unwrap();
        let solve = Solve::new(SolveMethod::Cg, 0.0, 1e-10).with_max_iterations(50);
        let solution = conjugate_gradient(&neg_laplace, &b, &solve, &mut ()).unwrap();
        assert_eq!(solution.iterations.shape(), &batch("b", 2));
        // The zero right-hand side is converged from the start.
        assert_eq!(solution.iterations.values()[1], 0.0);
        let single = conjugate_gradient(&neg_laplace, &b0, &solve, &mut ()).unwrap();
        assert!(solution.x.select("b", 0).unwrap().all_close(&single.x, 1e-10));
    }

    #[test]
    fn test_monitor_sees_every_iteration() {
        let b = rhs();
        let solve = Solve::new(SolveMethod::Cg, 0.0, 1e-10).with_max_iterations(3);
        let mut history = ResidualHistory::default();
        let solution = conjugate_gradient(&neg_laplace, &b, &solve, &mut history).unwrap();
        assert_eq!(solution.max_iterations(), 3);
        assert_eq!(history.residuals.len(), 3);
        assert!(!solution.all_converged());
        assert!(!solution.any_diverged());
    }

    #[test]
    fn test_initial_guess_at_solution() {
        let b = rhs();
        let exact = conjugate_gradient(
            &neg_laplace,
            &b,
            &Solve::new(SolveMethod::Cg, 0.0, 1e-12).with_max_iterations(50),
            &mut (),
        )
        .unwrap()
        .x;
        let solve = Solve::new(SolveMethod::BiCgStab, 0.0, 1e-6).with_x0(exact);
        let solution = bicgstab(&neg_laplace, &b, &solve, &mut ()).unwrap();
        assert_eq!(solution.max_iterations(), 0);
    }

    #[test]
    fn test_nan_rhs_diverges() {
        let b = Tensor::from_vec(spatial(&[("x", 3)]), vec![1.0, f64::NAN, 0.0]).unwrap();
        let solve = Solve::new(SolveMethod::Cg, 0.0, 1e-10).with_max_iterations(10);
        let solution = conjugate_gradient(&neg_laplace, &b, &solve, &mut ()).unwrap();
        assert!(solution.any_diverged());
        assert!(!solution.all_converged());
    }
}
