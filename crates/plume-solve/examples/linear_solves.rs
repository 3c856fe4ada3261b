//! Solves a 1D Poisson problem with BiCGStab and prints the residual
//! history.
//!
//! Run with `RUST_LOG=debug` to see the solver's log output.

use plume_core::{laplace, logging, spatial, Extrapolation, Tensor};
use plume_solve::{jit_compile_linear, solve_linear, Solve, SolveMethod, SolveTape};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing()?;

    let lap = jit_compile_linear(|x: &Tensor| laplace(x, 1.0, Extrapolation::Zero)).named("laplace");
    let y = Tensor::ones(spatial(&[("x", 2 * 1024)]));
    let solve = Solve::new(SolveMethod::BiCgStab, 0.0, 1e-6)
        .with_x0(y.scale(0.0))
        .with_max_iterations(1_000_000);

    let tape = SolveTape::new(true);
    let x = solve_linear(&lap, &y, &solve)?;
    let solves = tape.finish();

    let info = &solves[0];
    println!("{} iterations. Residuals:", info.iterations());
    if let Some(trajectory) = info.residual().trajectory() {
        for residual in &trajectory.first(4) {
            println!("{residual}");
        }
        println!("...");
        for residual in &trajectory.last(4) {
            println!("{residual}");
        }
    }
    println!("max |x| = {}", x.max_abs());
    Ok(())
}
