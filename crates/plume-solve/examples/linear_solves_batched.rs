//! Solves a batch of scaled right-hand sides in one BiCGStab call. Every
//! batch entry converges independently.

use plume_core::{batch, laplace, logging, spatial, Dim, Extrapolation, Tensor};
use plume_solve::{jit_compile_linear, Solve, SolveMethod, SolveTape, Solver};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing()?;

    let lap = jit_compile_linear(|x: &Tensor| laplace(x, 1.0, Extrapolation::Zero))
        .symmetric()
        .named("laplace");
    let scales = Tensor::linspace(0.0, 10.0, Dim::batch("b", 11));
    let y = Tensor::ones(spatial(&[("x", 64)])).try_mul(&scales)?;
    assert_eq!(y.shape().batch(), batch("b", 11));

    let tape = SolveTape::new(false);
    Solver::default().solve_linear(&lap, &y, &Solve::new(SolveMethod::BiCgStab, 1e-5, 1e-5))?;
    let info = tape.get(0).ok_or("solve was not recorded")?;

    println!("method: {}", info.method());
    println!("iterations per entry: {}", info.iteration_counts());
    println!("final residuals: {}", info.residual().norm());
    Ok(())
}
