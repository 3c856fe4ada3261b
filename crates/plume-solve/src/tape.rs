//! Scoped recording of linear solves.
//!
//! A [`SolveTape`] is a guard: creating it makes it the innermost recorder
//! on the current thread, dropping it (also while unwinding) removes it
//! again. Every solve issued while a tape is active is appended to the
//! innermost tape only.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::info::SolveInfo;

#[derive(Debug, Default)]
struct Records {
    record_trajectories: bool,
    solves: Vec<SolveInfo>,
    gradient_solves: Vec<SolveInfo>,
}

thread_local! {
    static TAPES: RefCell<Vec<Rc<RefCell<Records>>>> = const { RefCell::new(Vec::new()) };
}

/// Records every linear solve issued on this thread while it is alive.
///
/// # Example
///
/// ```
/// use plume_backend::{jit_compile_linear, Solve, SolveMethod};
/// use plume_core::{laplace, spatial, Extrapolation, Tensor};
/// use plume_solve::{solve_linear, SolveTape};
///
/// let op = jit_compile_linear(|x: &Tensor| laplace(x, 1.0, Extrapolation::Zero)).symmetric();
/// let rhs = Tensor::ones(spatial(&[("x", 16)]));
///
/// let tape = SolveTape::new(true);
/// solve_linear(&op, &rhs, &Solve::new(SolveMethod::Cg, 0.0, 1e-8)).unwrap();
/// let info = tape.get(0).unwrap();
/// assert_eq!(info.residual().trajectory().unwrap().len(), info.iterations());
/// ```
#[derive(Debug)]
pub struct SolveTape {
    records: Rc<RefCell<Records>>,
    // Tapes belong to the thread that created them.
    _thread: PhantomData<*const ()>,
}

impl SolveTape {
    /// Starts recording. With `record_trajectories`, every record keeps
    /// the residual of each iteration; otherwise only the final residual.
    pub fn new(record_trajectories: bool) -> Self {
        let records = Rc::new(RefCell::new(Records {
            record_trajectories,
            ..Records::default()
        }));
        TAPES.with(|tapes| tapes.borrow_mut().push(Rc::clone(&records)));
        Self {
            records,
            _thread: PhantomData,
        }
    }

    pub fn record_trajectories(&self) -> bool {
        self.records.borrow().record_trajectories
    }

    /// Number of recorded forward solves.
    pub fn len(&self) -> usize {
        self.records.borrow().solves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().solves.is_empty()
    }

    /// The `index`-th solve, in issuance order.
    pub fn get(&self, index: usize) -> Option<SolveInfo> {
        self.records.borrow().solves.get(index).cloned()
    }

    pub fn solves(&self) -> Vec<SolveInfo> {
        self.records.borrow().solves.clone()
    }

    /// Adjoint solves issued by [`solve_linear_gradient`](crate::solve_linear_gradient).
    pub fn gradient_solves(&self) -> Vec<SolveInfo> {
        self.records.borrow().gradient_solves.clone()
    }

    /// Stops recording and returns the forward solves.
    pub fn finish(self) -> Vec<SolveInfo> {
        self.solves()
    }
}

impl Drop for SolveTape {
    fn drop(&mut self) {
        // The thread-local may already be gone during thread teardown.
        let _ = TAPES.try_with(|tapes| {
            let mut tapes = tapes.borrow_mut();
            if let Some(position) = tapes.iter().rposition(|t| Rc::ptr_eq(t, &self.records)) {
                tapes.remove(position);
            }
        });
    }
}

/// Whether a tape is active and, if so, whether it wants trajectories.
pub(crate) fn active_recording() -> Option<bool> {
    TAPES.with(|tapes| {
        tapes
            .borrow()
            .last()
            .map(|records| records.borrow().record_trajectories)
    })
}

/// Appends to the innermost tape. Returns `false` when none is active.
pub(crate) fn record(info: SolveInfo, gradient: bool) -> bool {
    let innermost = TAPES.with(|tapes| tapes.borrow().last().cloned());
    match innermost {
        Some(records) => {
            let mut records = records.borrow_mut();
            if gradient {
                records.gradient_solves.push(info);
            } else {
                records.solves.push(info);
            }
            true
        }
        None => false,
    }
}

#[cfg(test)]
pub(crate) fn depth() -> usize {
    TAPES.with(|tapes| tapes.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_tapes_restore_outer() {
        assert_eq!(active_recording(), None);
        let outer = SolveTape::new(false);
        assert_eq!(active_recording(), Some(false));
        {
            let _inner = SolveTape::new(true);
            assert_eq!(active_recording(), Some(true));
            assert_eq!(depth(), 2);
        }
        assert_eq!(active_recording(), Some(false));
        assert!(!outer.record_trajectories());
        drop(outer);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_out_of_order_drop() {
        let outer = SolveTape::new(false);
        let inner = SolveTape::new(true);
        drop(outer);
        assert_eq!(active_recording(), Some(true));
        drop(inner);
        assert_eq!(active_recording(), None);
    }

    #[test]
    fn test_tape_popped_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _tape = SolveTape::new(true);
            panic!("solver blew up");
        });
        assert!(result.is_err());
        assert_eq!(depth(), 0);
    }
}
