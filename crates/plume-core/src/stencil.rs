//! Boundary handling and finite-difference stencils on spatial dimensions.

use std::fmt;
use std::str::FromStr;

use ndarray::{concatenate, ArrayD, Axis, Slice};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PlumeError, Result};
use crate::shape::DimKind;
use crate::tensor::Tensor;

/// How values continue beyond the edge of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Extrapolation {
    /// Values outside are 0.
    #[default]
    Zero,
    /// Outside values repeat the nearest edge value.
    ZeroGradient,
    /// The grid wraps around.
    Periodic,
}

impl fmt::Display for Extrapolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Extrapolation::Zero => "zero",
            Extrapolation::ZeroGradient => "zero-gradient",
            Extrapolation::Periodic => "periodic",
        })
    }
}

impl FromStr for Extrapolation {
    type Err = PlumeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zero" => Ok(Extrapolation::Zero),
            "zero-gradient" => Ok(Extrapolation::ZeroGradient),
            "periodic" => Ok(Extrapolation::Periodic),
            other => Err(PlumeError::invalid(format!("unknown extrapolation '{other}'"))),
        }
    }
}

impl Extrapolation {
    /// Maps a possibly out-of-range index back into `0..n`.
    ///
    /// Returns `None` where the extrapolated value is 0.
    pub fn source_index(self, index: isize, n: usize) -> Option<usize> {
        let n_signed = n as isize;
        if (0..n_signed).contains(&index) {
            return Some(index as usize);
        }
        match self {
            Extrapolation::Zero => None,
            Extrapolation::ZeroGradient => Some(index.clamp(0, n_signed - 1) as usize),
            Extrapolation::Periodic => Some(index.rem_euclid(n_signed) as usize),
        }
    }

    /// The one-cell slab just outside the edge of `data` along `axis`.
    fn boundary_slab(self, data: &ArrayD<f64>, axis: Axis, upper: bool) -> ArrayD<f64> {
        let n = data.len_of(axis) as isize;
        let (edge, wrapped) = if upper { (n - 1, 0) } else { (0, n - 1) };
        match self {
            Extrapolation::Zero => data.slice_axis(axis, Slice::from(0..1)).mapv(|_| 0.0),
            Extrapolation::ZeroGradient => data.slice_axis(axis, Slice::from(edge..edge + 1)).to_owned(),
            Extrapolation::Periodic => data
                .slice_axis(axis, Slice::from(wrapped..wrapped + 1))
                .to_owned(),
        }
    }
}

/// Returns the neighbor values `x[i + offset]` along a spatial dimension,
/// with `offset` either `1` or `-1`.
pub fn shifted(x: &Tensor, dim: &str, offset: isize, extrapolation: Extrapolation) -> Result<Tensor> {
    let axis = Axis(x.shape().require(dim)?);
    let data = x.data();
    let n = data.len_of(axis) as isize;
    let result = match offset {
        1 => {
            let slab = extrapolation.boundary_slab(data, axis, true);
            let inner = data.slice_axis(axis, Slice::from(1..n));
            concatenate(axis, &[inner, slab.view()])
        }
        -1 => {
            let slab = extrapolation.boundary_slab(data, axis, false);
            let inner = data.slice_axis(axis, Slice::from(0..n - 1));
            concatenate(axis, &[slab.view(), inner])
        }
        other => {
            return Err(PlumeError::invalid(format!(
                "stencil offsets must be 1 or -1, got {other}"
            )))
        }
    }
    .map_err(|e| PlumeError::shape_mismatch(dim, e.to_string()))?;
    Tensor::from_array(x.shape().clone(), result).map(|t| t.cast(x.dtype()))
}

/// Discrete Laplacian over every spatial dimension of `x` with cell size
/// `dx`.
///
/// Batch and channel dimensions are treated independently.
pub fn laplace(x: &Tensor, dx: f64, extrapolation: Extrapolation) -> Result<Tensor> {
    if dx <= 0.0 {
        return Err(PlumeError::invalid(format!("cell size must be positive, got {dx}")));
    }
    let spatial = x.shape().of_kind(DimKind::Spatial);
    let mut result = Tensor::zeros(x.shape().clone()).cast(x.dtype());
    for dim in spatial.iter() {
        let lower = shifted(x, dim.name(), -1, extrapolation)?;
        let upper = shifted(x, dim.name(), 1, extrapolation)?;
        let second = lower.try_add(&upper)?.try_sub(&x.scale(2.0))?;
        result = result.try_add(&second)?;
    }
    Ok(result.scale(1.0 / (dx * dx)))
}
