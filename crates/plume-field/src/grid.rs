//! Values sampled at the cell centers of a regular grid.

use ndarray::{ArrayD, Dimension, IxDyn};
use plume_core::{DType, Extrapolation, PlumeError, Result, Shape, Tensor, VECTOR_DIM};
use plume_geom::{GridCell, AXES};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A grid of values over the axis-aligned domain `lower..upper`.
///
/// The spatial dimensions of `values` are the resolution and must be named
/// after the axes they run along. Any other dimensions (batch, `vector`
/// for staggered-free vector fields, ...) ride along unchanged.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CenteredGrid {
    values: Tensor,
    cells: GridCell,
    extrapolation: Extrapolation,
}

impl CenteredGrid {
    pub fn new(
        values: Tensor,
        lower: impl Into<Tensor>,
        upper: impl Into<Tensor>,
        extrapolation: Extrapolation,
    ) -> Result<Self> {
        let cells = GridCell::new(values.shape().spatial(), lower, upper)?;
        Ok(Self {
            values,
            cells,
            extrapolation,
        })
    }

    /// A grid with every cell set to `value`.
    pub fn uniform(
        resolution: Shape,
        lower: impl Into<Tensor>,
        upper: impl Into<Tensor>,
        value: f64,
        extrapolation: Extrapolation,
    ) -> Result<Self> {
        Self::new(Tensor::full(resolution, value), lower, upper, extrapolation)
    }

    pub fn values(&self) -> &Tensor {
        &self.values
    }

    pub fn shape(&self) -> &Shape {
        self.values.shape()
    }

    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    pub fn resolution(&self) -> &Shape {
        self.cells.resolution()
    }

    pub fn extrapolation(&self) -> Extrapolation {
        self.extrapolation
    }

    pub fn spatial_rank(&self) -> usize {
        self.cells.spatial_rank()
    }

    /// Cell size per axis.
    pub fn dx(&self) -> Result<Tensor> {
        self.cells.dx()
    }

    /// The grid's cells as a geometry.
    pub fn elements(&self) -> &GridCell {
        &self.cells
    }

    /// Cell centers, shaped `resolution` plus a `vector` channel.
    pub fn points(&self) -> Result<Tensor> {
        self.cells.center()
    }

    /// Same domain and resolution as `other`.
    pub fn same_domain(&self, other: &CenteredGrid) -> bool {
        self.cells == other.cells
    }

    /// Replaces the values, keeping domain and extrapolation.
    pub fn with_values(&self, values: Tensor) -> Result<Self> {
        if &values.shape().spatial() != self.resolution() {
            return Err(PlumeError::shape_mismatch(
                self.resolution().to_string(),
                format!("new values have spatial shape {}", values.shape().spatial()),
            ));
        }
        Ok(Self {
            values,
            cells: self.cells.clone(),
            extrapolation: self.extrapolation,
        })
    }

    pub fn with_extrapolation(&self, extrapolation: Extrapolation) -> Self {
        Self {
            extrapolation,
            ..self.clone()
        }
    }

    /// Cell-wise sum of two grids on the same domain.
    pub fn try_add(&self, other: &CenteredGrid) -> Result<Self> {
        self.require_same_domain(other)?;
        self.with_values(self.values.try_add(&other.values)?)
    }

    /// Cell-wise difference of two grids on the same domain.
    pub fn try_sub(&self, other: &CenteredGrid) -> Result<Self> {
        self.require_same_domain(other)?;
        self.with_values(self.values.try_sub(&other.values)?)
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self {
            values: self.values.scale(factor),
            ..self.clone()
        }
    }

    fn require_same_domain(&self, other: &CenteredGrid) -> Result<()> {
        if self.same_domain(other) {
            Ok(())
        } else {
            Err(PlumeError::invalid(format!(
                "grids over different domains ({} and {})",
                self.resolution(),
                other.resolution()
            )))
        }
    }

    /// Multilinear interpolation at `points`.
    ///
    /// `points` carries a `vector` channel matching the grid's rank. The
    /// result has the points' other dimensions plus every non-spatial
    /// dimension of the values. Cells beyond the edge follow the grid's
    /// extrapolation.
    pub fn sample_at(&self, points: &Tensor) -> Result<Tensor> {
        let rank = self.spatial_rank();
        let point_rank = points.shape().size_of(VECTOR_DIM).ok_or_else(|| {
            PlumeError::shape_mismatch(VECTOR_DIM, format!("no vector channel in {}", points.shape()))
        })?;
        if point_rank != rank {
            return Err(PlumeError::shape_mismatch(
                VECTOR_DIM,
                format!("sampling a rank {rank} grid at rank {point_rank} points"),
            ));
        }
        let axes = &AXES[..rank];
        let extra = self.values.shape().without(axes);
        let out_shape = points.shape().without(&[VECTOR_DIM]).merge(&extra)?;

        let lower = self.cells.lower().values();
        let dx = self.dx()?.values();
        let sizes: Vec<usize> = axes
            .iter()
            .map(|a| self.resolution().size_of(a).unwrap_or(1))
            .collect();
        // Continuous cell index along each axis, broadcast onto the output.
        let coords = (0..rank)
            .map(|k| {
                points
                    .select(VECTOR_DIM, k)?
                    .offset(-lower[k])
                    .scale(1.0 / dx[k])
                    .offset(-0.5)
                    .aligned(&out_shape)
            })
            .collect::<Result<Vec<_>>>()?;

        // Source axes: extra dims in output order, then the grid axes.
        let mut perm = Vec::with_capacity(self.values.shape().rank());
        let mut extra_positions = Vec::with_capacity(extra.rank());
        for (position, dim) in out_shape.iter().enumerate() {
            if extra.contains(dim.name()) {
                perm.push(self.values.shape().require(dim.name())?);
                extra_positions.push(position);
            }
        }
        for axis in axes {
            perm.push(self.values.shape().require(axis)?);
        }
        let source = self
            .values
            .data()
            .clone()
            .permuted_axes(IxDyn(&perm))
            .as_standard_layout()
            .into_owned();

        let mut out = ArrayD::<f64>::zeros(IxDyn(&out_shape.sizes()));
        let mut index = vec![0usize; perm.len()];
        let mut cell = [0.0f64; 3];
        for (out_index, value) in out.indexed_iter_mut() {
            let at = out_index.slice();
            for (slot, &position) in extra_positions.iter().enumerate() {
                index[slot] = at[position];
            }
            for (k, c) in coords.iter().enumerate() {
                cell[k] = c[at];
            }
            let mut total = 0.0;
            'corners: for corner in 0..(1usize << rank) {
                let mut weight = 1.0;
                for k in 0..rank {
                    let base = cell[k].floor();
                    let frac = cell[k] - base;
                    let upper = (corner >> k) & 1 == 1;
                    weight *= if upper { frac } else { 1.0 - frac };
                    let neighbor = base as isize + isize::from(upper);
                    match self.extrapolation.source_index(neighbor, sizes[k]) {
                        Some(i) => index[extra_positions.len() + k] = i,
                        None => continue 'corners,
                    }
                }
                if weight != 0.0 {
                    total += weight * source[index.as_slice()];
                }
            }
            *value = total;
        }
        Ok(Tensor::from_array(out_shape, out)?.cast(self.dtype()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::{batch, spatial, Dim};

    fn ramp_1d(extrapolation: Extrapolation) -> CenteredGrid {
        let values = Tensor::wrap(&[0.0, 1.0, 2.0, 3.0], Dim::spatial("x", 0)).unwrap();
        CenteredGrid::new(values, Tensor::vector(&[0.0]), Tensor::vector(&[4.0]), extrapolation).unwrap()
    }

    #[test]
    fn test_points_are_cell_centers() {
        let grid = ramp_1d(Extrapolation::Zero);
        assert_eq!(grid.points().unwrap().values(), vec![0.5, 1.5, 2.5, 3.5]);
        assert_eq!(grid.dx().unwrap().values(), vec![1.0]);
        assert_eq!(grid.resolution(), &spatial(&[("x", 4)]));
    }

    #[test]
    fn test_linear_interpolation_1d() {
        let grid = ramp_1d(Extrapolation::ZeroGradient);
        let points = Tensor::stack(
            &[Tensor::vector(&[1.5]), Tensor::vector(&[2.0]), Tensor::vector(&[10.0])],
            Dim::instance("p", 0),
        )
        .unwrap();
        let sampled = grid.sample_at(&points).unwrap();
        assert_eq!(sampled.shape(), &plume_core::instance("p", 3));
        let values = sampled.values();
        assert!((values[0] - 1.0).abs() < 1e-12);
        assert!((values[1] - 1.5).abs() < 1e-12);
        assert!((values[2] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_extrapolation_beyond_edge() {
        let beyond = Tensor::vector(&[-0.5]);
        assert_eq!(ramp_1d(Extrapolation::Zero).sample_at(&beyond).unwrap().values(), vec![0.0]);
        assert_eq!(ramp_1d(Extrapolation::ZeroGradient).sample_at(&beyond).unwrap().values(), vec![0.0]);
        assert_eq!(ramp_1d(Extrapolation::Periodic).sample_at(&beyond).unwrap().values(), vec![3.0]);

        let just_inside = Tensor::vector(&[3.9]);
        let zero = ramp_1d(Extrapolation::Zero).sample_at(&just_inside).unwrap().values()[0];
        assert!((zero - 3.0 * 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_bilinear_reproduces_linear_function() {
        let grid = CenteredGrid::uniform(
            spatial(&[("x", 4), ("y", 3)]),
            Tensor::vector(&[0.0, 0.0]),
            Tensor::vector(&[4.0, 3.0]),
            0.0,
            Extrapolation::ZeroGradient,
        )
        .unwrap();
        let points = grid.points().unwrap();
        let f = points
            .component("x")
            .unwrap()
            .try_add(&points.component("y").unwrap().scale(10.0))
            .unwrap();
        let grid = grid.with_values(f).unwrap();
        let sampled = grid.sample_at(&Tensor::vector(&[1.25, 1.75])).unwrap();
        assert!((sampled.as_scalar().unwrap() - 18.75).abs() < 1e-12);
    }

    #[test]
    fn test_extra_dimensions_ride_along() {
        let base = Tensor::wrap(&[0.0, 1.0, 2.0, 3.0], Dim::spatial("x", 0)).unwrap();
        let values = Tensor::stack(&[base.clone(), base.scale(2.0)], Dim::batch("b", 0)).unwrap();
        let grid = CenteredGrid::new(values, Tensor::vector(&[0.0]), Tensor::vector(&[4.0]), Extrapolation::Zero)
            .unwrap();
        let sampled = grid.sample_at(&Tensor::vector(&[2.0])).unwrap();
        assert_eq!(sampled.shape(), &batch("b", 2));
        assert!(sampled.all_close(&Tensor::wrap(&[1.5, 3.0], Dim::batch("b", 0)).unwrap(), 1e-12));
    }

    #[test]
    fn test_sampling_own_points_is_identity() {
        let grid = ramp_1d(Extrapolation::Zero);
        let sampled = grid.sample_at(&grid.points().unwrap()).unwrap();
        assert!(sampled.all_close(grid.values(), 1e-12));
    }

    #[test]
    fn test_with_values_checks_resolution() {
        let grid = ramp_1d(Extrapolation::Zero);
        let wrong = Tensor::zeros(spatial(&[("x", 5)]));
        assert!(matches!(grid.with_values(wrong), Err(PlumeError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_arithmetic_requires_same_domain() {
        let a = ramp_1d(Extrapolation::Zero);
        let sum = a.try_add(&a.scale(2.0)).unwrap();
        assert_eq!(sum.values().values(), vec![0.0, 3.0, 6.0, 9.0]);
        assert_eq!(sum.try_sub(&a).unwrap().values().values(), vec![0.0, 2.0, 4.0, 6.0]);

        let other = CenteredGrid::uniform(
            spatial(&[("x", 4)]),
            Tensor::vector(&[1.0]),
            Tensor::vector(&[5.0]),
            0.0,
            Extrapolation::Zero,
        )
        .unwrap();
        assert!(matches!(a.try_add(&other), Err(PlumeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rank_mismatch() {
        let grid = ramp_1d(Extrapolation::Zero);
        assert!(matches!(
            grid.sample_at(&Tensor::vector(&[1.0, 1.0])),
            Err(PlumeError::ShapeMismatch { .. })
        ));
    }
}
