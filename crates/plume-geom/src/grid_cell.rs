//! The cells of a regular axis-aligned grid.

use plume_core::{Dim, DimIndex, DimKind, PlumeError, Result, Shape, Tensor, VECTOR_DIM};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::vector::{length, rank_of};

/// Names of the spatial axes, in `vector` component order.
pub const AXES: [&str; 3] = ["x", "y", "z"];

/// Every cell of a grid with `resolution` cells spanning `lower..upper`.
///
/// The spatial dimensions of `resolution` are named after the vector
/// components they run along (`x`, `y`, `z`).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridCell {
    resolution: Shape,
    lower: Tensor,
    upper: Tensor,
}

impl GridCell {
    pub fn new(resolution: Shape, lower: impl Into<Tensor>, upper: impl Into<Tensor>) -> Result<Self> {
        let lower = lower.into();
        let upper = upper.into();
        let rank = rank_of(&lower)?;
        if lower.shape().rank() != 1 || upper.shape().rank() != 1 {
            return Err(PlumeError::shape_mismatch(
                VECTOR_DIM,
                "grid bounds must be plain vectors",
            ));
        }
        if rank_of(&upper)? != rank {
            return Err(PlumeError::shape_mismatch(VECTOR_DIM, "grid bounds differ in rank"));
        }
        if resolution.rank() != rank || resolution.of_kind(DimKind::Spatial).rank() != rank {
            return Err(PlumeError::shape_mismatch(
                VECTOR_DIM,
                format!("resolution {resolution} must have {rank} spatial dimensions"),
            ));
        }
        for axis in AXES.iter().take(rank) {
            if resolution.size_of(axis).unwrap_or(0) == 0 {
                return Err(PlumeError::shape_mismatch(
                    *axis,
                    format!("resolution {resolution} needs a non-empty '{axis}' dimension"),
                ));
            }
        }
        if lower.less_equal(&upper)?.values().contains(&0.0) {
            return Err(PlumeError::invalid("grid lower bound exceeds upper bound"));
        }
        Ok(Self {
            resolution,
            lower,
            upper,
        })
    }

    pub fn resolution(&self) -> &Shape {
        &self.resolution
    }

    pub fn lower(&self) -> &Tensor {
        &self.lower
    }

    pub fn upper(&self) -> &Tensor {
        &self.upper
    }

    pub fn spatial_rank(&self) -> usize {
        self.resolution.rank()
    }

    pub fn shape(&self) -> Shape {
        self.resolution.clone()
    }

    fn axis_sizes(&self) -> Tensor {
        let counts: Vec<f64> = AXES
            .iter()
            .take(self.spatial_rank())
            .map(|a| self.resolution.size_of(a).unwrap_or(1) as f64)
            .collect();
        Tensor::vector(&counts)
    }

    /// Cell size per axis.
    pub fn dx(&self) -> Result<Tensor> {
        self.upper.try_sub(&self.lower)?.try_div(&self.axis_sizes())
    }

    /// Cell centers, shaped `resolution` plus a `vector` channel.
    pub fn center(&self) -> Result<Tensor> {
        let dx = self.dx()?;
        let mut components = Vec::with_capacity(self.spatial_rank());
        for (k, axis) in AXES.iter().take(self.spatial_rank()).enumerate() {
            let n = self.resolution.size_of(axis).unwrap_or(1);
            let half = dx.select(VECTOR_DIM, k)?.as_scalar()? / 2.0;
            let lo = self.lower.select(VECTOR_DIM, k)?.as_scalar()? + half;
            let hi = self.upper.select(VECTOR_DIM, k)?.as_scalar()? - half;
            components.push(Tensor::linspace(lo, hi, Dim::spatial(*axis, n)).broadcast_to(&self.resolution)?);
        }
        Tensor::stack(&components, Dim::vector(self.spatial_rank()))
    }

    /// Volume of one cell.
    pub fn volume(&self) -> Result<Tensor> {
        Ok(self.dx()?.prod_over(&[VECTOR_DIM]))
    }

    /// 1 where `location` lies inside the grid's domain.
    pub fn lies_inside(&self, location: &Tensor) -> Result<Tensor> {
        let above = self.lower.less_equal(location)?.min_over(&[VECTOR_DIM]);
        let below = location.less_equal(&self.upper)?.min_over(&[VECTOR_DIM]);
        above.try_mul(&below)
    }

    /// Signed distance to the boundary of the whole domain.
    pub fn approximate_signed_distance(&self, location: &Tensor) -> Result<Tensor> {
        let center = self.lower.try_add(&self.upper)?.scale(0.5);
        let half = self.upper.try_sub(&self.lower)?.scale(0.5);
        let q = location.try_sub(&center)?.abs().try_sub(&half)?;
        let outside = length(&q.map(|v| v.max(0.0)));
        let inside = q.max_over(&[VECTOR_DIM]).map(|v| v.min(0.0));
        outside.try_add(&inside)
    }

    pub fn bounding_radius(&self) -> Result<Tensor> {
        Ok(length(&self.dx()?).scale(0.5))
    }

    pub fn bounding_half_extent(&self) -> Result<Tensor> {
        Ok(self.dx()?.scale(0.5))
    }

    pub fn shifted(&self, delta: &Tensor) -> Result<Self> {
        Self::new(
            self.resolution.clone(),
            self.lower.try_add(delta)?,
            self.upper.try_add(delta)?,
        )
    }

    /// Sub-grid along one spatial dimension. A single index keeps the
    /// dimension with size 1.
    pub fn select(&self, dim: &str, index: &DimIndex) -> Result<Self> {
        let Some(k) = AXES.iter().take(self.spatial_rank()).position(|a| *a == dim) else {
            return Ok(self.clone());
        };
        let range = match index {
            DimIndex::At(i) => *i..*i + 1,
            DimIndex::Range(r) => r.clone(),
        };
        let size = self.resolution.size_of(dim).unwrap_or(0);
        DimIndex::Range(range.clone()).validate(&Dim::spatial(dim, size))?;
        let dx = self.dx()?.select(VECTOR_DIM, k)?.as_scalar()?;
        let lower0 = self.lower.select(VECTOR_DIM, k)?.as_scalar()?;
        let mut lower = self.lower.values();
        let mut upper = self.upper.values();
        lower[k] = lower0 + dx * range.start as f64;
        upper[k] = lower0 + dx * range.end as f64;
        Self::new(
            self.resolution.with_dim_size(dim, range.len())?,
            Tensor::vector(&lower),
            Tensor::vector(&upper),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::spatial;

    fn grid() -> GridCell {
        GridCell::new(
            spatial(&[("x", 4), ("y", 2)]),
            Tensor::vector(&[0.0, 0.0]),
            Tensor::vector(&[4.0, 1.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_dx_and_volume() {
        let g = grid();
        assert_eq!(g.dx().unwrap().values(), vec![1.0, 0.5]);
        assert_eq!(g.volume().unwrap().as_scalar().unwrap(), 0.5);
    }

    #[test]
    fn test_centers() {
        let centers = grid().center().unwrap();
        assert_eq!(centers.shape().names(), vec!["x", "y", "vector"]);
        let first = centers.select("x", 0).unwrap().select("y", 0).unwrap();
        assert_eq!(first.values(), vec![0.5, 0.25]);
        let last = centers.select("x", 3).unwrap().select("y", 1).unwrap();
        assert_eq!(last.values(), vec![3.5, 0.75]);
    }

    #[test]
    fn test_lies_inside_domain() {
        let g = grid();
        assert_eq!(g.lies_inside(&Tensor::vector(&[3.9, 0.1])).unwrap().as_scalar().unwrap(), 1.0);
        assert_eq!(g.lies_inside(&Tensor::vector(&[4.1, 0.1])).unwrap().as_scalar().unwrap(), 0.0);
    }

    #[test]
    fn test_select_sub_grid() {
        let sub = grid().select("x", &DimIndex::Range(1..3)).unwrap();
        assert_eq!(sub.resolution().size_of("x"), Some(2));
        assert_eq!(sub.lower().values(), vec![1.0, 0.0]);
        assert_eq!(sub.upper().values(), vec![3.0, 1.0]);
        assert_eq!(grid().select("b", &DimIndex::At(0)).unwrap(), grid());
        assert!(grid().select("x", &DimIndex::At(4)).is_err());
    }

    #[test]
    fn test_resolution_must_match_rank() {
        let result = GridCell::new(spatial(&[("x", 4)]), Tensor::vector(&[0.0, 0.0]), Tensor::vector(&[1.0, 1.0]));
        assert!(result.is_err());
        let misnamed = GridCell::new(spatial(&[("u", 4)]), Tensor::vector(&[0.0]), Tensor::vector(&[1.0]));
        assert!(misnamed.is_err());
    }
}
