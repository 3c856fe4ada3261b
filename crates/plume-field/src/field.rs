//! Fields: grids, geometry masks and constants behind one sampling interface.

use plume_core::{PlumeError, Result, Tensor, VECTOR_DIM};
use plume_geom::Geometry;
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::grid::CenteredGrid;
use crate::mask::{any_instance, GeometryMask};

/// A quantity defined over space.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Field {
    Grid(CenteredGrid),
    Mask(GeometryMask),
    /// The same value everywhere.
    Constant(Tensor),
}

impl From<CenteredGrid> for Field {
    fn from(grid: CenteredGrid) -> Self {
        Field::Grid(grid)
    }
}

impl From<GeometryMask> for Field {
    fn from(mask: GeometryMask) -> Self {
        Field::Mask(mask)
    }
}

impl From<Tensor> for Field {
    fn from(value: Tensor) -> Self {
        Field::Constant(value)
    }
}

impl Field {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Field::Grid(_) => "Grid",
            Field::Mask(_) => "Mask",
            Field::Constant(_) => "Constant",
        }
    }

    /// Values at `points`, which carry a `vector` channel.
    pub fn sample_at(&self, points: &Tensor) -> Result<Tensor> {
        match self {
            Field::Grid(grid) => grid.sample_at(points),
            Field::Mask(mask) => mask.sample_at(points),
            Field::Constant(value) => {
                Tensor::zeros(points.shape().without(&[VECTOR_DIM])).try_add(value)
            }
        }
    }

    /// Resamples onto the cell centers of `grid`, returning a grid with the
    /// same domain and extrapolation.
    ///
    /// A grid over the same domain is taken over unchanged.
    pub fn at(&self, grid: &CenteredGrid) -> Result<CenteredGrid> {
        if let Field::Grid(source) = self {
            if source.same_domain(grid) {
                return grid.with_values(source.values().clone());
            }
        }
        trace!(
            source = self.variant_name(),
            resolution = %grid.resolution(),
            "resampling field onto grid"
        );
        grid.with_values(self.sample_at(&grid.points()?)?)
    }

    /// The region the field is defined on, if it has one.
    pub fn bounds(&self) -> Option<Geometry> {
        match self {
            Field::Grid(grid) => Some(Geometry::GridCell(grid.elements().clone())),
            Field::Mask(mask) => Some(mask.geometry().clone()),
            Field::Constant(_) => None,
        }
    }

    /// 1 at `points` inside [`bounds`](Self::bounds), 0 outside. Soft
    /// masks ramp across their edge.
    pub fn bounds_mask(&self, points: &Tensor) -> Result<Tensor> {
        if let Field::Mask(mask) = self {
            return mask.mask_at(points);
        }
        let bounds = self.bounds().ok_or_else(|| {
            PlumeError::invalid(format!("{} field has no bounds", self.variant_name()))
        })?;
        any_instance(bounds.lies_inside(points)?, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::{spatial, Dim, Extrapolation};
    use plume_geom::Sphere;

    fn grid(n: usize, lower: f64, upper: f64) -> CenteredGrid {
        CenteredGrid::uniform(
            spatial(&[("x", n)]),
            Tensor::vector(&[lower]),
            Tensor::vector(&[upper]),
            0.0,
            Extrapolation::ZeroGradient,
        )
        .unwrap()
    }

    #[test]
    fn test_constant_broadcasts_over_points() {
        let field = Field::from(Tensor::scalar(3.0));
        let target = grid(4, 0.0, 4.0);
        let resampled = field.at(&target).unwrap();
        assert_eq!(resampled.values().values(), vec![3.0; 4]);
        assert!(field.bounds().is_none());
        assert!(matches!(
            field.bounds_mask(&target.points().unwrap()),
            Err(PlumeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_same_domain_is_taken_over() {
        let source = grid(4, 0.0, 4.0)
            .with_values(Tensor::wrap(&[1.0, 2.0, 3.0, 4.0], Dim::spatial("x", 0)).unwrap())
            .unwrap();
        let target = grid(4, 0.0, 4.0).with_extrapolation(Extrapolation::Periodic);
        let resampled = Field::from(source.clone()).at(&target).unwrap();
        assert_eq!(resampled.values(), source.values());
        assert_eq!(resampled.extrapolation(), Extrapolation::Periodic);
    }

    #[test]
    fn test_coarse_to_fine() {
        let coarse = grid(2, 0.0, 4.0)
            .with_values(Tensor::wrap(&[0.0, 2.0], Dim::spatial("x", 0)).unwrap())
            .unwrap();
        let fine = grid(4, 0.0, 4.0);
        let resampled = Field::from(coarse).at(&fine).unwrap();
        assert!(resampled
            .values()
            .all_close(&Tensor::wrap(&[0.0, 0.5, 1.5, 2.0], Dim::spatial("x", 0)).unwrap(), 1e-12));
    }

    #[test]
    fn test_mask_resampled_onto_grid() {
        let ball = Sphere::new(Tensor::vector(&[1.0]), 1.0).unwrap();
        let field = Field::from(GeometryMask::new("ball", ball, 5.0));
        let resampled = field.at(&grid(4, 0.0, 4.0)).unwrap();
        assert_eq!(resampled.values().values(), vec![5.0, 5.0, 0.0, 0.0]);
    }

    #[test]
    fn test_bounds_mask() {
        let points = grid(4, 0.0, 4.0).points().unwrap();
        let ball = Sphere::new(Tensor::vector(&[0.0]), 1.0).unwrap();
        let mask = Field::from(GeometryMask::new("ball", ball, 5.0));
        assert_eq!(mask.bounds_mask(&points).unwrap().values(), vec![1.0, 0.0, 0.0, 0.0]);

        let domain = Field::from(grid(2, 1.0, 3.0));
        assert_eq!(domain.bounds_mask(&points).unwrap().values(), vec![0.0, 1.0, 1.0, 0.0]);
    }
}
