//! The closed set of geometry variants and their shared contract.

use std::fmt;

use plume_core::{DimIndex, PlumeError, Result, Shape, Tensor};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cuboid::Cuboid;
use crate::grid_cell::GridCell;
use crate::sphere::Sphere;
use crate::stack::GeometryStack;

/// Geometries whose attributes can be stacked one by one.
///
/// Stacking N values of the same variant stacks each attribute tensor along
/// the new dimension and rebuilds a single value of that variant from the
/// results.
pub trait Stackable: Sized {
    /// Attribute tensors in a fixed order.
    fn attributes(&self) -> Vec<Tensor>;

    /// Rebuilds a value from attributes in [`attributes`](Self::attributes)
    /// order.
    fn with_attributes(attributes: Vec<Tensor>) -> Result<Self>;
}

/// Kind tag reported by [`Geometry::shape_type`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeType {
    Sphere,
    Box,
    Grid,
}

impl ShapeType {
    /// Single-letter code.
    pub fn code(self) -> char {
        match self {
            ShapeType::Sphere => 'S',
            ShapeType::Box => 'B',
            ShapeType::Grid => 'G',
        }
    }

    /// The code as a tensor value.
    pub fn value(self) -> f64 {
        self.code() as u32 as f64
    }

    /// Parses a tensor value back into a tag.
    pub fn from_value(value: f64) -> Option<Self> {
        [ShapeType::Sphere, ShapeType::Box, ShapeType::Grid]
            .into_iter()
            .find(|t| t.value() == value)
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A spatial region.
///
/// Geometries are immutable; transformations return new values.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Geometry {
    Sphere(Sphere),
    Cuboid(Cuboid),
    GridCell(GridCell),
    Stack(GeometryStack),
}

impl From<Sphere> for Geometry {
    fn from(sphere: Sphere) -> Self {
        Geometry::Sphere(sphere)
    }
}

impl From<Cuboid> for Geometry {
    fn from(cuboid: Cuboid) -> Self {
        Geometry::Cuboid(cuboid)
    }
}

impl From<GridCell> for Geometry {
    fn from(cell: GridCell) -> Self {
        Geometry::GridCell(cell)
    }
}

impl From<GeometryStack> for Geometry {
    fn from(stack: GeometryStack) -> Self {
        Geometry::Stack(stack)
    }
}

impl Geometry {
    /// Name of the variant, used in error messages.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Geometry::Sphere(_) => "Sphere",
            Geometry::Cuboid(_) => "Cuboid",
            Geometry::GridCell(_) => "GridCell",
            Geometry::Stack(_) => "GeometryStack",
        }
    }

    /// Dimensions of the geometry, excluding the `vector` channel.
    pub fn shape(&self) -> Shape {
        match self {
            Geometry::Sphere(s) => s.shape(),
            Geometry::Cuboid(c) => c.shape(),
            Geometry::GridCell(g) => g.shape(),
            Geometry::Stack(s) => s.shape().clone(),
        }
    }

    pub fn spatial_rank(&self) -> usize {
        match self {
            Geometry::Sphere(s) => s.spatial_rank(),
            Geometry::Cuboid(c) => c.spatial_rank(),
            Geometry::GridCell(g) => g.spatial_rank(),
            Geometry::Stack(s) => s.spatial_rank(),
        }
    }

    /// Center point(s) with a `vector` channel.
    pub fn center(&self) -> Result<Tensor> {
        match self {
            Geometry::Sphere(s) => Ok(s.center().clone()),
            Geometry::Cuboid(c) => Ok(c.center().clone()),
            Geometry::GridCell(g) => g.center(),
            Geometry::Stack(s) => s.center(),
        }
    }

    pub fn volume(&self) -> Result<Tensor> {
        match self {
            Geometry::Sphere(s) => Ok(s.volume()),
            Geometry::Cuboid(c) => Ok(c.volume()),
            Geometry::GridCell(g) => g.volume(),
            Geometry::Stack(s) => s.volume(),
        }
    }

    /// [`ShapeType`] value of every element.
    pub fn shape_type(&self) -> Result<Tensor> {
        let tag = |t: ShapeType, shape: Shape| Tensor::full(shape.instance(), t.value());
        match self {
            Geometry::Sphere(s) => Ok(tag(ShapeType::Sphere, s.shape())),
            Geometry::Cuboid(c) => Ok(tag(ShapeType::Box, c.shape())),
            Geometry::GridCell(_) => Ok(Tensor::scalar(ShapeType::Grid.value())),
            Geometry::Stack(s) => s.shape_type(),
        }
    }

    pub fn bounding_radius(&self) -> Result<Tensor> {
        match self {
            Geometry::Sphere(s) => Ok(s.bounding_radius()),
            Geometry::Cuboid(c) => Ok(c.bounding_radius()),
            Geometry::GridCell(g) => g.bounding_radius(),
            Geometry::Stack(s) => s.bounding_radius(),
        }
    }

    pub fn bounding_half_extent(&self) -> Result<Tensor> {
        match self {
            Geometry::Sphere(s) => s.bounding_half_extent(),
            Geometry::Cuboid(c) => c.bounding_half_extent(),
            Geometry::GridCell(g) => g.bounding_half_extent(),
            Geometry::Stack(s) => s.bounding_half_extent(),
        }
    }

    /// 1 where `location` lies inside, 0 elsewhere.
    pub fn lies_inside(&self, location: &Tensor) -> Result<Tensor> {
        match self {
            Geometry::Sphere(s) => s.lies_inside(location),
            Geometry::Cuboid(c) => c.lies_inside(location),
            Geometry::GridCell(g) => g.lies_inside(location),
            Geometry::Stack(s) => s.lies_inside(location),
        }
    }

    /// Distance to the surface, negative inside.
    pub fn approximate_signed_distance(&self, location: &Tensor) -> Result<Tensor> {
        match self {
            Geometry::Sphere(s) => s.approximate_signed_distance(location),
            Geometry::Cuboid(c) => c.approximate_signed_distance(location),
            Geometry::GridCell(g) => g.approximate_signed_distance(location),
            Geometry::Stack(s) => s.approximate_signed_distance(location),
        }
    }

    /// Translates the geometry by `delta`.
    pub fn shifted(&self, delta: &Tensor) -> Result<Geometry> {
        match self {
            Geometry::Sphere(s) => s.shifted(delta).map(Geometry::from),
            Geometry::Cuboid(c) => c.shifted(delta).map(Geometry::from),
            Geometry::GridCell(g) => g.shifted(delta).map(Geometry::from),
            Geometry::Stack(s) => s.shifted(delta),
        }
    }

    /// Rotates by `angle` in the x-y plane about each element's center.
    pub fn rotated(&self, angle: &Tensor) -> Result<Geometry> {
        match self {
            Geometry::Sphere(_) => Ok(self.clone()),
            Geometry::Cuboid(c) => c.rotated(angle).map(Geometry::from),
            Geometry::GridCell(_) => Err(PlumeError::unsupported("rotated", "GridCell")),
            Geometry::Stack(s) => s.rotated(angle),
        }
    }

    /// Moves points across the surface; see [`Sphere::push`] and
    /// [`Cuboid::push`].
    pub fn push(&self, positions: &Tensor, outward: bool, shift_amount: f64) -> Result<Tensor> {
        match self {
            Geometry::Sphere(s) => s.push(positions, outward, shift_amount),
            Geometry::Cuboid(c) => c.push(positions, outward, shift_amount),
            other => Err(PlumeError::unsupported("push", other.variant_name())),
        }
    }

    /// Indexes one dimension of the geometry.
    pub fn select(&self, dim: &str, index: impl Into<DimIndex>) -> Result<Geometry> {
        let index = index.into();
        match self {
            Geometry::Sphere(s) => s.select(dim, &index).map(Geometry::from),
            Geometry::Cuboid(c) => c.select(dim, &index).map(Geometry::from),
            Geometry::GridCell(g) => g.select(dim, &index).map(Geometry::from),
            Geometry::Stack(s) => s.select(dim, &index),
        }
    }

    /// Splits along `dim`.
    pub fn unstack(&self, dim: &str) -> Result<Vec<Geometry>> {
        match self {
            Geometry::Sphere(s) => Ok(s.unstack(dim)?.into_iter().map(Geometry::from).collect()),
            Geometry::Cuboid(c) => Ok(c.unstack(dim)?.into_iter().map(Geometry::from).collect()),
            Geometry::GridCell(_) => Err(PlumeError::unsupported("unstack", "GridCell")),
            Geometry::Stack(s) => s.unstack(dim),
        }
    }

    /// Same variant and shape; stacks additionally compare their children
    /// one level deep.
    pub fn shallow_equals(&self, other: &Geometry) -> bool {
        match (self, other) {
            (Geometry::Stack(a), Geometry::Stack(b)) => a.shallow_equals(b),
            (a, b) => a.variant_name() == b.variant_name() && a.shape() == b.shape(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::{instance, spatial, vector};

    #[test]
    fn test_shape_type_codes() {
        assert_eq!(ShapeType::Sphere.to_string(), "S");
        assert_eq!(ShapeType::from_value(ShapeType::Box.value()), Some(ShapeType::Box));
        assert_eq!(ShapeType::from_value(0.0), None);
    }

    #[test]
    fn test_shape_type_values_are_uppercase_ascii() {
        assert_eq!(ShapeType::Sphere.value(), 83.0);
        assert_eq!(ShapeType::Box.value(), 66.0);
        assert_eq!(ShapeType::Grid.value(), 71.0);
    }

    #[test]
    fn test_shape_type_per_instance() {
        let centers = Tensor::zeros(instance("balls", 3).concat(&vector(2)).unwrap());
        let balls: Geometry = Sphere::new(centers, 1.0).unwrap().into();
        let tags = balls.shape_type().unwrap();
        assert_eq!(tags.shape(), &instance("balls", 3));
        assert!(tags.values().iter().all(|v| *v == ShapeType::Sphere.value()));
    }

    #[test]
    fn test_grid_cell_is_not_rotatable() {
        let cell: Geometry = GridCell::new(
            spatial(&[("x", 2)]),
            Tensor::vector(&[0.0]),
            Tensor::vector(&[1.0]),
        )
        .unwrap()
        .into();
        assert!(matches!(
            cell.rotated(&Tensor::scalar(0.1)),
            Err(PlumeError::Unsupported { operation: "rotated", .. })
        ));
        assert!(cell.push(&Tensor::vector(&[0.5]), true, 0.0).is_err());
    }

    #[test]
    fn test_sphere_rotation_is_identity() {
        let ball: Geometry = Sphere::new(Tensor::vector(&[1.0, 2.0]), 0.5).unwrap().into();
        assert_eq!(ball.rotated(&Tensor::scalar(1.0)).unwrap(), ball);
    }

    #[test]
    fn test_primitive_unstack_repeats_shared_attributes() {
        let centers = Tensor::stack(
            &[Tensor::vector(&[0.0, 0.0]), Tensor::vector(&[1.0, 0.0])],
            plume_core::Dim::instance("balls", 0),
        )
        .unwrap();
        let balls: Geometry = Sphere::new(centers, 0.25).unwrap().into();
        let parts = balls.unstack("balls").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].center().unwrap().values(), vec![1.0, 0.0]);
        assert_eq!(parts[1].bounding_radius().unwrap().as_scalar().unwrap(), 0.25);
        assert!(balls.unstack("missing").is_err());
    }
}
