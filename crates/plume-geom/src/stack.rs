//! Stacking geometries along a named dimension.
//!
//! Geometries of one primitive variant stack attribute-wise into a single
//! value of that variant. Everything else (mixed variants, grid cells,
//! nested stacks) becomes a [`GeometryStack`]: a lazy composite that keeps
//! its children in a [`Layout`] and stacks their attributes on demand.

use plume_backend::global_scheduler;
use plume_core::{Dim, DimIndex, DimKind, Layout, PlumeError, Result, Shape, Tensor, VECTOR_DIM};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cuboid::Cuboid;
use crate::geometry::{Geometry, Stackable};
use crate::sphere::Sphere;

/// A heterogeneous stack of geometries.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeometryStack {
    geometries: Layout<Geometry>,
    shape: Shape,
}

impl GeometryStack {
    /// Stacks `geometries` along `dim`; the size of `dim` is replaced by the
    /// number of geometries.
    pub fn new(geometries: Vec<Geometry>, dim: Dim) -> Result<Self> {
        Self::from_layout(Layout::new(geometries, dim)?)
    }

    /// Wraps an existing layout of geometries.
    pub fn from_layout(geometries: Layout<Geometry>) -> Result<Self> {
        check_ranks(geometries.items())?;
        let shapes: Vec<Shape> = geometries.iter().map(Geometry::shape).collect();
        let shape = Shape::stack(geometries.dim().clone(), &shapes)?;
        Ok(Self { geometries, shape })
    }

    /// The children, in stacking order.
    pub fn geometries(&self) -> &Layout<Geometry> {
        &self.geometries
    }

    /// The dimension the children are stacked along.
    pub fn stack_dim(&self) -> &Dim {
        self.geometries.dim()
    }

    /// Aggregate shape: the stack dimension plus the broadcast of every
    /// child's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn spatial_rank(&self) -> usize {
        self.geometries.get(0).map_or(0, Geometry::spatial_rank)
    }

    fn stack_attribute(&self, f: impl Fn(&Geometry) -> Result<Tensor>) -> Result<Tensor> {
        let values = self.geometries.iter().map(f).collect::<Result<Vec<_>>>()?;
        Ok(global_scheduler().stack(&values, self.stack_dim().clone())?)
    }

    fn per_child(&self, value: &Tensor) -> Result<Vec<Tensor>> {
        value.unstack_or_repeat(self.stack_dim().name(), self.geometries.len())
    }

    pub fn center(&self) -> Result<Tensor> {
        self.stack_attribute(Geometry::center)
    }

    /// Child volumes stacked along the stack dimension.
    ///
    /// Stacks along an instance dimension would have to aggregate
    /// overlapping volumes, which is not supported.
    pub fn volume(&self) -> Result<Tensor> {
        if self.stack_dim().kind() == DimKind::Instance {
            return Err(PlumeError::unsupported(
                "volume",
                format!("GeometryStack along instance dimension '{}'", self.stack_dim().name()),
            ));
        }
        self.stack_attribute(Geometry::volume)
    }

    pub fn shape_type(&self) -> Result<Tensor> {
        self.stack_attribute(Geometry::shape_type)
    }

    pub fn bounding_radius(&self) -> Result<Tensor> {
        self.stack_attribute(Geometry::bounding_radius)
    }

    pub fn bounding_half_extent(&self) -> Result<Tensor> {
        self.stack_attribute(Geometry::bounding_half_extent)
    }

    /// Evaluates every child and stacks the results.
    ///
    /// A `location` carrying the stack dimension is distributed, one slice
    /// per child; otherwise every child sees the whole of it.
    pub fn lies_inside(&self, location: &Tensor) -> Result<Tensor> {
        let inside = self
            .geometries
            .iter()
            .zip(self.per_child(location)?)
            .map(|(g, loc)| g.lies_inside(&loc))
            .collect::<Result<Vec<_>>>()?;
        Ok(global_scheduler().stack(&inside, self.stack_dim().clone())?)
    }

    pub fn approximate_signed_distance(&self, _location: &Tensor) -> Result<Tensor> {
        Err(PlumeError::unsupported(
            "approximate_signed_distance",
            "GeometryStack",
        ))
    }

    /// Shifts each child by its slice of `delta` and restacks.
    pub fn shifted(&self, delta: &Tensor) -> Result<Geometry> {
        let children = self
            .geometries
            .iter()
            .zip(self.per_child(delta)?)
            .map(|(g, d)| g.shifted(&d))
            .collect::<Result<Vec<_>>>()?;
        stack(children, self.stack_dim().clone())
    }

    /// Rotates each child and restacks.
    pub fn rotated(&self, angle: &Tensor) -> Result<Geometry> {
        let children = self
            .geometries
            .iter()
            .zip(self.per_child(angle)?)
            .map(|(g, a)| g.rotated(&a))
            .collect::<Result<Vec<_>>>()?;
        stack(children, self.stack_dim().clone())
    }

    /// Indexes the stack.
    ///
    /// Along the stack dimension a single remaining element is returned as
    /// that child itself. Other dimensions are forwarded to every child.
    pub fn select(&self, dim: &str, index: &DimIndex) -> Result<Geometry> {
        if dim != self.stack_dim().name() {
            let children = self.geometries.try_map(|g| g.select(dim, index.clone()))?;
            return Self::from_layout(children).map(Geometry::Stack);
        }
        index.validate(self.stack_dim())?;
        let range = match index {
            DimIndex::At(i) => *i..*i + 1,
            DimIndex::Range(r) => r.clone(),
        };
        if range.len() == 1 {
            return Ok(self.geometries.items()[range.start].clone());
        }
        Self::from_layout(self.geometries.slice(range)?).map(Geometry::Stack)
    }

    /// Splits into the children. Only the stack dimension can be unstacked.
    pub fn unstack(&self, dim: &str) -> Result<Vec<Geometry>> {
        if dim == self.stack_dim().name() {
            Ok(self.geometries.items().to_vec())
        } else {
            Err(PlumeError::unsupported(
                "unstack",
                format!("GeometryStack along '{dim}' (stacked along '{}')", self.stack_dim().name()),
            ))
        }
    }

    /// Same shape and stack dimension, children shallow-equal pairwise.
    pub fn shallow_equals(&self, other: &GeometryStack) -> bool {
        std::ptr::eq(self, other)
            || (self.shape == other.shape
                && self.stack_dim() == other.stack_dim()
                && self
                    .geometries
                    .iter()
                    .zip(other.geometries.iter())
                    .all(|(a, b)| a.shallow_equals(b)))
    }
}

impl PartialEq for GeometryStack {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.geometries == other.geometries
    }
}

fn check_ranks(geometries: &[Geometry]) -> Result<()> {
    let Some(first) = geometries.first() else {
        return Ok(());
    };
    let rank = first.spatial_rank();
    match geometries.iter().find(|g| g.spatial_rank() != rank) {
        Some(g) => Err(PlumeError::shape_mismatch(
            VECTOR_DIM,
            format!(
                "cannot stack geometries of spatial rank {rank} and {}",
                g.spatial_rank()
            ),
        )),
        None => Ok(()),
    }
}

fn stack_attributes<T: Stackable>(values: &[&T], dim: &Dim) -> Result<T> {
    let attributes: Vec<Vec<Tensor>> = values.iter().map(|v| v.attributes()).collect();
    let count = attributes.first().map_or(0, Vec::len);
    let stacked = (0..count)
        .map(|i| {
            let column: Vec<Tensor> = attributes.iter().map(|a| a[i].clone()).collect();
            global_scheduler()
                .stack(&column, dim.clone())
                .map_err(PlumeError::from)
        })
        .collect::<Result<Vec<_>>>()?;
    T::with_attributes(stacked)
}

/// Stacks `geometries` along `dim`. The size of `dim` is replaced by the
/// number of geometries.
///
/// Spheres stack into a single [`Sphere`] and cuboids into a single
/// [`Cuboid`]; any other combination becomes a [`GeometryStack`].
///
/// # Example
///
/// ```
/// use plume_core::{Dim, Tensor};
/// use plume_geom::{stack, Geometry, Sphere};
///
/// let a: Geometry = Sphere::new(Tensor::vector(&[0.0, 0.0]), 1.0).unwrap().into();
/// let b: Geometry = Sphere::new(Tensor::vector(&[3.0, 0.0]), 0.5).unwrap().into();
/// let both = stack(vec![a.clone(), b], Dim::instance("balls", 0)).unwrap();
/// assert!(matches!(both, Geometry::Sphere(_)));
/// assert_eq!(both.select("balls", 0).unwrap(), a);
/// ```
pub fn stack(geometries: Vec<Geometry>, dim: Dim) -> Result<Geometry> {
    if geometries.is_empty() {
        return Err(PlumeError::invalid(format!(
            "cannot stack zero geometries along '{}'",
            dim.name()
        )));
    }
    check_ranks(&geometries)?;
    let dim = dim.with_size(geometries.len());

    let spheres: Option<Vec<&Sphere>> = geometries
        .iter()
        .map(|g| match g {
            Geometry::Sphere(s) => Some(s),
            _ => None,
        })
        .collect();
    if let Some(spheres) = spheres {
        trace!(count = spheres.len(), dim = %dim, "stacking spheres attribute-wise");
        return stack_attributes(&spheres, &dim).map(Geometry::Sphere);
    }

    let cuboids: Option<Vec<&Cuboid>> = geometries
        .iter()
        .map(|g| match g {
            Geometry::Cuboid(c) => Some(c),
            _ => None,
        })
        .collect();
    if let Some(cuboids) = cuboids {
        trace!(count = cuboids.len(), dim = %dim, "stacking cuboids attribute-wise");
        return stack_attributes(&cuboids, &dim).map(Geometry::Cuboid);
    }

    trace!(count = geometries.len(), dim = %dim, "building heterogeneous geometry stack");
    GeometryStack::new(geometries, dim).map(Geometry::Stack)
}
