//! Geometries for plume.
//!
//! - [`Geometry`] - Closed set of regions: [`Sphere`], [`Cuboid`],
//!   [`GridCell`] and [`GeometryStack`]
//! - [`stack`] - Combines geometries along a named dimension
//! - [`Stackable`] - Attribute-wise stacking of a primitive variant
//!
//! All attributes are [`plume_core::Tensor`]s with a `vector` channel for
//! positions, so a single geometry value may describe a whole batch or
//! collection of shapes.

mod cuboid;
mod geometry;
mod grid_cell;
mod sphere;
mod stack;
mod vector;

pub use cuboid::Cuboid;
pub use geometry::{Geometry, ShapeType, Stackable};
pub use grid_cell::{GridCell, AXES};
pub use sphere::Sphere;
pub use stack::{stack, GeometryStack};
