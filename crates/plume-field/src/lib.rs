//! Fields for plume: values defined over space that can be sampled at
//! arbitrary points.
//!
//! # Core Types
//!
//! - [`CenteredGrid`] - Values at the cell centers of a regular grid
//! - [`GeometryMask`] - A constant value inside a geometry, 0 outside
//! - [`Field`] - Any of the above, or a constant
//!
//! Resampling one field onto another grid goes through [`Field::at`].

mod field;
mod grid;
mod mask;

pub use field::Field;
pub use grid::CenteredGrid;
pub use mask::GeometryMask;
