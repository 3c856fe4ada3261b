//! Core types for plume.
//!
//! This crate provides the named-dimension foundation every other plume
//! crate builds on:
//!
//! - [`Shape`] / [`Dim`] - Ordered named dimensions with kinds
//! - [`Tensor`] - Shape-annotated values with broadcasting by name
//! - [`Layout`] - Arbitrary values along one named dimension
//! - [`PlumeError`] - Shared error taxonomy
//! - [`stencil`] - Boundary handling and the Laplace operator
//! - [`logging`] - Tracing subscriber setup

mod error;
mod layout;
pub mod logging;
mod shape;
pub mod stencil;
mod tensor;

pub use error::{PlumeError, Result};
pub use glam;
pub use layout::Layout;
pub use shape::{
    batch, channel, instance, spatial, vector, Dim, DimIndex, DimKind, Shape, VECTOR_DIM,
};
pub use stencil::{laplace, Extrapolation};
pub use tensor::{DType, Tensor};
