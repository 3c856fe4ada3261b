//! Analytic fields defined by a geometry.

use plume_backend::{global_scheduler, ReduceOp};
use plume_core::{PlumeError, Result, Tensor};
use plume_geom::Geometry;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Equal to `value` inside `geometry` and 0 outside.
///
/// A soft mask ramps linearly from 1 to 0 over `width` around the surface,
/// using the geometry's signed distance.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeometryMask {
    name: String,
    geometry: Geometry,
    value: Tensor,
    soft_width: Option<f64>,
}

impl GeometryMask {
    pub fn new(name: impl Into<String>, geometry: impl Into<Geometry>, value: impl Into<Tensor>) -> Self {
        Self {
            name: name.into(),
            geometry: geometry.into(),
            value: value.into(),
            soft_width: None,
        }
    }

    /// Anti-aliases the edge over `width`.
    pub fn soft(mut self, width: f64) -> Result<Self> {
        if width.is_nan() || width <= 0.0 {
            return Err(PlumeError::invalid(format!(
                "soft mask width must be positive, got {width}"
            )));
        }
        self.soft_width = Some(width);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn value(&self) -> &Tensor {
        &self.value
    }

    pub fn is_soft(&self) -> bool {
        self.soft_width.is_some()
    }

    /// Coverage in `[0, 1]` at `points`.
    pub fn mask_at(&self, points: &Tensor) -> Result<Tensor> {
        let coverage = match self.soft_width {
            None => self.geometry.lies_inside(points)?,
            Some(width) => self
                .geometry
                .approximate_signed_distance(points)?
                .map(|d| (0.5 - d / width).clamp(0.0, 1.0)),
        };
        any_instance(coverage, points)
    }

    pub fn sample_at(&self, points: &Tensor) -> Result<Tensor> {
        self.mask_at(points)?.try_mul(&self.value)
    }
}

/// Reduces with `max` over instance dimensions the points do not carry.
///
/// Stacks of geometries along an instance dimension report one result per
/// child; a point covered by any child is covered by the stack.
pub(crate) fn any_instance(coverage: Tensor, points: &Tensor) -> Result<Tensor> {
    let own: Vec<String> = coverage
        .shape()
        .instance()
        .iter()
        .filter(|d| !points.shape().contains(d.name()))
        .map(|d| d.name().to_string())
        .collect();
    if own.is_empty() {
        return Ok(coverage);
    }
    let names: Vec<&str> = own.iter().map(String::as_str).collect();
    Ok(global_scheduler().reduce(ReduceOp::Max, &coverage, &names)?)
}
