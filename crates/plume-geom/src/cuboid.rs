//! Boxes, optionally rotated in the x-y plane.

use plume_core::{DimIndex, PlumeError, Result, Shape, Tensor, VECTOR_DIM};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::Stackable;
use crate::vector::{
    any_over, length, min_over, non_vector, own_instance_dims, rank_of, rotate_xy,
};

/// A box given by its center, half size per axis and rotation angle.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cuboid {
    center: Tensor,
    half_size: Tensor,
    angle: Tensor,
}

impl Cuboid {
    /// Creates an axis-aligned box.
    pub fn new(center: impl Into<Tensor>, half_size: impl Into<Tensor>) -> Result<Self> {
        Self::with_angle(center, half_size, Tensor::scalar(0.0))
    }

    /// Creates a box rotated by `angle` (radians) in the x-y plane.
    pub fn with_angle(
        center: impl Into<Tensor>,
        half_size: impl Into<Tensor>,
        angle: impl Into<Tensor>,
    ) -> Result<Self> {
        let center = center.into();
        let half_size = half_size.into();
        let angle = angle.into();
        let rank = rank_of(&center)?;
        if half_size.shape().size_of(VECTOR_DIM).is_some_and(|n| n != rank) {
            return Err(PlumeError::shape_mismatch(
                VECTOR_DIM,
                format!("half size does not match spatial rank {rank}"),
            ));
        }
        if angle.shape().contains(VECTOR_DIM) {
            return Err(PlumeError::shape_mismatch(
                VECTOR_DIM,
                "cuboid angle must be a scalar per instance",
            ));
        }
        if rank < 2 && angle.max_abs() != 0.0 {
            return Err(PlumeError::unsupported("rotated", "Cuboid of spatial rank 1"));
        }
        Shape::merge_all([
            &non_vector(center.shape()),
            &non_vector(half_size.shape()),
            angle.shape(),
        ])?;
        Ok(Self {
            center,
            half_size,
            angle,
        })
    }

    /// Axis-aligned box spanning `lower` to `upper`.
    pub fn from_bounds(lower: impl Into<Tensor>, upper: impl Into<Tensor>) -> Result<Self> {
        let lower = lower.into();
        let upper = upper.into();
        let center = lower.try_add(&upper)?.scale(0.5);
        let half_size = upper.try_sub(&lower)?.scale(0.5);
        Self::new(center, half_size)
    }

    pub fn center(&self) -> &Tensor {
        &self.center
    }

    pub fn half_size(&self) -> &Tensor {
        &self.half_size
    }

    pub fn angle(&self) -> &Tensor {
        &self.angle
    }

    pub fn spatial_rank(&self) -> usize {
        rank_of(&self.center).unwrap_or(0)
    }

    pub fn shape(&self) -> Shape {
        let center = non_vector(self.center.shape());
        Shape::merge_all([&center, &non_vector(self.half_size.shape()), self.angle.shape()])
            .unwrap_or(center)
    }

    fn is_axis_aligned(&self) -> bool {
        self.angle.max_abs() == 0.0
    }

    fn to_local(&self, location: &Tensor) -> Result<Tensor> {
        let offset = location.try_sub(&self.center)?;
        if self.is_axis_aligned() {
            Ok(offset)
        } else {
            rotate_xy(&offset, &-&self.angle)
        }
    }

    pub fn volume(&self) -> Tensor {
        self.half_size.scale(2.0).prod_over(&[VECTOR_DIM])
    }

    /// 1 where `location` lies in any of the boxes.
    pub fn lies_inside(&self, location: &Tensor) -> Result<Tensor> {
        let local = self.to_local(location)?;
        let excess = local.abs().try_sub(&self.half_size)?.max_over(&[VECTOR_DIM]);
        let inside = excess.map(|e| if e <= 0.0 { 1.0 } else { 0.0 });
        Ok(any_over(&inside, &own_instance_dims(&self.shape(), location)))
    }

    /// Signed distance to the box surface; negative inside.
    pub fn approximate_signed_distance(&self, location: &Tensor) -> Result<Tensor> {
        let q = self.to_local(location)?.abs().try_sub(&self.half_size)?;
        let outside = length(&q.map(|v| v.max(0.0)));
        let inside = q.max_over(&[VECTOR_DIM]).map(|v| v.min(0.0));
        let distance = outside.try_add(&inside)?;
        Ok(min_over(&distance, &own_instance_dims(&self.shape(), location)))
    }

    pub fn bounding_radius(&self) -> Tensor {
        length(&self.half_size)
    }

    /// Half extent of the axis-aligned bounding box.
    pub fn bounding_half_extent(&self) -> Result<Tensor> {
        if self.is_axis_aligned() {
            return Ok(self.half_size.clone());
        }
        let hx = self.half_size.select(VECTOR_DIM, 0)?;
        let hy = self.half_size.select(VECTOR_DIM, 1)?;
        let cos = self.angle.map(|a| a.cos().abs());
        let sin = self.angle.map(|a| a.sin().abs());
        let mut components = vec![
            hx.try_mul(&cos)?.try_add(&hy.try_mul(&sin)?)?,
            hx.try_mul(&sin)?.try_add(&hy.try_mul(&cos)?)?,
        ];
        for k in 2..self.spatial_rank() {
            components.push(self.half_size.select(VECTOR_DIM, k)?);
        }
        Tensor::stack(&components, plume_core::Dim::vector(self.spatial_rank()))
    }

    pub fn shifted(&self, delta: &Tensor) -> Result<Self> {
        Self::with_angle(
            self.center.try_add(delta)?,
            self.half_size.clone(),
            self.angle.clone(),
        )
    }

    pub fn rotated(&self, angle: &Tensor) -> Result<Self> {
        Self::with_angle(
            self.center.clone(),
            self.half_size.clone(),
            self.angle.try_add(angle)?,
        )
    }

    /// Moves points across the nearest face.
    ///
    /// With `outward`, points inside leave through the nearest face and end
    /// up `shift_amount` beyond it; otherwise points outside are clamped to
    /// `shift_amount` inside the box. Only single axis-aligned boxes are
    /// supported.
    pub fn push(&self, positions: &Tensor, outward: bool, shift_amount: f64) -> Result<Tensor> {
        if !self.shape().instance().is_empty() {
            return Err(PlumeError::unsupported("push", "Cuboid with instance dimensions"));
        }
        if !self.is_axis_aligned() {
            return Err(PlumeError::unsupported("push", "rotated Cuboid"));
        }
        let to_center = positions.try_sub(&self.center)?;
        let surface_delta = to_center.abs().try_sub(&self.half_size)?;
        let shift = if outward {
            let nearest = surface_delta.max_over(&[VECTOR_DIM]);
            let is_nearest = surface_delta.zip_with(&nearest, |d, n| if d == n { 1.0 } else { 0.0 })?;
            let inside = surface_delta.map(|d| if d < 0.0 { 1.0 } else { 0.0 });
            let mask = is_nearest.try_mul(&inside)?;
            surface_delta.offset(-shift_amount).try_mul(&mask)?
        } else {
            surface_delta.map(|d| if d > 0.0 { d + shift_amount } else { 0.0 })
        };
        let sign = to_center.map(|v| if v < 0.0 { 1.0 } else { -1.0 });
        positions.try_add(&sign.try_mul(&shift)?)
    }

    pub fn select(&self, dim: &str, index: &DimIndex) -> Result<Self> {
        Self::with_angle(
            self.center.select_or_keep(dim, index)?,
            self.half_size.select_or_keep(dim, index)?,
            self.angle.select_or_keep(dim, index)?,
        )
    }

    pub fn unstack(&self, dim: &str) -> Result<Vec<Self>> {
        let n = self.shape().size_of(dim).ok_or_else(|| {
            PlumeError::shape_mismatch(dim, "cannot unstack a missing dimension")
        })?;
        let centers = self.center.unstack_or_repeat(dim, n)?;
        let half_sizes = self.half_size.unstack_or_repeat(dim, n)?;
        let angles = self.angle.unstack_or_repeat(dim, n)?;
        centers
            .into_iter()
            .zip(half_sizes)
            .zip(angles)
            .map(|((c, h), a)| Self::with_angle(c, h, a))
            .collect()
    }
}

impl Stackable for Cuboid {
    fn attributes(&self) -> Vec<Tensor> {
        vec![
            self.center.clone(),
            self.half_size.clone(),
            self.angle.clone(),
        ]
    }

    fn with_attributes(attributes: Vec<Tensor>) -> Result<Self> {
        let [center, half_size, angle]: [Tensor; 3] = attributes
            .try_into()
            .map_err(|_| PlumeError::invalid("cuboid has exactly three attributes"))?;
        Self::with_angle(center, half_size, angle)
    }
}
