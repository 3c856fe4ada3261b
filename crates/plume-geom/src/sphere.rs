//! Balls in 1, 2 or 3 dimensions.

use std::f64::consts::PI;

use plume_core::{DimIndex, PlumeError, Result, Shape, Tensor, VECTOR_DIM};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::Stackable;
use crate::vector::{any_over, length, min_over, non_vector, own_instance_dims, rank_of};

/// A ball with a center and a radius.
///
/// Both attributes may carry extra dimensions; an instance dimension on
/// either makes this a collection of balls.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sphere {
    center: Tensor,
    radius: Tensor,
}

impl Sphere {
    /// Creates a sphere. `center` must carry a `vector` channel, `radius`
    /// must not.
    pub fn new(center: impl Into<Tensor>, radius: impl Into<Tensor>) -> Result<Self> {
        let center = center.into();
        let radius = radius.into();
        rank_of(&center)?;
        if radius.shape().contains(VECTOR_DIM) {
            return Err(PlumeError::shape_mismatch(
                VECTOR_DIM,
                "sphere radius must be a scalar per instance",
            ));
        }
        non_vector(center.shape()).merge(radius.shape())?;
        Ok(Self { center, radius })
    }

    pub fn center(&self) -> &Tensor {
        &self.center
    }

    pub fn radius(&self) -> &Tensor {
        &self.radius
    }

    pub fn spatial_rank(&self) -> usize {
        rank_of(&self.center).unwrap_or(0)
    }

    /// Dimensions of the collection, without the `vector` channel.
    pub fn shape(&self) -> Shape {
        non_vector(self.center.shape())
            .merge(self.radius.shape())
            .unwrap_or_else(|_| non_vector(self.center.shape()))
    }

    /// Length, area or volume depending on the spatial rank.
    pub fn volume(&self) -> Tensor {
        match self.spatial_rank() {
            1 => self.radius.scale(2.0),
            2 => self.radius.map(|r| PI * r * r),
            _ => self.radius.map(|r| 4.0 / 3.0 * PI * r * r * r),
        }
    }

    /// 1 where `location` lies in any of the balls.
    pub fn lies_inside(&self, location: &Tensor) -> Result<Tensor> {
        let distance = length(&location.try_sub(&self.center)?);
        let inside = distance.less_equal(&self.radius)?;
        Ok(any_over(&inside, &own_instance_dims(&self.shape(), location)))
    }

    /// Exact signed distance; negative inside.
    pub fn approximate_signed_distance(&self, location: &Tensor) -> Result<Tensor> {
        let distance = length(&location.try_sub(&self.center)?).try_sub(&self.radius)?;
        Ok(min_over(&distance, &own_instance_dims(&self.shape(), location)))
    }

    pub fn bounding_radius(&self) -> Tensor {
        self.radius.clone()
    }

    pub fn bounding_half_extent(&self) -> Result<Tensor> {
        let ones = Tensor::ones(Shape::from_dim(
            self.center.shape().get(VECTOR_DIM).cloned().ok_or_else(|| {
                PlumeError::shape_mismatch(VECTOR_DIM, "sphere center has no vector channel")
            })?,
        ));
        self.radius.try_mul(&ones)
    }

    pub fn shifted(&self, delta: &Tensor) -> Result<Self> {
        Self::new(self.center.try_add(delta)?, self.radius.clone())
    }

    /// Projects points onto the surface.
    ///
    /// With `outward`, points inside are moved `shift_amount` beyond the
    /// surface; otherwise points outside are moved `shift_amount` inside it.
    /// Collections of spheres are not supported.
    pub fn push(&self, positions: &Tensor, outward: bool, shift_amount: f64) -> Result<Tensor> {
        if !self.shape().instance().is_empty() {
            return Err(PlumeError::unsupported(
                "push",
                "Sphere with instance dimensions",
            ));
        }
        let delta = positions.try_sub(&self.center)?;
        let distance = length(&delta);
        let direction = delta.safe_div(&distance)?;
        let (affected, target_radius) = if outward {
            (
                distance.zip_with(&self.radius, |d, r| if d < r { 1.0 } else { 0.0 })?,
                self.radius.offset(shift_amount),
            )
        } else {
            (
                distance.zip_with(&self.radius, |d, r| if d > r { 1.0 } else { 0.0 })?,
                self.radius.offset(-shift_amount),
            )
        };
        let projected = self.center.try_add(&direction.try_mul(&target_radius)?)?;
        Tensor::where_mask(&affected, &projected, positions)
    }

    pub fn select(&self, dim: &str, index: &DimIndex) -> Result<Self> {
        Self::new(
            self.center.select_or_keep(dim, index)?,
            self.radius.select_or_keep(dim, index)?,
        )
    }

    pub fn unstack(&self, dim: &str) -> Result<Vec<Self>> {
        let n = self.shape().size_of(dim).ok_or_else(|| {
            PlumeError::shape_mismatch(dim, "cannot unstack a missing dimension")
        })?;
        let centers = self.center.unstack_or_repeat(dim, n)?;
        let radii = self.radius.unstack_or_repeat(dim, n)?;
        centers
            .into_iter()
            .zip(radii)
            .map(|(c, r)| Self::new(c, r))
            .collect()
    }
}

impl Stackable for Sphere {
    fn attributes(&self) -> Vec<Tensor> {
        vec![self.center.clone(), self.radius.clone()]
    }

    fn with_attributes(attributes: Vec<Tensor>) -> Result<Self> {
        let [center, radius]: [Tensor; 2] = attributes
            .try_into()
            .map_err(|_| PlumeError::invalid("sphere has exactly two attributes"))?;
        Self::new(center, radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;
    use plume_core::{instance, Dim};

    fn unit_disk() -> Sphere {
        Sphere::new(DVec2::ZERO, 1.0).unwrap()
    }

    #[test]
    fn test_volume_by_rank() {
        assert!((unit_disk().volume().as_scalar().unwrap() - PI).abs() < 1e-12);
        let ball = Sphere::new(Tensor::vector(&[0.0, 0.0, 0.0]), 2.0).unwrap();
        assert!((ball.volume().as_scalar().unwrap() - 32.0 / 3.0 * PI).abs() < 1e-9);
        let segment = Sphere::new(Tensor::vector(&[0.0]), 0.5).unwrap();
        assert_eq!(segment.volume().as_scalar().unwrap(), 1.0);
    }

    #[test]
    fn test_lies_inside_and_distance() {
        let disk = unit_disk();
        let points = Tensor::stack(
            &[Tensor::vector(&[0.5, 0.0]), Tensor::vector(&[2.0, 0.0])],
            Dim::instance("points", 0),
        )
        .unwrap();
        assert_eq!(disk.lies_inside(&points).unwrap().values(), vec![1.0, 0.0]);
        let sdf = disk.approximate_signed_distance(&points).unwrap();
        assert!(sdf.all_close(
            &Tensor::wrap(&[-0.5, 1.0], Dim::instance("points", 2)).unwrap(),
            1e-12
        ));
    }

    #[test]
    fn test_collection_reduces_own_instances() {
        let centers = Tensor::stack(
            &[Tensor::vector(&[0.0, 0.0]), Tensor::vector(&[5.0, 0.0])],
            Dim::instance("balls", 0),
        )
        .unwrap();
        let balls = Sphere::new(centers, 1.0).unwrap();
        assert_eq!(balls.shape(), instance("balls", 2));
        let p = Tensor::vector(&[5.0, 0.5]);
        assert_eq!(balls.lies_inside(&p).unwrap().as_scalar().unwrap(), 1.0);
        assert!((balls.approximate_signed_distance(&p).unwrap().as_scalar().unwrap() + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_half_extent() {
        let half = unit_disk().bounding_half_extent().unwrap();
        assert_eq!(half.values(), vec![1.0, 1.0]);
        assert_eq!(half.shape().names(), vec!["vector"]);
    }

    #[test]
    fn test_push_outward_and_inward() {
        let disk = unit_disk();
        let inside = Tensor::vector(&[0.5, 0.0]);
        let pushed = disk.push(&inside, true, 0.1).unwrap();
        assert!(pushed.all_close(&Tensor::vector(&[1.1, 0.0]), 1e-12));
        let outside = Tensor::vector(&[0.0, 3.0]);
        assert_eq!(disk.push(&outside, true, 0.1).unwrap(), outside);
        let pulled = disk.push(&outside, false, 0.0).unwrap();
        assert!(pulled.all_close(&Tensor::vector(&[0.0, 1.0]), 1e-12));
    }

    #[test]
    fn test_push_rejects_collections() {
        let centers = Tensor::zeros(instance("balls", 2).concat(&plume_core::vector(2)).unwrap());
        let balls = Sphere::new(centers, 1.0).unwrap();
        assert!(matches!(
            balls.push(&Tensor::vector(&[0.0, 0.0]), true, 0.0),
            Err(PlumeError::Unsupported { operation: "push", .. })
        ));
    }

    #[test]
    fn test_radius_must_be_scalar() {
        assert!(Sphere::new(Tensor::vector(&[0.0, 0.0]), Tensor::vector(&[1.0, 1.0])).is_err());
        assert!(Sphere::new(Tensor::scalar(0.0), 1.0).is_err());
    }
}
