//! Helpers for tensors carrying a `vector` channel.

use plume_core::{Dim, PlumeError, Result, Shape, Tensor, VECTOR_DIM};

/// Size of the `vector` channel.
pub fn rank_of(v: &Tensor) -> Result<usize> {
    v.shape().size_of(VECTOR_DIM).ok_or_else(|| {
        PlumeError::shape_mismatch(VECTOR_DIM, format!("no vector channel in {}", v.shape()))
    })
}

/// Euclidean length over the `vector` channel.
pub fn length(v: &Tensor) -> Tensor {
    v.square().sum_over(&[VECTOR_DIM]).sqrt()
}

/// Shape without the `vector` channel.
pub fn non_vector(shape: &Shape) -> Shape {
    shape.without(&[VECTOR_DIM])
}

/// Rotates vectors by `angle` in the x-y plane. Rank-1 vectors are
/// returned unchanged.
pub fn rotate_xy(v: &Tensor, angle: &Tensor) -> Result<Tensor> {
    let rank = rank_of(v)?;
    if rank < 2 {
        return Ok(v.clone());
    }
    let cos = angle.map(f64::cos);
    let sin = angle.map(f64::sin);
    let x = v.select(VECTOR_DIM, 0)?;
    let y = v.select(VECTOR_DIM, 1)?;
    let mut components = vec![
        x.try_mul(&cos)?.try_sub(&y.try_mul(&sin)?)?,
        x.try_mul(&sin)?.try_add(&y.try_mul(&cos)?)?,
    ];
    for k in 2..rank {
        components.push(v.select(VECTOR_DIM, k)?);
    }
    Tensor::stack(&components, Dim::vector(rank))
}

/// Names of `geometry_shape`'s instance dimensions that `location` lacks.
///
/// Primitives reduce over these: a location inside any instance is inside
/// the geometry.
pub fn own_instance_dims(geometry_shape: &Shape, location: &Tensor) -> Vec<String> {
    geometry_shape
        .instance()
        .iter()
        .filter(|d| !location.shape().contains(d.name()))
        .map(|d| d.name().to_string())
        .collect()
}

/// Reduces with `max` over the given dimension names.
pub fn any_over(mask: &Tensor, dims: &[String]) -> Tensor {
    let names: Vec<&str> = dims.iter().map(String::as_str).collect();
    mask.max_over(&names)
}

/// Reduces with `min` over the given dimension names.
pub fn min_over(values: &Tensor, dims: &[String]) -> Tensor {
    let names: Vec<&str> = dims.iter().map(String::as_str).collect();
    values.min_over(&names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_length() {
        let v = Tensor::vector(&[3.0, 4.0]);
        assert_eq!(length(&v).as_scalar().unwrap(), 5.0);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let v = Tensor::vector(&[1.0, 0.0, 7.0]);
        let r = rotate_xy(&v, &Tensor::scalar(FRAC_PI_2)).unwrap();
        assert!(r.all_close(&Tensor::vector(&[0.0, 1.0, 7.0]), 1e-12));
    }

    #[test]
    fn test_rank_one_rotation_is_identity() {
        let v = Tensor::vector(&[2.0]);
        assert_eq!(rotate_xy(&v, &Tensor::scalar(1.0)).unwrap(), v);
    }
}
