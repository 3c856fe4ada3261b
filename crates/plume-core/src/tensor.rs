//! Shape-annotated tensors.
//!
//! A [`Tensor`] pairs an [`ndarray::ArrayD`] buffer with a [`Shape`]. The
//! buffer's axes always follow the shape's order, so operations address
//! dimensions by name and never by position. Binary operations broadcast by
//! name: the operands are aligned onto the merged shape before the values
//! are combined.
//!
//! # Example
//!
//! ```
//! use plume_core::{spatial, Dim, Tensor};
//!
//! let grid = Tensor::ones(spatial(&[("x", 4)]));
//! let scale = Tensor::wrap(&[1.0, 2.0], Dim::batch("b", 2)).unwrap();
//! let scaled = grid.try_mul(&scale).unwrap();
//! assert_eq!(scaled.shape().names(), vec!["b", "x"]);
//! assert_eq!(scaled.sum(), 12.0);
//! ```

use std::fmt;
use std::ops::{Neg, Range};

use glam::{DVec2, DVec3};
use ndarray::{Array1, ArrayD, Axis, IxDyn, Slice, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PlumeError, Result};
use crate::shape::{Dim, DimIndex, Shape, VECTOR_DIM};

/// Numeric precision of a tensor.
///
/// Values are stored as `f64`; `Float32` tensors round every result through
/// `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DType {
    /// Single precision.
    Float32,
    /// Double precision.
    #[default]
    Float64,
}

impl DType {
    /// The wider of two precisions.
    pub fn promote(self, other: DType) -> DType {
        if self == DType::Float64 || other == DType::Float64 {
            DType::Float64
        } else {
            DType::Float32
        }
    }

    /// Bits per value.
    pub fn bits(self) -> u32 {
        match self {
            DType::Float32 => 32,
            DType::Float64 => 64,
        }
    }
}

/// A value annotated with a [`Shape`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tensor {
    shape: Shape,
    data: ArrayD<f64>,
    dtype: DType,
}

impl Tensor {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Wraps an array whose axes follow `shape`.
    pub fn from_array(shape: Shape, data: ArrayD<f64>) -> Result<Self> {
        if data.shape() != shape.sizes().as_slice() {
            return Err(PlumeError::shape_mismatch(
                shape.to_string(),
                format!("array has extents {:?}", data.shape()),
            ));
        }
        Ok(Self {
            shape,
            data,
            dtype: DType::Float64,
        })
    }

    /// Builds a tensor from row-major values.
    pub fn from_vec(shape: Shape, values: Vec<f64>) -> Result<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(&shape.sizes()), values)
            .map_err(|e| PlumeError::shape_mismatch(shape.to_string(), e.to_string()))?;
        Ok(Self {
            shape,
            data,
            dtype: DType::Float64,
        })
    }

    /// A rank-0 tensor.
    pub fn scalar(value: f64) -> Self {
        Self::full(Shape::empty(), value)
    }

    /// A tensor filled with one value.
    pub fn full(shape: Shape, value: f64) -> Self {
        let data = ArrayD::from_elem(IxDyn(&shape.sizes()), value);
        Self {
            shape,
            data,
            dtype: DType::Float64,
        }
    }

    /// A tensor of zeros.
    pub fn zeros(shape: Shape) -> Self {
        Self::full(shape, 0.0)
    }

    /// A tensor of ones.
    pub fn ones(shape: Shape) -> Self {
        Self::full(shape, 1.0)
    }

    /// Wraps a list of values along a single dimension.
    ///
    /// The size of `dim` is replaced by the number of values.
    pub fn wrap(values: &[f64], dim: Dim) -> Result<Self> {
        let dim = dim.with_size(values.len());
        Self::from_vec(Shape::from_dim(dim), values.to_vec())
    }

    /// A vector along the `vector` channel.
    pub fn vector(components: &[f64]) -> Self {
        let shape = Shape::from_dim(Dim::vector(components.len()));
        let data = Array1::from_vec(components.to_vec()).into_dyn();
        Self {
            shape,
            data,
            dtype: DType::Float64,
        }
    }

    /// `dim.size()` evenly spaced values from `start` to `stop` inclusive.
    pub fn linspace(start: f64, stop: f64, dim: Dim) -> Self {
        let n = dim.size();
        let values: Vec<f64> = match n {
            0 => Vec::new(),
            1 => vec![start],
            _ => (0..n)
                .map(|i| start + (stop - start) * i as f64 / (n - 1) as f64)
                .collect(),
        };
        let data = Array1::from_vec(values).into_dyn();
        Self {
            shape: Shape::from_dim(dim),
            data,
            dtype: DType::Float64,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The underlying buffer, axes in shape order.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Consumes the tensor, returning its buffer.
    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    /// Numeric precision.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the tensor holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All values in row-major order.
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// The single value of a tensor with volume 1.
    pub fn as_scalar(&self) -> Result<f64> {
        if self.data.len() != 1 {
            return Err(PlumeError::shape_mismatch(
                self.shape.to_string(),
                "expected a single value",
            ));
        }
        Ok(self.data.iter().next().copied().unwrap_or_default())
    }

    /// Returns `true` if every value is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Converts to another precision.
    pub fn cast(&self, dtype: DType) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.clone(),
            dtype,
        }
        .rounded()
    }

    fn rounded(mut self) -> Self {
        if self.dtype == DType::Float32 {
            self.data.mapv_inplace(|v| v as f32 as f64);
        }
        self
    }

    // ------------------------------------------------------------------
    // Alignment
    // ------------------------------------------------------------------

    /// Returns the buffer broadcast onto `target`.
    ///
    /// Every dimension of this tensor must be present in `target`.
    pub fn aligned(&self, target: &Shape) -> Result<ArrayD<f64>> {
        if &self.shape == target {
            return Ok(self.data.clone());
        }
        let mut order = Vec::with_capacity(self.shape.rank());
        for (axis, dim) in self.shape.iter().enumerate() {
            order.push((target.require(dim.name())?, axis));
        }
        order.sort_unstable();
        let perm: Vec<usize> = order.iter().map(|(_, axis)| *axis).collect();
        let expanded: Vec<usize> = target
            .iter()
            .map(|d| self.shape.size_of(d.name()).unwrap_or(1))
            .collect();
        let reshaped = self
            .data
            .clone()
            .permuted_axes(IxDyn(&perm))
            .as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(&expanded))
            .map_err(|e| PlumeError::shape_mismatch(target.to_string(), e.to_string()))?;
        let view = reshaped.broadcast(IxDyn(&target.sizes())).ok_or_else(|| {
            PlumeError::shape_mismatch(
                target.to_string(),
                format!("cannot broadcast {} onto it", self.shape),
            )
        })?;
        Ok(view.to_owned())
    }

    /// Broadcasts this tensor onto a larger shape.
    pub fn broadcast_to(&self, target: &Shape) -> Result<Tensor> {
        let merged = self.shape.merge(target)?;
        Ok(Tensor {
            data: self.aligned(&merged)?,
            shape: merged,
            dtype: self.dtype,
        })
    }

    /// Adds a dimension, repeating the values along it.
    pub fn expand(&self, dim: Dim) -> Result<Tensor> {
        let shape = self.shape.with(dim)?;
        Ok(Tensor {
            data: self.aligned(&shape)?,
            shape,
            dtype: self.dtype,
        })
    }

    // ------------------------------------------------------------------
    // Elementwise
    // ------------------------------------------------------------------

    /// Applies a function to every value.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.mapv(f),
            dtype: self.dtype,
        }
        .rounded()
    }

    /// Combines two tensors elementwise after broadcasting them by name.
    pub fn zip_with(&self, other: &Tensor, f: impl Fn(f64, f64) -> f64) -> Result<Tensor> {
        let shape = self.shape.merge(&other.shape)?;
        let a = self.aligned(&shape)?;
        let b = other.aligned(&shape)?;
        let data = Zip::from(&a).and(&b).map_collect(|&x, &y| f(x, y));
        Ok(Tensor {
            shape,
            data,
            dtype: self.dtype.promote(other.dtype),
        }
        .rounded())
    }

    /// Elementwise sum.
    pub fn try_add(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Elementwise difference.
    pub fn try_sub(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Elementwise product.
    pub fn try_mul(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Elementwise quotient.
    pub fn try_div(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with(other, |a, b| a / b)
    }

    /// Elementwise quotient that yields 0 where the divisor is 0.
    pub fn safe_div(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with(other, |a, b| if b == 0.0 { 0.0 } else { a / b })
    }

    /// Multiplies every value by a constant.
    pub fn scale(&self, factor: f64) -> Tensor {
        self.map(|v| v * factor)
    }

    /// Adds a constant to every value.
    pub fn offset(&self, amount: f64) -> Tensor {
        self.map(|v| v + amount)
    }

    /// Absolute values.
    pub fn abs(&self) -> Tensor {
        self.map(f64::abs)
    }

    /// Square roots.
    pub fn sqrt(&self) -> Tensor {
        self.map(f64::sqrt)
    }

    /// Squares.
    pub fn square(&self) -> Tensor {
        self.map(|v| v * v)
    }

    /// 1 where `a <= b`, else 0.
    pub fn less_equal(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with(other, |a, b| if a <= b { 1.0 } else { 0.0 })
    }

    /// Picks `if_true` where `mask` is non-zero and `if_false` elsewhere.
    pub fn where_mask(mask: &Tensor, if_true: &Tensor, if_false: &Tensor) -> Result<Tensor> {
        let shape = Shape::merge_all([&mask.shape, &if_true.shape, &if_false.shape])?;
        let m = mask.aligned(&shape)?;
        let t = if_true.aligned(&shape)?;
        let f = if_false.aligned(&shape)?;
        let data = Zip::from(&m)
            .and(&t)
            .and(&f)
            .map_collect(|&m, &t, &f| if m != 0.0 { t } else { f });
        Ok(Tensor {
            shape,
            data,
            dtype: if_true.dtype.promote(if_false.dtype),
        })
    }

    // ------------------------------------------------------------------
    // Reductions
    // ------------------------------------------------------------------

    fn reduce(&self, dims: &[&str], init: f64, f: impl Fn(f64, f64) -> f64) -> Tensor {
        let mut data = self.data.clone();
        let mut shape = self.shape.clone();
        for name in dims {
            if let Some(axis) = shape.index_of(name) {
                data = data.fold_axis(Axis(axis), init, |acc, x| f(*acc, *x));
                shape = shape.without(&[name]);
            }
        }
        Tensor {
            shape,
            data,
            dtype: self.dtype,
        }
    }

    /// Sums over the named dimensions. Absent names are ignored.
    pub fn sum_over(&self, dims: &[&str]) -> Tensor {
        self.reduce(dims, 0.0, |a, b| a + b)
    }

    /// Averages over the named dimensions. Absent names are ignored.
    pub fn mean_over(&self, dims: &[&str]) -> Tensor {
        let count: usize = dims.iter().filter_map(|d| self.shape.size_of(d)).product();
        self.sum_over(dims).scale(1.0 / count.max(1) as f64)
    }

    /// Maximum over the named dimensions. Absent names are ignored.
    pub fn max_over(&self, dims: &[&str]) -> Tensor {
        self.reduce(dims, f64::NEG_INFINITY, f64::max)
    }

    /// Minimum over the named dimensions. Absent names are ignored.
    pub fn min_over(&self, dims: &[&str]) -> Tensor {
        self.reduce(dims, f64::INFINITY, f64::min)
    }

    /// Maximum absolute value over the named dimensions. NaN propagates.
    pub fn max_abs_over(&self, dims: &[&str]) -> Tensor {
        self.reduce(dims, 0.0, max_abs_step)
    }

    /// Product over the named dimensions.
    pub fn prod_over(&self, dims: &[&str]) -> Tensor {
        self.reduce(dims, 1.0, |a, b| a * b)
    }

    /// Sum of all values.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Largest absolute value; 0 for an empty tensor. NaN propagates.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |acc, v| max_abs_step(acc, *v))
    }

    /// Product followed by a sum over `dims`.
    pub fn dot(&self, other: &Tensor, dims: &[&str]) -> Result<Tensor> {
        Ok(self.try_mul(other)?.sum_over(dims))
    }

    // ------------------------------------------------------------------
    // Indexing and stacking
    // ------------------------------------------------------------------

    /// Indexes one dimension by position or range.
    pub fn select(&self, dim: &str, index: impl Into<DimIndex>) -> Result<Tensor> {
        let index = index.into();
        let axis = self.shape.require(dim)?;
        let shape = self.shape.after_index(dim, &index)?;
        let data = match &index {
            DimIndex::At(i) => self.data.index_axis(Axis(axis), *i).to_owned(),
            DimIndex::Range(r) => self
                .data
                .slice_axis(Axis(axis), Slice::from(r.clone()))
                .to_owned(),
        };
        Ok(Tensor {
            shape,
            data,
            dtype: self.dtype,
        })
    }

    /// Like [`select`](Self::select), but returns the tensor unchanged when
    /// the dimension is absent.
    pub fn select_or_keep(&self, dim: &str, index: &DimIndex) -> Result<Tensor> {
        if self.shape.contains(dim) {
            self.select(dim, index.clone())
        } else {
            Ok(self.clone())
        }
    }

    /// Slices a contiguous range of one dimension.
    pub fn slice(&self, dim: &str, range: Range<usize>) -> Result<Tensor> {
        self.select(dim, DimIndex::Range(range))
    }

    /// Selects a named item of the `vector` channel, e.g. `"x"`.
    pub fn component(&self, item: &str) -> Result<Tensor> {
        let dim = self.shape.get(VECTOR_DIM).ok_or_else(|| {
            PlumeError::shape_mismatch(VECTOR_DIM, format!("no vector channel in {}", self.shape))
        })?;
        let index = dim.item_index(item).ok_or_else(|| {
            PlumeError::shape_mismatch(VECTOR_DIM, format!("no component named '{item}'"))
        })?;
        self.select(VECTOR_DIM, index)
    }

    /// Splits along a dimension into lower-rank tensors.
    pub fn unstack(&self, dim: &str) -> Result<Vec<Tensor>> {
        let size = self
            .shape
            .size_of(dim)
            .ok_or_else(|| PlumeError::shape_mismatch(dim, "cannot unstack a missing dimension"))?;
        (0..size).map(|i| self.select(dim, i)).collect()
    }

    /// Unstacks along `dim`, or repeats the tensor `n` times if the
    /// dimension is absent.
    pub fn unstack_or_repeat(&self, dim: &str, n: usize) -> Result<Vec<Tensor>> {
        match self.shape.size_of(dim) {
            Some(size) if size == n => self.unstack(dim),
            Some(size) => Err(PlumeError::shape_mismatch(
                dim,
                format!("expected size {n}, got {size}"),
            )),
            None => Ok(vec![self.clone(); n]),
        }
    }

    /// Stacks tensors along a new dimension.
    ///
    /// The operands are broadcast against each other first; the size of
    /// `dim` is replaced by the number of tensors.
    pub fn stack(values: &[Tensor], dim: Dim) -> Result<Tensor> {
        let shapes: Vec<Shape> = values.iter().map(|t| t.shape.clone()).collect();
        let stacked = Shape::stack(dim.clone(), &shapes)?;
        let (_, inner) = stacked.unstack(dim.name())?;
        let arrays = values
            .iter()
            .map(|t| t.aligned(&inner))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<_> = arrays.iter().map(|a| a.view()).collect();
        let axis = stacked.require(dim.name())?;
        let data = ndarray::stack(Axis(axis), &views)
            .map_err(|e| PlumeError::shape_mismatch(dim.name(), e.to_string()))?;
        let dtype = values
            .iter()
            .fold(DType::Float32, |acc, t| acc.promote(t.dtype));
        Ok(Tensor {
            shape: stacked,
            data,
            dtype,
        })
    }

    /// Concatenates tensors along an existing dimension.
    pub fn concat(values: &[Tensor], dim: &str) -> Result<Tensor> {
        let first = values
            .first()
            .ok_or_else(|| PlumeError::invalid(format!("cannot concatenate zero tensors along '{dim}'")))?;
        let axis = first.shape.require(dim)?;
        let mut total = 0;
        for value in values {
            if value.shape.without(&[dim]) != first.shape.without(&[dim])
                || value.shape.index_of(dim) != Some(axis)
            {
                return Err(PlumeError::shape_mismatch(
                    dim,
                    format!("cannot concatenate {} with {}", first.shape, value.shape),
                ));
            }
            total += value.shape.size_of(dim).unwrap_or(0);
        }
        let views: Vec<_> = values.iter().map(|t| t.data.view()).collect();
        let data = ndarray::concatenate(Axis(axis), &views)
            .map_err(|e| PlumeError::shape_mismatch(dim, e.to_string()))?;
        Ok(Tensor {
            shape: first.shape.with_dim_size(dim, total)?,
            data,
            dtype: first.dtype,
        })
    }

    // ------------------------------------------------------------------
    // Comparison
    // ------------------------------------------------------------------

    /// Returns `true` if both tensors have the same dimensions and all
    /// values agree within `tolerance`.
    pub fn all_close(&self, other: &Tensor, tolerance: f64) -> bool {
        if !self.shape.contains_shape(&other.shape) || !other.shape.contains_shape(&self.shape) {
            return false;
        }
        match other.aligned(&self.shape) {
            Ok(b) => Zip::from(&self.data)
                .and(&b)
                .fold(true, |ok, &x, &y| ok && (x - y).abs() <= tolerance),
            Err(_) => false,
        }
    }
}

fn max_abs_step(acc: f64, value: f64) -> f64 {
    if acc.is_nan() || value.is_nan() {
        f64::NAN
    } else {
        acc.max(value.abs())
    }
}

impl Neg for Tensor {
    type Output = Tensor;

    fn neg(self) -> Tensor {
        self.map(|v| -v)
    }
}

impl Neg for &Tensor {
    type Output = Tensor;

    fn neg(self) -> Tensor {
        self.map(|v| -v)
    }
}

impl From<f64> for Tensor {
    fn from(value: f64) -> Self {
        Tensor::scalar(value)
    }
}

impl From<DVec2> for Tensor {
    fn from(v: DVec2) -> Self {
        Tensor::vector(&v.to_array())
    }
}

impl From<DVec3> for Tensor {
    fn from(v: DVec3) -> Self {
        Tensor::vector(&v.to_array())
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_SHOWN: usize = 8;
        let shown: Vec<String> = self
            .data
            .iter()
            .take(MAX_SHOWN)
            .map(|v| format!("{v:.4}"))
            .collect();
        let ellipsis = if self.data.len() > MAX_SHOWN { ", ..." } else { "" };
        write!(f, "{} [{}{}]", self.shape, shown.join(", "), ellipsis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{batch, instance, spatial, vector};

    #[test]
    fn test_broadcast_by_name() {
        let a = Tensor::from_vec(spatial(&[("x", 3)]), vec![1.0, 2.0, 3.0]).unwrap();
        let b = Tensor::wrap(&[10.0, 20.0], Dim::batch("b", 2)).unwrap();
        let sum = a.try_add(&b).unwrap();
        assert_eq!(sum.shape().names(), vec!["b", "x"]);
        assert_eq!(sum.values(), vec![11.0, 12.0, 13.0, 21.0, 22.0, 23.0]);
    }

    #[test]
    fn test_alignment_reorders_axes() {
        let yx = Tensor::from_vec(
            spatial(&[("y", 2), ("x", 3)]),
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();
        let xy = Tensor::zeros(spatial(&[("x", 3), ("y", 2)]));
        let sum = xy.try_add(&yx).unwrap();
        assert_eq!(sum.shape().names(), vec!["x", "y"]);
        assert_eq!(sum.values(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_binary_shape_mismatch() {
        let a = Tensor::zeros(spatial(&[("x", 3)]));
        let b = Tensor::zeros(spatial(&[("x", 4)]));
        assert!(matches!(
            a.try_add(&b),
            Err(PlumeError::ShapeMismatch { ref dim, .. }) if dim == "x"
        ));
    }

    #[test]
    fn test_stack_and_unstack() {
        let a = Tensor::vector(&[1.0, 2.0]);
        let b = Tensor::vector(&[3.0, 4.0]);
        let stacked = Tensor::stack(&[a.clone(), b.clone()], Dim::instance("points", 0)).unwrap();
        assert_eq!(stacked.shape().names(), vec!["points", "vector"]);
        let parts = stacked.unstack("points").unwrap();
        assert_eq!(parts, vec![a, b]);
    }

    #[test]
    fn test_stack_broadcasts_operands() {
        let a = Tensor::scalar(1.0);
        let b = Tensor::vector(&[3.0, 4.0]);
        let stacked = Tensor::stack(&[a, b], Dim::batch("b", 0)).unwrap();
        assert_eq!(stacked.values(), vec![1.0, 1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_select_and_slice() {
        let t = Tensor::linspace(0.0, 9.0, Dim::spatial("x", 10));
        assert_eq!(t.select("x", 3).unwrap().as_scalar().unwrap(), 3.0);
        assert_eq!(t.slice("x", 2..5).unwrap().values(), vec![2.0, 3.0, 4.0]);
        assert!(t.select("y", 0).is_err());
    }

    #[test]
    fn test_component_by_item_name() {
        let v = Tensor::vector(&[1.0, 2.0, 3.0]);
        assert_eq!(v.component("y").unwrap().as_scalar().unwrap(), 2.0);
        assert!(v.component("w").is_err());
    }

    #[test]
    fn test_reductions() {
        let t = Tensor::from_vec(
            batch("b", 2).concat(&spatial(&[("x", 3)])).unwrap(),
            vec![1.0, -5.0, 3.0, 4.0, 5.0, 6.0],
        )
        .unwrap();
        assert_eq!(t.sum_over(&["x"]).values(), vec![-1.0, 15.0]);
        assert_eq!(t.max_over(&["x"]).values(), vec![3.0, 6.0]);
        assert_eq!(t.max_abs_over(&["x"]).values(), vec![5.0, 6.0]);
        assert_eq!(t.mean_over(&["b"]).values(), vec![2.5, 0.0, 4.5]);
        assert_eq!(t.sum_over(&["missing"]).shape(), t.shape());
        assert_eq!(t.max_abs(), 6.0);
    }

    #[test]
    fn test_unstack_or_repeat() {
        let t = Tensor::vector(&[1.0, 2.0]);
        assert_eq!(t.unstack_or_repeat("obj", 3).unwrap().len(), 3);
        let per_obj = Tensor::zeros(instance("obj", 2).concat(&vector(2)).unwrap());
        assert_eq!(per_obj.unstack_or_repeat("obj", 2).unwrap().len(), 2);
        assert!(per_obj.unstack_or_repeat("obj", 3).is_err());
    }

    #[test]
    fn test_where_mask() {
        let mask = Tensor::from_vec(spatial(&[("x", 3)]), vec![1.0, 0.0, 1.0]).unwrap();
        let result =
            Tensor::where_mask(&mask, &Tensor::scalar(7.0), &Tensor::scalar(-1.0)).unwrap();
        assert_eq!(result.values(), vec![7.0, -1.0, 7.0]);
    }

    #[test]
    fn test_safe_div() {
        let a = Tensor::from_vec(spatial(&[("x", 2)]), vec![1.0, 1.0]).unwrap();
        let b = Tensor::from_vec(spatial(&[("x", 2)]), vec![0.0, 2.0]).unwrap();
        assert_eq!(a.safe_div(&b).unwrap().values(), vec![0.0, 0.5]);
    }

    #[test]
    fn test_float32_rounding() {
        let t = Tensor::scalar(0.1).cast(DType::Float32);
        assert_eq!(t.as_scalar().unwrap(), 0.1f32 as f64);
        let promoted = t.try_add(&Tensor::scalar(0.1)).unwrap();
        assert_eq!(promoted.dtype(), DType::Float64);
    }

    #[test]
    fn test_concat() {
        let a = Tensor::from_vec(spatial(&[("x", 2)]), vec![1.0, 2.0]).unwrap();
        let b = Tensor::from_vec(spatial(&[("x", 1)]), vec![3.0]).unwrap();
        let c = Tensor::concat(&[a, b], "x").unwrap();
        assert_eq!(c.values(), vec![1.0, 2.0, 3.0]);
        assert_eq!(c.shape().size_of("x"), Some(3));
    }

    #[test]
    fn test_all_close_ignores_axis_order() {
        let a = Tensor::from_vec(spatial(&[("x", 2), ("y", 1)]), vec![1.0, 2.0]).unwrap();
        let b = Tensor::from_vec(spatial(&[("y", 1), ("x", 2)]), vec![1.0, 2.0 + 1e-9]).unwrap();
        assert!(a.all_close(&b, 1e-6));
        assert!(!a.all_close(&Tensor::scalar(1.0), 1e-6));
    }

    #[test]
    fn test_from_glam() {
        let t: Tensor = DVec3::new(1.0, 2.0, 3.0).into();
        assert_eq!(t.shape().names(), vec!["vector"]);
        assert_eq!(t.component("z").unwrap().as_scalar().unwrap(), 3.0);
    }
}
