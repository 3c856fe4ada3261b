//! Named, typed dimensions.
//!
//! A [`Shape`] is an ordered list of [`Dim`]s. Every dimension has a unique
//! name, a size and a [`DimKind`] which decides how it broadcasts and how it
//! may be reduced. Dimensions are kept grouped by kind in the order
//! batch, instance, spatial, channel; tensor data always follows the shape's
//! order.
//!
//! # Example
//!
//! ```
//! use plume_core::{batch, spatial, Dim, Shape};
//!
//! let a = spatial(&[("x", 4), ("y", 3)]);
//! let b = batch("b", 2);
//! let merged = a.merge(&b).unwrap();
//! assert_eq!(merged.names(), vec!["b", "x", "y"]);
//!
//! let stacked = Shape::stack(Dim::batch("run", 0), &[a.clone(), a]).unwrap();
//! assert_eq!(stacked.size_of("run"), Some(2));
//! ```

use std::fmt;
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PlumeError, Result};

/// Name of the channel dimension holding vector components.
pub const VECTOR_DIM: &str = "vector";

const VECTOR_ITEMS: [&str; 3] = ["x", "y", "z"];

/// Kind of a dimension.
///
/// The declaration order is the canonical dimension order within a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DimKind {
    /// Independent copies of a computation; broadcasts freely.
    Batch,
    /// Collections of objects (particles, shapes); requires explicit aggregation.
    Instance,
    /// Grid axes; sizes must match unless one is 1.
    Spatial,
    /// Components of a value, e.g. `vector`.
    Channel,
}

impl DimKind {
    /// Lowercase name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            DimKind::Batch => "batch",
            DimKind::Instance => "instance",
            DimKind::Spatial => "spatial",
            DimKind::Channel => "channel",
        }
    }
}

impl fmt::Display for DimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single named dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dim {
    name: String,
    size: usize,
    kind: DimKind,
    item_names: Option<Vec<String>>,
}

impl Dim {
    /// Creates a dimension without item names.
    pub fn new(name: impl Into<String>, size: usize, kind: DimKind) -> Self {
        Self {
            name: name.into(),
            size,
            kind,
            item_names: None,
        }
    }

    /// Creates a batch dimension.
    pub fn batch(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, size, DimKind::Batch)
    }

    /// Creates an instance dimension.
    pub fn instance(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, size, DimKind::Instance)
    }

    /// Creates a spatial dimension.
    pub fn spatial(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, size, DimKind::Spatial)
    }

    /// Creates a channel dimension.
    pub fn channel(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, size, DimKind::Channel)
    }

    /// Creates a dimension whose size is given by its item names.
    pub fn with_items(name: impl Into<String>, kind: DimKind, items: &[&str]) -> Self {
        Self {
            name: name.into(),
            size: items.len(),
            kind,
            item_names: Some(items.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// The `vector` channel for the given spatial rank.
    ///
    /// Components are named `x`, `y`, `z` up to rank 3.
    pub fn vector(rank: usize) -> Self {
        if rank <= VECTOR_ITEMS.len() {
            Self::with_items(VECTOR_DIM, DimKind::Channel, &VECTOR_ITEMS[..rank])
        } else {
            Self::channel(VECTOR_DIM, rank)
        }
    }

    /// Name of the dimension.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entries along the dimension.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Kind of the dimension.
    pub fn kind(&self) -> DimKind {
        self.kind
    }

    /// Item names, if the dimension carries any.
    pub fn item_names(&self) -> Option<&[String]> {
        self.item_names.as_deref()
    }

    /// Position of a named item.
    pub fn item_index(&self, item: &str) -> Option<usize> {
        self.item_names
            .as_ref()
            .and_then(|items| items.iter().position(|i| i == item))
    }

    /// Returns a copy with a different size. Item names are sliced along.
    pub fn with_range(&self, range: Range<usize>) -> Self {
        Self {
            name: self.name.clone(),
            size: range.len(),
            kind: self.kind,
            item_names: self.item_names.as_ref().map(|items| items[range].to_vec()),
        }
    }

    /// Returns a copy with a different size, dropping item names if they no
    /// longer fit.
    pub fn with_size(&self, size: usize) -> Self {
        let item_names = self
            .item_names
            .as_ref()
            .filter(|items| items.len() == size)
            .cloned();
        Self {
            name: self.name.clone(),
            size,
            kind: self.kind,
            item_names,
        }
    }

    fn merge(&self, other: &Dim) -> Result<Dim> {
        if self.kind != other.kind {
            return Err(PlumeError::shape_mismatch(
                &self.name,
                format!("kinds {} and {} differ", self.kind, other.kind),
            ));
        }
        if self.size == other.size {
            let mut merged = self.clone();
            if merged.item_names.is_none() {
                merged.item_names = other.item_names.clone();
            }
            return Ok(merged);
        }
        if self.size == 1 {
            return Ok(other.clone());
        }
        if other.size == 1 {
            return Ok(self.clone());
        }
        let reason = match self.kind {
            DimKind::Spatial => format!(
                "spatial sizes {} and {} must match unless one is 1",
                self.size, other.size
            ),
            kind => format!(
                "{} sizes {} and {} cannot be broadcast",
                kind, self.size, other.size
            ),
        };
        Err(PlumeError::shape_mismatch(&self.name, reason))
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item_names {
            Some(items) => write!(f, "{}:{}={}", self.name, self.kind, items.join(",")),
            None => write!(f, "{}:{}={}", self.name, self.kind, self.size),
        }
    }
}

/// Index into a single dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimIndex {
    /// A single entry; the dimension is removed.
    At(usize),
    /// A contiguous range; the dimension is kept with the range's length.
    Range(Range<usize>),
}

impl From<usize> for DimIndex {
    fn from(index: usize) -> Self {
        DimIndex::At(index)
    }
}

impl From<Range<usize>> for DimIndex {
    fn from(range: Range<usize>) -> Self {
        DimIndex::Range(range)
    }
}

impl DimIndex {
    /// Checks the index against a dimension size.
    pub fn validate(&self, dim: &Dim) -> Result<()> {
        let ok = match self {
            DimIndex::At(i) => *i < dim.size(),
            DimIndex::Range(r) => r.start < r.end && r.end <= dim.size(),
        };
        if ok {
            Ok(())
        } else {
            Err(PlumeError::shape_mismatch(
                dim.name(),
                format!("index {:?} out of bounds for size {}", self, dim.size()),
            ))
        }
    }

    /// Number of entries the index keeps.
    pub fn len(&self) -> usize {
        match self {
            DimIndex::At(_) => 1,
            DimIndex::Range(r) => r.len(),
        }
    }

    /// Returns `true` for an empty range.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered set of named dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Shape {
    dims: Vec<Dim>,
}

/// A shape with a single batch dimension.
pub fn batch(name: &str, size: usize) -> Shape {
    Shape::from_dim(Dim::batch(name, size))
}

/// A shape with a single instance dimension.
pub fn instance(name: &str, size: usize) -> Shape {
    Shape::from_dim(Dim::instance(name, size))
}

/// A shape with one spatial dimension per entry.
pub fn spatial(dims: &[(&str, usize)]) -> Shape {
    Shape {
        dims: dims
            .iter()
            .map(|(name, size)| Dim::spatial(*name, *size))
            .collect(),
    }
}

/// A shape with a single channel dimension.
pub fn channel(name: &str, size: usize) -> Shape {
    Shape::from_dim(Dim::channel(name, size))
}

/// The `vector` channel of the given rank as a shape.
pub fn vector(rank: usize) -> Shape {
    Shape::from_dim(Dim::vector(rank))
}

impl Shape {
    /// The empty (scalar) shape.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A shape holding a single dimension.
    pub fn from_dim(dim: Dim) -> Self {
        Self { dims: vec![dim] }
    }

    /// Builds a shape from dimensions, sorting them into canonical order.
    ///
    /// Fails if a name occurs twice.
    pub fn from_dims(dims: impl IntoIterator<Item = Dim>) -> Result<Self> {
        let mut shape = Self::empty();
        for dim in dims {
            shape = shape.with(dim)?;
        }
        Ok(shape)
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns `true` if the shape has no dimensions.
    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Product of all sizes; 1 for the empty shape.
    pub fn volume(&self) -> usize {
        self.dims.iter().map(Dim::size).product()
    }

    /// All dimensions in order.
    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    /// Iterates over the dimensions in order.
    pub fn iter(&self) -> impl Iterator<Item = &Dim> {
        self.dims.iter()
    }

    /// Dimension names in order.
    pub fn names(&self) -> Vec<&str> {
        self.dims.iter().map(Dim::name).collect()
    }

    /// Dimension sizes in order.
    pub fn sizes(&self) -> Vec<usize> {
        self.dims.iter().map(Dim::size).collect()
    }

    /// Looks up a dimension by name.
    pub fn get(&self, name: &str) -> Option<&Dim> {
        self.dims.iter().find(|d| d.name == name)
    }

    /// Position of a dimension.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == name)
    }

    /// Returns `true` if a dimension with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Size of a named dimension.
    pub fn size_of(&self, name: &str) -> Option<usize> {
        self.get(name).map(Dim::size)
    }

    /// Returns `true` if every dimension of `other` is present here with the
    /// same size.
    pub fn contains_shape(&self, other: &Shape) -> bool {
        other
            .dims
            .iter()
            .all(|d| self.get(&d.name).is_some_and(|own| own.size == d.size))
    }

    /// Adds a dimension at the end of its kind group.
    pub fn with(&self, dim: Dim) -> Result<Shape> {
        self.insert(dim, false)
    }

    fn insert(&self, dim: Dim, leading: bool) -> Result<Shape> {
        if self.contains(&dim.name) {
            return Err(PlumeError::shape_mismatch(
                &dim.name,
                "dimension names must be unique within a shape",
            ));
        }
        let position = if leading {
            self.dims
                .iter()
                .position(|d| d.kind >= dim.kind)
                .unwrap_or(self.dims.len())
        } else {
            self.dims
                .iter()
                .position(|d| d.kind > dim.kind)
                .unwrap_or(self.dims.len())
        };
        let mut dims = self.dims.clone();
        dims.insert(position, dim);
        Ok(Shape { dims })
    }

    /// Concatenates two shapes with disjoint names.
    pub fn concat(&self, other: &Shape) -> Result<Shape> {
        other.dims.iter().try_fold(self.clone(), |acc, d| acc.with(d.clone()))
    }

    /// Removes the named dimensions. Unknown names are ignored.
    pub fn without(&self, names: &[&str]) -> Shape {
        Shape {
            dims: self
                .dims
                .iter()
                .filter(|d| !names.contains(&d.name.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Keeps only the named dimensions, in this shape's order.
    pub fn only(&self, names: &[&str]) -> Shape {
        Shape {
            dims: self
                .dims
                .iter()
                .filter(|d| names.contains(&d.name.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Keeps only dimensions of the given kind.
    pub fn of_kind(&self, kind: DimKind) -> Shape {
        Shape {
            dims: self.dims.iter().filter(|d| d.kind == kind).cloned().collect(),
        }
    }

    /// Batch dimensions.
    pub fn batch(&self) -> Shape {
        self.of_kind(DimKind::Batch)
    }

    /// Instance dimensions.
    pub fn instance(&self) -> Shape {
        self.of_kind(DimKind::Instance)
    }

    /// Spatial dimensions.
    pub fn spatial(&self) -> Shape {
        self.of_kind(DimKind::Spatial)
    }

    /// Channel dimensions.
    pub fn channel(&self) -> Shape {
        self.of_kind(DimKind::Channel)
    }

    /// All dimensions that are not batch dimensions.
    pub fn non_batch(&self) -> Shape {
        Shape {
            dims: self
                .dims
                .iter()
                .filter(|d| d.kind != DimKind::Batch)
                .cloned()
                .collect(),
        }
    }

    /// Replaces a dimension by a resized copy.
    pub fn with_dim_size(&self, name: &str, size: usize) -> Result<Shape> {
        let index = self.require(name)?;
        let mut dims = self.dims.clone();
        dims[index] = dims[index].with_size(size);
        Ok(Shape { dims })
    }

    /// Shape after indexing one dimension.
    pub fn after_index(&self, name: &str, index: &DimIndex) -> Result<Shape> {
        let position = self.require(name)?;
        index.validate(&self.dims[position])?;
        let mut dims = self.dims.clone();
        match index {
            DimIndex::At(_) => {
                dims.remove(position);
            }
            DimIndex::Range(range) => {
                dims[position] = dims[position].with_range(range.clone());
            }
        }
        Ok(Shape { dims })
    }

    /// Position of a dimension, or a mismatch error naming it.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| {
            PlumeError::shape_mismatch(name, format!("dimension not present in {self}"))
        })
    }

    /// Broadcasts two shapes against each other.
    ///
    /// The result keeps this shape's order; dimensions only present in
    /// `other` are appended to their kind group.
    pub fn merge(&self, other: &Shape) -> Result<Shape> {
        let mut dims = Vec::with_capacity(self.rank() + other.rank());
        for dim in &self.dims {
            match other.get(&dim.name) {
                Some(o) => dims.push(dim.merge(o)?),
                None => dims.push(dim.clone()),
            }
        }
        let mut merged = Shape { dims };
        for dim in &other.dims {
            if !merged.contains(&dim.name) {
                merged = merged.with(dim.clone())?;
            }
        }
        Ok(merged)
    }

    /// Broadcasts any number of shapes.
    pub fn merge_all<'a>(shapes: impl IntoIterator<Item = &'a Shape>) -> Result<Shape> {
        shapes
            .into_iter()
            .try_fold(Shape::empty(), |acc, s| acc.merge(s))
    }

    /// Combines `shapes` into one, inserting `dim` as the leading dimension
    /// of its kind group.
    ///
    /// The size of `dim` is replaced by the number of shapes. Item names on
    /// `dim` are kept when there is one per shape.
    pub fn stack(dim: Dim, shapes: &[Shape]) -> Result<Shape> {
        if shapes.is_empty() {
            return Err(PlumeError::invalid(format!(
                "cannot stack zero shapes along '{}'",
                dim.name
            )));
        }
        if let Some(items) = &dim.item_names {
            if items.len() != shapes.len() {
                return Err(PlumeError::shape_mismatch(
                    &dim.name,
                    format!(
                        "{} item names given for {} stacked shapes",
                        items.len(),
                        shapes.len()
                    ),
                ));
            }
        }
        if shapes.iter().any(|s| s.contains(&dim.name)) {
            return Err(PlumeError::shape_mismatch(
                &dim.name,
                "stacking dimension is already present in a stacked shape",
            ));
        }
        let merged = Shape::merge_all(shapes)?;
        merged.insert(dim.with_size(shapes.len()), true)
    }

    /// Splits off a dimension, returning it and the remaining shape.
    pub fn unstack(&self, name: &str) -> Result<(Dim, Shape)> {
        let index = self.require(name)?;
        let mut dims = self.dims.clone();
        let dim = dims.remove(index);
        Ok((dim, Shape { dims }))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        let shape = Shape::from_dims([
            Dim::spatial("x", 4),
            Dim::vector(2),
            Dim::batch("b", 2),
            Dim::instance("points", 5),
        ])
        .unwrap();
        assert_eq!(shape.names(), vec!["b", "points", "x", "vector"]);
        assert_eq!(shape.volume(), 80);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = spatial(&[("x", 4)]).with(Dim::batch("x", 2)).unwrap_err();
        assert!(matches!(err, PlumeError::ShapeMismatch { ref dim, .. } if dim == "x"));
    }

    #[test]
    fn test_merge_broadcasts_size_one() {
        let a = spatial(&[("x", 1), ("y", 3)]);
        let b = spatial(&[("x", 4)]);
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.sizes(), vec![4, 3]);
    }

    #[test]
    fn test_merge_spatial_mismatch() {
        let err = spatial(&[("x", 3)]).merge(&spatial(&[("x", 4)])).unwrap_err();
        assert!(err.to_string().contains("must match unless one is 1"));
    }

    #[test]
    fn test_merge_kind_mismatch() {
        let err = batch("x", 3).merge(&spatial(&[("x", 3)])).unwrap_err();
        assert!(err.to_string().contains("kinds batch and spatial differ"));
    }

    #[test]
    fn test_merge_adds_missing_batch() {
        let merged = spatial(&[("x", 3)]).merge(&batch("b", 5)).unwrap();
        assert_eq!(merged.names(), vec!["b", "x"]);
    }

    #[test]
    fn test_stack_inserts_leading() {
        let shapes = vec![batch("b", 2).concat(&vector(2)).unwrap(); 3];
        let stacked = Shape::stack(Dim::batch("stack", 99), &shapes).unwrap();
        assert_eq!(stacked.names(), vec!["stack", "b", "vector"]);
        assert_eq!(stacked.size_of("stack"), Some(3));
    }

    #[test]
    fn test_stack_incompatible() {
        let shapes = [spatial(&[("x", 3)]), spatial(&[("x", 4)])];
        assert!(Shape::stack(Dim::instance("i", 0), &shapes).is_err());
    }

    #[test]
    fn test_stack_rejects_existing_dim() {
        let shapes = [batch("b", 2), batch("b", 2)];
        assert!(Shape::stack(Dim::batch("b", 0), &shapes).is_err());
    }

    #[test]
    fn test_stack_unstack_inverse() {
        let inner = spatial(&[("x", 4), ("y", 2)]);
        let stacked =
            Shape::stack(Dim::instance("obj", 0), &[inner.clone(), inner.clone()]).unwrap();
        let (dim, rest) = stacked.unstack("obj").unwrap();
        assert_eq!(dim.size(), 2);
        assert_eq!(rest, inner);
    }

    #[test]
    fn test_unstack_missing_dim() {
        assert!(spatial(&[("x", 4)]).unstack("y").is_err());
    }

    #[test]
    fn test_vector_items() {
        let dim = Dim::vector(3);
        assert_eq!(dim.item_index("z"), Some(2));
        assert_eq!(dim.with_range(1..3).item_names().unwrap(), ["y", "z"]);
    }

    #[test]
    fn test_after_index() {
        let shape = spatial(&[("x", 4), ("y", 2)]);
        let at = shape.after_index("x", &DimIndex::At(1)).unwrap();
        assert_eq!(at.names(), vec!["y"]);
        let range = shape.after_index("x", &DimIndex::Range(1..3)).unwrap();
        assert_eq!(range.sizes(), vec![2, 2]);
        assert!(shape.after_index("x", &DimIndex::At(4)).is_err());
    }

    #[test]
    fn test_display() {
        let shape = batch("b", 2).concat(&vector(2)).unwrap();
        assert_eq!(shape.to_string(), "(b:batch=2, vector:channel=x,y)");
    }
}
