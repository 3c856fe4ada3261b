//! Ordered collections of arbitrary values along one named dimension.

use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PlumeError, Result};
use crate::shape::{Dim, DimIndex, Shape};

/// A non-empty sequence of values laid out along a single dimension.
///
/// Unlike a [`Tensor`](crate::Tensor), the items may be any type, which is
/// what heterogeneous collections (e.g. stacks of different geometry kinds)
/// need.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Layout<T> {
    dim: Dim,
    items: Vec<T>,
}

impl<T: Clone> Layout<T> {
    /// Lays out `items` along `dim`. The size of `dim` becomes the item count.
    pub fn new(items: Vec<T>, dim: Dim) -> Result<Self> {
        if items.is_empty() {
            return Err(PlumeError::invalid(format!(
                "layout along '{}' needs at least one item",
                dim.name()
            )));
        }
        if let Some(names) = dim.item_names() {
            if names.len() != items.len() {
                return Err(PlumeError::shape_mismatch(
                    dim.name(),
                    format!("{} item names for {} items", names.len(), items.len()),
                ));
            }
        }
        let dim = dim.with_size(items.len());
        Ok(Self { dim, items })
    }

    /// The dimension the items are laid out along.
    pub fn dim(&self) -> &Dim {
        &self.dim
    }

    /// The layout's own shape (just its dimension).
    pub fn shape(&self) -> Shape {
        Shape::from_dim(self.dim.clone())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always `false`; layouts are never empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// A sub-layout over `range`.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        DimIndex::Range(range.clone()).validate(&self.dim)?;
        Layout::new(self.items[range.clone()].to_vec(), self.dim.with_range(range))
    }

    /// Applies `f` to every item, keeping the dimension.
    pub fn try_map<U: Clone>(&self, f: impl FnMut(&T) -> Result<U>) -> Result<Layout<U>> {
        let items = self.items.iter().map(f).collect::<Result<Vec<_>>>()?;
        Ok(Layout {
            dim: self.dim.clone(),
            items,
        })
    }
}

impl<'a, T> IntoIterator for &'a Layout<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
