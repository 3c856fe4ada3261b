//! Gravitational acceleration and its algebra.

use plume_core::{PlumeError, Result, Tensor, VECTOR_DIM};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Standard gravity magnitude.
pub const DEFAULT_GRAVITY: f64 = -9.81;

/// A gravity magnitude or a full per-axis acceleration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GravityValue {
    /// The same acceleration on every axis.
    Scalar(f64),
    /// One component per axis, in `x`, `y`, `z` order.
    Vector(Vec<f64>),
}

impl GravityValue {
    fn splat(&self, rank: usize) -> Vec<f64> {
        match self {
            GravityValue::Scalar(g) => vec![*g; rank],
            GravityValue::Vector(v) => v.clone(),
        }
    }
}

/// Gravity acting on a simulation.
///
/// A scalar gravity accelerates every axis equally, both when expanded with
/// [`gravity_tensor`](Self::gravity_tensor) and when added to a vector
/// gravity, so `(a + b).gravity_tensor(r) == a.gravity_tensor(r) +
/// b.gravity_tensor(r)`. Use [`Gravity::downward`] for acceleration along
/// the vertical axis only.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gravity {
    value: GravityValue,
    batch_size: Option<usize>,
}

impl Default for Gravity {
    fn default() -> Self {
        Self::new(DEFAULT_GRAVITY)
    }
}

impl Gravity {
    pub fn new(magnitude: f64) -> Self {
        Self {
            value: GravityValue::Scalar(magnitude),
            batch_size: None,
        }
    }

    /// `magnitude` along `y` (`x` in one dimension), zero on the other
    /// axes.
    pub fn downward(magnitude: f64, rank: usize) -> Result<Self> {
        if rank == 0 {
            return Err(PlumeError::invalid("gravity needs a spatial rank of at least 1"));
        }
        let mut components = vec![0.0; rank];
        components[usize::from(rank >= 2)] = magnitude;
        Self::vector(&components)
    }

    /// Per-axis gravity.
    pub fn vector(components: &[f64]) -> Result<Self> {
        if components.is_empty() {
            return Err(PlumeError::invalid("gravity vector needs at least one component"));
        }
        Ok(Self {
            value: GravityValue::Vector(components.to_vec()),
            batch_size: None,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn value(&self) -> &GravityValue {
        &self.value
    }

    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.value, GravityValue::Scalar(_))
    }

    /// Sums two gravities.
    ///
    /// Two scalars add as scalars. Otherwise a scalar operand is broadcast
    /// to the vector operand's rank, every component receiving the scalar,
    /// and the vectors are added component-wise.
    pub fn try_add(&self, other: &Gravity) -> Result<Gravity> {
        let batch_size = match (self.batch_size, other.batch_size) {
            (Some(a), Some(b)) if a != b => {
                return Err(PlumeError::shape_mismatch(
                    "batch",
                    format!("cannot add gravities with batch sizes {a} and {b}"),
                ))
            }
            (a, b) => a.or(b),
        };
        let value = match (&self.value, &other.value) {
            (GravityValue::Scalar(a), GravityValue::Scalar(b)) => GravityValue::Scalar(a + b),
            (GravityValue::Vector(a), GravityValue::Vector(b)) if a.len() != b.len() => {
                return Err(PlumeError::shape_mismatch(
                    VECTOR_DIM,
                    format!("cannot add gravities of rank {} and {}", a.len(), b.len()),
                ))
            }
            (GravityValue::Vector(v), _) | (_, GravityValue::Vector(v)) => {
                let rank = v.len();
                let sum = self
                    .value
                    .splat(rank)
                    .iter()
                    .zip(other.value.splat(rank))
                    .map(|(a, b)| a + b)
                    .collect();
                GravityValue::Vector(sum)
            }
        };
        Ok(Gravity { value, batch_size })
    }

    /// Adds a term that may be zero.
    pub fn add_term(&self, term: &GravityTerm) -> Result<Gravity> {
        match term {
            GravityTerm::Zero => Ok(self.clone()),
            GravityTerm::Gravity(other) => self.try_add(other),
        }
    }

    /// Sums any number of gravities, starting from [`GravityTerm::Zero`].
    pub fn total<'a>(gravities: impl IntoIterator<Item = &'a Gravity>) -> Result<GravityTerm> {
        gravities
            .into_iter()
            .try_fold(GravityTerm::Zero, |acc, g| acc.try_add(g))
    }

    /// The acceleration as a `vector` tensor of the given spatial rank.
    ///
    /// A scalar is broadcast to every component.
    pub fn gravity_tensor(&self, rank: usize) -> Result<Tensor> {
        if rank == 0 {
            return Err(PlumeError::invalid("gravity needs a spatial rank of at least 1"));
        }
        match &self.value {
            GravityValue::Scalar(_) => Ok(Tensor::vector(&self.value.splat(rank))),
            GravityValue::Vector(v) if v.len() == rank => Ok(Tensor::vector(v)),
            GravityValue::Vector(v) => Err(PlumeError::shape_mismatch(
                VECTOR_DIM,
                format!("gravity of rank {} used in {rank} dimensions", v.len()),
            )),
        }
    }
}

/// A gravity that may be absent, the identity of [`Gravity::try_add`].
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GravityTerm {
    #[default]
    Zero,
    Gravity(Gravity),
}

impl GravityTerm {
    pub fn try_add(self, other: &Gravity) -> Result<GravityTerm> {
        match self {
            GravityTerm::Zero => Ok(GravityTerm::Gravity(other.clone())),
            GravityTerm::Gravity(g) => g.try_add(other).map(GravityTerm::Gravity),
        }
    }

    /// The gravity, if any.
    pub fn into_gravity(self) -> Option<Gravity> {
        match self {
            GravityTerm::Zero => None,
            GravityTerm::Gravity(g) => Some(g),
        }
    }
}

impl From<Gravity> for GravityTerm {
    fn from(gravity: Gravity) -> Self {
        GravityTerm::Gravity(gravity)
    }
}
