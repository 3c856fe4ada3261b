//! Error types for plume-core.

use thiserror::Error;

/// Result alias used throughout plume.
pub type Result<T> = std::result::Result<T, PlumeError>;

/// Errors raised by shapes, tensors, geometries and effects.
///
/// Entities are immutable, so an operation that fails never leaves a
/// partially updated value behind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlumeError {
    /// Incompatible dimension sizes or kinds during stacking, broadcasting,
    /// unstacking or indexing.
    #[error("shape mismatch on dimension '{dim}': {reason}")]
    ShapeMismatch {
        /// Name of the offending dimension.
        dim: String,
        /// What made the dimension incompatible.
        reason: String,
    },

    /// Operation intentionally unimplemented for a variant.
    #[error("{operation} is not supported for {variant}")]
    Unsupported {
        /// The operation that was requested.
        operation: &'static str,
        /// The variant (or dimension kind) it was requested on.
        variant: String,
    },

    /// Invalid value supplied at construction or application time.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl PlumeError {
    /// Creates a shape mismatch error for the given dimension.
    pub fn shape_mismatch(dim: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            dim: dim.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unsupported-operation error.
    pub fn unsupported(operation: &'static str, variant: impl Into<String>) -> Self {
        Self::Unsupported {
            operation,
            variant: variant.into(),
        }
    }

    /// Creates an invalid-configuration error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_names_dimension() {
        let err = PlumeError::shape_mismatch("x", "sizes 3 and 4 differ");
        assert_eq!(
            err.to_string(),
            "shape mismatch on dimension 'x': sizes 3 and 4 differ"
        );
    }

    #[test]
    fn test_unsupported_names_variant() {
        let err = PlumeError::unsupported("push", "GeometryStack");
        assert_eq!(err.to_string(), "push is not supported for GeometryStack");
    }
}
