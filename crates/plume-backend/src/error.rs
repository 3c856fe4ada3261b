//! Backend error types.

use plume_core::PlumeError;
use thiserror::Error;

/// Errors that can occur during backend selection or execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// Operation is not supported by this backend.
    #[error("operation not supported by this backend: {0}")]
    Unsupported(String),

    /// No registered backend can run the requested operation.
    #[error("no backend available for {0}")]
    NoBackendAvailable(String),

    /// Named backend not found.
    #[error("backend not found: {0}")]
    BackendNotFound(String),

    /// The process-wide scheduler was already in use when installing one.
    #[error("the global scheduler is already installed")]
    AlreadyInstalled,

    /// Shape, configuration or operator error from core.
    #[error(transparent)]
    Core(#[from] PlumeError),
}

/// Lets code returning [`plume_core::Result`] dispatch through a scheduler
/// with `?`. Core errors pass through unchanged.
impl From<BackendError> for PlumeError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Core(e) => e,
            BackendError::Unsupported(what) => PlumeError::unsupported("backend dispatch", what),
            other => PlumeError::invalid(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_core_error() {
        let core = PlumeError::shape_mismatch("x", "sizes 2 and 3");
        assert_eq!(PlumeError::from(BackendError::Core(core.clone())), core);
        assert!(matches!(
            PlumeError::from(BackendError::Unsupported("stack on 'bulk'".into())),
            PlumeError::Unsupported { .. }
        ));
        assert!(matches!(
            PlumeError::from(BackendError::BackendNotFound("tpu".into())),
            PlumeError::InvalidConfiguration(m) if m.contains("tpu")
        ));
    }
}
