//! How the scheduler picks a backend.

use std::fmt;
use std::str::FromStr;

use plume_core::PlumeError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;

/// Backend selection strategy, interpreted by the
/// [`Scheduler`](crate::Scheduler) for every operation it dispatches.
///
/// Policies parse from the strings used in configuration files and
/// environment overrides:
///
/// ```
/// use plume_backend::{BackendKind, ExecutionPolicy};
///
/// assert_eq!("auto".parse::<ExecutionPolicy>().unwrap(), ExecutionPolicy::Auto);
/// assert_eq!(
///     "prefer:gpu".parse::<ExecutionPolicy>().unwrap(),
///     ExecutionPolicy::PreferKind(BackendKind::Gpu)
/// );
/// assert_eq!(
///     "named:cpu".parse::<ExecutionPolicy>().unwrap(),
///     ExecutionPolicy::Named("cpu".into())
/// );
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExecutionPolicy {
    /// Bulk-efficient backends for large tensors, streaming-efficient ones
    /// otherwise.
    #[default]
    Auto,

    /// The first backend of this kind that supports the operation, else
    /// any backend that does.
    PreferKind(BackendKind),

    /// Exactly this backend. Selection fails if it is missing or cannot run
    /// the operation.
    Named(String),

    /// Lowest [`Cost`](crate::Cost) estimate.
    MinimizeCost,
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPolicy::Auto => f.write_str("auto"),
            ExecutionPolicy::PreferKind(BackendKind::Cpu) => f.write_str("prefer:cpu"),
            ExecutionPolicy::PreferKind(BackendKind::Gpu) => f.write_str("prefer:gpu"),
            ExecutionPolicy::PreferKind(BackendKind::Custom(kind)) => write!(f, "prefer:{kind}"),
            ExecutionPolicy::Named(name) => write!(f, "named:{name}"),
            ExecutionPolicy::MinimizeCost => f.write_str("min-cost"),
        }
    }
}

impl FromStr for ExecutionPolicy {
    type Err = PlumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "auto" => Ok(ExecutionPolicy::Auto),
            "min-cost" => Ok(ExecutionPolicy::MinimizeCost),
            other => match other.split_once(':') {
                Some(("prefer", "cpu")) => Ok(ExecutionPolicy::PreferKind(BackendKind::Cpu)),
                Some(("prefer", "gpu")) => Ok(ExecutionPolicy::PreferKind(BackendKind::Gpu)),
                Some(("prefer", kind)) if !kind.is_empty() => {
                    Ok(ExecutionPolicy::PreferKind(BackendKind::Custom(kind.to_string())))
                }
                Some(("named", name)) if !name.is_empty() => {
                    Ok(ExecutionPolicy::Named(name.to_string()))
                }
                _ => Err(PlumeError::invalid(format!("unknown execution policy '{s}'"))),
            },
        }
    }
}
