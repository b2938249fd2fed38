//! Error types shared across the framework.

use thiserror::Error;

/// Errors surfaced by runners, solvers and the parameter registry.
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter required by a component has not been assigned a value.
    #[error("parameter {0} has not been set")]
    ParameterNotSet(String),

    /// A parameter was referenced before being registered.
    #[error("parameter {0} is not registered")]
    ParameterNotValid(String),

    /// A parameter is present but its value was rejected by the owning
    /// component (e.g. a cooling rate outside (0, 1)).
    #[error("incorrect value for parameter {flag}: {reason}")]
    IncorrectParameterValue { flag: String, reason: String },

    /// Misconfiguration, e.g. a solver without runners.
    #[error("{0}")]
    Logic(String),

    /// An optional hook was invoked without an implementation.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// Stream failure while reading or printing parameters.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn incorrect(flag: &str, reason: impl Into<String>) -> Self {
        Error::IncorrectParameterValue {
            flag: flag.to_string(),
            reason: reason.into(),
        }
    }
}

/// Returned by move enumeration when a neighborhood contains no move at all.
///
/// Runners and the kicker recover from this locally: the search loop simply
/// terminates with the best state found so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the neighborhood contains no move")]
pub struct EmptyNeighborhood;

pub type Result<T> = std::result::Result<T, Error>;
