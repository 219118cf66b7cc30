//! Arena-specific error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The backend could not provide a fresh region.
    AllocationFailed {
        /// Number of bytes requested (after zero-size normalisation).
        requested: usize,
    },
    /// The backend could not provide the larger region for a resize.
    ReallocationFailed {
        /// Number of bytes requested for the new region.
        requested: usize,
    },
}

impl ArenaError {
    /// Number of bytes the failed request asked for.
    pub fn requested(&self) -> usize {
        match self {
            Self::AllocationFailed { requested } | Self::ReallocationFailed { requested } => {
                *requested
            }
        }
    }
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed { requested } => {
                write!(f, "out of memory: could not allocate {requested} bytes")
            }
            Self::ReallocationFailed { requested } => {
                write!(f, "out of memory: could not reallocate to {requested} bytes")
            }
        }
    }
}

impl Error for ArenaError {}
