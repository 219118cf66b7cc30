//! Job and submission error types.

use std::error::Error;
use std::fmt;
use std::io;

use populator_arena::ArenaError;
use populator_core::SlotId;
use populator_store::RegistryError;

// ── JobError ──────────────────────────────────────────────────────

/// Why a running job stopped before its input was exhausted.
///
/// Every variant is local to the job: the pool and every other job keep
/// running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobError {
    /// A job-scoped allocation was refused.
    Allocation(ArenaError),
    /// The tokenizer buffer could not grow. The buffer was discarded.
    Reallocation(ArenaError),
    /// Reading the input failed with a non-transient error.
    Read {
        /// Kind of the I/O error.
        kind: io::ErrorKind,
        /// Rendered I/O error.
        message: String,
    },
}

impl From<io::Error> for JobError {
    fn from(e: io::Error) -> Self {
        Self::Read {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation(e) => write!(f, "{e}"),
            Self::Reallocation(e) => write!(f, "buffer growth failed: {e}"),
            Self::Read { message, .. } => write!(f, "read failed: {message}"),
        }
    }
}

impl Error for JobError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Allocation(e) | Self::Reallocation(e) => Some(e),
            Self::Read { .. } => None,
        }
    }
}

// ── SubmitError ───────────────────────────────────────────────────

/// Which stream handle of a job failed to duplicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamRole {
    /// The input the tokenizer reads.
    Input,
    /// The diagnostic sink.
    Diagnostics,
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Diagnostics => write!(f, "diagnostics"),
        }
    }
}

/// Which delimiter of a request was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DelimiterRole {
    /// Record separator.
    Main,
    /// Key/value separator.
    Sub,
}

impl fmt::Display for DelimiterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Sub => write!(f, "sub"),
        }
    }
}

/// Errors returned by [`WorkerPool::submit`](crate::pool::WorkerPool::submit).
///
/// Every variant leaves the pool exactly as it was before the call and
/// releases whatever the submission had acquired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// The slot id is outside the pool.
    InvalidSlot {
        /// Requested slot.
        slot: SlotId,
        /// Number of slots in the pool.
        capacity: usize,
    },
    /// The slot's previous job has not signalled completion.
    SlotBusy {
        /// Requested slot.
        slot: SlotId,
    },
    /// A delimiter is empty.
    InvalidDelimiter {
        /// The offending delimiter.
        which: DelimiterRole,
    },
    /// Array and Hash jobs need a non-empty target name.
    InvalidTarget,
    /// A stream handle could not be duplicated.
    StreamSetup {
        /// Which handle failed.
        stream: StreamRole,
        /// Attempts made before giving up.
        attempts: u32,
        /// Rendered I/O error of the last attempt.
        reason: String,
    },
    /// The target name could not be resolved.
    Registry(RegistryError),
    /// A job-owned copy could not be allocated.
    Allocation(ArenaError),
    /// The operating system refused to start the worker thread.
    ThreadLaunch {
        /// Rendered I/O error.
        reason: String,
    },
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSlot { slot, capacity } => {
                write!(f, "slot {slot} out of range (pool has {capacity} slots)")
            }
            Self::SlotBusy { slot } => write!(f, "slot {slot} is still running"),
            Self::InvalidDelimiter { which } => write!(f, "{which} delimiter is empty"),
            Self::InvalidTarget => write!(f, "target name is empty"),
            Self::StreamSetup {
                stream,
                attempts,
                reason,
            } => write!(
                f,
                "cannot duplicate {stream} stream after {attempts} attempts: {reason}"
            ),
            Self::Registry(e) => write!(f, "{e}"),
            Self::Allocation(e) => write!(f, "{e}"),
            Self::ThreadLaunch { reason } => write!(f, "cannot start worker thread: {reason}"),
        }
    }
}

impl Error for SubmitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(e) => Some(e),
            Self::Allocation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for SubmitError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<ArenaError> for SubmitError {
    fn from(e: ArenaError) -> Self {
        Self::Allocation(e)
    }
}
