//! Output mode and per-job flags.

use std::fmt;

/// How a job writes parsed records into its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputMode {
    /// Every record is appended as a new element of a record list.
    Array,
    /// Every record is split into key and value and written to a
    /// key/value store.
    Hash,
    /// Every record is split into key and value; the key names an
    /// existing scalar binding that receives the value.
    Vars,
}

impl OutputMode {
    /// Whether records are split at the sub-delimiter.
    pub fn is_keyed(self) -> bool {
        matches!(self, Self::Hash | Self::Vars)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array => write!(f, "array"),
            Self::Hash => write!(f, "hash"),
            Self::Vars => write!(f, "vars"),
        }
    }
}

/// Behaviour switches carried by a job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    /// Suppress every diagnostic line on the job's sink.
    pub silent: bool,
    /// Refuse a target whose existing binding is not at global scope.
    pub only_global: bool,
    /// Trace every record on the job's sink.
    pub debug: bool,
}

impl Flags {
    /// All flags cleared.
    pub const NONE: Flags = Flags {
        silent: false,
        only_global: false,
        debug: false,
    };
}
