//! Strongly-typed identifiers.

use std::fmt;

/// Identifies one execution slot of the worker pool.
///
/// Valid ids lie in `[0, capacity)` of the pool they are submitted to.
/// Range checking happens at submission, not at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub usize);

impl SlotId {
    /// Index into the pool's slot array.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for SlotId {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Nesting depth at which a host binding lives.
///
/// Level 0 is the outermost (global) scope; every enclosing function
/// call adds one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ScopeLevel(pub u32);

impl ScopeLevel {
    /// The outermost scope.
    pub const GLOBAL: ScopeLevel = ScopeLevel(0);

    /// Whether this is the outermost scope.
    pub fn is_global(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
