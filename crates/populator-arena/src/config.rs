//! Arena configuration parameters.

use std::sync::Arc;

use crate::backend::{AllocBackend, BudgetBackend, SystemBackend};

/// Configuration for the arena allocator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Upper bound on live bytes across all blocks of the arena.
    ///
    /// `None` (the default) delegates straight to the system allocator.
    /// `Some(n)` installs a [`BudgetBackend`] that refuses any request
    /// which would push the live total past `n`.
    pub max_bytes: Option<usize>,
}

impl ArenaConfig {
    /// Unbounded arena backed by the system allocator.
    pub fn unbounded() -> Self {
        Self { max_bytes: None }
    }

    /// Arena capped at `max_bytes` live bytes.
    pub fn with_budget(max_bytes: usize) -> Self {
        Self {
            max_bytes: Some(max_bytes),
        }
    }

    /// Build the backend this configuration describes.
    pub fn backend(&self) -> Arc<dyn AllocBackend> {
        match self.max_bytes {
            None => Arc::new(SystemBackend),
            Some(limit) => Arc::new(BudgetBackend::new(limit)),
        }
    }
}
