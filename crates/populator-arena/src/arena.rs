//! The [`Arena`] handle and its allocate/free/reallocate/duplicate primitives.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::AllocBackend;
use crate::block::Block;
use crate::config::ArenaConfig;
use crate::error::ArenaError;

/// State shared by an arena and every block it handed out.
pub(crate) struct ArenaShared {
    backend: Arc<dyn AllocBackend>,
    live_blocks: AtomicUsize,
    live_bytes: AtomicUsize,
    failed_requests: AtomicUsize,
}

impl ArenaShared {
    pub(crate) fn release(&self, size: usize) {
        self.backend.release(size);
        self.live_blocks.fetch_sub(1, Ordering::AcqRel);
        self.live_bytes.fetch_sub(size, Ordering::AcqRel);
    }
}

/// Point-in-time counters for an arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Blocks handed out and not yet dropped.
    pub live_blocks: usize,
    /// Bytes of capacity held by live blocks.
    pub live_bytes: usize,
    /// Requests the backend refused since creation.
    pub failed_requests: usize,
}

/// Thread-safe allocator handle.
///
/// Cloning is cheap and every clone draws from the same backend and
/// counters. All operations take `&self` and may be called concurrently
/// from any number of threads.
#[derive(Clone)]
pub struct Arena {
    shared: Arc<ArenaShared>,
}

// Compile-time assertion: Arena must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Arena>();
    assert::<Block>();
};

impl Arena {
    /// Create an arena from a configuration.
    pub fn new(config: &ArenaConfig) -> Self {
        Self::with_backend(config.backend())
    }

    /// Create an arena over an explicit backend.
    pub fn with_backend(backend: Arc<dyn AllocBackend>) -> Self {
        Self {
            shared: Arc::new(ArenaShared {
                backend,
                live_blocks: AtomicUsize::new(0),
                live_bytes: AtomicUsize::new(0),
                failed_requests: AtomicUsize::new(0),
            }),
        }
    }

    /// Allocate a block of `size` bytes. A zero-size request is
    /// normalised to one byte.
    ///
    /// The returned block has `len == capacity`. Its contents are
    /// unspecified; use [`zeroed_allocate`](Self::zeroed_allocate) when
    /// zero bytes are required.
    pub fn allocate(&self, size: usize) -> Result<Block, ArenaError> {
        let size = size.max(1);
        let data = self
            .acquire(size)
            .ok_or(ArenaError::AllocationFailed { requested: size })?;
        Ok(Block::new(data, size, Arc::clone(&self.shared)))
    }

    /// Allocate a block of `size` zero bytes. A zero-size request is
    /// normalised to one byte.
    pub fn zeroed_allocate(&self, size: usize) -> Result<Block, ArenaError> {
        let mut block = self.allocate(size)?;
        block.as_bytes_mut().fill(0);
        Ok(block)
    }

    /// Release a block. `None` is a no-op.
    ///
    /// Dropping a block has the same effect; this exists for call sites
    /// that hold an optional block.
    pub fn free(&self, block: Option<Block>) {
        drop(block);
    }

    /// Resize `block` to `size` bytes, preserving its leading contents.
    ///
    /// `None` behaves like [`allocate`](Self::allocate). There is no safe
    /// rollback for a caller that cannot continue without the larger
    /// region, so a backend refusal is logged and the process aborts.
    /// Job-scoped buffers use [`try_reallocate`](Self::try_reallocate).
    pub fn reallocate(&self, block: Option<Block>, size: usize) -> Block {
        match self.try_reallocate(block, size) {
            Ok(block) => block,
            Err(err) => {
                tracing::error!(requested = err.requested(), "arena reallocation failed");
                eprintln!("populator: fatal: {err}");
                std::process::abort()
            }
        }
    }

    /// Resize `block` to `size` bytes, preserving its leading contents.
    ///
    /// On failure the original block is released and
    /// [`ArenaError::ReallocationFailed`] is returned.
    pub fn try_reallocate(&self, block: Option<Block>, size: usize) -> Result<Block, ArenaError> {
        let Some(old) = block else {
            return self.allocate(size).map_err(|err| ArenaError::ReallocationFailed {
                requested: err.requested(),
            });
        };
        let size = size.max(1);
        let data = self
            .acquire(size)
            .ok_or(ArenaError::ReallocationFailed { requested: size })?;
        let mut grown = Block::new(data, size, Arc::clone(&self.shared));
        let keep = old.len().min(size);
        grown.as_bytes_mut()[..keep].copy_from_slice(&old.as_bytes()[..keep]);
        drop(old);
        Ok(grown)
    }

    /// Copy `bytes` into a fresh block.
    ///
    /// The block's length is `bytes.len()`; one extra byte of capacity
    /// is reserved as a terminator, so even an empty copy owns a region.
    pub fn duplicate(&self, bytes: &[u8]) -> Result<Block, ArenaError> {
        let mut block = self.zeroed_allocate(bytes.len() + 1)?;
        block.as_bytes_mut()[..bytes.len()].copy_from_slice(bytes);
        block.set_len(bytes.len());
        Ok(block)
    }

    /// Optional form of [`duplicate`](Self::duplicate): `None` in, `None` out.
    pub fn duplicate_string(&self, bytes: Option<&[u8]>) -> Result<Option<Block>, ArenaError> {
        bytes.map(|b| self.duplicate(b)).transpose()
    }

    /// Current counters.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            live_blocks: self.shared.live_blocks.load(Ordering::Acquire),
            live_bytes: self.shared.live_bytes.load(Ordering::Acquire),
            failed_requests: self.shared.failed_requests.load(Ordering::Acquire),
        }
    }

    /// Whether two handles draw from the same arena.
    pub fn ptr_eq(&self, other: &Arena) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn acquire(&self, size: usize) -> Option<Box<[u8]>> {
        match self.shared.backend.acquire(size) {
            Some(data) => {
                self.shared.live_blocks.fetch_add(1, Ordering::AcqRel);
                self.shared.live_bytes.fetch_add(size, Ordering::AcqRel);
                Some(data)
            }
            None => {
                self.shared.failed_requests.fetch_add(1, Ordering::AcqRel);
                tracing::warn!(requested = size, "arena allocation refused by backend");
                None
            }
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(&ArenaConfig::default())
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("backend", &self.shared.backend)
            .field("stats", &self.stats())
            .finish()
    }
}
