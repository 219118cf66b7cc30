//! Allocation backends.
//!
//! A backend is the one thread-safe source of memory behind an
//! [`Arena`](crate::Arena). It hands out zero-filled boxed regions and is
//! told when each region is released.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A thread-safe source of byte regions.
///
/// Implementations must be callable concurrently from any thread and
/// must never panic on exhaustion: they return `None` instead.
pub trait AllocBackend: Send + Sync + fmt::Debug {
    /// Return a zero-filled region of exactly `size` bytes, or `None`
    /// if the request cannot be satisfied.
    fn acquire(&self, size: usize) -> Option<Box<[u8]>>;

    /// Called once for every region returned by [`acquire`](Self::acquire)
    /// when the block that owned it is dropped.
    fn release(&self, size: usize) {
        let _ = size;
    }
}

/// Backend over the global allocator using fallible reservation.
///
/// Uses `Vec::try_reserve_exact`, so exhaustion surfaces as `None`
/// rather than the global allocation-error handler.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBackend;

impl AllocBackend for SystemBackend {
    fn acquire(&self, size: usize) -> Option<Box<[u8]>> {
        let mut region = Vec::new();
        region.try_reserve_exact(size).ok()?;
        region.resize(size, 0u8);
        Some(region.into_boxed_slice())
    }
}

/// Backend that caps the number of live bytes.
///
/// Useful for bounding a pool's footprint and for exercising the
/// failure paths of jobs deterministically.
#[derive(Debug)]
pub struct BudgetBackend {
    limit: usize,
    in_use: AtomicUsize,
    system: SystemBackend,
}

// Compile-time assertion: BudgetBackend must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<BudgetBackend>();
};

impl BudgetBackend {
    /// Create a backend that refuses to exceed `limit` live bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            in_use: AtomicUsize::new(0),
            system: SystemBackend,
        }
    }

    /// Configured byte limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes currently handed out.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }
}

impl AllocBackend for BudgetBackend {
    fn acquire(&self, size: usize) -> Option<Box<[u8]>> {
        let limit = self.limit;
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(size).filter(|&total| total <= limit)
            })
            .ok()?;
        match self.system.acquire(size) {
            Some(region) => Some(region),
            None => {
                self.in_use.fetch_sub(size, Ordering::AcqRel);
                None
            }
        }
    }

    fn release(&self, size: usize) {
        self.in_use.fetch_sub(size, Ordering::AcqRel);
    }
}
