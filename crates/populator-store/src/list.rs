//! Append-only record sequence used as the Array-mode target.

use std::fmt;

use populator_arena::{Arena, ArenaError, Block};

/// Ordered list of raw records, each copied into an arena block.
pub struct RecordList {
    records: Vec<Block>,
    arena: Arena,
}

impl RecordList {
    /// Create an empty list drawing from `arena`.
    pub fn new(arena: Arena) -> Self {
        Self {
            records: Vec::new(),
            arena,
        }
    }

    /// Append a copy of `record`.
    pub fn push(&mut self, record: &[u8]) -> Result<(), ArenaError> {
        let block = self.arena.duplicate(record)?;
        self.records
            .try_reserve(1)
            .map_err(|_| ArenaError::AllocationFailed {
                requested: std::mem::size_of::<Block>(),
            })?;
        self.records.push(block);
        Ok(())
    }

    /// Record at `index`.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.records.get(index).map(Block::as_bytes)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in append order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.records.iter().map(Block::as_bytes)
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl fmt::Debug for RecordList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(String::from_utf8_lossy))
            .finish()
    }
}
