//! Growable record buffer with a read cursor.
//!
//! Bytes are appended at the fill position and records are carved off
//! the front. Layout of the backing block:
//!
//! ```text
//!   0        start                filled          capacity
//!   |consumed|  pending bytes       |  free  ...    |
//! ```
//!
//! [`compact`](RecordBuffer::compact) moves the pending bytes to offset 0.

use std::io::{self, Read};
use std::ops::Range;

use memchr::memmem;
use populator_arena::{Arena, ArenaError, Block};

/// Bytes kept free past the filled region for a terminator.
pub const TERMINATOR_SLACK: usize = 1;

/// Arena-backed byte buffer that yields delimited records.
pub struct RecordBuffer {
    /// `None` once a growth failure has discarded the buffer.
    block: Option<Block>,
    start: usize,
    filled: usize,
    /// Offset from which the next delimiter search resumes.
    scan: usize,
    arena: Arena,
}

impl RecordBuffer {
    /// Allocate a buffer of `capacity` bytes from `arena`.
    pub fn with_capacity(arena: Arena, capacity: usize) -> Result<Self, ArenaError> {
        let block = arena.allocate(capacity)?;
        Ok(Self {
            block: Some(block),
            start: 0,
            filled: 0,
            scan: 0,
            arena,
        })
    }

    /// Size of the backing block, or 0 after a growth failure.
    pub fn capacity(&self) -> usize {
        self.block.as_ref().map_or(0, Block::capacity)
    }

    /// Number of pending (unconsumed) bytes.
    pub fn len(&self) -> usize {
        self.filled - self.start
    }

    /// Whether no bytes are pending.
    pub fn is_empty(&self) -> bool {
        self.filled == self.start
    }

    /// End of the filled region.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// The pending bytes.
    pub fn pending(&self) -> &[u8] {
        match &self.block {
            Some(block) => &block.as_bytes()[self.start..self.filled],
            None => &[],
        }
    }

    /// Make room for `needed` more bytes past the filled region, growing
    /// the block by `growth` until it fits.
    ///
    /// Returns whether the block was reallocated. On failure the buffer
    /// is discarded and every later operation sees an empty buffer.
    pub fn reserve(&mut self, needed: usize, growth: f64) -> Result<bool, ArenaError> {
        let required = self.filled + needed;
        let capacity = self.capacity();
        if required <= capacity {
            return Ok(false);
        }
        let mut target = capacity.max(1);
        while target < required {
            let next = (target as f64 * growth).round() as usize;
            target = next.max(target + 1);
        }
        tracing::trace!(from = capacity, to = target, "growing record buffer");
        match self.arena.try_reallocate(self.block.take(), target) {
            Ok(block) => {
                self.block = Some(block);
                Ok(true)
            }
            Err(err) => {
                self.start = 0;
                self.filled = 0;
                self.scan = 0;
                Err(err)
            }
        }
    }

    /// Perform one read of at most `max` bytes into the free region.
    ///
    /// Interrupted reads are retried. Returns 0 at end of stream or when
    /// there is no free space.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R, max: usize) -> io::Result<usize> {
        let Some(block) = self.block.as_mut() else {
            return Ok(0);
        };
        let end = (self.filled + max).min(block.capacity());
        if end == self.filled {
            return Ok(0);
        }
        let n = loop {
            match reader.read(&mut block.as_bytes_mut()[self.filled..end]) {
                Ok(n) => break n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        };
        self.filled += n;
        self.terminate();
        Ok(n)
    }

    /// Append `bytes`, growing the block as needed.
    pub fn append(&mut self, bytes: &[u8], growth: f64) -> Result<(), ArenaError> {
        self.reserve(bytes.len() + TERMINATOR_SLACK, growth)?;
        if let Some(block) = self.block.as_mut() {
            block.as_bytes_mut()[self.filled..self.filled + bytes.len()].copy_from_slice(bytes);
            self.filled += bytes.len();
            self.terminate();
        }
        Ok(())
    }

    /// Whether the pending bytes end with `delim`.
    pub fn ends_with(&self, delim: &[u8]) -> bool {
        self.pending().ends_with(delim)
    }

    /// Carve the next record off the front.
    ///
    /// Returns the record's range (delimiter excluded) and advances past
    /// the delimiter, or `None` when no complete record is pending.
    pub fn next_record(&mut self, delim: &[u8]) -> Option<Range<usize>> {
        if delim.is_empty() {
            return None;
        }
        let block = self.block.as_ref()?;
        // A delimiter may straddle the previous scan boundary.
        let from = self
            .scan
            .saturating_sub(delim.len().saturating_sub(1))
            .max(self.start);
        let haystack = &block.as_bytes()[from..self.filled];
        match memmem::find(haystack, delim) {
            Some(pos) => {
                let record = self.start..from + pos;
                self.start = record.end + delim.len();
                self.scan = self.start;
                Some(record)
            }
            None => {
                self.scan = self.filled;
                None
            }
        }
    }

    /// Take every pending byte as one final record, delimiter or not.
    ///
    /// Returns `None` when nothing is pending.
    pub fn finish(&mut self) -> Option<Range<usize>> {
        if self.is_empty() {
            return None;
        }
        let record = self.start..self.filled;
        self.start = self.filled;
        self.scan = self.filled;
        Some(record)
    }

    /// Bytes of a range returned by [`next_record`](Self::next_record).
    pub fn record(&self, range: Range<usize>) -> &[u8] {
        match &self.block {
            Some(block) => &block.as_bytes()[range],
            None => &[],
        }
    }

    /// Move the pending bytes to the front of the block.
    pub fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        if let Some(block) = self.block.as_mut() {
            block
                .as_bytes_mut()
                .copy_within(self.start..self.filled, 0);
        }
        self.filled -= self.start;
        self.scan -= self.start;
        self.start = 0;
        self.terminate();
    }

    fn terminate(&mut self) {
        if let Some(block) = self.block.as_mut() {
            if self.filled < block.capacity() {
                block.as_bytes_mut()[self.filled] = 0;
            }
        }
    }
}

impl std::fmt::Debug for RecordBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordBuffer")
            .field("capacity", &self.capacity())
            .field("start", &self.start)
            .field("filled", &self.filled)
            .finish()
    }
}
