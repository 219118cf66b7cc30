//! Streaming tokenizer.
//!
//! Reads the input in bounded chunks into a [`RecordBuffer`] and hands
//! every complete record to a [`RecordSink`]. States:
//!
//! ```text
//!   Reading ──data──▶ Splitting ──▶ Reading
//!      │
//!      └──EOF──▶ Draining ──▶ Done
//! ```
//!
//! Bytes left after the last delimiter at end of stream form one final
//! record. Empty records are skipped.

use std::io::Read;
use std::ops::Range;

use populator_arena::{Arena, Block};

use crate::buffer::{RecordBuffer, TERMINATOR_SLACK};
use crate::config::{ConfigError, TokenizerConfig};
use crate::diag::Diagnostics;
use crate::error::JobError;
use crate::sink::RecordSink;

/// Counters for one tokenizer run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenizerStats {
    /// Records handed to the sink.
    pub records: u64,
    /// Bytes read from the input.
    pub bytes_read: u64,
    /// Read calls issued, including the one that saw end of stream.
    pub reads: u64,
    /// Times the buffer was reallocated.
    pub grows: u64,
    /// Empty records dropped.
    pub skipped_empty: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Reading,
    Splitting,
    Draining,
    Done,
}

/// Splits one input stream into records.
pub struct Tokenizer {
    arena: Arena,
    config: TokenizerConfig,
    delimiter: Block,
    stats: TokenizerStats,
}

impl Tokenizer {
    /// Create a tokenizer splitting at `delimiter`.
    ///
    /// Fails if `config` is invalid or `delimiter` is empty.
    pub fn new(
        arena: Arena,
        config: TokenizerConfig,
        delimiter: Block,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        Ok(Self {
            arena,
            config,
            delimiter,
            stats: TokenizerStats::default(),
        })
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> TokenizerStats {
        self.stats
    }

    /// The record delimiter.
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// Consume `reader` until end of stream or the first fatal error.
    ///
    /// Records are applied to `sink` in stream order. The buffer is
    /// released before returning, whatever the outcome.
    pub fn run<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        sink: &mut dyn RecordSink,
        diag: &mut Diagnostics,
    ) -> Result<(), JobError> {
        let mut buffer = RecordBuffer::with_capacity(self.arena.clone(), self.config.initial_capacity)
            .map_err(JobError::Allocation)?;
        let headroom = self.config.chunk_size + TERMINATOR_SLACK + self.delimiter.len();
        let growth = self.config.growth_factor;

        let mut state = State::Reading;
        while state != State::Done {
            state = match state {
                State::Reading => {
                    if buffer
                        .reserve(headroom, growth)
                        .map_err(JobError::Reallocation)?
                    {
                        self.stats.grows += 1;
                    }
                    let n = buffer.read_from(reader, self.config.chunk_size)?;
                    self.stats.reads += 1;
                    self.stats.bytes_read += n as u64;
                    if n == 0 {
                        State::Draining
                    } else {
                        State::Splitting
                    }
                }
                State::Splitting => {
                    self.drain_records(&mut buffer, sink, diag)?;
                    buffer.compact();
                    State::Reading
                }
                State::Draining => {
                    self.drain_records(&mut buffer, sink, diag)?;
                    // The unterminated tail is complete as it stands; a
                    // delimiter overlapping its end must not split it.
                    if let Some(tail) = buffer.finish() {
                        self.emit(&buffer, tail, sink, diag)?;
                    }
                    State::Done
                }
                State::Done => State::Done,
            };
        }
        tracing::debug!(
            records = self.stats.records,
            bytes = self.stats.bytes_read,
            grows = self.stats.grows,
            "input exhausted"
        );
        Ok(())
    }

    fn drain_records(
        &mut self,
        buffer: &mut RecordBuffer,
        sink: &mut dyn RecordSink,
        diag: &mut Diagnostics,
    ) -> Result<(), JobError> {
        while let Some(range) = buffer.next_record(&self.delimiter) {
            self.emit(buffer, range, sink, diag)?;
        }
        Ok(())
    }

    fn emit(
        &mut self,
        buffer: &RecordBuffer,
        range: Range<usize>,
        sink: &mut dyn RecordSink,
        diag: &mut Diagnostics,
    ) -> Result<(), JobError> {
        let record = buffer.record(range);
        if record.is_empty() {
            self.stats.skipped_empty += 1;
            return Ok(());
        }
        if diag.tracing_records() {
            diag.trace(format_args!(
                "record {}: {}",
                self.stats.records,
                String::from_utf8_lossy(record)
            ));
        }
        sink.accept(record, diag)?;
        self.stats.records += 1;
        Ok(())
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("config", &self.config)
            .field("delimiter", &String::from_utf8_lossy(&self.delimiter))
            .field("stats", &self.stats)
            .finish()
    }
}
