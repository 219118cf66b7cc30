//! Job requests and the per-job state owned by a worker thread.

use std::io::Read;

use populator_core::{Flags, OutputMode, SlotId};
use smallvec::SmallVec;

use crate::diag::Diagnostics;
use crate::error::JobError;
use crate::sink::RecordSink;
use crate::stream::{DiagnosticSink, InputSource};
use crate::tokenizer::{Tokenizer, TokenizerStats};

/// Inline storage for a delimiter; every common delimiter fits.
pub type Delimiter = SmallVec<[u8; 4]>;

/// Default record separator.
pub const DEFAULT_DELIMITER: &[u8] = b"\n";

/// Default key/value separator.
pub const DEFAULT_SUB_DELIMITER: &[u8] = b":";

/// Everything a caller supplies to start one ingestion job.
///
/// The stream handles are borrowed: submission duplicates them and the
/// caller keeps ownership of the originals.
pub struct JobRequest<'a> {
    /// Slot that runs the job.
    pub slot: SlotId,
    /// How records are written.
    pub mode: OutputMode,
    /// Name of the target store. Unused in [`OutputMode::Vars`].
    pub target: String,
    /// Record separator.
    pub delimiter: Delimiter,
    /// Key/value separator.
    pub sub_delimiter: Delimiter,
    /// Where records are read from.
    pub input: &'a dyn InputSource,
    /// Where diagnostics go, if anywhere.
    pub diagnostics: Option<&'a dyn DiagnosticSink>,
    /// Behaviour switches.
    pub flags: Flags,
}

impl<'a> JobRequest<'a> {
    /// A request with default delimiters, no diagnostics and no flags.
    pub fn new(
        slot: impl Into<SlotId>,
        mode: OutputMode,
        target: impl Into<String>,
        input: &'a dyn InputSource,
    ) -> Self {
        Self {
            slot: slot.into(),
            mode,
            target: target.into(),
            delimiter: Delimiter::from_slice(DEFAULT_DELIMITER),
            sub_delimiter: Delimiter::from_slice(DEFAULT_SUB_DELIMITER),
            input,
            diagnostics: None,
            flags: Flags::NONE,
        }
    }

    /// Replace the record separator.
    pub fn with_delimiter(mut self, delimiter: &[u8]) -> Self {
        self.delimiter = Delimiter::from_slice(delimiter);
        self
    }

    /// Replace the key/value separator.
    pub fn with_sub_delimiter(mut self, sub_delimiter: &[u8]) -> Self {
        self.sub_delimiter = Delimiter::from_slice(sub_delimiter);
        self
    }

    /// Send diagnostics to `sink`.
    pub fn with_diagnostics(mut self, sink: &'a dyn DiagnosticSink) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Set the behaviour switches.
    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }
}

impl std::fmt::Debug for JobRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRequest")
            .field("slot", &self.slot)
            .field("mode", &self.mode)
            .field("target", &self.target)
            .field("delimiter", &String::from_utf8_lossy(&self.delimiter))
            .field("sub_delimiter", &String::from_utf8_lossy(&self.sub_delimiter))
            .field("has_diagnostics", &self.diagnostics.is_some())
            .field("flags", &self.flags)
            .finish()
    }
}

/// Outcome of one job, sent on the pool's report channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobReport {
    /// Slot that ran the job.
    pub slot: SlotId,
    /// Output mode of the job.
    pub mode: OutputMode,
    /// Target name as submitted.
    pub target: String,
    /// Tokenizer counters at termination.
    pub stats: TokenizerStats,
    /// `Err` if the job stopped before end of stream.
    pub result: Result<(), JobError>,
}

impl JobReport {
    /// Whether the job consumed its whole input.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// A submitted job, owned by its worker thread from launch to exit.
///
/// Dropping it closes the duplicated streams and releases the
/// delimiter copies.
pub(crate) struct IngestJob {
    pub(crate) slot: SlotId,
    pub(crate) mode: OutputMode,
    pub(crate) target: String,
    pub(crate) input: Box<dyn Read + Send>,
    pub(crate) tokenizer: Tokenizer,
    pub(crate) sink: Box<dyn RecordSink>,
    pub(crate) diagnostics: Diagnostics,
}

impl IngestJob {
    /// Run the tokenizer to completion and report.
    pub(crate) fn run(self) -> JobReport {
        let IngestJob {
            slot,
            mode,
            target,
            mut input,
            mut tokenizer,
            mut sink,
            mut diagnostics,
        } = self;

        let result = tokenizer.run(&mut *input, &mut *sink, &mut diagnostics);
        let stats = tokenizer.stats();
        match &result {
            Ok(()) => {
                tracing::debug!(%slot, %mode, records = stats.records, "job finished");
            }
            Err(err) => {
                diagnostics.warn(format_args!("job stopped: {err}"));
            }
        }
        JobReport {
            slot,
            mode,
            target,
            stats,
            result,
        }
    }
}
