//! Per-job diagnostics.
//!
//! Lines go to the job's duplicated sink as `populator[<slot>]: <message>`
//! and are flushed immediately. `silent` suppresses the sink entirely;
//! `debug` additionally enables per-record traces. Unless `silent`,
//! warnings and traces are mirrored to `tracing`.

use std::fmt;
use std::io::Write;

use populator_core::{Flags, SlotId};

/// Diagnostic writer owned by one job.
pub struct Diagnostics {
    writer: Option<Box<dyn Write + Send>>,
    slot: SlotId,
    silent: bool,
    debug: bool,
}

impl Diagnostics {
    /// Create a writer for `slot`. `writer` is `None` when the job has no
    /// sink.
    pub fn new(writer: Option<Box<dyn Write + Send>>, slot: SlotId, flags: Flags) -> Self {
        Self {
            writer,
            slot,
            silent: flags.silent,
            debug: flags.debug,
        }
    }

    /// A writer that discards everything.
    pub fn disabled(slot: SlotId) -> Self {
        Self::new(None, slot, Flags::NONE)
    }

    /// Whether per-record tracing is on.
    pub fn tracing_records(&self) -> bool {
        self.debug && !self.silent && self.writer.is_some()
    }

    /// Report a non-fatal problem.
    pub fn warn(&mut self, args: fmt::Arguments<'_>) {
        if self.silent {
            return;
        }
        tracing::warn!(slot = %self.slot, "{args}");
        self.write_line(args);
    }

    /// Write a problem already logged elsewhere to the sink only.
    pub fn echo(&mut self, args: fmt::Arguments<'_>) {
        if !self.silent {
            self.write_line(args);
        }
    }

    /// Verbose trace, written only in debug mode.
    pub fn trace(&mut self, args: fmt::Arguments<'_>) {
        if self.silent {
            return;
        }
        tracing::trace!(slot = %self.slot, "{args}");
        if self.debug {
            self.write_line(args);
        }
    }

    fn write_line(&mut self, args: fmt::Arguments<'_>) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        // A broken sink must not take the job down with it.
        let _ = writeln!(writer, "populator[{}]: {}", self.slot, args).and_then(|()| writer.flush());
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("slot", &self.slot)
            .field("has_sink", &self.writer.is_some())
            .field("silent", &self.silent)
            .field("debug", &self.debug)
            .finish()
    }
}
