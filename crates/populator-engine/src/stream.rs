//! Duplicable stream handles.
//!
//! A job never takes ownership of the handles it is given. At submission
//! the pool asks each [`InputSource`] and [`DiagnosticSink`] for an
//! independent duplicate; the worker thread owns and closes only that
//! duplicate.

use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use populator_store::lock_unpoisoned;

/// A readable stream that can hand out independently closable duplicates.
pub trait InputSource: Send + Sync {
    /// Duplicate the underlying handle.
    fn try_clone_reader(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// A writable stream that can hand out independently closable duplicates.
pub trait DiagnosticSink: Send + Sync {
    /// Duplicate the underlying handle.
    fn try_clone_writer(&self) -> io::Result<Box<dyn Write + Send>>;
}

impl InputSource for File {
    fn try_clone_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.try_clone()?))
    }
}

impl InputSource for os_pipe::PipeReader {
    fn try_clone_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.try_clone()?))
    }
}

impl DiagnosticSink for File {
    fn try_clone_writer(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(self.try_clone()?))
    }
}

impl DiagnosticSink for os_pipe::PipeWriter {
    fn try_clone_writer(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(self.try_clone()?))
    }
}

impl DiagnosticSink for io::Stderr {
    fn try_clone_writer(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(io::stderr()))
    }
}

// ── In-memory handles ─────────────────────────────────────────────

/// An immutable byte buffer usable as an input. Every duplicate reads
/// from the beginning.
#[derive(Clone, Debug)]
pub struct MemoryInput {
    data: Arc<[u8]>,
}

impl MemoryInput {
    /// Wrap `data`.
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// The wrapped bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl InputSource for MemoryInput {
    fn try_clone_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.data))))
    }
}

/// A diagnostic sink that collects everything written to any duplicate.
#[derive(Clone, Debug, Default)]
pub struct CaptureSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&lock_unpoisoned(&self.buf)).into_owned()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        lock_unpoisoned(&self.buf).is_empty()
    }
}

impl DiagnosticSink for CaptureSink {
    fn try_clone_writer(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(CaptureWriter {
            buf: Arc::clone(&self.buf),
        }))
    }
}

struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Write for CaptureWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        lock_unpoisoned(&self.buf).extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── Duplication with retry ────────────────────────────────────────

/// Whether a duplication failure is worth retrying.
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

/// Call `dup` up to `attempts` times, retrying only transient failures.
///
/// On failure returns the number of attempts made and the last error.
pub(crate) fn duplicate_with_retry<T>(
    attempts: u32,
    mut dup: impl FnMut() -> io::Result<T>,
) -> Result<T, (u32, io::Error)> {
    let mut made = 0;
    loop {
        made += 1;
        match dup() {
            Ok(handle) => return Ok(handle),
            Err(err) if is_transient(&err) && made < attempts => {
                tracing::trace!(attempt = made, %err, "retrying stream duplication");
            }
            Err(err) => return Err((made, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_input_duplicates_read_independently() {
        let input = MemoryInput::new(&b"abc"[..]);
        let mut a = input.try_clone_reader().unwrap();
        let mut b = input.try_clone_reader().unwrap();
        let mut sa = String::new();
        let mut sb = String::new();
        a.read_to_string(&mut sa).unwrap();
        b.read_to_string(&mut sb).unwrap();
        assert_eq!(sa, "abc");
        assert_eq!(sb, "abc");
    }

    #[test]
    fn capture_sink_collects_all_duplicates() {
        let sink = CaptureSink::new();
        let mut a = sink.try_clone_writer().unwrap();
        let mut b = sink.try_clone_writer().unwrap();
        a.write_all(b"one\n").unwrap();
        b.write_all(b"two\n").unwrap();
        assert_eq!(sink.contents(), "one\ntwo\n");
    }

    #[test]
    fn retry_succeeds_after_transient_failures() {
        let mut failures = 3;
        let result = duplicate_with_retry(8, || {
            if failures > 0 {
                failures -= 1;
                Err(io::Error::from(io::ErrorKind::Interrupted))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn retry_gives_up_after_attempt_budget() {
        let mut calls = 0;
        let result: Result<(), _> = duplicate_with_retry(8, || {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        });
        let (attempts, err) = result.unwrap_err();
        assert_eq!(attempts, 8);
        assert_eq!(calls, 8);
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = duplicate_with_retry(8, || {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        });
        assert_eq!(result.unwrap_err().0, 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn pipe_reader_duplicate_sees_writes() {
        let (reader, mut writer) = os_pipe::pipe().unwrap();
        let mut dup = reader.try_clone_reader().unwrap();
        drop(reader);
        writer.write_all(b"piped").unwrap();
        drop(writer);
        let mut out = String::new();
        dup.read_to_string(&mut out).unwrap();
        assert_eq!(out, "piped");
    }
}
