//! Test utilities for Populator development.
//!
//! Provides stream sources with scripted failures ([`FlakySource`],
//! [`BrokenSource`]), a reader that trickles bytes ([`ChunkedReader`]),
//! polling helpers, and record fixtures with their expected contents.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::io::{self, Read};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use populator_engine::InputSource;

pub use fixtures::{expected_pairs, keyed_records, RecordFixture};

/// Input whose first `failures` duplications fail with a transient error.
///
/// Every later duplication reads `data` from the start.
pub struct FlakySource {
    data: Arc<[u8]>,
    remaining_failures: AtomicU32,
    calls: AtomicU32,
    kind: io::ErrorKind,
}

impl FlakySource {
    pub fn new(data: &[u8], failures: u32) -> Self {
        Self {
            data: data.into(),
            remaining_failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            kind: io::ErrorKind::Interrupted,
        }
    }

    /// Fail with `kind` instead of `Interrupted`.
    pub fn with_kind(mut self, kind: io::ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Number of duplication attempts so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InputSource for FlakySource {
    fn try_clone_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(io::Error::new(self.kind, "scripted duplication failure"));
        }
        Ok(Box::new(ChunkedReader::new(self.data.to_vec(), usize::MAX)))
    }
}

/// Input that can never be duplicated.
pub struct BrokenSource {
    kind: io::ErrorKind,
}

impl BrokenSource {
    pub fn new(kind: io::ErrorKind) -> Self {
        Self { kind }
    }
}

impl InputSource for BrokenSource {
    fn try_clone_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        Err(io::Error::new(self.kind, "handle cannot be duplicated"))
    }
}

/// Reader returning at most `chunk` bytes per call.
pub struct ChunkedReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl ChunkedReader {
    pub fn new(data: impl Into<Vec<u8>>, chunk: usize) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            chunk: chunk.max(1),
        }
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Input whose duplicates trickle `data` a few bytes per read.
pub struct TrickleSource {
    data: Vec<u8>,
    chunk: usize,
}

impl TrickleSource {
    pub fn new(data: &[u8], chunk: usize) -> Self {
        Self {
            data: data.to_vec(),
            chunk,
        }
    }
}

impl InputSource for TrickleSource {
    fn try_clone_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(ChunkedReader::new(self.data.clone(), self.chunk)))
    }
}

/// Poll `cond` every millisecond until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Generous timeout for jobs in tests.
pub const JOB_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flaky_source_recovers_after_failures() {
        let src = FlakySource::new(b"abc", 2);
        assert!(src.try_clone_reader().is_err());
        assert!(src.try_clone_reader().is_err());
        let mut out = String::new();
        src.try_clone_reader()
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "abc");
        assert_eq!(src.calls(), 3);
    }

    #[test]
    fn chunked_reader_limits_reads() {
        let mut r = ChunkedReader::new(b"hello".to_vec(), 2);
        let mut buf = [0u8; 8];
        assert_eq!(r.read(&mut buf).unwrap(), 2);
        assert_eq!(r.read(&mut buf).unwrap(), 2);
        assert_eq!(r.read(&mut buf).unwrap(), 1);
        assert_eq!(r.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn wait_until_times_out() {
        assert!(!wait_until(Duration::from_millis(5), || false));
        assert!(wait_until(Duration::from_millis(5), || true));
    }
}
