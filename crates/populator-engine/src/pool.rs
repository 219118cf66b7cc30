//! Fixed-capacity worker pool.
//!
//! One OS thread per running job, at most one job per slot. Submission
//! prepares everything the job needs on the caller's thread, so a failed
//! submission never leaves a half-started worker behind; everything it
//! acquired is dropped before the error is returned.
//!
//! Completion is observable two ways: the polled per-slot `done_flag`
//! table and a [`JobReport`] sent on the pool's report channel once the
//! slot has been released.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use populator_arena::Arena;
use populator_core::{OutputMode, SlotId};
use populator_store::{HostBindings, ResolvePolicy, StoreRegistry, TargetKind};

use crate::config::{ConfigError, PoolConfig};
use crate::diag::Diagnostics;
use crate::error::{DelimiterRole, StreamRole, SubmitError};
use crate::job::{IngestJob, JobReport, JobRequest};
use crate::sink;
use crate::slot::WorkerSlot;
use crate::stream::duplicate_with_retry;
use crate::tokenizer::Tokenizer;

/// Interval between polls in [`WorkerPool::wait_idle`].
const IDLE_POLL: Duration = Duration::from_millis(1);

/// Runs ingestion jobs on dedicated threads, one per slot.
pub struct WorkerPool {
    config: PoolConfig,
    slots: Arc<[WorkerSlot]>,
    active: Arc<AtomicUsize>,
    arena: Arena,
    registry: Arc<StoreRegistry>,
    report_tx: Sender<JobReport>,
    report_rx: Receiver<JobReport>,
}

// Compile-time assertion: WorkerPool must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<WorkerPool>();
};

impl WorkerPool {
    /// Create a pool resolving target names against `bindings`.
    pub fn new(config: PoolConfig, bindings: Arc<dyn HostBindings>) -> Result<Self, ConfigError> {
        config.validate()?;
        let arena = Arena::new(&config.arena);
        let registry = Arc::new(StoreRegistry::new(bindings, arena.clone()));
        let slots: Arc<[WorkerSlot]> = (0..config.worker_count)
            .map(|i| WorkerSlot::new(SlotId(i)))
            .collect();
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        tracing::debug!(workers = config.worker_count, "worker pool created");
        Ok(Self {
            config,
            slots,
            active: Arc::new(AtomicUsize::new(0)),
            arena,
            registry,
            report_tx,
            report_rx,
        })
    }

    /// Start a job.
    ///
    /// Checks, in order: slot range, slot availability, delimiters and
    /// target name. Then duplicates the input and diagnostic handles
    /// (retrying transient failures), resolves the target, copies the
    /// delimiters into the arena, claims the slot and launches the
    /// worker thread. Any failure returns with the pool unchanged.
    pub fn submit(&self, request: JobRequest<'_>) -> Result<(), SubmitError> {
        let slot = request.slot;
        let cell = self
            .slots
            .get(slot.index())
            .ok_or(SubmitError::InvalidSlot {
                slot,
                capacity: self.slots.len(),
            })?;
        if cell.is_running() {
            return Err(SubmitError::SlotBusy { slot });
        }
        if request.delimiter.is_empty() {
            return Err(SubmitError::InvalidDelimiter {
                which: DelimiterRole::Main,
            });
        }
        if request.mode.is_keyed() && request.sub_delimiter.is_empty() {
            return Err(SubmitError::InvalidDelimiter {
                which: DelimiterRole::Sub,
            });
        }
        if request.mode != OutputMode::Vars && request.target.is_empty() {
            return Err(SubmitError::InvalidTarget);
        }

        let attempts = self.config.dup_attempts;
        let input = duplicate_with_retry(attempts, || request.input.try_clone_reader())
            .map_err(|(attempts, err)| stream_setup(StreamRole::Input, attempts, &err))?;
        let writer = match request.diagnostics {
            Some(sink) => Some(
                duplicate_with_retry(attempts, || sink.try_clone_writer())
                    .map_err(|(attempts, err)| stream_setup(StreamRole::Diagnostics, attempts, &err))?,
            ),
            None => None,
        };
        let mut diagnostics = Diagnostics::new(writer, slot, request.flags);

        let target = match request.mode {
            OutputMode::Vars => None,
            mode => {
                let kind = if mode == OutputMode::Array {
                    TargetKind::Array
                } else {
                    TargetKind::Map
                };
                let policy = ResolvePolicy::from(request.flags);
                match self.registry.resolve_target(&request.target, kind, policy) {
                    Ok(target) => Some(target),
                    Err(err) => {
                        // Already logged by the registry.
                        diagnostics.echo(format_args!("{err}"));
                        return Err(err.into());
                    }
                }
            }
        };

        let delimiter = self.arena.duplicate(&request.delimiter)?;
        let sub_delimiter = self.arena.duplicate(&request.sub_delimiter)?;
        // The configuration was validated in `new`, so only the delimiter
        // can be refused here.
        let tokenizer = Tokenizer::new(self.arena.clone(), self.config.tokenizer, delimiter)
            .map_err(|_| SubmitError::InvalidDelimiter {
                which: DelimiterRole::Main,
            })?;
        let sink = sink::for_mode(request.mode, target, sub_delimiter, &self.registry)
            .ok_or(SubmitError::InvalidTarget)?;

        let job = IngestJob {
            slot,
            mode: request.mode,
            target: request.target,
            input,
            tokenizer,
            sink,
            diagnostics,
        };

        // The claim and the active count are visible before the thread
        // exists. If the spawn fails, dropping the closure drops the
        // completion guard, which puts both back.
        if !cell.try_claim() {
            return Err(SubmitError::SlotBusy { slot });
        }
        self.active.fetch_add(1, Ordering::AcqRel);

        let completion = Completion {
            slots: Arc::clone(&self.slots),
            index: slot.index(),
            active: Arc::clone(&self.active),
        };
        let report_tx = self.report_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.config.thread_name_prefix, slot))
            .spawn(move || {
                let report = job.run();
                drop(completion);
                let _ = report_tx.send(report);
            });

        match spawned {
            Ok(handle) => {
                tracing::debug!(%slot, mode = %request.mode, "worker launched");
                cell.set_handle(handle);
                Ok(())
            }
            Err(err) => {
                // The failed spawn dropped the closure, and the completion
                // guard in it released the slot and the active count.
                cell.uncount_start();
                tracing::warn!(%slot, %err, "worker thread launch failed");
                Err(SubmitError::ThreadLaunch {
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of jobs currently running.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Flag of one slot: `'0'` running, `'1'` idle. `None` if out of range.
    pub fn done_flag(&self, slot: SlotId) -> Option<char> {
        self.slots.get(slot.index()).map(WorkerSlot::done_flag)
    }

    /// Every slot's flag, in slot order.
    pub fn done_flags(&self) -> String {
        self.slots.iter().map(WorkerSlot::done_flag).collect()
    }

    /// State of one slot.
    pub fn slot(&self, slot: SlotId) -> Option<&WorkerSlot> {
        self.slots.get(slot.index())
    }

    /// Whether no job is running.
    pub fn is_idle(&self) -> bool {
        self.active_workers() == 0
    }

    /// Poll until no job is running or `timeout` elapses. Returns whether
    /// the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_idle() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(IDLE_POLL);
        }
        true
    }

    /// Receiver for job reports. Every finished job sends exactly one.
    pub fn reports(&self) -> Receiver<JobReport> {
        self.report_rx.clone()
    }

    /// Reports received so far, without blocking.
    pub fn drain_reports(&self) -> Vec<JobReport> {
        self.report_rx.try_iter().collect()
    }

    /// Join every worker thread not yet reaped. Blocks until their inputs
    /// end. Returns the number of threads that exited normally.
    ///
    /// Threads that had already exited when a later job was submitted to
    /// the same slot are reaped at that submission and not counted here.
    pub fn join_all(&self) -> usize {
        let mut joined = 0;
        for slot in self.slots.iter() {
            for handle in slot.take_handles() {
                if handle.join().is_ok() {
                    joined += 1;
                }
            }
        }
        joined
    }

    /// The registry resolving target names.
    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    /// The arena every job and store draws from.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// The configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("capacity", &self.capacity())
            .field("active", &self.active_workers())
            .field("done_flags", &self.done_flags())
            .finish()
    }
}

fn stream_setup(stream: StreamRole, attempts: u32, err: &std::io::Error) -> SubmitError {
    tracing::warn!(%stream, attempts, %err, "stream duplication failed");
    SubmitError::StreamSetup {
        stream,
        attempts,
        reason: err.to_string(),
    }
}

/// Releases a slot when its job ends, including by panic or a failed
/// launch.
struct Completion {
    slots: Arc<[WorkerSlot]>,
    index: usize,
    active: Arc<AtomicUsize>,
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.slots[self.index].mark_done();
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{CaptureSink, MemoryInput};
    use crate::testing::WarnCounter;
    use populator_core::Flags;
    use populator_store::BindingTable;

    fn pool(workers: usize) -> WorkerPool {
        let config = PoolConfig {
            worker_count: workers,
            ..PoolConfig::default()
        };
        WorkerPool::new(config, Arc::new(BindingTable::new())).unwrap()
    }

    #[test]
    fn new_pool_is_idle() {
        let pool = pool(4);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.active_workers(), 0);
        assert_eq!(pool.done_flags(), "1111");
        assert_eq!(pool.done_flag(SlotId(9)), None);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = PoolConfig {
            worker_count: 0,
            ..PoolConfig::default()
        };
        let err = WorkerPool::new(config, Arc::new(BindingTable::new())).unwrap_err();
        assert_eq!(err, ConfigError::ZeroWorkers);
    }

    #[test]
    fn empty_delimiters_are_rejected() {
        let pool = pool(2);
        let input = MemoryInput::new(&b"a:1"[..]);
        let err = pool
            .submit(JobRequest::new(0, OutputMode::Hash, "m", &input).with_delimiter(b""))
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::InvalidDelimiter {
                which: DelimiterRole::Main
            }
        );
        let err = pool
            .submit(JobRequest::new(0, OutputMode::Hash, "m", &input).with_sub_delimiter(b""))
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::InvalidDelimiter {
                which: DelimiterRole::Sub
            }
        );
        // Array mode never splits, so an empty sub-delimiter is fine.
        pool.submit(JobRequest::new(0, OutputMode::Array, "a", &input).with_sub_delimiter(b""))
            .unwrap();
        assert!(pool.wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn missing_target_name_is_rejected() {
        let pool = pool(1);
        let input = MemoryInput::new(&b""[..]);
        let err = pool
            .submit(JobRequest::new(0, OutputMode::Hash, "", &input))
            .unwrap_err();
        assert_eq!(err, SubmitError::InvalidTarget);
        assert!(pool.registry().bindings().lookup("").is_none());
    }

    #[test]
    fn report_is_sent_after_slot_release() {
        let pool = pool(1);
        let input = MemoryInput::new(&b"x:1\ny:2\n"[..]);
        pool.submit(JobRequest::new(0, OutputMode::Hash, "m", &input))
            .unwrap();
        let report = pool
            .reports()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert!(report.is_success());
        assert_eq!(report.stats.records, 2);
        assert_eq!(pool.done_flag(SlotId(0)), Some('1'));
        assert_eq!(pool.active_workers(), 0);
        assert_eq!(pool.join_all(), 1);
    }

    #[test]
    fn dropped_completion_reverts_the_claim() {
        let pool = pool(2);
        let cell = &pool.slots[1];
        assert!(cell.try_claim());
        pool.active.fetch_add(1, Ordering::AcqRel);
        assert_eq!(pool.done_flags(), "10");
        assert_eq!(pool.active_workers(), 1);

        drop(Completion {
            slots: Arc::clone(&pool.slots),
            index: 1,
            active: Arc::clone(&pool.active),
        });
        assert_eq!(pool.done_flags(), "11");
        assert_eq!(pool.active_workers(), 0);
    }

    fn kind_conflict(pool: &WorkerPool, flags: Flags, sink: &CaptureSink) -> usize {
        let input = MemoryInput::new(&b"x:1\n"[..]);
        pool.submit(JobRequest::new(0, OutputMode::Hash, "m", &input))
            .unwrap();
        assert!(pool.wait_idle(Duration::from_secs(5)));

        let warnings = WarnCounter::default();
        let err = tracing::subscriber::with_default(warnings.clone(), || {
            pool.submit(
                JobRequest::new(1, OutputMode::Array, "m", &input)
                    .with_diagnostics(sink)
                    .with_flags(flags),
            )
            .unwrap_err()
        });
        assert!(matches!(err, SubmitError::Registry(_)), "{err:?}");
        warnings.count()
    }

    #[test]
    fn registry_failure_is_logged_once() {
        let sink = CaptureSink::new();
        assert_eq!(kind_conflict(&pool(2), Flags::NONE, &sink), 1);
        assert_eq!(sink.contents().lines().count(), 1);
    }

    #[test]
    fn silent_registry_failure_is_not_logged() {
        let sink = CaptureSink::new();
        let flags = Flags {
            silent: true,
            ..Flags::NONE
        };
        assert_eq!(kind_conflict(&pool(2), flags, &sink), 0);
        assert!(sink.is_empty());
    }
}
