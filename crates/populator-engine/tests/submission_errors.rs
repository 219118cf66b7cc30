//! Integration test: submissions that must fail without touching the pool.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use populator_arena::Arena;
use populator_core::{Flags, OutputMode, ScopeLevel, SlotId};
use populator_engine::{
    CaptureSink, JobRequest, MemoryInput, PoolConfig, StreamRole, SubmitError, WorkerPool,
};
use populator_store::{
    BindingKind, BindingTable, BindingValue, HostBindings, KvStore, RegistryError,
};
use populator_test_utils::{BrokenSource, FlakySource, JOB_TIMEOUT};

fn pool_with(bindings: &Arc<BindingTable>) -> WorkerPool {
    WorkerPool::new(PoolConfig::default(), bindings.clone()).unwrap()
}

#[test]
fn out_of_range_slot_is_rejected() {
    let bindings = Arc::new(BindingTable::new());
    let pool = pool_with(&bindings);
    let input = MemoryInput::new(&b"a:1"[..]);

    let err = pool
        .submit(JobRequest::new(pool.capacity(), OutputMode::Hash, "m", &input))
        .unwrap_err();
    assert_eq!(
        err,
        SubmitError::InvalidSlot {
            slot: SlotId(16),
            capacity: 16
        }
    );
    assert_eq!(pool.active_workers(), 0);
    assert_eq!(pool.done_flags(), "1".repeat(16));
    assert!(bindings.is_empty());
}

#[test]
fn running_slot_rejects_resubmission() {
    let bindings = Arc::new(BindingTable::new());
    let pool = pool_with(&bindings);
    let (reader, mut writer) = os_pipe::pipe().unwrap();

    pool.submit(JobRequest::new(2, OutputMode::Hash, "piped", &reader))
        .unwrap();
    assert_eq!(pool.done_flag(SlotId(2)), Some('0'));
    assert_eq!(pool.active_workers(), 1);

    let other = MemoryInput::new(&b"x:1"[..]);
    let err = pool
        .submit(JobRequest::new(2, OutputMode::Hash, "other", &other))
        .unwrap_err();
    assert_eq!(err, SubmitError::SlotBusy { slot: SlotId(2) });
    assert!(bindings.lookup("other").is_none());
    assert_eq!(pool.active_workers(), 1);

    writer.write_all(b"late:1\n").unwrap();
    drop(writer);
    drop(reader);
    assert!(pool.wait_idle(JOB_TIMEOUT));
    assert_eq!(pool.done_flag(SlotId(2)), Some('1'));
}

#[test]
fn duplication_retries_transient_failures() {
    let bindings = Arc::new(BindingTable::new());
    let pool = pool_with(&bindings);

    let source = FlakySource::new(b"k:v", PoolConfig::DEFAULT_DUP_ATTEMPTS - 1);
    pool.submit(JobRequest::new(0, OutputMode::Hash, "flaky", &source))
        .unwrap();
    assert_eq!(source.calls(), PoolConfig::DEFAULT_DUP_ATTEMPTS);
    assert!(pool.wait_idle(JOB_TIMEOUT));
    assert!(bindings.lookup("flaky").is_some());
}

#[test]
fn duplication_gives_up_after_attempt_budget() {
    let bindings = Arc::new(BindingTable::new());
    let pool = pool_with(&bindings);

    let source = FlakySource::new(b"k:v", PoolConfig::DEFAULT_DUP_ATTEMPTS)
        .with_kind(io::ErrorKind::WouldBlock);
    let err = pool
        .submit(JobRequest::new(0, OutputMode::Hash, "never", &source))
        .unwrap_err();
    assert!(matches!(
        err,
        SubmitError::StreamSetup {
            stream: StreamRole::Input,
            attempts: PoolConfig::DEFAULT_DUP_ATTEMPTS,
            ..
        }
    ));
    assert_eq!(pool.active_workers(), 0);
    assert!(bindings.lookup("never").is_none());
}

#[test]
fn permanent_duplication_failure_is_not_retried() {
    let bindings = Arc::new(BindingTable::new());
    let pool = pool_with(&bindings);
    let source = BrokenSource::new(io::ErrorKind::PermissionDenied);
    let err = pool
        .submit(JobRequest::new(0, OutputMode::Array, "list", &source))
        .unwrap_err();
    assert!(matches!(
        err,
        SubmitError::StreamSetup { attempts: 1, .. }
    ));
}

#[test]
fn scoped_binding_is_refused_with_only_global() {
    let bindings = Arc::new(BindingTable::new());
    let store = KvStore::with_default_size(Arena::default()).unwrap();
    bindings.declare(
        "local",
        BindingValue::Map(Arc::new(Mutex::new(store))),
        ScopeLevel(1),
    );
    let pool = pool_with(&bindings);
    let input = MemoryInput::new(&b"a:1"[..]);
    let sink = CaptureSink::new();

    let flags = Flags {
        only_global: true,
        ..Flags::NONE
    };
    let err = pool
        .submit(
            JobRequest::new(0, OutputMode::Hash, "local", &input)
                .with_diagnostics(&sink)
                .with_flags(flags),
        )
        .unwrap_err();
    assert_eq!(
        err,
        SubmitError::Registry(RegistryError::ScopeConflict {
            name: "local".into(),
            level: ScopeLevel(1),
        })
    );
    assert!(sink.contents().starts_with("populator[0]: "));
    assert_eq!(pool.active_workers(), 0);

    // Without the flag the scoped store is used as-is.
    pool.submit(JobRequest::new(0, OutputMode::Hash, "local", &input))
        .unwrap();
    assert!(pool.wait_idle(JOB_TIMEOUT));
}

#[test]
fn wrong_kind_is_refused_silently_when_asked() {
    let bindings = Arc::new(BindingTable::new());
    bindings.declare_scalar("scalar", ScopeLevel::GLOBAL);
    let pool = pool_with(&bindings);
    let input = MemoryInput::new(&b"a:1"[..]);
    let sink = CaptureSink::new();

    let err = pool
        .submit(
            JobRequest::new(0, OutputMode::Hash, "scalar", &input)
                .with_diagnostics(&sink)
                .with_flags(Flags {
                    silent: true,
                    ..Flags::NONE
                }),
        )
        .unwrap_err();
    assert_eq!(
        err,
        SubmitError::Registry(RegistryError::KindConflict {
            name: "scalar".into(),
            found: BindingKind::Scalar,
        })
    );
    assert!(sink.is_empty());
}

#[test]
fn failed_submission_releases_everything() {
    let bindings = Arc::new(BindingTable::new());
    bindings.declare_scalar("taken", ScopeLevel::GLOBAL);
    let pool = pool_with(&bindings);
    let before = pool.arena().stats();

    let input = MemoryInput::new(&b"a:1"[..]);
    let err = pool
        .submit(JobRequest::new(0, OutputMode::Array, "taken", &input))
        .unwrap_err();
    assert!(matches!(err, SubmitError::Registry(_)));
    assert_eq!(pool.arena().stats().live_blocks, before.live_blocks);
}
