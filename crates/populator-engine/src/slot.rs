//! Per-slot state shared between the submitter and a worker thread.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;
use std::thread::JoinHandle;

use populator_core::SlotId;
use populator_store::lock_unpoisoned;

/// Flag value while a job runs in the slot.
pub const FLAG_RUNNING: u8 = b'0';

/// Flag value while the slot is free.
pub const FLAG_IDLE: u8 = b'1';

/// One execution unit of the pool, padded to avoid false sharing.
///
/// The submitter claims the slot by swinging `done` from idle to running;
/// the worker thread swings it back when its job has released everything.
#[repr(align(128))]
pub struct WorkerSlot {
    id: SlotId,
    done: AtomicU8,
    jobs_started: AtomicU64,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

// Compile-time assertion: WorkerSlot must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<WorkerSlot>();
};

impl WorkerSlot {
    /// Create an idle slot.
    pub fn new(id: SlotId) -> Self {
        Self {
            id,
            done: AtomicU8::new(FLAG_IDLE),
            jobs_started: AtomicU64::new(0),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Slot id.
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Current flag as a character: `'0'` running, `'1'` idle.
    pub fn done_flag(&self) -> char {
        char::from(self.done.load(Ordering::Acquire))
    }

    /// Whether a job is running.
    pub fn is_running(&self) -> bool {
        self.done.load(Ordering::Acquire) == FLAG_RUNNING
    }

    /// Number of jobs ever launched in this slot.
    pub fn jobs_started(&self) -> u64 {
        self.jobs_started.load(Ordering::Relaxed)
    }

    /// Atomically mark the slot running. Fails if it already was.
    pub(crate) fn try_claim(&self) -> bool {
        let claimed = self
            .done
            .compare_exchange(FLAG_IDLE, FLAG_RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if claimed {
            self.jobs_started.fetch_add(1, Ordering::Relaxed);
        }
        claimed
    }

    /// Mark the slot idle.
    pub(crate) fn mark_done(&self) {
        self.done.store(FLAG_IDLE, Ordering::Release);
    }

    /// Take back the start count of a claim whose thread never ran.
    pub(crate) fn uncount_start(&self) {
        self.jobs_started.fetch_sub(1, Ordering::Relaxed);
    }

    /// Remember the thread running the current job.
    ///
    /// Never waits on a running thread. Handles of threads that already
    /// exited are reaped here.
    pub(crate) fn set_handle(&self, handle: JoinHandle<()>) {
        let finished = {
            let mut handles = lock_unpoisoned(&self.handles);
            let (finished, running): (Vec<_>, Vec<_>) =
                handles.drain(..).partition(JoinHandle::is_finished);
            *handles = running;
            handles.push(handle);
            finished
        };
        for handle in finished {
            let _ = handle.join();
        }
    }

    /// Take every handle not yet joined.
    pub(crate) fn take_handles(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *lock_unpoisoned(&self.handles))
    }
}

impl std::fmt::Debug for WorkerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSlot")
            .field("id", &self.id)
            .field("done", &self.done_flag())
            .field("jobs_started", &self.jobs_started())
            .finish()
    }
}
