//! Populator: concurrent ingestion of delimited byte streams into named
//! key/value stores.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Populator sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use populator::prelude::*;
//!
//! let bindings = Arc::new(BindingTable::new());
//! let pool = WorkerPool::new(PoolConfig::default(), bindings.clone()).unwrap();
//!
//! let input = MemoryInput::new(&b"user:alice\nshell:/bin/sh"[..]);
//! pool.submit(JobRequest::new(0, OutputMode::Hash, "env", &input)).unwrap();
//! assert!(pool.wait_idle(Duration::from_secs(10)));
//!
//! let store = pool.registry().get_or_create("env").unwrap();
//! let store = lock_unpoisoned(&store);
//! assert_eq!(store.lookup(b"user"), Some(&b"alice"[..]));
//! assert_eq!(store.len(), 2);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `populator-core` | Slot ids, scope levels, output modes, flags |
//! | [`arena`] | `populator-arena` | Thread-safe arena allocator and blocks |
//! | [`store`] | `populator-store` | Hash table, record list, bindings, registry |
//! | [`engine`] | `populator-engine` | Streams, tokenizer, worker pool |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Shared leaf types (`populator-core`).
pub use populator_core as types;

/// Arena allocator (`populator-arena`).
///
/// [`arena::Arena`] hands out owned [`arena::Block`]s; a budget backend
/// makes allocation failure reproducible.
pub use populator_arena as arena;

/// Stores and target resolution (`populator-store`).
pub use populator_store as store;

/// Streams, tokenizer and worker pool (`populator-engine`).
///
/// [`engine::WorkerPool::submit`] is the entry point.
pub use populator_engine as engine;

/// Common imports for typical Populator usage.
///
/// ```rust
/// use populator::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use populator_core::{Flags, OutputMode, ScopeLevel, SlotId};

    // Arena
    pub use populator_arena::{Arena, ArenaConfig, ArenaError, Block};

    // Stores
    pub use populator_store::{
        lock_unpoisoned, BindingTable, BindingValue, HostBindings, KvStore, RecordList,
        RegistryError, StoreRegistry,
    };

    // Engine
    pub use populator_engine::{
        CaptureSink, DiagnosticSink, InputSource, JobError, JobReport, JobRequest, MemoryInput,
        PoolConfig, SubmitError, WorkerPool,
    };
}
