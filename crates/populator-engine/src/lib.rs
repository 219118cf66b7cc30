//! Worker pool and streaming tokenizer for the Populator ingestion
//! pipeline.
//!
//! A caller submits a [`JobRequest`] naming a slot, an output mode, a
//! target and two stream handles. The [`WorkerPool`] duplicates the
//! handles, resolves the target through the
//! [`StoreRegistry`](populator_store::StoreRegistry) and starts one thread
//! that tokenizes the input into the target until end of stream.
//!
//! ```text
//!   caller ── submit ──▶ WorkerPool ──spawn──▶ worker thread
//!                            │                     │
//!                  StoreRegistry (resolve)    Tokenizer ─▶ RecordSink ─▶ store
//!                            │                     │
//!                      done_flags ◀── Completion ──┘──▶ JobReport channel
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod diag;
pub mod error;
pub mod job;
pub mod pool;
pub mod sink;
pub mod slot;
pub mod stream;
pub mod tokenizer;

#[cfg(test)]
mod testing;

pub use buffer::RecordBuffer;
pub use config::{ConfigError, PoolConfig, TokenizerConfig};
pub use diag::Diagnostics;
pub use error::{DelimiterRole, JobError, StreamRole, SubmitError};
pub use job::{JobReport, JobRequest};
pub use pool::WorkerPool;
pub use sink::{ListSink, MapSink, RecordSink, ScalarSink};
pub use slot::WorkerSlot;
pub use stream::{CaptureSink, DiagnosticSink, InputSource, MemoryInput};
pub use tokenizer::{Tokenizer, TokenizerStats};
