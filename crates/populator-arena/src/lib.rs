//! Thread-safe allocation primitives for Populator worker threads.
//!
//! Every byte a worker thread keeps (table keys and values, delimiter
//! copies, tokenizer buffers) is obtained through an [`Arena`]. The arena
//! wraps a single injected [`AllocBackend`]; there is no separate
//! "thread-safe" and "ordinary" path.
//!
//! # Architecture
//!
//! ```text
//! Arena (cheap Clone handle)
//! └── Arc<ArenaShared>
//!     ├── Arc<dyn AllocBackend>   SystemBackend | BudgetBackend
//!     └── live block / byte / failure counters
//!
//! Block (owned region) ──drop──> ArenaShared::release ──> backend.release
//! ```
//!
//! # Failure policy
//!
//! - [`Arena::allocate`], [`Arena::zeroed_allocate`], [`Arena::duplicate`]
//!   and [`Arena::try_reallocate`] report failure as [`ArenaError`]; the
//!   caller aborts its job cleanly.
//! - [`Arena::reallocate`] has no recovery path: a failure is logged and
//!   the process aborts.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod backend;
pub mod block;
pub mod config;
pub mod error;

// Public re-exports for the primary API surface.
pub use arena::{Arena, ArenaStats};
pub use backend::{AllocBackend, BudgetBackend, SystemBackend};
pub use block::Block;
pub use config::ArenaConfig;
pub use error::ArenaError;
