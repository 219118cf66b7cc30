//! Core types for the Populator ingestion pipeline.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the small vocabulary shared by the arena, store, and engine crates:
//! slot and scope identifiers, the output mode of a job, and job flags.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod id;
pub mod mode;

pub use id::{ScopeLevel, SlotId};
pub use mode::{Flags, OutputMode};
