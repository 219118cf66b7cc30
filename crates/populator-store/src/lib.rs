//! Key/value storage for the Populator ingestion pipeline.
//!
//! Provides the chained hash table that keyed jobs write into
//! ([`KvStore`]), the record list that array jobs append to
//! ([`RecordList`]), the host binding model that names them
//! ([`HostBindings`], [`BindingTable`]), and the [`StoreRegistry`] that
//! resolves a target name to a store handle.
//!
//! All owned strings live in [`populator_arena::Block`]s drawn from one
//! shared [`Arena`](populator_arena::Arena).
//!
//! # Locking
//!
//! Tables perform no internal locking. Every store reachable through a
//! binding is wrapped in its own `Arc<Mutex<_>>` ([`SharedStore`],
//! [`SharedList`]), so writers serialize per store and independent stores
//! never contend.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod binding;
pub mod error;
pub mod hash;
pub mod list;
pub mod registry;
pub mod table;

pub use binding::{
    lock_unpoisoned, Binding, BindingKind, BindingTable, BindingValue, HostBindings, ScalarCell,
    SharedList, SharedStore,
};
pub use error::RegistryError;
pub use list::RecordList;
pub use registry::{ResolvePolicy, StoreRegistry, Target, TargetKind};
pub use table::{KvEntry, KvStore};
