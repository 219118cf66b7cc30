//! Host binding model: what a target name refers to.
//!
//! The pipeline never owns the host's namespace. It talks to it through
//! [`HostBindings`], which can look a name up and install a new global
//! container. [`BindingTable`] is the in-process implementation.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use indexmap::IndexMap;
use populator_arena::Block;
use populator_core::ScopeLevel;

use crate::list::RecordList;
use crate::table::KvStore;

/// A key/value store shared between the host and worker threads.
pub type SharedStore = Arc<Mutex<KvStore>>;

/// A record list shared between the host and worker threads.
pub type SharedList = Arc<Mutex<RecordList>>;

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// A writer that panics mid-record leaves at worst one record missing;
/// the table itself stays structurally valid.
pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A writable scalar binding.
#[derive(Clone, Default)]
pub struct ScalarCell {
    value: Arc<Mutex<Option<Block>>>,
}

impl ScalarCell {
    /// Create an unset scalar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the scalar's value.
    pub fn set(&self, value: Block) {
        *lock_unpoisoned(&self.value) = Some(value);
    }

    /// Copy of the current value, if set.
    pub fn get(&self) -> Option<Vec<u8>> {
        lock_unpoisoned(&self.value)
            .as_ref()
            .map(|b| b.as_bytes().to_vec())
    }

    /// Whether two handles refer to the same scalar.
    pub fn ptr_eq(&self, other: &ScalarCell) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for ScalarCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.get();
        f.debug_tuple("ScalarCell")
            .field(&value.as_deref().map(String::from_utf8_lossy))
            .finish()
    }
}

/// Kind of value a binding holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Key/value store.
    Map,
    /// Record list.
    Array,
    /// Scalar string.
    Scalar,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map => write!(f, "map"),
            Self::Array => write!(f, "array"),
            Self::Scalar => write!(f, "scalar"),
        }
    }
}

/// The value behind a binding.
#[derive(Clone)]
pub enum BindingValue {
    /// Key/value store.
    Map(SharedStore),
    /// Record list.
    Array(SharedList),
    /// Scalar string.
    Scalar(ScalarCell),
}

impl BindingValue {
    /// The value's kind.
    pub fn kind(&self) -> BindingKind {
        match self {
            Self::Map(_) => BindingKind::Map,
            Self::Array(_) => BindingKind::Array,
            Self::Scalar(_) => BindingKind::Scalar,
        }
    }
}

impl fmt::Debug for BindingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindingValue::{}", self.kind())
    }
}

/// A named value together with the scope it lives in.
#[derive(Clone, Debug)]
pub struct Binding {
    /// The bound value.
    pub value: BindingValue,
    /// Scope the binding was declared at.
    pub level: ScopeLevel,
}

/// The host namespace as seen by the pipeline.
pub trait HostBindings: Send + Sync {
    /// The binding currently visible under `name`.
    fn lookup(&self, name: &str) -> Option<Binding>;

    /// Bind `value` to `name` at global scope.
    ///
    /// If `name` became bound in the meantime, the existing binding wins
    /// and is returned unchanged; `value` is dropped.
    fn install(&self, name: &str, value: BindingValue) -> Binding;
}

/// In-process [`HostBindings`] backed by an insertion-ordered map.
#[derive(Default)]
pub struct BindingTable {
    entries: RwLock<IndexMap<String, Binding>>,
}

// Compile-time assertion: BindingTable must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<BindingTable>();
};

impl BindingTable {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` to `name` at `level`, replacing any existing binding.
    pub fn declare(&self, name: &str, value: BindingValue, level: ScopeLevel) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), Binding { value, level });
    }

    /// Declare an unset scalar at `level` and return a handle to it.
    pub fn declare_scalar(&self, name: &str, level: ScopeLevel) -> ScalarCell {
        let cell = ScalarCell::new();
        self.declare(name, BindingValue::Scalar(cell.clone()), level);
        cell
    }

    /// Remove a binding.
    pub fn remove(&self, name: &str) -> Option<Binding> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(name)
    }

    /// Bound names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no names are bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HostBindings for BindingTable {
    fn lookup(&self, name: &str) -> Option<Binding> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn install(&self, name: &str, value: BindingValue) -> Binding {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_owned())
            .or_insert(Binding {
                value,
                level: ScopeLevel::GLOBAL,
            })
            .clone()
    }
}

impl fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTable")
            .field("names", &self.names())
            .finish()
    }
}
