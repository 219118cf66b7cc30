//! Target-name resolution.
//!
//! [`StoreRegistry`] turns a job's target name into a store handle,
//! creating a fresh global container on first reference and refusing
//! bindings that are out of scope or of the wrong kind.

use std::fmt;
use std::sync::{Arc, Mutex};

use populator_arena::Arena;
use populator_core::Flags;

use crate::binding::{
    Binding, BindingValue, HostBindings, ScalarCell, SharedList, SharedStore,
};
use crate::error::RegistryError;
use crate::list::RecordList;
use crate::table::KvStore;

/// Checks applied while resolving a target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolvePolicy {
    /// Reject an existing binding that is not at global scope.
    pub only_global: bool,
    /// Do not log resolution failures.
    pub silent: bool,
}

impl From<Flags> for ResolvePolicy {
    fn from(flags: Flags) -> Self {
        Self {
            only_global: flags.only_global,
            silent: flags.silent,
        }
    }
}

/// Container kind a job writes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// Key/value store.
    Map,
    /// Record list.
    Array,
}

/// A resolved container handle.
#[derive(Clone)]
pub enum Target {
    /// Key/value store.
    Map(SharedStore),
    /// Record list.
    Array(SharedList),
}

impl Target {
    /// Whether both handles refer to the same container.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        match (self, other) {
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The container kind.
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Map(_) => TargetKind::Map,
            Self::Array(_) => TargetKind::Array,
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target::{:?}", self.kind())
    }
}

/// Resolves target names against the host namespace.
pub struct StoreRegistry {
    bindings: Arc<dyn HostBindings>,
    arena: Arena,
}

impl StoreRegistry {
    /// Create a registry over `bindings`; new stores draw from `arena`.
    pub fn new(bindings: Arc<dyn HostBindings>, arena: Arena) -> Self {
        Self { bindings, arena }
    }

    /// The host namespace.
    pub fn bindings(&self) -> &Arc<dyn HostBindings> {
        &self.bindings
    }

    /// The arena new stores draw from.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Resolve `name` to a container of `kind`.
    ///
    /// 1. Unbound: a fresh container is created and bound at global scope.
    /// 2. Bound below global scope with `only_global` set: `ScopeConflict`.
    /// 3. Bound to a different kind: `KindConflict`.
    /// 4. Otherwise the existing container is returned unchanged, so
    ///    resolving the same live name twice yields the same handle.
    pub fn resolve_target(
        &self,
        name: &str,
        kind: TargetKind,
        policy: ResolvePolicy,
    ) -> Result<Target, RegistryError> {
        let result = self.resolve_inner(name, kind, policy);
        if let Err(err) = &result {
            if !policy.silent {
                tracing::warn!(target_name = name, %err, "cannot resolve ingestion target");
            }
        }
        result
    }

    /// Resolve `name` to a key/value store with the default policy.
    pub fn get_or_create(&self, name: &str) -> Result<SharedStore, RegistryError> {
        match self.resolve_target(name, TargetKind::Map, ResolvePolicy::default())? {
            Target::Map(store) => Ok(store),
            Target::Array(_) => unreachable!("map resolution returned an array"),
        }
    }

    /// The pre-existing scalar bound to `name`, if any. Never creates one.
    pub fn scalar(&self, name: &str) -> Option<ScalarCell> {
        match self.bindings.lookup(name)?.value {
            BindingValue::Scalar(cell) => Some(cell),
            _ => None,
        }
    }

    fn resolve_inner(
        &self,
        name: &str,
        kind: TargetKind,
        policy: ResolvePolicy,
    ) -> Result<Target, RegistryError> {
        let binding = match self.bindings.lookup(name) {
            Some(binding) => binding,
            None => {
                let value = self.create(kind)?;
                tracing::debug!(target_name = name, ?kind, "created ingestion target");
                self.bindings.install(name, value)
            }
        };
        check(name, binding, kind, policy)
    }

    fn create(&self, kind: TargetKind) -> Result<BindingValue, RegistryError> {
        Ok(match kind {
            TargetKind::Map => {
                let store = KvStore::with_default_size(self.arena.clone())?;
                BindingValue::Map(Arc::new(Mutex::new(store)))
            }
            TargetKind::Array => {
                BindingValue::Array(Arc::new(Mutex::new(RecordList::new(self.arena.clone()))))
            }
        })
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("arena", &self.arena)
            .finish_non_exhaustive()
    }
}

fn check(
    name: &str,
    binding: Binding,
    kind: TargetKind,
    policy: ResolvePolicy,
) -> Result<Target, RegistryError> {
    if policy.only_global && !binding.level.is_global() {
        return Err(RegistryError::ScopeConflict {
            name: name.to_owned(),
            level: binding.level,
        });
    }
    match (kind, binding.value) {
        (TargetKind::Map, BindingValue::Map(store)) => Ok(Target::Map(store)),
        (TargetKind::Array, BindingValue::Array(list)) => Ok(Target::Array(list)),
        (_, other) => Err(RegistryError::KindConflict {
            name: name.to_owned(),
            found: other.kind(),
        }),
    }
}
