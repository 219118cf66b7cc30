//! Target resolution errors.

use std::error::Error;
use std::fmt;

use populator_arena::ArenaError;
use populator_core::ScopeLevel;

use crate::binding::BindingKind;

/// Errors from [`StoreRegistry::resolve_target`](crate::StoreRegistry::resolve_target).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// An existing binding lives below global scope and the caller
    /// required a global one.
    ScopeConflict {
        /// Target name.
        name: String,
        /// Scope level of the existing binding.
        level: ScopeLevel,
    },
    /// An existing binding is not of the kind the job writes into.
    KindConflict {
        /// Target name.
        name: String,
        /// Kind of the existing binding.
        found: BindingKind,
    },
    /// A fresh store could not be allocated.
    Allocation(ArenaError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScopeConflict { name, level } => {
                write!(f, "{name}: existing binding is local (level {level}), not global")
            }
            Self::KindConflict { name, found } => {
                write!(f, "{name}: existing binding is a {found}, not a compatible container")
            }
            Self::Allocation(e) => write!(f, "cannot create store: {e}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Allocation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArenaError> for RegistryError {
    fn from(e: ArenaError) -> Self {
        Self::Allocation(e)
    }
}
