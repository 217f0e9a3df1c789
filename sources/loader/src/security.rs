use std::{collections::HashSet, fmt};

use parking_lot::RwLock;
use tracing::warn;

use crate::{error::LoadError, source::Origin};

/// The sensitive operations a [`SecurityPolicy`] is consulted about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateClassLoader,
    GetClassLoader,
    GetProtectionDomain,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::CreateClassLoader => "createClassLoader",
            Operation::GetClassLoader => "getClassLoader",
            Operation::GetProtectionDomain => "getProtectionDomain",
        };

        write!(f, "{}", name)
    }
}

pub trait SecurityPolicy: Send + Sync {
    /// Return normally to allow `operation`, or fail with [`LoadError::AccessDenied`].
    fn check_allowed(&self, operation: Operation) -> Result<(), LoadError>;
}

/// Allows everything. Used when no policy is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermitAll;

impl SecurityPolicy for PermitAll {
    fn check_allowed(&self, _: Operation) -> Result<(), LoadError> {
        Ok(())
    }
}

/// Vetoes a configurable set of operations. The set can change while loaders hold the policy.
#[derive(Debug, Default)]
pub struct DenyList {
    denied: RwLock<HashSet<Operation>>,
}

impl DenyList {
    pub fn new(denied: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            denied: RwLock::new(denied.into_iter().collect()),
        }
    }

    pub fn deny(&self, operation: Operation) -> &Self {
        self.denied.write().insert(operation);
        self
    }

    pub fn allow(&self, operation: Operation) -> &Self {
        self.denied.write().remove(&operation);
        self
    }

    pub fn allow_all(&self) {
        self.denied.write().clear();
    }
}

impl SecurityPolicy for DenyList {
    fn check_allowed(&self, operation: Operation) -> Result<(), LoadError> {
        if self.denied.read().contains(&operation) {
            warn!("Denied {}", operation);
            return Err(LoadError::AccessDenied(operation));
        }

        Ok(())
    }
}

/// Where a class came from. Classes defined without a domain get their loader's default,
/// which has no code source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectionDomain {
    code_source: Option<Origin>,
}

impl ProtectionDomain {
    pub fn new(code_source: Option<Origin>) -> Self {
        Self { code_source }
    }

    pub fn from_origin(origin: Origin) -> Self {
        Self {
            code_source: Some(origin),
        }
    }

    pub fn code_source(&self) -> Option<&Origin> {
        self.code_source.as_ref()
    }
}
