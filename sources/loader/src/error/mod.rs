use thiserror::Error;

use crate::{object::loader::LoaderId, security::Operation};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("class {0} could not be found")]
    NotFound(String),

    #[error("class {name} is incorrectly formatted (reason: {reason})")]
    InvalidFormat { name: String, reason: String },

    #[error("wrong name: expected {expected}, but the bytes define {found}")]
    NameMismatch { expected: String, found: String },

    #[error("class {0} has already been defined by this loader")]
    DuplicateDefinition(String),

    #[error("package {0} has already been defined")]
    AlreadyDefined(String),

    #[error("access denied for operation '{0}'")]
    AccessDenied(Operation),

    #[error("range {offset}..{offset}+{length} is out of bounds for {size} bytes")]
    IndexOutOfBounds {
        offset: usize,
        length: usize,
        size: usize,
    },

    #[error("prohibited package name: {0}")]
    ProhibitedPackage(String),

    #[error("sealing violation: package {package} is sealed to {sealed_to}")]
    SealingViolation { package: String, sealed_to: String },

    #[error("{0} is not registered with this registry")]
    UnknownLoader(LoaderId),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LoadError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound(_))
    }
}

#[macro_export]
macro_rules! internal {
    ($msg:literal $(,)?) => {
        $crate::error::LoadError::Internal(anyhow::anyhow!($msg))
    };
    ($err:expr $(,)?) => {
        $crate::error::LoadError::Internal(anyhow::anyhow!($err))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::LoadError::Internal(anyhow::anyhow!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internalise {
    () => {
        |f| $crate::internal!(f)
    };
}
