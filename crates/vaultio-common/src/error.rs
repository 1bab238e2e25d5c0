//! Error types for VaultIO
//!
//! This module defines the common error types used throughout the system.

use thiserror::Error;

/// Common result type for VaultIO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for VaultIO
#[derive(Debug, Clone, Error)]
pub enum Error {
    // Introspection registry errors
    #[error("no such attribute: {0}")]
    AttrNotFound(String),

    #[error("attribute has no {direction} accessor: {name}")]
    Unsupported { name: String, direction: Direction },

    #[error("namespace entry already exists: {0}")]
    RegistrationConflict(String),

    #[error("namespace allocation failed: {0}")]
    AllocationFailure(String),

    #[error("invalid namespace entry name: {0:?}")]
    InvalidName(String),

    // Attribute value errors
    #[error("invalid attribute value: {0:?}")]
    InvalidValue(String),
}

/// Direction of an attribute access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Show,
    Store,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Show => write!(f, "show"),
            Self::Store => write!(f, "store"),
        }
    }
}

impl Error {
    /// Create an unsupported-access error for a show dispatch
    pub fn no_show(name: impl Into<String>) -> Self {
        Self::Unsupported {
            name: name.into(),
            direction: Direction::Show,
        }
    }

    /// Create an unsupported-access error for a store dispatch
    pub fn no_store(name: impl Into<String>) -> Self {
        Self::Unsupported {
            name: name.into(),
            direction: Direction::Store,
        }
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AttrNotFound(_))
    }

    /// Get the negative POSIX error code reported to external callers
    ///
    /// The presentation host surfaces registry failures as ordinary
    /// filesystem error codes. An unwired accessor is indistinguishable
    /// from a generic I/O failure at that boundary.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::AttrNotFound(_) => -libc::ENOENT,
            Self::Unsupported { .. } => -libc::EIO,
            Self::RegistrationConflict(_) => -libc::EEXIST,
            Self::AllocationFailure(_) => -libc::ENOMEM,
            Self::InvalidName(_) | Self::InvalidValue(_) => -libc::EINVAL,
        }
    }
}
