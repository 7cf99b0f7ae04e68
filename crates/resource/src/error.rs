//! Error types for resource registration, acquisition and disposal
use thiserror::Error;
use warden_eventbus::BoxError;

use crate::ownership::ResourceId;
use crate::resource::KindId;

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the registry and the ownership tracker
#[derive(Error, Debug)]
pub enum Error {
    /// The helper name is already bound to another kind
    #[error("Helper '{helper}' is already bound to kind '{existing}', cannot bind it to '{requested}'")]
    DuplicateRegistration {
        /// The helper name
        helper: String,
        /// Kind the helper is bound to
        existing: KindId,
        /// Kind the caller tried to bind
        requested: KindId,
    },

    /// The kind does not expose the named teardown operation
    #[error("Kind '{kind}' has no disposal operation '{operation}'")]
    MissingDisposalOperation {
        /// The resource kind
        kind: KindId,
        /// The missing operation name
        operation: String,
    },

    /// The kind was registered earlier with another teardown operation
    #[error(
        "Kind '{kind}' is registered with disposal operation '{existing}', cannot switch to '{requested}'"
    )]
    ConflictingDisposalOperation {
        /// The resource kind
        kind: KindId,
        /// Operation of the existing registration
        existing: String,
        /// Operation the caller asked for
        requested: String,
    },

    /// The kind does not expose the named constructor
    #[error("Kind '{kind}' has no acquisition operation '{operation}'")]
    MissingAcquisitionOperation {
        /// The resource kind
        kind: KindId,
        /// The missing operation name
        operation: String,
    },

    /// No registration can dispose resources of this kind
    #[error("Resource kind '{kind}' is not registered")]
    UnregisteredResource {
        /// The resource kind
        kind: KindId,
    },

    /// The helper produces a different kind than the caller expects
    #[error("Helper '{helper}' acquires '{found}', not '{expected}'")]
    TypeMismatch {
        /// The helper name
        helper: String,
        /// Kind requested by the caller
        expected: KindId,
        /// Kind the helper is bound to
        found: KindId,
    },

    /// No helper with this name is registered
    #[error("No acquisition helper named '{helper}'")]
    UnknownHelper {
        /// The helper name
        helper: String,
    },

    /// The acquisition body failed
    #[error("Acquisition of '{kind}' failed: {source}")]
    Acquisition {
        /// The resource kind
        kind: KindId,
        /// The underlying error
        #[source]
        source: BoxError,
    },

    /// The teardown operation failed
    #[error("Disposal of {resource_id} ('{kind}') failed: {source}")]
    Disposal {
        /// The resource kind
        kind: KindId,
        /// The resource being disposed
        resource_id: ResourceId,
        /// The underlying error
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Whether this error comes from registering a kind.
    #[must_use]
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateRegistration { .. }
                | Self::MissingDisposalOperation { .. }
                | Self::ConflictingDisposalOperation { .. }
                | Self::MissingAcquisitionOperation { .. }
        )
    }

    /// Get the kind associated with this error (if any)
    #[must_use]
    pub fn kind(&self) -> Option<&KindId> {
        match self {
            Self::UnknownHelper { .. } => None,
            Self::DuplicateRegistration { requested, .. } => Some(requested),
            Self::TypeMismatch { expected, .. } => Some(expected),
            Self::MissingDisposalOperation { kind, .. }
            | Self::ConflictingDisposalOperation { kind, .. }
            | Self::MissingAcquisitionOperation { kind, .. }
            | Self::UnregisteredResource { kind }
            | Self::Acquisition { kind, .. }
            | Self::Disposal { kind, .. } => Some(kind),
        }
    }
}
