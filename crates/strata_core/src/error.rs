//! Error taxonomy shared by every STRATA crate.

use crate::id::MemberId;

/// Grid result type
pub type GridResult<T> = Result<T, GridError>;

/// Grid error type
///
/// Validation and type errors are raised synchronously to the caller and are
/// never retried. Delivery failures are recorded per recipient by the message
/// bus instead of aborting a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// Blank name, malformed endpoint and similar call-boundary failures
    #[error("Invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// A collection name is already bound to another kind or type shape
    #[error("Type mismatch for collection {name}: expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Member identity already present in the registry
    #[error("Member already joined: {id}")]
    DuplicateMember { id: MemberId },

    /// Another running member already uses this name
    #[error("Member name already in use: {name}")]
    MemberNameInUse { name: String },

    /// Operation attempted outside the running state
    #[error("Member is not running: {member}")]
    NotRunning { member: String },

    /// Lifecycle or bus state does not allow the operation
    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    /// A single peer failed to accept a broadcast message
    #[error("Delivery to {peer} failed: {reason}")]
    DeliveryFailed { peer: MemberId, reason: String },
}

impl GridError {
    /// Shorthand for [`GridError::InvalidArgument`]
    #[must_use]
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check whether this is a type mismatch
    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_argument("config", err.to_string())
    }
}
