//! Error types for policy operations

use hearth_label::LabelError;

use crate::db::StoreError;
use crate::repo::RepoError;

/// Main error type for policy operations
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    /// The service was handed a privilege that is not a single principal.
    /// This is a programming error, not a request failure.
    #[error("Malformed privilege: {0}")]
    MalformedPrivilege(String),

    #[error("Permission denied: {0}")]
    PermissionError(String),

    /// A privileged operation was attempted with a privilege the store was
    /// not built around.
    #[error("Foreign privilege: {0}")]
    ForeignPrivilege(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Repository service failed: {0}")]
    ExternalServiceFailure(#[from] RepoError),

    #[error("Label check denied: {0}")]
    Denied(LabelError),

    #[error("Field '{field}' is not searchable in {collection}")]
    UnsearchableField { collection: String, field: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<LabelError> for PolicyError {
    fn from(err: LabelError) -> Self {
        match err {
            LabelError::MalformedPrivilege(msg) => Self::MalformedPrivilege(msg),
            other => Self::Denied(other),
        }
    }
}

impl From<bson::de::Error> for PolicyError {
    fn from(err: bson::de::Error) -> Self {
        Self::ValidationFailure(err.to_string())
    }
}

impl From<bson::ser::Error> for PolicyError {
    fn from(err: bson::ser::Error) -> Self {
        Self::ValidationFailure(err.to_string())
    }
}

impl From<serde_yaml::Error> for PolicyError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl PolicyError {
    /// Whether the failure came from a label check.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_) | Self::ForeignPrivilege(_))
    }
}
