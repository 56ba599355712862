//! Core traits for the repository storage service.

use async_trait::async_trait;

/// Error types for repository service calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepoError {
    /// The service answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never completed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with something unreadable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Operations on the external repository store.
#[async_trait]
pub trait RepoService: Send + Sync {
    /// Create an empty repository `owner/name`.
    async fn create_repo(&self, owner: &str, name: &str) -> Result<(), RepoError>;

    /// Copy `source_owner/source_name` to `new_owner/new_name`.
    async fn fork_repo(
        &self,
        source_owner: &str,
        source_name: &str,
        new_owner: &str,
        new_name: &str,
    ) -> Result<(), RepoError>;

    /// Fetch the object at `path` in `owner/name`, or `None` if there is none.
    ///
    /// `path` must already have passed [`super::validate_path`].
    async fn fetch(&self, owner: &str, name: &str, path: &str) -> Result<Option<serde_json::Value>, RepoError>;
}
