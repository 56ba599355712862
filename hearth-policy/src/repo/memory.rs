//! In-process repository service for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{RepoError, RepoService};

/// A call received by [`MemoryRepoService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoCall {
    Create {
        owner: String,
        name: String,
    },
    Fork {
        source_owner: String,
        source_name: String,
        new_owner: String,
        new_name: String,
    },
    Fetch {
        owner: String,
        name: String,
        path: String,
    },
}

/// Repository service that records calls and serves canned objects.
pub struct MemoryRepoService {
    calls: Arc<RwLock<Vec<RepoCall>>>,
    objects: Arc<RwLock<HashMap<(String, String, String), serde_json::Value>>>,
    failing: AtomicBool,
}

impl MemoryRepoService {
    /// Create a service that accepts every call.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            objects: Arc::new(RwLock::new(HashMap::new())),
            failing: AtomicBool::new(false),
        }
    }

    /// Make create and fork calls fail with a 500 status.
    pub fn with_failure(self, failing: bool) -> Self {
        self.failing.store(failing, Ordering::SeqCst);
        self
    }

    /// Serve `value` for `owner/name/path`.
    pub async fn put_object(&self, owner: &str, name: &str, path: &str, value: serde_json::Value) {
        let mut objects = self.objects.write().await;
        objects.insert((owner.to_string(), name.to_string(), path.to_string()), value);
    }

    /// Every call received so far, oldest first.
    pub async fn calls(&self) -> Vec<RepoCall> {
        self.calls.read().await.clone()
    }

    async fn record(&self, call: RepoCall) {
        self.calls.write().await.push(call);
    }

    fn check_failure(&self) -> Result<(), RepoError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepoError::Status {
                status: 500,
                body: "repository service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MemoryRepoService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RepoService for MemoryRepoService {
    async fn create_repo(&self, owner: &str, name: &str) -> Result<(), RepoError> {
        self.record(RepoCall::Create {
            owner: owner.to_string(),
            name: name.to_string(),
        })
        .await;
        self.check_failure()
    }

    async fn fork_repo(
        &self,
        source_owner: &str,
        source_name: &str,
        new_owner: &str,
        new_name: &str,
    ) -> Result<(), RepoError> {
        self.record(RepoCall::Fork {
            source_owner: source_owner.to_string(),
            source_name: source_name.to_string(),
            new_owner: new_owner.to_string(),
            new_name: new_name.to_string(),
        })
        .await;
        self.check_failure()
    }

    async fn fetch(&self, owner: &str, name: &str, path: &str) -> Result<Option<serde_json::Value>, RepoError> {
        self.record(RepoCall::Fetch {
            owner: owner.to_string(),
            name: name.to_string(),
            path: path.to_string(),
        })
        .await;
        let objects = self.objects.read().await;
        Ok(objects
            .get(&(owner.to_string(), name.to_string(), path.to_string()))
            .cloned())
    }
}
