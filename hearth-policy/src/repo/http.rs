//! HTTP client for the repository storage service.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, info};

use super::traits::{RepoError, RepoService};
use crate::config::RepoServiceConfig;

/// Repository service reached over HTTP with a shared basic-auth credential.
///
/// One request per call; no retry or backoff.
pub struct HttpRepoService {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

#[derive(Serialize)]
struct ForkRequest<'a> {
    owner: &'a str,
    name: &'a str,
}

impl HttpRepoService {
    /// Create a client for the configured service.
    pub fn new(config: &RepoServiceConfig) -> Result<Self, RepoError> {
        let client = Client::builder()
            .build()
            .map_err(|e| RepoError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn repo_url(&self, owner: &str, name: &str) -> String {
        format!("{}/repos/{}/{}", self.base_url, owner, name)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RepoError> {
        self.authed(request)
            .send()
            .await
            .map_err(|e| RepoError::Transport(e.to_string()))
    }

    async fn expect_success(response: Response) -> Result<Response, RepoError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(RepoError::Status { status, body })
    }
}

#[async_trait]
impl RepoService for HttpRepoService {
    async fn create_repo(&self, owner: &str, name: &str) -> Result<(), RepoError> {
        let url = self.repo_url(owner, name);
        debug!(url = %url, "Creating repository");
        let response = self.send(self.client.post(&url)).await?;
        Self::expect_success(response).await?;
        info!(owner = %owner, name = %name, "Repository created");
        Ok(())
    }

    async fn fork_repo(
        &self,
        source_owner: &str,
        source_name: &str,
        new_owner: &str,
        new_name: &str,
    ) -> Result<(), RepoError> {
        let url = format!("{}/fork", self.repo_url(source_owner, source_name));
        let body = ForkRequest {
            owner: new_owner,
            name: new_name,
        };
        debug!(url = %url, "Forking repository");
        let response = self.send(self.client.post(&url).json(&body)).await?;
        Self::expect_success(response).await?;
        info!(
            source = %format!("{}/{}", source_owner, source_name),
            owner = %new_owner,
            name = %new_name,
            "Repository forked"
        );
        Ok(())
    }

    async fn fetch(&self, owner: &str, name: &str, path: &str) -> Result<Option<serde_json::Value>, RepoError> {
        let url = format!("{}/{}", self.repo_url(owner, name), path);
        debug!(url = %url, "Fetching repository object");
        let response = self.send(self.client.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::expect_success(response).await?;
        let value = response
            .json()
            .await
            .map_err(|e| RepoError::InvalidResponse(e.to_string()))?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // "hearth:s3cret"
    const AUTH: &str = "Basic aGVhcnRoOnMzY3JldA==";

    fn service_for(server: &MockServer) -> HttpRepoService {
        HttpRepoService::new(&RepoServiceConfig {
            base_url: format!("{}/", server.uri()),
            username: "hearth".into(),
            password: "s3cret".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_repo_posts_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/alice/foo"))
            .and(header("authorization", AUTH))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        service_for(&server).create_repo("alice", "foo").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_repo_failure_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/alice/foo"))
            .respond_with(ResponseTemplate::new(409).set_body_string("exists"))
            .mount(&server)
            .await;

        let err = service_for(&server).create_repo("alice", "foo").await.unwrap_err();
        match err {
            RepoError::Status { status, body } => {
                assert_eq!(status, 409);
                assert_eq!(body, "exists");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fork_repo_sends_destination() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/carol/bar/fork"))
            .and(header("authorization", AUTH))
            .and(body_json(json!({ "owner": "alice", "name": "foo2" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        service_for(&server)
            .fork_repo("carol", "bar", "alice", "foo2")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fetch_returns_json_or_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/foo/tree/src"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "entries": ["main.rs"] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/foo/tree/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let repos = service_for(&server);
        let found = repos.fetch("alice", "foo", "tree/src").await.unwrap();
        assert_eq!(found, Some(json!({ "entries": ["main.rs"] })));
        assert!(repos.fetch("alice", "foo", "tree/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/foo/blob/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = service_for(&server).fetch("alice", "foo", "blob/x").await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidResponse(_)));
    }
}
