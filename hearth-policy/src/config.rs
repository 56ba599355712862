//! Configuration for the policy service.

use serde::{Deserialize, Serialize};

use crate::types::{PolicyError, DEFAULT_SERVICE_PRINCIPAL};

/// Configuration for a [`crate::PolicyService`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Principal the service privilege is minted for
    pub service_principal: String,
    /// Collection names
    pub collections: CollectionNames,
    /// Repository storage service
    pub repo_service: RepoServiceConfig,
    /// Document store connection
    pub mongo: MongoConfig,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            service_principal: DEFAULT_SERVICE_PRINCIPAL.to_string(),
            collections: CollectionNames::default(),
            repo_service: RepoServiceConfig::default(),
            mongo: MongoConfig::default(),
        }
    }
}

impl PolicyConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, PolicyError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, PolicyError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.service_principal.trim().is_empty() {
            return Err(PolicyError::Config("service_principal must not be empty".into()));
        }
        let names = [
            &self.collections.users,
            &self.collections.projects,
            &self.collections.apps,
        ];
        if names.iter().any(|n| n.is_empty()) {
            return Err(PolicyError::Config("collection names must not be empty".into()));
        }
        if !(self.repo_service.base_url.starts_with("http://")
            || self.repo_service.base_url.starts_with("https://"))
        {
            return Err(PolicyError::Config(format!(
                "repo_service.base_url must be an http(s) URL, got '{}'",
                self.repo_service.base_url
            )));
        }
        Ok(())
    }
}

/// Names of the three policy-governed collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollectionNames {
    pub users: String,
    pub projects: String,
    pub apps: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            users: "users".to_string(),
            projects: "projects".to_string(),
            apps: "apps".to_string(),
        }
    }
}

/// Repository storage service endpoint and shared credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoServiceConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Basic-auth user name
    pub username: String,
    /// Basic-auth password
    pub password: String,
}

impl Default for RepoServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9418".to_string(),
            username: DEFAULT_SERVICE_PRINCIPAL.to_string(),
            password: String::new(),
        }
    }
}

/// MongoDB settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: DEFAULT_SERVICE_PRINCIPAL.to_string(),
        }
    }
}
