//! Hearth Policy - content-derived access control for hosted projects
//!
//! Decides, per document, who may read and who may write, using labels
//! computed from the document itself:
//!
//! - **Entities**: users, projects and apps, each with a label policy
//! - **Labeled store**: reads taint the request, writes are checked against
//!   the destination label under a scoped, privileged downgrade
//! - **Merge engine**: partial updates that never touch protected fields,
//!   SSH-key management and project forking
//! - **Groups**: `canread:`/`canwrite:` principals resolved from projects
//! - **Repository lifecycle**: create or fork the backing repository once
//!   the project document is stored
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bson::doc;
//! use hearth_label::{Context, Labeled};
//! use hearth_policy::{MemoryRepoService, MemoryStore, PolicyConfig, PolicyService, Record};
//!
//! # async fn run() -> Result<(), hearth_policy::PolicyError> {
//! let service = PolicyService::new(
//!     PolicyConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryRepoService::new()),
//! )?;
//!
//! let mut ctx = Context::new("alice");
//! let form = Labeled::new(ctx.label().clone(), doc! { "name": "foo", "public": "off" });
//! let project = service.mk_project(&mut ctx, form).await?;
//! let id = service.create_project(&mut ctx, Record::Labeled(project)).await?;
//! service.update_user_with_proj_id(&mut ctx, "alice", id).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod entity;
pub mod groups;
pub mod merge;
pub mod repo;
pub mod service;
pub mod store;
pub mod types;

// Re-export main types
pub use config::{CollectionNames, MongoConfig, PolicyConfig, RepoServiceConfig};
pub use db::{DocumentStore, MemoryStore, MongoStore, StoreError};
pub use entity::{App, CollectionKind, Entity, Project, Readers, SshKey, User};
pub use groups::GroupRef;
pub use repo::{HttpRepoService, MemoryRepoService, RepoCall, RepoError, RepoService};
pub use service::PolicyService;
pub use store::{PolicyStore, Record, WriteOp, Written};
pub use types::{AppId, PolicyError, ProjectId, UserName};
