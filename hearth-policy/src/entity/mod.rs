//! Policy-governed entities and their content-derived labels.
//!
//! Labels are never stored. Every collection operation recomputes the label
//! of a document from its current content through [`Entity::label`].

pub mod app;
pub mod project;
pub mod user;

pub use app::{App, AppField};
pub use project::{Project, ProjectField, Readers, PUBLIC_READERS};
pub use user::{SshKey, User, UserField};

use hearth_label::{Label, Principal};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

use crate::config::CollectionNames;

/// Which policy-governed collection an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Users,
    Projects,
    Apps,
}

impl CollectionKind {
    /// The configured collection name.
    pub fn name(self, names: &CollectionNames) -> &str {
        match self {
            Self::Users => &names.users,
            Self::Projects => &names.projects,
            Self::Apps => &names.apps,
        }
    }
}

/// A document field an entity refers to by name.
pub trait FieldName: Copy + Debug + 'static {
    /// The stored field name.
    fn name(self) -> &'static str;
}

/// A document type governed by a label policy.
pub trait Entity: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Field names this entity protects from merges
    type Field: FieldName;

    /// Collection the entity lives in
    const KIND: CollectionKind;

    /// Fields a query may select on
    const SEARCHABLE: &'static [&'static str];

    /// Fields a partial update never changes
    const PROTECTED: &'static [Self::Field];

    /// The label of this document under the policy for its collection.
    fn label(&self, service: &Principal) -> Label;

    /// Whether queries may select on `field`.
    fn is_searchable(field: &str) -> bool {
        Self::SEARCHABLE.contains(&field)
    }

    /// Whether merges must leave `field` alone.
    fn is_protected(field: &str) -> bool {
        Self::PROTECTED.iter().any(|f| f.name() == field)
    }
}
