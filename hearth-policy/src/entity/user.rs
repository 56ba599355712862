//! User documents

use bson::{oid::ObjectId, Binary};
use hearth_label::{Component, Label, Principal};
use serde::{Deserialize, Serialize};

use super::{CollectionKind, Entity, FieldName};
use crate::types::{ProjectId, UserName};

/// A registered user. Created lazily on first reference, never deleted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    /// User name; also the document key
    #[serde(rename = "_id")]
    pub name: UserName,

    /// SSH keys, newest first
    #[serde(default)]
    pub keys: Vec<SshKey>,

    /// Projects the user owns
    #[serde(default)]
    pub projects: Vec<ProjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravatar: Option<String>,
}

impl User {
    /// A fresh user with no keys or projects.
    pub fn new(name: impl Into<UserName>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            projects: Vec::new(),
            full_name: None,
            city: None,
            website: None,
            gravatar: None,
        }
    }

    pub fn key(&self, id: &ObjectId) -> Option<&SshKey> {
        self.keys.iter().find(|k| &k.id == id)
    }
}

/// A public SSH key registered by a user.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SshKey {
    /// Assigned when the key is added; never changes
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Raw key material
    pub value: Binary,
}

/// Protected user fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Id,
    Keys,
    Projects,
}

impl FieldName for UserField {
    fn name(self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::Keys => "keys",
            Self::Projects => "projects",
        }
    }
}

impl Entity for User {
    type Field = UserField;

    const KIND: CollectionKind = CollectionKind::Users;
    const SEARCHABLE: &'static [&'static str] = &["_id", "keys"];
    const PROTECTED: &'static [UserField] = &[UserField::Projects, UserField::Id, UserField::Keys];

    /// Readable and writable only by the user together with the service.
    fn label(&self, service: &Principal) -> Label {
        let both = Component::principal(self.name.as_str()).join(&Component::principal(service.clone()));
        Label::new(both.clone(), both)
    }
}
