//! Project documents
//!
//! A project is public when its `readers` field holds the marker string
//! `"public"`, and private when it holds a list of reader names.

use hearth_label::{Clause, Component, Label, Principal};
use serde::de::{self, Deserializer, Unexpected};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use super::{CollectionKind, Entity, FieldName};
use crate::types::{AppId, ProjectId, UserName};

/// Stored value of `readers` for a public project
pub const PUBLIC_READERS: &str = "public";

/// Who may read a project besides its owner and collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readers {
    Public,
    List(Vec<UserName>),
}

impl Readers {
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }
}

impl Default for Readers {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl Serialize for Readers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Public => serializer.serialize_str(PUBLIC_READERS),
            Self::List(names) => names.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Readers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Marker(String),
            List(Vec<UserName>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Marker(s) if s == PUBLIC_READERS => Ok(Self::Public),
            Raw::Marker(other) => Err(de::Error::invalid_value(
                Unexpected::Str(&other),
                &"\"public\" or a list of reader names",
            )),
            Raw::List(names) => Ok(Self::List(names)),
        }
    }
}

/// A hosted project.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Project {
    /// Assigned on insert
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProjectId>,

    pub name: String,

    pub owner: UserName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub collaborators: Vec<UserName>,

    #[serde(default)]
    pub readers: Readers,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_from: Option<ProjectId>,

    #[serde(default)]
    pub apps: Vec<AppId>,
}

impl Project {
    /// A private project with no collaborators.
    pub fn new(owner: impl Into<UserName>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            owner: owner.into(),
            description: None,
            collaborators: Vec::new(),
            readers: Readers::default(),
            forked_from: None,
            apps: Vec::new(),
        }
    }

    pub fn is_public(&self) -> bool {
        self.readers.is_public()
    }

    /// Owner and collaborators: everyone who may write the project.
    pub fn writers(&self) -> impl Iterator<Item = &UserName> {
        std::iter::once(&self.owner).chain(self.collaborators.iter())
    }
}

/// Protected project fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectField {
    Id,
    Name,
    Owner,
}

impl FieldName for ProjectField {
    fn name(self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::Name => "name",
            Self::Owner => "owner",
        }
    }
}

impl Entity for Project {
    type Field = ProjectField;

    const KIND: CollectionKind = CollectionKind::Projects;
    const SEARCHABLE: &'static [&'static str] = &["_id", "name", "owner"];
    const PROTECTED: &'static [ProjectField] = &[ProjectField::Id, ProjectField::Name, ProjectField::Owner];

    fn label(&self, service: &Principal) -> Label {
        let integrity = Component::principal(self.owner.as_str()).join(&Component::principal(service.clone()));
        let secrecy = match &self.readers {
            Readers::Public => Component::Public,
            Readers::List(readers) => Component::clause(
                Clause::single(self.owner.as_str())
                    .or([service.clone()])
                    .or(readers.iter().map(String::as_str))
                    .or(self.collaborators.iter().map(String::as_str)),
            ),
        };
        Label::new(secrecy, integrity)
    }
}
