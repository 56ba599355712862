//! App documents

use hearth_label::{Component, Label, Principal};
use serde::{Deserialize, Serialize};

use super::{CollectionKind, Entity, FieldName};
use crate::types::{AppId, UserName};

/// An application registered against the service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct App {
    #[serde(rename = "_id")]
    pub id: AppId,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub owner: UserName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppField {
    Id,
    Owner,
}

impl FieldName for AppField {
    fn name(self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::Owner => "owner",
        }
    }
}

impl Entity for App {
    type Field = AppField;

    const KIND: CollectionKind = CollectionKind::Apps;
    const SEARCHABLE: &'static [&'static str] = &["_id", "name", "title", "description", "owner"];
    const PROTECTED: &'static [AppField] = &[AppField::Id, AppField::Owner];

    /// Anyone may read an app; only its owner with the service may write it.
    fn label(&self, service: &Principal) -> Label {
        let integrity = Component::principal(service.clone()).join(&Component::principal(self.owner.as_str()));
        Label::new(Component::Public, integrity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_label() {
        let app = App {
            id: "blog".into(),
            name: "blog".into(),
            title: "Blog".into(),
            description: String::new(),
            owner: "erin".into(),
        };
        let label = app.label(&Principal::new("hearth"));
        assert!(label.secrecy.is_public());
        assert_eq!(label.integrity, Component::all_of(["erin", "hearth"]).unwrap());
        assert!(App::is_searchable("description"));
    }
}
