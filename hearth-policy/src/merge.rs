//! Partial updates and project construction.
//!
//! Proposed changes arrive as loose documents, typically decoded from a
//! form. Fields the entity protects are dropped, the rest override the
//! stored document, and the result is parsed back into the entity.
//! Control fields start with `_` and are never merged.

use bson::spec::BinarySubtype;
use bson::{oid::ObjectId, Binary, Bson, Document};
use tracing::debug;

use crate::entity::{Entity, Project, Readers, SshKey, User, PUBLIC_READERS};
use crate::types::{PolicyError, ProjectId};

/// Field naming the project to fork
pub const FORK_FIELD: &str = "_fork";

/// Field naming the key to delete
pub const DELETE_FIELD: &str = "_delete";

/// Field carrying the visibility flag of a project
pub const PUBLIC_FIELD: &str = "public";

/// Merge `proposed` over `stored`, keeping protected fields.
pub fn partial_update<E: Entity>(stored: &E, proposed: &Document) -> Result<E, PolicyError> {
    let merged = merge_document(stored, proposed)?;
    Ok(bson::from_document(merged)?)
}

/// [`partial_update`] for projects, also settling visibility and the
/// reader and collaborator lists.
pub fn partial_project_update(stored: &Project, proposed: &Document) -> Result<Project, PolicyError> {
    let mut merged = merge_document(stored, proposed)?;
    refine_project(&mut merged, stored.is_public());
    let project: Project = bson::from_document(merged)?;
    Ok(project)
}

fn merge_document<E: Entity>(stored: &E, proposed: &Document) -> Result<Document, PolicyError> {
    let mut merged = bson::to_document(stored)?;
    for (key, value) in proposed {
        if key.starts_with('_') || E::is_protected(key) {
            debug!(field = %key, "Skipping protected field");
            continue;
        }
        merged.insert(key.clone(), value.clone());
    }
    Ok(merged)
}

/// Read a boolean-like visibility token.
pub fn parse_visibility(value: &Bson) -> Option<bool> {
    match value {
        Bson::Boolean(b) => Some(*b),
        Bson::String(s) => match s.as_str() {
            "1" | "on" | "true" => Some(true),
            "0" | "off" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// Form encodings send a single value for one-element lists and an empty
// marker for none.
fn normalize_list(doc: &mut Document, key: &str) {
    let normalized = match doc.get(key) {
        Some(Bson::Null) => Bson::Array(Vec::new()),
        Some(Bson::String(s)) if s.is_empty() => Bson::Array(Vec::new()),
        Some(Bson::String(s)) => Bson::Array(vec![Bson::String(s.clone())]),
        Some(Bson::Array(items)) if items.len() == 1 && items[0].as_str() == Some("") => Bson::Array(Vec::new()),
        _ => return,
    };
    doc.insert(key, normalized);
}

// `public` decides visibility when it is a recognized token; otherwise
// `fallback` does.
fn refine_project(doc: &mut Document, fallback: bool) {
    let public = doc
        .remove(PUBLIC_FIELD)
        .as_ref()
        .and_then(parse_visibility)
        .unwrap_or(fallback);

    normalize_list(doc, "collaborators");
    if public {
        doc.insert("readers", PUBLIC_READERS);
        return;
    }
    match doc.get("readers") {
        None => {
            doc.insert("readers", Bson::Array(Vec::new()));
        }
        Some(Bson::String(s)) if s == PUBLIC_READERS => {
            doc.insert("readers", Bson::Array(Vec::new()));
        }
        Some(_) => normalize_list(doc, "readers"),
    }
}

fn parse_object_id(value: &Bson) -> Option<ObjectId> {
    match value {
        Bson::ObjectId(id) => Some(*id),
        Bson::String(s) => ObjectId::parse_str(s).ok(),
        _ => None,
    }
}

fn check_project_name(name: &str) -> Result<(), PolicyError> {
    if name.trim().is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(PolicyError::ValidationFailure(format!("invalid project name '{}'", name)));
    }
    Ok(())
}

/// A copy of `user` with a new key first in its key list.
///
/// The key material is taken from `value`, as text or binary. `title` is
/// optional.
pub fn add_key(user: &User, proposed: &Document) -> Result<User, PolicyError> {
    let value = match proposed.get("value") {
        Some(Bson::String(s)) if !s.trim().is_empty() => Binary {
            subtype: BinarySubtype::Generic,
            bytes: s.as_bytes().to_vec(),
        },
        Some(Bson::Binary(b)) if !b.bytes.is_empty() => b.clone(),
        Some(_) => {
            return Err(PolicyError::ValidationFailure(
                "key value must be non-empty text or binary".into(),
            ))
        }
        None => return Err(PolicyError::ValidationFailure("missing key value".into())),
    };
    let title = proposed
        .get_str("title")
        .ok()
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let key = SshKey {
        id: ObjectId::new(),
        title,
        value,
    };
    debug!(user = %user.name, key = %key.id, "Adding key");

    let mut updated = user.clone();
    updated.keys.insert(0, key);
    Ok(updated)
}

/// A copy of `user` without the key named by `_delete`.
///
/// Nothing changes when `_delete` is missing, unparsable or names no key.
pub fn delete_key(user: &User, proposed: &Document) -> User {
    let mut updated = user.clone();
    if let Some(id) = proposed.get(DELETE_FIELD).and_then(parse_object_id) {
        updated.keys.retain(|k| k.id != id);
    }
    updated
}

/// The project a proposal asks to fork, if any.
pub fn fork_source(proposed: &Document) -> Result<Option<ProjectId>, PolicyError> {
    match proposed.get(FORK_FIELD) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::String(s)) if s.is_empty() => Ok(None),
        Some(value) => parse_object_id(value)
            .map(Some)
            .ok_or_else(|| PolicyError::ValidationFailure(format!("invalid fork source {}", value))),
    }
}

/// A fork of `source` owned by `requester`.
///
/// Everything is copied from the source except the id, owner and access
/// lists; `name` and `description` may be overridden by the proposal.
pub fn fork_project(source: &Project, requester: &str, proposed: &Document) -> Result<Project, PolicyError> {
    let source_id = source
        .id
        .ok_or_else(|| PolicyError::ValidationFailure("fork source has no id".into()))?;

    let mut fork = source.clone();
    fork.id = None;
    fork.owner = requester.to_string();
    fork.collaborators = Vec::new();
    fork.readers = Readers::List(Vec::new());
    fork.forked_from = Some(source_id);

    if let Ok(name) = proposed.get_str("name") {
        if !name.is_empty() {
            fork.name = name.to_string();
        }
    }
    if let Ok(description) = proposed.get_str("description") {
        fork.description = Some(description.to_string());
    }
    check_project_name(&fork.name)?;
    Ok(fork)
}

/// A new project owned by `owner` from a proposal.
///
/// Private unless `public` is a recognized true token.
pub fn new_project(owner: &str, proposed: &Document) -> Result<Project, PolicyError> {
    let mut doc = Document::new();
    for (key, value) in proposed {
        if key.starts_with('_') || key == "owner" || key == "forked_from" {
            continue;
        }
        doc.insert(key.clone(), value.clone());
    }
    doc.insert("owner", owner);
    refine_project(&mut doc, false);

    let project: Project = bson::from_document(doc)?;
    check_project_name(&project.name)?;
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn stored_project() -> Project {
        let mut project = Project::new("carol", "bar");
        project.id = Some(ObjectId::new());
        project.description = Some("tools".into());
        project.collaborators = vec!["dave".into()];
        project.readers = Readers::List(vec!["erin".into()]);
        project.apps = vec!["blog".into()];
        project
    }

    #[test]
    fn test_visibility_tokens() {
        for yes in [Bson::Boolean(true), "1".into(), "on".into(), "true".into()] {
            assert_eq!(parse_visibility(&yes), Some(true));
        }
        for no in [Bson::Boolean(false), "0".into(), "off".into(), "false".into()] {
            assert_eq!(parse_visibility(&no), Some(false));
        }
        assert_eq!(parse_visibility(&"yes".into()), None);
        assert_eq!(parse_visibility(&Bson::Int32(1)), None);
    }

    #[test]
    fn test_user_update_keeps_protected_fields() {
        let mut stored = User::new("alice");
        stored.projects = vec![ObjectId::new()];
        let proposed = doc! {
            "_id": "mallory",
            "projects": [],
            "keys": [],
            "city": "Porto",
        };
        let updated = partial_update(&stored, &proposed).unwrap();
        assert_eq!(updated.name, "alice");
        assert_eq!(updated.projects, stored.projects);
        assert_eq!(updated.city.as_deref(), Some("Porto"));
    }

    #[test]
    fn test_update_rejects_wrongly_typed_field() {
        let err = partial_update(&User::new("alice"), &doc! { "city": 5 }).unwrap_err();
        assert!(matches!(err, PolicyError::ValidationFailure(_)));
    }

    #[test]
    fn test_project_update_never_touches_identity() {
        let stored = stored_project();
        let proposed = doc! {
            "_id": ObjectId::new(),
            "name": "renamed",
            "owner": "mallory",
            "description": "new",
        };
        let updated = partial_project_update(&stored, &proposed).unwrap();
        assert_eq!(updated.id, stored.id);
        assert_eq!(updated.name, stored.name);
        assert_eq!(updated.owner, stored.owner);
        assert_eq!(updated.description.as_deref(), Some("new"));
        assert_eq!(updated.readers, stored.readers);
    }

    #[test]
    fn test_project_visibility_changes() {
        let stored = stored_project();
        let public = partial_project_update(&stored, &doc! { "public": "on" }).unwrap();
        assert!(public.is_public());

        let private = partial_project_update(&public, &doc! { "public": false }).unwrap();
        assert_eq!(private.readers, Readers::List(vec![]));

        let unchanged = partial_project_update(&public, &doc! { "public": "maybe" }).unwrap();
        assert!(unchanged.is_public());
    }

    #[test]
    fn test_empty_markers_normalize() {
        let stored = stored_project();
        let updated = partial_project_update(&stored, &doc! { "collaborators": [""], "readers": "" }).unwrap();
        assert!(updated.collaborators.is_empty());
        assert_eq!(updated.readers, Readers::List(vec![]));

        let single = partial_project_update(&stored, &doc! { "collaborators": "frank" }).unwrap();
        assert_eq!(single.collaborators, vec!["frank".to_string()]);
    }

    #[test]
    fn test_add_key_prepends() {
        let mut user = User::new("alice");
        user = add_key(&user, &doc! { "value": "ssh-ed25519 AAAA first" }).unwrap();
        let updated = add_key(&user, &doc! { "value": "ssh-ed25519 AAAA second", "title": "laptop" }).unwrap();

        assert_eq!(updated.keys.len(), user.keys.len() + 1);
        assert_eq!(updated.keys[0].title.as_deref(), Some("laptop"));
        assert_eq!(updated.keys[0].value.bytes, b"ssh-ed25519 AAAA second".to_vec());
        assert_ne!(updated.keys[0].id, updated.keys[1].id);
    }

    #[test]
    fn test_add_key_requires_payload() {
        let user = User::new("alice");
        assert!(matches!(add_key(&user, &doc! {}), Err(PolicyError::ValidationFailure(_))));
        assert!(matches!(
            add_key(&user, &doc! { "value": "  " }),
            Err(PolicyError::ValidationFailure(_))
        ));
    }

    #[test]
    fn test_delete_key() {
        let user = add_key(&User::new("alice"), &doc! { "value": "k1" }).unwrap();
        let user = add_key(&user, &doc! { "value": "k2" }).unwrap();
        let target = user.keys[1].id;

        let removed = delete_key(&user, &doc! { "_delete": target.to_hex() });
        assert_eq!(removed.keys.len(), 1);
        assert!(removed.key(&target).is_none());

        let absent = delete_key(&user, &doc! { "_delete": ObjectId::new() });
        assert_eq!(absent.keys, user.keys);

        let garbage = delete_key(&user, &doc! { "_delete": "zzz" });
        assert_eq!(garbage.keys, user.keys);
        assert_eq!(delete_key(&user, &doc! {}).keys, user.keys);
    }

    #[test]
    fn test_fork_project() {
        let source = stored_project();
        let fork = fork_project(&source, "alice", &doc! { "name": "foo2", "owner": "mallory" }).unwrap();
        assert!(fork.id.is_none());
        assert_eq!(fork.owner, "alice");
        assert_eq!(fork.name, "foo2");
        assert!(fork.collaborators.is_empty());
        assert_eq!(fork.readers, Readers::List(vec![]));
        assert_eq!(fork.forked_from, source.id);
        assert_eq!(fork.description, source.description);
        assert_eq!(fork.apps, source.apps);
    }

    #[test]
    fn test_fork_source_parsing() {
        let id = ObjectId::new();
        assert_eq!(fork_source(&doc! { "_fork": id.to_hex() }).unwrap(), Some(id));
        assert_eq!(fork_source(&doc! { "_fork": "" }).unwrap(), None);
        assert_eq!(fork_source(&doc! {}).unwrap(), None);
        assert!(fork_source(&doc! { "_fork": "nope" }).is_err());
    }

    #[test]
    fn test_new_project() {
        let project = new_project(
            "alice",
            &doc! {
                "_id": ObjectId::new(),
                "name": "foo",
                "owner": "mallory",
                "public": false,
                "forked_from": ObjectId::new(),
                "collaborators": [""],
            },
        )
        .unwrap();
        assert!(project.id.is_none());
        assert_eq!(project.owner, "alice");
        assert_eq!(project.readers, Readers::List(vec![]));
        assert!(project.collaborators.is_empty());
        assert!(project.forked_from.is_none());

        let unclear = new_project("alice", &doc! { "name": "bar", "public": "sure" }).unwrap();
        assert!(!unclear.is_public());
        let open = new_project("alice", &doc! { "name": "baz", "public": "1" }).unwrap();
        assert!(open.is_public());
    }

    #[test]
    fn test_new_project_validates_name() {
        assert!(new_project("alice", &doc! {}).is_err());
        assert!(new_project("alice", &doc! { "name": "a/b" }).is_err());
        assert!(new_project("alice", &doc! { "name": ".." }).is_err());
    }
}
