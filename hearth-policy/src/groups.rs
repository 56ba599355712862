//! Group principals
//!
//! `canread:<project-id>` and `canwrite:<project-id>` stand for everyone who
//! may read or write a project. They are expanded against the stored project
//! at check time, so membership follows the project document.

use bson::{oid::ObjectId, Bson};
use hearth_label::{GroupTable, Label, Principal};
use std::collections::BTreeSet;
use tracing::debug;

use crate::entity::{Project, Readers};
use crate::store::PolicyStore;
use crate::types::ProjectId;

const CAN_READ: &str = "canread:";
const CAN_WRITE: &str = "canwrite:";

/// A principal classified by what it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    /// Readers of a project
    CanRead(ProjectId),
    /// Writers of a project
    CanWrite(ProjectId),
    /// Anything else, including group prefixes with a malformed id
    Plain(Principal),
}

impl GroupRef {
    pub fn parse(principal: &Principal) -> Self {
        let name = principal.as_str();
        let parsed = if let Some(id) = name.strip_prefix(CAN_READ) {
            ObjectId::parse_str(id).ok().map(Self::CanRead)
        } else if let Some(id) = name.strip_prefix(CAN_WRITE) {
            ObjectId::parse_str(id).ok().map(Self::CanWrite)
        } else {
            None
        };
        parsed.unwrap_or_else(|| Self::Plain(principal.clone()))
    }

    pub fn can_read(project: &ProjectId) -> Principal {
        Principal::new(format!("{CAN_READ}{}", project.to_hex()))
    }

    pub fn can_write(project: &ProjectId) -> Principal {
        Principal::new(format!("{CAN_WRITE}{}", project.to_hex()))
    }

    pub fn project(&self) -> Option<&ProjectId> {
        match self {
            Self::CanRead(id) | Self::CanWrite(id) => Some(id),
            Self::Plain(_) => None,
        }
    }
}

/// Members of `group` according to `project`.
///
/// Writers are the owner and collaborators. Readers add the reader list, but
/// only for a private project: a public project's read group is empty.
pub fn members(project: &Project, group: &GroupRef) -> BTreeSet<Principal> {
    let writers = project.writers().map(|name| Principal::new(name.as_str()));
    match group {
        GroupRef::CanWrite(_) => writers.collect(),
        GroupRef::CanRead(_) => match &project.readers {
            Readers::Public => BTreeSet::new(),
            Readers::List(readers) => writers
                .chain(readers.iter().map(|name| Principal::new(name.as_str())))
                .collect(),
        },
        GroupRef::Plain(principal) => BTreeSet::from([principal.clone()]),
    }
}

/// Expand one principal.
///
/// The project is read without tainting any request. A principal that is not
/// a group, or whose project cannot be loaded, expands to itself.
pub async fn expand(store: &PolicyStore, principal: &Principal) -> BTreeSet<Principal> {
    let group = GroupRef::parse(principal);
    let Some(id) = group.project() else {
        return BTreeSet::from([principal.clone()]);
    };

    match store.lookup::<Project>("_id", &Bson::ObjectId(*id)).await {
        Ok(Some(project)) => members(&project, &group),
        Ok(None) => {
            debug!(principal = %principal, "Group project not found");
            BTreeSet::from([principal.clone()])
        }
        Err(err) => {
            debug!(principal = %principal, error = %err, "Group lookup failed");
            BTreeSet::from([principal.clone()])
        }
    }
}

/// Expansions of every group principal named in `labels`.
pub async fn table(store: &PolicyStore, labels: &[&Label]) -> GroupTable {
    let groups: BTreeSet<Principal> = labels
        .iter()
        .copied()
        .flat_map(|label| label.secrecy.principals().into_iter().chain(label.integrity.principals()))
        .filter(|p| !matches!(GroupRef::parse(p), GroupRef::Plain(_)))
        .cloned()
        .collect();

    let mut table = GroupTable::new();
    for group in groups {
        let members = expand(store, &group).await;
        table.insert(group, members);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let id = ObjectId::new();
        assert_eq!(GroupRef::parse(&GroupRef::can_read(&id)), GroupRef::CanRead(id));
        assert_eq!(GroupRef::parse(&GroupRef::can_write(&id)), GroupRef::CanWrite(id));

        let bogus = Principal::new("canwrite:not-an-id");
        assert_eq!(GroupRef::parse(&bogus), GroupRef::Plain(bogus.clone()));
        let erin = Principal::new("erin");
        assert_eq!(GroupRef::parse(&erin), GroupRef::Plain(erin.clone()));
    }

    #[test]
    fn test_members() {
        let id = ObjectId::new();
        let mut project = Project::new("carol", "bar");
        project.collaborators = vec!["dave".into()];
        project.readers = Readers::List(vec!["erin".into()]);

        let writers = members(&project, &GroupRef::CanWrite(id));
        assert_eq!(writers, BTreeSet::from([Principal::new("carol"), Principal::new("dave")]));

        let readers = members(&project, &GroupRef::CanRead(id));
        assert_eq!(readers.len(), 3);

        project.readers = Readers::Public;
        assert!(members(&project, &GroupRef::CanRead(id)).is_empty());
    }
}
