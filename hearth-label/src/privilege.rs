//! Privileges: unforgeable evidence of authority to act for principals.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::component::Component;
use crate::label::LabelError;
use crate::principal::Principal;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one minted privilege. Two mints for the same principal never
/// share an id, so a holder can tell its own privilege from a look-alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrivilegeId(u64);

impl fmt::Display for PrivilegeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Authority to speak for the principals of a component.
///
/// A privilege is not `Clone`, `Copy` or serializable. It is minted by the
/// trusted core and lent by reference; it must never be stored in an entity
/// or handed across an untrusted boundary. Components that accept a
/// privilege bind to its [`PrivilegeId`] and refuse any other.
pub struct Privilege {
    component: Component,
    id: PrivilegeId,
}

impl Privilege {
    /// Mint a privilege for a single principal.
    pub fn mint(principal: impl Into<Principal>) -> Self {
        Self::mint_component(Component::principal(principal))
    }

    /// Mint a privilege for an arbitrary component.
    pub fn mint_component(component: Component) -> Self {
        Self {
            component,
            id: PrivilegeId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }

    /// This mint's identity.
    pub fn id(&self) -> PrivilegeId {
        self.id
    }

    /// The principals this privilege speaks for, as a component.
    pub fn component(&self) -> &Component {
        &self.component
    }

    /// The single principal this privilege stands for.
    ///
    /// Fails unless the privilege is exactly one singleton clause; a
    /// conjunction or disjunction of principals has no single owner.
    pub fn owner(&self) -> Result<&Principal, LabelError> {
        let mut clauses = self.component.clauses();
        match (clauses.next(), clauses.next()) {
            (Some(clause), None) => clause.as_single().ok_or_else(|| {
                LabelError::MalformedPrivilege(format!("disjunctive privilege {}", self.component))
            }),
            (None, _) => Err(LabelError::MalformedPrivilege(
                "privilege speaks for no principal".to_string(),
            )),
            (Some(_), Some(_)) => Err(LabelError::MalformedPrivilege(format!(
                "compound privilege {}",
                self.component
            ))),
        }
    }
}

impl fmt::Debug for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Privilege")
            .field("component", &self.component.to_string())
            .field("id", &self.id)
            .finish()
    }
}
