//! Principals and clauses.
//!
//! A [`Principal`] is an opaque identity atom. A [`Clause`] is a non-empty
//! disjunction of principals: any one of them is enough to satisfy it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::label::LabelError;

/// An identity atom a label clause can refer to.
///
/// User names, the service identity and synthetic group references
/// (`canread:<id>`, `canwrite:<id>`) are all principals; the label algebra
/// treats them uniformly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Create a principal from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The principal's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Principal {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A non-empty OR of principals.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "BTreeSet<Principal>", into = "BTreeSet<Principal>")]
pub struct Clause(BTreeSet<Principal>);

impl Clause {
    /// Build a clause from principals. Fails if there are none.
    pub fn new<I, P>(principals: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Principal>,
    {
        let set: BTreeSet<Principal> = principals.into_iter().map(Into::into).collect();
        if set.is_empty() {
            return Err(LabelError::EmptyClause);
        }
        Ok(Self(set))
    }

    /// A clause naming exactly one principal.
    pub fn single(principal: impl Into<Principal>) -> Self {
        Self(BTreeSet::from([principal.into()]))
    }

    /// The clause widened by more alternatives.
    pub fn or<I, P>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Principal>,
    {
        self.0.extend(principals.into_iter().map(Into::into));
        self
    }

    /// Principals in the clause, in canonical order.
    pub fn principals(&self) -> impl Iterator<Item = &Principal> {
        self.0.iter()
    }

    /// Whether the clause names `principal`.
    pub fn contains(&self, principal: &Principal) -> bool {
        self.0.contains(principal)
    }

    /// Number of principals in the clause (always at least one).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; clauses are never empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The principal of a singleton clause.
    pub fn as_single(&self) -> Option<&Principal> {
        if self.0.len() == 1 {
            self.0.iter().next()
        } else {
            None
        }
    }

    /// `self` implies `other` when every way of satisfying `self` also
    /// satisfies `other`, i.e. `self ⊆ other`.
    pub fn implies(&self, other: &Clause) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Whether any of `active` appears in the clause.
    pub fn satisfied_by(&self, active: &BTreeSet<Principal>) -> bool {
        self.0.iter().any(|p| active.contains(p))
    }

    /// A copy of the clause extended with `extra` principals.
    pub(crate) fn extended<'a>(&self, extra: impl IntoIterator<Item = &'a Principal>) -> Self {
        let mut set = self.0.clone();
        set.extend(extra.into_iter().cloned());
        Self(set)
    }
}

impl TryFrom<BTreeSet<Principal>> for Clause {
    type Error = LabelError;

    fn try_from(set: BTreeSet<Principal>) -> Result<Self, Self::Error> {
        Clause::new(set)
    }
}

impl From<Clause> for BTreeSet<Principal> {
    fn from(clause: Clause) -> Self {
        clause.0
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" \\/ ")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str("]")
    }
}
