//! Label components in conjunctive normal form.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::label::LabelError;
use crate::principal::{Clause, Principal};

/// Expansions of group principals, keyed by the group principal.
pub type GroupTable = BTreeMap<Principal, BTreeSet<Principal>>;

/// One half of a label: `Public`, or an AND of [`Clause`]s.
///
/// `Public` is the bottom element and the identity of [`Component::join`].
/// The clause form is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", try_from = "RawComponent")]
pub enum Component {
    /// No restriction.
    #[default]
    Public,
    /// Every clause must be satisfied.
    Clauses(BTreeSet<Clause>),
}

/// Wire form of [`Component`], checked on the way in.
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawComponent {
    Public,
    Clauses(BTreeSet<Clause>),
}

impl TryFrom<RawComponent> for Component {
    type Error = LabelError;

    fn try_from(raw: RawComponent) -> Result<Self, Self::Error> {
        match raw {
            RawComponent::Public => Ok(Self::Public),
            RawComponent::Clauses(clauses) => Self::new(clauses),
        }
    }
}

impl Component {
    /// Build a component from clauses. Fails on an empty set: an empty
    /// conjunction is not `Public` and is never a valid policy.
    pub fn new(clauses: impl IntoIterator<Item = Clause>) -> Result<Self, LabelError> {
        let set: BTreeSet<Clause> = clauses.into_iter().collect();
        if set.is_empty() {
            return Err(LabelError::EmptyComponent);
        }
        Ok(Self::Clauses(set))
    }

    /// A component made of a single clause.
    pub fn clause(clause: Clause) -> Self {
        Self::Clauses(BTreeSet::from([clause]))
    }

    /// A component requiring exactly one principal.
    pub fn principal(principal: impl Into<Principal>) -> Self {
        Self::clause(Clause::single(principal))
    }

    /// A component requiring every given principal, one singleton clause each.
    pub fn all_of<I, P>(principals: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Principal>,
    {
        Self::new(principals.into_iter().map(Clause::single))
    }

    /// Whether this is the unrestricted component.
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }

    /// Clauses of the component; empty for `Public`.
    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        let set = match self {
            Self::Public => None,
            Self::Clauses(set) => Some(set),
        };
        set.into_iter().flatten()
    }

    /// Every principal mentioned anywhere in the component.
    pub fn principals(&self) -> BTreeSet<&Principal> {
        self.clauses().flat_map(Clause::principals).collect()
    }

    /// Conjunction of two components. `Public` yields the other side;
    /// otherwise the clause sets are unioned.
    pub fn join(&self, other: &Component) -> Component {
        match (self, other) {
            (Self::Public, c) | (c, Self::Public) => c.clone(),
            (Self::Clauses(a), Self::Clauses(b)) => Self::Clauses(a.union(b).cloned().collect()),
        }
    }

    /// CNF implication: every clause of `other` is implied by some clause of
    /// `self`. Anything implies `Public`; `Public` implies only `Public`.
    pub fn implies(&self, other: &Component) -> bool {
        match (self, other) {
            (_, Self::Public) => true,
            (Self::Public, Self::Clauses(_)) => false,
            (Self::Clauses(ours), Self::Clauses(theirs)) => theirs
                .iter()
                .all(|needed| ours.iter().any(|have| have.implies(needed))),
        }
    }

    /// Drop every clause implied by `by`. Returns `Public` when nothing is
    /// left.
    pub(crate) fn reduce_by(&self, by: &Component) -> Component {
        match self {
            Self::Public => Self::Public,
            Self::Clauses(set) => {
                let rest: BTreeSet<Clause> = set
                    .iter()
                    .filter(|clause| !by.implies(&Component::clause((*clause).clone())))
                    .cloned()
                    .collect();
                if rest.is_empty() {
                    Self::Public
                } else {
                    Self::Clauses(rest)
                }
            }
        }
    }

    /// Extend every clause with the expansion of the group principals it
    /// names. Principals absent from `groups` are left alone.
    pub fn expand(&self, groups: &GroupTable) -> Component {
        match self {
            Self::Public => Self::Public,
            Self::Clauses(set) => Self::Clauses(
                set.iter()
                    .map(|clause| {
                        clause.extended(
                            clause
                                .principals()
                                .filter_map(|p| groups.get(p))
                                .flatten(),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

/// Whether the acting identities satisfy `component`: every clause contains
/// at least one of `active`.
pub fn satisfies(active: &BTreeSet<Principal>, component: &Component) -> bool {
    component.clauses().all(|clause| clause.satisfied_by(active))
}

impl From<Clause> for Component {
    fn from(clause: Clause) -> Self {
        Self::clause(clause)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("True"),
            Self::Clauses(set) => {
                for (i, clause) in set.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" /\\ ")?;
                    }
                    write!(f, "{clause}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(names: &[&str]) -> Clause {
        Clause::new(names.iter().copied()).unwrap()
    }

    fn samples() -> Vec<Component> {
        vec![
            Component::Public,
            Component::principal("alice"),
            Component::all_of(["alice", "hearth"]).unwrap(),
            Component::clause(c(&["alice", "bob", "hearth"])),
            Component::new([c(&["carol"]), c(&["dave", "erin"])]).unwrap(),
        ]
    }

    #[test]
    fn test_empty_component_rejected() {
        assert!(matches!(
            Component::new(Vec::new()),
            Err(LabelError::EmptyComponent)
        ));
    }

    #[test]
    fn test_join_public_identity() {
        for comp in samples() {
            assert_eq!(comp.join(&Component::Public), comp);
            assert_eq!(Component::Public.join(&comp), comp);
        }
    }

    #[test]
    fn test_join_commutative_and_idempotent() {
        let all = samples();
        for a in &all {
            assert_eq!(a.join(a), *a);
            for b in &all {
                assert_eq!(a.join(b), b.join(a));
            }
        }
    }

    #[test]
    fn test_join_deduplicates() {
        let a = Component::all_of(["alice", "hearth"]).unwrap();
        let b = Component::principal("hearth");
        let joined = a.join(&b);
        assert_eq!(joined.clauses().count(), 2);
    }

    #[test]
    fn test_implication() {
        let both = Component::all_of(["alice", "hearth"]).unwrap();
        let alice = Component::principal("alice");
        let either = Component::clause(c(&["alice", "hearth"]));

        assert!(both.implies(&alice));
        assert!(both.implies(&either));
        assert!(alice.implies(&either));
        assert!(!alice.implies(&both));
        assert!(!either.implies(&alice));
        assert!(alice.implies(&Component::Public));
        assert!(!Component::Public.implies(&alice));
    }

    #[test]
    fn test_satisfies() {
        let active = BTreeSet::from([Principal::new("alice")]);
        assert!(satisfies(&active, &Component::Public));
        assert!(satisfies(&active, &Component::clause(c(&["alice", "hearth"]))));
        assert!(!satisfies(&active, &Component::all_of(["alice", "hearth"]).unwrap()));
    }

    #[test]
    fn test_reduce_by_drops_implied_clauses() {
        let comp = Component::new([c(&["carol", "hearth"]), c(&["dave"])]).unwrap();
        let reduced = comp.reduce_by(&Component::principal("hearth"));
        assert_eq!(reduced, Component::principal("dave"));
        let gone = Component::clause(c(&["carol", "hearth"])).reduce_by(&Component::principal("hearth"));
        assert!(gone.is_public());
    }

    #[test]
    fn test_expand_adds_group_members() {
        let group = Principal::new("canwrite:p1");
        let groups = GroupTable::from([(
            group.clone(),
            BTreeSet::from([Principal::new("carol"), Principal::new("dave")]),
        )]);
        let comp = Component::principal(group);
        let expanded = comp.expand(&groups);
        let active = BTreeSet::from([Principal::new("dave")]);
        assert!(satisfies(&active, &expanded));
        assert!(!satisfies(&active, &comp));
    }

    #[test]
    fn test_deserialize_rejects_empty_conjunction() {
        let parsed: Result<Component, _> = serde_json::from_str(r#"{"clauses": []}"#);
        assert!(parsed.is_err());

        let public: Component = serde_json::from_str(r#""public""#).unwrap();
        assert!(public.is_public());
        let both = Component::all_of(["alice", "hearth"]).unwrap();
        let json = serde_json::to_string(&both).unwrap();
        assert_eq!(serde_json::from_str::<Component>(&json).unwrap(), both);
    }

    #[test]
    fn test_display() {
        let comp = Component::new([c(&["alice", "hearth"]), c(&["bob"])]).unwrap();
        assert_eq!(comp.to_string(), "[alice \\/ hearth] /\\ [bob]");
        assert_eq!(Component::Public.to_string(), "True");
    }
}
