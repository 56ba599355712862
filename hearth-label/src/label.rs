//! Labels, flow checks and labeled values.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::component::{Component, GroupTable};
use crate::privilege::Privilege;

/// Errors raised by the label algebra.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    /// A clause was built from no principals
    #[error("Clause must name at least one principal")]
    EmptyClause,

    /// A component was built from no clauses
    #[error("Component must contain at least one clause")]
    EmptyComponent,

    /// A privilege that does not stand for exactly one principal was asked
    /// for its owner
    #[error("Malformed privilege: {0}")]
    MalformedPrivilege(String),

    /// A label check failed
    #[error("Flow denied: {from} cannot flow to {to}")]
    FlowDenied {
        /// Label of the source
        from: Label,
        /// Label of the destination
        to: Label,
    },
}

/// A `(secrecy, integrity)` pair governing the flow of a piece of data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Label {
    /// Who may observe the data. Grows as data is combined.
    pub secrecy: Component,
    /// Who vouches for the data. Must be provable to act on it.
    pub integrity: Component,
}

impl Label {
    /// Create a label.
    pub fn new(secrecy: Component, integrity: Component) -> Self {
        Self { secrecy, integrity }
    }

    /// The bottom label: public secrecy, no integrity.
    pub fn public() -> Self {
        Self::default()
    }

    /// Whether data labeled `self` may flow to `target` under `privilege`.
    ///
    /// Holds iff `target.secrecy ∧ P ⇒ self.secrecy` and
    /// `self.integrity ∧ P ⇒ target.integrity`, where `P` is the privilege's
    /// component (`Public` when there is none).
    pub fn can_flow_to(&self, target: &Label, privilege: Option<&Privilege>) -> bool {
        match privilege {
            Some(privilege) => self.can_flow_to_with(target, privilege.component()),
            None => self.can_flow_to_with(target, &Component::Public),
        }
    }

    /// [`Label::can_flow_to`] with the granted principals given directly.
    pub fn can_flow_to_with(&self, target: &Label, granted: &Component) -> bool {
        target.secrecy.join(granted).implies(&self.secrecy)
            && self.integrity.join(granted).implies(&target.integrity)
    }

    /// Like [`Label::can_flow_to`], returning [`LabelError::FlowDenied`] on
    /// failure.
    pub fn check_flow(&self, target: &Label, privilege: Option<&Privilege>) -> Result<(), LabelError> {
        match privilege {
            Some(privilege) => self.check_flow_with(target, privilege.component()),
            None => self.check_flow_with(target, &Component::Public),
        }
    }

    /// [`Label::check_flow`] with the granted principals given directly.
    pub fn check_flow_with(&self, target: &Label, granted: &Component) -> Result<(), LabelError> {
        if self.can_flow_to_with(target, granted) {
            Ok(())
        } else {
            Err(LabelError::FlowDenied {
                from: self.clone(),
                to: target.clone(),
            })
        }
    }

    /// Lower secrecy and raise integrity as far as `privilege` allows.
    pub fn downgrade(&self, privilege: &Privilege) -> Label {
        Label {
            secrecy: self.secrecy.reduce_by(privilege.component()),
            integrity: self.integrity.join(privilege.component()),
        }
    }

    /// Least upper bound on secrecy: the secrecy of both, keeping our
    /// integrity.
    pub fn taint_with(&self, other: &Label) -> Label {
        Label {
            secrecy: self.secrecy.join(&other.secrecy),
            integrity: self.integrity.clone(),
        }
    }

    /// Expand group principals in both components.
    pub fn expand(&self, groups: &GroupTable) -> Label {
        Label {
            secrecy: self.secrecy.expand(groups),
            integrity: self.integrity.expand(groups),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} , {}>", self.secrecy, self.integrity)
    }
}

/// A value together with the label that governs it.
///
/// The value is only reachable through a [`crate::Context`], which taints
/// itself with the label, or through [`Labeled::label`] for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct Labeled<T> {
    label: Label,
    value: T,
}

impl<T> Labeled<T> {
    /// Pair a value with a label without any check. Callers outside the
    /// trusted core should use [`crate::Context::label_p`].
    pub fn new(label: Label, value: T) -> Self {
        Self { label, value }
    }

    /// The label.
    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Transform the value, keeping the label.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Labeled<U> {
        Labeled {
            label: self.label,
            value: f(self.value),
        }
    }

    pub(crate) fn into_parts(self) -> (Label, T) {
        (self.label, self.value)
    }

    pub(crate) fn value(&self) -> &T {
        &self.value
    }
}
