//! Per-request computation context with a floating label.
//!
//! A [`Context`] carries the acting principal and the current label of the
//! computation. Observing labeled data raises the current secrecy; writing
//! requires the current label to flow to the destination. Integrity only
//! changes through explicit, privileged endorsement.

use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};
use tracing::debug;

use crate::component::{satisfies, Component};
use crate::label::{Label, LabelError, Labeled};
use crate::principal::Principal;
use crate::privilege::Privilege;

/// The state of one request's computation.
#[derive(Debug, Clone)]
pub struct Context {
    actor: Principal,
    label: Label,
}

impl Context {
    /// Start a computation on behalf of `actor`. The request is public and
    /// speaks for its actor.
    pub fn new(actor: impl Into<Principal>) -> Self {
        let actor = actor.into();
        let label = Label::new(Component::Public, Component::principal(actor.clone()));
        Self { actor, label }
    }

    /// The acting principal.
    pub fn actor(&self) -> &Principal {
        &self.actor
    }

    /// The current label.
    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Whether the actor alone satisfies `component`.
    pub fn actor_satisfies(&self, component: &Component) -> bool {
        satisfies(&BTreeSet::from([self.actor.clone()]), component)
    }

    /// What this computation may speak for: its actor, plus `privilege`.
    pub fn granted(&self, privilege: Option<&Privilege>) -> Component {
        let actor = Component::principal(self.actor.clone());
        match privilege {
            Some(privilege) => actor.join(privilege.component()),
            None => actor,
        }
    }

    /// Fail unless `from` may be relabeled to `to` by this computation
    /// holding `privilege`.
    pub fn check_relabel(&self, from: &Label, to: &Label, privilege: Option<&Privilege>) -> Result<(), LabelError> {
        from.check_flow_with(to, &self.granted(privilege))
    }

    /// Raise the current secrecy to cover data labeled `label`.
    pub fn taint(&mut self, label: &Label) {
        self.label = self.label.taint_with(label);
    }

    /// Raise the current secrecy by what `privilege` cannot declassify.
    pub fn taint_p(&mut self, privilege: &Privilege, label: &Label) {
        let lowered = label.downgrade(privilege);
        self.taint(&lowered);
    }

    /// Observe a labeled value.
    pub fn unlabel<T>(&mut self, labeled: Labeled<T>) -> T {
        let (label, value) = labeled.into_parts();
        self.taint(&label);
        value
    }

    /// Observe a labeled value without consuming it.
    pub fn unlabel_ref<'a, T>(&mut self, labeled: &'a Labeled<T>) -> &'a T {
        self.taint(labeled.label());
        labeled.value()
    }

    /// Label a value. The current label must flow to `label` under
    /// `privilege`.
    pub fn label_p<T>(&self, privilege: &Privilege, label: Label, value: T) -> Result<Labeled<T>, LabelError> {
        self.check_relabel(&self.label, &label, Some(privilege))?;
        Ok(Labeled::new(label, value))
    }

    /// Label a value as the output of trusted code: current secrecy,
    /// integrity raised by `privilege`.
    pub fn endorse<T>(&self, privilege: &Privilege, value: T) -> Labeled<T> {
        let label = Label::new(
            self.label.secrecy.clone(),
            self.label.integrity.join(privilege.component()),
        );
        Labeled::new(label, value)
    }

    /// Fail unless the current label may flow to `target`.
    pub fn guard_write(&self, target: &Label, privilege: Option<&Privilege>) -> Result<(), LabelError> {
        self.check_relabel(&self.label, target, privilege)
    }

    /// Move to `label` for the lifetime of the returned guard.
    ///
    /// The current label must flow to `label` under `privilege` and the
    /// actor's own authority. The original label is put back when the guard
    /// is dropped, whichever way the scope is left.
    pub fn downgrade_scoped(&mut self, privilege: &Privilege, label: Label) -> Result<ScopedLabel<'_>, LabelError> {
        self.check_relabel(&self.label, &label, Some(privilege))?;
        let saved = std::mem::replace(&mut self.label, label);
        debug!(actor = %self.actor, from = %saved, to = %self.label, "Entering scoped label");
        Ok(ScopedLabel {
            ctx: self,
            saved: Some(saved),
        })
    }
}

/// Guard returned by [`Context::downgrade_scoped`].
///
/// Dereferences to the context so operations can run under the scoped label.
#[derive(Debug)]
pub struct ScopedLabel<'a> {
    ctx: &'a mut Context,
    saved: Option<Label>,
}

impl Deref for ScopedLabel<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        &*self.ctx
    }
}

impl DerefMut for ScopedLabel<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        &mut *self.ctx
    }
}

impl Drop for ScopedLabel<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            debug!(actor = %self.ctx.actor, to = %saved, "Restoring label");
            self.ctx.label = saved;
        }
    }
}
