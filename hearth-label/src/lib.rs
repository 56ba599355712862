//! Hearth Labels - information-flow labels for the policy core
//!
//! Implements disjunction-category labels over opaque principals:
//!
//! - **Principal / Clause**: identity atoms and OR-sets of them
//! - **Component**: `Public`, or an AND of clauses
//! - **Label**: a `(secrecy, integrity)` pair with a flow order
//! - **Privilege**: unforgeable authority to speak for principals
//! - **Context**: the floating label of one request's computation
//!
//! # Flow
//!
//! ```text
//!   l1 ⊑_P l2  iff  secrecy(l2) ∧ P ⇒ secrecy(l1)
//!              and  integrity(l1) ∧ P ⇒ integrity(l2)
//! ```
//!
//! # Example
//!
//! ```
//! use hearth_label::{Component, Context, Label, Privilege};
//!
//! let service = Privilege::mint("hearth");
//! let record = Label::new(
//!     Component::all_of(["alice", "hearth"]).unwrap(),
//!     Component::all_of(["alice", "hearth"]).unwrap(),
//! );
//!
//! let ctx = Context::new("alice");
//! assert!(ctx.guard_write(&record, None).is_err());
//! assert!(ctx.guard_write(&record, Some(&service)).is_ok());
//! ```

pub mod component;
pub mod context;
pub mod label;
pub mod principal;
pub mod privilege;

// Re-export main types
pub use component::{satisfies, Component, GroupTable};
pub use context::{Context, ScopedLabel};
pub use label::{Label, LabelError, Labeled};
pub use principal::{Clause, Principal};
pub use privilege::{Privilege, PrivilegeId};
