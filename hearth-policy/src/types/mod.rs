//! Shared types for the policy crate

pub mod error;

pub use error::PolicyError;

use bson::oid::ObjectId;

/// Name of a user; also the user's `_id` and principal.
pub type UserName = String;

/// Store-assigned project identifier.
pub type ProjectId = ObjectId;

/// Identifier of an app.
pub type AppId = String;

/// Principal of the built-in service identity unless configured otherwise.
pub const DEFAULT_SERVICE_PRINCIPAL: &str = "hearth";
