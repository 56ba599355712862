//! Document store abstraction
//!
//! The store only moves documents. Label policy lives one level up in
//! [`crate::store::PolicyStore`].

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use bson::{Bson, Document};

/// Error types for document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A document with the same `_id` already exists
    #[error("Duplicate key in {collection}: {id}")]
    Duplicate { collection: String, id: String },

    /// A save was attempted on a document without `_id`
    #[error("Document in {0} has no _id")]
    MissingId(String),

    /// The backend failed
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Raw access to named collections of BSON documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// First document whose `key` equals `value`, or whose array field `key`
    /// contains `value`.
    async fn find_by(&self, collection: &str, key: &str, value: &Bson) -> Result<Option<Document>, StoreError>;

    /// First document matching every field of `selector`.
    async fn find_where(&self, collection: &str, selector: &Document) -> Result<Option<Document>, StoreError>;

    /// Insert a new document, assigning an `ObjectId` when `_id` is absent.
    ///
    /// Returns the document's `_id`.
    async fn insert(&self, collection: &str, document: Document) -> Result<Bson, StoreError>;

    /// Replace the document with the same `_id`, inserting it if absent.
    async fn save(&self, collection: &str, document: Document) -> Result<(), StoreError>;
}
