//! In-process document store

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{DocumentStore, StoreError};

/// Document store kept in memory.
///
/// Used for tests and embedded deployments. Collections are created on first
/// write.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, Vec::len)
    }

    /// Every document in `collection`, in insertion order.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        let collections = self.collections.read().await;
        collections.get(collection).cloned().unwrap_or_default()
    }
}

fn field_matches(document: &Document, key: &str, value: &Bson) -> bool {
    match document.get(key) {
        Some(found) => found == value || matches!(found, Bson::Array(items) if items.contains(value)),
        None => false,
    }
}

fn selector_matches(document: &Document, selector: &Document) -> bool {
    selector.iter().all(|(key, value)| field_matches(document, key, value))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_by(&self, collection: &str, key: &str, value: &Bson) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| field_matches(d, key, value)))
            .cloned())
    }

    async fn find_where(&self, collection: &str, selector: &Document) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| selector_matches(d, selector)))
            .cloned())
    }

    async fn insert(&self, collection: &str, mut document: Document) -> Result<Bson, StoreError> {
        let id = match document.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert("_id", id.clone());
                id
            }
        };

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.get("_id") == Some(&id)) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        docs.push(document);
        debug!(collection = %collection, id = %id, "Inserted document");
        Ok(id)
    }

    async fn save(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let id = document
            .get("_id")
            .cloned()
            .ok_or_else(|| StoreError::MissingId(collection.to_string()))?;

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.get("_id") == Some(&id)) {
            Some(existing) => *existing = document,
            None => docs.push(document),
        }
        debug!(collection = %collection, id = %id, "Saved document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn test_insert_assigns_object_id() {
        let store = MemoryStore::new();
        let id = store.insert("projects", doc! { "name": "foo" }).await.unwrap();
        assert!(id.as_object_id().is_some());

        let found = store.find_by("projects", "_id", &id).await.unwrap().unwrap();
        assert_eq!(found.get_str("name").unwrap(), "foo");
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryStore::new();
        store.insert("users", doc! { "_id": "alice" }).await.unwrap();
        let err = store.insert("users", doc! { "_id": "alice" }).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(store.count("users").await, 1);
    }

    #[tokio::test]
    async fn test_save_upserts() {
        let store = MemoryStore::new();
        store.save("users", doc! { "_id": "alice", "city": "Porto" }).await.unwrap();
        store.save("users", doc! { "_id": "alice", "city": "Braga" }).await.unwrap();
        assert_eq!(store.count("users").await, 1);

        let alice = store.find_by("users", "_id", &Bson::from("alice")).await.unwrap().unwrap();
        assert_eq!(alice.get_str("city").unwrap(), "Braga");
    }

    #[tokio::test]
    async fn test_save_without_id_fails() {
        let store = MemoryStore::new();
        let err = store.save("users", doc! { "city": "Porto" }).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingId(_)));
    }

    #[tokio::test]
    async fn test_find_where_matches_all_fields_and_arrays() {
        let store = MemoryStore::new();
        store
            .insert("projects", doc! { "name": "foo", "owner": "alice", "apps": ["blog"] })
            .await
            .unwrap();
        store
            .insert("projects", doc! { "name": "foo", "owner": "bob" })
            .await
            .unwrap();

        let found = store
            .find_where("projects", &doc! { "owner": "bob", "name": "foo" })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get_str("owner").unwrap(), "bob");

        let by_app = store.find_by("projects", "apps", &Bson::from("blog")).await.unwrap();
        assert!(by_app.is_some());
        assert!(store.find_where("nothing", &doc! {}).await.unwrap().is_none());
    }

    #[test]
    fn test_store_is_usable_outside_runtime_helpers() {
        let store = MemoryStore::new();
        let count = tokio_test::block_on(async {
            store.insert("apps", doc! { "_id": "blog" }).await.unwrap();
            store.count("apps").await
        });
        assert_eq!(count, 1);
    }
}
