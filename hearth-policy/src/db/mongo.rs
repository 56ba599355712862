//! MongoDB document store

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::{Client, Collection, Database};
use tracing::{debug, info};

use super::{DocumentStore, StoreError};

const DUPLICATE_KEY: i32 = 11000;

/// Document store backed by a MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Connect and verify the connection with a ping.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        info!("Connecting to MongoDB at {}", uri);

        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Backend(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            database: client.database(db_name),
        })
    }

    /// Wrap an already-open database handle.
    pub fn from_database(database: Database) -> Self {
        Self { database }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

fn backend(op: &str, err: MongoError) -> StoreError {
    StoreError::Backend(format!("{} failed: {}", op, err))
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_by(&self, collection: &str, key: &str, value: &Bson) -> Result<Option<Document>, StoreError> {
        let mut filter = Document::new();
        filter.insert(key, value.clone());
        debug!(collection = %collection, key = %key, "Finding document");
        self.collection(collection)
            .find_one(filter)
            .await
            .map_err(|e| backend("Find", e))
    }

    async fn find_where(&self, collection: &str, selector: &Document) -> Result<Option<Document>, StoreError> {
        self.collection(collection)
            .find_one(selector.clone())
            .await
            .map_err(|e| backend("Find", e))
    }

    async fn insert(&self, collection: &str, mut document: Document) -> Result<Bson, StoreError> {
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let id = document
            .get("_id")
            .cloned()
            .ok_or_else(|| StoreError::MissingId(collection.to_string()))?;

        self.collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::Duplicate {
                        collection: collection.to_string(),
                        id: id.to_string(),
                    }
                } else {
                    backend("Insert", e)
                }
            })?;

        Ok(id)
    }

    async fn save(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let id = document
            .get("_id")
            .cloned()
            .ok_or_else(|| StoreError::MissingId(collection.to_string()))?;

        self.collection(collection)
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
            .await
            .map_err(|e| backend("Save", e))?;

        Ok(())
    }
}
