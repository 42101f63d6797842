use std::fmt;

use mongodb::bson::{doc, Document};
use mongodb::error::ErrorKind;
use mongodb::{options::ClientOptions, Client, Database};
use serde_json::Value;

use crate::models::{Tag, UserProfile};

pub struct MongoDB {
    pub client: Client,
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Self {
        let client_options = ClientOptions::parse(uri)
            .await
            .expect("Failed to parse MongoDB connection string");
        let client = Client::with_options(client_options).expect("Failed to initialize client");
        let db = client.database(db_name);
        MongoDB { client, db }
    }

    /// Round-trip to the server; the network monitor uses this to detect
    /// online/offline transitions.
    pub async fn ping(&self) -> bool {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .is_ok()
    }
}

/// Errors from a write failing with a transport-level cause are queued for
/// replay instead of surfacing as 500s.
pub fn is_connectivity_error(err: &mongodb::error::Error) -> bool {
    matches!(
        &*err.kind,
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. }
    )
}

#[derive(Debug, Clone)]
pub struct StoreError(pub String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError(err.to_string())
    }
}

/// The write surface the offline sync queue replays against. Kept as a trait
/// so queue behavior is testable without a live server.
pub trait DocumentWriter {
    async fn insert(&self, collection: &str, data: &Value) -> Result<(), StoreError>;
    async fn update(&self, collection: &str, id: &str, data: &Value) -> Result<(), StoreError>;
    async fn remove(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// The read surface the assignee directory resolves through. Like
/// [`DocumentWriter`], a trait so the dual-path resolution order is testable
/// against an in-memory source.
pub trait DirectoryReader {
    async fn tag_by_name(&self, name: &str) -> Result<Option<Tag>, StoreError>;
    async fn tag_by_id(&self, id: &str) -> Result<Option<Tag>, StoreError>;
    async fn profile_by_id(&self, uid: &str) -> Result<Option<UserProfile>, StoreError>;
}

impl DirectoryReader for MongoDB {
    async fn tag_by_name(&self, name: &str) -> Result<Option<Tag>, StoreError> {
        Ok(self
            .db
            .collection::<Tag>("tags")
            .find_one(doc! { "name": name })
            .await?)
    }

    async fn tag_by_id(&self, id: &str) -> Result<Option<Tag>, StoreError> {
        Ok(self
            .db
            .collection::<Tag>("tags")
            .find_one(doc! { "_id": id })
            .await?)
    }

    async fn profile_by_id(&self, uid: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self
            .db
            .collection::<UserProfile>("users")
            .find_one(doc! { "_id": uid })
            .await?)
    }
}

impl DocumentWriter for MongoDB {
    async fn insert(&self, collection: &str, data: &Value) -> Result<(), StoreError> {
        let document =
            mongodb::bson::to_document(data).map_err(|e| StoreError(e.to_string()))?;
        self.db
            .collection::<Document>(collection)
            .insert_one(document)
            .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, data: &Value) -> Result<(), StoreError> {
        let document =
            mongodb::bson::to_document(data).map_err(|e| StoreError(e.to_string()))?;
        self.db
            .collection::<Document>(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": document })
            .await?;
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.db
            .collection::<Document>(collection)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(())
    }
}
