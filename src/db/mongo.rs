//! MongoDB client and collection helpers

use bson::Document;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, ClientSession, Collection, IndexModel};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::types::LedgerError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client and verify the connection
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, LedgerError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| LedgerError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(bson::doc! { "ping": 1 })
            .await
            .map_err(|e| LedgerError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Open a typed collection and apply its schema-defined indexes
    pub async fn collection<T>(&self, name: &str) -> Result<Collection<T>, LedgerError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + IntoIndexes,
    {
        let collection = self.client.database(&self.db_name).collection::<T>(name);

        let schema_indices = T::into_indices();
        if !schema_indices.is_empty() {
            let indices: Vec<IndexModel> = schema_indices
                .into_iter()
                .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
                .collect();

            collection
                .create_indexes(indices)
                .await
                .map_err(|e| LedgerError::Database(format!("Failed to create indexes: {}", e)))?;
        }

        Ok(collection)
    }

    /// Start a client session for multi-collection transactions
    pub async fn start_session(&self) -> Result<ClientSession, LedgerError> {
        self.client
            .start_session()
            .await
            .map_err(|e| LedgerError::Database(format!("Failed to start session: {}", e)))
    }
}

/// Whether a MongoDB error is a duplicate-key write rejection
pub fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    const DUPLICATE_KEY: i32 = 11000;

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    // Connection and transaction behavior is covered by integration tests
    // against a running MongoDB replica set; nothing here is testable
    // without one.
}
