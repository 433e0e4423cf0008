//! Sync state document schema
//!
//! One row per (user, device): the bookmark of the device's last fully
//! committed push. The unique compound index is the table's primary key.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for sync states
pub const SYNC_STATE_COLLECTION: &str = "sync_states";

/// Sync state document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SyncStateDoc {
    pub user_id: bson::Uuid,
    pub device_id: String,
    pub last_sync_at: bson::DateTime,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl IntoIndexes for SyncStateDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user_id": 1, "device_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("user_device_unique".to_string())
                    .build(),
            ),
        )]
    }
}
