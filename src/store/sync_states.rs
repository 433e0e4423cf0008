//! Sync state store
//!
//! One bookmark per (user, device): the instant of the device's last fully
//! committed push. Advanced only after the push transaction commits, so an
//! aborted push leaves the bookmark untouched and the client retries
//! safely.

use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::Collection;
use uuid::Uuid;

use crate::db::schemas::{SyncStateDoc, SYNC_STATE_COLLECTION};
use crate::db::MongoClient;
use crate::types::Result;

pub struct SyncStateStore {
    coll: Collection<SyncStateDoc>,
}

impl SyncStateStore {
    pub async fn open(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            coll: mongo.collection(SYNC_STATE_COLLECTION).await?,
        })
    }

    /// The device's bookmark, if it has ever completed a push
    pub async fn get(&self, user_id: Uuid, device_id: &str) -> Result<Option<DateTime<Utc>>> {
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "device_id": device_id,
        };

        Ok(self
            .coll
            .find_one(filter)
            .await?
            .map(|s| s.last_sync_at.to_chrono()))
    }

    /// Advance (or create) the device's bookmark
    pub async fn upsert(&self, user_id: Uuid, device_id: &str, now: DateTime<Utc>) -> Result<()> {
        let now = bson::DateTime::from_chrono(now);
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "device_id": device_id,
        };
        let update = doc! {
            "$set": {
                "last_sync_at": now,
                "updated_at": now,
            },
            "$setOnInsert": {
                "created_at": now,
            },
        };

        self.coll.update_one(filter, update).upsert(true).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Exercised by integration tests against a running MongoDB instance.
}
