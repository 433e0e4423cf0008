//! Sync protocol wire types
//!
//! A missing or epoch `last_sync_at` means the device has never synced and
//! gets the full change feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::{Account, Category, Transaction};

#[derive(Debug, Deserialize)]
pub struct SyncPullRequest {
    pub device_id: String,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SyncPullResponse {
    pub accounts: Vec<Account>,
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,
    pub current_sync_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SyncPushRequest {
    pub device_id: String,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SyncPushResponse {
    pub success: bool,
    pub current_sync_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_request_epoch_bookmark() {
        let req: SyncPullRequest = serde_json::from_str(
            r#"{"device_id": "d1", "last_sync_at": "1970-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(req.device_id, "d1");
        assert_eq!(req.last_sync_at.unwrap().timestamp(), 0);
    }

    #[test]
    fn test_pull_request_missing_bookmark() {
        let req: SyncPullRequest = serde_json::from_str(r#"{"device_id": "d1"}"#).unwrap();
        assert!(req.last_sync_at.is_none());
    }

    #[test]
    fn test_push_request_batches_default_empty() {
        let req: SyncPushRequest = serde_json::from_str(r#"{"device_id": "d1"}"#).unwrap();
        assert!(req.accounts.is_empty());
        assert!(req.categories.is_empty());
        assert!(req.transactions.is_empty());
    }

    #[test]
    fn test_push_response_shape() {
        let resp = SyncPushResponse {
            success: true,
            current_sync_at: "2024-06-01T10:00:00Z".parse().unwrap(),
        };

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"current_sync_at\":\"2024-06-01T10:00:00Z\""));
    }
}
