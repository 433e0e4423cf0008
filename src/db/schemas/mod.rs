//! At-rest document schemas
//!
//! One collection per record kind. Replicated kinds carry the replication
//! fields in-row (`last_modified_at`, `version`, `is_deleted`) and declare
//! a compound `(user_id, last_modified_at)` index so the change feed is a
//! single indexed range scan.

mod account;
mod category;
mod sync_state;
mod transaction;
mod user;

pub use account::{AccountDoc, ACCOUNT_COLLECTION};
pub use category::{CategoryDoc, CATEGORY_COLLECTION};
pub use sync_state::{SyncStateDoc, SYNC_STATE_COLLECTION};
pub use transaction::{TransactionDoc, TRANSACTION_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};

use serde::{de::DeserializeOwned, Serialize};

/// Capability set the guarded batch upsert needs from a replicated document
pub trait ReplicatedDoc: Serialize + DeserializeOwned + Send + Sync {
    fn id(&self) -> bson::Uuid;
    fn user_id(&self) -> bson::Uuid;
    fn last_modified_at(&self) -> bson::DateTime;
}
