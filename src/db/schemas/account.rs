//! Account document schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::ReplicatedDoc;
use crate::records::{Account, AccountType};

/// Collection name for accounts
pub const ACCOUNT_COLLECTION: &str = "accounts";

/// Account document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AccountDoc {
    /// Record id, generated by the device that created the record
    #[serde(rename = "_id")]
    pub id: bson::Uuid,
    pub user_id: bson::Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub currency: String,
    pub balance: f64,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
    pub last_modified_at: bson::DateTime,
    pub version: i32,
    pub is_deleted: bool,
}

impl IntoIndexes for AccountDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Change-feed queries
            (
                doc! { "user_id": 1, "last_modified_at": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_modified_index".to_string())
                        .build(),
                ),
            ),
            // User listing, ordered by name
            (
                doc! { "user_id": 1, "name": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_name_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl ReplicatedDoc for AccountDoc {
    fn id(&self) -> bson::Uuid {
        self.id
    }

    fn user_id(&self) -> bson::Uuid {
        self.user_id
    }

    fn last_modified_at(&self) -> bson::DateTime {
        self.last_modified_at
    }
}

impl From<&Account> for AccountDoc {
    fn from(a: &Account) -> Self {
        Self {
            id: bson::Uuid::from_uuid_1(a.id),
            user_id: bson::Uuid::from_uuid_1(a.user_id),
            name: a.name.clone(),
            account_type: a.account_type,
            currency: a.currency.clone(),
            balance: a.balance,
            created_at: bson::DateTime::from_chrono(a.created_at),
            updated_at: bson::DateTime::from_chrono(a.updated_at),
            last_modified_at: bson::DateTime::from_chrono(a.last_modified_at),
            version: a.version,
            is_deleted: a.is_deleted,
        }
    }
}

impl From<AccountDoc> for Account {
    fn from(d: AccountDoc) -> Self {
        Self {
            id: d.id.to_uuid_1(),
            user_id: d.user_id.to_uuid_1(),
            name: d.name,
            account_type: d.account_type,
            currency: d.currency,
            balance: d.balance,
            created_at: d.created_at.to_chrono(),
            updated_at: d.updated_at.to_chrono(),
            last_modified_at: d.last_modified_at.to_chrono(),
            version: d.version,
            is_deleted: d.is_deleted,
        }
    }
}
