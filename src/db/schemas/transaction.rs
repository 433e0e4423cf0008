//! Transaction document schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::ReplicatedDoc;
use crate::records::{Transaction, TransactionType};

/// Collection name for transactions
pub const TRANSACTION_COLLECTION: &str = "transactions";

/// Transaction document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TransactionDoc {
    #[serde(rename = "_id")]
    pub id: bson::Uuid,
    pub user_id: bson::Uuid,
    pub account_id: bson::Uuid,
    pub category_id: Option<bson::Uuid>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub currency: String,
    pub note: String,
    pub transaction_date: bson::DateTime,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
    pub last_modified_at: bson::DateTime,
    pub version: i32,
    pub is_deleted: bool,
}

impl IntoIndexes for TransactionDoc {
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
            // Listing, range and duplicate-window queries
            (
                doc! { "user_id": 1, "transaction_date": -1, "created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_date_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl ReplicatedDoc for TransactionDoc {
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

impl From<&Transaction> for TransactionDoc {
    fn from(t: &Transaction) -> Self {
        Self {
            id: bson::Uuid::from_uuid_1(t.id),
            user_id: bson::Uuid::from_uuid_1(t.user_id),
            account_id: bson::Uuid::from_uuid_1(t.account_id),
            category_id: t.category_id.map(bson::Uuid::from_uuid_1),
            transaction_type: t.transaction_type,
            amount: t.amount,
            currency: t.currency.clone(),
            note: t.note.clone(),
            transaction_date: bson::DateTime::from_chrono(t.transaction_date),
            created_at: bson::DateTime::from_chrono(t.created_at),
            updated_at: bson::DateTime::from_chrono(t.updated_at),
            last_modified_at: bson::DateTime::from_chrono(t.last_modified_at),
            version: t.version,
            is_deleted: t.is_deleted,
        }
    }
}

impl From<TransactionDoc> for Transaction {
    fn from(d: TransactionDoc) -> Self {
        Self {
            id: d.id.to_uuid_1(),
            user_id: d.user_id.to_uuid_1(),
            account_id: d.account_id.to_uuid_1(),
            category_id: d.category_id.map(|c| c.to_uuid_1()),
            transaction_type: d.transaction_type,
            amount: d.amount,
            currency: d.currency,
            note: d.note,
            transaction_date: d.transaction_date.to_chrono(),
            created_at: d.created_at.to_chrono(),
            updated_at: d.updated_at.to_chrono(),
            last_modified_at: d.last_modified_at.to_chrono(),
            version: d.version,
            is_deleted: d.is_deleted,
        }
    }
}
