//! User document schema
//!
//! Users are not replicated; only the authentication boundary touches them.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserDoc {
    #[serde(rename = "_id")]
    pub id: bson::Uuid,
    /// Login identifier, unique
    pub email: String,
    /// Argon2 password hash (PHC format)
    pub password_hash: String,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl UserDoc {
    pub fn new(email: String, password_hash: String) -> Self {
        let now = bson::DateTime::now();
        Self {
            id: bson::Uuid::new(),
            email,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "email": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            ),
        )]
    }
}
