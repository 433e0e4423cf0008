//! Category document schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::ReplicatedDoc;
use crate::records::{Category, CategoryType};

/// Collection name for categories
pub const CATEGORY_COLLECTION: &str = "categories";

/// Category document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CategoryDoc {
    #[serde(rename = "_id")]
    pub id: bson::Uuid,
    pub user_id: bson::Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    pub parent_id: Option<bson::Uuid>,
    pub icon: String,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
    pub last_modified_at: bson::DateTime,
    pub version: i32,
    pub is_deleted: bool,
}

impl IntoIndexes for CategoryDoc {
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
            // User listing, ordered by type then name
            (
                doc! { "user_id": 1, "type": 1, "name": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_type_name_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl ReplicatedDoc for CategoryDoc {
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

impl From<&Category> for CategoryDoc {
    fn from(c: &Category) -> Self {
        Self {
            id: bson::Uuid::from_uuid_1(c.id),
            user_id: bson::Uuid::from_uuid_1(c.user_id),
            name: c.name.clone(),
            category_type: c.category_type,
            parent_id: c.parent_id.map(bson::Uuid::from_uuid_1),
            icon: c.icon.clone(),
            created_at: bson::DateTime::from_chrono(c.created_at),
            updated_at: bson::DateTime::from_chrono(c.updated_at),
            last_modified_at: bson::DateTime::from_chrono(c.last_modified_at),
            version: c.version,
            is_deleted: c.is_deleted,
        }
    }
}

impl From<CategoryDoc> for Category {
    fn from(d: CategoryDoc) -> Self {
        Self {
            id: d.id.to_uuid_1(),
            user_id: d.user_id.to_uuid_1(),
            name: d.name,
            category_type: d.category_type,
            parent_id: d.parent_id.map(|p| p.to_uuid_1()),
            icon: d.icon,
            created_at: d.created_at.to_chrono(),
            updated_at: d.updated_at.to_chrono(),
            last_modified_at: d.last_modified_at.to_chrono(),
            version: d.version,
            is_deleted: d.is_deleted,
        }
    }
}
