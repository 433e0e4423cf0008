//! Category store

use bson::doc;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::{ClientSession, Collection};
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::schemas::{CategoryDoc, CATEGORY_COLLECTION};
use crate::db::MongoClient;
use crate::records::{Category, CategoryType};
use crate::store::upsert_guarded;
use crate::types::{LedgerError, Result};

pub struct CategoryStore {
    coll: Collection<CategoryDoc>,
}

impl CategoryStore {
    pub async fn open(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            coll: mongo.collection(CATEGORY_COLLECTION).await?,
        })
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        name: String,
        category_type: CategoryType,
        parent_id: Option<Uuid>,
        icon: String,
    ) -> Result<Category> {
        let category = Category::new(user_id, name, category_type, parent_id, icon);
        self.coll.insert_one(CategoryDoc::from(&category)).await?;
        Ok(category)
    }

    pub async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Category> {
        let filter = doc! {
            "_id": bson::Uuid::from_uuid_1(id),
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
        };

        self.coll
            .find_one(filter)
            .await?
            .map(Category::from)
            .ok_or_else(|| LedgerError::NotFound("category not found".into()))
    }

    /// List visible categories, ordered by type then name
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Category>> {
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
        };

        let mut cursor = self
            .coll
            .find(filter)
            .sort(doc! { "type": 1, "name": 1 })
            .await?;
        let mut categories = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            categories.push(d.into());
        }
        Ok(categories)
    }

    pub async fn list_by_type(
        &self,
        user_id: Uuid,
        category_type: CategoryType,
    ) -> Result<Vec<Category>> {
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "type": category_type.as_str(),
            "is_deleted": false,
        };

        let mut cursor = self.coll.find(filter).sort(doc! { "name": 1 }).await?;
        let mut categories = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            categories.push(d.into());
        }
        Ok(categories)
    }

    pub async fn update(&self, category: &Category, user_id: Uuid) -> Result<Category> {
        let now = bson::DateTime::now();
        let parent = category.parent_id.map(bson::Uuid::from_uuid_1);
        let filter = doc! {
            "_id": bson::Uuid::from_uuid_1(category.id),
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
        };
        let update = doc! {
            "$set": {
                "name": &category.name,
                "type": category.category_type.as_str(),
                "parent_id": parent,
                "icon": &category.icon,
                "updated_at": now,
                "last_modified_at": now,
            },
            "$inc": { "version": 1 },
        };

        let result = self.coll.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(LedgerError::NotFound("category not found".into()));
        }

        self.get(category.id, user_id).await
    }

    pub async fn soft_delete(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let now = bson::DateTime::now();
        let filter = doc! {
            "_id": bson::Uuid::from_uuid_1(id),
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
        };
        let update = doc! {
            "$set": {
                "is_deleted": true,
                "updated_at": now,
                "last_modified_at": now,
            },
            "$inc": { "version": 1 },
        };

        let result = self.coll.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(LedgerError::NotFound("category not found".into()));
        }
        Ok(())
    }

    pub async fn modified_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Category>> {
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "last_modified_at": { "$gt": bson::DateTime::from_chrono(since) },
        };

        let mut cursor = self.coll.find(filter).await?;
        let mut categories = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            categories.push(d.into());
        }
        Ok(categories)
    }

    pub async fn upsert_batch(
        &self,
        session: &mut ClientSession,
        categories: &[Category],
    ) -> Result<()> {
        let docs: Vec<CategoryDoc> = categories.iter().map(CategoryDoc::from).collect();
        upsert_guarded(&self.coll, session, &docs).await
    }

    pub async fn existing_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let id_list: Vec<bson::Uuid> = ids.iter().copied().map(bson::Uuid::from_uuid_1).collect();
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "_id": { "$in": id_list },
        };

        let values = self.coll.distinct("_id", filter).await?;
        Ok(values
            .into_iter()
            .filter_map(|v| bson::from_bson::<bson::Uuid>(v).ok())
            .map(|u| u.to_uuid_1())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    // Exercised by integration tests against a running MongoDB instance.
}
