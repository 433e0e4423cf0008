//! Account store

use bson::doc;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::{ClientSession, Collection};
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::schemas::{AccountDoc, ACCOUNT_COLLECTION};
use crate::db::MongoClient;
use crate::records::{Account, AccountType};
use crate::store::upsert_guarded;
use crate::types::{LedgerError, Result};

pub struct AccountStore {
    coll: Collection<AccountDoc>,
}

impl AccountStore {
    pub async fn open(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            coll: mongo.collection(ACCOUNT_COLLECTION).await?,
        })
    }

    /// Create a new account owned by `user_id`
    pub async fn create(
        &self,
        user_id: Uuid,
        name: String,
        account_type: AccountType,
        currency: String,
        balance: f64,
    ) -> Result<Account> {
        let account = Account::new(user_id, name, account_type, currency, balance);
        self.coll.insert_one(AccountDoc::from(&account)).await?;
        Ok(account)
    }

    /// Get a visible account by id. Tombstones and foreign records read as
    /// absent.
    pub async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Account> {
        let filter = doc! {
            "_id": bson::Uuid::from_uuid_1(id),
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
        };

        self.coll
            .find_one(filter)
            .await?
            .map(Account::from)
            .ok_or_else(|| LedgerError::NotFound("account not found".into()))
    }

    /// List visible accounts, ordered by name
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Account>> {
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
        };

        let mut cursor = self.coll.find(filter).sort(doc! { "name": 1 }).await?;
        let mut accounts = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            accounts.push(d.into());
        }
        Ok(accounts)
    }

    /// Overwrite an account's payload, bumping `version` and
    /// `last_modified_at`
    pub async fn update(&self, account: &Account, user_id: Uuid) -> Result<Account> {
        let now = bson::DateTime::now();
        let filter = doc! {
            "_id": bson::Uuid::from_uuid_1(account.id),
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
        };
        let update = doc! {
            "$set": {
                "name": &account.name,
                "type": account.account_type.as_str(),
                "currency": &account.currency,
                "balance": account.balance,
                "updated_at": now,
                "last_modified_at": now,
            },
            "$inc": { "version": 1 },
        };

        let result = self.coll.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(LedgerError::NotFound("account not found".into()));
        }

        self.get(account.id, user_id).await
    }

    /// Soft-delete an account. The tombstone stays visible to the change
    /// feed.
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
            return Err(LedgerError::NotFound("account not found".into()));
        }
        Ok(())
    }

    /// Change feed: every account modified strictly after `since`,
    /// tombstones included
    pub async fn modified_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Account>> {
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "last_modified_at": { "$gt": bson::DateTime::from_chrono(since) },
        };

        let mut cursor = self.coll.find(filter).await?;
        let mut accounts = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            accounts.push(d.into());
        }
        Ok(accounts)
    }

    /// Apply a merged batch inside a session, guarded by `last_modified_at`
    pub async fn upsert_batch(
        &self,
        session: &mut ClientSession,
        accounts: &[Account],
    ) -> Result<()> {
        let docs: Vec<AccountDoc> = accounts.iter().map(AccountDoc::from).collect();
        upsert_guarded(&self.coll, session, &docs).await
    }

    /// Which of `ids` exist for this user, tombstones counting as present
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
