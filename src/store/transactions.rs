//! Transaction store

use bson::doc;
use chrono::{DateTime, Duration, Utc};
use futures_util::TryStreamExt;
use mongodb::{ClientSession, Collection};
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::schemas::{TransactionDoc, TRANSACTION_COLLECTION};
use crate::db::MongoClient;
use crate::records::{Transaction, TransactionType};
use crate::store::upsert_guarded;
use crate::types::{LedgerError, Result};

/// Duplicate-window bounds: a day either side of the candidate date and a
/// cent either side of the amount
const DUPLICATE_WINDOW_HOURS: i64 = 24;
const DUPLICATE_AMOUNT_TOLERANCE: f64 = 0.01;

/// Income and expense totals over a date range
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeTotals {
    pub income: f64,
    pub expense: f64,
}

pub struct TransactionStore {
    coll: Collection<TransactionDoc>,
}

impl TransactionStore {
    pub async fn open(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            coll: mongo.collection(TRANSACTION_COLLECTION).await?,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        category_id: Option<Uuid>,
        transaction_type: TransactionType,
        amount: f64,
        currency: String,
        note: String,
        transaction_date: DateTime<Utc>,
    ) -> Result<Transaction> {
        let transaction = Transaction::new(
            user_id,
            account_id,
            category_id,
            transaction_type,
            amount,
            currency,
            note,
            transaction_date,
        );
        self.coll
            .insert_one(TransactionDoc::from(&transaction))
            .await?;
        Ok(transaction)
    }

    pub async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Transaction> {
        let filter = doc! {
            "_id": bson::Uuid::from_uuid_1(id),
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
        };

        self.coll
            .find_one(filter)
            .await?
            .map(Transaction::from)
            .ok_or_else(|| LedgerError::NotFound("transaction not found".into()))
    }

    /// List visible transactions, newest first
    pub async fn list(&self, user_id: Uuid, limit: i64, offset: u64) -> Result<Vec<Transaction>> {
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
        };

        let mut cursor = self
            .coll
            .find(filter)
            .sort(doc! { "transaction_date": -1, "created_at": -1 })
            .skip(offset)
            .limit(limit)
            .await?;
        let mut transactions = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            transactions.push(d.into());
        }
        Ok(transactions)
    }

    pub async fn list_by_range(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
            "transaction_date": {
                "$gte": bson::DateTime::from_chrono(start),
                "$lte": bson::DateTime::from_chrono(end),
            },
        };

        let mut cursor = self
            .coll
            .find(filter)
            .sort(doc! { "transaction_date": -1, "created_at": -1 })
            .await?;
        let mut transactions = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            transactions.push(d.into());
        }
        Ok(transactions)
    }

    pub async fn update(&self, transaction: &Transaction, user_id: Uuid) -> Result<Transaction> {
        let now = bson::DateTime::now();
        let category = transaction.category_id.map(bson::Uuid::from_uuid_1);
        let filter = doc! {
            "_id": bson::Uuid::from_uuid_1(transaction.id),
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
        };
        let update = doc! {
            "$set": {
                "account_id": bson::Uuid::from_uuid_1(transaction.account_id),
                "category_id": category,
                "type": transaction.transaction_type.as_str(),
                "amount": transaction.amount,
                "currency": &transaction.currency,
                "note": &transaction.note,
                "transaction_date": bson::DateTime::from_chrono(transaction.transaction_date),
                "updated_at": now,
                "last_modified_at": now,
            },
            "$inc": { "version": 1 },
        };

        let result = self.coll.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(LedgerError::NotFound("transaction not found".into()));
        }

        self.get(transaction.id, user_id).await
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
            return Err(LedgerError::NotFound("transaction not found".into()));
        }
        Ok(())
    }

    pub async fn modified_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "last_modified_at": { "$gt": bson::DateTime::from_chrono(since) },
        };

        let mut cursor = self.coll.find(filter).await?;
        let mut transactions = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            transactions.push(d.into());
        }
        Ok(transactions)
    }

    pub async fn upsert_batch(
        &self,
        session: &mut ClientSession,
        transactions: &[Transaction],
    ) -> Result<()> {
        let docs: Vec<TransactionDoc> = transactions.iter().map(TransactionDoc::from).collect();
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

    /// Visible transactions close to a candidate in date and amount. A hint
    /// for import flows; identical legitimate transactions are permitted.
    pub async fn find_in_duplicate_window(
        &self,
        user_id: Uuid,
        transaction_date: DateTime<Utc>,
        amount: f64,
        currency: &str,
    ) -> Result<Vec<Transaction>> {
        let window = Duration::hours(DUPLICATE_WINDOW_HOURS);
        let filter = doc! {
            "user_id": bson::Uuid::from_uuid_1(user_id),
            "is_deleted": false,
            "currency": currency,
            "transaction_date": {
                "$gte": bson::DateTime::from_chrono(transaction_date - window),
                "$lte": bson::DateTime::from_chrono(transaction_date + window),
            },
            "amount": {
                "$gte": amount - DUPLICATE_AMOUNT_TOLERANCE,
                "$lte": amount + DUPLICATE_AMOUNT_TOLERANCE,
            },
        };

        let mut cursor = self
            .coll
            .find(filter)
            .sort(doc! { "transaction_date": -1, "created_at": -1 })
            .await?;
        let mut transactions = Vec::new();
        while let Some(d) = cursor.try_next().await? {
            transactions.push(d.into());
        }
        Ok(transactions)
    }

    /// Income and expense totals over visible transactions in a date range
    pub async fn totals_by_range(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RangeTotals> {
        let pipeline = vec![
            doc! { "$match": {
                "user_id": bson::Uuid::from_uuid_1(user_id),
                "is_deleted": false,
                "type": { "$in": ["income", "expense"] },
                "transaction_date": {
                    "$gte": bson::DateTime::from_chrono(start),
                    "$lte": bson::DateTime::from_chrono(end),
                },
            }},
            doc! { "$group": {
                "_id": "$type",
                "total": { "$sum": "$amount" },
            }},
        ];

        let mut totals = RangeTotals::default();
        let mut cursor = self.coll.aggregate(pipeline).await?;
        while let Some(d) = cursor.try_next().await? {
            let total = d.get_f64("total").unwrap_or(0.0);
            match d.get_str("_id") {
                Ok("income") => totals.income = total,
                Ok("expense") => totals.expense = total,
                _ => {}
            }
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    // Exercised by integration tests against a running MongoDB instance.
}
