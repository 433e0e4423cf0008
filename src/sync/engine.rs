//! Sync engine
//!
//! Orchestrates pull and push for one user at a time.
//!
//! Push holds the user's exclusive lock around read-delta, merge and
//! commit, so the sequence of committed `last_modified_at` values for a
//! user is monotonic and matches push completion order. Pull takes the
//! shared side of the same lock: pulls run concurrently with each other
//! but never interleave with a committing push. The notifier fires only
//! after the commit, outside the lock, so a device that pulls on a signal
//! observes the commit.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::records::{Account, Category, Transaction};
use crate::store::Stores;
use crate::sync::locks::UserLocks;
use crate::sync::notifier::ChangeNotifier;
use crate::sync::types::{SyncPullResponse, SyncPushRequest, SyncPushResponse};
use crate::sync::lww;
use crate::types::{LedgerError, Result};

pub struct SyncEngine {
    stores: Arc<Stores>,
    locks: Arc<UserLocks>,
    notifier: Arc<ChangeNotifier>,
}

impl SyncEngine {
    pub fn new(stores: Arc<Stores>) -> Self {
        Self {
            stores,
            locks: Arc::new(UserLocks::new()),
            notifier: Arc::new(ChangeNotifier::new()),
        }
    }

    /// The notifier the realtime transport subscribes to
    pub fn notifier(&self) -> Arc<ChangeNotifier> {
        Arc::clone(&self.notifier)
    }

    /// The per-user lock registry, for the periodic sweep task
    pub fn locks(&self) -> Arc<UserLocks> {
        Arc::clone(&self.locks)
    }

    /// Return every record modified since the device's bookmark, tombstones
    /// included, plus a server timestamp the device can use as its next
    /// bookmark.
    pub async fn pull(
        &self,
        user_id: Uuid,
        device_id: &str,
        last_sync_at: Option<DateTime<Utc>>,
    ) -> Result<SyncPullResponse> {
        let lock = self.locks.for_user(user_id);
        let _guard = lock.read().await;

        // A device that has never synced bootstraps from the epoch.
        let since = last_sync_at.unwrap_or(DateTime::UNIX_EPOCH);

        // Captured before the reads: anything committed after this instant
        // is picked up by the next pull, nothing is lost in between.
        let server_now = Utc::now();

        let accounts = self.stores.accounts.modified_since(user_id, since).await?;
        let categories = self.stores.categories.modified_since(user_id, since).await?;
        let transactions = self
            .stores
            .transactions
            .modified_since(user_id, since)
            .await?;

        debug!(
            %user_id,
            device_id,
            accounts = accounts.len(),
            categories = categories.len(),
            transactions = transactions.len(),
            "pull served"
        );

        Ok(SyncPullResponse {
            accounts,
            categories,
            transactions,
            current_sync_at: server_now,
        })
    }

    /// Merge a device's batch against the server state it has not seen and
    /// commit the result atomically.
    pub async fn push(&self, user_id: Uuid, req: SyncPushRequest) -> Result<SyncPushResponse> {
        validate_batch(user_id, &req)?;

        let since = req.last_sync_at.unwrap_or(DateTime::UNIX_EPOCH);
        let lock = self.locks.for_user(user_id);

        {
            let _guard = lock.write().await;

            // Server-side changes the client has not seen act as the
            // "local" merge side and win ties.
            let server_accounts = self.stores.accounts.modified_since(user_id, since).await?;
            let server_categories = self.stores.categories.modified_since(user_id, since).await?;
            let server_transactions = self
                .stores
                .transactions
                .modified_since(user_id, since)
                .await?;

            let accounts = lww::merge_lists(server_accounts, req.accounts);
            let categories = lww::merge_lists(server_categories, req.categories);
            let transactions = lww::merge_lists(server_transactions, req.transactions);

            self.check_references(user_id, &accounts, &categories, &transactions)
                .await?;

            debug!(
                %user_id,
                device_id = %req.device_id,
                accounts = accounts.len(),
                categories = categories.len(),
                transactions = transactions.len(),
                "committing merged batch"
            );

            let mut session = self.stores.start_session().await?;
            session.start_transaction().await?;

            let applied: Result<()> = async {
                self.stores
                    .accounts
                    .upsert_batch(&mut session, &accounts)
                    .await?;
                self.stores
                    .categories
                    .upsert_batch(&mut session, &categories)
                    .await?;
                self.stores
                    .transactions
                    .upsert_batch(&mut session, &transactions)
                    .await?;
                Ok(())
            }
            .await;

            match applied {
                Ok(()) => session.commit_transaction().await?,
                Err(e) => {
                    let _ = session.abort_transaction().await;
                    return Err(e);
                }
            }

            // Bookmark advances only after the commit; an aborted push
            // leaves it untouched and the client retries the whole batch.
            self.stores
                .sync_states
                .upsert(user_id, &req.device_id, Utc::now())
                .await?;
        }

        self.notifier.notify(user_id, &req.device_id);

        info!(%user_id, device_id = %req.device_id, "push committed");

        Ok(SyncPushResponse {
            success: true,
            current_sync_at: Utc::now(),
        })
    }

    /// Visible transactions near a candidate in date and amount, as a hint
    /// for import flows
    pub async fn find_possible_duplicates(
        &self,
        user_id: Uuid,
        transaction_date: DateTime<Utc>,
        amount: f64,
        currency: &str,
    ) -> Result<Vec<Transaction>> {
        self.stores
            .transactions
            .find_in_duplicate_window(user_id, transaction_date, amount, currency)
            .await
    }

    /// Every cross-record reference in the merged batch must resolve to a
    /// record in the batch or already in storage (tombstones count), owned
    /// by the same user. Nothing is auto-created.
    async fn check_references(
        &self,
        user_id: Uuid,
        accounts: &[Account],
        categories: &[Category],
        transactions: &[Transaction],
    ) -> Result<()> {
        let batch_accounts: HashSet<Uuid> = accounts.iter().map(|a| a.id).collect();
        let mut unresolved: HashSet<Uuid> = transactions
            .iter()
            .map(|t| t.account_id)
            .filter(|id| !batch_accounts.contains(id))
            .collect();

        if !unresolved.is_empty() {
            let ids: Vec<Uuid> = unresolved.iter().copied().collect();
            let stored = self.stores.accounts.existing_ids(user_id, &ids).await?;
            unresolved.retain(|id| !stored.contains(id));
            if let Some(missing) = unresolved.iter().next() {
                return Err(LedgerError::Validation(format!(
                    "transaction references unknown account {}",
                    missing
                )));
            }
        }

        let batch_categories: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();
        let mut unresolved: HashSet<Uuid> = transactions
            .iter()
            .filter_map(|t| t.category_id)
            .chain(categories.iter().filter_map(|c| c.parent_id))
            .filter(|id| !batch_categories.contains(id))
            .collect();

        if !unresolved.is_empty() {
            let ids: Vec<Uuid> = unresolved.iter().copied().collect();
            let stored = self.stores.categories.existing_ids(user_id, &ids).await?;
            unresolved.retain(|id| !stored.contains(id));
            if let Some(missing) = unresolved.iter().next() {
                return Err(LedgerError::Validation(format!(
                    "record references unknown category {}",
                    missing
                )));
            }
        }

        Ok(())
    }
}

/// Reject a batch that claims foreign ownership or carries an invalid
/// amount before any storage work happens.
fn validate_batch(user_id: Uuid, req: &SyncPushRequest) -> Result<()> {
    for account in &req.accounts {
        if account.user_id != user_id {
            return Err(LedgerError::Validation(format!(
                "account {} does not belong to the authenticated user",
                account.id
            )));
        }
    }

    for category in &req.categories {
        if category.user_id != user_id {
            return Err(LedgerError::Validation(format!(
                "category {} does not belong to the authenticated user",
                category.id
            )));
        }
    }

    for transaction in &req.transactions {
        if transaction.user_id != user_id {
            return Err(LedgerError::Validation(format!(
                "transaction {} does not belong to the authenticated user",
                transaction.id
            )));
        }
        if transaction.amount <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "transaction {} amount must be positive",
                transaction.id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AccountType, TransactionType};

    fn push_request(user_id: Uuid) -> SyncPushRequest {
        SyncPushRequest {
            device_id: "d1".into(),
            accounts: vec![Account::new(
                user_id,
                "Cash".into(),
                AccountType::Cash,
                "CNY".into(),
                0.0,
            )],
            categories: vec![],
            transactions: vec![Transaction::new(
                user_id,
                Uuid::new_v4(),
                None,
                TransactionType::Expense,
                9.5,
                "CNY".into(),
                String::new(),
                Utc::now(),
            )],
            last_sync_at: None,
        }
    }

    #[test]
    fn test_validate_batch_accepts_owned_records() {
        let user = Uuid::new_v4();
        assert!(validate_batch(user, &push_request(user)).is_ok());
    }

    #[test]
    fn test_validate_batch_rejects_foreign_owner() {
        let user = Uuid::new_v4();
        let req = push_request(Uuid::new_v4());
        assert!(matches!(
            validate_batch(user, &req),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_batch_rejects_non_positive_amount() {
        let user = Uuid::new_v4();
        let mut req = push_request(user);
        req.transactions[0].amount = 0.0;
        assert!(matches!(
            validate_batch(user, &req),
            Err(LedgerError::Validation(_))
        ));

        let mut req = push_request(user);
        req.transactions[0].amount = -5.0;
        assert!(validate_batch(user, &req).is_err());
    }

    // Pull/push flows against storage are exercised by integration tests
    // with a running MongoDB replica set.
}
