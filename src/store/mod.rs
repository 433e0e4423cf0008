//! Record Store
//!
//! Durable per-record storage for the replicated kinds plus the
//! non-replicated users and per-device sync bookmarks. Each store wraps one
//! typed collection; `Stores` bundles them with the client so the sync
//! engine can open cross-collection sessions.
//!
//! The LWW guard lives here, in [`upsert_guarded`]: a batch write only
//! overwrites a stored record when the incoming `last_modified_at` is at
//! least the stored one. The engine's per-user lock is the performance
//! path; this guard is the correctness backstop when a racing writer slips
//! past it.

mod accounts;
mod categories;
mod sync_states;
mod transactions;
mod users;

pub use accounts::AccountStore;
pub use categories::CategoryStore;
pub use sync_states::SyncStateStore;
pub use transactions::TransactionStore;
pub use users::UserStore;

use bson::doc;
use mongodb::{ClientSession, Collection};

use crate::db::schemas::ReplicatedDoc;
use crate::db::{is_duplicate_key_error, MongoClient};
use crate::types::Result;

/// All stores plus the client that owns their sessions
pub struct Stores {
    mongo: MongoClient,
    pub accounts: AccountStore,
    pub categories: CategoryStore,
    pub transactions: TransactionStore,
    pub sync_states: SyncStateStore,
    pub users: UserStore,
}

impl Stores {
    /// Open every collection and apply schema indexes
    pub async fn open(mongo: MongoClient) -> Result<Self> {
        Ok(Self {
            accounts: AccountStore::open(&mongo).await?,
            categories: CategoryStore::open(&mongo).await?,
            transactions: TransactionStore::open(&mongo).await?,
            sync_states: SyncStateStore::open(&mongo).await?,
            users: UserStore::open(&mongo).await?,
            mongo,
        })
    }

    /// Start a session for a transaction spanning several collections
    pub async fn start_session(&self) -> Result<ClientSession> {
        self.mongo.start_session().await
    }
}

/// Conditionally upsert a batch of replicated documents inside a session.
///
/// For each document: overwrite the stored record only when the stored
/// `last_modified_at` is not newer, insert when absent, and silently drop
/// the incoming record when a concurrent writer already committed a newer
/// version (surfacing as a duplicate-key rejection on the insert path).
/// Applying the same batch twice yields the same end state.
pub(crate) async fn upsert_guarded<T: ReplicatedDoc>(
    coll: &Collection<T>,
    session: &mut ClientSession,
    docs: &[T],
) -> Result<()> {
    for item in docs {
        let mut fields = bson::to_document(item)?;
        fields.remove("_id");

        let guard = doc! {
            "_id": item.id(),
            "user_id": item.user_id(),
            "last_modified_at": { "$lte": item.last_modified_at() },
        };

        let updated = coll
            .update_one(guard, doc! { "$set": fields })
            .session(&mut *session)
            .await?;

        if updated.matched_count == 0 {
            match coll.insert_one(item).session(&mut *session).await {
                Ok(_) => {}
                // The stored version is newer (or owned elsewhere); the
                // incoming record loses and the next pull returns the winner.
                Err(e) if is_duplicate_key_error(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
