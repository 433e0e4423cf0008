//! User store

use bson::doc;
use mongodb::Collection;

use crate::db::schemas::{UserDoc, USER_COLLECTION};
use crate::db::{is_duplicate_key_error, MongoClient};
use crate::types::{LedgerError, Result};

pub struct UserStore {
    coll: Collection<UserDoc>,
}

impl UserStore {
    pub async fn open(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            coll: mongo.collection(USER_COLLECTION).await?,
        })
    }

    /// Create a user. The unique email index rejects duplicates.
    pub async fn create(&self, email: String, password_hash: String) -> Result<UserDoc> {
        let user = UserDoc::new(email, password_hash);

        match self.coll.insert_one(&user).await {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key_error(&e) => {
                Err(LedgerError::Validation("email already registered".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        Ok(self.coll.find_one(doc! { "email": email }).await?)
    }
}

#[cfg(test)]
mod tests {
    // Exercised by integration tests against a running MongoDB instance.
}
