use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::{Collection, Database};

use crate::errors::Result;
use crate::models::otp::OtpRecord;

const OTP_COLLECTION: &str = "otps";

/// Persistence boundary for pending OTP records.
///
/// Multiple records may coexist for one email; the active one is the record
/// with the greatest `created_at`. `remove` claims a single record by id so
/// racing verifiers cannot both consume it.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert(&self, record: OtpRecord) -> Result<()>;

    async fn find_latest(&self, email: &str) -> Result<Option<OtpRecord>>;

    /// Deletes the record with the given id. Returns `false` when the
    /// record is already gone (claimed by a concurrent verification).
    async fn remove(&self, email: &str, id: &ObjectId) -> Result<bool>;

    /// Deletes every record for the email, returning the deleted count.
    async fn purge(&self, email: &str) -> Result<u64>;
}

pub struct MongoOtpStore {
    collection: Collection<OtpRecord>,
}

impl MongoOtpStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(OTP_COLLECTION),
        }
    }
}

#[async_trait]
impl OtpStore for MongoOtpStore {
    async fn insert(&self, record: OtpRecord) -> Result<()> {
        self.collection.insert_one(&record).await?;
        Ok(())
    }

    async fn find_latest(&self, email: &str) -> Result<Option<OtpRecord>> {
        let record = self
            .collection
            .find_one(doc! { "email": email })
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(record)
    }

    async fn remove(&self, email: &str, id: &ObjectId) -> Result<bool> {
        let deleted = self
            .collection
            .find_one_and_delete(doc! { "_id": id, "email": email })
            .await?;
        Ok(deleted.is_some())
    }

    async fn purge(&self, email: &str) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "email": email })
            .await?;
        Ok(result.deleted_count)
    }
}
