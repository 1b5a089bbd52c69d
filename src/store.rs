//! Persistent handle → listing map backed by redb.
//!
//! The store only needs independent get/put by key: a listing is written
//! once, never updated, never deleted. Values are the JSON form of
//! [`Listing`] so the database stays inspectable with plain tools.

use std::path::Path;

use redb::{Database, ReadableDatabase, TableDefinition};

use crate::extract::Listing;

const LISTINGS: TableDefinition<&str, &str> = TableDefinition::new("listings");

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Database(String),

    #[error("stored listing is not valid json: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Lookup/persist capability the deduplicator and recorder run against.
pub trait ListingStore {
    async fn get(&self, handle: &str) -> Result<Option<Listing>, StoreError>;
    async fn put(&self, listing: &Listing) -> Result<(), StoreError>;
}

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database at `<dir>/listings.redb`.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let db = Database::create(dir.join("listings.redb"))?;

        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(LISTINGS)?;
        }
        txn.commit()?;

        Ok(Self { db })
    }
}

impl ListingStore for RedbStore {
    async fn get(&self, handle: &str) -> Result<Option<Listing>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(LISTINGS)?;
        let Some(value) = table.get(handle)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(value.value())?))
    }

    async fn put(&self, listing: &Listing) -> Result<(), StoreError> {
        let json = serde_json::to_string(listing)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(LISTINGS)?;
            table.insert(listing.handle.as_str(), json.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }
}
