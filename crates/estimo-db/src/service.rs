//! Service layer implementing the repository contracts over libSQL.
//!
//! `EstimoService` wraps `EstimoDb`. Every repo module in `repos/` adds inherent
//! methods returning `DatabaseError` plus the matching `estimo_core::repository`
//! trait impl, which converts to `CoreError` at the boundary.
//!
//! The libSQL connection is shared, so a statement issued while another task
//! holds an open transaction would join that transaction. Every mutation
//! therefore runs under `write_lock`.

use tokio::sync::{Mutex, MutexGuard};

use crate::EstimoDb;
use crate::error::DatabaseError;

pub struct EstimoService {
    db: EstimoDb,
    write_lock: Mutex<()>,
}

impl EstimoService {
    /// Open (or create) a local database and wrap it.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the libSQL database file, or `":memory:"` for tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or migrated.
    pub async fn new_local(db_path: &str) -> Result<Self, DatabaseError> {
        let db = EstimoDb::open_local(db_path).await?;
        Ok(Self::from_db(db))
    }

    /// Create from an existing `EstimoDb`.
    #[must_use]
    pub fn from_db(db: EstimoDb) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &EstimoDb {
        &self.db
    }

    /// Serialize a mutation against every other mutation on this connection.
    pub(crate) async fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}
