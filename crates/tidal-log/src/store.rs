//! ObservationStore: redb-backed append-only observation log.
//!
//! Appends run inside a redb write transaction, and redb admits one writer
//! at a time, so the next sequence number (last key + 1) is allocated and
//! written atomically: concurrent appenders never overwrite each other.
//! Scans use read transactions and may run alongside appends; a scan sees
//! every record committed before it began.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata};
use tracing::debug;

use crate::error::{LogError, LogResult};
use crate::tables::OBSERVATIONS;
use crate::types::ObservationRecord;

/// Convert any `Display` error into a `LogError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| LogError::$variant(e.to_string())
    };
}

/// Append-only store of observations.
///
/// The core only ever appends and scans; there is no update or delete.
pub trait ObservationLog: Send + Sync {
    /// Durably append a record. Returns its sequence number.
    fn append(&self, record: &ObservationRecord) -> LogResult<u64>;

    /// Return every record matching `predicate`, in append order.
    fn scan(&self, predicate: &dyn Fn(&ObservationRecord) -> bool)
    -> LogResult<Vec<ObservationRecord>>;
}

/// Thread-safe observation log backed by redb.
#[derive(Clone)]
pub struct ObservationStore {
    db: Arc<Database>,
}

impl ObservationStore {
    /// Open (or create) a persistent log at the given path.
    pub fn open(path: &Path) -> LogResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "observation log opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory log (for testing).
    pub fn open_in_memory() -> LogResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory observation log opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> LogResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(OBSERVATIONS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Number of records in the log.
    pub fn len(&self) -> LogResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(OBSERVATIONS).map_err(map_err!(Table))?;
        table.len().map_err(map_err!(Read))
    }

    pub fn is_empty(&self) -> LogResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl ObservationLog for ObservationStore {
    fn append(&self, record: &ObservationRecord) -> LogResult<u64> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let seq;
        {
            let mut table = txn.open_table(OBSERVATIONS).map_err(map_err!(Table))?;
            let last = table
                .last()
                .map_err(map_err!(Read))?
                .map(|(key, _)| key.value())
                .unwrap_or(0);
            seq = last + 1;
            table
                .insert(seq, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(seq, requests = record.observed_requests, "observation appended");
        Ok(seq)
    }

    fn scan(
        &self,
        predicate: &dyn Fn(&ObservationRecord) -> bool,
    ) -> LogResult<Vec<ObservationRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(OBSERVATIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ObservationRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if predicate(&record) {
                results.push(record);
            }
        }
        Ok(results)
    }
}
