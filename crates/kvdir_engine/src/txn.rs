//! Engine transactions.

use crate::env::EnvInner;
use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnStatus {
    Active,
    Committed,
    Aborted,
}

/// Mutable transaction state, guarded by a mutex so clones of the handle
/// can be used from the channel that buffered the writes.
struct TxnState {
    status: TxnStatus,
    /// Buffered writes per database name. `None` marks a deletion.
    writes: HashMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

struct TxnInner {
    id: u64,
    label: Option<String>,
    env: Arc<EnvInner>,
    state: Mutex<TxnState>,
}

/// An engine transaction handle.
///
/// The handle is cheap to clone; all clones refer to the same transaction.
/// Writes made through a [`crate::Database`] with this transaction are
/// buffered and become visible to other readers only when [`commit`] is
/// called, all at once. [`abort`] discards them.
///
/// A transaction finishes exactly once: after `commit` or `abort`, any
/// further use fails with [`EngineError::TransactionFinished`].
///
/// [`commit`]: Transaction::commit
/// [`abort`]: Transaction::abort
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxnInner>,
}

impl Transaction {
    pub(crate) fn new(id: u64, label: Option<String>, env: Arc<EnvInner>) -> Self {
        Self {
            inner: Arc::new(TxnInner {
                id,
                label,
                env,
                state: Mutex::new(TxnState {
                    status: TxnStatus::Active,
                    writes: HashMap::new(),
                }),
            }),
        }
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns true if the transaction has not yet committed or aborted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().status == TxnStatus::Active
    }

    /// Buffers a put (`Some`) or delete (`None`) for `db`.
    pub(crate) fn record_write(
        &self,
        db: &str,
        key: Vec<u8>,
        value: Option<Vec<u8>>,
    ) -> EngineResult<()> {
        let mut state = self.inner.state.lock();
        if state.status != TxnStatus::Active {
            return Err(EngineError::TransactionFinished);
        }
        state
            .writes
            .entry(db.to_string())
            .or_default()
            .insert(key, value);
        Ok(())
    }

    /// Looks up a buffered write for `(db, key)`.
    ///
    /// Returns `None` if this transaction has not touched the key,
    /// `Some(None)` if it deleted it, `Some(Some(_))` if it wrote it.
    pub(crate) fn pending(&self, db: &str, key: &[u8]) -> Option<Option<Vec<u8>>> {
        let state = self.inner.state.lock();
        state.writes.get(db).and_then(|w| w.get(key).cloned())
    }

    /// Returns the buffered writes for `db`, for key enumeration.
    pub(crate) fn pending_for(&self, db: &str) -> BTreeMap<Vec<u8>, Option<Vec<u8>>> {
        let state = self.inner.state.lock();
        state.writes.get(db).cloned().unwrap_or_default()
    }

    /// Commits the transaction, applying every buffered write atomically.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TransactionFinished`] if the transaction is
    /// not active, or [`EngineError::EnvironmentClosed`] if the
    /// environment was closed underneath it.
    pub fn commit(&self) -> EngineResult<()> {
        let mut state = self.inner.state.lock();
        if state.status != TxnStatus::Active {
            return Err(EngineError::TransactionFinished);
        }
        self.inner.env.ensure_open()?;

        // Single critical section over all tables: readers see either none
        // or all of this transaction's writes.
        let mut tables = self.inner.env.tables.write();
        for (db, writes) in state.writes.drain() {
            let table = tables.entry(db).or_default();
            for (key, value) in writes {
                match value {
                    Some(value) => {
                        table.insert(key, value);
                    }
                    None => {
                        table.remove(&key);
                    }
                }
            }
        }
        drop(tables);

        state.status = TxnStatus::Committed;
        tracing::debug!(id = self.inner.id, label = ?self.inner.label, "commit transaction");
        Ok(())
    }

    /// Aborts the transaction, discarding every buffered write.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TransactionFinished`] if the transaction has
    /// already committed or aborted.
    pub fn abort(&self) -> EngineResult<()> {
        let mut state = self.inner.state.lock();
        if state.status != TxnStatus::Active {
            return Err(EngineError::TransactionFinished);
        }
        state.writes.clear();
        state.status = TxnStatus::Aborted;
        tracing::debug!(id = self.inner.id, label = ?self.inner.label, "abort transaction");
        Ok(())
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("active", &self.is_active())
            .finish()
    }
}
