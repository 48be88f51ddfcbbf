//! Engine environment: shared committed state and transaction creation.

use crate::config::{DatabaseConfig, TransactionConfig};
use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::txn::Transaction;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// One named key-value table. Ordered by key.
pub(crate) type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// Shared environment state.
///
/// All committed data lives under a single `RwLock` so that a commit
/// spanning several databases becomes visible in one step - readers can
/// never observe a half-applied transaction.
pub(crate) struct EnvInner {
    /// Committed state, keyed by database name.
    pub(crate) tables: RwLock<HashMap<String, Table>>,
    /// Next transaction id.
    next_txn_id: AtomicU64,
    /// Whether the environment is open.
    open: AtomicBool,
    /// Remaining put budget before an injected fault fires. `None` = disarmed.
    puts_until_fault: Mutex<Option<u64>>,
}

impl EnvInner {
    pub(crate) fn ensure_open(&self) -> EngineResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EngineError::EnvironmentClosed)
        }
    }

    /// Consumes one unit of the injected-fault put budget.
    pub(crate) fn check_put_fault(&self) -> EngineResult<()> {
        let mut budget = self.puts_until_fault.lock();
        match *budget {
            Some(0) => {
                *budget = None;
                Err(EngineError::InjectedFault { op: "put" })
            }
            Some(ref mut remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// A handle to an embedded key-value engine environment.
///
/// The environment owns all committed state and hands out [`Database`]
/// handles and [`Transaction`]s. Handles are cheap to clone; all clones
/// refer to the same underlying state.
///
/// # Thread Safety
///
/// The environment is thread-safe. Writers conflict at the level of the
/// internal table lock; readers without a transaction see committed state
/// only.
///
/// # Example
///
/// ```rust
/// use kvdir_engine::{DatabaseConfig, Environment};
///
/// let env = Environment::new();
/// let db = env.open_database("table", &DatabaseConfig::default()).unwrap();
/// db.put(b"key", b"value", None).unwrap();
/// assert_eq!(db.get(b"key", None).unwrap(), Some(b"value".to_vec()));
/// ```
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvInner>,
}

impl Environment {
    /// Creates a new, empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EnvInner {
                tables: RwLock::new(HashMap::new()),
                next_txn_id: AtomicU64::new(1),
                open: AtomicBool::new(true),
                puts_until_fault: Mutex::new(None),
            }),
        }
    }

    /// Opens a database within this environment.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DatabaseNotFound`] if the database does not
    /// exist and `config.create_if_missing` is false, or
    /// [`EngineError::EnvironmentClosed`] if the environment is closed.
    pub fn open_database(&self, name: &str, config: &DatabaseConfig) -> EngineResult<Database> {
        self.inner.ensure_open()?;
        let mut tables = self.inner.tables.write();
        if !tables.contains_key(name) {
            if !config.create_if_missing {
                return Err(EngineError::DatabaseNotFound {
                    name: name.to_string(),
                });
            }
            tables.insert(name.to_string(), Table::new());
        }
        drop(tables);
        Ok(Database::new(name.to_string(), Arc::clone(&self.inner)))
    }

    /// Begins a new transaction.
    ///
    /// Writes buffered in the transaction are invisible to other readers
    /// until [`Transaction::commit`] applies them atomically.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EnvironmentClosed`] if the environment is
    /// closed.
    pub fn begin_transaction(&self, config: &TransactionConfig) -> EngineResult<Transaction> {
        self.inner.ensure_open()?;
        let id = self.inner.next_txn_id.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(id, label = ?config.name, "begin transaction");
        Ok(Transaction::new(
            id,
            config.name.clone(),
            Arc::clone(&self.inner),
        ))
    }

    /// Returns true if the environment is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Closes the environment.
    ///
    /// Subsequent operations on databases and transactions of this
    /// environment fail with [`EngineError::EnvironmentClosed`].
    pub fn close(&self) {
        self.inner.open.store(false, Ordering::SeqCst);
    }

    /// Arms fault injection: the next `n` puts succeed, the one after
    /// fails with [`EngineError::InjectedFault`], then the fault disarms.
    ///
    /// Intended for tests that simulate an engine failure mid-operation.
    pub fn fail_after_puts(&self, n: u64) {
        *self.inner.puts_until_fault.lock() = Some(n);
    }

    /// Disarms any pending injected fault.
    pub fn clear_faults(&self) {
        *self.inner.puts_until_fault.lock() = None;
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("open", &self.is_open())
            .field("databases", &self.inner.tables.read().len())
            .finish_non_exhaustive()
    }
}
