//! Named database handles.

use crate::env::EnvInner;
use crate::error::{EngineError, EngineResult};
use crate::txn::Transaction;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A handle to one named database within an [`crate::Environment`].
///
/// All operations take an optional [`Transaction`]. With `Some(txn)`,
/// writes are buffered in the transaction and reads see the transaction's
/// own buffered writes first. With `None`, writes apply immediately
/// (autocommit) and reads see committed state only.
///
/// The handle is closed exactly once by its owner via [`close`]; any use
/// afterwards fails with [`EngineError::DatabaseClosed`].
///
/// [`close`]: Database::close
pub struct Database {
    name: String,
    env: Arc<EnvInner>,
    open: bool,
}

impl Database {
    pub(crate) fn new(name: String, env: Arc<EnvInner>) -> Self {
        Self {
            name,
            env,
            open: true,
        }
    }

    /// Returns the database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this handle has not been closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open && self.env.ensure_open().is_ok()
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if !self.open {
            return Err(EngineError::DatabaseClosed {
                name: self.name.clone(),
            });
        }
        self.env.ensure_open()
    }

    fn ensure_usable(&self, txn: Option<&Transaction>) -> EngineResult<()> {
        self.ensure_open()?;
        if let Some(txn) = txn {
            if !txn.is_active() {
                return Err(EngineError::TransactionFinished);
            }
        }
        Ok(())
    }

    /// Reads the value for `key`.
    ///
    /// # Errors
    ///
    /// Fails if the handle or environment is closed, or if `txn` has
    /// already finished.
    pub fn get(&self, key: &[u8], txn: Option<&Transaction>) -> EngineResult<Option<Vec<u8>>> {
        self.ensure_usable(txn)?;
        if let Some(txn) = txn {
            if let Some(pending) = txn.pending(&self.name, key) {
                return Ok(pending);
            }
        }
        let tables = self.env.tables.read();
        Ok(tables
            .get(&self.name)
            .and_then(|table| table.get(key).cloned()))
    }

    /// Writes `value` under `key`.
    ///
    /// # Errors
    ///
    /// Fails if the handle or environment is closed, if `txn` has already
    /// finished, or if the test harness injected a fault.
    pub fn put(&self, key: &[u8], value: &[u8], txn: Option<&Transaction>) -> EngineResult<()> {
        self.ensure_usable(txn)?;
        self.env.check_put_fault()?;
        match txn {
            Some(txn) => txn.record_write(&self.name, key.to_vec(), Some(value.to_vec())),
            None => {
                let mut tables = self.env.tables.write();
                tables
                    .entry(self.name.clone())
                    .or_default()
                    .insert(key.to_vec(), value.to_vec());
                Ok(())
            }
        }
    }

    /// Deletes `key`. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Fails if the handle or environment is closed, or if `txn` has
    /// already finished.
    pub fn delete(&self, key: &[u8], txn: Option<&Transaction>) -> EngineResult<()> {
        self.ensure_usable(txn)?;
        match txn {
            Some(txn) => txn.record_write(&self.name, key.to_vec(), None),
            None => {
                let mut tables = self.env.tables.write();
                if let Some(table) = tables.get_mut(&self.name) {
                    table.remove(key);
                }
                Ok(())
            }
        }
    }

    /// Enumerates all keys, in key order.
    ///
    /// With `Some(txn)`, the transaction's buffered inserts and deletes
    /// are merged over committed state.
    ///
    /// # Errors
    ///
    /// Fails if the handle or environment is closed, or if `txn` has
    /// already finished.
    pub fn keys(&self, txn: Option<&Transaction>) -> EngineResult<Vec<Vec<u8>>> {
        self.ensure_usable(txn)?;
        let tables = self.env.tables.read();
        let mut keys: BTreeSet<Vec<u8>> = tables
            .get(&self.name)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default();
        drop(tables);

        if let Some(txn) = txn {
            for (key, value) in txn.pending_for(&self.name) {
                match value {
                    Some(_) => {
                        keys.insert(key);
                    }
                    None => {
                        keys.remove(&key);
                    }
                }
            }
        }
        Ok(keys.into_iter().collect())
    }

    /// Closes this handle. Idempotent.
    pub fn close(&mut self) {
        self.open = false;
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("open", &self.open)
            .finish()
    }
}
