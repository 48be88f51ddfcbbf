//! Transaction coordination for a directory store handle.

use crate::error::DirResult;
use kvdir_engine::{Environment, Transaction, TransactionConfig};
use tracing::warn;

/// Who owns the active transaction.
///
/// Ownership decides who is responsible for finishing the transaction:
/// an `Auto` transaction was begun implicitly by a directory operation and
/// is finished by that operation (or by the output channel it created); a
/// `Caller` transaction is finished only by an explicit commit or abort
/// from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnOwnership {
    /// Begun implicitly by an operation that found none active.
    Auto,
    /// Begun explicitly by the caller.
    Caller,
}

struct ActiveTxn {
    txn: Transaction,
    ownership: TxnOwnership,
}

/// Enforces the single-active-transaction discipline for one directory
/// store handle.
///
/// The underlying engine does not support overlapping transactions on one
/// handle, so every code path that needs a transaction goes through this
/// coordinator. At most one transaction is live at a time; beginning a new
/// one while another is active aborts the stale one first, with a
/// diagnostic, rather than leaking it.
pub struct TransactionCoordinator {
    env: Environment,
    active: Option<ActiveTxn>,
    /// Stale transactions aborted on `begin` or on directory close.
    /// Non-fatal, but a signal of a caller bug; tests assert on it.
    stale_aborts: u64,
}

impl TransactionCoordinator {
    /// Creates a coordinator over the given environment.
    #[must_use]
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            active: None,
            stale_aborts: 0,
        }
    }

    /// Begins a new transaction with default configuration.
    ///
    /// If a transaction is already active it is aborted first (see
    /// [`abort_stale`](Self::abort_stale)).
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot start a transaction.
    pub fn begin(&mut self, ownership: TxnOwnership) -> DirResult<Transaction> {
        self.begin_with(ownership, &TransactionConfig::default())
    }

    /// Begins a new transaction with the given engine configuration.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot start a transaction.
    pub fn begin_with(
        &mut self,
        ownership: TxnOwnership,
        config: &TransactionConfig,
    ) -> DirResult<Transaction> {
        self.abort_stale();
        let txn = self.env.begin_transaction(config)?;
        self.active = Some(ActiveTxn {
            txn: txn.clone(),
            ownership,
        });
        Ok(txn)
    }

    /// Aborts any still-active transaction, best effort.
    ///
    /// Returns true if a stale transaction was found. The abort itself is
    /// logged on failure rather than surfaced: cleanup of an abandoned
    /// transaction must not fail the operation that noticed it.
    pub fn abort_stale(&mut self) -> bool {
        let Some(stale) = self.active.take() else {
            return false;
        };
        if !stale.txn.is_active() {
            // Already finished through a cloned handle; nothing to abort.
            return false;
        }
        warn!(
            id = stale.txn.id(),
            ownership = ?stale.ownership,
            "aborting stale open transaction"
        );
        self.stale_aborts += 1;
        if let Err(err) = stale.txn.abort() {
            warn!(id = stale.txn.id(), error = %err, "stale transaction abort failed");
        }
        true
    }

    /// Commits the active transaction. No-op if none is active.
    ///
    /// The active slot is cleared even when the engine commit fails: a
    /// failed commit must not leave the coordinator believing a
    /// transaction is still open.
    ///
    /// # Errors
    ///
    /// Fails if the engine commit fails.
    pub fn commit(&mut self) -> DirResult<()> {
        match self.active.take() {
            Some(active) if active.txn.is_active() => {
                active.txn.commit()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Aborts the active transaction. No-op if none is active.
    ///
    /// Symmetric to [`commit`](Self::commit): the active slot is cleared
    /// even when the engine abort fails.
    ///
    /// # Errors
    ///
    /// Fails if the engine abort fails.
    pub fn abort(&mut self) -> DirResult<()> {
        match self.active.take() {
            Some(active) if active.txn.is_active() => {
                active.txn.abort()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Returns true if a transaction is active. Pure query.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.txn.is_active())
    }

    /// Returns the active transaction, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Transaction> {
        self.active
            .as_ref()
            .filter(|active| active.txn.is_active())
            .map(|active| &active.txn)
    }

    /// Returns the ownership of the active transaction, if any.
    #[must_use]
    pub fn ownership(&self) -> Option<TxnOwnership> {
        self.active
            .as_ref()
            .filter(|active| active.txn.is_active())
            .map(|active| active.ownership)
    }

    /// Returns the active transaction, beginning one with the given
    /// ownership if none is active. Also returns the ownership actually
    /// in effect.
    ///
    /// # Errors
    ///
    /// Fails if a transaction must be begun and the engine cannot start
    /// one.
    pub fn current_or_begin(
        &mut self,
        ownership: TxnOwnership,
    ) -> DirResult<(Transaction, TxnOwnership)> {
        if let Some(active) = self.active.as_ref().filter(|a| a.txn.is_active()) {
            return Ok((active.txn.clone(), active.ownership));
        }
        let txn = self.begin(ownership)?;
        Ok((txn, ownership))
    }

    /// Number of stale transactions aborted by this coordinator.
    #[must_use]
    pub fn stale_abort_count(&self) -> u64 {
        self.stale_aborts
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("active", &self.is_active())
            .field("stale_aborts", &self.stale_aborts)
            .finish_non_exhaustive()
    }
}
