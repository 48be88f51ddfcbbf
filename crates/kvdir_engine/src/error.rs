//! Error types for engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur inside the key-value engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The environment has been closed.
    #[error("environment is closed")]
    EnvironmentClosed,

    /// The database handle has been closed.
    #[error("database is closed: {name}")]
    DatabaseClosed {
        /// Name of the closed database.
        name: String,
    },

    /// The database does not exist and creation was not requested.
    #[error("database not found: {name}")]
    DatabaseNotFound {
        /// Name of the missing database.
        name: String,
    },

    /// The transaction has already been committed or aborted.
    #[error("transaction is no longer active")]
    TransactionFinished,

    /// A fault injected by the test harness.
    #[error("injected fault during {op}")]
    InjectedFault {
        /// The operation that was failed.
        op: &'static str,
    },
}
