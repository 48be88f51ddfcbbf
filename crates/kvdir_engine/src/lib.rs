//! # kvdir engine
//!
//! Embedded ordered transactional key-value engine for kvdir.
//!
//! The engine stores named databases of ordered byte keys and values and
//! provides ACID transactions over them:
//!
//! - **Atomicity**: a commit applies every buffered write in one step
//! - **Isolation**: readers never observe uncommitted writes
//! - **Transaction handles** are cheap to clone and finish exactly once
//!
//! Higher layers (the kvdir directory store) treat this crate purely as a
//! collaborator: open databases, begin transactions, get/put/delete.
//!
//! ## Example
//!
//! ```rust
//! use kvdir_engine::{DatabaseConfig, Environment, TransactionConfig};
//!
//! let env = Environment::new();
//! let db = env.open_database("files", &DatabaseConfig::default()).unwrap();
//!
//! let txn = env.begin_transaction(&TransactionConfig::default()).unwrap();
//! db.put(b"name", b"payload", Some(&txn)).unwrap();
//! txn.commit().unwrap();
//!
//! assert_eq!(db.get(b"name", None).unwrap(), Some(b"payload".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod env;
mod error;
mod txn;

pub use config::{DatabaseConfig, TransactionConfig};
pub use database::Database;
pub use env::Environment;
pub use error::{EngineError, EngineResult};
pub use txn::Transaction;
