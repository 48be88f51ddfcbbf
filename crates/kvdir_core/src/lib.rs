//! # kvdir
//!
//! A transactional virtual directory: named byte-stream files stored in
//! an embedded transactional key-value engine.
//!
//! A logical file is an index record (name -> length, block size, block
//! count) plus an ordered run of block records holding its content in
//! fixed-size chunks. The [`DirectoryStore`] translates file operations
//! into key-value operations under a single transaction per handle, so a
//! file's record and blocks become visible - or disappear - atomically.
//!
//! - [`DirectoryStore`] - create / open / delete / list / close
//! - [`FileOutputChannel`] - buffered block-at-a-time writer
//! - [`FileInputChannel`] - cursor reader over a metadata snapshot
//! - [`TransactionCoordinator`] - single-active-transaction discipline
//!
//! ## Example
//!
//! ```rust
//! use kvdir_core::{DirectoryConfig, DirectoryStore};
//! use kvdir_engine::Environment;
//!
//! let env = Environment::new();
//! let mut dir = DirectoryStore::open(&env, DirectoryConfig::default()).unwrap();
//!
//! let mut out = dir.create_output("data.bin").unwrap();
//! out.write_bytes(&[1, 2, 3]).unwrap();
//! out.close().unwrap();
//!
//! assert_eq!(dir.list_files().unwrap(), vec!["data.bin".to_string()]);
//! dir.delete_file("data.bin").unwrap();
//! assert!(dir.list_files().unwrap().is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod directory;
mod error;
mod input;
mod keys;
mod output;
mod record;
mod txn;

pub use config::{DirectoryConfig, OutputCommitPolicy, DEFAULT_BLOCK_SIZE};
pub use directory::{delete_file_records, DirectoryStore, BLOCKS_DB, INDEX_DB};
pub use error::{DirError, DirResult};
pub use input::FileInputChannel;
pub use keys::{block_key, decode_block_key};
pub use output::FileOutputChannel;
pub use record::{FileRecord, RECORD_LEN};
pub use txn::{TransactionCoordinator, TxnOwnership};
