//! The directory store: a file abstraction over the key-value engine.

use crate::config::DirectoryConfig;
use crate::error::{DirError, DirResult};
use crate::input::FileInputChannel;
use crate::keys::block_key;
use crate::output::FileOutputChannel;
use crate::record::FileRecord;
use crate::txn::{TransactionCoordinator, TxnOwnership};
use kvdir_engine::{Database, DatabaseConfig, Environment, Transaction};
use tracing::warn;

/// Name of the index store (file name -> file record).
pub const INDEX_DB: &str = "__index__";
/// Name of the block store ((file name, block seq) -> bytes).
pub const BLOCKS_DB: &str = "__blocks__";

/// A transactional virtual directory.
///
/// `DirectoryStore` presents named byte-stream files over two databases
/// of the underlying engine: an index store of file records and a block
/// store of fixed-size content chunks. Multi-step operations run under a
/// single transaction managed by the store's [`TransactionCoordinator`],
/// so a file's record and blocks appear or disappear atomically.
///
/// Operations that find no transaction active begin one implicitly and
/// finish it themselves; a transaction begun with
/// [`begin_txn`](Self::begin_txn) is the caller's to commit or abort.
///
/// The environment is handed in and never closed by this store; the two
/// database handles it opens are closed exactly once, on
/// [`close`](Self::close).
///
/// # Thread Safety
///
/// One `DirectoryStore` is a single-threaded handle: the current
/// transaction is not synchronized. Open independent stores over the same
/// environment for concurrent use and let the engine arbitrate.
///
/// # Example
///
/// ```rust
/// use kvdir_core::{DirectoryConfig, DirectoryStore};
/// use kvdir_engine::Environment;
///
/// let env = Environment::new();
/// let mut dir = DirectoryStore::open(&env, DirectoryConfig::default()).unwrap();
///
/// let mut out = dir.create_output("greeting").unwrap();
/// out.write_bytes(b"hello").unwrap();
/// out.close().unwrap();
///
/// let mut input = dir.open_input("greeting").unwrap();
/// let mut buf = [0u8; 5];
/// input.read_bytes(&mut buf).unwrap();
/// assert_eq!(&buf, b"hello");
/// ```
pub struct DirectoryStore {
    index: Database,
    blocks: Database,
    coordinator: TransactionCoordinator,
    config: DirectoryConfig,
    closed: bool,
}

impl DirectoryStore {
    /// Opens a directory store over the given environment.
    ///
    /// Creates the index and block databases if they don't exist.
    ///
    /// # Errors
    ///
    /// Fails with a storage engine error if the databases cannot be
    /// opened.
    pub fn open(env: &Environment, config: DirectoryConfig) -> DirResult<Self> {
        let db_config = DatabaseConfig::default();
        let index = env.open_database(INDEX_DB, &db_config)?;
        let blocks = env.open_database(BLOCKS_DB, &db_config)?;
        Ok(Self {
            index,
            blocks,
            coordinator: TransactionCoordinator::new(env.clone()),
            config,
            closed: false,
        })
    }

    fn ensure_open(&self) -> DirResult<()> {
        if self.closed {
            Err(DirError::Closed)
        } else {
            Ok(())
        }
    }

    /// Begins a caller-managed transaction.
    ///
    /// Until the caller ends it with [`commit_txn`](Self::commit_txn) or
    /// [`abort_txn`](Self::abort_txn), every create and delete runs
    /// inside it and nothing becomes visible. A still-active transaction
    /// is aborted first, with a diagnostic.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or the engine cannot start a
    /// transaction.
    pub fn begin_txn(&mut self) -> DirResult<()> {
        self.ensure_open()?;
        self.coordinator.begin(TxnOwnership::Caller)?;
        Ok(())
    }

    /// Commits the caller-managed transaction. No-op if none is active.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or the engine commit fails.
    pub fn commit_txn(&mut self) -> DirResult<()> {
        self.ensure_open()?;
        self.coordinator.commit()
    }

    /// Aborts the caller-managed transaction. No-op if none is active.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or the engine abort fails.
    pub fn abort_txn(&mut self) -> DirResult<()> {
        self.ensure_open()?;
        self.coordinator.abort()
    }

    /// Returns true if a transaction is active on this handle.
    #[must_use]
    pub fn txn_active(&self) -> bool {
        !self.closed && self.coordinator.is_active()
    }

    /// Number of stale transactions this handle has had to abort (on
    /// `begin_txn`, implicit begin, or close). Non-zero usually signals a
    /// caller forgetting to finish a transaction.
    #[must_use]
    pub fn stale_transaction_aborts(&self) -> u64 {
        self.coordinator.stale_abort_count()
    }

    /// Creates a file and returns the output channel that will write it.
    ///
    /// If no transaction is active, one is begun implicitly and the
    /// returned channel commits it on close, so a caller that never
    /// manages transactions still gets an atomic create. Nothing is
    /// written until the channel flushes.
    ///
    /// If a file with the same name already exists, it is replaced
    /// atomically when the channel closes.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed, `name` is too long for the
    /// block-key encoding, the engine cannot start a transaction, or an
    /// existing record under `name` is unreadable.
    pub fn create_output(&mut self, name: &str) -> DirResult<FileOutputChannel<'_>> {
        self.ensure_open()?;
        if name.len() > usize::from(u16::MAX) {
            return Err(DirError::NameTooLong {
                length: name.len(),
                limit: usize::from(u16::MAX),
            });
        }
        let (txn, ownership) = self.coordinator.current_or_begin(TxnOwnership::Auto)?;
        let commit_on_close = self.config.commit_policy.commits(ownership);

        // A recreate must leave no blocks of the old content behind; the
        // channel deletes old blocks past the new count at close time,
        // inside the same transaction as the record replacement.
        let stale_blocks = match self.index.get(name.as_bytes(), Some(&txn))? {
            Some(raw) => {
                FileRecord::decode(&raw)
                    .ok_or_else(|| DirError::corruption(name, "unreadable file record"))?
                    .block_count
            }
            None => 0,
        };

        Ok(FileOutputChannel::new(
            name.to_string(),
            &self.index,
            &self.blocks,
            &mut self.coordinator,
            txn,
            self.config.block_size,
            stale_blocks,
            commit_on_close,
        ))
    }

    /// Opens a file for reading.
    ///
    /// The returned channel snapshots the file's metadata at this call;
    /// it needs no write transaction and sees committed state.
    ///
    /// # Errors
    ///
    /// Fails with [`DirError::FileNotFound`] if no record exists for
    /// `name`, or [`DirError::Corruption`] if the record is unreadable or
    /// internally inconsistent.
    pub fn open_input(&self, name: &str) -> DirResult<FileInputChannel<'_>> {
        self.ensure_open()?;
        let raw = self
            .index
            .get(name.as_bytes(), None)?
            .ok_or_else(|| DirError::file_not_found(name))?;
        let record = FileRecord::decode(&raw)
            .ok_or_else(|| DirError::corruption(name, "unreadable file record"))?;
        if !record.is_consistent() {
            return Err(DirError::corruption(
                name,
                format!(
                    "record declares {} blocks for length {} at block size {}",
                    record.block_count, record.length, record.block_size
                ),
            ));
        }
        Ok(FileInputChannel::new(name.to_string(), &self.blocks, record))
    }

    /// Deletes a file. Deleting a name with no file is a no-op.
    ///
    /// With no transaction active, the whole delete is one atomic unit:
    /// begin, delete, commit (or abort on failure). Under a
    /// caller-managed transaction the delete is performed within it and
    /// the commit is left to the caller.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or the engine rejects an operation.
    pub fn delete_file(&mut self, name: &str) -> DirResult<()> {
        self.ensure_open()?;
        match self.coordinator.current().cloned() {
            Some(txn) => delete_file_records(&self.index, &self.blocks, &txn, name),
            None => {
                let txn = self.coordinator.begin(TxnOwnership::Auto)?;
                match delete_file_records(&self.index, &self.blocks, &txn, name) {
                    Ok(()) => self.coordinator.commit(),
                    Err(err) => {
                        if let Err(abort_err) = self.coordinator.abort() {
                            warn!(file = %name, error = %abort_err, "abort after failed delete also failed");
                        }
                        Err(err)
                    }
                }
            }
        }
    }

    /// Lists the names of all committed files.
    ///
    /// Reflects committed state at call time; writes pending in an active
    /// transaction are not included. No ordering is guaranteed beyond the
    /// engine's key order.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or an index key is not valid UTF-8.
    pub fn list_files(&self) -> DirResult<Vec<String>> {
        self.ensure_open()?;
        self.index
            .keys(None)?
            .into_iter()
            .map(|key| {
                String::from_utf8(key)
                    .map_err(|_| DirError::corruption(INDEX_DB, "non-UTF-8 file name in index"))
            })
            .collect()
    }

    /// Returns true if the environment and both store handles are open.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        !self.closed && self.index.is_open() && self.blocks.is_open()
    }

    /// Closes the directory store. Idempotent.
    ///
    /// A still-open transaction signals a bug or crash path, so it is
    /// aborted - never committed on the caller's behalf - with a
    /// diagnostic. The abort is best effort and cannot fail the close.
    /// Both store handles are then closed; the environment is left to its
    /// owner.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.coordinator.is_active() {
            warn!("closing directory store with an open transaction; aborting it");
            self.coordinator.abort_stale();
        }
        self.index.close();
        self.blocks.close();
        self.closed = true;
    }
}

impl Drop for DirectoryStore {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DirectoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryStore")
            .field("closed", &self.closed)
            .field("txn_active", &self.coordinator.is_active())
            .field("block_size", &self.config.block_size)
            .finish_non_exhaustive()
    }
}

/// Removes the file record and every block record for `name` within
/// `txn`, using the record's own block count rather than a scan.
///
/// Deleting a name with no file record is a no-op.
///
/// # Errors
///
/// Fails with [`DirError::Corruption`] if the record exists but cannot be
/// decoded, or with a storage engine error.
pub fn delete_file_records(
    index: &Database,
    blocks: &Database,
    txn: &Transaction,
    name: &str,
) -> DirResult<()> {
    let Some(raw) = index.get(name.as_bytes(), Some(txn))? else {
        return Ok(());
    };
    let record = FileRecord::decode(&raw)
        .ok_or_else(|| DirError::corruption(name, "unreadable file record"))?;
    index.delete(name.as_bytes(), Some(txn))?;
    for seq in 0..record.block_count {
        blocks.delete(&block_key(name, seq), Some(txn))?;
    }
    Ok(())
}
