//! File output channels.

use crate::error::DirResult;
use crate::keys::block_key;
use crate::record::FileRecord;
use crate::txn::TransactionCoordinator;
use kvdir_engine::{Database, Transaction};
use tracing::warn;

/// A byte-stream sink that writes one logical file.
///
/// Bytes are buffered in memory and flushed to the block store one full
/// block at a time, so the engine sees one put per block rather than one
/// per byte. [`close`](Self::close) flushes the partial final block,
/// writes the file record, and - when the channel owns its transaction -
/// commits, making the file durable and visible in one step.
///
/// All writes go through the transaction the channel was created under;
/// nothing is visible to other readers before that transaction commits.
///
/// Dropping a channel without closing it logs a diagnostic and, when the
/// channel owns its transaction, aborts it - flushed blocks with no file
/// record must never reach a committed state.
pub struct FileOutputChannel<'d> {
    name: String,
    index: &'d Database,
    blocks: &'d Database,
    coordinator: &'d mut TransactionCoordinator,
    txn: Transaction,
    block_size: u32,
    buffer: Vec<u8>,
    next_block: u32,
    length: u64,
    /// Block count of a pre-existing file under the same name; blocks
    /// past the new count are deleted on close so a recreate leaves no
    /// stale content.
    stale_blocks: u32,
    commit_on_close: bool,
    closed: bool,
}

impl<'d> FileOutputChannel<'d> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        index: &'d Database,
        blocks: &'d Database,
        coordinator: &'d mut TransactionCoordinator,
        txn: Transaction,
        block_size: u32,
        stale_blocks: u32,
        commit_on_close: bool,
    ) -> Self {
        Self {
            name,
            index,
            blocks,
            coordinator,
            txn,
            block_size,
            buffer: Vec::with_capacity(block_size as usize),
            next_block: 0,
            length: 0,
            stale_blocks,
            commit_on_close,
            closed: false,
        }
    }

    /// Returns the file name this channel writes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Appends one byte.
    ///
    /// # Errors
    ///
    /// Fails with a storage engine error if a full buffer cannot be
    /// flushed to the block store.
    pub fn write_byte(&mut self, byte: u8) -> DirResult<()> {
        self.buffer.push(byte);
        self.length += 1;
        if self.buffer.len() == self.block_size as usize {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Appends a slice of bytes.
    ///
    /// # Errors
    ///
    /// Fails with a storage engine error if a full buffer cannot be
    /// flushed to the block store.
    pub fn write_bytes(&mut self, mut buf: &[u8]) -> DirResult<()> {
        while !buf.is_empty() {
            let room = self.block_size as usize - self.buffer.len();
            let take = room.min(buf.len());
            self.buffer.extend_from_slice(&buf[..take]);
            self.length += take as u64;
            buf = &buf[take..];
            if self.buffer.len() == self.block_size as usize {
                self.flush_block()?;
            }
        }
        Ok(())
    }

    fn flush_block(&mut self) -> DirResult<()> {
        let key = block_key(&self.name, self.next_block);
        self.blocks.put(&key, &self.buffer, Some(&self.txn))?;
        self.next_block += 1;
        self.buffer.clear();
        Ok(())
    }

    /// Finishes the file: flushes the partial final block, writes the
    /// file record, deletes any leftover blocks of an older file with the
    /// same name, and commits the owning transaction if this channel is
    /// responsible for it.
    ///
    /// # Errors
    ///
    /// Fails with a storage engine error if any write or the commit
    /// fails. The channel does not abort on failure - the transaction is
    /// left for the caller to abort.
    pub fn close(mut self) -> DirResult<()> {
        self.closed = true;
        if !self.buffer.is_empty() {
            self.flush_block()?;
        }
        let record = FileRecord {
            length: self.length,
            block_size: self.block_size,
            block_count: self.next_block,
        };
        self.index
            .put(self.name.as_bytes(), &record.encode(), Some(&self.txn))?;
        for seq in self.next_block..self.stale_blocks {
            self.blocks
                .delete(&block_key(&self.name, seq), Some(&self.txn))?;
        }
        if self.commit_on_close {
            self.coordinator.commit()?;
        }
        Ok(())
    }
}

impl Drop for FileOutputChannel<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(
            file = %self.name,
            bytes = self.length,
            "output channel dropped without close; file was not recorded"
        );
        if self.commit_on_close {
            // This channel owned its transaction. Any blocks it flushed
            // have no file record; the transaction must not survive for a
            // later operation to commit.
            self.coordinator.abort_stale();
        }
    }
}

impl std::fmt::Debug for FileOutputChannel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileOutputChannel")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("next_block", &self.next_block)
            .finish_non_exhaustive()
    }
}
