//! File input channels.

use crate::error::{DirError, DirResult};
use crate::keys::block_key;
use crate::record::FileRecord;
use kvdir_engine::Database;

struct CachedBlock {
    seq: u32,
    data: Vec<u8>,
}

/// A byte-stream source that reads one logical file.
///
/// The file's metadata is captured once when the channel is opened, so a
/// concurrent rewrite of the same name does not change this channel's
/// view of length or end-of-file. Blocks are fetched on demand as the
/// cursor crosses block boundaries; reads hold no write transaction.
pub struct FileInputChannel<'d> {
    name: String,
    blocks: &'d Database,
    length: u64,
    block_size: u32,
    block_count: u32,
    position: u64,
    current: Option<CachedBlock>,
}

impl<'d> FileInputChannel<'d> {
    pub(crate) fn new(name: String, blocks: &'d Database, record: FileRecord) -> Self {
        Self {
            name,
            blocks,
            length: record.length,
            block_size: record.block_size,
            block_count: record.block_count,
            position: 0,
            current: None,
        }
    }

    /// Returns the file name this channel reads.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the file length captured when the channel was opened.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Returns the current cursor position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Moves the cursor to `position`.
    ///
    /// Seeking past the recorded length is allowed; the next read fails
    /// with [`DirError::EndOfFile`].
    pub fn seek(&mut self, position: u64) {
        self.position = position;
    }

    /// Reads one byte and advances the cursor.
    ///
    /// # Errors
    ///
    /// Fails with [`DirError::EndOfFile`] at or past the recorded length,
    /// or [`DirError::Corruption`] if a block under the recorded
    /// `block_count` is missing or mis-sized.
    pub fn read_byte(&mut self) -> DirResult<u8> {
        if self.position >= self.length {
            return Err(self.end_of_file());
        }
        let mut byte = [0u8; 1];
        self.read_chunk(&mut byte)?;
        Ok(byte[0])
    }

    /// Fills `buf` completely, advancing the cursor. A zero-length read
    /// succeeds at any cursor position.
    ///
    /// # Errors
    ///
    /// Fails with [`DirError::EndOfFile`] if fewer than `buf.len()` bytes
    /// remain before the recorded length, or [`DirError::Corruption`] if
    /// a block under the recorded `block_count` is missing or mis-sized.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> DirResult<()> {
        if buf.is_empty() {
            return Ok(());
        }
        match self.position.checked_add(buf.len() as u64) {
            Some(end) if end <= self.length => {}
            _ => return Err(self.end_of_file()),
        }
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.read_chunk(&mut buf[filled..])?;
        }
        Ok(())
    }

    /// Closes the channel, releasing the cached block buffer.
    pub fn close(mut self) {
        self.current = None;
    }

    /// Copies as many bytes as the current block offers into `buf`.
    /// Precondition: `self.position < self.length`.
    fn read_chunk(&mut self, buf: &mut [u8]) -> DirResult<usize> {
        let seq = (self.position / u64::from(self.block_size)) as u32;
        if self.current.as_ref().map(|block| block.seq) != Some(seq) {
            let data = self.fetch_block(seq)?;
            self.current = Some(CachedBlock { seq, data });
        }
        let offset = (self.position % u64::from(self.block_size)) as usize;
        let take = match &self.current {
            Some(block) => {
                let available = block.data.len().saturating_sub(offset);
                let take = available.min(buf.len());
                buf[..take].copy_from_slice(&block.data[offset..offset + take]);
                take
            }
            None => 0,
        };
        self.position += take as u64;
        Ok(take)
    }

    fn fetch_block(&self, seq: u32) -> DirResult<Vec<u8>> {
        if seq >= self.block_count {
            return Err(DirError::corruption(
                self.name.as_str(),
                format!(
                    "cursor reached block {seq} but record declares {} blocks",
                    self.block_count
                ),
            ));
        }
        let key = block_key(&self.name, seq);
        let data = self.blocks.get(&key, None)?.ok_or_else(|| {
            DirError::corruption(
                self.name.as_str(),
                format!("block {seq} missing; record declares {} blocks", self.block_count),
            )
        })?;

        let expected = if u64::from(seq) + 1 < u64::from(self.block_count) {
            u64::from(self.block_size)
        } else {
            self.length - u64::from(seq) * u64::from(self.block_size)
        };
        if data.len() as u64 != expected {
            return Err(DirError::corruption(
                self.name.as_str(),
                format!("block {seq} has {} bytes, expected {expected}", data.len()),
            ));
        }
        Ok(data)
    }

    fn end_of_file(&self) -> DirError {
        DirError::EndOfFile {
            name: self.name.clone(),
            position: self.position,
            length: self.length,
        }
    }
}

impl std::fmt::Debug for FileInputChannel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileInputChannel")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}
