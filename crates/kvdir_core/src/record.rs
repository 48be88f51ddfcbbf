//! File records: per-file metadata stored in the index store.

/// Encoded size of a file record in bytes.
pub const RECORD_LEN: usize = 16;

/// Metadata for one logical file, stored in the index store under the
/// file's name.
///
/// A committed file record implies that blocks `0..block_count` exist in
/// the block store, all of `block_size` bytes except possibly the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRecord {
    /// Total file length in bytes.
    pub length: u64,
    /// Block size the file was written with.
    pub block_size: u32,
    /// Number of block records backing the file.
    pub block_count: u32,
}

impl FileRecord {
    /// Returns the number of blocks a file of `length` bytes occupies at
    /// the given block size. Zero for an empty file.
    #[must_use]
    pub fn expected_blocks(length: u64, block_size: u32) -> u32 {
        if length == 0 {
            return 0;
        }
        let blocks = (length - 1) / u64::from(block_size) + 1;
        blocks as u32
    }

    /// Returns true if `block_count` agrees with `length` and `block_size`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.block_size > 0 && self.block_count == Self::expected_blocks(self.length, self.block_size)
    }

    /// Encodes the record as 16 big-endian bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[0..8].copy_from_slice(&self.length.to_be_bytes());
        buf[8..12].copy_from_slice(&self.block_size.to_be_bytes());
        buf[12..16].copy_from_slice(&self.block_count.to_be_bytes());
        buf
    }

    /// Decodes a record from its encoded form.
    ///
    /// Returns `None` if the input is not exactly [`RECORD_LEN`] bytes.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != RECORD_LEN {
            return None;
        }
        let mut length = [0u8; 8];
        length.copy_from_slice(&bytes[0..8]);
        let mut block_size = [0u8; 4];
        block_size.copy_from_slice(&bytes[8..12]);
        let mut block_count = [0u8; 4];
        block_count.copy_from_slice(&bytes[12..16]);
        Some(Self {
            length: u64::from_be_bytes(length),
            block_size: u32::from_be_bytes(block_size),
            block_count: u32::from_be_bytes(block_count),
        })
    }
}
