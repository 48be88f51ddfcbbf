//! Block-key encoding.
//!
//! A block record is keyed by `(file name, block sequence number)`. The
//! encoding is a `u16` big-endian name length, the UTF-8 name bytes, and a
//! `u32` big-endian sequence number. The length prefix keeps keys
//! unambiguous when one file name is a prefix of another, and big-endian
//! sequence numbers keep a file's blocks contiguous in key order.

/// Encodes the block-store key for block `seq` of file `name`.
///
/// # Panics
///
/// Panics if the name is longer than `u16::MAX` bytes. The directory
/// store rejects such names before any key is built.
#[must_use]
pub fn block_key(name: &str, seq: u32) -> Vec<u8> {
    let bytes = name.as_bytes();
    assert!(
        bytes.len() <= usize::from(u16::MAX),
        "file name longer than u16::MAX bytes"
    );
    let mut key = Vec::with_capacity(2 + bytes.len() + 4);
    key.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    key.extend_from_slice(bytes);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Decodes a block-store key back into `(file name, block sequence)`.
///
/// Returns `None` if the key is malformed.
#[must_use]
pub fn decode_block_key(key: &[u8]) -> Option<(String, u32)> {
    if key.len() < 6 {
        return None;
    }
    let name_len = usize::from(u16::from_be_bytes([key[0], key[1]]));
    if key.len() != 2 + name_len + 4 {
        return None;
    }
    let name = std::str::from_utf8(&key[2..2 + name_len]).ok()?;
    let seq = u32::from_be_bytes([
        key[2 + name_len],
        key[2 + name_len + 1],
        key[2 + name_len + 2],
        key[2 + name_len + 3],
    ]);
    Some((name.to_string(), seq))
}
