//! Directory configuration.

use crate::txn::TxnOwnership;

/// Default block size for file content: 16 KiB.
pub const DEFAULT_BLOCK_SIZE: u32 = 16 * 1024;

/// When an output channel's `close` commits the transaction it was
/// created under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCommitPolicy {
    /// Commit only when the transaction was begun implicitly by
    /// `create_output` itself. A caller-managed transaction is left open
    /// for the caller to commit or abort, so multi-file atomic batches
    /// work as expected.
    #[default]
    OwnedTransaction,

    /// Commit on every output-channel close, even under a caller-managed
    /// transaction. This reproduces the behaviour of directories where
    /// closing an output is unconditionally the durability point.
    Always,
}

impl OutputCommitPolicy {
    /// Whether a channel under a transaction with the given ownership
    /// commits on close.
    pub(crate) fn commits(self, ownership: TxnOwnership) -> bool {
        match self {
            Self::OwnedTransaction => ownership == TxnOwnership::Auto,
            Self::Always => true,
        }
    }
}

/// Configuration for opening a directory store.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Block size in bytes for file content. Must be non-zero.
    pub block_size: u32,

    /// Commit behaviour of output-channel close.
    pub commit_policy: OutputCommitPolicy,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            commit_policy: OutputCommitPolicy::default(),
        }
    }
}

impl DirectoryConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the block size.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[must_use]
    pub fn block_size(mut self, size: u32) -> Self {
        assert!(size > 0, "block size must be non-zero");
        self.block_size = size;
        self
    }

    /// Sets the output-channel commit policy.
    #[must_use]
    pub const fn commit_policy(mut self, policy: OutputCommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }
}
