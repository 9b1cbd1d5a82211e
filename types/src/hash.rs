//! Union-style 32-byte values.
//!
//! Both the unchecked index key and the state block `link` field hold 32 bytes
//! whose meaning (block hash or account) depends on context.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Account, BlockHash};

/// A dependency key: either the hash of a missing block or a missing account.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HashOrAccount([u8; 32]);

impl HashOrAccount {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn as_block_hash(&self) -> BlockHash {
        BlockHash::new(self.0)
    }

    pub fn as_account(&self) -> Account {
        Account::new(self.0)
    }
}

impl From<BlockHash> for HashOrAccount {
    fn from(hash: BlockHash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl From<Account> for HashOrAccount {
    fn from(account: Account) -> Self {
        Self(*account.as_bytes())
    }
}

impl fmt::Debug for HashOrAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashOrAccount({}\u{2026})", hex::encode_upper(&self.0[..4]))
    }
}

impl fmt::Display for HashOrAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

/// The `link` field of a state block.
///
/// - For a send: the destination account
/// - For a receive or open: the hash of the send block being received
/// - For an epoch upgrade: one of the ledger's epoch links
/// - Zero for a pure representative change
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link([u8; 32]);

impl Link {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_account(&self) -> Account {
        Account::new(self.0)
    }

    pub fn as_block_hash(&self) -> BlockHash {
        BlockHash::new(self.0)
    }
}

impl From<Account> for Link {
    fn from(account: Account) -> Self {
        Self(*account.as_bytes())
    }
}

impl From<BlockHash> for Link {
    fn from(hash: BlockHash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Link({}\u{2026})", hex::encode_upper(&self.0[..4]))
    }
}
