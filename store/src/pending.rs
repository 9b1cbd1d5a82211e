//! Receivable (pending) entries.

use lattice_types::{Account, Amount, BlockHash, Epoch};
use serde::{Deserialize, Serialize};

/// Identifies a send that the destination has not yet received.
///
/// Ordered by destination first so all entries of one account are adjacent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingKey {
    /// Destination account.
    pub account: Account,
    /// Hash of the send block.
    pub hash: BlockHash,
}

impl PendingKey {
    pub fn new(account: Account, hash: BlockHash) -> Self {
        Self { account, hash }
    }

    /// 64-byte key: destination bytes then send hash bytes.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.account.as_bytes());
        out[32..].copy_from_slice(self.hash.as_bytes());
        out
    }
}

/// Information about a pending incoming transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInfo {
    /// The sending account.
    pub source: Account,
    pub amount: Amount,
    /// Epoch of the send block.
    pub epoch: Epoch,
}
