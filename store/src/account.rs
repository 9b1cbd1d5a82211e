//! Per-account ledger state.

use lattice_types::{Account, Amount, BlockHash, Epoch, Timestamp};
use serde::{Deserialize, Serialize};

/// The frontier record kept for every opened account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Hash of the latest block in this account's chain.
    pub head: BlockHash,
    /// Hash of the first block in this account's chain.
    pub open_block: BlockHash,
    pub representative: Account,
    pub balance: Amount,
    /// Number of blocks in this account's chain.
    pub block_count: u64,
    pub epoch: Epoch,
    /// When `head` last changed.
    pub modified: Timestamp,
}
