//! Ledger-derived metadata stored next to each block.

use lattice_types::{Account, Amount, BlockHash, Epoch, Timestamp};
use serde::{Deserialize, Serialize};

use crate::{Block, LedgerError};

/// Facts about a block that follow from where it sits in the ledger rather
/// than from its own fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSideband {
    pub account: Account,
    /// 1 for the open block.
    pub height: u64,
    /// Next block in the chain, zero while this block is the head.
    pub successor: BlockHash,
    /// Account balance after this block.
    pub balance: Amount,
    /// Account epoch after this block.
    pub epoch: Epoch,
    pub timestamp: Timestamp,
}

/// A block as persisted by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedBlock {
    pub block: Block,
    pub sideband: BlockSideband,
}

impl SavedBlock {
    pub fn hash(&self) -> BlockHash {
        self.block.hash()
    }

    pub fn account(&self) -> Account {
        self.sideband.account
    }

    pub fn balance(&self) -> Amount {
        self.sideband.balance
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(bincode::serialize(self)?)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, LedgerError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
