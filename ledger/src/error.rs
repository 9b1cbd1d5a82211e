use lattice_types::{Account, BlockHash};
use thiserror::Error;

/// Failures of the ledger itself. A rejected block is not an error; it is a
/// [`crate::ProcessOutcome`].
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("block {0} not found")]
    BlockNotFound(BlockHash),

    #[error("account {0} not found")]
    AccountNotFound(Account),

    #[error("the genesis block cannot be rolled back")]
    GenesisRollback,

    #[error("ledger is inconsistent: {0}")]
    Inconsistent(String),

    #[error("block encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("storage error: {0}")]
    Storage(#[from] lattice_store::StoreError),
}
