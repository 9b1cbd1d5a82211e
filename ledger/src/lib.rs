//! Block-lattice ledger.
//!
//! Every account owns a chain of blocks. The ledger classifies candidate
//! blocks into a [`ProcessOutcome`], writes the accepted ones through a
//! [`lattice_store::WriteTransaction`], and can roll chains back.

pub mod block;
mod block_validator;
pub mod builder;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod outcome;
mod rollback;
pub mod sideband;

pub use block::{Block, ChangeBlock, OpenBlock, ReceiveBlock, SendBlock, StateBlock};
pub use builder::BlockBuilder;
pub use constants::{dev_genesis_key, Epochs, LedgerConstants};
pub use error::LedgerError;
pub use ledger::Ledger;
pub use outcome::{ProcessOutcome, SignatureVerification};
pub use sideband::{BlockSideband, SavedBlock};
