//! Transactional storage contract for the lattice ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits. Writes happen
//! inside a [`WriteTransaction`]; dropping one without calling
//! [`WriteTransaction::commit`] discards every change it made.

pub mod account;
pub mod error;
pub mod pending;
pub mod transaction;

pub use account::AccountInfo;
pub use error::StoreError;
pub use pending::{PendingInfo, PendingKey};
pub use transaction::{LedgerStore, Transaction, WriteTransaction};
