//! LMDB storage backend for the lattice ledger.
//!
//! Implements the `lattice-store` transaction traits using the `heed` LMDB
//! bindings. Each ledger table maps to one named database within a single
//! environment, and every ledger transaction is one LMDB transaction.

pub mod environment;
pub mod error;
pub mod integrity;
pub mod transaction;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use transaction::{LmdbReadTxn, LmdbWriteTxn};
