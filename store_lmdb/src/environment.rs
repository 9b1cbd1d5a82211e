//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvFlags, EnvOpenOptions};
use lattice_store::{LedgerStore, StoreError, Transaction, WriteTransaction};

use crate::transaction::{LmdbReadTxn, LmdbWriteTxn};
use crate::LmdbError;

/// Named databases inside the environment.
pub(crate) const BLOCKS_DB: &str = "blocks";
pub(crate) const ACCOUNTS_DB: &str = "accounts";
pub(crate) const PENDING_DB: &str = "pending";

const MAX_DBS: u32 = 8;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Env,
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    pub(crate) accounts_db: Database<Bytes, Bytes>,
    pub(crate) pending_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given directory.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per directory by this process
        // and the memory map is never accessed outside heed's API. NO_TLS lets
        // one thread hold a read transaction alongside the writer.
        let env = unsafe {
            let mut options = EnvOpenOptions::new();
            options.map_size(map_size).max_dbs(MAX_DBS);
            options.flags(EnvFlags::NO_TLS);
            options.open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let blocks_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(BLOCKS_DB))?;
        let accounts_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(ACCOUNTS_DB))?;
        let pending_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(PENDING_DB))?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env,
            blocks_db,
            accounts_db,
            pending_db,
        })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }
}

impl LedgerStore for LmdbEnvironment {
    fn tx_begin_read(&self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        let txn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(Box::new(LmdbReadTxn::new(self, txn)))
    }

    fn tx_begin_write(&self) -> Result<Box<dyn WriteTransaction + '_>, StoreError> {
        let txn = self.env.write_txn().map_err(LmdbError::from)?;
        Ok(Box::new(LmdbWriteTxn::new(self, txn)))
    }
}
