//! Ledger transactions over LMDB.
//!
//! Keys are raw 32-byte hashes / accounts, or the 64-byte pending key.
//! Account and pending values are bincode; block values are stored as given.

use heed::{RoTxn, RwTxn};
use lattice_store::{
    AccountInfo, PendingInfo, PendingKey, StoreError, Transaction, WriteTransaction,
};
use lattice_types::{Account, BlockHash};

use crate::{LmdbEnvironment, LmdbError};

// ── Shared table reads ──────────────────────────────────────────────────

fn get_block(
    env: &LmdbEnvironment,
    txn: &RoTxn,
    hash: &BlockHash,
) -> Result<Option<Vec<u8>>, StoreError> {
    let value = env
        .blocks_db
        .get(txn, hash.as_bytes())
        .map_err(LmdbError::from)?;
    Ok(value.map(<[u8]>::to_vec))
}

fn get_account(
    env: &LmdbEnvironment,
    txn: &RoTxn,
    account: &Account,
) -> Result<Option<AccountInfo>, StoreError> {
    match env
        .accounts_db
        .get(txn, account.as_bytes())
        .map_err(LmdbError::from)?
    {
        Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
        None => Ok(None),
    }
}

fn get_pending(
    env: &LmdbEnvironment,
    txn: &RoTxn,
    key: &PendingKey,
) -> Result<Option<PendingInfo>, StoreError> {
    match env
        .pending_db
        .get(txn, &key.to_bytes())
        .map_err(LmdbError::from)?
    {
        Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
        None => Ok(None),
    }
}

fn counts(env: &LmdbEnvironment, txn: &RoTxn) -> Result<[u64; 3], StoreError> {
    Ok([
        env.blocks_db.len(txn).map_err(LmdbError::from)?,
        env.accounts_db.len(txn).map_err(LmdbError::from)?,
        env.pending_db.len(txn).map_err(LmdbError::from)?,
    ])
}

// ── Read transaction ────────────────────────────────────────────────────

pub struct LmdbReadTxn<'e> {
    env: &'e LmdbEnvironment,
    txn: RoTxn<'e>,
}

impl<'e> LmdbReadTxn<'e> {
    pub(crate) fn new(env: &'e LmdbEnvironment, txn: RoTxn<'e>) -> Self {
        Self { env, txn }
    }
}

impl Transaction for LmdbReadTxn<'_> {
    fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError> {
        get_block(self.env, &self.txn, hash)
    }

    fn get_account(&self, account: &Account) -> Result<Option<AccountInfo>, StoreError> {
        get_account(self.env, &self.txn, account)
    }

    fn get_pending(&self, key: &PendingKey) -> Result<Option<PendingInfo>, StoreError> {
        get_pending(self.env, &self.txn, key)
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        Ok(counts(self.env, &self.txn)?[0])
    }

    fn account_count(&self) -> Result<u64, StoreError> {
        Ok(counts(self.env, &self.txn)?[1])
    }

    fn pending_count(&self) -> Result<u64, StoreError> {
        Ok(counts(self.env, &self.txn)?[2])
    }
}

// ── Write transaction ───────────────────────────────────────────────────

/// A write transaction. Dropping it without `commit` aborts the LMDB
/// transaction and discards every change.
pub struct LmdbWriteTxn<'e> {
    env: &'e LmdbEnvironment,
    txn: RwTxn<'e>,
}

impl<'e> LmdbWriteTxn<'e> {
    pub(crate) fn new(env: &'e LmdbEnvironment, txn: RwTxn<'e>) -> Self {
        Self { env, txn }
    }
}

impl Transaction for LmdbWriteTxn<'_> {
    fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError> {
        get_block(self.env, &self.txn, hash)
    }

    fn get_account(&self, account: &Account) -> Result<Option<AccountInfo>, StoreError> {
        get_account(self.env, &self.txn, account)
    }

    fn get_pending(&self, key: &PendingKey) -> Result<Option<PendingInfo>, StoreError> {
        get_pending(self.env, &self.txn, key)
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        Ok(counts(self.env, &self.txn)?[0])
    }

    fn account_count(&self) -> Result<u64, StoreError> {
        Ok(counts(self.env, &self.txn)?[1])
    }

    fn pending_count(&self) -> Result<u64, StoreError> {
        Ok(counts(self.env, &self.txn)?[2])
    }
}

impl WriteTransaction for LmdbWriteTxn<'_> {
    fn put_block(&mut self, hash: &BlockHash, bytes: &[u8]) -> Result<(), StoreError> {
        self.env
            .blocks_db
            .put(&mut self.txn, hash.as_bytes(), bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete_block(&mut self, hash: &BlockHash) -> Result<(), StoreError> {
        self.env
            .blocks_db
            .delete(&mut self.txn, hash.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn put_account(&mut self, account: &Account, info: &AccountInfo) -> Result<(), StoreError> {
        let bytes = bincode::serialize(info).map_err(LmdbError::from)?;
        self.env
            .accounts_db
            .put(&mut self.txn, account.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete_account(&mut self, account: &Account) -> Result<(), StoreError> {
        self.env
            .accounts_db
            .delete(&mut self.txn, account.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn put_pending(&mut self, key: &PendingKey, info: &PendingInfo) -> Result<(), StoreError> {
        let bytes = bincode::serialize(info).map_err(LmdbError::from)?;
        self.env
            .pending_db
            .put(&mut self.txn, &key.to_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete_pending(&mut self, key: &PendingKey) -> Result<(), StoreError> {
        self.env
            .pending_db
            .delete(&mut self.txn, &key.to_bytes())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn as_read(&self) -> &dyn Transaction {
        self
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
