//! Read / write transaction traits.

use crate::{AccountInfo, PendingInfo, PendingKey, StoreError};
use lattice_types::{Account, BlockHash};

/// A consistent read view of the ledger tables.
///
/// Block bodies are opaque bytes; the ledger crate owns their encoding.
pub trait Transaction {
    fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError>;

    fn block_exists(&self, hash: &BlockHash) -> Result<bool, StoreError> {
        Ok(self.get_block(hash)?.is_some())
    }

    fn get_account(&self, account: &Account) -> Result<Option<AccountInfo>, StoreError>;

    fn get_pending(&self, key: &PendingKey) -> Result<Option<PendingInfo>, StoreError>;

    fn pending_exists(&self, key: &PendingKey) -> Result<bool, StoreError> {
        Ok(self.get_pending(key)?.is_some())
    }

    fn block_count(&self) -> Result<u64, StoreError>;

    fn account_count(&self) -> Result<u64, StoreError>;

    fn pending_count(&self) -> Result<u64, StoreError>;
}

/// A read-write transaction. Changes are visible to this transaction
/// immediately and to everyone else only after [`WriteTransaction::commit`].
pub trait WriteTransaction: Transaction {
    fn put_block(&mut self, hash: &BlockHash, bytes: &[u8]) -> Result<(), StoreError>;

    fn delete_block(&mut self, hash: &BlockHash) -> Result<(), StoreError>;

    fn put_account(&mut self, account: &Account, info: &AccountInfo) -> Result<(), StoreError>;

    fn delete_account(&mut self, account: &Account) -> Result<(), StoreError>;

    fn put_pending(&mut self, key: &PendingKey, info: &PendingInfo) -> Result<(), StoreError>;

    fn delete_pending(&mut self, key: &PendingKey) -> Result<(), StoreError>;

    /// View this transaction as a read transaction.
    fn as_read(&self) -> &dyn Transaction;

    /// Make every change durable. Dropping the transaction instead rolls back.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Opens transactions against a ledger database.
///
/// At most one write transaction is open at a time; `tx_begin_write` blocks
/// until the previous writer finishes. Read transactions see the state as of
/// the last commit before they began.
pub trait LedgerStore: Send + Sync {
    fn tx_begin_read(&self) -> Result<Box<dyn Transaction + '_>, StoreError>;

    fn tx_begin_write(&self) -> Result<Box<dyn WriteTransaction + '_>, StoreError>;
}
