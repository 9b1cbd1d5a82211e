//! Nullable store: thread-safe in-memory ledger storage for testing.
//!
//! Readers see an immutable snapshot of the last commit. A writer works on a
//! private copy and publishes it atomically on commit, so dropping a write
//! transaction discards its changes exactly like an aborted LMDB transaction.

use lattice_store::{
    AccountInfo, LedgerStore, PendingInfo, PendingKey, StoreError, Transaction, WriteTransaction,
};
use lattice_types::{Account, BlockHash};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

#[derive(Clone, Default)]
struct Tables {
    blocks: HashMap<BlockHash, Vec<u8>>,
    accounts: HashMap<Account, AccountInfo>,
    pending: BTreeMap<PendingKey, PendingInfo>,
}

#[derive(Default)]
struct Faults {
    failing_commits: usize,
    failing_write_begins: usize,
    commit_delay: Option<Duration>,
}

/// An in-memory, snapshot-isolated implementation of [`LedgerStore`].
pub struct NullStore {
    committed: RwLock<Arc<Tables>>,
    writer: Mutex<()>,
    faults: Mutex<Faults>,
    commits: AtomicU64,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(Arc::new(Tables::default())),
            writer: Mutex::new(()),
            faults: Mutex::new(Faults::default()),
            commits: AtomicU64::new(0),
        }
    }

    /// The next `count` commits fail with a backend error and discard their
    /// changes.
    pub fn fail_next_commits(&self, count: usize) {
        self.faults().failing_commits = count;
    }

    /// The next `count` calls to `tx_begin_write` fail.
    pub fn fail_next_write_begins(&self, count: usize) {
        self.faults().failing_write_begins = count;
    }

    /// Every commit sleeps for `delay` before publishing (simulates slow I/O).
    pub fn set_commit_delay(&self, delay: Option<Duration>) {
        self.faults().commit_delay = delay;
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Arc<Tables> {
        Arc::clone(&self.committed.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read_tables(tables: &Tables) -> &Tables {
    tables
}

macro_rules! impl_read {
    ($ty:ty) => {
        impl Transaction for $ty {
            fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError> {
                Ok(read_tables(&self.tables).blocks.get(hash).cloned())
            }

            fn get_account(&self, account: &Account) -> Result<Option<AccountInfo>, StoreError> {
                Ok(read_tables(&self.tables).accounts.get(account).cloned())
            }

            fn get_pending(&self, key: &PendingKey) -> Result<Option<PendingInfo>, StoreError> {
                Ok(read_tables(&self.tables).pending.get(key).cloned())
            }

            fn block_count(&self) -> Result<u64, StoreError> {
                Ok(read_tables(&self.tables).blocks.len() as u64)
            }

            fn account_count(&self) -> Result<u64, StoreError> {
                Ok(read_tables(&self.tables).accounts.len() as u64)
            }

            fn pending_count(&self) -> Result<u64, StoreError> {
                Ok(read_tables(&self.tables).pending.len() as u64)
            }
        }
    };
}

/// A read transaction holding the snapshot current when it began.
pub struct NullReadTxn {
    tables: Arc<Tables>,
}

impl_read!(NullReadTxn);

/// A write transaction over a private copy of the tables.
pub struct NullWriteTxn<'s> {
    store: &'s NullStore,
    tables: Tables,
    _writer: MutexGuard<'s, ()>,
}

impl_read!(NullWriteTxn<'_>);

impl WriteTransaction for NullWriteTxn<'_> {
    fn put_block(&mut self, hash: &BlockHash, bytes: &[u8]) -> Result<(), StoreError> {
        self.tables.blocks.insert(*hash, bytes.to_vec());
        Ok(())
    }

    fn delete_block(&mut self, hash: &BlockHash) -> Result<(), StoreError> {
        self.tables.blocks.remove(hash);
        Ok(())
    }

    fn put_account(&mut self, account: &Account, info: &AccountInfo) -> Result<(), StoreError> {
        self.tables.accounts.insert(*account, info.clone());
        Ok(())
    }

    fn delete_account(&mut self, account: &Account) -> Result<(), StoreError> {
        self.tables.accounts.remove(account);
        Ok(())
    }

    fn put_pending(&mut self, key: &PendingKey, info: &PendingInfo) -> Result<(), StoreError> {
        self.tables.pending.insert(*key, info.clone());
        Ok(())
    }

    fn delete_pending(&mut self, key: &PendingKey) -> Result<(), StoreError> {
        self.tables.pending.remove(key);
        Ok(())
    }

    fn as_read(&self) -> &dyn Transaction {
        self
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let delay = {
            let mut faults = self.store.faults();
            if faults.failing_commits > 0 {
                faults.failing_commits -= 1;
                return Err(StoreError::Backend("injected commit failure".into()));
            }
            faults.commit_delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let this = *self;
        *this
            .store
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(this.tables);
        this.store.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl LedgerStore for NullStore {
    fn tx_begin_read(&self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        Ok(Box::new(NullReadTxn {
            tables: self.snapshot(),
        }))
    }

    fn tx_begin_write(&self) -> Result<Box<dyn WriteTransaction + '_>, StoreError> {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut faults = self.faults();
            if faults.failing_write_begins > 0 {
                faults.failing_write_begins -= 1;
                return Err(StoreError::Backend("injected write begin failure".into()));
            }
        }
        Ok(Box::new(NullWriteTxn {
            store: self,
            tables: (*self.snapshot()).clone(),
            _writer: writer,
        }))
    }
}
