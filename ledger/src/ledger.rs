//! The ledger: block classification, application, rollback and queries over
//! a [`LedgerStore`].

use std::sync::Arc;

use lattice_store::{
    AccountInfo, LedgerStore, PendingInfo, PendingKey, Transaction, WriteTransaction,
};
use lattice_types::{Account, Amount, BlockHash, Clock, Epoch, SystemClock};
use tracing::{debug, info};

use crate::block_validator::{BlockValidation, BlockValidator, Rejection};
use crate::rollback::RollbackPerformer;
use crate::{
    Block, BlockSideband, LedgerConstants, LedgerError, ProcessOutcome, SavedBlock,
    SignatureVerification,
};

pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    pub constants: LedgerConstants,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    /// Open a ledger, committing the genesis block if the store is empty.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        constants: LedgerConstants,
    ) -> Result<Self, LedgerError> {
        Self::with_clock(store, constants, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn LedgerStore>,
        constants: LedgerConstants,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        let ledger = Self {
            store,
            constants,
            clock,
        };
        ledger.initialize()?;
        Ok(ledger)
    }

    fn initialize(&self) -> Result<(), LedgerError> {
        let genesis = &self.constants.genesis_block;
        let hash = genesis.hash();
        let mut txn = self.store.tx_begin_write()?;
        if txn.block_exists(&hash)? {
            return Ok(());
        }

        let account = self.constants.genesis_account;
        let now = self.clock.now();
        let saved = SavedBlock {
            block: genesis.clone(),
            sideband: BlockSideband {
                account,
                height: 1,
                successor: BlockHash::ZERO,
                balance: Amount::MAX,
                epoch: Epoch::Epoch0,
                timestamp: now,
            },
        };
        txn.put_block(&hash, &saved.encode()?)?;
        txn.put_account(
            &account,
            &AccountInfo {
                head: hash,
                open_block: hash,
                representative: account,
                balance: Amount::MAX,
                block_count: 1,
                epoch: Epoch::Epoch0,
                modified: now,
            },
        )?;
        txn.commit()?;
        info!(
            genesis = %hash,
            network = self.constants.network.as_str(),
            "initialised ledger with genesis block"
        );
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.constants.genesis_block.hash()
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn block(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<Option<SavedBlock>, LedgerError> {
        match txn.get_block(hash)? {
            Some(bytes) => Ok(Some(SavedBlock::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn block_exists(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<bool, LedgerError> {
        Ok(txn.block_exists(hash)?)
    }

    pub fn account_info(
        &self,
        txn: &dyn Transaction,
        account: &Account,
    ) -> Result<Option<AccountInfo>, LedgerError> {
        Ok(txn.get_account(account)?)
    }

    /// Balance of an account; zero when it is not opened.
    pub fn account_balance(
        &self,
        txn: &dyn Transaction,
        account: &Account,
    ) -> Result<Amount, LedgerError> {
        Ok(self
            .account_info(txn, account)?
            .map(|i| i.balance)
            .unwrap_or_default())
    }

    /// Head block of an account's chain.
    pub fn latest(
        &self,
        txn: &dyn Transaction,
        account: &Account,
    ) -> Result<Option<BlockHash>, LedgerError> {
        Ok(self.account_info(txn, account)?.map(|i| i.head))
    }

    pub fn pending_info(
        &self,
        txn: &dyn Transaction,
        key: &PendingKey,
    ) -> Result<Option<PendingInfo>, LedgerError> {
        Ok(txn.get_pending(key)?)
    }

    /// The representative in effect after block `hash`.
    pub fn representative_at(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<Account, LedgerError> {
        let mut current = *hash;
        loop {
            let saved = self
                .block(txn, &current)?
                .ok_or(LedgerError::BlockNotFound(current))?;
            if let Some(representative) = saved.block.representative_field() {
                return Ok(representative);
            }
            current = saved.block.previous();
            if current.is_zero() {
                return Err(LedgerError::Inconsistent(format!(
                    "chain below {hash} has no representative"
                )));
            }
        }
    }

    /// The account whose key must have signed `block`, if it can be decided
    /// from committed state. `None` when the block's predecessor is unknown.
    pub fn signer(
        &self,
        txn: &dyn Transaction,
        block: &Block,
    ) -> Result<Option<Account>, LedgerError> {
        match block {
            Block::Open(open) => Ok(Some(open.account)),
            Block::State(state) => {
                if !self.constants.epochs.is_epoch_link(&state.link) {
                    return Ok(Some(state.account));
                }
                let previous_balance = if state.previous.is_zero() {
                    Amount::ZERO
                } else {
                    match self.block(txn, &state.previous)? {
                        Some(previous) => previous.balance(),
                        None => return Ok(None),
                    }
                };
                if state.balance == previous_balance {
                    Ok(Some(self.constants.epochs.signer()))
                } else {
                    Ok(Some(state.account))
                }
            }
            _ => Ok(self.block(txn, &block.previous())?.map(|p| p.account())),
        }
    }

    /// A different block already occupying `block`'s slot: the successor of
    /// its `previous`, or the open block of its account.
    pub fn competitor(
        &self,
        txn: &dyn Transaction,
        block: &Block,
    ) -> Result<Option<BlockHash>, LedgerError> {
        let occupant = if block.is_open() {
            match block.account_field() {
                Some(account) => self.account_info(txn, &account)?.map(|i| i.open_block),
                None => None,
            }
        } else {
            self.block(txn, &block.previous())?
                .map(|p| p.sideband.successor)
                .filter(|s| !s.is_zero())
        };
        let hash = block.hash();
        Ok(occupant.filter(|o| *o != hash))
    }

    // ── Mutation ────────────────────────────────────────────────────────

    /// Classify `block` and, on [`ProcessOutcome::Progress`], write it.
    ///
    /// Storage failures are errors; every rejection is an `Ok` outcome.
    pub fn process(
        &self,
        txn: &mut dyn WriteTransaction,
        block: &Block,
        verification: SignatureVerification,
    ) -> Result<ProcessOutcome, LedgerError> {
        let now = self.clock.now();
        let validated =
            BlockValidator::new(self, txn.as_read(), block, verification, now).validate();
        match validated {
            Ok(validation) => {
                self.apply(txn, block, validation)?;
                Ok(ProcessOutcome::Progress)
            }
            Err(Rejection::Outcome(outcome)) => Ok(outcome),
            Err(Rejection::Failed(e)) => Err(e),
        }
    }

    fn apply(
        &self,
        txn: &mut dyn WriteTransaction,
        block: &Block,
        validation: BlockValidation,
    ) -> Result<(), LedgerError> {
        let BlockValidation {
            account,
            hash,
            previous,
            new_account_info,
            new_sideband,
            pending_received,
            new_pending,
        } = validation;

        let saved = SavedBlock {
            block: block.clone(),
            sideband: new_sideband,
        };
        txn.put_block(&hash, &saved.encode()?)?;

        if let Some(mut previous) = previous {
            previous.sideband.successor = hash;
            txn.put_block(&block.previous(), &previous.encode()?)?;
        }

        txn.put_account(&account, &new_account_info)?;

        if let Some(key) = pending_received {
            txn.delete_pending(&key)?;
        }
        if let Some((key, info)) = new_pending {
            txn.put_pending(&key, &info)?;
        }

        debug!(
            block_hash = %hash,
            account = %account,
            height = saved.sideband.height,
            "block applied"
        );
        Ok(())
    }

    /// Remove `hash` and every block above it in its chain, plus anything that
    /// received from the removed sends. Returns the removed blocks in removal
    /// order.
    pub fn rollback(
        &self,
        txn: &mut dyn WriteTransaction,
        hash: &BlockHash,
    ) -> Result<Vec<SavedBlock>, LedgerError> {
        if *hash == self.genesis_hash() {
            return Err(LedgerError::GenesisRollback);
        }
        RollbackPerformer::new(self, txn).roll_back(hash)
    }

    // ── Convenience (own read transaction) ──────────────────────────────

    pub fn block_count(&self) -> Result<u64, LedgerError> {
        Ok(self.store.tx_begin_read()?.block_count()?)
    }

    pub fn get_block(&self, hash: &BlockHash) -> Result<Option<SavedBlock>, LedgerError> {
        let txn = self.store.tx_begin_read()?;
        self.block(&*txn, hash)
    }

    pub fn get_account_info(
        &self,
        account: &Account,
    ) -> Result<Option<AccountInfo>, LedgerError> {
        let txn = self.store.tx_begin_read()?;
        self.account_info(&*txn, account)
    }
}
