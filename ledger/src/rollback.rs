//! Removing blocks from the top of account chains.
//!
//! A chain is unwound from its head down to the target. Undoing a send whose
//! receivable entry was already consumed first unwinds the receiving chain
//! until the entry reappears.

use lattice_store::{AccountInfo, PendingInfo, PendingKey, WriteTransaction};
use lattice_types::{Amount, BlockHash};
use tracing::debug;

use crate::{Block, Ledger, LedgerError, SavedBlock};

/// What undoing the current head requires.
enum RollbackStep {
    Done,
    /// This block has to go first.
    RequestDependencyRollback(BlockHash),
}

pub(crate) struct RollbackPerformer<'a> {
    ledger: &'a Ledger,
    txn: &'a mut dyn WriteTransaction,
    rolled_back: Vec<SavedBlock>,
}

impl<'a> RollbackPerformer<'a> {
    pub(crate) fn new(ledger: &'a Ledger, txn: &'a mut dyn WriteTransaction) -> Self {
        Self {
            ledger,
            txn,
            rolled_back: Vec::new(),
        }
    }

    pub(crate) fn roll_back(mut self, hash: &BlockHash) -> Result<Vec<SavedBlock>, LedgerError> {
        self.roll_back_until_removed(hash)?;
        Ok(self.rolled_back)
    }

    fn roll_back_until_removed(&mut self, hash: &BlockHash) -> Result<(), LedgerError> {
        let account = self.load_block(hash)?.account();
        while self.txn.block_exists(hash)? {
            let info = self
                .txn
                .get_account(&account)?
                .ok_or(LedgerError::AccountNotFound(account))?;
            let head = self.load_block(&info.head)?;
            match self.roll_back_head_block(&info, head)? {
                RollbackStep::Done => {}
                RollbackStep::RequestDependencyRollback(dependency) => {
                    self.roll_back_until_removed(&dependency)?
                }
            }
        }
        Ok(())
    }

    fn load_block(&self, hash: &BlockHash) -> Result<SavedBlock, LedgerError> {
        self.ledger
            .block(self.txn.as_read(), hash)?
            .ok_or(LedgerError::BlockNotFound(*hash))
    }

    fn is_receive(&self, head: &SavedBlock, previous_balance: Amount) -> bool {
        match &head.block {
            Block::Receive(_) | Block::Open(_) => true,
            Block::State(state) => {
                !self.ledger.constants.epochs.is_epoch_link(&state.link)
                    && !state.link.is_zero()
                    && state.balance >= previous_balance
            }
            _ => false,
        }
    }

    fn roll_back_head_block(
        &mut self,
        info: &AccountInfo,
        head: SavedBlock,
    ) -> Result<RollbackStep, LedgerError> {
        let head_hash = info.head;
        if head_hash == self.ledger.genesis_hash() {
            return Err(LedgerError::GenesisRollback);
        }

        let previous_hash = head.block.previous();
        let previous = if previous_hash.is_zero() {
            None
        } else {
            Some(self.load_block(&previous_hash)?)
        };
        let previous_balance = previous.as_ref().map(|p| p.balance()).unwrap_or_default();
        let account = head.account();

        if head.balance() < previous_balance {
            let key = PendingKey::new(head.block.destination_or_link(), head_hash);
            if !self.txn.pending_exists(&key)? {
                let receiver = self
                    .txn
                    .get_account(&key.account)?
                    .ok_or(LedgerError::AccountNotFound(key.account))?;
                return Ok(RollbackStep::RequestDependencyRollback(receiver.head));
            }
            self.txn.delete_pending(&key)?;
        } else if self.is_receive(&head, previous_balance) {
            let source_hash = head.block.source_or_link();
            let source = self.load_block(&source_hash)?;
            let amount = head.balance().checked_sub(previous_balance).ok_or_else(|| {
                LedgerError::Inconsistent(format!("receive {head_hash} lowers balance"))
            })?;
            self.txn.put_pending(
                &PendingKey::new(account, source_hash),
                &PendingInfo {
                    source: source.account(),
                    amount,
                    epoch: source.sideband.epoch,
                },
            )?;
        }

        self.txn.delete_block(&head_hash)?;
        match previous {
            Some(mut previous) => {
                previous.sideband.successor = BlockHash::ZERO;
                self.txn.put_block(&previous_hash, &previous.encode()?)?;
                let representative = self
                    .ledger
                    .representative_at(self.txn.as_read(), &previous_hash)?;
                let restored = AccountInfo {
                    head: previous_hash,
                    open_block: info.open_block,
                    representative,
                    balance: previous_balance,
                    block_count: info.block_count.saturating_sub(1),
                    epoch: previous.sideband.epoch,
                    modified: self.ledger.clock().now(),
                };
                self.txn.put_account(&account, &restored)?;
            }
            None => self.txn.delete_account(&account)?,
        }

        debug!(block_hash = %head_hash, account = %account, "block rolled back");
        self.rolled_back.push(head);
        Ok(RollbackStep::Done)
    }
}
