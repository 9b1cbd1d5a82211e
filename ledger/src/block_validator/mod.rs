//! Classifies a candidate block against the ledger.
//!
//! Checks run in a fixed order and the first failing check decides the
//! outcome, so the result is a pure function of the block and the ledger state
//! visible through the transaction.

mod helpers;
mod rules;

use lattice_store::{AccountInfo, PendingInfo, PendingKey, StoreError, Transaction};
use lattice_types::{Account, Amount, BlockHash, Timestamp};

use crate::{
    Block, BlockSideband, Ledger, LedgerError, ProcessOutcome, SavedBlock, SignatureVerification,
};

/// Why validation stopped: the block was rejected, or the ledger could not be
/// read.
#[derive(Debug)]
pub(crate) enum Rejection {
    Outcome(ProcessOutcome),
    Failed(LedgerError),
}

impl From<ProcessOutcome> for Rejection {
    fn from(outcome: ProcessOutcome) -> Self {
        Self::Outcome(outcome)
    }
}

impl From<LedgerError> for Rejection {
    fn from(e: LedgerError) -> Self {
        Self::Failed(e)
    }
}

impl From<StoreError> for Rejection {
    fn from(e: StoreError) -> Self {
        Self::Failed(e.into())
    }
}

/// Everything needed to write an accepted block.
pub(crate) struct BlockValidation {
    pub account: Account,
    pub hash: BlockHash,
    pub previous: Option<SavedBlock>,
    pub new_account_info: AccountInfo,
    pub new_sideband: BlockSideband,
    pub pending_received: Option<PendingKey>,
    pub new_pending: Option<(PendingKey, PendingInfo)>,
}

pub(crate) struct BlockValidator<'a> {
    ledger: &'a Ledger,
    txn: &'a dyn Transaction,
    block: &'a Block,
    hash: BlockHash,
    verification: SignatureVerification,
    now: Timestamp,

    account: Account,
    previous: Option<SavedBlock>,
    old_account_info: Option<AccountInfo>,
    pending_receive_key: Option<PendingKey>,
    pending_receive_info: Option<PendingInfo>,
    new_balance: Amount,
}

impl<'a> BlockValidator<'a> {
    pub(crate) fn new(
        ledger: &'a Ledger,
        txn: &'a dyn Transaction,
        block: &'a Block,
        verification: SignatureVerification,
        now: Timestamp,
    ) -> Self {
        Self {
            ledger,
            txn,
            block,
            hash: block.hash(),
            verification,
            now,
            account: Account::default(),
            previous: None,
            old_account_info: None,
            pending_receive_key: None,
            pending_receive_info: None,
            new_balance: Amount::ZERO,
        }
    }

    pub(crate) fn validate(mut self) -> Result<BlockValidation, Rejection> {
        self.ensure_block_does_not_exist_yet()?;
        self.ensure_previous_block_exists()?;
        self.load_account()?;
        self.ensure_source_block_exists()?;
        self.ensure_valid_signature()?;
        self.ensure_no_negative_spend()?;
        self.ensure_no_fork()?;
        self.ensure_sufficient_work()?;
        self.ensure_valid_block_position()?;
        self.ensure_block_is_not_for_burn_account()?;
        self.ensure_pending_receive_is_correct()?;
        self.ensure_no_balance_change_without_link()?;
        self.ensure_valid_epoch_block()?;

        Ok(self.create_validation())
    }

    fn load_account(&mut self) -> Result<(), Rejection> {
        self.account = match self.block.account_field() {
            Some(account) => account,
            None => match &self.previous {
                Some(previous) => previous.account(),
                None => return Err(ProcessOutcome::GapPrevious.into()),
            },
        };
        self.old_account_info = self.txn.get_account(&self.account)?;
        Ok(())
    }

    fn create_validation(self) -> BlockValidation {
        let new_account_info = self.new_account_info();
        let new_sideband = BlockSideband {
            account: self.account,
            height: new_account_info.block_count,
            successor: BlockHash::ZERO,
            balance: self.new_balance,
            epoch: new_account_info.epoch,
            timestamp: self.now,
        };
        BlockValidation {
            account: self.account,
            hash: self.hash,
            new_pending: self.new_pending_info(),
            pending_received: self.pending_receive_key,
            new_account_info,
            new_sideband,
            previous: self.previous,
        }
    }
}
