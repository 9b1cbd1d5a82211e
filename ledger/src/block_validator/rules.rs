use lattice_crypto::verify_signature;
use lattice_store::PendingKey;
use lattice_types::Epoch;
use lattice_work::validate_work;

use super::{BlockValidator, Rejection};
use crate::{Block, ProcessOutcome, SignatureVerification};

impl BlockValidator<'_> {
    pub(crate) fn ensure_block_does_not_exist_yet(&self) -> Result<(), Rejection> {
        if self.txn.block_exists(&self.hash)? {
            Err(ProcessOutcome::Old.into())
        } else {
            Ok(())
        }
    }

    pub(crate) fn ensure_previous_block_exists(&mut self) -> Result<(), Rejection> {
        let previous = self.block.previous();
        if previous.is_zero() {
            return Ok(());
        }
        match self.ledger.block(self.txn, &previous)? {
            Some(block) => {
                self.previous = Some(block);
                Ok(())
            }
            None => Err(ProcessOutcome::GapPrevious.into()),
        }
    }

    /// Also loads the receivable entry the block consumes.
    pub(crate) fn ensure_source_block_exists(&mut self) -> Result<(), Rejection> {
        if let Block::State(state) = self.block {
            if state.previous.is_zero() && state.link.is_zero() {
                return Err(ProcessOutcome::GapSource.into());
            }
        }
        if !self.is_receive() {
            return Ok(());
        }

        let source = self.block.source_or_link();
        if !self.txn.block_exists(&source)? {
            return Err(ProcessOutcome::GapSource.into());
        }
        let key = PendingKey::new(self.account, source);
        self.pending_receive_info = self.txn.get_pending(&key)?;
        self.pending_receive_key = Some(key);
        Ok(())
    }

    pub(crate) fn ensure_valid_signature(&self) -> Result<(), Rejection> {
        let valid = match self.verification {
            SignatureVerification::Valid => true,
            SignatureVerification::Invalid => false,
            SignatureVerification::Unknown => verify_signature(
                self.hash.as_bytes(),
                self.block.signature(),
                &self.signer().public_key(),
            ),
        };
        if valid {
            Ok(())
        } else {
            Err(ProcessOutcome::BadSignature.into())
        }
    }

    pub(crate) fn ensure_no_negative_spend(&self) -> Result<(), Rejection> {
        match self.block {
            Block::Send(send) if send.balance > self.previous_balance() => {
                Err(ProcessOutcome::NegativeSpend.into())
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn ensure_no_fork(&self) -> Result<(), Rejection> {
        let forked = if self.block.is_open() {
            self.old_account_info.is_some()
        } else {
            match &self.old_account_info {
                Some(info) => info.head != self.block.previous(),
                None => true,
            }
        };
        if forked {
            Err(ProcessOutcome::Fork.into())
        } else {
            Ok(())
        }
    }

    pub(crate) fn ensure_sufficient_work(&self) -> Result<(), Rejection> {
        let threshold = self.ledger.constants.work.threshold_for(self.work_kind());
        if validate_work(&self.block.work_root(), self.block.work(), threshold) {
            Ok(())
        } else {
            Err(ProcessOutcome::InsufficientWork.into())
        }
    }

    pub(crate) fn ensure_valid_block_position(&self) -> Result<(), Rejection> {
        match self.block {
            Block::Send(_) | Block::Receive(_) | Block::Change(_) => {
                let upgraded = self
                    .old_account_info
                    .as_ref()
                    .is_some_and(|i| i.epoch > Epoch::Epoch0);
                let after_state = self
                    .previous
                    .as_ref()
                    .is_some_and(|p| matches!(p.block, Block::State(_)));
                if upgraded || after_state {
                    return Err(ProcessOutcome::BlockPosition.into());
                }
            }
            Block::State(_) if self.is_epoch_block() => {
                let Some(info) = &self.old_account_info else {
                    // Epoch blocks only upgrade existing chains.
                    return Err(ProcessOutcome::BlockPosition.into());
                };
                if info.epoch.next() != self.block_epoch_version() {
                    return Err(ProcessOutcome::BlockPosition.into());
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn ensure_block_is_not_for_burn_account(&self) -> Result<(), Rejection> {
        if self.account == self.ledger.constants.burn_account {
            Err(ProcessOutcome::OpenedBurnAccount.into())
        } else {
            Ok(())
        }
    }

    /// Settles the post-block balance of receives.
    pub(crate) fn ensure_pending_receive_is_correct(&mut self) -> Result<(), Rejection> {
        self.new_balance = self
            .block
            .balance_field()
            .unwrap_or_else(|| self.previous_balance());

        if !self.is_receive() {
            return Ok(());
        }
        let Some(pending) = &self.pending_receive_info else {
            return Err(ProcessOutcome::Unreceivable.into());
        };

        match self.block {
            Block::State(state) => {
                let received = state.balance.checked_sub(self.previous_balance());
                if received != Some(pending.amount) {
                    return Err(ProcessOutcome::BalanceMismatch.into());
                }
            }
            _ => {
                if pending.epoch != Epoch::Epoch0 {
                    return Err(ProcessOutcome::Unreceivable.into());
                }
                self.new_balance = self
                    .previous_balance()
                    .checked_add(pending.amount)
                    .ok_or(ProcessOutcome::BalanceMismatch)?;
            }
        }
        Ok(())
    }

    /// A state block that neither sends nor receives must keep the balance.
    pub(crate) fn ensure_no_balance_change_without_link(&self) -> Result<(), Rejection> {
        if let Block::State(state) = self.block {
            if !self.is_send() && !self.is_receive() && state.balance != self.previous_balance() {
                return Err(ProcessOutcome::BalanceMismatch.into());
            }
        }
        Ok(())
    }

    pub(crate) fn ensure_valid_epoch_block(&self) -> Result<(), Rejection> {
        if !self.is_epoch_block() {
            return Ok(());
        }
        if let (Block::State(state), Some(info)) = (self.block, &self.old_account_info) {
            if state.representative != info.representative {
                return Err(ProcessOutcome::RepresentativeMismatch.into());
            }
            if state.balance != info.balance {
                return Err(ProcessOutcome::BalanceMismatch.into());
            }
        }
        Ok(())
    }
}
