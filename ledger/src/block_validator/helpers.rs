use lattice_store::{AccountInfo, PendingInfo, PendingKey};
use lattice_types::{Account, Amount, Epoch};
use lattice_work::WorkBlockKind;

use super::BlockValidator;
use crate::Block;

impl BlockValidator<'_> {
    pub(crate) fn previous_balance(&self) -> Amount {
        self.previous
            .as_ref()
            .map(|b| b.balance())
            .unwrap_or_default()
    }

    fn has_epoch_link(&self) -> bool {
        match self.block.link_field() {
            Some(link) => self.ledger.constants.epochs.is_epoch_link(&link),
            None => false,
        }
    }

    /// An epoch-linked state block that leaves the balance untouched.
    pub(crate) fn is_epoch_block(&self) -> bool {
        match self.block {
            Block::State(state) => {
                self.has_epoch_link() && state.balance == self.previous_balance()
            }
            _ => false,
        }
    }

    pub(crate) fn is_send(&self) -> bool {
        match self.block {
            Block::Send(_) => true,
            Block::State(state) => state.balance < self.previous_balance(),
            _ => false,
        }
    }

    pub(crate) fn is_receive(&self) -> bool {
        match self.block {
            Block::Receive(_) | Block::Open(_) => true,
            Block::State(state) => {
                !self.has_epoch_link()
                    && !state.link.is_zero()
                    && state.balance >= self.previous_balance()
            }
            _ => false,
        }
    }

    pub(crate) fn signer(&self) -> Account {
        if self.is_epoch_block() {
            self.ledger.constants.epochs.signer()
        } else {
            self.account
        }
    }

    pub(crate) fn work_kind(&self) -> WorkBlockKind {
        if self.is_epoch_block() {
            WorkBlockKind::Epoch
        } else if self.is_receive() || self.block.is_open() {
            WorkBlockKind::ReceiveOrOpen
        } else {
            WorkBlockKind::Base
        }
    }

    pub(crate) fn block_epoch_version(&self) -> Option<Epoch> {
        self.block
            .link_field()
            .and_then(|link| self.ledger.constants.epochs.epoch(&link))
    }

    fn source_epoch(&self) -> Epoch {
        self.pending_receive_info
            .as_ref()
            .map(|p| p.epoch)
            .unwrap_or_default()
    }

    fn epoch(&self) -> Epoch {
        if self.is_epoch_block() {
            self.block_epoch_version().unwrap_or_default()
        } else {
            let epoch = self
                .old_account_info
                .as_ref()
                .map(|i| i.epoch)
                .unwrap_or_default();
            epoch.max(self.source_epoch())
        }
    }

    fn new_representative(&self) -> Account {
        self.block.representative_field().unwrap_or_else(|| {
            self.old_account_info
                .as_ref()
                .map(|i| i.representative)
                .unwrap_or_default()
        })
    }

    pub(crate) fn new_account_info(&self) -> AccountInfo {
        let old = self.old_account_info.as_ref();
        AccountInfo {
            head: self.hash,
            open_block: old.map(|i| i.open_block).unwrap_or(self.hash),
            representative: self.new_representative(),
            balance: self.new_balance,
            block_count: old.map(|i| i.block_count).unwrap_or_default() + 1,
            epoch: self.epoch(),
            modified: self.now,
        }
    }

    pub(crate) fn new_pending_info(&self) -> Option<(PendingKey, PendingInfo)> {
        if !self.is_send() {
            return None;
        }
        let amount = self.previous_balance().checked_sub(self.new_balance)?;
        Some((
            PendingKey::new(self.block.destination_or_link(), self.hash),
            PendingInfo {
                source: self.account,
                amount,
                epoch: self.epoch(),
            },
        ))
    }
}
