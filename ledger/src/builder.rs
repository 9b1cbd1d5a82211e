//! Construction of signed blocks with valid proof-of-work.

use lattice_types::{Account, Amount, BlockHash, Epoch, KeyPair, Link, PrivateKey, Signature};
use lattice_work::{WorkBlockKind, WorkError, WorkGenerator, WorkThresholds};

use crate::block::{Block, ChangeBlock, OpenBlock, ReceiveBlock, SendBlock, StateBlock};
use crate::constants::{Epochs, LedgerConstants};

/// Builds blocks for a ledger's constants.
///
/// Non-epoch blocks get work for the receive threshold, which clears every
/// non-epoch kind. Epoch-linked blocks get work for the epoch threshold.
pub struct BlockBuilder {
    thresholds: WorkThresholds,
    epochs: Epochs,
    generator: WorkGenerator,
}

impl BlockBuilder {
    pub fn new(constants: &LedgerConstants) -> Self {
        Self {
            thresholds: constants.work.clone(),
            epochs: constants.epochs.clone(),
            generator: WorkGenerator::new(),
        }
    }

    pub fn send(
        &self,
        key: &KeyPair,
        previous: BlockHash,
        destination: Account,
        balance: Amount,
    ) -> Result<Block, WorkError> {
        let block = Block::Send(SendBlock {
            previous,
            destination,
            balance,
            signature: Signature::ZERO,
            work: 0,
        });
        self.finish(block, &key.private, WorkBlockKind::ReceiveOrOpen)
    }

    pub fn receive(
        &self,
        key: &KeyPair,
        previous: BlockHash,
        source: BlockHash,
    ) -> Result<Block, WorkError> {
        let block = Block::Receive(ReceiveBlock {
            previous,
            source,
            signature: Signature::ZERO,
            work: 0,
        });
        self.finish(block, &key.private, WorkBlockKind::ReceiveOrOpen)
    }

    pub fn open(
        &self,
        key: &KeyPair,
        source: BlockHash,
        representative: Account,
    ) -> Result<Block, WorkError> {
        let block = Block::Open(OpenBlock {
            source,
            representative,
            account: key.account(),
            signature: Signature::ZERO,
            work: 0,
        });
        self.finish(block, &key.private, WorkBlockKind::ReceiveOrOpen)
    }

    pub fn change(
        &self,
        key: &KeyPair,
        previous: BlockHash,
        representative: Account,
    ) -> Result<Block, WorkError> {
        let block = Block::Change(ChangeBlock {
            previous,
            representative,
            signature: Signature::ZERO,
            work: 0,
        });
        self.finish(block, &key.private, WorkBlockKind::ReceiveOrOpen)
    }

    /// A state block for `key`'s own account.
    pub fn state(
        &self,
        key: &KeyPair,
        previous: BlockHash,
        representative: Account,
        balance: Amount,
        link: Link,
    ) -> Result<Block, WorkError> {
        let block = Block::State(StateBlock {
            account: key.account(),
            previous,
            representative,
            balance,
            link,
            signature: Signature::ZERO,
            work: 0,
        });
        let kind = if self.epochs.is_epoch_link(&link) {
            WorkBlockKind::Epoch
        } else {
            WorkBlockKind::ReceiveOrOpen
        };
        self.finish(block, &key.private, kind)
    }

    /// An epoch upgrade of `account`, signed by the epoch signer's key.
    ///
    /// Returns `None` for epochs without a link.
    pub fn epoch(
        &self,
        signer: &KeyPair,
        account: Account,
        previous: BlockHash,
        representative: Account,
        balance: Amount,
        epoch: Epoch,
    ) -> Result<Option<Block>, WorkError> {
        let Some(link) = self.epochs.link(epoch) else {
            return Ok(None);
        };
        let block = Block::State(StateBlock {
            account,
            previous,
            representative,
            balance,
            link,
            signature: Signature::ZERO,
            work: 0,
        });
        self.finish(block, &signer.private, WorkBlockKind::Epoch).map(Some)
    }

    fn finish(
        &self,
        mut block: Block,
        key: &PrivateKey,
        kind: WorkBlockKind,
    ) -> Result<Block, WorkError> {
        let threshold = self.thresholds.threshold_for(kind);
        let work = self.generator.generate(&block.work_root(), threshold)?;
        block.set_work(work);
        block.sign(key);
        Ok(block)
    }
}
