//! Per-network ledger constants: genesis, burn account, epochs, work.

use lattice_crypto::keypair_from_seed;
use lattice_types::{Account, BlockHash, Epoch, KeyPair, Link, NetworkId, Signature};
use lattice_work::WorkThresholds;

use crate::block::{Block, OpenBlock};

const DEV_GENESIS_SEED: [u8; 32] = *b"lattice dev genesis key seed 000";
const TEST_GENESIS_SEED: [u8; 32] = *b"lattice test genesis key seed 00";
const LIVE_GENESIS_SEED: [u8; 32] = *b"lattice live genesis key seed 00";

fn epoch_link(text: &[u8]) -> Link {
    let mut bytes = [0u8; 32];
    bytes[..text.len()].copy_from_slice(text);
    Link::new(bytes)
}

/// Maps state-block links to the epoch they upgrade an account to.
#[derive(Clone, Debug)]
pub struct Epochs {
    links: Vec<(Link, Epoch)>,
    signer: Account,
}

impl Epochs {
    pub fn new(signer: Account) -> Self {
        Self {
            links: vec![
                (epoch_link(b"epoch v1 block"), Epoch::Epoch1),
                (epoch_link(b"epoch v2 block"), Epoch::Epoch2),
            ],
            signer,
        }
    }

    pub fn is_epoch_link(&self, link: &Link) -> bool {
        self.epoch(link).is_some()
    }

    pub fn epoch(&self, link: &Link) -> Option<Epoch> {
        self.links
            .iter()
            .find(|(l, _)| l == link)
            .map(|(_, epoch)| *epoch)
    }

    pub fn link(&self, epoch: Epoch) -> Option<Link> {
        self.links
            .iter()
            .find(|(_, e)| *e == epoch)
            .map(|(link, _)| *link)
    }

    /// The account whose key signs epoch blocks.
    pub fn signer(&self) -> Account {
        self.signer
    }
}

#[derive(Clone, Debug)]
pub struct LedgerConstants {
    pub network: NetworkId,
    pub genesis_account: Account,
    /// Committed on an empty store. Never classified.
    pub genesis_block: Block,
    /// Cannot be opened; funds sent here are destroyed.
    pub burn_account: Account,
    pub epochs: Epochs,
    pub work: WorkThresholds,
}

impl LedgerConstants {
    pub fn for_network(network: NetworkId) -> Self {
        match network {
            NetworkId::Live => {
                Self::from_genesis_key(network, &live_genesis_key(), WorkThresholds::live())
            }
            NetworkId::Test => {
                Self::from_genesis_key(network, &test_genesis_key(), WorkThresholds::live())
            }
            NetworkId::Dev => Self::dev(),
        }
    }

    /// Development constants: a published genesis key and low work thresholds.
    pub fn dev() -> Self {
        Self::from_genesis_key(NetworkId::Dev, &dev_genesis_key(), WorkThresholds::dev())
    }

    pub fn from_genesis_key(network: NetworkId, genesis: &KeyPair, work: WorkThresholds) -> Self {
        let genesis_account = genesis.account();
        let mut genesis_block = Block::Open(OpenBlock {
            source: BlockHash::new(*genesis_account.as_bytes()),
            representative: genesis_account,
            account: genesis_account,
            signature: Signature::ZERO,
            work: 0,
        });
        genesis_block.sign(&genesis.private);

        Self {
            network,
            genesis_account,
            genesis_block,
            burn_account: Account::BURN,
            epochs: Epochs::new(genesis_account),
            work,
        }
    }
}

/// The genesis key of the development network.
pub fn dev_genesis_key() -> KeyPair {
    keypair_from_seed(&DEV_GENESIS_SEED)
}

fn test_genesis_key() -> KeyPair {
    keypair_from_seed(&TEST_GENESIS_SEED)
}

fn live_genesis_key() -> KeyPair {
    keypair_from_seed(&LIVE_GENESIS_SEED)
}
