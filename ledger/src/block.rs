//! Block variants of the block-lattice.
//!
//! Every account owns a chain of blocks. Four legacy formats each encode one
//! operation (`Send`, `Receive`, `Open`, `Change`); the `State` format carries
//! the full account state after the operation and infers the operation from
//! the balance delta and the `link` field.

use lattice_crypto::{blake2b_256_multi, sign_message};
use lattice_types::{Account, Amount, BlockHash, HashOrAccount, Link, PrivateKey, Signature};
use serde::{Deserialize, Serialize};

/// State block hashes are prefixed with 32 bytes whose last byte is this
/// value, so they can never collide with a legacy block hash.
const STATE_BLOCK_PREAMBLE_TAG: u8 = 6;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBlock {
    pub previous: BlockHash,
    pub destination: Account,
    /// Balance of the sending account after this block.
    pub balance: Amount,
    pub signature: Signature,
    pub work: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBlock {
    pub previous: BlockHash,
    /// Hash of the send block being received.
    pub source: BlockHash,
    pub signature: Signature,
    pub work: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenBlock {
    /// Hash of the send block being received.
    pub source: BlockHash,
    pub representative: Account,
    pub account: Account,
    pub signature: Signature,
    pub work: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBlock {
    pub previous: BlockHash,
    pub representative: Account,
    pub signature: Signature,
    pub work: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBlock {
    pub account: Account,
    /// Zero for the first block of a chain.
    pub previous: BlockHash,
    pub representative: Account,
    /// Balance of the account after this block.
    pub balance: Amount,
    pub link: Link,
    pub signature: Signature,
    pub work: u64,
}

/// A candidate or stored block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Block {
    Send(SendBlock),
    Receive(ReceiveBlock),
    Open(OpenBlock),
    Change(ChangeBlock),
    State(StateBlock),
}

impl Block {
    /// Blake2b-256 over the variant's hashable fields.
    pub fn hash(&self) -> BlockHash {
        let digest = match self {
            Block::Send(b) => blake2b_256_multi(&[
                b.previous.as_bytes(),
                b.destination.as_bytes(),
                &b.balance.number().to_be_bytes(),
            ]),
            Block::Receive(b) => blake2b_256_multi(&[b.previous.as_bytes(), b.source.as_bytes()]),
            Block::Open(b) => blake2b_256_multi(&[
                b.source.as_bytes(),
                b.representative.as_bytes(),
                b.account.as_bytes(),
            ]),
            Block::Change(b) => {
                blake2b_256_multi(&[b.previous.as_bytes(), b.representative.as_bytes()])
            }
            Block::State(b) => {
                let mut preamble = [0u8; 32];
                preamble[31] = STATE_BLOCK_PREAMBLE_TAG;
                blake2b_256_multi(&[
                    &preamble,
                    b.account.as_bytes(),
                    b.previous.as_bytes(),
                    b.representative.as_bytes(),
                    &b.balance.number().to_be_bytes(),
                    b.link.as_bytes(),
                ])
            }
        };
        BlockHash::new(digest)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Block::Send(_) => "send",
            Block::Receive(_) => "receive",
            Block::Open(_) => "open",
            Block::Change(_) => "change",
            Block::State(_) => "state",
        }
    }

    pub fn is_legacy(&self) -> bool {
        !matches!(self, Block::State(_))
    }

    /// Zero for open blocks.
    pub fn previous(&self) -> BlockHash {
        match self {
            Block::Send(b) => b.previous,
            Block::Receive(b) => b.previous,
            Block::Open(_) => BlockHash::ZERO,
            Block::Change(b) => b.previous,
            Block::State(b) => b.previous,
        }
    }

    /// Whether this block starts a chain.
    pub fn is_open(&self) -> bool {
        match self {
            Block::Open(_) => true,
            Block::State(b) => b.previous.is_zero(),
            _ => false,
        }
    }

    /// The account named inside the block. Legacy send, receive and change
    /// blocks only reach their account through `previous`.
    pub fn account_field(&self) -> Option<Account> {
        match self {
            Block::Open(b) => Some(b.account),
            Block::State(b) => Some(b.account),
            _ => None,
        }
    }

    pub fn representative_field(&self) -> Option<Account> {
        match self {
            Block::Open(b) => Some(b.representative),
            Block::Change(b) => Some(b.representative),
            Block::State(b) => Some(b.representative),
            _ => None,
        }
    }

    pub fn balance_field(&self) -> Option<Amount> {
        match self {
            Block::Send(b) => Some(b.balance),
            Block::State(b) => Some(b.balance),
            _ => None,
        }
    }

    /// The legacy `source` or the state `link`, read as a block hash.
    pub fn source_or_link(&self) -> BlockHash {
        match self {
            Block::Receive(b) => b.source,
            Block::Open(b) => b.source,
            Block::State(b) => b.link.as_block_hash(),
            Block::Send(_) | Block::Change(_) => BlockHash::ZERO,
        }
    }

    /// The legacy `destination` or the state `link`, read as an account.
    pub fn destination_or_link(&self) -> Account {
        match self {
            Block::Send(b) => b.destination,
            Block::State(b) => b.link.as_account(),
            _ => Account::BURN,
        }
    }

    pub fn link_field(&self) -> Option<Link> {
        match self {
            Block::State(b) => Some(b.link),
            _ => None,
        }
    }

    /// The value proof-of-work is computed over: `previous`, or the account
    /// for the first block of a chain.
    pub fn work_root(&self) -> HashOrAccount {
        match self {
            Block::Open(b) => b.account.into(),
            Block::State(b) if b.previous.is_zero() => b.account.into(),
            other => other.previous().into(),
        }
    }

    pub fn work(&self) -> u64 {
        match self {
            Block::Send(b) => b.work,
            Block::Receive(b) => b.work,
            Block::Open(b) => b.work,
            Block::Change(b) => b.work,
            Block::State(b) => b.work,
        }
    }

    pub fn set_work(&mut self, work: u64) {
        match self {
            Block::Send(b) => b.work = work,
            Block::Receive(b) => b.work = work,
            Block::Open(b) => b.work = work,
            Block::Change(b) => b.work = work,
            Block::State(b) => b.work = work,
        }
    }

    pub fn signature(&self) -> &Signature {
        match self {
            Block::Send(b) => &b.signature,
            Block::Receive(b) => &b.signature,
            Block::Open(b) => &b.signature,
            Block::Change(b) => &b.signature,
            Block::State(b) => &b.signature,
        }
    }

    pub fn set_signature(&mut self, signature: Signature) {
        match self {
            Block::Send(b) => b.signature = signature,
            Block::Receive(b) => b.signature = signature,
            Block::Open(b) => b.signature = signature,
            Block::Change(b) => b.signature = signature,
            Block::State(b) => b.signature = signature,
        }
    }

    /// Sign the block hash with `key`, replacing any existing signature.
    pub fn sign(&mut self, key: &PrivateKey) {
        let hash = self.hash();
        self.set_signature(sign_message(hash.as_bytes(), key));
    }
}
