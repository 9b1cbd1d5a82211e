//! Fundamental types for the lattice node.
//!
//! This crate defines the fixed-size values shared across every other crate in
//! the workspace: block hashes, accounts, dependency keys, amounts, epochs, keys,
//! signatures, timestamps and network identifiers.

pub mod account;
pub mod amount;
pub mod block;
pub mod epoch;
pub mod error;
pub mod hash;
pub mod keys;
pub mod network;
pub mod time;

pub use account::Account;
pub use amount::Amount;
pub use block::BlockHash;
pub use epoch::Epoch;
pub use error::TypesError;
pub use hash::{HashOrAccount, Link};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use network::NetworkId;
pub use time::{Clock, SystemClock, Timestamp};

/// Decode a 64-character hex string into 32 bytes.
pub(crate) fn decode_hex_32(s: &str) -> Result<[u8; 32], TypesError> {
    let bytes = hex::decode(s).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| TypesError::InvalidLength {
            expected: 32,
            actual: v.len(),
        })
}
