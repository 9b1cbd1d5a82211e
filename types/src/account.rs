//! Account identifier.
//!
//! An account is the Ed25519 public key that owns a chain in the block-lattice.
//! The human-readable `lat_` encoding lives in `lattice-crypto` because it
//! needs a Blake2b checksum; here the account prints as plain hex.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{PublicKey, TypesError};

/// A 32-byte account (the owner's public key).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Account([u8; 32]);

impl Account {
    /// The all-zero account. Nobody holds its private key, so funds sent here
    /// are burned and the account can never be opened.
    pub const BURN: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0)
    }
}

impl From<PublicKey> for Account {
    fn from(key: PublicKey) -> Self {
        Self(key.0)
    }
}

impl From<&PublicKey> for Account {
    fn from(key: &PublicKey) -> Self {
        Self(key.0)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account({}\u{2026})", hex::encode_upper(&self.0[..4]))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl FromStr for Account {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::decode_hex_32(s).map(Self)
    }
}
