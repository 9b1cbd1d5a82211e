//! Cryptographic primitives for the lattice node.
//!
//! - **Ed25519** for block signing and signature verification
//! - **Blake2b** for block hashing and proof-of-work
//! - Account encoding with the `lat_` prefix and base32 alphabet

pub mod address;
pub mod hash;
pub mod keys;
pub mod sign;

pub use address::{decode_account, encode_account, AddressError};
pub use hash::{blake2b_256, blake2b_256_multi, blake2b_64_multi};
pub use keys::{keypair_from_private, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
