//! PoW validation.

use lattice_crypto::blake2b_64_multi;
use lattice_types::HashOrAccount;

/// The work value of `nonce` over `root`: Blake2b-64(nonce_le || root), read
/// little-endian. Higher is harder.
pub fn work_value(root: &HashOrAccount, nonce: u64) -> u64 {
    u64::from_le_bytes(blake2b_64_multi(&[&nonce.to_le_bytes(), root.as_bytes()]))
}

/// Validate that a work nonce meets the threshold for a given root.
pub fn validate_work(root: &HashOrAccount, nonce: u64, threshold: u64) -> bool {
    work_value(root, nonce) >= threshold
}
