//! Batched Ed25519 verification off the write path.

use lattice_crypto::verify_signature;
use lattice_types::{Account, BlockHash, Signature};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// One block signature to check against the account expected to sign it.
#[derive(Clone, Debug)]
pub struct SignatureCheck {
    pub hash: BlockHash,
    pub signer: Account,
    pub signature: Signature,
}

impl SignatureCheck {
    fn is_valid(&self) -> bool {
        verify_signature(
            self.hash.as_bytes(),
            &self.signature,
            &self.signer.public_key(),
        )
    }
}

/// Verifies batches of signatures on a dedicated thread pool.
///
/// Small batches are checked on the calling thread; the pool only pays off
/// once there is enough work to split.
pub struct SignatureChecker {
    pool: Option<ThreadPool>,
}

impl SignatureChecker {
    /// Batches up to this size are verified on the calling thread.
    pub const SERIAL_LIMIT: usize = 16;

    /// `threads == 0` verifies everything on the calling thread.
    pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = if threads == 0 {
            None
        } else {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("sig_check_{i}"))
                    .build()?,
            )
        };
        Ok(Self { pool })
    }

    /// One result per check, in input order. A malformed key or signature is
    /// reported as `false`.
    pub fn verify(&self, checks: &[SignatureCheck]) -> Vec<bool> {
        match &self.pool {
            Some(pool) if checks.len() > Self::SERIAL_LIMIT => {
                pool.install(|| checks.par_iter().map(SignatureCheck::is_valid).collect())
            }
            _ => checks.iter().map(SignatureCheck::is_valid).collect(),
        }
    }
}
