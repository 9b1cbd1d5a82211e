//! PoW generation (multi-threaded CPU).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rayon::prelude::*;

use crate::validator::work_value;
use crate::WorkError;
use lattice_types::HashOrAccount;

/// Nonces tried per thread between checks of the found/cancel flags.
const BATCH_SIZE: u64 = 4096;

/// Generates proof-of-work by splitting the nonce space across the rayon pool.
#[derive(Default)]
pub struct WorkGenerator {
    cancelled: AtomicBool,
}

impl WorkGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort any in-flight and future `generate` calls.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Find a nonce whose work value over `root` is at least `threshold`.
    ///
    /// The first thread to find a valid nonce signals the others to stop.
    pub fn generate(&self, root: &HashOrAccount, threshold: u64) -> Result<u64, WorkError> {
        if threshold == 0 {
            return Ok(0);
        }

        let found = AtomicU64::new(u64::MAX);
        let done = AtomicBool::new(false);
        let num_threads = rayon::current_num_threads().max(1) as u64;

        (0..num_threads).into_par_iter().for_each(|thread_id| {
            let mut nonce = thread_id;
            loop {
                if done.load(Ordering::Relaxed) || self.cancelled.load(Ordering::Relaxed) {
                    return;
                }
                for _ in 0..BATCH_SIZE {
                    if work_value(root, nonce) >= threshold {
                        if !done.swap(true, Ordering::AcqRel) {
                            found.store(nonce, Ordering::Release);
                        }
                        return;
                    }
                    nonce = match nonce.checked_add(num_threads) {
                        Some(next) => next,
                        None => return,
                    };
                }
            }
        });

        if done.load(Ordering::Acquire) {
            Ok(found.load(Ordering::Acquire))
        } else {
            Err(WorkError::Cancelled)
        }
    }
}
