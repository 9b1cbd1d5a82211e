//! Anti-spam proof-of-work.
//!
//! Every block carries a 64-bit nonce whose Blake2b value over the block's
//! work root (its `previous` hash, or its account for the first block of a
//! chain) must clear a per-kind threshold.

pub mod error;
pub mod generator;
pub mod thresholds;
pub mod validator;

pub use error::WorkError;
pub use generator::WorkGenerator;
pub use thresholds::{WorkBlockKind, WorkThresholds};
pub use validator::{validate_work, work_value};
