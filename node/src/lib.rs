//! Block ingestion for a lattice node.
//!
//! The [`BlockProcessor`] is the single entry point through which blocks reach
//! the ledger. It owns the processing queues, the unchecked map and the
//! signature verification pool, and shares a [`WriteQueue`] with any other
//! subsystem that writes to the store.

pub mod block_processor;
pub mod config;
pub mod error;
pub mod ledger_event;
pub mod logging;
pub mod metrics;
pub mod shutdown;
pub mod signature_checker;
pub mod unchecked;
pub mod write_queue;

pub use block_processor::{
    BlockOrigin, BlockProcessor, CandidateBlock, ContainerInfo, PendingEntry, VerificationState,
};
pub use config::{BlockProcessorConfig, NodeConfig};
pub use error::NodeError;
pub use ledger_event::{EventBus, LedgerEvent};
pub use logging::{init_logging, LogFormat};
pub use metrics::BlockProcessorMetrics;
pub use shutdown::ShutdownController;
pub use signature_checker::{SignatureCheck, SignatureChecker};
pub use unchecked::{UncheckedEntry, UncheckedMap};
pub use write_queue::{WriteGuard, WriteQueue, Writer};
