//! Events emitted after block-processing commits.

use std::sync::{PoisonError, RwLock};

use lattice_ledger::{Block, ProcessOutcome, SavedBlock};
use lattice_store::Transaction;
use lattice_types::BlockHash;

use crate::block_processor::BlockOrigin;

/// Ledger-level events that observers can subscribe to via the [`EventBus`].
#[derive(Clone, Debug)]
pub enum LedgerEvent {
    /// A block was accepted and written to the ledger.
    BlockProcessed {
        block: Block,
        hash: BlockHash,
        outcome: ProcessOutcome,
        origin: BlockOrigin,
    },
    /// A block was removed to make room for a forced block.
    BlockRolledBack { block: SavedBlock },
}

type Listener = Box<dyn Fn(&LedgerEvent, &dyn Transaction) + Send + Sync>;

/// Synchronous fan-out event bus for ledger events.
///
/// Listeners are invoked inline on the emitting thread with a read
/// transaction opened after the commit that produced the event; keep handlers
/// fast to avoid stalling block processing.
pub struct EventBus {
    listeners: RwLock<Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: Listener) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn has_listeners(&self) -> bool {
        !self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Deliver `events` in order to every listener.
    pub fn emit_all(&self, txn: &dyn Transaction, events: &[LedgerEvent]) {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        for event in events {
            for listener in listeners.iter() {
                listener(event, txn);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
