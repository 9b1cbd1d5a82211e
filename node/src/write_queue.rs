//! Single-writer arbitration for ledger write transactions.
//!
//! Every subsystem that mutates the ledger queues here before opening a write
//! transaction. Writers are served in arrival order; a writer that
//! [`Writer::is_prioritized`] and has waited longer than the priority bump
//! moves to the head of the waiting line, so block processing cannot starve
//! behind a steady stream of other writers.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Distinct areas where write locking is done.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Writer {
    BlockProcessor,
    ConfirmationHeight,
    Pruning,
    /// Used in tests to emulate a competing writer.
    Testing,
}

impl Writer {
    pub fn is_prioritized(&self) -> bool {
        matches!(self, Writer::BlockProcessor)
    }
}

struct Waiter {
    ticket: u64,
    writer: Writer,
}

#[derive(Default)]
struct QueueState {
    /// The front entry holds the lock.
    waiting: VecDeque<Waiter>,
    next_ticket: u64,
}

struct Shared {
    state: Mutex<QueueState>,
    condition: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct WriteQueue {
    shared: Arc<Shared>,
    priority_bump: Duration,
}

impl WriteQueue {
    pub fn new(priority_bump: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                condition: Condvar::new(),
            }),
            priority_bump,
        }
    }

    /// Block until `writer` is at the head of the queue. Other writers wait
    /// until the returned guard is dropped.
    pub fn wait(&self, writer: Writer) -> WriteGuard {
        let mut state = self.shared.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiting.push_back(Waiter { ticket, writer });

        let started = Instant::now();
        let mut bumped = !writer.is_prioritized();
        while state.waiting.front().map(|w| w.ticket) != Some(ticket) {
            if bumped {
                state = self
                    .shared
                    .condition
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            }
            let remaining = self.priority_bump.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                move_behind_holder(&mut state.waiting, ticket);
                debug!(?writer, "write priority bumped");
                bumped = true;
            } else {
                state = self
                    .shared
                    .condition
                    .wait_timeout(state, remaining)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        }

        WriteGuard {
            shared: Arc::clone(&self.shared),
            ticket,
        }
    }

    /// Whether a writer other than the current holder is waiting.
    pub fn awaiting_write(&self) -> bool {
        self.shared.lock().waiting.len() > 1
    }

    /// Whether `writer` holds or waits for the lock.
    pub fn contains(&self, writer: Writer) -> bool {
        self.shared.lock().waiting.iter().any(|w| w.writer == writer)
    }

    pub fn len(&self) -> usize {
        self.shared.lock().waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Move `ticket` to the first waiting position after the lock holder.
fn move_behind_holder(waiting: &mut VecDeque<Waiter>, ticket: u64) {
    if let Some(position) = waiting.iter().position(|w| w.ticket == ticket) {
        if position > 1 {
            if let Some(waiter) = waiting.remove(position) {
                waiting.insert(1, waiter);
            }
        }
    }
}

/// Exclusive right to write to the ledger; released on drop.
pub struct WriteGuard {
    shared: Arc<Shared>,
    ticket: u64,
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if let Some(position) = state.waiting.iter().position(|w| w.ticket == self.ticket) {
            state.waiting.remove(position);
        }
        drop(state);
        self.shared.condition.notify_all();
    }
}
