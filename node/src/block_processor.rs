//! Block ingestion pipeline.
//!
//! Producers hand blocks to [`BlockProcessor::add`], [`BlockProcessor::add_local`]
//! or [`BlockProcessor::force`]. A dedicated `blck_processing` thread drains the
//! forced queue and then the normal queue into batches. Each batch has its
//! signatures checked on the [`SignatureChecker`] pool, is classified and
//! applied inside one write transaction taken from the [`WriteQueue`], and is
//! committed as a unit. Blocks with a missing dependency wait in the
//! [`UncheckedMap`] and are queued again, ahead of new arrivals, once the
//! dependency is written.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

use lattice_ledger::{Block, Ledger, LedgerError, ProcessOutcome, SignatureVerification};
use lattice_store::{Transaction, WriteTransaction};
use lattice_types::{BlockHash, HashOrAccount};
use tracing::{debug, error, info, trace, warn};

use crate::config::BlockProcessorConfig;
use crate::ledger_event::{EventBus, LedgerEvent};
use crate::metrics::BlockProcessorMetrics;
use crate::signature_checker::{SignatureCheck, SignatureChecker};
use crate::unchecked::{UncheckedEntry, UncheckedMap};
use crate::write_queue::{WriteQueue, Writer};
use crate::NodeError;

/// Where an incoming block originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockOrigin {
    /// Submitted by this node (wallet, import, replay from local storage).
    Local,
    /// Received from a peer.
    Remote,
}

/// What is known about a candidate's signature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerificationState {
    #[default]
    Unverified,
    Verified,
    Failed,
}

/// A block together with ingestion metadata.
#[derive(Clone, Debug)]
pub struct CandidateBlock {
    pub block: Block,
    pub hash: BlockHash,
    pub origin: BlockOrigin,
    pub arrival_time: Instant,
    /// Set only by the processing loop; callers always submit unverified.
    pub(crate) verification: VerificationState,
}

impl CandidateBlock {
    pub fn new(block: Block, origin: BlockOrigin) -> Self {
        Self {
            hash: block.hash(),
            block,
            origin,
            arrival_time: Instant::now(),
            verification: VerificationState::Unverified,
        }
    }

    pub(crate) fn with_verification(mut self, verification: VerificationState) -> Self {
        self.verification = verification;
        self
    }
}

/// A queued candidate.
#[derive(Clone, Debug)]
pub struct PendingEntry {
    pub candidate: CandidateBlock,
    /// The dependency whose arrival released this entry from the unchecked map.
    pub requeue_reason: Option<HashOrAccount>,
    /// Batches this entry was part of that failed on a storage fault.
    pub retries: u32,
}

impl PendingEntry {
    fn new(candidate: CandidateBlock) -> Self {
        Self {
            candidate,
            requeue_reason: None,
            retries: 0,
        }
    }
}

/// Queue sizes for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContainerInfo {
    pub queue: usize,
    pub forced: usize,
    pub unchecked: usize,
}

#[derive(Default)]
struct QueueState {
    normal: VecDeque<PendingEntry>,
    forced: VecDeque<PendingEntry>,
    /// A batch has been taken off the queues and is not finished yet.
    in_flight: bool,
    /// The processing thread has been spawned and not yet exited.
    running: bool,
    stopped: bool,
}

impl QueueState {
    fn len(&self) -> usize {
        self.normal.len() + self.forced.len()
    }

    fn has_work(&self) -> bool {
        !self.normal.is_empty() || !self.forced.is_empty()
    }
}

struct BatchItem {
    entry: PendingEntry,
    forced: bool,
}

/// The committed part of a batch.
struct WrittenBatch {
    /// One per processed item, in batch order. May be shorter than the batch.
    outcomes: Vec<ProcessOutcome>,
    /// In commit order.
    events: Vec<LedgerEvent>,
    /// Unchecked entries whose dependency this batch wrote.
    released: Vec<(HashOrAccount, UncheckedEntry)>,
}

pub struct BlockProcessor {
    inner: Arc<Inner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl BlockProcessor {
    pub fn new(
        config: BlockProcessorConfig,
        ledger: Arc<Ledger>,
        write_queue: Arc<WriteQueue>,
    ) -> Result<Self, NodeError> {
        let signature_checker = SignatureChecker::new(config.resolved_signature_threads())?;
        let inner = Inner {
            unchecked: Mutex::new(UncheckedMap::new(config.unchecked_max_size)),
            config,
            ledger,
            write_queue,
            signature_checker,
            events: EventBus::new(),
            metrics: Arc::new(BlockProcessorMetrics::new()),
            state: Mutex::new(QueueState::default()),
            condition: Condvar::new(),
            last_slow_log: Mutex::new(None),
        };
        Ok(Self {
            inner: Arc::new(inner),
            thread: Mutex::new(None),
        })
    }

    /// Spawn the processing thread. Calling it again is a no-op.
    pub fn start(&self) -> Result<(), NodeError> {
        let mut thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        if thread.is_some() {
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        let handle = std::thread::Builder::new()
            .name("blck_processing".to_string())
            .spawn(move || inner.run())?;
        *thread = Some(handle);
        self.inner.lock_state().running = true;
        info!("block processor started");
        Ok(())
    }

    /// Stop accepting blocks, let the in-flight batch commit, and join the
    /// processing thread. Queued and unchecked blocks are discarded.
    pub fn stop(&self) {
        {
            let mut state = self.inner.lock_state();
            state.stopped = true;
            state.normal.clear();
            state.forced.clear();
            self.inner.update_queue_gauges(&state);
        }
        self.inner.condition.notify_all();

        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("block processing thread panicked");
            }
        }

        {
            let mut state = self.inner.lock_state();
            state.in_flight = false;
            state.running = false;
        }
        self.inner.lock_unchecked().clear();
        self.inner.metrics.unchecked_count.set(0);
        self.inner.condition.notify_all();
    }

    /// Queue a block received from the network.
    ///
    /// Returns `false` when the block was dropped because the queue is
    /// [`full`](Self::full) or the processor is stopped.
    pub fn add(&self, block: Block) -> bool {
        self.add_candidate(CandidateBlock::new(block, BlockOrigin::Remote))
    }

    /// Queue a block this node already trusts. Only refused once stopped.
    pub fn add_local(&self, block: Block) -> bool {
        self.add_candidate(CandidateBlock::new(block, BlockOrigin::Local))
    }

    /// Queue a candidate; only remote candidates are subject to [`full`](Self::full).
    pub fn add_candidate(&self, mut candidate: CandidateBlock) -> bool {
        candidate.verification = VerificationState::Unverified;
        let respect_full = candidate.origin == BlockOrigin::Remote;
        self.inner.enqueue(candidate, false, respect_full)
    }

    /// Queue a block on the forced path. It is processed before the next
    /// normal batch, and whatever block occupies its slot is rolled back
    /// first.
    pub fn force(&self, block: Block) -> bool {
        self.inner
            .enqueue(CandidateBlock::new(block, BlockOrigin::Local), true, false)
    }

    /// Block until both queues are empty and no batch is in flight, or the
    /// processor is stopped. Returns at once if [`start`](Self::start) was
    /// never called, since nothing would drain the queues.
    pub fn flush(&self) {
        let state = self.inner.lock_state();
        let _state = self
            .inner
            .condition
            .wait_while(state, |s| {
                s.running && !s.stopped && (s.has_work() || s.in_flight)
            })
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Classify and apply one block right away, outside the batched path.
    ///
    /// Blocks released from the unchecked map by it are queued normally.
    pub fn process_blocking(&self, block: Block) -> Result<ProcessOutcome, NodeError> {
        if self.inner.lock_state().stopped {
            return Err(NodeError::Stopped);
        }
        let batch = [BatchItem {
            entry: PendingEntry::new(CandidateBlock::new(block, BlockOrigin::Local)),
            forced: false,
        }];
        let written = self
            .inner
            .write_batch(&batch, &[SignatureVerification::Unknown])?;
        let outcome = written
            .outcomes
            .first()
            .copied()
            .ok_or_else(|| NodeError::Ledger(LedgerError::Inconsistent("empty batch".into())))?;
        self.inner.requeue(Vec::new(), written.released);
        self.inner.publish(&written.events);
        Ok(outcome)
    }

    /// Number of queued blocks, normal and forced.
    pub fn size(&self) -> usize {
        self.inner.lock_state().len()
    }

    pub fn full(&self) -> bool {
        self.size() >= self.inner.config.max_queue_size
    }

    pub fn half_full(&self) -> bool {
        self.size() >= self.inner.config.max_queue_size / 2
    }

    pub fn unchecked_len(&self) -> usize {
        self.inner.lock_unchecked().len()
    }

    pub fn container_info(&self) -> ContainerInfo {
        let (queue, forced) = {
            let state = self.inner.lock_state();
            (state.normal.len(), state.forced.len())
        };
        ContainerInfo {
            queue,
            forced,
            unchecked: self.unchecked_len(),
        }
    }

    /// Register a listener for events produced by committed batches.
    pub fn subscribe(&self, listener: Box<dyn Fn(&LedgerEvent, &dyn Transaction) + Send + Sync>) {
        self.inner.events.subscribe(listener);
    }

    pub fn metrics(&self) -> &Arc<BlockProcessorMetrics> {
        &self.inner.metrics
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.inner.ledger
    }
}

impl Drop for BlockProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Inner {
    config: BlockProcessorConfig,
    ledger: Arc<Ledger>,
    write_queue: Arc<WriteQueue>,
    signature_checker: SignatureChecker,
    unchecked: Mutex<UncheckedMap>,
    events: EventBus,
    metrics: Arc<BlockProcessorMetrics>,
    state: Mutex<QueueState>,
    /// Wakes the processing thread on new work or stop, and flush waiters
    /// when a batch finishes.
    condition: Condvar,
    last_slow_log: Mutex<Option<Instant>>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_unchecked(&self) -> MutexGuard<'_, UncheckedMap> {
        self.unchecked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, candidate: CandidateBlock, forced: bool, respect_full: bool) -> bool {
        let mut state = self.lock_state();
        if state.stopped {
            return false;
        }
        if respect_full && state.len() >= self.config.max_queue_size {
            debug!(block_hash = %candidate.hash, "block queue full, dropping block");
            return false;
        }
        let entry = PendingEntry::new(candidate);
        if forced {
            state.forced.push_back(entry);
        } else {
            state.normal.push_back(entry);
        }
        self.update_queue_gauges(&state);
        drop(state);
        self.condition.notify_all();
        true
    }

    fn update_queue_gauges(&self, state: &QueueState) {
        self.metrics.queue_size.set(state.normal.len() as i64);
        self.metrics.forced_size.set(state.forced.len() as i64);
    }

    fn run(&self) {
        let mut last_cleanup = Instant::now();
        let mut state = self.lock_state();
        loop {
            if state.stopped {
                break;
            }
            if !state.has_work() {
                self.condition.notify_all();
                state = self
                    .condition
                    .wait_while(state, |s| !s.stopped && !s.has_work())
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            }

            let batch = self.take_batch(&mut state);
            state.in_flight = true;
            drop(state);

            let failed = self.process_batch(batch);
            if last_cleanup.elapsed() >= self.config.unchecked_cleanup_interval() {
                self.cleanup_unchecked();
                last_cleanup = Instant::now();
            }

            state = self.lock_state();
            state.in_flight = false;
            self.update_queue_gauges(&state);
            self.condition.notify_all();
            if failed {
                state = self
                    .condition
                    .wait_timeout_while(state, self.config.retry_backoff(), |s| !s.stopped)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        }
        state.in_flight = false;
        state.running = false;
        drop(state);
        self.condition.notify_all();
        debug!("block processing thread exiting");
    }

    /// Forced entries first, then normal ones.
    fn take_batch(&self, state: &mut QueueState) -> Vec<BatchItem> {
        let forced = state.forced.len().min(self.config.max_forced_batch);
        let normal = state.normal.len().min(self.config.batch_size);
        let mut batch = Vec::with_capacity(forced + normal);
        batch.extend(state.forced.drain(..forced).map(|entry| BatchItem {
            entry,
            forced: true,
        }));
        batch.extend(state.normal.drain(..normal).map(|entry| BatchItem {
            entry,
            forced: false,
        }));
        batch
    }

    /// Returns `true` when the batch failed and was put back for a retry.
    fn process_batch(&self, mut batch: Vec<BatchItem>) -> bool {
        let verifications = self.verify_signatures(&batch);
        let started = Instant::now();
        match self.write_batch(&batch, &verifications) {
            Ok(written) => {
                let elapsed = started.elapsed();
                self.metrics
                    .batch_duration_ms
                    .observe(elapsed.as_secs_f64() * 1000.0);
                let leftover = batch.split_off(written.outcomes.len().min(batch.len()));
                debug!(
                    processed = written.outcomes.len(),
                    deferred = leftover.len(),
                    released = written.released.len(),
                    "batch committed"
                );
                self.log_if_slow(written.outcomes.len(), elapsed);
                self.requeue(leftover, written.released);
                self.publish(&written.events);
                false
            }
            Err(e) => {
                warn!(error = %e, batch_size = batch.len(), "block batch failed, will retry");
                self.requeue_failed(batch);
                true
            }
        }
    }

    /// Check every signature whose signer is already known, before the write
    /// transaction is taken. The rest are left to the classifier.
    fn verify_signatures(&self, batch: &[BatchItem]) -> Vec<SignatureVerification> {
        let mut verifications = vec![SignatureVerification::Unknown; batch.len()];
        let txn = match self.ledger.store().tx_begin_read() {
            Ok(txn) => txn,
            Err(e) => {
                warn!(error = %e, "cannot resolve signers, verifying inline");
                return verifications;
            }
        };

        let mut checks = Vec::new();
        let mut positions = Vec::new();
        for (position, item) in batch.iter().enumerate() {
            let candidate = &item.entry.candidate;
            match candidate.verification {
                VerificationState::Verified => {
                    verifications[position] = SignatureVerification::Valid
                }
                VerificationState::Failed => {
                    verifications[position] = SignatureVerification::Invalid
                }
                VerificationState::Unverified => {
                    match self.ledger.signer(&*txn, &candidate.block) {
                        Ok(Some(signer)) => {
                            checks.push(SignatureCheck {
                                hash: candidate.hash,
                                signer,
                                signature: *candidate.block.signature(),
                            });
                            positions.push(position);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            debug!(error = %e, block_hash = %candidate.hash, "signer lookup failed")
                        }
                    }
                }
            }
        }
        drop(txn);

        for (position, valid) in positions
            .into_iter()
            .zip(self.signature_checker.verify(&checks))
        {
            verifications[position] = if valid {
                SignatureVerification::Valid
            } else {
                SignatureVerification::Invalid
            };
        }
        verifications
    }

    /// Classify and apply `batch` under one write transaction, then settle the
    /// unchecked map while still holding the write lock so no other writer can
    /// land a dependency in between.
    fn write_batch(
        &self,
        batch: &[BatchItem],
        verifications: &[SignatureVerification],
    ) -> Result<WrittenBatch, NodeError> {
        let _guard = self.write_queue.wait(Writer::BlockProcessor);
        let started = Instant::now();
        let mut txn = self.ledger.store().tx_begin_write()?;

        let mut outcomes = Vec::with_capacity(batch.len());
        let mut events = Vec::new();
        for (item, verification) in batch.iter().zip(verifications) {
            if !outcomes.is_empty()
                && (started.elapsed() >= self.config.batch_max_time()
                    || self.write_queue.awaiting_write())
            {
                break;
            }
            let candidate = &item.entry.candidate;
            if item.forced {
                self.roll_back_competitor(&mut *txn, candidate, &mut events)?;
            }
            let outcome = self.ledger.process(&mut *txn, &candidate.block, *verification)?;
            trace!(block_hash = %candidate.hash, %outcome, "block processed");
            if outcome == ProcessOutcome::Progress {
                events.push(LedgerEvent::BlockProcessed {
                    block: candidate.block.clone(),
                    hash: candidate.hash,
                    outcome,
                    origin: candidate.origin,
                });
            }
            outcomes.push(outcome);
        }
        txn.commit()?;

        let released = self.update_unchecked(batch, verifications, &outcomes);
        Ok(WrittenBatch {
            outcomes,
            events,
            released,
        })
    }

    /// Remove the block occupying a forced block's slot, with everything that
    /// depends on it.
    fn roll_back_competitor(
        &self,
        txn: &mut dyn WriteTransaction,
        candidate: &CandidateBlock,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), NodeError> {
        let Some(occupant) = self.ledger.competitor(txn.as_read(), &candidate.block)? else {
            return Ok(());
        };
        match self.ledger.rollback(txn, &occupant) {
            Ok(removed) => {
                info!(
                    block_hash = %candidate.hash,
                    occupant = %occupant,
                    removed = removed.len(),
                    "rolled back competitor of forced block"
                );
                events.extend(
                    removed
                        .into_iter()
                        .map(|block| LedgerEvent::BlockRolledBack { block }),
                );
                Ok(())
            }
            Err(LedgerError::GenesisRollback) => {
                warn!(block_hash = %candidate.hash, "forced block competes with genesis");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_unchecked(
        &self,
        batch: &[BatchItem],
        verifications: &[SignatureVerification],
        outcomes: &[ProcessOutcome],
    ) -> Vec<(HashOrAccount, UncheckedEntry)> {
        let now = Instant::now();
        let mut released = Vec::new();
        let mut unchecked = self.lock_unchecked();
        for ((item, verification), outcome) in batch.iter().zip(verifications).zip(outcomes) {
            self.metrics.record_outcome(*outcome);
            let candidate = &item.entry.candidate;
            let dependency = match outcome {
                ProcessOutcome::GapPrevious => candidate.block.previous(),
                ProcessOutcome::GapSource => candidate.block.source_or_link(),
                ProcessOutcome::Progress => {
                    let key = HashOrAccount::from(candidate.hash);
                    released.extend(unchecked.resolve(&key).into_iter().map(|e| (key, e)));
                    continue;
                }
                _ => continue,
            };
            if dependency.is_zero() {
                continue;
            }
            let mut waiting = candidate.clone();
            if *verification == SignatureVerification::Valid {
                waiting.verification = VerificationState::Verified;
            }
            if !unchecked.register(dependency.into(), waiting, now) {
                debug!(block_hash = %candidate.hash, "unchecked block not stored");
            }
        }
        self.metrics.unchecked_count.set(unchecked.len() as i64);
        released
    }

    /// Put unprocessed batch entries back at the front of their queues, with
    /// released dependents ahead of them on the normal queue.
    fn requeue(&self, leftover: Vec<BatchItem>, released: Vec<(HashOrAccount, UncheckedEntry)>) {
        if leftover.is_empty() && released.is_empty() {
            return;
        }
        let mut state = self.lock_state();
        if state.stopped {
            return;
        }
        for item in leftover.into_iter().rev() {
            if item.forced {
                state.forced.push_front(item.entry);
            } else {
                state.normal.push_front(item.entry);
            }
        }
        for (key, entry) in released.into_iter().rev() {
            trace!(
                block_hash = %entry.candidate.hash,
                dependency = %key,
                "requeueing unchecked block"
            );
            state.normal.push_front(PendingEntry {
                candidate: entry.candidate,
                requeue_reason: Some(key),
                retries: 0,
            });
        }
        self.update_queue_gauges(&state);
        drop(state);
        self.condition.notify_all();
    }

    fn requeue_failed(&self, batch: Vec<BatchItem>) {
        let mut retry = Vec::with_capacity(batch.len());
        for mut item in batch {
            item.entry.retries += 1;
            if item.entry.retries > self.config.max_batch_retries {
                warn!(
                    block_hash = %item.entry.candidate.hash,
                    retries = item.entry.retries,
                    "dropping block after repeated batch failures"
                );
            } else {
                retry.push(item);
            }
        }
        self.requeue(retry, Vec::new());
    }

    fn publish(&self, events: &[LedgerEvent]) {
        let rolled_back = events
            .iter()
            .filter(|e| matches!(e, LedgerEvent::BlockRolledBack { .. }))
            .count();
        self.metrics.rollbacks.inc_by(rolled_back as u64);

        if events.is_empty() || !self.events.has_listeners() {
            return;
        }
        match self.ledger.store().tx_begin_read() {
            Ok(txn) => self.events.emit_all(&*txn, events),
            Err(e) => error!(error = %e, "cannot open read transaction for event delivery"),
        }
    }

    fn log_if_slow(&self, processed: usize, elapsed: std::time::Duration) {
        if elapsed < self.config.slow_batch_threshold() {
            return;
        }
        let mut last = self
            .last_slow_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if (*last).is_some_and(|at| at.elapsed() < self.config.log_interval()) {
            return;
        }
        *last = Some(Instant::now());
        warn!(
            processed,
            elapsed_ms = elapsed.as_millis() as u64,
            "block processing batch was slow"
        );
    }

    fn cleanup_unchecked(&self) {
        let mut unchecked = self.lock_unchecked();
        let removed = unchecked.clear_expired(self.config.unchecked_max_age(), Instant::now());
        self.metrics.unchecked_count.set(unchecked.len() as i64);
        if removed > 0 {
            debug!(removed, remaining = unchecked.len(), "expired unchecked blocks");
        }
    }
}
