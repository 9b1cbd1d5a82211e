//! End-to-end tests of the block processor: queueing, batching, dependency
//! resolution, forced rollback and storage faults, against the in-memory
//! store and against LMDB.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use lattice_crypto::keypair_from_seed;
use lattice_ledger::{
    dev_genesis_key, Block, BlockBuilder, Ledger, LedgerConstants, ProcessOutcome,
};
use lattice_node::{
    BlockOrigin, BlockProcessor, BlockProcessorConfig, LedgerEvent, WriteQueue, Writer,
};
use lattice_nullables::NullStore;
use lattice_store::{LedgerStore, Transaction};
use lattice_store_lmdb::LmdbEnvironment;
use lattice_types::{Account, Amount, BlockHash, KeyPair, Link, Signature};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config() -> BlockProcessorConfig {
    BlockProcessorConfig {
        signature_threads: 2,
        retry_backoff_ms: 5,
        ..Default::default()
    }
}

struct Harness {
    processor: BlockProcessor,
    write_queue: Arc<WriteQueue>,
    builder: BlockBuilder,
    genesis: KeyPair,
    events: Arc<Mutex<Vec<LedgerEvent>>>,
}

impl Harness {
    fn new(store: Arc<dyn LedgerStore>, config: BlockProcessorConfig) -> Self {
        let constants = LedgerConstants::dev();
        let builder = BlockBuilder::new(&constants);
        let ledger = Arc::new(Ledger::new(store.clone(), constants).unwrap());
        let write_queue = Arc::new(WriteQueue::new(config.write_priority_bump()));
        let processor = BlockProcessor::new(config, ledger, write_queue.clone()).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        processor.subscribe(Box::new(move |event: &LedgerEvent, _txn: &dyn Transaction| {
            sink.lock().unwrap().push(event.clone());
        }));

        Self {
            processor,
            write_queue,
            builder,
            genesis: dev_genesis_key(),
            events,
        }
    }

    fn null(config: BlockProcessorConfig) -> (Arc<NullStore>, Self) {
        let store = Arc::new(NullStore::new());
        let harness = Self::new(store.clone(), config);
        (store, harness)
    }

    fn started(config: BlockProcessorConfig) -> (Arc<NullStore>, Self) {
        let (store, harness) = Self::null(config);
        harness.processor.start().unwrap();
        (store, harness)
    }

    fn genesis_hash(&self) -> BlockHash {
        self.processor.ledger().genesis_hash()
    }

    fn exists(&self, hash: &BlockHash) -> bool {
        self.processor.ledger().get_block(hash).unwrap().is_some()
    }

    fn block_count(&self) -> u64 {
        self.processor.ledger().block_count().unwrap()
    }

    /// State send from genesis leaving `Amount::MAX - sent` behind.
    fn send(&self, previous: BlockHash, sent: u128, to: Account) -> Block {
        let remaining = Amount::MAX.checked_sub(Amount::raw(sent)).unwrap();
        self.builder
            .state(&self.genesis, previous, self.genesis.account(), remaining, Link::from(to))
            .unwrap()
    }

    /// A chain of `count` one-raw sends from genesis.
    fn send_chain(&self, count: u128, to: Account) -> Vec<Block> {
        let mut previous = self.genesis_hash();
        (1..=count)
            .map(|sent| {
                let block = self.send(previous, sent, to);
                previous = block.hash();
                block
            })
            .collect()
    }

    fn open(&self, key: &KeyPair, source: BlockHash, amount: u128) -> Block {
        self.builder
            .state(key, BlockHash::ZERO, key.account(), Amount::raw(amount), Link::from(source))
            .unwrap()
    }

    fn processed_hashes(&self) -> Vec<BlockHash> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                LedgerEvent::BlockProcessed { hash, .. } => Some(*hash),
                LedgerEvent::BlockRolledBack { .. } => None,
            })
            .collect()
    }

    fn rolled_back_hashes(&self) -> Vec<BlockHash> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                LedgerEvent::BlockRolledBack { block } => Some(block.hash()),
                LedgerEvent::BlockProcessed { .. } => None,
            })
            .collect()
    }

    fn count(&self, outcome: ProcessOutcome) -> u64 {
        self.processor.metrics().outcome_count(outcome)
    }
}

// ---------------------------------------------------------------------------
// Idempotence and ordering
// ---------------------------------------------------------------------------

#[test]
fn duplicate_block_is_progress_once_then_old() {
    let (_store, h) = Harness::started(test_config());
    let send = h.send(h.genesis_hash(), 10, Account::new([1; 32]));

    assert!(h.processor.add(send.clone()));
    h.processor.flush();
    let count_after_first = h.block_count();
    assert!(h.processor.add(send.clone()));
    h.processor.flush();

    assert_eq!(h.block_count(), count_after_first);
    assert_eq!(h.count(ProcessOutcome::Progress), 1);
    assert_eq!(h.count(ProcessOutcome::Old), 1);
    assert_eq!(h.processed_hashes(), vec![send.hash()]);
}

#[test]
fn child_before_parent_is_replayed_after_parent() {
    let (_store, h) = Harness::started(test_config());
    let chain = h.send_chain(3, Account::new([1; 32]));

    for block in chain.iter().rev() {
        assert!(h.processor.add(block.clone()));
    }
    h.processor.flush();

    for block in &chain {
        assert!(h.exists(&block.hash()));
    }
    assert_eq!(h.count(ProcessOutcome::GapPrevious), 2);
    assert_eq!(h.processor.unchecked_len(), 0);
    let expected: Vec<_> = chain.iter().map(Block::hash).collect();
    assert_eq!(h.processed_hashes(), expected);
}

#[test]
fn open_before_send_waits_on_source() {
    let (_store, h) = Harness::started(test_config());
    let key = keypair_from_seed(&[7; 32]);
    let send = h.send(h.genesis_hash(), 50, key.account());
    let open = h.open(&key, send.hash(), 50);

    h.processor.add(open.clone());
    h.processor.flush();
    assert!(!h.exists(&open.hash()));
    assert_eq!(h.count(ProcessOutcome::GapSource), 1);
    assert_eq!(h.processor.unchecked_len(), 1);

    h.processor.add(send.clone());
    h.processor.flush();
    assert!(h.exists(&open.hash()));
    let info = h
        .processor
        .ledger()
        .get_account_info(&key.account())
        .unwrap()
        .unwrap();
    assert_eq!(info.balance, Amount::raw(50));
    assert_eq!(h.processed_hashes(), vec![send.hash(), open.hash()]);
}

#[test]
fn replayed_receive_waits_again_on_missing_source() {
    let (_store, h) = Harness::started(test_config());
    let key = keypair_from_seed(&[8; 32]);
    let first = h.send(h.genesis_hash(), 30, key.account());
    let second = h.send(first.hash(), 50, key.account());
    let open = h.open(&key, first.hash(), 30);
    let receive = h
        .builder
        .state(&key, open.hash(), key.account(), Amount::raw(50), Link::from(second.hash()))
        .unwrap();

    h.processor.add(receive.clone());
    h.processor.flush();
    assert_eq!(h.count(ProcessOutcome::GapPrevious), 1);
    assert_eq!(h.processor.unchecked_len(), 1);

    // The open releases the receive, which now lacks its source.
    h.processor.add(first.clone());
    h.processor.add(open.clone());
    h.processor.flush();
    assert!(h.exists(&open.hash()));
    assert!(!h.exists(&receive.hash()));
    assert_eq!(h.processor.unchecked_len(), 1);
    assert_eq!(h.count(ProcessOutcome::GapPrevious), 1);
    assert_eq!(h.count(ProcessOutcome::GapSource), 1);

    h.processor.add(second.clone());
    h.processor.flush();
    assert!(h.exists(&receive.hash()));
    assert_eq!(h.processor.unchecked_len(), 0);
    let info = h
        .processor
        .ledger()
        .get_account_info(&key.account())
        .unwrap()
        .unwrap();
    assert_eq!(info.head, receive.hash());
    assert_eq!(info.balance, Amount::raw(50));
}

#[test]
fn replay_ends_in_same_state_as_ordered_submission() {
    let (_ordered_store, ordered) = Harness::started(test_config());
    let (_reversed_store, reversed) = Harness::started(test_config());
    let chain = ordered.send_chain(4, Account::new([2; 32]));

    for block in &chain {
        ordered.processor.add(block.clone());
    }
    for block in chain.iter().rev() {
        reversed.processor.add(block.clone());
    }
    ordered.processor.flush();
    reversed.processor.flush();

    let genesis = ordered.genesis.account();
    let ordered_info = ordered.processor.ledger().get_account_info(&genesis).unwrap().unwrap();
    let reversed_info = reversed.processor.ledger().get_account_info(&genesis).unwrap().unwrap();
    assert_eq!(ordered_info.head, reversed_info.head);
    assert_eq!(ordered_info.balance, reversed_info.balance);
    assert_eq!(ordered_info.block_count, reversed_info.block_count);
    assert_eq!(ordered.block_count(), reversed.block_count());
}

// ---------------------------------------------------------------------------
// Forks
// ---------------------------------------------------------------------------

#[test]
fn first_of_two_forks_wins() {
    let (_store, h) = Harness::started(test_config());
    let first = h.send(h.genesis_hash(), 1, Account::new([1; 32]));
    let second = h.send(h.genesis_hash(), 2, Account::new([1; 32]));

    h.processor.add(first.clone());
    h.processor.add(second.clone());
    h.processor.flush();

    assert!(h.exists(&first.hash()));
    assert!(!h.exists(&second.hash()));
    assert_eq!(h.count(ProcessOutcome::Progress), 1);
    assert_eq!(h.count(ProcessOutcome::Fork), 1);
}

#[test]
fn forced_fork_rolls_back_occupant_and_dependents() {
    let (_store, h) = Harness::started(test_config());
    let key = keypair_from_seed(&[3; 32]);
    let original = h.send(h.genesis_hash(), 5, key.account());
    let open = h.open(&key, original.hash(), 5);
    assert_eq!(
        h.processor.process_blocking(original.clone()).unwrap(),
        ProcessOutcome::Progress
    );
    assert_eq!(
        h.processor.process_blocking(open.clone()).unwrap(),
        ProcessOutcome::Progress
    );

    let replacement = h.send(h.genesis_hash(), 9, Account::new([4; 32]));
    assert!(h.processor.force(replacement.clone()));
    h.processor.flush();

    assert!(h.exists(&replacement.hash()));
    assert!(!h.exists(&original.hash()));
    assert!(!h.exists(&open.hash()));
    assert!(h
        .processor
        .ledger()
        .get_account_info(&key.account())
        .unwrap()
        .is_none());

    let rolled_back = h.rolled_back_hashes();
    assert_eq!(rolled_back.len(), 2);
    assert!(rolled_back.contains(&original.hash()));
    assert!(rolled_back.contains(&open.hash()));
    assert_eq!(h.processor.metrics().rollbacks.get(), 2);
    assert_eq!(h.processed_hashes().last(), Some(&replacement.hash()));
}

#[test]
fn forced_block_already_in_ledger_is_old() {
    let (_store, h) = Harness::started(test_config());
    let send = h.send(h.genesis_hash(), 5, Account::new([1; 32]));
    h.processor.process_blocking(send.clone()).unwrap();

    h.processor.force(send.clone());
    h.processor.flush();

    assert!(h.exists(&send.hash()));
    assert!(h.rolled_back_hashes().is_empty());
    assert_eq!(h.count(ProcessOutcome::Old), 1);
}

// ---------------------------------------------------------------------------
// Backpressure and flush
// ---------------------------------------------------------------------------

#[test]
fn full_queue_refuses_remote_but_not_local_or_forced() {
    let (_store, h) = Harness::null(BlockProcessorConfig {
        max_queue_size: 8,
        ..test_config()
    });
    let send = h.send(h.genesis_hash(), 1, Account::new([1; 32]));

    for _ in 0..8 {
        assert!(h.processor.add(send.clone()));
    }
    assert!(h.processor.full());
    assert!(!h.processor.add(send.clone()));
    assert_eq!(h.processor.size(), 8);

    assert!(h.processor.add_local(send.clone()));
    assert!(h.processor.force(send));
    assert_eq!(h.processor.size(), 10);
}

#[test]
fn flush_drains_everything_submitted() {
    let (_store, h) = Harness::started(BlockProcessorConfig {
        batch_size: 4,
        ..test_config()
    });
    let chain = h.send_chain(24, Account::new([1; 32]));
    for block in &chain {
        h.processor.add(block.clone());
    }
    h.processor.flush();

    assert_eq!(h.processor.size(), 0);
    assert_eq!(h.processor.container_info().forced, 0);
    assert!(h.exists(&chain[23].hash()));
    assert!(h.write_queue.is_empty());
}

#[test]
fn flush_on_idle_processor_returns() {
    let (_store, h) = Harness::started(test_config());
    h.processor.flush();
    assert_eq!(h.processor.size(), 0);
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

#[test]
fn bad_signature_never_mutates_ledger() {
    let (_store, h) = Harness::null(test_config());
    let keys: Vec<_> = (10..14).map(|seed| keypair_from_seed(&[seed; 32])).collect();
    let mut previous = h.genesis_hash();
    let mut opens = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        let send = h.send(previous, (i as u128 + 1) * 10, key.account());
        assert_eq!(
            h.processor.process_blocking(send.clone()).unwrap(),
            ProcessOutcome::Progress
        );
        previous = send.hash();
        opens.push(h.open(key, send.hash(), 10));
    }

    // Corrupt every other open block; the hash is unchanged.
    for open in opens.iter_mut().step_by(2) {
        open.set_signature(Signature([0x5a; 64]));
    }
    let count_before = h.block_count();
    h.processor.start().unwrap();
    for open in &opens {
        h.processor.add(open.clone());
    }
    h.processor.flush();

    for (i, open) in opens.iter().enumerate() {
        assert_eq!(h.exists(&open.hash()), i % 2 == 1, "open {i}");
    }
    assert_eq!(h.block_count(), count_before + 2);
    assert_eq!(h.count(ProcessOutcome::BadSignature), 2);
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[test]
fn stop_during_activity_does_not_hang_flush() {
    let (_store, h) = Harness::started(BlockProcessorConfig {
        batch_size: 2,
        ..test_config()
    });
    let h = Arc::new(h);
    let chain = h.send_chain(6, Account::new([1; 32]));
    h.processor.process_blocking(chain[0].clone()).unwrap();

    let producer = {
        let h = h.clone();
        let chain = chain.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                for block in &chain {
                    h.processor.add(block.clone());
                }
            }
        })
    };
    let flusher = {
        let h = h.clone();
        thread::spawn(move || h.processor.flush())
    };

    thread::sleep(Duration::from_millis(20));
    h.processor.stop();
    producer.join().unwrap();
    flusher.join().unwrap();

    assert!(h.exists(&chain[0].hash()));
    assert_eq!(h.processor.size(), 0);
    assert!(!h.processor.add(chain[1].clone()));
}

#[test]
fn flush_woken_by_stop_sees_empty_queues() {
    let (_store, h) = Harness::started(BlockProcessorConfig {
        batch_size: 1,
        ..test_config()
    });
    let h = Arc::new(h);
    let chain = h.send_chain(4, Account::new([1; 32]));

    let guard = h.write_queue.wait(Writer::Testing);
    for block in &chain {
        assert!(h.processor.add(block.clone()));
    }
    while !h.write_queue.contains(Writer::BlockProcessor) {
        thread::sleep(Duration::from_millis(1));
    }

    let flusher = {
        let h = h.clone();
        thread::spawn(move || {
            h.processor.flush();
            h.processor.size()
        })
    };
    let stopper = {
        let h = h.clone();
        thread::spawn(move || h.processor.stop())
    };

    // The first batch is still waiting for the write guard here.
    assert_eq!(flusher.join().unwrap(), 0);
    drop(guard);
    stopper.join().unwrap();

    assert!(h.exists(&chain[0].hash()));
    assert!(!h.exists(&chain[1].hash()));
    assert_eq!(h.processor.size(), 0);
}

// ---------------------------------------------------------------------------
// Write arbitration and faults
// ---------------------------------------------------------------------------

#[test]
fn processor_waits_for_other_writer() {
    let (_store, h) = Harness::started(test_config());
    let send = h.send(h.genesis_hash(), 1, Account::new([1; 32]));

    let guard = h.write_queue.wait(Writer::Testing);
    h.processor.add(send.clone());
    while !h.write_queue.contains(Writer::BlockProcessor) {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(!h.exists(&send.hash()));

    drop(guard);
    h.processor.flush();
    assert!(h.exists(&send.hash()));
}

#[test]
fn failed_commit_is_retried() {
    let (store, h) = Harness::null(test_config());
    let send = h.send(h.genesis_hash(), 1, Account::new([1; 32]));
    store.fail_next_commits(2);

    h.processor.start().unwrap();
    h.processor.add(send.clone());
    h.processor.flush();

    assert!(h.exists(&send.hash()));
    assert_eq!(h.processed_hashes(), vec![send.hash()]);
}

#[test]
fn failed_write_begin_is_retried() {
    let (store, h) = Harness::null(test_config());
    let send = h.send(h.genesis_hash(), 1, Account::new([1; 32]));
    store.fail_next_write_begins(1);

    h.processor.start().unwrap();
    h.processor.add(send.clone());
    h.processor.flush();

    assert!(h.exists(&send.hash()));
}

#[test]
fn process_blocking_reports_storage_error() {
    let (store, h) = Harness::null(test_config());
    let send = h.send(h.genesis_hash(), 1, Account::new([1; 32]));
    store.fail_next_commits(1);

    assert!(h.processor.process_blocking(send.clone()).is_err());
    assert!(!h.exists(&send.hash()));
    assert_eq!(
        h.processor.process_blocking(send).unwrap(),
        ProcessOutcome::Progress
    );
}

#[test]
fn events_carry_origin() {
    let (_store, h) = Harness::started(test_config());
    let chain = h.send_chain(2, Account::new([1; 32]));
    h.processor.add_local(chain[0].clone());
    h.processor.flush();
    h.processor.add(chain[1].clone());
    h.processor.flush();

    let origins: Vec<_> = h
        .events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            LedgerEvent::BlockProcessed { origin, .. } => Some(*origin),
            LedgerEvent::BlockRolledBack { .. } => None,
        })
        .collect();
    assert_eq!(origins, vec![BlockOrigin::Local, BlockOrigin::Remote]);
}

// ---------------------------------------------------------------------------
// LMDB
// ---------------------------------------------------------------------------

#[test]
fn lmdb_backed_processor_persists_batches() {
    let dir = tempfile::tempdir().unwrap();
    let env = Arc::new(LmdbEnvironment::open(dir.path(), 64 * 1024 * 1024).unwrap());
    let h = Harness::new(env.clone(), test_config());
    h.processor.start().unwrap();

    let key = keypair_from_seed(&[9; 32]);
    let chain = h.send_chain(5, key.account());
    let open = h.open(&key, chain[0].hash(), 1);
    h.processor.add(open.clone());
    for block in chain.iter().rev() {
        h.processor.add(block.clone());
    }
    h.processor.flush();
    h.processor.stop();

    let txn = env.tx_begin_read().unwrap();
    for block in &chain {
        assert!(txn.block_exists(&block.hash()).unwrap());
    }
    assert!(txn.block_exists(&open.hash()).unwrap());
    assert_eq!(txn.block_count().unwrap(), 7);
}
