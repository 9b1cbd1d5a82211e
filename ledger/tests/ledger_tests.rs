//! Ledger classification and rollback against the in-memory store.

use std::sync::Arc;

use lattice_crypto::keypair_from_seed;
use lattice_ledger::{
    dev_genesis_key, Block, BlockBuilder, Ledger, LedgerConstants, LedgerError, ProcessOutcome,
    SignatureVerification, StateBlock,
};
use lattice_nullables::{NullClock, NullStore};
use lattice_store::{LedgerStore, PendingKey};
use lattice_types::{Account, Amount, BlockHash, Epoch, KeyPair, Link, NetworkId, Signature};
use lattice_work::{validate_work, WorkBlockKind, WorkThresholds};

struct Context {
    store: Arc<NullStore>,
    ledger: Ledger,
    builder: BlockBuilder,
    genesis: KeyPair,
}

impl Context {
    fn new() -> Self {
        Self::with_constants(LedgerConstants::dev())
    }

    fn with_constants(constants: LedgerConstants) -> Self {
        let store = Arc::new(NullStore::new());
        let clock = Arc::new(NullClock::new(1_000));
        let builder = BlockBuilder::new(&constants);
        let ledger = Ledger::with_clock(store.clone(), constants, clock).unwrap();
        Self {
            store,
            ledger,
            builder,
            genesis: dev_genesis_key(),
        }
    }

    fn process(&self, block: &Block) -> ProcessOutcome {
        self.process_with(block, SignatureVerification::Unknown)
    }

    fn process_with(&self, block: &Block, verification: SignatureVerification) -> ProcessOutcome {
        let mut txn = self.store.tx_begin_write().unwrap();
        let outcome = self.ledger.process(&mut *txn, block, verification).unwrap();
        txn.commit().unwrap();
        outcome
    }

    fn genesis_hash(&self) -> BlockHash {
        self.ledger.genesis_hash()
    }

    fn balance(&self, account: &Account) -> Amount {
        let txn = self.store.tx_begin_read().unwrap();
        self.ledger.account_balance(&*txn, account).unwrap()
    }

    fn pending_exists(&self, account: Account, send: BlockHash) -> bool {
        let txn = self.store.tx_begin_read().unwrap();
        txn.pending_exists(&PendingKey::new(account, send)).unwrap()
    }

    /// State send of `amount` from genesis on top of `previous`.
    fn send_from_genesis(&self, previous: BlockHash, remaining: Amount, to: Account) -> Block {
        self.builder
            .state(
                &self.genesis,
                previous,
                self.genesis.account(),
                remaining,
                Link::from(to),
            )
            .unwrap()
    }

    fn open_state(&self, key: &KeyPair, source: BlockHash, amount: Amount) -> Block {
        self.builder
            .state(key, BlockHash::ZERO, key.account(), amount, Link::from(source))
            .unwrap()
    }
}

fn key(n: u8) -> KeyPair {
    keypair_from_seed(&[n; 32])
}

fn minus(amount: u128) -> Amount {
    Amount::MAX.checked_sub(Amount::raw(amount)).unwrap()
}

#[test]
fn genesis_is_committed_once() {
    let ctx = Context::new();
    assert_eq!(ctx.ledger.block_count().unwrap(), 1);
    let info = ctx.ledger.get_account_info(&ctx.genesis.account()).unwrap().unwrap();
    assert_eq!(info.head, ctx.genesis_hash());
    assert_eq!(info.balance, Amount::MAX);
    assert_eq!(info.block_count, 1);

    let again = Ledger::new(ctx.store.clone(), LedgerConstants::dev()).unwrap();
    assert_eq!(again.block_count().unwrap(), 1);
}

#[test]
fn send_then_open_moves_funds() {
    let ctx = Context::new();
    let alice = key(1);
    let send = ctx.send_from_genesis(ctx.genesis_hash(), minus(100), alice.account());
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);
    assert!(ctx.pending_exists(alice.account(), send.hash()));
    assert_eq!(ctx.balance(&ctx.genesis.account()), minus(100));

    let open = ctx.open_state(&alice, send.hash(), Amount::raw(100));
    assert_eq!(ctx.process(&open), ProcessOutcome::Progress);
    assert!(!ctx.pending_exists(alice.account(), send.hash()));
    assert_eq!(ctx.balance(&alice.account()), Amount::raw(100));

    let saved = ctx.ledger.get_block(&open.hash()).unwrap().unwrap();
    assert_eq!(saved.sideband.height, 1);
    assert_eq!(saved.account(), alice.account());
    let previous = ctx.ledger.get_block(&ctx.genesis_hash()).unwrap().unwrap();
    assert_eq!(previous.sideband.successor, send.hash());
}

#[test]
fn duplicate_block_is_old() {
    let ctx = Context::new();
    let send = ctx.send_from_genesis(ctx.genesis_hash(), minus(1), key(1).account());
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);
    assert_eq!(ctx.process(&send), ProcessOutcome::Old);
    assert_eq!(ctx.ledger.block_count().unwrap(), 2);
}

#[test]
fn unknown_previous_is_a_gap() {
    let ctx = Context::new();
    let send = ctx.send_from_genesis(BlockHash::new([9; 32]), minus(1), key(1).account());
    assert_eq!(ctx.process(&send), ProcessOutcome::GapPrevious);

    let legacy = ctx
        .builder
        .change(&ctx.genesis, BlockHash::new([9; 32]), ctx.genesis.account())
        .unwrap();
    assert_eq!(ctx.process(&legacy), ProcessOutcome::GapPrevious);
}

#[test]
fn unknown_source_is_a_gap() {
    let ctx = Context::new();
    let open = ctx.open_state(&key(1), BlockHash::new([9; 32]), Amount::raw(1));
    assert_eq!(ctx.process(&open), ProcessOutcome::GapSource);
}

#[test]
fn wrong_signer_is_rejected() {
    let ctx = Context::new();
    let mut send = ctx.send_from_genesis(ctx.genesis_hash(), minus(1), key(1).account());
    send.sign(&key(2).private);
    assert_eq!(ctx.process(&send), ProcessOutcome::BadSignature);
}

#[test]
fn caller_verdict_overrides_inline_check() {
    let ctx = Context::new();
    let send = ctx.send_from_genesis(ctx.genesis_hash(), minus(1), key(1).account());
    assert_eq!(
        ctx.process_with(&send, SignatureVerification::Invalid),
        ProcessOutcome::BadSignature
    );
    assert_eq!(ctx.ledger.block_count().unwrap(), 1);
    assert_eq!(
        ctx.process_with(&send, SignatureVerification::Valid),
        ProcessOutcome::Progress
    );
}

#[test]
fn second_block_on_same_previous_is_a_fork() {
    let ctx = Context::new();
    let first = ctx.send_from_genesis(ctx.genesis_hash(), minus(1), key(1).account());
    let second = ctx.send_from_genesis(ctx.genesis_hash(), minus(2), key(1).account());
    assert_eq!(ctx.process(&first), ProcessOutcome::Progress);
    assert_eq!(ctx.process(&second), ProcessOutcome::Fork);

    let txn = ctx.store.tx_begin_read().unwrap();
    assert_eq!(
        ctx.ledger.competitor(&*txn, &second).unwrap(),
        Some(first.hash())
    );
    assert_eq!(ctx.ledger.competitor(&*txn, &first).unwrap(), None);
}

#[test]
fn second_open_is_a_fork() {
    let ctx = Context::new();
    let alice = key(1);
    let send1 = ctx.send_from_genesis(ctx.genesis_hash(), minus(1), alice.account());
    let send2 = ctx.send_from_genesis(send1.hash(), minus(3), alice.account());
    assert_eq!(ctx.process(&send1), ProcessOutcome::Progress);
    assert_eq!(ctx.process(&send2), ProcessOutcome::Progress);
    assert_eq!(
        ctx.process(&ctx.open_state(&alice, send1.hash(), Amount::raw(1))),
        ProcessOutcome::Progress
    );
    assert_eq!(
        ctx.process(&ctx.open_state(&alice, send2.hash(), Amount::raw(2))),
        ProcessOutcome::Fork
    );
}

#[test]
fn receiving_twice_is_unreceivable() {
    let ctx = Context::new();
    let alice = key(1);
    let send = ctx.send_from_genesis(ctx.genesis_hash(), minus(5), alice.account());
    let open = ctx.open_state(&alice, send.hash(), Amount::raw(5));
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);
    assert_eq!(ctx.process(&open), ProcessOutcome::Progress);

    let again = ctx
        .builder
        .state(
            &alice,
            open.hash(),
            alice.account(),
            Amount::raw(10),
            Link::from(send.hash()),
        )
        .unwrap();
    assert_eq!(ctx.process(&again), ProcessOutcome::Unreceivable);
}

#[test]
fn receive_amount_must_match_pending() {
    let ctx = Context::new();
    let alice = key(1);
    let send = ctx.send_from_genesis(ctx.genesis_hash(), minus(5), alice.account());
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);
    let open = ctx.open_state(&alice, send.hash(), Amount::raw(6));
    assert_eq!(ctx.process(&open), ProcessOutcome::BalanceMismatch);
}

#[test]
fn balance_change_without_link_is_a_mismatch() {
    let ctx = Context::new();
    let send = ctx.send_from_genesis(ctx.genesis_hash(), minus(5), key(1).account());
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);
    let grow = ctx
        .builder
        .state(&ctx.genesis, send.hash(), ctx.genesis.account(), minus(1), Link::ZERO)
        .unwrap();
    assert_eq!(ctx.process(&grow), ProcessOutcome::BalanceMismatch);
}

#[test]
fn legacy_send_cannot_increase_balance() {
    let ctx = Context::new();
    let alice = key(1);
    let send = ctx
        .builder
        .send(&ctx.genesis, ctx.genesis_hash(), alice.account(), minus(100))
        .unwrap();
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);
    let open = ctx.builder.open(&alice, send.hash(), alice.account()).unwrap();
    assert_eq!(ctx.process(&open), ProcessOutcome::Progress);
    assert_eq!(ctx.balance(&alice.account()), Amount::raw(100));

    let inflate = ctx
        .builder
        .send(&alice, open.hash(), key(2).account(), Amount::raw(200))
        .unwrap();
    assert_eq!(ctx.process(&inflate), ProcessOutcome::NegativeSpend);
}

#[test]
fn legacy_receive_and_change_update_account() {
    let ctx = Context::new();
    let alice = key(1);
    let send1 = ctx
        .builder
        .send(&ctx.genesis, ctx.genesis_hash(), alice.account(), minus(10))
        .unwrap();
    let send2 = ctx
        .builder
        .send(&ctx.genesis, send1.hash(), alice.account(), minus(30))
        .unwrap();
    let open = ctx.builder.open(&alice, send1.hash(), alice.account()).unwrap();
    let receive = ctx.builder.receive(&alice, open.hash(), send2.hash()).unwrap();
    let change = ctx.builder.change(&alice, receive.hash(), key(7).account()).unwrap();
    for block in [&send1, &send2, &open, &receive, &change] {
        assert_eq!(ctx.process(block), ProcessOutcome::Progress);
    }

    let info = ctx.ledger.get_account_info(&alice.account()).unwrap().unwrap();
    assert_eq!(info.balance, Amount::raw(30));
    assert_eq!(info.block_count, 3);
    assert_eq!(info.representative, key(7).account());
    let txn = ctx.store.tx_begin_read().unwrap();
    assert_eq!(
        ctx.ledger.representative_at(&*txn, &receive.hash()).unwrap(),
        alice.account()
    );
}

#[test]
fn legacy_block_after_state_block_is_misplaced() {
    let ctx = Context::new();
    let send = ctx.send_from_genesis(ctx.genesis_hash(), minus(1), key(1).account());
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);
    let change = ctx
        .builder
        .change(&ctx.genesis, send.hash(), ctx.genesis.account())
        .unwrap();
    assert_eq!(ctx.process(&change), ProcessOutcome::BlockPosition);
}

#[test]
fn weak_work_is_rejected() {
    let ctx = Context::new();
    let mut send = ctx.send_from_genesis(ctx.genesis_hash(), minus(1), key(1).account());
    let threshold = ctx.ledger.constants.work.threshold_for(WorkBlockKind::Base);
    let weak = (0u64..)
        .find(|n| !validate_work(&send.work_root(), *n, threshold))
        .unwrap();
    send.set_work(weak);
    assert_eq!(ctx.process(&send), ProcessOutcome::InsufficientWork);
}

#[test]
fn burn_account_cannot_be_opened() {
    let constants = LedgerConstants::from_genesis_key(
        NetworkId::Dev,
        &dev_genesis_key(),
        WorkThresholds::disabled(),
    );
    let ctx = Context::with_constants(constants);
    let send = ctx.send_from_genesis(ctx.genesis_hash(), minus(1), Account::BURN);
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);

    let open = Block::State(StateBlock {
        account: Account::BURN,
        previous: BlockHash::ZERO,
        representative: Account::BURN,
        balance: Amount::raw(1),
        link: Link::from(send.hash()),
        signature: Signature::ZERO,
        work: 0,
    });
    assert_eq!(
        ctx.process_with(&open, SignatureVerification::Valid),
        ProcessOutcome::OpenedBurnAccount
    );
}

#[test]
fn epoch_upgrade_rules() {
    let ctx = Context::new();
    let genesis = ctx.genesis.account();
    let epoch1 = |representative: Account| {
        ctx.builder
            .epoch(
                &ctx.genesis,
                genesis,
                ctx.genesis_hash(),
                representative,
                Amount::MAX,
                Epoch::Epoch1,
            )
            .unwrap()
            .unwrap()
    };

    assert_eq!(
        ctx.process(&epoch1(key(3).account())),
        ProcessOutcome::RepresentativeMismatch
    );
    let upgrade = epoch1(genesis);
    {
        let txn = ctx.store.tx_begin_read().unwrap();
        assert_eq!(ctx.ledger.signer(&*txn, &upgrade).unwrap(), Some(genesis));
    }
    assert_eq!(ctx.process(&upgrade), ProcessOutcome::Progress);
    let info = ctx.ledger.get_account_info(&genesis).unwrap().unwrap();
    assert_eq!(info.epoch, Epoch::Epoch1);

    let skip = ctx
        .builder
        .epoch(&ctx.genesis, genesis, upgrade.hash(), genesis, Amount::MAX, Epoch::Epoch1)
        .unwrap()
        .unwrap();
    assert_eq!(ctx.process(&skip), ProcessOutcome::BlockPosition);

    let legacy = ctx.builder.change(&ctx.genesis, upgrade.hash(), genesis).unwrap();
    assert_eq!(ctx.process(&legacy), ProcessOutcome::BlockPosition);
}

#[test]
fn epoch_block_cannot_open_an_account() {
    let ctx = Context::new();
    let alice = key(1);
    let open = ctx
        .builder
        .epoch(
            &ctx.genesis,
            alice.account(),
            BlockHash::ZERO,
            alice.account(),
            Amount::ZERO,
            Epoch::Epoch1,
        )
        .unwrap()
        .unwrap();
    assert_eq!(ctx.process(&open), ProcessOutcome::BlockPosition);
}

#[test]
fn legacy_open_cannot_receive_upgraded_send() {
    let ctx = Context::new();
    let genesis = ctx.genesis.account();
    let alice = key(1);
    let upgrade = ctx
        .builder
        .epoch(&ctx.genesis, genesis, ctx.genesis_hash(), genesis, Amount::MAX, Epoch::Epoch1)
        .unwrap()
        .unwrap();
    let send = ctx.send_from_genesis(upgrade.hash(), minus(4), alice.account());
    assert_eq!(ctx.process(&upgrade), ProcessOutcome::Progress);
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);

    let legacy = ctx.builder.open(&alice, send.hash(), alice.account()).unwrap();
    assert_eq!(ctx.process(&legacy), ProcessOutcome::Unreceivable);

    let open = ctx.open_state(&alice, send.hash(), Amount::raw(4));
    assert_eq!(ctx.process(&open), ProcessOutcome::Progress);
    let info = ctx.ledger.get_account_info(&alice.account()).unwrap().unwrap();
    assert_eq!(info.epoch, Epoch::Epoch1);
}

#[test]
fn dropped_write_transaction_changes_nothing() {
    let ctx = Context::new();
    let send = ctx.send_from_genesis(ctx.genesis_hash(), minus(1), key(1).account());
    {
        let mut txn = ctx.store.tx_begin_write().unwrap();
        let outcome = ctx
            .ledger
            .process(&mut *txn, &send, SignatureVerification::Unknown)
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::Progress);
    }
    assert!(ctx.ledger.get_block(&send.hash()).unwrap().is_none());
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);
}

#[test]
fn rollback_of_received_send_unwinds_receiver() {
    let ctx = Context::new();
    let alice = key(1);
    let send = ctx.send_from_genesis(ctx.genesis_hash(), minus(8), alice.account());
    let open = ctx.open_state(&alice, send.hash(), Amount::raw(8));
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);
    assert_eq!(ctx.process(&open), ProcessOutcome::Progress);

    let mut txn = ctx.store.tx_begin_write().unwrap();
    let removed = ctx.ledger.rollback(&mut *txn, &send.hash()).unwrap();
    txn.commit().unwrap();

    let hashes: Vec<_> = removed.iter().map(|b| b.hash()).collect();
    assert_eq!(hashes, vec![open.hash(), send.hash()]);
    assert_eq!(ctx.ledger.block_count().unwrap(), 1);
    assert!(ctx.ledger.get_account_info(&alice.account()).unwrap().is_none());
    assert!(!ctx.pending_exists(alice.account(), send.hash()));

    let info = ctx.ledger.get_account_info(&ctx.genesis.account()).unwrap().unwrap();
    assert_eq!(info.head, ctx.genesis_hash());
    assert_eq!(info.balance, Amount::MAX);
    assert_eq!(info.block_count, 1);
    let genesis = ctx.ledger.get_block(&ctx.genesis_hash()).unwrap().unwrap();
    assert!(genesis.sideband.successor.is_zero());
}

#[test]
fn rollback_of_receive_restores_pending() {
    let ctx = Context::new();
    let alice = key(1);
    let send = ctx.send_from_genesis(ctx.genesis_hash(), minus(8), alice.account());
    let open = ctx.open_state(&alice, send.hash(), Amount::raw(8));
    assert_eq!(ctx.process(&send), ProcessOutcome::Progress);
    assert_eq!(ctx.process(&open), ProcessOutcome::Progress);

    let mut txn = ctx.store.tx_begin_write().unwrap();
    let removed = ctx.ledger.rollback(&mut *txn, &open.hash()).unwrap();
    txn.commit().unwrap();
    assert_eq!(removed.len(), 1);
    assert!(ctx.pending_exists(alice.account(), send.hash()));
    assert_eq!(ctx.process(&open), ProcessOutcome::Progress);
}

#[test]
fn rollback_removes_everything_above_target() {
    let ctx = Context::new();
    let send1 = ctx.send_from_genesis(ctx.genesis_hash(), minus(1), key(1).account());
    let send2 = ctx.send_from_genesis(send1.hash(), minus(2), key(1).account());
    assert_eq!(ctx.process(&send1), ProcessOutcome::Progress);
    assert_eq!(ctx.process(&send2), ProcessOutcome::Progress);

    let mut txn = ctx.store.tx_begin_write().unwrap();
    let removed = ctx.ledger.rollback(&mut *txn, &send1.hash()).unwrap();
    txn.commit().unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(ctx.balance(&ctx.genesis.account()), Amount::MAX);
}

#[test]
fn genesis_cannot_be_rolled_back() {
    let ctx = Context::new();
    let mut txn = ctx.store.tx_begin_write().unwrap();
    let result = ctx.ledger.rollback(&mut *txn, &ctx.genesis_hash());
    assert!(matches!(result, Err(LedgerError::GenesisRollback)));
}

#[test]
fn rollback_of_unknown_block_fails() {
    let ctx = Context::new();
    let mut txn = ctx.store.tx_begin_write().unwrap();
    let result = ctx.ledger.rollback(&mut *txn, &BlockHash::new([5; 32]));
    assert!(matches!(result, Err(LedgerError::BlockNotFound(_))));
}
