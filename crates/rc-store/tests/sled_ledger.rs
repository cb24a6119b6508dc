//! RC ledger running on the sled store

use rc_core::{
    AccountName, ChainContext, LedgerSnapshot, MemoryStore, RcError, RcLedger, RcOperation,
    RcParams, RcStore, ScheduledOperation,
};
use rc_store::SledStore;
use std::collections::BTreeSet;
use tempfile::TempDir;

fn name(n: &str) -> AccountName {
    AccountName::new(n).unwrap()
}

fn overflow_fixture<S: RcStore>(store: S, params: &RcParams) -> RcLedger<S> {
    let ctx = ChainContext::new(1_000, params);
    let mut ledger = RcLedger::new(store);
    ledger.create_account(&ctx, &name("alice"), Some(10), 90).unwrap();
    for n in ["bob", "dave"] {
        ledger.create_account(&ctx, &name(n), Some(10), 0).unwrap();
    }
    ledger.set_delegation(&ctx, &name("alice"), &name("bob"), 10).unwrap();
    ledger.set_delegation(&ctx, &name("alice"), &name("dave"), 80).unwrap();
    ledger
}

#[test]
fn test_overflow_cascade_on_sled() {
    let temp_dir = TempDir::new().unwrap();
    let params = RcParams::default();
    let store = SledStore::at_path(temp_dir.path().join("rc.sled")).unwrap();
    let mut ledger = overflow_fixture(store, &params);
    let ctx = ChainContext::new(1_000, &params);

    let report = ledger
        .apply_stake_change(&ctx, &name("alice"), 45)
        .unwrap()
        .expect("overflow should be reconciled");
    assert_eq!(report.deficit, 45);
    assert_eq!(report.removed().count(), 1);

    assert_eq!(ledger.delegation(&name("alice"), &name("bob")).unwrap(), None);
    assert_eq!(ledger.delegation(&name("alice"), &name("dave")).unwrap(), Some(45));

    let alice = ledger.capacity_account(&name("alice")).unwrap().unwrap();
    assert_eq!((alice.delegated_rc, alice.max_mana), (45, 10));
    let bob = ledger.capacity_account(&name("bob")).unwrap().unwrap();
    assert_eq!((bob.current_mana, bob.max_mana, bob.received_delegated_rc), (10, 10, 0));
    let dave = ledger.capacity_account(&name("dave")).unwrap().unwrap();
    assert_eq!((dave.current_mana, dave.max_mana, dave.received_delegated_rc), (55, 55, 45));

    assert!(ledger.snapshot().unwrap().audit().is_ok());
}

#[test]
fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("rc.sled");
    let params = RcParams::default();

    let before = {
        let store = SledStore::at_path(&path).unwrap();
        let ledger = overflow_fixture(store, &params);
        let snapshot = ledger.snapshot().unwrap();
        ledger.into_inner().flush().unwrap();
        snapshot
    };

    let store = SledStore::at_path(&path).unwrap();
    assert_eq!(store.account_count(), 3);
    assert_eq!(store.delegation_count(), 2);
    let ledger = RcLedger::new(store);
    assert_eq!(ledger.snapshot().unwrap(), before);

    let outgoing: Vec<AccountName> = ledger
        .outgoing_delegations(&name("alice"))
        .unwrap()
        .into_iter()
        .map(|edge| edge.to)
        .collect();
    assert_eq!(outgoing, vec![name("bob"), name("dave")]);
}

#[test]
fn test_rejected_operations_leave_store_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let params = RcParams::default();
    let store = SledStore::at_path(temp_dir.path().join("rc.sled")).unwrap();
    let mut ledger = overflow_fixture(store, &params);
    let ctx = ChainContext::new(2_000, &params);
    let before = ledger.snapshot().unwrap();

    // alice already delegates all 90 she owns
    let err = ledger
        .set_delegation(&ctx, &name("alice"), &name("bob"), 11)
        .unwrap_err();
    assert!(matches!(err, RcError::InsufficientCapacityToDelegate { .. }));

    // One unknown delegatee sinks the whole batch
    let delegatees: BTreeSet<AccountName> = [name("bob"), name("zed")].into_iter().collect();
    let err = ledger
        .set_delegations(&ctx, &name("alice"), &delegatees, 5)
        .unwrap_err();
    assert_eq!(err, RcError::UnknownAccount(name("zed")));

    assert_eq!(ledger.snapshot().unwrap(), before);
}

#[test]
fn test_snapshot_restores_into_sled() {
    let params = RcParams::default();
    let memory = overflow_fixture(MemoryStore::new(), &params);
    let json = memory.snapshot().unwrap().at(1_000).to_json().unwrap();

    let temp_dir = TempDir::new().unwrap();
    let mut store = SledStore::at_path(temp_dir.path().join("rc.sled")).unwrap();
    let snapshot = LedgerSnapshot::from_json(&json).unwrap();
    snapshot.restore_into(&mut store).unwrap();

    let restored = LedgerSnapshot::capture(&store).unwrap();
    assert_eq!(restored.accounts, snapshot.accounts);
    assert_eq!(restored.delegations, snapshot.delegations);
}

#[test]
fn test_snapshot_restore_refuses_populated_store() {
    let params = RcParams::default();
    let snapshot = overflow_fixture(MemoryStore::new(), &params).snapshot().unwrap();

    let temp_dir = TempDir::new().unwrap();
    let ctx = ChainContext::new(0, &params);
    let store = SledStore::at_path(temp_dir.path().join("rc.sled")).unwrap();
    let mut target = RcLedger::new(store);
    target.create_account(&ctx, &name("alice"), None, 100).unwrap();
    target.create_account(&ctx, &name("carol"), None, 0).unwrap();
    target.set_delegation(&ctx, &name("alice"), &name("carol"), 50).unwrap();
    let before = target.snapshot().unwrap();

    let mut store = target.into_inner();
    let err = snapshot.restore_into(&mut store).unwrap_err();
    assert!(matches!(err, RcError::InvalidOperation(_)));
    assert_eq!(store.account_count(), 2);
    assert_eq!(store.delegation_count(), 1);
    assert_eq!(LedgerSnapshot::capture(&store).unwrap(), before);
}

#[test]
fn test_replay_scheduled_operations() {
    let json = r#"[
        { "time": 0, "op": { "type": "create_account", "account": "alice", "stake": 100 } },
        { "time": 0, "op": { "type": "create_account", "account": "bob" } },
        { "time": 10, "op": { "type": "delegate_capacity", "from": "alice", "to": "bob", "amount": 40 } },
        { "time": 20, "op": { "type": "consume_capacity", "account": "bob", "amount": 30 } },
        { "time": 30, "op": { "type": "stake_changed", "account": "alice", "new_stake_base": 25 } }
    ]"#;
    let scheduled: Vec<ScheduledOperation> = serde_json::from_str(json).unwrap();
    assert!(matches!(scheduled[2].op, RcOperation::DelegateCapacity { amount: 40, .. }));

    let temp_dir = TempDir::new().unwrap();
    let params = RcParams::default();
    let store = SledStore::at_path(temp_dir.path().join("rc.sled")).unwrap();
    let mut ledger = RcLedger::new(store);
    for entry in &scheduled {
        let ctx = ChainContext::new(entry.time, &params);
        ledger.apply(&ctx, &entry.op).unwrap();
    }

    assert_eq!(ledger.delegation(&name("alice"), &name("bob")).unwrap(), Some(25));
    let alice = ledger.capacity_account(&name("alice")).unwrap().unwrap();
    assert_eq!((alice.delegated_rc, alice.max_mana), (25, 0));
    let bob = ledger.capacity_account(&name("bob")).unwrap().unwrap();
    assert_eq!((bob.received_delegated_rc, bob.max_mana), (25, 25));
    assert!(ledger.snapshot().unwrap().audit().is_ok());
}
