//! Point-in-time ledger snapshots and invariant audit.
//!
//! Reporting reads a [`LedgerSnapshot`] rather than the live store. Snapshots
//! also serialize to JSON so a node's RC state can be dumped and restored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::{CapacityView, RcAccount};
use crate::delegation::{Delegation, DelegationKey, OutgoingDelegation};
use crate::error::RcError;
use crate::store::{ChangeSet, RcStore};
use crate::types::{AccountName, Timestamp};

/// A broken global invariant found by [`LedgerSnapshot::audit`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("{account}: current mana {current} above ceiling {max}")]
    ManaAboveCeiling {
        account: AccountName,
        current: u64,
        max: u64,
    },

    #[error("{account}: stored ceiling {recorded} but structural fields give {computed}")]
    StaleCeiling {
        account: AccountName,
        recorded: u64,
        computed: u64,
    },

    #[error("{account}: delegated_rc {recorded} but outgoing edges sum to {edges}")]
    DelegatedSumMismatch {
        account: AccountName,
        recorded: u64,
        edges: u128,
    },

    #[error("{account}: received_delegated_rc {recorded} but incoming edges sum to {edges}")]
    ReceivedSumMismatch {
        account: AccountName,
        recorded: u64,
        edges: u128,
    },

    #[error("{account}: delegates {delegated} but owns only {owned}")]
    DelegationOverflow {
        account: AccountName,
        delegated: u64,
        owned: u64,
    },

    #[error("edge {from} -> {to} has zero amount")]
    ZeroEdge { from: AccountName, to: AccountName },

    #[error("edge {from} -> {to} is a self-delegation")]
    SelfEdge { from: AccountName, to: AccountName },

    #[error("edge {from} -> {to} references an unknown account")]
    DanglingEdge { from: AccountName, to: AccountName },
}

/// Immutable copy of both RC tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Head time the snapshot was taken at, when known
    #[serde(default)]
    pub taken_at: Option<Timestamp>,
    /// Ascending by name
    pub accounts: Vec<RcAccount>,
    /// Ascending by `(from, to)`
    pub delegations: Vec<Delegation>,
}

impl LedgerSnapshot {
    pub fn capture<S: RcStore + ?Sized>(store: &S) -> Result<Self, RcError> {
        Ok(Self {
            taken_at: None,
            accounts: store.accounts()?,
            delegations: store.delegations()?,
        })
    }

    pub fn at(mut self, time: Timestamp) -> Self {
        self.taken_at = Some(time);
        self
    }

    pub fn account(&self, name: &AccountName) -> Option<&RcAccount> {
        self.accounts
            .binary_search_by(|record| record.account.cmp(name))
            .ok()
            .map(|i| &self.accounts[i])
    }

    pub fn capacity_account(&self, name: &AccountName) -> Option<CapacityView> {
        self.account(name).map(RcAccount::view)
    }

    pub fn delegation(&self, from: &AccountName, to: &AccountName) -> Option<u64> {
        self.delegations
            .binary_search_by(|edge| (&edge.from, &edge.to).cmp(&(from, to)))
            .ok()
            .map(|i| self.delegations[i].amount)
    }

    pub fn outgoing(&self, from: &AccountName) -> Vec<OutgoingDelegation> {
        let start = self.delegations.partition_point(|edge| &edge.from < from);
        self.delegations[start..]
            .iter()
            .take_while(|edge| &edge.from == from)
            .map(|edge| OutgoingDelegation {
                to: edge.to.clone(),
                amount: edge.amount,
            })
            .collect()
    }

    /// Check every global invariant. Returns all violations found.
    pub fn audit(&self) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();
        let mut outgoing: BTreeMap<&AccountName, u128> = BTreeMap::new();
        let mut incoming: BTreeMap<&AccountName, u128> = BTreeMap::new();

        for edge in &self.delegations {
            if edge.amount == 0 {
                violations.push(InvariantViolation::ZeroEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
            if edge.from == edge.to {
                violations.push(InvariantViolation::SelfEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
            if self.account(&edge.from).is_none() || self.account(&edge.to).is_none() {
                violations.push(InvariantViolation::DanglingEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
            *outgoing.entry(&edge.from).or_default() += edge.amount as u128;
            *incoming.entry(&edge.to).or_default() += edge.amount as u128;
        }

        for record in &self.accounts {
            let name = &record.account;
            if record.rc_manabar.current_mana > record.max_mana {
                violations.push(InvariantViolation::ManaAboveCeiling {
                    account: name.clone(),
                    current: record.rc_manabar.current_mana,
                    max: record.max_mana,
                });
            }
            let computed = record.computed_max_mana();
            if computed != record.max_mana {
                violations.push(InvariantViolation::StaleCeiling {
                    account: name.clone(),
                    recorded: record.max_mana,
                    computed,
                });
            }
            let out = outgoing.get(name).copied().unwrap_or(0);
            if out != record.delegated_rc as u128 {
                violations.push(InvariantViolation::DelegatedSumMismatch {
                    account: name.clone(),
                    recorded: record.delegated_rc,
                    edges: out,
                });
            }
            let inc = incoming.get(name).copied().unwrap_or(0);
            if inc != record.received_delegated_rc as u128 {
                violations.push(InvariantViolation::ReceivedSumMismatch {
                    account: name.clone(),
                    recorded: record.received_delegated_rc,
                    edges: inc,
                });
            }
            if record.delegation_overflow() > 0 {
                violations.push(InvariantViolation::DelegationOverflow {
                    account: name.clone(),
                    delegated: record.delegated_rc,
                    owned: record.owned_capacity(),
                });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    pub fn to_json(&self) -> Result<String, RcError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a dump; records and edges are re-sorted so lookups stay valid.
    pub fn from_json(json: &str) -> Result<Self, RcError> {
        let mut snapshot: LedgerSnapshot = serde_json::from_str(json)?;
        snapshot.accounts.sort_by(|a, b| a.account.cmp(&b.account));
        snapshot
            .delegations
            .sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        Ok(snapshot)
    }

    /// Write every record and edge into `store` in one commit.
    ///
    /// Refuses snapshots that fail the audit and stores that already hold
    /// state.
    pub fn restore_into<S: RcStore + ?Sized>(&self, store: &mut S) -> Result<(), RcError> {
        if let Err(violations) = self.audit() {
            let first = violations
                .first()
                .map(ToString::to_string)
                .unwrap_or_default();
            return Err(RcError::CorruptState(format!(
                "snapshot has {} invariant violations, first: {}",
                violations.len(),
                first
            )));
        }
        if !store.is_empty()? {
            return Err(RcError::InvalidOperation(
                "snapshots can only be restored into an empty store".to_string(),
            ));
        }
        let mut changes = ChangeSet::default();
        for record in &self.accounts {
            changes.put_account(record.clone());
        }
        for edge in &self.delegations {
            changes.put_delegation(DelegationKey::new(edge.from.clone(), edge.to.clone()), edge.amount);
        }
        store.commit(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainContext, RcParams};
    use crate::ledger::RcLedger;
    use crate::store::MemoryStore;

    fn name(n: &str) -> AccountName {
        AccountName::new(n).unwrap()
    }

    fn populated() -> RcLedger<MemoryStore> {
        let params = RcParams::default();
        let ctx = ChainContext::new(0, &params);
        let mut ledger = RcLedger::new(MemoryStore::new());
        for n in ["alice", "bob", "carol", "dave"] {
            ledger.create_account(&ctx, &name(n), Some(10), 100).unwrap();
        }
        ledger.set_delegation(&ctx, &name("alice"), &name("dave"), 30).unwrap();
        ledger.set_delegation(&ctx, &name("alice"), &name("bob"), 20).unwrap();
        ledger.set_delegation(&ctx, &name("carol"), &name("alice"), 5).unwrap();
        ledger
    }

    #[test]
    fn test_snapshot_queries() {
        let snapshot = populated().snapshot().unwrap();
        assert_eq!(snapshot.delegation(&name("alice"), &name("bob")), Some(20));
        assert_eq!(snapshot.delegation(&name("bob"), &name("alice")), None);
        let out: Vec<(String, u64)> = snapshot
            .outgoing(&name("alice"))
            .into_iter()
            .map(|e| (e.to.to_string(), e.amount))
            .collect();
        assert_eq!(out, vec![("bob".to_string(), 20), ("dave".to_string(), 30)]);

        let alice = snapshot.capacity_account(&name("alice")).unwrap();
        assert_eq!(alice.delegated_rc, 50);
        assert_eq!(alice.received_delegated_rc, 5);
        assert_eq!(alice.max_mana, 65);
        assert!(snapshot.audit().is_ok());
    }

    #[test]
    fn test_audit_reports_broken_totals() {
        let mut snapshot = populated().snapshot().unwrap();
        snapshot.accounts[0].delegated_rc += 1;
        let violations = snapshot.audit().unwrap_err();
        assert!(violations.iter().any(|v| matches!(
            v,
            InvariantViolation::DelegatedSumMismatch { recorded: 51, edges: 50, .. }
        )));
        assert!(violations
            .iter()
            .any(|v| matches!(v, InvariantViolation::StaleCeiling { .. })));
    }

    #[test]
    fn test_json_dump_and_restore() {
        let snapshot = populated().snapshot().unwrap().at(42);
        let json = snapshot.to_json().unwrap();
        let parsed = LedgerSnapshot::from_json(&json).unwrap();
        assert_eq!(parsed, snapshot);

        let mut store = MemoryStore::new();
        parsed.restore_into(&mut store).unwrap();
        let restored = RcLedger::new(store).snapshot().unwrap().at(42);
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_restore_refuses_non_empty_store() {
        let snapshot = populated().snapshot().unwrap();
        let mut target = RcLedger::new(MemoryStore::new());
        let params = RcParams::default();
        let ctx = ChainContext::new(0, &params);
        target.create_account(&ctx, &name("alice"), None, 100).unwrap();
        target.create_account(&ctx, &name("eve"), None, 0).unwrap();
        target.set_delegation(&ctx, &name("alice"), &name("eve"), 50).unwrap();
        let before = target.snapshot().unwrap();

        let mut store = target.into_inner();
        let err = snapshot.restore_into(&mut store).unwrap_err();
        assert!(matches!(err, RcError::InvalidOperation(_)));
        assert!(!err.is_fatal());
        assert_eq!(RcLedger::new(store).snapshot().unwrap(), before);
    }

    #[test]
    fn test_restore_refuses_corrupt_snapshot() {
        let mut snapshot = populated().snapshot().unwrap();
        snapshot.delegations[0].amount = 0;
        let mut store = MemoryStore::new();
        let err = snapshot.restore_into(&mut store).unwrap_err();
        assert!(matches!(err, RcError::CorruptState(_)));
        assert_eq!(store.account_count(), 0);
    }
}
