//! Storage seam for the RC ledger.
//!
//! Two tables: capacity records keyed by account name, and delegation edges
//! keyed by `(from, to)` with an ordered `from` index. Writes only happen
//! through [`RcStore::commit`], which must apply a [`ChangeSet`] atomically.

use std::collections::{BTreeMap, BTreeSet};

use crate::account::RcAccount;
use crate::delegation::{Delegation, DelegationKey, OutgoingDelegation};
use crate::error::RcError;
use crate::types::AccountName;

/// Persistent backing for capacity records and delegation edges.
pub trait RcStore {
    /// Load one capacity record
    fn account(&self, name: &AccountName) -> Result<Option<RcAccount>, RcError>;

    /// Amount of the `(from, to)` edge, if it exists
    fn delegation(&self, from: &AccountName, to: &AccountName) -> Result<Option<u64>, RcError>;

    /// Outgoing edges of `from`, ascending by delegatee
    fn outgoing(&self, from: &AccountName) -> Result<Vec<OutgoingDelegation>, RcError>;

    /// Every capacity record, ascending by name
    fn accounts(&self) -> Result<Vec<RcAccount>, RcError>;

    /// Every delegation edge, ascending by `(from, to)`
    fn delegations(&self) -> Result<Vec<Delegation>, RcError>;

    /// Apply all writes of one operation, or none of them.
    fn commit(&mut self, changes: ChangeSet) -> Result<(), RcError>;

    /// True when the store holds no records and no edges
    fn is_empty(&self) -> Result<bool, RcError> {
        Ok(self.accounts()?.is_empty() && self.delegations()?.is_empty())
    }
}

/// Write-set produced by one ledger operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Records to upsert
    pub accounts: BTreeMap<AccountName, RcAccount>,
    /// Edges to upsert (`Some`) or delete (`None`)
    pub delegations: BTreeMap<DelegationKey, Option<u64>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.delegations.is_empty()
    }

    pub fn put_account(&mut self, record: RcAccount) {
        self.accounts.insert(record.account.clone(), record);
    }

    /// Stage an edge write; a zero amount stages a delete.
    pub fn put_delegation(&mut self, key: DelegationKey, amount: u64) {
        let value = if amount == 0 { None } else { Some(amount) };
        self.delegations.insert(key, value);
    }
}

/// In-memory store with an explicit `from` index.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    accounts: BTreeMap<AccountName, RcAccount>,
    delegations: BTreeMap<DelegationKey, u64>,
    by_from: BTreeMap<AccountName, BTreeSet<AccountName>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn delegation_count(&self) -> usize {
        self.delegations.len()
    }
}

impl RcStore for MemoryStore {
    fn is_empty(&self) -> Result<bool, RcError> {
        Ok(self.accounts.is_empty() && self.delegations.is_empty())
    }

    fn account(&self, name: &AccountName) -> Result<Option<RcAccount>, RcError> {
        Ok(self.accounts.get(name).cloned())
    }

    fn delegation(&self, from: &AccountName, to: &AccountName) -> Result<Option<u64>, RcError> {
        let key = DelegationKey::new(from.clone(), to.clone());
        Ok(self.delegations.get(&key).copied())
    }

    fn outgoing(&self, from: &AccountName) -> Result<Vec<OutgoingDelegation>, RcError> {
        let Some(delegatees) = self.by_from.get(from) else {
            return Ok(Vec::new());
        };
        let mut edges = Vec::with_capacity(delegatees.len());
        for to in delegatees {
            let key = DelegationKey::new(from.clone(), to.clone());
            let amount = self.delegations.get(&key).copied().ok_or_else(|| {
                RcError::Storage(format!("from index points at missing edge {}", key.encode()))
            })?;
            edges.push(OutgoingDelegation {
                to: to.clone(),
                amount,
            });
        }
        Ok(edges)
    }

    fn accounts(&self) -> Result<Vec<RcAccount>, RcError> {
        Ok(self.accounts.values().cloned().collect())
    }

    fn delegations(&self) -> Result<Vec<Delegation>, RcError> {
        Ok(self
            .delegations
            .iter()
            .map(|(key, amount)| Delegation {
                from: key.from.clone(),
                to: key.to.clone(),
                amount: *amount,
            })
            .collect())
    }

    fn commit(&mut self, changes: ChangeSet) -> Result<(), RcError> {
        for (name, record) in changes.accounts {
            self.accounts.insert(name, record);
        }
        for (key, value) in changes.delegations {
            match value {
                Some(amount) => {
                    self.by_from
                        .entry(key.from.clone())
                        .or_default()
                        .insert(key.to.clone());
                    self.delegations.insert(key, amount);
                }
                None => {
                    if let Some(delegatees) = self.by_from.get_mut(&key.from) {
                        delegatees.remove(&key.to);
                        if delegatees.is_empty() {
                            self.by_from.remove(&key.from);
                        }
                    }
                    self.delegations.remove(&key);
                }
            }
        }
        Ok(())
    }
}
