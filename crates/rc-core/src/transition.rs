//! Pending write-set layered over the committed store.
//!
//! Every ledger operation reads and writes through a [`Transition`]. Nothing
//! reaches the store until the operation succeeds and the collected
//! [`ChangeSet`] is committed, so a rejected operation leaves no trace.

use std::collections::BTreeMap;

use crate::account::RcAccount;
use crate::delegation::{DelegationKey, OutgoingDelegation};
use crate::error::RcError;
use crate::store::{ChangeSet, RcStore};
use crate::types::AccountName;

pub(crate) struct Transition<'s, S: RcStore + ?Sized> {
    store: &'s S,
    changes: ChangeSet,
}

impl<'s, S: RcStore + ?Sized> Transition<'s, S> {
    pub(crate) fn new(store: &'s S) -> Self {
        Self {
            store,
            changes: ChangeSet::default(),
        }
    }

    pub(crate) fn account(&self, name: &AccountName) -> Result<Option<RcAccount>, RcError> {
        match self.changes.accounts.get(name) {
            Some(record) => Ok(Some(record.clone())),
            None => self.store.account(name),
        }
    }

    pub(crate) fn require_account(&self, name: &AccountName) -> Result<RcAccount, RcError> {
        self.account(name)?
            .ok_or_else(|| RcError::UnknownAccount(name.clone()))
    }

    pub(crate) fn put_account(&mut self, record: RcAccount) {
        self.changes.put_account(record);
    }

    pub(crate) fn delegation(
        &self,
        from: &AccountName,
        to: &AccountName,
    ) -> Result<Option<u64>, RcError> {
        let key = DelegationKey::new(from.clone(), to.clone());
        match self.changes.delegations.get(&key) {
            Some(pending) => Ok(*pending),
            None => self.store.delegation(from, to),
        }
    }

    /// Stage an edge write; zero deletes.
    pub(crate) fn set_delegation(&mut self, from: &AccountName, to: &AccountName, amount: u64) {
        self.changes
            .put_delegation(DelegationKey::new(from.clone(), to.clone()), amount);
    }

    /// Outgoing edges of `from` with pending writes applied, ascending by
    /// delegatee.
    pub(crate) fn outgoing(&self, from: &AccountName) -> Result<Vec<OutgoingDelegation>, RcError> {
        let mut edges: BTreeMap<AccountName, u64> = self
            .store
            .outgoing(from)?
            .into_iter()
            .map(|edge| (edge.to, edge.amount))
            .collect();
        for (key, pending) in &self.changes.delegations {
            if &key.from != from {
                continue;
            }
            match pending {
                Some(amount) => {
                    edges.insert(key.to.clone(), *amount);
                }
                None => {
                    edges.remove(&key.to);
                }
            }
        }
        Ok(edges
            .into_iter()
            .map(|(to, amount)| OutgoingDelegation { to, amount })
            .collect())
    }

    pub(crate) fn into_changes(self) -> ChangeSet {
        self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn name(n: &str) -> AccountName {
        AccountName::new(n).unwrap()
    }

    #[test]
    fn test_pending_writes_shadow_store() {
        let mut store = MemoryStore::new();
        let mut seed = ChangeSet::default();
        seed.put_account(RcAccount::new(name("alice"), 100, 0, 0));
        seed.put_delegation(DelegationKey::new(name("alice"), name("bob")), 10);
        seed.put_delegation(DelegationKey::new(name("alice"), name("dave")), 80);
        store.commit(seed).unwrap();

        let mut tx = Transition::new(&store);
        tx.set_delegation(&name("alice"), &name("bob"), 0);
        tx.set_delegation(&name("alice"), &name("carol"), 3);
        tx.set_delegation(&name("alice"), &name("dave"), 45);

        let out = tx.outgoing(&name("alice")).unwrap();
        assert_eq!(
            out,
            vec![
                OutgoingDelegation { to: name("carol"), amount: 3 },
                OutgoingDelegation { to: name("dave"), amount: 45 },
            ]
        );
        assert_eq!(tx.delegation(&name("alice"), &name("bob")).unwrap(), None);

        // Store unchanged until commit
        assert_eq!(store.delegation(&name("alice"), &name("bob")).unwrap(), Some(10));
    }

    #[test]
    fn test_missing_account_is_unknown() {
        let store = MemoryStore::new();
        let tx = Transition::new(&store);
        assert_eq!(
            tx.require_account(&name("eve")).unwrap_err(),
            RcError::UnknownAccount(name("eve"))
        );
    }
}
