//! Capacity and delegation ledger.
//!
//! [`RcLedger`] applies stake changes, consumption and delegation updates in
//! consensus order. Each call runs against a pending write-set and is
//! committed atomically on success; any error leaves the store unchanged.
//!
//! Ordering within every operation is fixed: regenerate under the old
//! ceiling, change structural fields, then recompute the ceiling and rescale.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::account::{CapacityView, RcAccount};
use crate::config::{ChainContext, RcParams};
use crate::delegation::OutgoingDelegation;
use crate::error::RcError;
use crate::reconcile::{absorb_overflow, ReconcileReport};
use crate::snapshot::LedgerSnapshot;
use crate::store::RcStore;
use crate::transition::Transition;
use crate::types::AccountName;

/// Result of a successful `set_delegation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationChange {
    pub from: AccountName,
    pub to: AccountName,
    /// Zero when the edge did not exist
    pub previous: u64,
    /// Zero when the edge was deleted
    pub amount: u64,
}

impl DelegationChange {
    pub fn delta(&self) -> i128 {
        self.amount as i128 - self.previous as i128
    }
}

/// RC state machine over a store.
pub struct RcLedger<S> {
    store: S,
}

impl<S: RcStore> RcLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Run `f` against a pending write-set and commit it only on success.
    fn transact<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Transition<'_, S>) -> Result<T, RcError>,
    ) -> Result<T, RcError> {
        let mut tx = Transition::new(&self.store);
        let value = match f(&mut tx) {
            Ok(value) => value,
            Err(e) => {
                if e.is_fatal() {
                    error!(operation, error = %e, "Fatal RC ledger error");
                } else {
                    debug!(operation, error = %e, "RC operation rejected");
                }
                return Err(e);
            }
        };
        let changes = tx.into_changes();
        let accounts = changes.accounts.len();
        let delegations = changes.delegations.len();
        self.store.commit(changes).inspect_err(|e| {
            error!(operation, error = %e, "Failed to commit RC changes");
        })?;
        debug!(operation, accounts, delegations, "Committed RC operation");
        Ok(value)
    }

    /// Register a capacity record for a new chain account.
    ///
    /// `creation_adjustment` falls back to the chain default. The bar starts
    /// full.
    pub fn create_account(
        &mut self,
        ctx: &ChainContext<'_>,
        account: &AccountName,
        creation_adjustment: Option<i64>,
        own_capacity: u64,
    ) -> Result<CapacityView, RcError> {
        self.transact("create_account", |tx| {
            if tx.account(account)?.is_some() {
                return Err(RcError::AccountExists(account.clone()));
            }
            let adjustment =
                creation_adjustment.unwrap_or(ctx.params.default_creation_adjustment);
            let record = RcAccount::new(account.clone(), own_capacity, adjustment, ctx.now);
            let view = record.view();
            tx.put_account(record);
            Ok(view)
        })
    }

    /// Apply a new stake-derived capacity base for `account`.
    ///
    /// Returns the reconciliation report when the new base no longer covers
    /// the account's outgoing delegations.
    pub fn apply_stake_change(
        &mut self,
        ctx: &ChainContext<'_>,
        account: &AccountName,
        new_own_capacity: u64,
    ) -> Result<Option<ReconcileReport>, RcError> {
        self.transact("apply_stake_change", |tx| {
            let mut record = tx.require_account(account)?;
            record.regenerate(ctx.now, ctx.params)?;
            record.own_capacity = new_own_capacity;
            let report = if record.delegation_overflow() > 0 {
                Some(absorb_overflow(tx, ctx, &mut record)?)
            } else {
                None
            };
            record.refresh_ceiling();
            tx.put_account(record);
            Ok(report)
        })
    }

    /// Run the overflow cascade for `account` against its current stake base.
    ///
    /// Stake changes already do this; calling it on a reconciled account is a
    /// no-op that only advances the bar's clock.
    pub fn reconcile(
        &mut self,
        ctx: &ChainContext<'_>,
        account: &AccountName,
    ) -> Result<ReconcileReport, RcError> {
        self.transact("reconcile", |tx| {
            let mut record = tx.require_account(account)?;
            record.regenerate(ctx.now, ctx.params)?;
            let report = absorb_overflow(tx, ctx, &mut record)?;
            record.refresh_ceiling();
            tx.put_account(record);
            Ok(report)
        })
    }

    /// Spend `amount` RC. Returns the mana left.
    pub fn consume(
        &mut self,
        ctx: &ChainContext<'_>,
        account: &AccountName,
        amount: u64,
    ) -> Result<u64, RcError> {
        self.transact("consume", |tx| {
            let mut record = tx.require_account(account)?;
            record.regenerate(ctx.now, ctx.params)?;
            let available = record.current_mana();
            if available < amount {
                return Err(RcError::InsufficientCapacity {
                    account: account.clone(),
                    needed: amount,
                    available,
                });
            }
            record.rc_manabar.current_mana = available - amount;
            tx.put_account(record);
            Ok(available - amount)
        })
    }

    /// Create, resize or delete (`amount == 0`) the `from -> to` delegation.
    pub fn set_delegation(
        &mut self,
        ctx: &ChainContext<'_>,
        from: &AccountName,
        to: &AccountName,
        amount: u64,
    ) -> Result<DelegationChange, RcError> {
        self.transact("set_delegation", |tx| {
            delegate(tx, ctx, from, to, amount)
        })
    }

    /// Set the same delegation amount to every delegatee, all or nothing.
    ///
    /// Delegatees are applied in ascending order.
    pub fn set_delegations(
        &mut self,
        ctx: &ChainContext<'_>,
        from: &AccountName,
        delegatees: &BTreeSet<AccountName>,
        amount: u64,
    ) -> Result<Vec<DelegationChange>, RcError> {
        check_delegatees(ctx.params, from, delegatees)?;
        self.transact("set_delegations", |tx| {
            delegatees
                .iter()
                .map(|to| delegate(tx, ctx, from, to, amount))
                .collect()
        })
    }

    /// Stored capacity record, as of its last update.
    pub fn capacity_account(&self, account: &AccountName) -> Result<Option<CapacityView>, RcError> {
        Ok(self.store.account(account)?.map(|record| record.view()))
    }

    /// Mana `account` would have at `ctx.now`, without writing anything.
    pub fn available_mana(
        &self,
        ctx: &ChainContext<'_>,
        account: &AccountName,
    ) -> Result<u64, RcError> {
        let record = self
            .store
            .account(account)?
            .ok_or_else(|| RcError::UnknownAccount(account.clone()))?;
        record
            .rc_manabar
            .available_at(record.max_mana, ctx.now, ctx.params)
            .map_err(|e| e.for_account(account))
    }

    pub fn delegation(&self, from: &AccountName, to: &AccountName) -> Result<Option<u64>, RcError> {
        self.store.delegation(from, to)
    }

    /// Outgoing delegations of `from`, ascending by delegatee.
    pub fn outgoing_delegations(
        &self,
        from: &AccountName,
    ) -> Result<Vec<OutgoingDelegation>, RcError> {
        self.store.outgoing(from)
    }

    /// Point-in-time copy for reporting.
    pub fn snapshot(&self) -> Result<LedgerSnapshot, RcError> {
        LedgerSnapshot::capture(&self.store)
    }
}

pub(crate) fn check_delegatees(
    params: &RcParams,
    from: &AccountName,
    delegatees: &BTreeSet<AccountName>,
) -> Result<(), RcError> {
    if delegatees.is_empty() {
        return Err(RcError::InvalidOperation(
            "delegation needs at least one delegatee".to_string(),
        ));
    }
    let max = params.max_delegatees_per_op;
    if delegatees.len() > max {
        return Err(RcError::TooManyDelegatees {
            count: delegatees.len(),
            max,
        });
    }
    if delegatees.contains(from) {
        return Err(RcError::SelfDelegation(from.clone()));
    }
    Ok(())
}

fn delegate<S: RcStore + ?Sized>(
    tx: &mut Transition<'_, S>,
    ctx: &ChainContext<'_>,
    from: &AccountName,
    to: &AccountName,
    amount: u64,
) -> Result<DelegationChange, RcError> {
    if from == to {
        return Err(RcError::SelfDelegation(from.clone()));
    }
    let mut delegator = tx.require_account(from)?;
    let mut delegatee = tx.require_account(to)?;

    let previous = match tx.delegation(from, to)? {
        None if amount == 0 => {
            return Err(RcError::NoOpDeletion {
                from: from.clone(),
                to: to.clone(),
            })
        }
        Some(existing) if existing == amount => {
            return Err(RcError::NoChange {
                from: from.clone(),
                to: to.clone(),
                amount,
            })
        }
        existing => existing.unwrap_or(0),
    };

    // Totals in u128; oversized amounts fail the capacity check below.
    let delegated = delegator
        .delegated_rc
        .checked_sub(previous)
        .map(|rest| rest as u128 + amount as u128)
        .ok_or_else(|| {
            RcError::CorruptState(format!(
                "{} delegates {} in total but {} to {}",
                from, delegator.delegated_rc, previous, to
            ))
        })?;
    let owned = delegator.owned_capacity();
    if delegated > owned as u128 {
        return Err(RcError::InsufficientCapacityToDelegate {
            account: from.clone(),
            requested: delegated,
            owned,
        });
    }
    let received = delegatee
        .received_delegated_rc
        .checked_sub(previous)
        .map(|rest| rest as u128 + amount as u128)
        .ok_or_else(|| {
            RcError::CorruptState(format!(
                "{} receives {} in total but {} from {}",
                to, delegatee.received_delegated_rc, previous, from
            ))
        })?;
    let received = u64::try_from(received).map_err(|_| {
        RcError::InvalidOperation(format!("{} cannot receive more than {} RC", to, u64::MAX))
    })?;
    // Bounded by `owned` above
    let delegated = delegated as u64;

    delegator.regenerate(ctx.now, ctx.params)?;
    delegatee.regenerate(ctx.now, ctx.params)?;
    delegator.delegated_rc = delegated;
    delegatee.received_delegated_rc = received;
    delegator.refresh_ceiling();
    delegatee.refresh_ceiling();

    tx.set_delegation(from, to, amount);
    tx.put_account(delegator);
    tx.put_account(delegatee);

    debug!(from = %from, to = %to, previous, amount, "Set RC delegation");
    Ok(DelegationChange {
        from: from.clone(),
        to: to.clone(),
        previous,
        amount,
    })
}
