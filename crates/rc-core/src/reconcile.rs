//! Delegation overflow cascade.
//!
//! When an account's owned capacity drops below what it has delegated out,
//! its outgoing edges are shrunk in ascending delegatee order until the
//! deficit is gone. The order is part of consensus: every node must walk
//! edges identically.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::RcAccount;
use crate::config::ChainContext;
use crate::error::RcError;
use crate::store::RcStore;
use crate::transition::Transition;
use crate::types::AccountName;

/// One edge shrunk by the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeAdjustment {
    pub to: AccountName,
    pub previous: u64,
    pub reduced_by: u64,
    /// Zero when the edge was deleted
    pub remaining: u64,
}

/// Outcome of reconciling one delegator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub account: AccountName,
    /// Overflow found before the cascade ran
    pub deficit: u64,
    pub adjustments: Vec<EdgeAdjustment>,
}

impl ReconcileReport {
    pub fn total_reduced(&self) -> u64 {
        self.adjustments.iter().map(|a| a.reduced_by).sum()
    }

    /// Delegatees whose edge was removed entirely
    pub fn removed(&self) -> impl Iterator<Item = &AccountName> {
        self.adjustments
            .iter()
            .filter(|a| a.remaining == 0)
            .map(|a| &a.to)
    }

    pub fn is_noop(&self) -> bool {
        self.adjustments.is_empty()
    }
}

/// Shrink `delegator`'s outgoing edges until `delegated_rc <= owned_capacity`.
///
/// `delegator` must already be regenerated to `ctx.now`; its ceiling is left
/// for the caller to refresh. Each affected delegatee is regenerated under its
/// old ceiling, then rescaled to the new one.
pub(crate) fn absorb_overflow<S: RcStore + ?Sized>(
    tx: &mut Transition<'_, S>,
    ctx: &ChainContext<'_>,
    delegator: &mut RcAccount,
) -> Result<ReconcileReport, RcError> {
    let deficit = delegator.delegation_overflow();
    let mut report = ReconcileReport {
        account: delegator.account.clone(),
        deficit,
        adjustments: Vec::new(),
    };
    if deficit == 0 {
        return Ok(report);
    }

    let mut remaining_deficit = deficit;
    for edge in tx.outgoing(&delegator.account)? {
        if remaining_deficit == 0 {
            break;
        }
        let reduction = remaining_deficit.min(edge.amount);
        let remaining = edge.amount - reduction;

        let mut delegatee = tx.require_account(&edge.to)?;
        delegatee.regenerate(ctx.now, ctx.params)?;
        delegatee.received_delegated_rc = delegatee
            .received_delegated_rc
            .checked_sub(reduction)
            .ok_or_else(|| {
                RcError::CorruptState(format!(
                    "{} receives less than the {} on its edge from {}",
                    delegatee.account, edge.amount, delegator.account
                ))
            })?;
        delegatee.refresh_ceiling();

        debug!(
            from = %delegator.account,
            to = %edge.to,
            previous = edge.amount,
            reduced_by = reduction,
            remaining,
            "Shrinking RC delegation"
        );

        tx.set_delegation(&delegator.account, &edge.to, remaining);
        tx.put_account(delegatee);
        delegator.delegated_rc -= reduction;
        remaining_deficit -= reduction;
        report.adjustments.push(EdgeAdjustment {
            to: edge.to,
            previous: edge.amount,
            reduced_by: reduction,
            remaining,
        });
    }

    if remaining_deficit > 0 {
        return Err(RcError::CorruptState(format!(
            "{} has {} delegated RC not backed by any edge",
            delegator.account, remaining_deficit
        )));
    }
    Ok(report)
}
