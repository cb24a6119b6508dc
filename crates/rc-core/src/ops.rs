//! RC operations as they arrive from block application.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::account::CapacityView;
use crate::config::{ChainContext, RcParams};
use crate::error::RcError;
use crate::ledger::{check_delegatees, DelegationChange, RcLedger};
use crate::reconcile::ReconcileReport;
use crate::store::RcStore;
use crate::types::{AccountName, Timestamp};

/// One RC-affecting event, applied atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RcOperation {
    /// A chain account was created
    CreateAccount {
        account: AccountName,
        #[serde(default)]
        creation_adjustment: Option<i64>,
        #[serde(default)]
        stake: u64,
    },
    /// Set (or delete, with zero) one delegation edge
    DelegateCapacity {
        from: AccountName,
        to: AccountName,
        amount: u64,
    },
    /// Set the same amount on several edges at once
    DelegateCapacityBatch {
        from: AccountName,
        delegatees: BTreeSet<AccountName>,
        amount: u64,
    },
    /// The account's stake-derived capacity base changed
    StakeChanged {
        account: AccountName,
        new_stake_base: u64,
    },
    /// Spend RC for ledger work
    ConsumeCapacity { account: AccountName, amount: u64 },
}

impl RcOperation {
    /// Stateless checks, done before touching the ledger.
    pub fn validate(&self, params: &RcParams) -> Result<(), RcError> {
        match self {
            RcOperation::DelegateCapacity { from, to, .. } if from == to => {
                Err(RcError::SelfDelegation(from.clone()))
            }
            RcOperation::DelegateCapacityBatch {
                from, delegatees, ..
            } => check_delegatees(params, from, delegatees),
            _ => Ok(()),
        }
    }

    /// Account whose action this is
    pub fn account(&self) -> &AccountName {
        match self {
            RcOperation::CreateAccount { account, .. }
            | RcOperation::StakeChanged { account, .. }
            | RcOperation::ConsumeCapacity { account, .. } => account,
            RcOperation::DelegateCapacity { from, .. }
            | RcOperation::DelegateCapacityBatch { from, .. } => from,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RcOperation::CreateAccount { .. } => "create_account",
            RcOperation::DelegateCapacity { .. } => "delegate_capacity",
            RcOperation::DelegateCapacityBatch { .. } => "delegate_capacity_batch",
            RcOperation::StakeChanged { .. } => "stake_changed",
            RcOperation::ConsumeCapacity { .. } => "consume_capacity",
        }
    }
}

/// What an applied operation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OperationOutcome {
    AccountCreated { view: CapacityView },
    DelegationsSet { changes: Vec<DelegationChange> },
    StakeApplied { reconciliation: Option<ReconcileReport> },
    Consumed { account: AccountName, remaining: u64 },
}

/// An operation stamped with the head time it applies at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledOperation {
    pub time: Timestamp,
    pub op: RcOperation,
}

impl<S: RcStore> RcLedger<S> {
    /// Validate and apply one operation.
    pub fn apply(
        &mut self,
        ctx: &ChainContext<'_>,
        op: &RcOperation,
    ) -> Result<OperationOutcome, RcError> {
        op.validate(ctx.params)?;
        match op {
            RcOperation::CreateAccount {
                account,
                creation_adjustment,
                stake,
            } => self
                .create_account(ctx, account, *creation_adjustment, *stake)
                .map(|view| OperationOutcome::AccountCreated { view }),
            RcOperation::DelegateCapacity { from, to, amount } => self
                .set_delegation(ctx, from, to, *amount)
                .map(|change| OperationOutcome::DelegationsSet {
                    changes: vec![change],
                }),
            RcOperation::DelegateCapacityBatch {
                from,
                delegatees,
                amount,
            } => self
                .set_delegations(ctx, from, delegatees, *amount)
                .map(|changes| OperationOutcome::DelegationsSet { changes }),
            RcOperation::StakeChanged {
                account,
                new_stake_base,
            } => self
                .apply_stake_change(ctx, account, *new_stake_base)
                .map(|reconciliation| OperationOutcome::StakeApplied { reconciliation }),
            RcOperation::ConsumeCapacity { account, amount } => self
                .consume(ctx, account, *amount)
                .map(|remaining| OperationOutcome::Consumed {
                    account: account.clone(),
                    remaining,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_operation_json_shape() {
        let json = r#"{"type":"delegate_capacity","from":"alice","to":"bob","amount":10}"#;
        let op: RcOperation = serde_json::from_str(json).unwrap();
        assert_eq!(op.kind(), "delegate_capacity");
        assert_eq!(op.account().as_str(), "alice");

        let json = r#"{"type":"create_account","account":"carol"}"#;
        let op: RcOperation = serde_json::from_str(json).unwrap();
        assert_eq!(
            op,
            RcOperation::CreateAccount {
                account: AccountName::new("carol").unwrap(),
                creation_adjustment: None,
                stake: 0,
            }
        );

        let bad = r#"{"type":"delegate_capacity","from":"alice-","to":"bob","amount":10}"#;
        assert!(serde_json::from_str::<RcOperation>(bad).is_err());
    }

    #[test]
    fn test_validate_rejects_self_delegation() {
        let alice = AccountName::new("alice").unwrap();
        let params = RcParams::default();
        for amount in [0, 1, u64::MAX] {
            let op = RcOperation::DelegateCapacity {
                from: alice.clone(),
                to: alice.clone(),
                amount,
            };
            assert_eq!(op.validate(&params), Err(RcError::SelfDelegation(alice.clone())));
        }
    }

    #[test]
    fn test_validate_batch_against_params() {
        let alice = AccountName::new("alice").unwrap();
        let params = RcParams {
            max_delegatees_per_op: 2,
            ..Default::default()
        };
        let batch = |names: &[&str]| RcOperation::DelegateCapacityBatch {
            from: alice.clone(),
            delegatees: names.iter().map(|n| AccountName::new(*n).unwrap()).collect(),
            amount: 5,
        };
        assert!(batch(&["bob", "carol"]).validate(&params).is_ok());
        assert!(matches!(batch(&[]).validate(&params), Err(RcError::InvalidOperation(_))));
        assert_eq!(
            batch(&["bob", "carol", "dave"]).validate(&params),
            Err(RcError::TooManyDelegatees { count: 3, max: 2 })
        );
        assert_eq!(
            batch(&["alice", "bob"]).validate(&params),
            Err(RcError::SelfDelegation(alice.clone()))
        );
    }

    #[test]
    fn test_apply_dispatches() {
        let params = RcParams::default();
        let ctx = ChainContext::new(0, &params);
        let mut ledger = RcLedger::new(MemoryStore::new());
        let ops: Vec<RcOperation> = serde_json::from_str(
            r#"[
                {"type":"create_account","account":"alice","stake":100},
                {"type":"create_account","account":"bob","creation_adjustment":10},
                {"type":"delegate_capacity","from":"alice","to":"bob","amount":40},
                {"type":"consume_capacity","account":"bob","amount":15},
                {"type":"stake_changed","account":"alice","new_stake_base":30}
            ]"#,
        )
        .unwrap();
        let outcomes: Vec<OperationOutcome> = ops
            .iter()
            .map(|op| ledger.apply(&ctx, op).unwrap())
            .collect();

        assert!(matches!(
            &outcomes[3],
            OperationOutcome::Consumed { remaining: 35, .. }
        ));
        match &outcomes[4] {
            OperationOutcome::StakeApplied {
                reconciliation: Some(report),
            } => {
                assert_eq!(report.deficit, 10);
                assert_eq!(report.total_reduced(), 10);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let bob = AccountName::new("bob").unwrap();
        assert_eq!(
            ledger.delegation(&AccountName::new("alice").unwrap(), &bob).unwrap(),
            Some(30)
        );
    }
}
