//! Error types for the RC ledger

use thiserror::Error;

use crate::types::{AccountName, Timestamp};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RcError {
    #[error("Unknown account: {0}")]
    UnknownAccount(AccountName),

    #[error("Invalid account name: {0:?}")]
    InvalidAccountName(String),

    #[error("Account already exists: {0}")]
    AccountExists(AccountName),

    #[error("Account {0} cannot delegate RC to itself")]
    SelfDelegation(AccountName),

    #[error("No delegation from {from} to {to} to remove")]
    NoOpDeletion { from: AccountName, to: AccountName },

    #[error("Delegation from {from} to {to} is already {amount}")]
    NoChange {
        from: AccountName,
        to: AccountName,
        amount: u64,
    },

    #[error("{account} cannot delegate {requested} RC: only {owned} owned")]
    InsufficientCapacityToDelegate {
        account: AccountName,
        /// Outgoing total the change would leave
        requested: u128,
        owned: u64,
    },

    #[error("{account} has insufficient RC: needs {needed}, has {available}")]
    InsufficientCapacity {
        account: AccountName,
        needed: u64,
        available: u64,
    },

    #[error("Time went backwards for {account}: last update {last_update}, now {now}")]
    NonMonotonicTime {
        account: AccountName,
        last_update: Timestamp,
        now: Timestamp,
    },

    #[error("Too many delegatees: {count} (max {max})")]
    TooManyDelegatees { count: usize, max: usize },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Ledger state is inconsistent: {0}")]
    CorruptState(String),
}

impl RcError {
    /// Conditions after which the node cannot keep applying blocks.
    ///
    /// A backwards clock means state transitions are no longer reproducible;
    /// storage failures and broken totals mean the local state is unknown.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RcError::NonMonotonicTime { .. } | RcError::Storage(_) | RcError::CorruptState(_)
        )
    }
}

impl From<serde_json::Error> for RcError {
    fn from(e: serde_json::Error) -> Self {
        RcError::Codec(e.to_string())
    }
}
