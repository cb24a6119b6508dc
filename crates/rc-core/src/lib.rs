//! Resource Credits for a replicated ledger node
//!
//! Every account carries a regenerating "mana bar" of resource credits (RC)
//! that rate-limits how much ledger work it can do. Accounts may lend unused
//! capacity to others through direct delegation edges.
//!
//! # Key Components
//!
//! - [`ManaBar`]: linear regeneration and proportional rescaling, integer-exact
//! - [`RcAccount`]: per-account capacity record
//! - [`RcLedger`]: stake changes, consumption and delegation, each atomic
//! - [`ReconcileReport`]: result of the overflow cascade that shrinks
//!   delegations when a delegator's stake no longer covers them
//! - [`RcStore`]: storage seam; [`MemoryStore`] here, sled in `rc-store`
//! - [`LedgerSnapshot`]: point-in-time copy for reporting, dumps and audits
//!
//! # Determinism
//!
//! All arithmetic is integer with `u128` intermediates and truncating
//! division. Within an operation the bar is always regenerated under the old
//! ceiling before any structural change, then rescaled to the new ceiling.
//! Outgoing delegations are shrunk in ascending delegatee order.
//!
//! # Example
//!
//! ```
//! use rc_core::{AccountName, ChainContext, MemoryStore, RcLedger, RcParams};
//!
//! let params = RcParams::default();
//! let ctx = ChainContext::new(1_000, &params);
//! let alice = AccountName::new("alice").unwrap();
//! let bob = AccountName::new("bob").unwrap();
//!
//! let mut ledger = RcLedger::new(MemoryStore::new());
//! ledger.create_account(&ctx, &alice, Some(10), 90).unwrap();
//! ledger.create_account(&ctx, &bob, Some(10), 0).unwrap();
//! ledger.set_delegation(&ctx, &alice, &bob, 10).unwrap();
//!
//! let bob_rc = ledger.capacity_account(&bob).unwrap().unwrap();
//! assert_eq!(bob_rc.max_mana, 20);
//! ```

pub mod account;
pub mod config;
pub mod delegation;
pub mod error;
pub mod ledger;
pub mod manabar;
pub mod ops;
pub mod reconcile;
pub mod snapshot;
pub mod store;
mod transition;
pub mod types;

// Re-export main types
pub use account::{CapacityView, RcAccount};
pub use config::{ChainContext, RcParams};
pub use delegation::{Delegation, DelegationKey, OutgoingDelegation};
pub use error::RcError;
pub use ledger::{DelegationChange, RcLedger};
pub use manabar::ManaBar;
pub use ops::{OperationOutcome, RcOperation, ScheduledOperation};
pub use reconcile::{EdgeAdjustment, ReconcileReport};
pub use snapshot::{InvariantViolation, LedgerSnapshot};
pub use store::{ChangeSet, MemoryStore, RcStore};
pub use types::{AccountName, Timestamp};
