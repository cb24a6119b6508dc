//! RC Store - sled persistence for the RC ledger
//!
//! Implements [`rc_core::RcStore`] on top of sled so capacity records and
//! delegation edges survive restarts. Each ledger operation lands as one
//! multi-tree transaction.
//!
//! ## Storage Layout
//!
//! ```text
//! rc-ledger.sled/
//! ├── rc_accounts        # account name -> MessagePack RcAccount
//! └── rc_delegations     # "from:to" -> u64 amount (big-endian)
//! ```
//!
//! ## Binaries
//!
//! - `rc-replay` - apply a JSON list of scheduled operations to a store and
//!   optionally dump an audited snapshot

pub mod config;
pub mod error;
pub mod sled_store;

pub use config::{Config, StoreConfig};
pub use error::StoreError;
pub use sled_store::SledStore;
