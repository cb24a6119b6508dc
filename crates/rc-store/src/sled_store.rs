//! Sled-backed RC store
//!
//! Two trees:
//! - `rc_accounts`: account name -> MessagePack [`RcAccount`]
//! - `rc_delegations`: `from:to` -> big-endian `u64` amount
//!
//! A `from:` prefix scan is the delegator index and yields delegatees in
//! ascending order. Across delegators the byte order of `from:to` differs from
//! name order (`.` sorts before `:`), so full listings are re-sorted.

use rc_core::{
    AccountName, ChangeSet, Delegation, DelegationKey, OutgoingDelegation, RcAccount, RcError,
    RcStore,
};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::StoreError;

const ACCOUNTS_TREE: &str = "rc_accounts";
const DELEGATIONS_TREE: &str = "rc_delegations";

/// Persistent RC store
pub struct SledStore {
    db: sled::Db,
    accounts: sled::Tree,
    delegations: sled::Tree,
}

impl SledStore {
    /// Open or create the store
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .path(&config.db_path)
            .cache_capacity(config.cache_capacity)
            .temporary(config.temporary)
            .open()?;
        let accounts = db.open_tree(ACCOUNTS_TREE)?;
        let delegations = db.open_tree(DELEGATIONS_TREE)?;

        info!(
            path = %config.db_path.display(),
            accounts = accounts.len(),
            delegations = delegations.len(),
            "Opened RC store"
        );
        Ok(Self {
            db,
            accounts,
            delegations,
        })
    }

    /// Open a store at a specific path with default settings
    pub fn at_path(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        Self::open(&StoreConfig {
            db_path: path.as_ref().to_path_buf(),
            ..Default::default()
        })
    }

    /// Flush changes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn delegation_count(&self) -> usize {
        self.delegations.len()
    }

    fn decode_account(bytes: &[u8]) -> Result<RcAccount, StoreError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    fn decode_amount(key: &[u8], bytes: &[u8]) -> Result<u64, StoreError> {
        let raw: [u8; 8] = bytes.try_into().map_err(|_| {
            StoreError::Serialization(format!(
                "edge {} has a {}-byte amount",
                String::from_utf8_lossy(key),
                bytes.len()
            ))
        })?;
        Ok(u64::from_be_bytes(raw))
    }

    fn decode_key(key: &[u8]) -> Result<DelegationKey, StoreError> {
        std::str::from_utf8(key)
            .ok()
            .and_then(DelegationKey::decode)
            .ok_or_else(|| StoreError::MalformedKey {
                tree: DELEGATIONS_TREE,
                key: String::from_utf8_lossy(key).into_owned(),
            })
    }

    fn write(&self, changes: ChangeSet) -> Result<(), StoreError> {
        // Encode up front; the transaction closure may run more than once.
        let mut accounts = Vec::with_capacity(changes.accounts.len());
        for (name, record) in &changes.accounts {
            accounts.push((name.as_bytes().to_vec(), rmp_serde::to_vec(record)?));
        }
        let delegations: Vec<(Vec<u8>, Option<[u8; 8]>)> = changes
            .delegations
            .iter()
            .map(|(key, amount)| (key.encode().into_bytes(), amount.map(u64::to_be_bytes)))
            .collect();

        (&self.accounts, &self.delegations)
            .transaction(|(account_tree, delegation_tree)| {
                for (key, value) in &accounts {
                    account_tree.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, amount) in &delegations {
                    match amount {
                        Some(bytes) => {
                            delegation_tree.insert(key.as_slice(), &bytes[..])?;
                        }
                        None => {
                            delegation_tree.remove(key.as_slice())?;
                        }
                    }
                }
                Ok::<(), ConflictableTransactionError<StoreError>>(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(inner) => inner,
                TransactionError::Storage(inner) => StoreError::Database(inner),
            })?;

        debug!(
            accounts = accounts.len(),
            delegations = delegations.len(),
            "Committed RC change set"
        );
        Ok(())
    }
}

impl RcStore for SledStore {
    fn account(&self, name: &AccountName) -> Result<Option<RcAccount>, RcError> {
        match self.accounts.get(name.as_bytes()).map_err(StoreError::from)? {
            Some(bytes) => Ok(Some(Self::decode_account(&bytes)?)),
            None => Ok(None),
        }
    }

    fn delegation(&self, from: &AccountName, to: &AccountName) -> Result<Option<u64>, RcError> {
        let key = DelegationKey::new(from.clone(), to.clone()).encode();
        match self.delegations.get(key.as_bytes()).map_err(StoreError::from)? {
            Some(bytes) => Ok(Some(Self::decode_amount(key.as_bytes(), &bytes)?)),
            None => Ok(None),
        }
    }

    fn outgoing(&self, from: &AccountName) -> Result<Vec<OutgoingDelegation>, RcError> {
        let prefix = DelegationKey::from_prefix(from);
        let mut edges = Vec::new();
        for item in self.delegations.scan_prefix(prefix.as_bytes()) {
            let (key, value) = item.map_err(StoreError::from)?;
            let decoded = Self::decode_key(&key)?;
            edges.push(OutgoingDelegation {
                to: decoded.to,
                amount: Self::decode_amount(&key, &value)?,
            });
        }
        Ok(edges)
    }

    fn accounts(&self) -> Result<Vec<RcAccount>, RcError> {
        let mut records = Vec::with_capacity(self.accounts.len());
        for item in self.accounts.iter() {
            let (_, value) = item.map_err(StoreError::from)?;
            records.push(Self::decode_account(&value)?);
        }
        Ok(records)
    }

    fn delegations(&self) -> Result<Vec<Delegation>, RcError> {
        let mut edges = Vec::with_capacity(self.delegations.len());
        for item in self.delegations.iter() {
            let (key, value) = item.map_err(StoreError::from)?;
            let decoded = Self::decode_key(&key)?;
            edges.push(Delegation {
                from: decoded.from,
                to: decoded.to,
                amount: Self::decode_amount(&key, &value)?,
            });
        }
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        Ok(edges)
    }

    fn is_empty(&self) -> Result<bool, RcError> {
        Ok(self.accounts.is_empty() && self.delegations.is_empty())
    }

    fn commit(&mut self, changes: ChangeSet) -> Result<(), RcError> {
        if changes.is_empty() {
            return Ok(());
        }
        Ok(self.write(changes)?)
    }
}
