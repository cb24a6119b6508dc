//! Direct RC delegation edges.

use serde::{Deserialize, Serialize};

use crate::types::AccountName;

/// Separator between `from` and `to` in encoded edge keys. Never valid inside
/// an account name, so `from:` is an unambiguous prefix.
pub const EDGE_KEY_SEPARATOR: char = ':';

/// A directed grant of RC. Edges with a zero amount do not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub from: AccountName,
    pub to: AccountName,
    /// Capacity lent along this edge (`delegated_rc` on the edge record)
    pub amount: u64,
}

/// Unique `(from, to)` key of a delegation edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DelegationKey {
    pub from: AccountName,
    pub to: AccountName,
}

impl DelegationKey {
    pub fn new(from: AccountName, to: AccountName) -> Self {
        Self { from, to }
    }

    /// `from:to`, the persisted key.
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.from, EDGE_KEY_SEPARATOR, self.to)
    }

    /// Prefix selecting every outgoing edge of `from`.
    pub fn from_prefix(from: &AccountName) -> String {
        format!("{}{}", from, EDGE_KEY_SEPARATOR)
    }

    /// Inverse of [`DelegationKey::encode`]; `None` for malformed keys.
    pub fn decode(key: &str) -> Option<Self> {
        let (from, to) = key.split_once(EDGE_KEY_SEPARATOR)?;
        Some(Self {
            from: AccountName::new(from).ok()?,
            to: AccountName::new(to).ok()?,
        })
    }
}

impl Delegation {
    pub fn key(&self) -> DelegationKey {
        DelegationKey::new(self.from.clone(), self.to.clone())
    }
}

/// One outgoing edge as reported by `outgoing_delegations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingDelegation {
    pub to: AccountName,
    pub amount: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_encoding() {
        let key = DelegationKey::new(
            AccountName::new("alice").unwrap(),
            AccountName::new("bob.xyz").unwrap(),
        );
        assert_eq!(key.encode(), "alice:bob.xyz");
        assert_eq!(DelegationKey::decode("alice:bob.xyz"), Some(key));
        assert!(DelegationKey::decode("alice").is_none());
        assert!(DelegationKey::decode("alice:b").is_none());
    }

    #[test]
    fn test_prefix_does_not_match_longer_names() {
        let alice = AccountName::new("alice").unwrap();
        let prefix = DelegationKey::from_prefix(&alice);
        let other = DelegationKey::new(
            AccountName::new("alice.xyz").unwrap(),
            AccountName::new("bob").unwrap(),
        );
        assert!(!other.encode().starts_with(&prefix));
    }
}
