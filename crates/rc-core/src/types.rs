//! Core identifiers shared by the RC ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RcError;

/// Chain time in whole seconds since the epoch.
pub type Timestamp = u64;

/// Shortest valid account name (and shortest dot-separated segment).
pub const MIN_ACCOUNT_NAME_LENGTH: usize = 3;

/// Longest valid account name.
pub const MAX_ACCOUNT_NAME_LENGTH: usize = 16;

/// A validated chain account name.
///
/// Names are 3-16 bytes of dot-separated segments. Every segment is at least
/// three bytes long, starts with a lowercase letter, ends with a lowercase
/// letter or digit, and otherwise holds lowercase letters, digits and `-`.
///
/// `Ord` is plain byte order, which is the order the reconciliation engine
/// walks outgoing delegations in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountName(String);

impl AccountName {
    /// Validate and wrap a name.
    pub fn new(name: impl Into<String>) -> Result<Self, RcError> {
        let name = name.into();
        if is_valid_account_name(&name) {
            Ok(Self(name))
        } else {
            Err(RcError::InvalidAccountName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Check a name against the chain's account naming rules.
pub fn is_valid_account_name(name: &str) -> bool {
    let len = name.len();
    if !(MIN_ACCOUNT_NAME_LENGTH..=MAX_ACCOUNT_NAME_LENGTH).contains(&len) {
        return false;
    }
    name.split('.').all(is_valid_segment)
}

fn is_valid_segment(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    if bytes.len() < MIN_ACCOUNT_NAME_LENGTH {
        return false;
    }
    let first = bytes[0];
    let last = bytes[bytes.len() - 1];
    if !first.is_ascii_lowercase() {
        return false;
    }
    if !(last.is_ascii_lowercase() || last.is_ascii_digit()) {
        return false;
    }
    bytes[1..bytes.len() - 1]
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountName {
    type Err = RcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountName {
    type Error = RcError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for AccountName {
    type Error = RcError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountName> for String {
    fn from(name: AccountName) -> Self {
        name.0
    }
}

impl AsRef<str> for AccountName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
