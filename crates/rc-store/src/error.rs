//! Error types for rc-store

use rc_core::RcError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Transaction aborted: {0}")]
    Transaction(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Malformed key in {tree}: {key:?}")]
    MalformedKey { tree: &'static str, key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for RcError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Serialization(_) | StoreError::MalformedKey { .. } => {
                RcError::CorruptState(e.to_string())
            }
            other => RcError::Storage(other.to_string()),
        }
    }
}
