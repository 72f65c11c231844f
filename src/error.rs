//! Error taxonomy for the relay core

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::U256;
use thiserror::Error;

use crate::retry::{classify_error, ErrorClass};
use crate::types::TxHash;

/// Failure talking to a ledger endpoint
#[derive(Debug, Error)]
pub enum ChainError {
    /// Node unreachable or temporarily unavailable
    #[error("connectivity error: {0}")]
    Connectivity(String),
    /// The installed log filter (or the block it anchors to) is gone
    #[error("log filter lost: {0}")]
    FilterLost(String),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("failed to decode log: {0}")]
    Decode(String),
    #[error("failed to sign transaction: {0}")]
    Signing(String),
}

impl ChainError {
    /// Map a raw RPC/transport error into the taxonomy by its message
    pub fn from_rpc(error: impl std::fmt::Display) -> Self {
        let message = error.to_string();
        match classify_error(&message) {
            ErrorClass::Transient => ChainError::Connectivity(message),
            ErrorClass::FilterLost => ChainError::FilterLost(message),
            _ => ChainError::Rpc(message),
        }
    }

    /// Error class, for logging and metrics labels
    pub fn class(&self) -> ErrorClass {
        match self {
            ChainError::Connectivity(_) => ErrorClass::Transient,
            ChainError::FilterLost(_) => ErrorClass::FilterLost,
            ChainError::Rpc(msg) => classify_error(msg),
            ChainError::Decode(_) | ChainError::Signing(_) => ErrorClass::Permanent,
        }
    }
}

/// Replay store persistence failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read replay store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("replay store {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("replay store {path} belongs to partition {found}, expected {expected}")]
    PartitionMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
    #[error("failed to write replay store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode replay store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a deposit event is not this relayer's responsibility
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("destination chain {found} does not match configured {expected}")]
    WrongDestination { expected: u64, found: U256 },
    #[error("missing or zero-valued field `{0}`")]
    MissingField(&'static str),
}

impl RejectReason {
    /// Short label for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::WrongDestination { .. } => "wrong_destination",
            RejectReason::MissingField(_) => "missing_field",
        }
    }
}

/// Broadcaster failure
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Failed before anything was sent (nonce, gas price, signing); safe to retry
    #[error("failed to prepare mint transaction: {0}")]
    Prepare(#[source] ChainError),
    /// Submission itself failed; the transaction may or may not be in a mempool
    #[error("failed to submit mint transaction: {0}")]
    Submit(#[source] ChainError),
    /// Sent, but no receipt appeared within the bound
    #[error("no receipt for {tx_hash} within {timeout:?}")]
    Timeout { tx_hash: TxHash, timeout: Duration },
}

/// Failure of a relay cycle
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RelayError {
    /// Store errors stop the relayer; everything else is retried after backoff
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::Store(_))
    }
}
