//! Common types for the relay pipeline
//!
//! Source-side events, the instructions derived from them, and the outcome
//! of a destination broadcast.

use alloy::primitives::{Address, B256, U256};
use std::fmt;

/// 32-byte transaction identifier, used as the replay key
pub type TxHash = B256;

/// Identifier of an installed log filter on the source node
pub type FilterId = U256;

/// A `TokensDeposited` event observed on the source chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEvent {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub log_index: Option<u64>,
    pub sender: Address,
    pub recipient: Address,
    pub amount: U256,
    pub destination_chain_id: U256,
    /// Sequence number assigned by the source contract. Not used for dedup.
    pub nonce: U256,
}

/// One entry delivered by a log filter poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogChange {
    /// A deposit log was added to the chain
    Deposit(SourceEvent),
    /// A previously delivered log was dropped by a reorg
    Removed(TxHash),
}

/// A validated, confirmed deposit ready to be minted on the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayInstruction {
    pub recipient: Address,
    pub amount: U256,
    pub source_tx_hash: TxHash,
}

/// Terminal status of a destination broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastStatus {
    /// Signed but not sent (simulate mode)
    Submitted,
    /// Included with a successful receipt
    Confirmed,
    /// Included with a reverted receipt
    Failed,
}

impl BroadcastStatus {
    /// Get the status as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastStatus::Submitted => "submitted",
            BroadcastStatus::Confirmed => "confirmed",
            BroadcastStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BroadcastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether destination transactions are actually sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// Build and sign only; nothing reaches the destination chain
    Simulate,
    /// Broadcast and wait for a receipt
    Live,
}

impl SubmissionMode {
    pub fn from_simulate_flag(simulate_only: bool) -> Self {
        if simulate_only {
            SubmissionMode::Simulate
        } else {
            SubmissionMode::Live
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionMode::Simulate => "simulate",
            SubmissionMode::Live => "live",
        }
    }
}

/// Result of a single Broadcaster call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub destination_tx_hash: TxHash,
    pub status: BroadcastStatus,
}

impl BroadcastOutcome {
    /// Whether this outcome is the commit point for the replay store.
    ///
    /// Live mode commits only on `Confirmed`; simulate mode only on `Submitted`.
    pub fn is_committable(&self, mode: SubmissionMode) -> bool {
        matches!(
            (mode, self.status),
            (SubmissionMode::Live, BroadcastStatus::Confirmed)
                | (SubmissionMode::Simulate, BroadcastStatus::Submitted)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: BroadcastStatus) -> BroadcastOutcome {
        BroadcastOutcome {
            destination_tx_hash: B256::repeat_byte(0x11),
            status,
        }
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(BroadcastStatus::Submitted.as_str(), "submitted");
        assert_eq!(BroadcastStatus::Confirmed.as_str(), "confirmed");
        assert_eq!(BroadcastStatus::Failed.as_str(), "failed");
        assert_eq!(format!("{}", BroadcastStatus::Confirmed), "confirmed");
    }

    #[test]
    fn test_commit_point_live() {
        assert!(outcome(BroadcastStatus::Confirmed).is_committable(SubmissionMode::Live));
        assert!(!outcome(BroadcastStatus::Failed).is_committable(SubmissionMode::Live));
        assert!(!outcome(BroadcastStatus::Submitted).is_committable(SubmissionMode::Live));
    }

    #[test]
    fn test_commit_point_simulate() {
        assert!(outcome(BroadcastStatus::Submitted).is_committable(SubmissionMode::Simulate));
        assert!(!outcome(BroadcastStatus::Failed).is_committable(SubmissionMode::Simulate));
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(SubmissionMode::from_simulate_flag(true), SubmissionMode::Simulate);
        assert_eq!(SubmissionMode::from_simulate_flag(false), SubmissionMode::Live);
    }
}
