//! Event validation: turns a confirmed deposit into a relay instruction

use alloy::primitives::{Address, U256};

use crate::error::RejectReason;
use crate::types::{RelayInstruction, SourceEvent};

/// Validate `event` for this relayer.
///
/// Checks run in order and the first failure wins:
/// 1. the deposit targets `expected_destination_chain_id`
/// 2. recipient and amount are present (non-zero)
///
/// Pure: no I/O, no store lookups.
pub fn validate(
    event: &SourceEvent,
    expected_destination_chain_id: u64,
) -> Result<RelayInstruction, RejectReason> {
    if event.destination_chain_id != U256::from(expected_destination_chain_id) {
        return Err(RejectReason::WrongDestination {
            expected: expected_destination_chain_id,
            found: event.destination_chain_id,
        });
    }

    if event.recipient == Address::ZERO {
        return Err(RejectReason::MissingField("recipient"));
    }
    if event.amount.is_zero() {
        return Err(RejectReason::MissingField("amount"));
    }

    Ok(RelayInstruction {
        recipient: event.recipient,
        amount: event.amount,
        source_tx_hash: event.tx_hash,
    })
}
