//! Confirmation gate: reorg safety margin for source events

use crate::types::SourceEvent;

/// Default number of blocks on top of an event's block before it is acted on
pub const DEFAULT_CONFIRMATION_DEPTH: u64 = 6;

/// `true` when `current_height - event.block_number >= confirmation_depth`.
///
/// An event whose block is above the current height (lagging node, or the
/// event came from a replaced branch) is never final.
pub fn is_final(event: &SourceEvent, current_height: u64, confirmation_depth: u64) -> bool {
    current_height
        .checked_sub(event.block_number)
        .is_some_and(|confirmations| confirmations >= confirmation_depth)
}

/// Fixed-depth finality policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationGate {
    depth: u64,
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATION_DEPTH)
    }
}

impl ConfirmationGate {
    pub fn new(depth: u64) -> Self {
        Self { depth }
    }

    pub fn depth(&self) -> u64 {
        self.depth
    }

    pub fn is_final(&self, event: &SourceEvent, current_height: u64) -> bool {
        is_final(event, current_height, self.depth)
    }

    /// Blocks still needed before `event` becomes final
    pub fn blocks_remaining(&self, event: &SourceEvent, current_height: u64) -> u64 {
        event
            .block_number
            .saturating_add(self.depth)
            .saturating_sub(current_height)
    }
}
