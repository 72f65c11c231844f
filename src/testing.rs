//! In-memory chain handles for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use crate::chain::{DestinationChain, MintReceipt, SignedTx, SourceChain};
use crate::error::ChainError;
use crate::types::{FilterId, LogChange, SourceEvent, TxHash};

/// Deposit `tag` at `block_number` bound for `destination_chain_id`.
/// The tx hash is `tag` repeated, so `deposit(0xaa, ..)` is tx `0xaaaa…`.
pub fn deposit(tag: u8, block_number: u64, destination_chain_id: u64) -> SourceEvent {
    SourceEvent {
        tx_hash: B256::repeat_byte(tag),
        block_number,
        log_index: Some(0),
        sender: Address::repeat_byte(0x01),
        recipient: Address::repeat_byte(0x02),
        amount: U256::from(1_000u64),
        destination_chain_id: U256::from(destination_chain_id),
        nonce: U256::from(tag),
    }
}

#[derive(Default)]
struct SourceState {
    height: u64,
    polls: VecDeque<Vec<LogChange>>,
    lose_filter: bool,
    fail_height: bool,
    next_filter: u64,
    installed: Vec<FilterId>,
    uninstalled: Vec<FilterId>,
}

/// Scripted source chain: each poll pops one queued batch of changes
#[derive(Default)]
pub struct MockSource {
    state: Mutex<SourceState>,
}

impl MockSource {
    pub fn new(height: u64) -> Self {
        let source = Self::default();
        source.set_height(height);
        source
    }

    pub fn set_height(&self, height: u64) {
        self.state.lock().unwrap().height = height;
    }

    pub fn push_changes(&self, changes: Vec<LogChange>) {
        self.state.lock().unwrap().polls.push_back(changes);
    }

    pub fn push_deposits(&self, events: Vec<SourceEvent>) {
        self.push_changes(events.into_iter().map(LogChange::Deposit).collect());
    }

    /// Next poll reports the filter as unknown to the node
    pub fn lose_filter(&self) {
        self.state.lock().unwrap().lose_filter = true;
    }

    /// Next height query fails with a connectivity error
    pub fn fail_next_height(&self) {
        self.state.lock().unwrap().fail_height = true;
    }

    pub fn installed(&self) -> Vec<FilterId> {
        self.state.lock().unwrap().installed.clone()
    }

    pub fn uninstalled(&self) -> Vec<FilterId> {
        self.state.lock().unwrap().uninstalled.clone()
    }
}

#[async_trait]
impl SourceChain for MockSource {
    async fn current_height(&self) -> Result<u64, ChainError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_height) {
            return Err(ChainError::Connectivity("connection refused".into()));
        }
        Ok(state.height)
    }

    async fn install_log_filter(
        &self,
        _contract: Address,
        _event_signature: B256,
    ) -> Result<FilterId, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.next_filter += 1;
        let id = U256::from(state.next_filter);
        state.installed.push(id);
        Ok(id)
    }

    async fn poll_new_logs(&self, filter: FilterId) -> Result<Vec<LogChange>, ChainError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.lose_filter) {
            return Err(ChainError::FilterLost(format!("filter {} not found", filter)));
        }
        Ok(state.polls.pop_front().unwrap_or_default())
    }

    async fn uninstall_log_filter(&self, filter: FilterId) -> Result<(), ChainError> {
        self.state.lock().unwrap().uninstalled.push(filter);
        Ok(())
    }
}

/// What `receipt` reports for submitted transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptBehavior {
    Success,
    Revert,
    Missing,
}

struct DestinationState {
    nonce: u64,
    gas_price: u128,
    receipt: ReceiptBehavior,
    nonce_queries: usize,
    fail_nonce: bool,
    fail_submit: bool,
    signed_requests: Vec<TransactionRequest>,
    signed: Vec<SignedTx>,
    submitted: Vec<SignedTx>,
}

/// Destination chain that records what it is asked to sign and send.
/// A successful submit advances the account nonce.
pub struct MockDestination {
    address: Address,
    chain_id: u64,
    state: Mutex<DestinationState>,
}

impl Default for MockDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDestination {
    pub fn new() -> Self {
        Self {
            address: Address::repeat_byte(0x77),
            chain_id: 137,
            state: Mutex::new(DestinationState {
                nonce: 0,
                gas_price: 1_000_000_000,
                receipt: ReceiptBehavior::Success,
                nonce_queries: 0,
                fail_nonce: false,
                fail_submit: false,
                signed_requests: Vec::new(),
                signed: Vec::new(),
                submitted: Vec::new(),
            }),
        }
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.state.lock().unwrap().nonce = nonce;
    }

    pub fn set_gas_price(&self, gas_price: u128) {
        self.state.lock().unwrap().gas_price = gas_price;
    }

    pub fn set_receipt_behavior(&self, behavior: ReceiptBehavior) {
        self.state.lock().unwrap().receipt = behavior;
    }

    pub fn fail_next_nonce(&self) {
        self.state.lock().unwrap().fail_nonce = true;
    }

    pub fn fail_next_submit(&self) {
        self.state.lock().unwrap().fail_submit = true;
    }

    pub fn nonce_queries(&self) -> usize {
        self.state.lock().unwrap().nonce_queries
    }

    pub fn signed_requests(&self) -> Vec<TransactionRequest> {
        self.state.lock().unwrap().signed_requests.clone()
    }

    pub fn signed(&self) -> Vec<SignedTx> {
        self.state.lock().unwrap().signed.clone()
    }

    pub fn submitted(&self) -> Vec<SignedTx> {
        self.state.lock().unwrap().submitted.clone()
    }

    /// Source tx hashes carried by every signed mint, in order
    pub fn minted_sources(&self) -> Vec<TxHash> {
        use crate::contracts::BridgedToken;
        use alloy::sol_types::SolCall;

        self.signed_requests()
            .iter()
            .filter_map(|tx| tx.input.input().cloned())
            .filter_map(|input| BridgedToken::mintBridgedTokensCall::abi_decode(&input, true).ok())
            .map(|call| call.sourceTxHash)
            .collect()
    }
}

#[async_trait]
impl DestinationChain for MockDestination {
    fn relayer_address(&self) -> Address {
        self.address
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn nonce_of(&self, _address: Address) -> Result<u64, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.nonce_queries += 1;
        if std::mem::take(&mut state.fail_nonce) {
            return Err(ChainError::Connectivity("request timed out".into()));
        }
        Ok(state.nonce)
    }

    async fn suggested_gas_price(&self) -> Result<u128, ChainError> {
        Ok(self.state.lock().unwrap().gas_price)
    }

    async fn sign(&self, tx: TransactionRequest) -> Result<SignedTx, ChainError> {
        let mut state = self.state.lock().unwrap();
        let seq = U256::from(state.signed.len() as u64 + 1);
        let signed = SignedTx {
            hash: B256::from(seq.to_be_bytes::<32>()),
            raw: Bytes::from(seq.to_be_bytes_vec()),
        };
        state.signed_requests.push(tx);
        state.signed.push(signed.clone());
        Ok(signed)
    }

    async fn submit(&self, tx: &SignedTx) -> Result<TxHash, ChainError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_submit) {
            return Err(ChainError::Rpc("replacement transaction underpriced".into()));
        }
        state.nonce += 1;
        state.submitted.push(tx.clone());
        Ok(tx.hash)
    }

    async fn receipt(
        &self,
        tx_hash: TxHash,
        _timeout: Duration,
    ) -> Result<Option<MintReceipt>, ChainError> {
        let behavior = self.state.lock().unwrap().receipt;
        Ok(match behavior {
            ReceiptBehavior::Missing => None,
            ReceiptBehavior::Success | ReceiptBehavior::Revert => Some(MintReceipt {
                tx_hash,
                block_number: Some(1),
                success: behavior == ReceiptBehavior::Success,
            }),
        })
    }
}
