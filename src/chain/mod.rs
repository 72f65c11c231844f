//! Chain handle capability contracts
//!
//! The relay core only talks to ledgers through these two traits. The EVM
//! implementations live in [`evm`]; tests substitute in-memory handles.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use crate::error::ChainError;
use crate::types::{FilterId, LogChange, TxHash};

pub mod evm;

pub use evm::{EvmDestinationChain, EvmSourceChain};

/// A signed, encoded destination transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    /// Hash of the signed envelope, known before broadcast
    pub hash: TxHash,
    /// EIP-2718 encoded bytes, ready for `eth_sendRawTransaction`
    pub raw: Bytes,
}

/// Minimal view of a destination transaction receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
}

/// Read side of a ledger: height and log polling
#[async_trait]
pub trait SourceChain: Send + Sync {
    /// Current head block number
    async fn current_height(&self) -> Result<u64, ChainError>;

    /// Install a log filter for `event_signature` on `contract`, anchored at the head
    async fn install_log_filter(
        &self,
        contract: Address,
        event_signature: B256,
    ) -> Result<FilterId, ChainError>;

    /// Changes since the last poll of `filter`; each log is delivered once.
    ///
    /// Returns `ChainError::FilterLost` when the node no longer knows the filter.
    async fn poll_new_logs(&self, filter: FilterId) -> Result<Vec<LogChange>, ChainError>;

    /// Best-effort removal of a filter that is no longer used
    async fn uninstall_log_filter(&self, filter: FilterId) -> Result<(), ChainError>;
}

/// Write side of a ledger: nonce, pricing, signing, submission, receipts
#[async_trait]
pub trait DestinationChain: Send + Sync {
    /// Address of the relayer account held by this handle
    fn relayer_address(&self) -> Address;

    /// Chain ID used for replay-protected signing
    fn chain_id(&self) -> u64;

    /// Confirmed transaction count of `address` at the latest block
    async fn nonce_of(&self, address: Address) -> Result<u64, ChainError>;

    /// Node-suggested gas price in wei
    async fn suggested_gas_price(&self) -> Result<u128, ChainError>;

    /// Sign `tx` with the relayer key
    async fn sign(&self, tx: TransactionRequest) -> Result<SignedTx, ChainError>;

    /// Broadcast a signed transaction, returning its hash
    async fn submit(&self, tx: &SignedTx) -> Result<TxHash, ChainError>;

    /// Wait up to `timeout` for a receipt; `None` means no receipt in time
    async fn receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<Option<MintReceipt>, ChainError>;
}

#[async_trait]
impl<T: SourceChain + ?Sized> SourceChain for Arc<T> {
    async fn current_height(&self) -> Result<u64, ChainError> {
        (**self).current_height().await
    }

    async fn install_log_filter(
        &self,
        contract: Address,
        event_signature: B256,
    ) -> Result<FilterId, ChainError> {
        (**self).install_log_filter(contract, event_signature).await
    }

    async fn poll_new_logs(&self, filter: FilterId) -> Result<Vec<LogChange>, ChainError> {
        (**self).poll_new_logs(filter).await
    }

    async fn uninstall_log_filter(&self, filter: FilterId) -> Result<(), ChainError> {
        (**self).uninstall_log_filter(filter).await
    }
}

#[async_trait]
impl<T: DestinationChain + ?Sized> DestinationChain for Arc<T> {
    fn relayer_address(&self) -> Address {
        (**self).relayer_address()
    }

    fn chain_id(&self) -> u64 {
        (**self).chain_id()
    }

    async fn nonce_of(&self, address: Address) -> Result<u64, ChainError> {
        (**self).nonce_of(address).await
    }

    async fn suggested_gas_price(&self) -> Result<u128, ChainError> {
        (**self).suggested_gas_price().await
    }

    async fn sign(&self, tx: TransactionRequest) -> Result<SignedTx, ChainError> {
        (**self).sign(tx).await
    }

    async fn submit(&self, tx: &SignedTx) -> Result<TxHash, ChainError> {
        (**self).submit(tx).await
    }

    async fn receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<Option<MintReceipt>, ChainError> {
        (**self).receipt(tx_hash, timeout).await
    }
}
