//! EVM chain handles backed by alloy HTTP providers

use std::future::IntoFuture;
use std::time::Duration;

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::BlockNumberOrTag;
use alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{DestinationChain, MintReceipt, SignedTx, SourceChain};
use crate::contracts::SourceBridge;
use crate::error::ChainError;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::types::{FilterId, LogChange, SourceEvent, TxHash};

/// Upper bound on any single RPC round trip
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between receipt lookups while waiting for inclusion
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

type HttpProvider = RootProvider<Http<Client>>;

/// Await an RPC call with [`RPC_TIMEOUT`], mapping failures into [`ChainError`]
async fn timed<F, T, E>(call: F) -> Result<T, ChainError>
where
    F: IntoFuture<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(RPC_TIMEOUT, call.into_future()).await {
        Ok(result) => result.map_err(ChainError::from_rpc),
        Err(_) => Err(ChainError::Connectivity(format!(
            "request timed out after {:?}",
            RPC_TIMEOUT
        ))),
    }
}

/// Build a provider and block until the node answers `eth_chainId`
async fn connect_provider(
    chain_name: &str,
    rpc_url: &str,
    retry: &RetryConfig,
) -> Result<(HttpProvider, u64), ChainError> {
    let url: Url = rpc_url
        .parse()
        .map_err(|e| ChainError::Connectivity(format!("invalid RPC URL {}: {}", rpc_url, e)))?;
    let provider = ProviderBuilder::new().on_http(url);

    let chain_id = retry_with_backoff(chain_name, retry, || timed(provider.get_chain_id()))
        .await
        .map_err(|e| {
            error!(
                chain = chain_name,
                attempts = retry.max_attempts,
                error = %e,
                "Could not connect to chain"
            );
            ChainError::Connectivity(format!("failed to connect to {}: {}", chain_name, e))
        })?;

    info!(chain = chain_name, chain_id, "Connected to chain");
    Ok((provider, chain_id))
}

/// Source chain handle polling `TokensDeposited` logs through `eth_newFilter`
pub struct EvmSourceChain {
    provider: HttpProvider,
    chain_id: u64,
}

impl EvmSourceChain {
    pub async fn connect(rpc_url: &str, retry: &RetryConfig) -> Result<Self, ChainError> {
        let (provider, chain_id) = connect_provider("source", rpc_url, retry).await?;
        Ok(Self { provider, chain_id })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

/// Decode a raw filter log into a [`LogChange`]
fn decode_log(log: &Log) -> Result<LogChange, ChainError> {
    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| ChainError::Decode("missing transaction hash".to_string()))?;

    if log.removed {
        return Ok(LogChange::Removed(tx_hash));
    }

    let block_number = log
        .block_number
        .ok_or_else(|| ChainError::Decode("missing block number".to_string()))?;

    let decoded = log
        .log_decode::<SourceBridge::TokensDeposited>()
        .map_err(|e| ChainError::Decode(e.to_string()))?;
    let event = decoded.inner.data;

    Ok(LogChange::Deposit(SourceEvent {
        tx_hash,
        block_number,
        log_index: log.log_index,
        sender: event.sender,
        recipient: event.recipient,
        amount: event.amount,
        destination_chain_id: event.destinationChainId,
        nonce: event.nonce,
    }))
}

#[async_trait]
impl SourceChain for EvmSourceChain {
    async fn current_height(&self) -> Result<u64, ChainError> {
        timed(self.provider.get_block_number()).await
    }

    async fn install_log_filter(
        &self,
        contract: Address,
        event_signature: B256,
    ) -> Result<FilterId, ChainError> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(event_signature)
            .from_block(BlockNumberOrTag::Latest);

        let id = timed(self.provider.new_filter(&filter)).await?;
        debug!(filter_id = %id, contract = %contract, "Installed log filter");
        Ok(id)
    }

    async fn poll_new_logs(&self, filter: FilterId) -> Result<Vec<LogChange>, ChainError> {
        let logs: Vec<Log> = timed(self.provider.get_filter_changes::<Log>(filter)).await?;

        let changes = logs
            .iter()
            .filter_map(|log| match decode_log(log) {
                Ok(change) => Some(change),
                Err(e) => {
                    error!(
                        tx_hash = ?log.transaction_hash,
                        log_index = ?log.log_index,
                        error = %e,
                        "Failed to parse deposit log"
                    );
                    None
                }
            })
            .collect();

        Ok(changes)
    }

    async fn uninstall_log_filter(&self, filter: FilterId) -> Result<(), ChainError> {
        timed(self.provider.uninstall_filter(filter)).await.map(|_| ())
    }
}

/// Destination chain handle holding the relayer's signing key
pub struct EvmDestinationChain {
    provider: HttpProvider,
    wallet: EthereumWallet,
    address: Address,
    chain_id: u64,
}

impl EvmDestinationChain {
    pub async fn connect(
        rpc_url: &str,
        private_key: &str,
        retry: &RetryConfig,
    ) -> Result<Self, ChainError> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| ChainError::Signing(format!("invalid private key: {}", e)))?;
        let address = signer.address();

        let (provider, chain_id) = connect_provider("destination", rpc_url, retry).await?;

        info!(
            relayer_address = %address,
            chain_id,
            "Destination signer initialized"
        );

        Ok(Self {
            provider,
            wallet: EthereumWallet::from(signer),
            address,
            chain_id,
        })
    }
}

#[async_trait]
impl DestinationChain for EvmDestinationChain {
    fn relayer_address(&self) -> Address {
        self.address
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn nonce_of(&self, address: Address) -> Result<u64, ChainError> {
        timed(self.provider.get_transaction_count(address).latest()).await
    }

    async fn suggested_gas_price(&self) -> Result<u128, ChainError> {
        timed(self.provider.get_gas_price()).await
    }

    async fn sign(&self, tx: TransactionRequest) -> Result<SignedTx, ChainError> {
        let envelope: TxEnvelope =
            <TransactionRequest as TransactionBuilder<Ethereum>>::build(tx, &self.wallet)
                .await
                .map_err(|e| ChainError::Signing(e.to_string()))?;

        Ok(SignedTx {
            hash: *envelope.tx_hash(),
            raw: Bytes::from(envelope.encoded_2718()),
        })
    }

    async fn submit(&self, tx: &SignedTx) -> Result<TxHash, ChainError> {
        let pending = timed(self.provider.send_raw_transaction(&tx.raw)).await?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<Option<MintReceipt>, ChainError> {
        let deadline = Instant::now() + timeout;

        loop {
            match timed(self.provider.get_transaction_receipt(tx_hash)).await {
                Ok(Some(receipt)) => {
                    return Ok(Some(MintReceipt {
                        tx_hash,
                        block_number: receipt.block_number,
                        success: receipt.status(),
                    }));
                }
                Ok(None) => {}
                // The transaction is already out; keep waiting rather than abandon it
                Err(e) => {
                    warn!(tx_hash = %tx_hash, error = %e, "Receipt lookup failed, still waiting");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Log as PrimitiveLog, LogData, U256};
    use alloy::sol_types::SolEvent;

    fn deposit_log(removed: bool) -> Log {
        let event = SourceBridge::TokensDeposited {
            sender: Address::repeat_byte(0x01),
            recipient: Address::repeat_byte(0x02),
            amount: U256::from(50u64),
            destinationChainId: U256::from(137u64),
            nonce: U256::from(7u64),
        };
        let data: LogData = event.encode_log_data();

        Log {
            inner: PrimitiveLog {
                address: Address::repeat_byte(0xbb),
                data,
            },
            block_hash: Some(B256::repeat_byte(0x0b)),
            block_number: Some(100),
            block_timestamp: None,
            transaction_hash: Some(B256::repeat_byte(0xaa)),
            transaction_index: Some(0),
            log_index: Some(3),
            removed,
        }
    }

    #[test]
    fn test_decode_deposit_log() {
        let change = decode_log(&deposit_log(false)).unwrap();
        let LogChange::Deposit(event) = change else {
            panic!("expected deposit, got {:?}", change);
        };
        assert_eq!(event.tx_hash, B256::repeat_byte(0xaa));
        assert_eq!(event.block_number, 100);
        assert_eq!(event.log_index, Some(3));
        assert_eq!(event.sender, Address::repeat_byte(0x01));
        assert_eq!(event.recipient, Address::repeat_byte(0x02));
        assert_eq!(event.amount, U256::from(50u64));
        assert_eq!(event.destination_chain_id, U256::from(137u64));
        assert_eq!(event.nonce, U256::from(7u64));
    }

    #[test]
    fn test_decode_removed_log() {
        let change = decode_log(&deposit_log(true)).unwrap();
        assert_eq!(change, LogChange::Removed(B256::repeat_byte(0xaa)));
    }

    #[test]
    fn test_decode_rejects_missing_tx_hash() {
        let mut log = deposit_log(false);
        log.transaction_hash = None;
        assert!(matches!(decode_log(&log), Err(ChainError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_foreign_event() {
        let mut log = deposit_log(false);
        log.inner.data = LogData::new_unchecked(vec![B256::repeat_byte(0x99)], Bytes::new());
        assert!(matches!(decode_log(&log), Err(ChainError::Decode(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_key() {
        let retry = RetryConfig::new(1, Duration::from_millis(1));
        let result = EvmDestinationChain::connect("http://127.0.0.1:1", "not-a-key", &retry).await;
        assert!(matches!(result, Err(ChainError::Signing(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let retry = RetryConfig::new(1, Duration::from_millis(1));
        let result = EvmSourceChain::connect("not a url", &retry).await;
        assert!(matches!(result, Err(ChainError::Connectivity(_))));
    }
}
