//! Broadcaster - builds, signs and submits `mintBridgedTokens` transactions
//!
//! One call handles one relay instruction from nonce lookup to a terminal
//! outcome. The broadcaster never retries on its own: a reverted mint is
//! reported as `Failed`, and a missing receipt as `BroadcastError::Timeout`,
//! leaving the decision to the caller.

use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use tracing::{debug, error, info, warn};

use crate::chain::DestinationChain;
use crate::contracts::BridgedToken;
use crate::error::BroadcastError;
use crate::gas::GasOracle;
use crate::types::{BroadcastOutcome, BroadcastStatus, RelayInstruction, SubmissionMode};

/// Conservative fixed gas limit for the mint call
pub const DEFAULT_GAS_LIMIT: u64 = 200_000;

/// How long to wait for a receipt in live mode
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Static broadcaster parameters
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Destination contract exposing `mintBridgedTokens`
    pub mint_contract: Address,
    pub gas_limit: u64,
    pub receipt_timeout: Duration,
    pub mode: SubmissionMode,
}

impl BroadcastSettings {
    pub fn new(mint_contract: Address, mode: SubmissionMode) -> Self {
        Self {
            mint_contract,
            gas_limit: DEFAULT_GAS_LIMIT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            mode,
        }
    }
}

/// Turns relay instructions into destination mint transactions
pub struct Broadcaster<D> {
    destination: D,
    settings: BroadcastSettings,
    gas_oracle: Option<GasOracle>,
}

impl<D: DestinationChain> Broadcaster<D> {
    pub fn new(destination: D, settings: BroadcastSettings, gas_oracle: Option<GasOracle>) -> Self {
        info!(
            relayer_address = %destination.relayer_address(),
            mint_contract = %settings.mint_contract,
            mode = settings.mode.as_str(),
            gas_limit = settings.gas_limit,
            gas_oracle = gas_oracle.as_ref().map(|o| o.url()).unwrap_or("none"),
            "Broadcaster initialized"
        );

        Self {
            destination,
            settings,
            gas_oracle,
        }
    }

    pub fn mode(&self) -> SubmissionMode {
        self.settings.mode
    }

    /// Mint on the destination chain for `instruction`
    pub async fn submit(
        &self,
        instruction: &RelayInstruction,
    ) -> Result<BroadcastOutcome, BroadcastError> {
        let from = self.destination.relayer_address();

        // Always the confirmed count from the chain, never a local counter
        let nonce = self
            .destination
            .nonce_of(from)
            .await
            .map_err(BroadcastError::Prepare)?;

        let gas_price = self.resolve_gas_price().await?;

        let call = BridgedToken::mintBridgedTokensCall {
            recipient: instruction.recipient,
            amount: instruction.amount,
            sourceTxHash: instruction.source_tx_hash,
        };

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(self.settings.mint_contract)
            .with_nonce(nonce)
            .with_gas_limit(self.settings.gas_limit)
            .with_gas_price(gas_price)
            .with_chain_id(self.destination.chain_id())
            .with_input(call.abi_encode());

        debug!(
            source_tx_hash = %instruction.source_tx_hash,
            recipient = %instruction.recipient,
            amount = %instruction.amount,
            nonce,
            gas_price,
            "Signing mintBridgedTokens"
        );

        let signed = self
            .destination
            .sign(tx)
            .await
            .map_err(BroadcastError::Prepare)?;

        if self.settings.mode == SubmissionMode::Simulate {
            warn!(
                source_tx_hash = %instruction.source_tx_hash,
                tx_hash = %signed.hash,
                "[SIMULATION MODE] Would broadcast mint transaction"
            );
            return Ok(BroadcastOutcome {
                destination_tx_hash: signed.hash,
                status: BroadcastStatus::Submitted,
            });
        }

        let tx_hash = self
            .destination
            .submit(&signed)
            .await
            .map_err(BroadcastError::Submit)?;
        info!(
            source_tx_hash = %instruction.source_tx_hash,
            tx_hash = %tx_hash,
            "Mint transaction sent, waiting for receipt"
        );

        let receipt = self
            .destination
            .receipt(tx_hash, self.settings.receipt_timeout)
            .await
            .map_err(BroadcastError::Submit)?;

        match receipt {
            Some(receipt) if receipt.success => {
                info!(
                    source_tx_hash = %instruction.source_tx_hash,
                    tx_hash = %tx_hash,
                    block_number = ?receipt.block_number,
                    "Mint transaction confirmed"
                );
                Ok(BroadcastOutcome {
                    destination_tx_hash: tx_hash,
                    status: BroadcastStatus::Confirmed,
                })
            }
            Some(receipt) => {
                error!(
                    source_tx_hash = %instruction.source_tx_hash,
                    tx_hash = %tx_hash,
                    block_number = ?receipt.block_number,
                    "Mint transaction reverted"
                );
                Ok(BroadcastOutcome {
                    destination_tx_hash: tx_hash,
                    status: BroadcastStatus::Failed,
                })
            }
            None => Err(BroadcastError::Timeout {
                tx_hash,
                timeout: self.settings.receipt_timeout,
            }),
        }
    }

    /// Oracle price when available, otherwise the destination node's suggestion
    async fn resolve_gas_price(&self) -> Result<u128, BroadcastError> {
        if let Some(oracle) = &self.gas_oracle {
            match oracle.fetch_gas_price().await {
                Ok(price) => {
                    debug!(gas_price = price, "Using gas oracle price");
                    return Ok(price);
                }
                Err(e) => {
                    warn!(
                        oracle = oracle.url(),
                        error = %e,
                        "Gas oracle unavailable, falling back to node gas price"
                    );
                }
            }
        }

        self.destination
            .suggested_gas_price()
            .await
            .map_err(BroadcastError::Prepare)
    }
}
