use std::sync::Arc;
use std::time::Instant;

use eyre::WrapErr;
use mint_relayer::api::{self, ApiInfo};
use mint_relayer::broadcaster::{BroadcastSettings, Broadcaster};
use mint_relayer::chain::{DestinationChain, EvmDestinationChain, EvmSourceChain};
use mint_relayer::config::Config;
use mint_relayer::gas::GasOracle;
use mint_relayer::gate::ConfirmationGate;
use mint_relayer::relay_loop::{RelayLoop, RelaySettings};
use mint_relayer::store::ReplayStore;

fn main() -> eyre::Result<()> {
    // Install color-eyre for better error reporting
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    tracing::info!("Starting Bridge Mint Relayer");

    let config = Config::load()?;
    tracing::info!(
        source_rpc = %config.source.rpc_url,
        destination_rpc = %config.destination.rpc_url,
        destination_chain_id = config.destination.chain_id,
        mode = config.submission_mode().as_str(),
        state_file = %config.state_file.display(),
        "Configuration loaded"
    );

    // A corrupt or foreign replay store must stop startup before any chain work
    let store = ReplayStore::open(&config.state_file, config.store_partition())
        .wrap_err("Failed to open replay store")?;
    tracing::info!(entries = store.len(), "Replay store loaded");

    let retry = config.connect_retry();
    let source = EvmSourceChain::connect(&config.source.rpc_url, &retry)
        .await
        .wrap_err("Failed to connect to source chain")?;
    let destination = EvmDestinationChain::connect(
        &config.destination.rpc_url,
        &config.destination.private_key,
        &retry,
    )
    .await
    .wrap_err("Failed to connect to destination chain")?;
    tracing::info!(
        source_chain_id = source.chain_id(),
        destination_chain_id = destination.chain_id(),
        "Connected to both chains"
    );

    if destination.chain_id() != config.destination.chain_id {
        tracing::warn!(
            configured = config.destination.chain_id,
            node = destination.chain_id(),
            "Destination node chain id differs from DEST_CHAIN_ID"
        );
    }

    let gas_oracle = match &config.gas_oracle {
        Some(oracle) => Some(GasOracle::new(&oracle.url, &oracle.field, oracle.unit)?),
        None => None,
    };

    let mut broadcast_settings =
        BroadcastSettings::new(config.mint_contract_address()?, config.submission_mode());
    broadcast_settings.gas_limit = config.relay.mint_gas_limit;
    broadcast_settings.receipt_timeout = config.receipt_timeout();
    let broadcaster = Broadcaster::new(destination, broadcast_settings, gas_oracle);

    let relay = RelayLoop::new(
        source,
        broadcaster,
        store,
        ConfirmationGate::new(config.relay.confirmation_blocks),
        RelaySettings::new(
            config.source_bridge_address()?,
            config.destination.chain_id,
            config.poll_interval(),
        ),
    );

    if let Some(addr) = config.api_addr {
        let info = Arc::new(ApiInfo {
            started_at: Instant::now(),
            mode: config.submission_mode(),
            destination_chain_id: config.destination.chain_id,
        });
        tokio::spawn(async move {
            if let Err(e) = api::start_api_server(addr, info).await {
                tracing::error!(error = %e, "API server error");
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    let handle = tokio::spawn(relay.run(shutdown_rx));
    match handle.await.wrap_err("Relay task panicked")? {
        Ok(()) => {
            tracing::info!("Bridge Mint Relayer stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Relay loop failed");
            Err(e).wrap_err("Relay loop stopped on a fatal error")
        }
    }
}

/// Initialize tracing/logging with structured output
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mint_relayer=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
