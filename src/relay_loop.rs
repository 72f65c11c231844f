//! Relay loop - the single task that moves deposits from source to destination
//!
//! Each cycle polls the source log filter, merges new changes into the
//! deferred buffer, and drains every buffered event that has reached the
//! confirmation depth: validate, replay check, broadcast, record. Events that
//! are not final yet, or whose broadcast could not even be prepared, stay in
//! the buffer for a later cycle.
//!
//! The filter cursor is consumed on read, so the buffer is the only place a
//! polled but unhandled event lives. It survives filter re-acquisition and
//! error backoff; it does not survive a restart.

use std::time::Duration;

use alloy::primitives::Address;
use alloy::sol_types::SolEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

use crate::broadcaster::Broadcaster;
use crate::chain::{DestinationChain, SourceChain};
use crate::contracts::SourceBridge;
use crate::error::{BroadcastError, ChainError, RelayError};
use crate::gate::ConfirmationGate;
use crate::metrics;
use crate::store::ReplayStore;
use crate::types::{FilterId, LogChange, SourceEvent};
use crate::validator::validate;

/// Default wait between cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Polling,
    Draining,
    Sleeping,
    ErrorBackoff,
    Stopped,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Idle => "idle",
            LoopState::Polling => "polling",
            LoopState::Draining => "draining",
            LoopState::Sleeping => "sleeping",
            LoopState::ErrorBackoff => "error_backoff",
            LoopState::Stopped => "stopped",
        }
    }
}

/// Loop timing and routing parameters
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Source contract emitting `TokensDeposited`
    pub bridge_address: Address,
    /// Deposits targeting any other chain are rejected
    pub destination_chain_id: u64,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
}

impl RelaySettings {
    /// Backoff after a failed cycle is twice the poll interval
    pub fn new(bridge_address: Address, destination_chain_id: u64, poll_interval: Duration) -> Self {
        Self {
            bridge_address,
            destination_chain_id,
            poll_interval,
            error_backoff: poll_interval * 2,
        }
    }
}

/// Counters for one completed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub height: u64,
    pub observed: usize,
    pub deferred: usize,
    pub relayed: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub failed: usize,
}

pub struct RelayLoop<S, D> {
    source: S,
    broadcaster: Broadcaster<D>,
    store: ReplayStore,
    gate: ConfirmationGate,
    settings: RelaySettings,
    filter: Option<FilterId>,
    last_height: Option<u64>,
    deferred: Vec<SourceEvent>,
    state: LoopState,
}

impl<S: SourceChain, D: DestinationChain> RelayLoop<S, D> {
    pub fn new(
        source: S,
        broadcaster: Broadcaster<D>,
        store: ReplayStore,
        gate: ConfirmationGate,
        settings: RelaySettings,
    ) -> Self {
        metrics::set_replay_store_size(store.len());
        Self {
            source,
            broadcaster,
            store,
            gate,
            settings,
            filter: None,
            last_height: None,
            deferred: Vec::new(),
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Events polled but not yet acted on, in chain order
    pub fn deferred(&self) -> &[SourceEvent] {
        &self.deferred
    }

    pub fn store(&self) -> &ReplayStore {
        &self.store
    }

    pub fn filter(&self) -> Option<FilterId> {
        self.filter
    }

    /// Run until a stop request arrives or a fatal error occurs.
    ///
    /// The stop request is checked between cycles and interrupts the sleep
    /// and backoff waits; an in-flight broadcast always completes first.
    /// Dropping the sender counts as a stop request.
    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) -> Result<(), RelayError> {
        info!(
            bridge = %self.settings.bridge_address,
            destination_chain_id = self.settings.destination_chain_id,
            confirmation_depth = self.gate.depth(),
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            mode = self.broadcaster.mode().as_str(),
            replay_entries = self.store.len(),
            "Relay loop starting"
        );
        metrics::UP.set(1.0);

        let result = loop {
            match shutdown.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    info!("Relay loop received shutdown signal");
                    break Ok(());
                }
                Err(TryRecvError::Empty) => {}
            }

            let wait = match self.run_cycle().await {
                Ok(report) => {
                    if report.relayed + report.rejected + report.failed > 0 {
                        info!(
                            height = report.height,
                            relayed = report.relayed,
                            skipped = report.skipped,
                            rejected = report.rejected,
                            failed = report.failed,
                            deferred = report.deferred,
                            "Relay cycle complete"
                        );
                    }
                    self.state = LoopState::Sleeping;
                    self.settings.poll_interval
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Relay loop stopping on fatal error");
                    metrics::record_error("store");
                    break Err(e);
                }
                Err(e) => {
                    let class = match &e {
                        RelayError::Chain(chain) => chain.class().as_str(),
                        RelayError::Store(_) => "store",
                    };
                    metrics::record_error(class);
                    warn!(
                        error = %e,
                        class,
                        deferred = self.deferred.len(),
                        backoff_ms = self.settings.error_backoff.as_millis() as u64,
                        "Relay cycle failed, backing off"
                    );
                    self.state = LoopState::ErrorBackoff;
                    self.settings.error_backoff
                }
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    info!(state = self.state.as_str(), "Relay loop received shutdown signal");
                    break Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }
        };

        self.state = LoopState::Stopped;
        metrics::UP.set(0.0);

        if let Some(filter) = self.filter.take() {
            if let Err(e) = self.source.uninstall_log_filter(filter).await {
                debug!(filter = %filter, error = %e, "Failed to uninstall log filter on shutdown");
            }
        }

        if !self.deferred.is_empty() {
            warn!(
                pending = self.deferred.len(),
                "Stopping with unconfirmed deposits in memory; they will not be replayed by this filter"
            );
        }
        info!("Relay loop stopped");

        result
    }

    /// One Polling + Draining pass
    pub async fn run_cycle(&mut self) -> Result<CycleReport, RelayError> {
        self.state = LoopState::Polling;

        let changes = self.poll_changes().await?;
        let observed = self.merge_changes(changes);

        let height = self.source.current_height().await?;
        self.last_height = Some(height);
        metrics::record_source_height(height);
        metrics::record_successful_poll();

        self.state = LoopState::Draining;
        let mut report = CycleReport {
            height,
            observed,
            ..CycleReport::default()
        };
        let result = self.drain(height, &mut report).await;

        report.deferred = self.deferred.len();
        metrics::set_deferred_events(self.deferred.len());
        metrics::set_replay_store_size(self.store.len());

        result.map(|()| report)
    }

    /// Read new log changes, installing or re-acquiring the filter as needed
    async fn poll_changes(&mut self) -> Result<Vec<LogChange>, RelayError> {
        let filter = match self.filter {
            Some(filter) => filter,
            None => self.install_filter().await?,
        };

        match self.source.poll_new_logs(filter).await {
            Ok(changes) => Ok(changes),
            Err(ChainError::FilterLost(reason)) => {
                self.reacquire_filter(filter, &reason).await?;
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn install_filter(&mut self) -> Result<FilterId, ChainError> {
        let filter = self
            .source
            .install_log_filter(
                self.settings.bridge_address,
                SourceBridge::TokensDeposited::SIGNATURE_HASH,
            )
            .await?;
        debug!(filter = %filter, bridge = %self.settings.bridge_address, "Installed deposit log filter");
        self.filter = Some(filter);
        Ok(filter)
    }

    /// Discard a lost cursor and install a fresh one at the head.
    ///
    /// Logs from the last seen height up to the new head are not replayed by
    /// the new filter.
    async fn reacquire_filter(&mut self, lost: FilterId, reason: &str) -> Result<(), ChainError> {
        // The lost filter is kept until the head is known, so a failed read
        // retries the whole re-acquisition and still logs the gap
        let head = self.source.current_height().await?;
        self.filter = None;
        metrics::record_filter_reacquired();
        warn!(
            filter = %lost,
            reason,
            last_seen_height = ?self.last_height,
            current_height = head,
            deferred = self.deferred.len(),
            "Source log filter lost; deposits in this range may need manual review"
        );

        if let Err(e) = self.source.uninstall_log_filter(lost).await {
            debug!(filter = %lost, error = %e, "Failed to uninstall lost filter");
        }

        self.install_filter().await?;
        self.last_height = Some(head);
        Ok(())
    }

    /// Fold polled changes into the deferred buffer, returning the deposit count.
    ///
    /// A repeated delivery of the same tx hash replaces the buffered event.
    fn merge_changes(&mut self, changes: Vec<LogChange>) -> usize {
        let mut deposits = 0;
        for change in changes {
            match change {
                LogChange::Deposit(event) => {
                    deposits += 1;
                    debug!(
                        source_tx_hash = %event.tx_hash,
                        block_number = event.block_number,
                        recipient = %event.recipient,
                        amount = %event.amount,
                        "Observed deposit"
                    );
                    match self.deferred.iter_mut().find(|e| e.tx_hash == event.tx_hash) {
                        Some(existing) => *existing = event,
                        None => self.deferred.push(event),
                    }
                }
                LogChange::Removed(tx_hash) => {
                    let before = self.deferred.len();
                    self.deferred.retain(|e| e.tx_hash != tx_hash);
                    if self.deferred.len() < before {
                        warn!(source_tx_hash = %tx_hash, "Deposit removed by reorg before confirmation");
                    }
                }
            }
        }
        self.deferred
            .sort_by_key(|e| (e.block_number, e.log_index.unwrap_or(0)));
        metrics::record_deposits_observed(deposits);
        deposits
    }

    /// Act on every buffered event that is final at `height`
    async fn drain(&mut self, height: u64, report: &mut CycleReport) -> Result<(), RelayError> {
        let candidates = std::mem::take(&mut self.deferred);
        let mut keep = Vec::new();
        let mut remaining = candidates.into_iter();

        while let Some(event) = remaining.next() {
            if !self.gate.is_final(&event, height) {
                debug!(
                    source_tx_hash = %event.tx_hash,
                    block_number = event.block_number,
                    blocks_remaining = self.gate.blocks_remaining(&event, height),
                    "Deposit not final yet"
                );
                keep.push(event);
                continue;
            }

            let instruction = match validate(&event, self.settings.destination_chain_id) {
                Ok(instruction) => instruction,
                Err(reason) => {
                    warn!(
                        source_tx_hash = %event.tx_hash,
                        reason = %reason,
                        "Rejected deposit"
                    );
                    metrics::record_rejected(reason.as_str());
                    report.rejected += 1;
                    continue;
                }
            };

            if self.store.contains(&event.tx_hash) {
                debug!(source_tx_hash = %event.tx_hash, "Deposit already relayed, skipping");
                metrics::record_replay_skip();
                report.skipped += 1;
                continue;
            }

            match self.broadcaster.submit(&instruction).await {
                Ok(outcome) => {
                    metrics::record_broadcast(outcome.status.as_str());
                    if outcome.is_committable(self.broadcaster.mode()) {
                        if let Err(e) = self.store.record(event.tx_hash) {
                            error!(
                                source_tx_hash = %event.tx_hash,
                                destination_tx_hash = %outcome.destination_tx_hash,
                                error = %e,
                                "Mint succeeded but could not be recorded; reconcile manually"
                            );
                            keep.extend(remaining);
                            self.deferred = keep;
                            return Err(e.into());
                        }
                        info!(
                            source_tx_hash = %event.tx_hash,
                            destination_tx_hash = %outcome.destination_tx_hash,
                            status = %outcome.status,
                            "Deposit relayed"
                        );
                        report.relayed += 1;
                    } else {
                        error!(
                            source_tx_hash = %event.tx_hash,
                            destination_tx_hash = %outcome.destination_tx_hash,
                            status = %outcome.status,
                            "Mint did not succeed; not recorded"
                        );
                        report.failed += 1;
                    }
                }
                Err(BroadcastError::Prepare(e)) => {
                    warn!(
                        source_tx_hash = %event.tx_hash,
                        error = %e,
                        "Could not prepare mint; keeping deposit for retry"
                    );
                    metrics::record_broadcast("prepare_error");
                    keep.push(event);
                    keep.extend(remaining);
                    self.deferred = keep;
                    return Err(e.into());
                }
                Err(e) => {
                    let label = match &e {
                        BroadcastError::Timeout { .. } => "timeout",
                        _ => "submit_error",
                    };
                    error!(
                        source_tx_hash = %event.tx_hash,
                        error = %e,
                        "Mint broadcast failed; not recorded"
                    );
                    metrics::record_broadcast(label);
                    report.failed += 1;
                }
            }
        }

        self.deferred = keep;
        Ok(())
    }
}
