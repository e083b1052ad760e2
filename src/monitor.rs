// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Deposit Monitor
//!
//! Background task that periodically scans `pending` swaps and admits
//! those whose user deposit has landed. Verification is read-only and
//! idempotent; a swap may be evaluated any number of times with no side
//! effect until both conditions hold:
//!
//! 1. the user-supplied source transaction signature is confirmed;
//! 2. the intermediate wallet holds at least `amount + FEE_RESERVE`.
//!
//! Admission flips `pending -> processing` atomically and hands the swap
//! to the coordinator as its own task. Per-tick admissions are capped to
//! bound concurrent swaps; the surplus stays `pending` and catches up on
//! later ticks.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::Signature;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chain::ChainRpc;
use crate::config::constants::FEE_RESERVE_LAMPORTS;
use crate::coordinator::MixingCoordinator;
use crate::registry::{Registry, RegistryError, SwapStatus};
use crate::vault::WalletVault;

/// Default interval between polling sweeps.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default per-tick admission cap (K).
const DEFAULT_ADMISSION_CAP: usize = 10;

/// Background deposit monitor.
pub struct DepositMonitor {
    registry: Arc<Registry>,
    vault: Arc<WalletVault>,
    rpc: Arc<dyn ChainRpc>,
    coordinator: Arc<MixingCoordinator>,
    poll_interval: Duration,
    admission_cap: usize,
}

impl DepositMonitor {
    pub fn new(
        registry: Arc<Registry>,
        vault: Arc<WalletVault>,
        rpc: Arc<dyn ChainRpc>,
        coordinator: Arc<MixingCoordinator>,
    ) -> Self {
        Self {
            registry,
            vault,
            rpc,
            coordinator,
            poll_interval: DEFAULT_POLL_INTERVAL,
            admission_cap: DEFAULT_ADMISSION_CAP,
        }
    }

    /// Run the monitor loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(monitor.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            cap = self.admission_cap,
            "deposit monitor starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("deposit monitor shutting down");
                return;
            }

            // Admitted swaps run as detached tasks; they own their
            // lifecycle from here.
            let _ = self.poll_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("deposit monitor shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one polling sweep, returning the handles of the swap
    /// tasks admitted this tick.
    pub async fn poll_step(&self) -> Vec<JoinHandle<()>> {
        let pending = match self
            .registry
            .list_by_status(SwapStatus::Pending, self.admission_cap)
        {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "monitor: failed to list pending swaps");
                return Vec::new();
            }
        };

        let mut handles = Vec::new();
        for swap in pending {
            match self.deposit_landed(&swap.transaction_id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    debug!(
                        transaction_id = %swap.transaction_id,
                        error = %e,
                        "monitor: verification error, will retry"
                    );
                    continue;
                }
            }

            // Atomic admission; losing to a concurrent recovery is fine.
            match self.registry.transition_status(
                &swap.transaction_id,
                SwapStatus::Pending,
                SwapStatus::Processing,
            ) {
                Ok(_) => {}
                Err(RegistryError::StatusConflict { .. }) => continue,
                Err(e) => {
                    warn!(
                        transaction_id = %swap.transaction_id,
                        error = %e,
                        "monitor: admission failed"
                    );
                    continue;
                }
            }

            info!(transaction_id = %swap.transaction_id, "monitor: deposit confirmed, admitting");
            let coordinator = self.coordinator.clone();
            let transaction_id = swap.transaction_id.clone();
            handles.push(tokio::spawn(async move {
                coordinator.run(&transaction_id).await;
            }));
        }
        handles
    }

    /// Check both admission conditions for one swap. Read-only.
    async fn deposit_landed(&self, transaction_id: &str) -> Result<bool, String> {
        let swap = self
            .registry
            .get_swap(transaction_id)
            .map_err(|e| e.to_string())?;

        let signature =
            Signature::from_str(&swap.source_sig).map_err(|e| format!("bad signature: {e}"))?;
        if !self
            .rpc
            .is_confirmed(&signature)
            .await
            .map_err(|e| e.to_string())?
        {
            return Ok(false);
        }

        let intermediate = self
            .vault
            .pubkey_of(&swap.intermediate_wallet_id)
            .map_err(|e| e.to_string())?;
        let balance = self
            .rpc
            .balance(&intermediate)
            .await
            .map_err(|e| e.to_string())?;

        Ok(balance >= swap.amount + FEE_RESERVE_LAMPORTS)
    }
}
