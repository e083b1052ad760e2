// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Recovery Ledger
//!
//! Emergency direct-withdrawal bookkeeping. Each swap created with a
//! recovery key gets a record holding the SHA-256 of that key and a
//! snapshot of the global deposit counter. Recovery unlocks under two
//! independent rules, either sufficient:
//!
//! - **threshold**: enough later deposits have entered the system that
//!   withdrawing directly no longer isolates this swap in the anonymity
//!   set;
//! - **timeout**: the swap has sat `pending` past the inactivity window,
//!   a liveness fallback if the relayer stops processing.
//!
//! Availability is monotonic: once reported available it stays so until
//! consumed. Key verification is constant-time.

use std::sync::Arc;

use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::constants::{RECOVERY_THRESHOLD, RECOVERY_TIMEOUT_SECS};
use crate::registry::{RecoveryReason, Registry, RegistryError, SwapStatus};
use crate::vault::{VaultError, WalletVault};

/// Errors from recovery operations.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("invalid recovery key")]
    InvalidKey,

    #[error("recovery not available")]
    NotAvailable {
        reason: RecoveryReason,
        details: serde_json::Value,
    },

    #[error("funds have already left the intermediate wallet")]
    FundsMoved,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Availability evaluation result.
#[derive(Debug, Clone)]
pub struct Availability {
    pub available: bool,
    pub reason: RecoveryReason,
    pub details: serde_json::Value,
}

/// The recovery ledger.
pub struct RecoveryLedger {
    registry: Arc<Registry>,
    vault: Arc<WalletVault>,
    clock: Arc<dyn Clock>,
}

impl RecoveryLedger {
    pub fn new(registry: Arc<Registry>, vault: Arc<WalletVault>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            vault,
            clock,
        }
    }

    /// Mint a fresh recovery key and its hash.
    ///
    /// The key is returned to the client exactly once, at prepare time;
    /// only the hash is ever persisted.
    pub fn generate_key() -> (String, String) {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let key = bs58::encode(bytes).into_string();
        let hash = Self::hash_key(&key);
        (key, hash)
    }

    /// SHA-256 of a recovery key, hex-encoded.
    pub fn hash_key(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    /// Evaluate (and latch) availability for a swap.
    pub fn availability(&self, transaction_id: &str) -> Result<Availability, RecoveryError> {
        let record = self.registry.get_recovery(transaction_id)?;
        let swap = self.registry.get_swap(transaction_id)?;

        if record.recovery_available {
            return Ok(Availability {
                available: true,
                reason: record.available_reason,
                details: json!({ "latched": true }),
            });
        }

        let count_now = self.registry.deposit_count()?;
        let deposits_since = count_now.saturating_sub(record.deposit_count_at_creation);
        let age_secs = (self.clock.now() - swap.created_at).num_seconds();

        if deposits_since >= RECOVERY_THRESHOLD {
            self.registry
                .set_recovery_available(transaction_id, RecoveryReason::Threshold)?;
            return Ok(Availability {
                available: true,
                reason: RecoveryReason::Threshold,
                details: json!({
                    "depositsSince": deposits_since,
                    "threshold": RECOVERY_THRESHOLD,
                }),
            });
        }

        if swap.status == SwapStatus::Pending && age_secs >= RECOVERY_TIMEOUT_SECS {
            self.registry
                .set_recovery_available(transaction_id, RecoveryReason::Timeout)?;
            return Ok(Availability {
                available: true,
                reason: RecoveryReason::Timeout,
                details: json!({
                    "ageSecs": age_secs,
                    "timeoutSecs": RECOVERY_TIMEOUT_SECS,
                }),
            });
        }

        Ok(Availability {
            available: false,
            reason: RecoveryReason::None,
            details: json!({
                "depositsSince": deposits_since,
                "depositsNeeded": RECOVERY_THRESHOLD - deposits_since,
                "ageSecs": age_secs,
                "timeoutSecs": RECOVERY_TIMEOUT_SECS,
            }),
        })
    }

    /// Verify the supplied key and, if recovery is available, withdraw
    /// `amount - relayer_fee` directly to the given destination.
    ///
    /// The status flips `pending → recovered` before the transfer so the
    /// deposit monitor cannot admit the swap mid-recovery; losing that
    /// race surfaces as a `StatusConflict`.
    pub async fn consume(
        &self,
        transaction_id: &str,
        supplied_key: &str,
        destination: &Pubkey,
    ) -> Result<Signature, RecoveryError> {
        let record = self.registry.get_recovery(transaction_id)?;

        let supplied_hash = Sha256::digest(supplied_key.as_bytes());
        let stored_hash = hex::decode(&record.recovery_key_hash)
            .map_err(|_| RecoveryError::InvalidKey)?;
        if supplied_hash.ct_eq(stored_hash.as_slice()).unwrap_u8() != 1 {
            warn!(transaction_id, "recovery key mismatch");
            return Err(RecoveryError::InvalidKey);
        }

        let availability = self.availability(transaction_id)?;
        if !availability.available {
            return Err(RecoveryError::NotAvailable {
                reason: availability.reason,
                details: availability.details,
            });
        }

        let swap = self.registry.get_swap(transaction_id)?;
        let intermediate = self.vault.pubkey_of(&swap.intermediate_wallet_id)?;

        // Recovery only applies to funds that have not begun moving.
        if self.vault.balance(&intermediate).await? < swap.amount {
            return Err(RecoveryError::FundsMoved);
        }

        self.registry
            .transition_status(transaction_id, SwapStatus::Pending, SwapStatus::Recovered)?;

        let net = swap.amount - swap.relayer_fee;
        let outcome = self
            .vault
            .transfer(&swap.intermediate_wallet_id, &[(*destination, net)])
            .await?;

        self.registry.append_step(
            transaction_id,
            &intermediate.to_string(),
            &destination.to_string(),
            &outcome.signature.to_string(),
            Some(net),
        )?;
        self.registry
            .set_final_sig(transaction_id, &outcome.signature.to_string())?;
        self.vault.mark_used(&swap.intermediate_wallet_id)?;

        info!(
            transaction_id,
            signature = %outcome.signature,
            reason = ?availability.reason,
            "recovery withdrawal confirmed"
        );
        Ok(outcome.signature)
    }
}
