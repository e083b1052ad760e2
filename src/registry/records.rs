// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persistent record types for the swap registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Swap lifecycle status.
///
/// Transitions form a DAG: `pending → processing → {completed, failed}`
/// plus `pending → recovered`. `processing → recovered` is forbidden;
/// recovery is only valid while the funds still sit at the first
/// intermediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Recovered,
}

impl SwapStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapStatus::Completed | SwapStatus::Failed | SwapStatus::Recovered
        )
    }
}

impl std::fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SwapStatus::Pending => "pending",
            SwapStatus::Processing => "processing",
            SwapStatus::Completed => "completed",
            SwapStatus::Failed => "failed",
            SwapStatus::Recovered => "recovered",
        };
        write!(f, "{s}")
    }
}

/// One confirmed on-chain transfer in a swap's wallet chain.
///
/// Appended immediately after RPC confirmation, never before; the last
/// persisted step identifies where the funds sit after a crash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwapStep {
    /// Position in execution order, starting at 0.
    pub step_index: u32,
    /// Sending address (base58).
    pub from_addr: String,
    /// Receiving address (base58).
    pub to_addr: String,
    /// Confirmed transaction signature.
    pub tx_sig: String,
    /// When the transfer confirmed.
    pub timestamp: DateTime<Utc>,
    /// Lamports moved, when the step carries a planned amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
}

/// Authoritative swap record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwapRecord {
    /// Registry-issued id, used end-to-end (steps, recovery, memo).
    pub transaction_id: String,
    /// User's source address (base58).
    pub source_addr: String,
    /// User's destination address (base58).
    pub dest_addr: String,
    /// Swap amount in lamports.
    pub amount: u64,
    /// Relayer fee in lamports, fixed at initiate. No later code path
    /// recomputes it from live constants.
    pub relayer_fee: u64,
    /// The vault wallet the user deposits into.
    pub intermediate_wallet_id: String,
    /// Signature of the user's deposit transaction.
    pub source_sig: String,
    /// Current lifecycle status.
    pub status: SwapStatus,
    /// Confirmed transfers, in execution order.
    pub steps: Vec<SwapStep>,
    /// Mixing window this swap's deposits were assigned to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
    /// Signature of the finalizing transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_sig: Option<String>,
    /// Failure diagnostic, when status is `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Wall-clock bucket grouping deposits for co-mingling.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MixingWindowRecord {
    /// `floor(now / W) * W`, as a string key.
    pub window_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Total lamports deposited in this window.
    pub total_amount: u64,
    /// Number of note deposits in this window.
    pub tx_count: u64,
}

/// Why recovery is (or is not) available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryReason {
    Threshold,
    Timeout,
    None,
}

/// Recovery bookkeeping for one swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub transaction_id: String,
    /// Global deposit count snapshotted at initiate.
    pub deposit_count_at_creation: u64,
    /// SHA-256 of the recovery key, hex-encoded.
    pub recovery_key_hash: String,
    /// Latched true on the first successful availability evaluation.
    pub recovery_available: bool,
    /// Which rule unlocked recovery.
    pub available_reason: RecoveryReason,
    pub created_at: DateTime<Utc>,
}

/// Global deposit counter (singleton, key `main`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositCounter {
    pub total_deposits: u64,
    pub last_updated: DateTime<Utc>,
}

/// Opaque client-encrypted memo; stored and returned verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoRecord {
    pub transaction_id: String,
    /// Ciphertext, as supplied by the client.
    pub ciphertext: String,
    /// Client metadata (IV, scheme tag), passed through untouched.
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}
