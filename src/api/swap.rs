// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Swap lifecycle endpoints: config, prepare, initiate, status,
//! intermediate inspection and memo retrieval.
//!
//! Handlers validate and delegate; no mixing logic lives here.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::{
    chain::{lamports_to_sol, sol_to_lamports},
    config::{config_hash, constants, ImmutableConstants},
    error::ApiError,
    models::SolAddress,
    recovery::RecoveryLedger,
    registry::{MemoRecord, RegistryError, SwapRecord, SwapStatus},
    state::AppState,
    vault::VaultError,
};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Immutable relayer policy, with its audit hash.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    /// The immutable constants the relayer runs with.
    pub constants: ImmutableConstants,
    /// SHA-256 over the canonical constants encoding.
    pub config_hash: String,
}

/// Request to prepare a swap.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    /// User's source wallet (base58).
    pub source_wallet: SolAddress,
    /// User's destination wallet (base58).
    pub destination_wallet: SolAddress,
    /// Amount in SOL.
    pub amount: f64,
}

/// Freshly allocated deposit target.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntermediateWalletInfo {
    pub public_key: String,
    pub wallet_id: String,
}

/// Recovery material issued at prepare time. The key is shown exactly
/// once; only its hash is ever stored.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecoverySetup {
    pub recovery_key: String,
    pub recovery_key_hash: String,
    pub threshold: u64,
}

/// Response to a prepare request.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrepareResponse {
    pub intermediate_wallet: IntermediateWalletInfo,
    /// Relayer fee in SOL.
    pub fee: f64,
    pub recovery: RecoverySetup,
    /// Human-readable deposit instructions.
    pub instructions: String,
}

/// Opaque client-encrypted memo attached at initiate.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoInput {
    pub ciphertext: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}

/// Request to initiate a prepared swap.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub source_wallet: SolAddress,
    pub destination_wallet: SolAddress,
    /// Amount in SOL.
    pub amount: f64,
    /// Signature of the user's deposit to the intermediate wallet.
    pub source_tx_signature: String,
    /// Wallet id returned by prepare.
    pub intermediate_wallet_id: String,
    /// Recovery key returned by prepare (enables emergency withdrawal).
    #[serde(default)]
    pub recovery_key: Option<String>,
    /// Optional encrypted memo, stored verbatim.
    #[serde(default)]
    pub encrypted_memo: Option<MemoInput>,
}

/// Response to an initiate request.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub transaction_id: String,
    pub status: SwapStatus,
}

/// Live intermediate wallet state.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntermediateBalanceResponse {
    pub public_key: String,
    /// Balance in SOL.
    pub balance: f64,
}

/// Stored memo, returned verbatim.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoResponse {
    pub encrypted: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}

// =============================================================================
// Helpers
// =============================================================================

/// Validate a SOL amount and convert to lamports.
fn validate_amount(sol: f64) -> Result<u64, ApiError> {
    if !sol.is_finite() || sol <= 0.0 {
        return Err(ApiError::bad_request("Amount must be a positive number"));
    }
    let lamports = sol_to_lamports(sol);
    if lamports < constants::MIN_SWAP_LAMPORTS {
        return Err(ApiError::bad_request(format!(
            "Amount below minimum of {} SOL",
            lamports_to_sol(constants::MIN_SWAP_LAMPORTS)
        )));
    }
    Ok(lamports)
}

/// Map registry failures onto HTTP statuses.
pub(super) fn registry_error(e: RegistryError) -> ApiError {
    match e {
        RegistryError::NotFound(what) => ApiError::not_found(what),
        RegistryError::StatusConflict { .. } => ApiError::conflict(e.to_string()),
        other => {
            tracing::error!(error = %other, "registry failure");
            ApiError::internal("Registry failure")
        }
    }
}

/// Map vault failures onto HTTP statuses.
pub(super) fn vault_error(e: VaultError) -> ApiError {
    match e {
        VaultError::Storage(crate::storage::StorageError::NotFound(what)) => {
            ApiError::not_found(what)
        }
        VaultError::Chain(inner) => {
            tracing::error!(error = %inner, "chain RPC failure");
            ApiError::service_unavailable("Solana RPC unavailable")
        }
        other => {
            tracing::error!(error = %other, "vault failure");
            ApiError::internal("Vault failure")
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Immutable constants plus config hash.
#[utoipa::path(
    get,
    path = "/api/swap/config",
    tag = "Swap",
    responses(
        (status = 200, description = "Relayer policy", body = ConfigResponse)
    )
)]
pub async fn get_config() -> Json<ConfigResponse> {
    Json(ConfigResponse {
        constants: ImmutableConstants::current(),
        config_hash: config_hash(),
    })
}

/// Allocate an intermediate wallet and issue recovery material.
#[utoipa::path(
    post,
    path = "/api/swap/prepare",
    tag = "Swap",
    request_body = PrepareRequest,
    responses(
        (status = 200, description = "Deposit target allocated", body = PrepareResponse),
        (status = 400, description = "Validation error")
    )
)]
pub async fn prepare(
    State(state): State<AppState>,
    Json(request): Json<PrepareRequest>,
) -> Result<Json<PrepareResponse>, ApiError> {
    request
        .source_wallet
        .parse()
        .map_err(ApiError::bad_request)?;
    request
        .destination_wallet
        .parse()
        .map_err(ApiError::bad_request)?;
    let lamports = validate_amount(request.amount)?;

    let (wallet_id, public_key) = state.vault.allocate().map_err(vault_error)?;
    let (recovery_key, recovery_key_hash) = RecoveryLedger::generate_key();
    let fee = constants::relayer_fee(lamports);

    Ok(Json(PrepareResponse {
        intermediate_wallet: IntermediateWalletInfo {
            public_key: public_key.to_string(),
            wallet_id,
        },
        fee: lamports_to_sol(fee),
        recovery: RecoverySetup {
            recovery_key,
            recovery_key_hash,
            threshold: constants::RECOVERY_THRESHOLD,
        },
        instructions: format!(
            "Send {} SOL to {} and initiate with the deposit signature. \
             Keep the recovery key: it is shown only once.",
            request.amount, public_key
        ),
    }))
}

/// Register a swap for an on-chain deposit.
#[utoipa::path(
    post,
    path = "/api/swap/initiate",
    tag = "Swap",
    request_body = InitiateRequest,
    responses(
        (status = 200, description = "Swap registered", body = InitiateResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Unknown intermediate wallet")
    )
)]
pub async fn initiate(
    State(state): State<AppState>,
    Json(request): Json<InitiateRequest>,
) -> Result<Json<InitiateResponse>, ApiError> {
    request
        .source_wallet
        .parse()
        .map_err(ApiError::bad_request)?;
    request
        .destination_wallet
        .parse()
        .map_err(ApiError::bad_request)?;
    let lamports = validate_amount(request.amount)?;

    solana_sdk::signature::Signature::from_str(&request.source_tx_signature)
        .map_err(|_| ApiError::bad_request("Source transaction signature does not parse"))?;

    let wallet = state
        .vault
        .metadata(&request.intermediate_wallet_id)
        .map_err(vault_error)?;
    if !wallet.active {
        return Err(ApiError::bad_request(
            "Intermediate wallet has already been used",
        ));
    }

    let transaction_id = uuid::Uuid::new_v4().to_string();
    let swap = SwapRecord {
        transaction_id: transaction_id.clone(),
        source_addr: request.source_wallet.0.clone(),
        dest_addr: request.destination_wallet.0.clone(),
        amount: lamports,
        relayer_fee: constants::relayer_fee(lamports),
        intermediate_wallet_id: request.intermediate_wallet_id.clone(),
        source_sig: request.source_tx_signature.clone(),
        status: SwapStatus::Pending,
        steps: Vec::new(),
        window_id: None,
        final_sig: None,
        error: None,
        created_at: Utc::now(),
        completed_at: None,
    };

    let recovery_hash = request
        .recovery_key
        .as_deref()
        .map(RecoveryLedger::hash_key);
    state
        .registry
        .create_swap(&swap, recovery_hash.as_deref())
        .map_err(registry_error)?;

    if let Some(memo) = request.encrypted_memo {
        state
            .registry
            .store_memo(&MemoRecord {
                transaction_id: transaction_id.clone(),
                ciphertext: memo.ciphertext,
                metadata: memo.metadata,
            })
            .map_err(registry_error)?;
    }

    tracing::info!(transaction_id = %transaction_id, "swap initiated");
    Ok(Json(InitiateResponse {
        transaction_id,
        status: SwapStatus::Pending,
    }))
}

/// Full swap record with steps.
#[utoipa::path(
    get,
    path = "/api/swap/status/{id}",
    tag = "Swap",
    params(("id" = String, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Swap record", body = SwapRecord),
        (status = 404, description = "Unknown swap")
    )
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SwapRecord>, ApiError> {
    let swap = state.registry.get_swap(&id).map_err(registry_error)?;
    Ok(Json(swap))
}

/// Live balance of an intermediate wallet.
#[utoipa::path(
    get,
    path = "/api/swap/intermediate/{wallet_id}",
    tag = "Swap",
    params(("wallet_id" = String, Path, description = "Wallet ID")),
    responses(
        (status = 200, description = "Wallet state", body = IntermediateBalanceResponse),
        (status = 404, description = "Unknown wallet")
    )
)]
pub async fn get_intermediate(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> Result<Json<IntermediateBalanceResponse>, ApiError> {
    let wallet = state.vault.metadata(&wallet_id).map_err(vault_error)?;
    let pubkey = state.vault.pubkey_of(&wallet_id).map_err(vault_error)?;
    let lamports = state.vault.balance(&pubkey).await.map_err(vault_error)?;

    Ok(Json(IntermediateBalanceResponse {
        public_key: wallet.public_key,
        balance: lamports_to_sol(lamports),
    }))
}

/// Stored encrypted memo for a swap.
#[utoipa::path(
    get,
    path = "/api/swap/memo/{id}",
    tag = "Swap",
    params(("id" = String, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Encrypted memo", body = MemoResponse),
        (status = 404, description = "No memo stored")
    )
)]
pub async fn get_memo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MemoResponse>, ApiError> {
    let memo = state.registry.get_memo(&id).map_err(registry_error)?;
    Ok(Json(MemoResponse {
        encrypted: memo.ciphertext,
        metadata: memo.metadata,
    }))
}
