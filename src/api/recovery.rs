// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Emergency recovery endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    models::SolAddress,
    recovery::RecoveryError,
    registry::RecoveryReason,
    state::AppState,
};

use super::swap::{registry_error, vault_error};

/// Recovery availability for a swap.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub available: bool,
    pub reason: RecoveryReason,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
}

/// Request to execute an emergency withdrawal.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeRequest {
    /// The recovery key issued at prepare time.
    pub recovery_key: String,
    /// Where to send the recovered funds.
    pub destination_wallet: SolAddress,
}

/// Result of an executed recovery.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeResponse {
    pub success: bool,
    pub tx_signature: String,
}

fn recovery_error(e: RecoveryError) -> ApiError {
    match e {
        RecoveryError::InvalidKey => ApiError::bad_request("Invalid recovery key"),
        RecoveryError::NotAvailable { reason, details } => ApiError::bad_request(format!(
            "Recovery not available (reason: {reason:?}, details: {details})"
        )),
        RecoveryError::FundsMoved => {
            ApiError::bad_request("Funds have already left the intermediate wallet")
        }
        RecoveryError::Registry(inner) => registry_error(inner),
        RecoveryError::Vault(inner) => vault_error(inner),
    }
}

/// Evaluate recovery availability.
#[utoipa::path(
    get,
    path = "/api/swap/recovery/{id}",
    tag = "Recovery",
    params(("id" = String, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Availability evaluation", body = AvailabilityResponse),
        (status = 404, description = "Unknown swap or no recovery record")
    )
)]
pub async fn get_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let availability = state.ledger.availability(&id).map_err(recovery_error)?;
    Ok(Json(AvailabilityResponse {
        available: availability.available,
        reason: availability.reason,
        details: availability.details,
    }))
}

/// Execute an emergency direct withdrawal.
#[utoipa::path(
    post,
    path = "/api/swap/recovery/{id}",
    tag = "Recovery",
    params(("id" = String, Path, description = "Transaction ID")),
    request_body = ConsumeRequest,
    responses(
        (status = 200, description = "Funds withdrawn", body = ConsumeResponse),
        (status = 400, description = "Invalid key or recovery not available"),
        (status = 404, description = "Unknown swap"),
        (status = 409, description = "Lost a race with the coordinator")
    )
)]
pub async fn consume(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ConsumeRequest>,
) -> Result<Json<ConsumeResponse>, ApiError> {
    let destination = request
        .destination_wallet
        .parse()
        .map_err(ApiError::bad_request)?;

    let signature = state
        .ledger
        .consume(&id, &request.recovery_key, &destination)
        .await
        .map_err(recovery_error)?;

    Ok(Json(ConsumeResponse {
        success: true,
        tx_signature: signature.to_string(),
    }))
}
