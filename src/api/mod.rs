// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::Path,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;

use crate::state::AppState;

pub mod health;
pub mod recovery;
pub mod swap;

pub fn router(state: AppState) -> Router {
    let swap_routes = Router::new()
        .route("/config", get(swap::get_config))
        .route("/prepare", post(swap::prepare))
        .route("/initiate", post(swap::initiate))
        .route("/status/{id}", get(swap::get_status))
        .route("/intermediate/{wallet_id}", get(swap::get_intermediate))
        .route(
            "/recovery/{id}",
            get(recovery::get_availability).post(recovery::consume),
        )
        .route("/memo/{id}", get(swap::get_memo))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/swap", swap_routes)
        // API docs. Bare /docs redirects to /docs/ so the UI's relative
        // asset links resolve against the right base.
        .route("/api-doc/openapi.json", get(openapi_spec))
        .route("/docs", get(|| async { Redirect::permanent("/docs/") }))
        .route("/docs/", get(docs_index))
        .route("/docs/{*asset}", get(docs_asset))
        .layer(cors_layer())
        .with_state(state)
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn docs_index() -> Response {
    docs_file("index.html")
}

async fn docs_asset(Path(asset): Path<String>) -> Response {
    docs_file(&asset)
}

/// Look up one bundled swagger-ui file and wrap it in a response.
fn docs_file(name: &str) -> Response {
    let config = Arc::new(utoipa_swagger_ui::Config::from("/api-doc/openapi.json"));
    match utoipa_swagger_ui::serve(name, config) {
        Ok(Some(file)) => {
            let mime = HeaderValue::from_str(&file.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime)],
                file.bytes.into_owned(),
            )
                .into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(error) => {
            tracing::error!(asset = name, error = %error, "swagger asset lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Cross-origin policy.
///
/// `CORS_ALLOWED_ORIGINS` holds a comma-separated allow-list; an origin
/// that fails to parse is skipped with a warning rather than taking the
/// process down. Without the variable every origin is accepted, which
/// is only suitable for local development.
fn cors_layer() -> CorsLayer {
    let Ok(raw) = std::env::var("CORS_ALLOWED_ORIGINS") else {
        tracing::warn!("no CORS_ALLOWED_ORIGINS set, accepting any origin");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    tracing::info!(allowed = origins.len(), "cross-origin requests limited to allow-list");
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        swap::get_config,
        swap::prepare,
        swap::initiate,
        swap::get_status,
        swap::get_intermediate,
        swap::get_memo,
        recovery::get_availability,
        recovery::consume,
        health::health
    ),
    components(
        schemas(
            // Swap schemas
            swap::ConfigResponse,
            swap::PrepareRequest,
            swap::PrepareResponse,
            swap::IntermediateWalletInfo,
            swap::RecoverySetup,
            swap::InitiateRequest,
            swap::InitiateResponse,
            swap::MemoInput,
            swap::MemoResponse,
            swap::IntermediateBalanceResponse,
            crate::config::ImmutableConstants,
            crate::models::SolAddress,
            crate::registry::SwapRecord,
            crate::registry::SwapStep,
            crate::registry::SwapStatus,
            crate::registry::RecoveryReason,
            // Recovery schemas
            recovery::AvailabilityResponse,
            recovery::ConsumeRequest,
            recovery::ConsumeResponse,
            // Health schemas
            health::HealthResponse
        )
    ),
    tags(
        (name = "Swap", description = "Swap preparation, initiation and status"),
        (name = "Recovery", description = "Emergency direct withdrawal"),
        (name = "Health", description = "Liveness checks")
    )
)]
struct ApiDoc;
