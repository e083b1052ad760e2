// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Error Handling
//!
//! This module provides a unified error type for all API responses.
//! Errors are automatically converted to JSON responses with appropriate
//! HTTP status codes.
//!
//! ## JSON Response Format
//!
//! All errors are returned as JSON with a single `error` field:
//!
//! ```json
//! { "error": "Swap not found" }
//! ```
//!
//! Internal detail (RPC error text, storage paths) is logged at the call
//! site and never included in the message beyond its kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// API error with HTTP status and message.
///
/// This type implements `IntoResponse`, allowing it to be returned directly
/// from Axum handlers. The error is serialized as JSON.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status code for the response.
    pub status: StatusCode,
    /// Human-readable error message (included in JSON response).
    pub message: String,
}

/// JSON body structure for error responses.
#[derive(Serialize)]
struct ErrorBody {
    /// The error message.
    error: String,
}

impl ApiError {
    /// Create a new API error with the given status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Create a 404 Not Found error.
    ///
    /// Use when a requested swap, wallet or memo does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Create a 400 Bad Request error.
    ///
    /// Use when the request is malformed, an address fails to parse, or an
    /// amount is out of band.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Create a 409 Conflict error.
    ///
    /// Raised when an atomic status transition loses a race. Considered a
    /// bug when it surfaces; escalate rather than retry.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Create a 500 Internal Server Error.
    ///
    /// Use for unexpected server-side failures. Avoid exposing internal details.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Create a 503 Service Unavailable error.
    ///
    /// Use when a required service (e.g., the Solana RPC) is unavailable.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl IntoResponse for ApiError {
    /// Convert the error into an Axum HTTP response.
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
