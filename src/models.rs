// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Shared wire-level types used across the REST API. Request/response
//! DTOs specific to one endpoint group live next to their handlers.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use utoipa::ToSchema;

/// Base58 Solana address wrapper.
///
/// Provides type safety for addresses crossing the API boundary. The
/// inner string is validated to parse as an ed25519 public key before a
/// `SolAddress` is handed to any subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SolAddress(pub String);

impl SolAddress {
    /// Validate and parse the address into a [`Pubkey`].
    pub fn parse(&self) -> Result<Pubkey, String> {
        self.0
            .parse::<Pubkey>()
            .map_err(|_| format!("invalid Solana address: {}", self.0))
    }
}

impl std::fmt::Display for SolAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Pubkey> for SolAddress {
    fn from(value: Pubkey) -> Self {
        SolAddress(value.to_string())
    }
}

impl From<String> for SolAddress {
    fn from(value: String) -> Self {
        SolAddress(value)
    }
}

impl From<&str> for SolAddress {
    fn from(value: &str) -> Self {
        SolAddress(value.to_string())
    }
}
