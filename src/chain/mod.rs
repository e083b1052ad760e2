// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana chain integration.
//!
//! This module provides:
//! - The [`ChainRpc`] seam the vault, monitor and recovery path talk
//!   through (the test suite substitutes a simulated ledger)
//! - The JSON-RPC implementation at `confirmed` commitment
//! - Network configuration and lamport conversion helpers

pub mod client;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use client::{ChainError, ChainRpc, SolanaRpc};
pub use types::{default_rpc_url, lamports_to_sol, sol_to_lamports, NetworkConfig};
