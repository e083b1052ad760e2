// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain types, network table and lamport conversions.

use crate::config::constants::LAMPORTS_PER_SOL;

/// Solana network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Solana mainnet-beta configuration.
pub const SOL_MAINNET: NetworkConfig = NetworkConfig {
    name: "mainnet",
    rpc_url: "https://api.mainnet-beta.solana.com",
    explorer_url: "https://explorer.solana.com",
};

/// Solana devnet configuration.
pub const SOL_DEVNET: NetworkConfig = NetworkConfig {
    name: "devnet",
    rpc_url: "https://api.devnet.solana.com",
    explorer_url: "https://explorer.solana.com?cluster=devnet",
};

/// Solana testnet configuration.
pub const SOL_TESTNET: NetworkConfig = NetworkConfig {
    name: "testnet",
    rpc_url: "https://api.testnet.solana.com",
    explorer_url: "https://explorer.solana.com?cluster=testnet",
};

/// Default RPC endpoint for a network selector, falling back to devnet.
pub fn default_rpc_url(network: &str) -> &'static str {
    match network.trim().to_ascii_lowercase().as_str() {
        "mainnet" | "mainnet-beta" => SOL_MAINNET.rpc_url,
        "testnet" => SOL_TESTNET.rpc_url,
        _ => SOL_DEVNET.rpc_url,
    }
}

/// Convert whole-SOL (as accepted on the wire) to lamports.
///
/// Rounds to the nearest lamport, i.e. 9 decimal places.
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).round() as u64
}

/// Convert lamports to SOL for display.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sol_round_trips_at_lamport_precision() {
        assert_eq!(sol_to_lamports(1.0), 1_000_000_000);
        assert_eq!(sol_to_lamports(0.05), 50_000_000);
        assert_eq!(sol_to_lamports(0.000000001), 1);
        // 9-decimal rounding
        assert_eq!(sol_to_lamports(0.0000000014), 1);
        assert_eq!(lamports_to_sol(25_000), 0.000025);
    }

    #[test]
    fn default_rpc_url_falls_back_to_devnet() {
        assert_eq!(default_rpc_url("mainnet"), SOL_MAINNET.rpc_url);
        assert_eq!(default_rpc_url("TESTNET"), SOL_TESTNET.rpc_url);
        assert_eq!(default_rpc_url("anything-else"), SOL_DEVNET.rpc_url);
    }
}
