// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Application State
//!
//! Shared state passed to all Axum request handlers via the `State`
//! extractor. `AppState` is `Clone` and `Send + Sync`; the subsystems
//! are reference-counted and mediate their own synchronization through
//! the registry database.

use std::sync::Arc;

use crate::config::PrivacyMode;
use crate::recovery::RecoveryLedger;
use crate::registry::Registry;
use crate::vault::WalletVault;

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Durable swap registry.
    pub registry: Arc<Registry>,
    /// Wallet vault (key custody + transfer primitives).
    pub vault: Arc<WalletVault>,
    /// Recovery ledger.
    pub ledger: Arc<RecoveryLedger>,
    /// Network identifier, surfaced in `/health`.
    pub network: String,
    /// Deployed strategy profile, surfaced in `/health`.
    pub privacy_mode: PrivacyMode,
}

impl AppState {
    pub fn new(
        registry: Arc<Registry>,
        vault: Arc<WalletVault>,
        ledger: Arc<RecoveryLedger>,
        network: impl Into<String>,
        privacy_mode: PrivacyMode,
    ) -> Self {
        Self {
            registry,
            vault,
            ledger,
            network: network.into(),
            privacy_mode,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::test_state;

    #[test]
    fn state_can_be_cloned() {
        let ts = test_state();
        let _cloned = ts.state.clone();
        ts.cleanup();
    }
}
