// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Strategy profiles.
//!
//! One coordinator, parameterized by profile. The standard profile is a
//! plain multi-hop relay; the enhanced profile adds the withdraw stage
//! and amount obfuscation. Both share the same state machine.

use std::ops::RangeInclusive;

use crate::config::constants::OBFUSCATION_RANGE_LAMPORTS;
use crate::config::PrivacyMode;

/// Tunable knobs distinguishing the privacy strategies.
#[derive(Debug, Clone)]
pub struct StrategyProfile {
    /// Whether each note passes through a dedicated withdraw wallet.
    pub withdraw_enabled: bool,
    /// How many post-merge hops to take (chosen uniformly).
    pub hop_range: RangeInclusive<u8>,
    /// Additive amount jitter half-range, lamports (0 disables).
    pub obfuscation_range: u64,
}

impl StrategyProfile {
    /// Full mixing pipeline (the default deployment).
    pub fn mixing() -> Self {
        Self {
            withdraw_enabled: true,
            hop_range: 1..=2,
            obfuscation_range: OBFUSCATION_RANGE_LAMPORTS,
        }
    }

    /// Basic multi-hop relay.
    pub fn multi_hop() -> Self {
        Self {
            withdraw_enabled: false,
            hop_range: 1..=2,
            obfuscation_range: 0,
        }
    }

    pub fn for_mode(mode: PrivacyMode) -> Self {
        match mode {
            PrivacyMode::Standard => Self::multi_hop(),
            PrivacyMode::Enhanced => Self::mixing(),
        }
    }
}
