// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Randomized timing.
//!
//! Every dwell is drawn from a CSPRNG, never derived from swap inputs;
//! amounts and addresses must not leak into timing.

use std::time::Duration;

use rand::Rng;

/// Between successive note deposits: uniform(2 s, 6 s).
pub fn note_deposit_delay<R: Rng>(rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(2_000..=6_000))
}

/// Post-deposit mixing dwell: 10 s base, plus 2 s per co-mingled deposit
/// in the window (capped at 30 s), plus uniform(0, 10 s).
pub fn mixing_delay<R: Rng>(window_tx_count: u64, rng: &mut R) -> Duration {
    let congestion = Duration::from_secs((window_tx_count * 2).min(30));
    Duration::from_secs(10) + congestion + Duration::from_millis(rng.gen_range(0..=10_000))
}

/// Second mixing dwell: uniform(delay, delay + 10 s). Applied on top of
/// the first, doubling the expected wait.
pub fn extra_mixing_delay<R: Rng>(base: Duration, rng: &mut R) -> Duration {
    base + Duration::from_millis(rng.gen_range(0..=10_000))
}

/// Before each withdraw transfer: uniform(5 s, 15 s).
pub fn withdraw_delay<R: Rng>(rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(5_000..=15_000))
}

/// Between merge transfers: uniform(3 s, 8 s).
pub fn merge_delay<R: Rng>(rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(3_000..=8_000))
}

/// Before each hop: uniform(5 s, 12 s).
pub fn hop_delay<R: Rng>(rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(5_000..=12_000))
}

/// Before finalizing: uniform(8 s, 20 s).
pub fn final_delay<R: Rng>(rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(8_000..=20_000))
}
