// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Note split planning.
//!
//! A deposit is broken into N notes whose values sum exactly to the
//! deposit. Note count depends on the amount band; individual values are
//! drawn as random fractions of the running remainder and shuffled so
//! ordering carries no signal.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::constants::{
    LAMPORTS_PER_SOL, MAX_NOTES, MIN_NOTES, MIN_SPLIT_LAMPORTS,
};

/// Pick the note count for an amount, by band.
fn note_count(amount: u64) -> usize {
    let count = if amount > LAMPORTS_PER_SOL {
        // one note per 0.2 SOL, up to the cap
        (amount / 200_000_000) as usize
    } else if amount > LAMPORTS_PER_SOL / 2 {
        6
    } else if amount > LAMPORTS_PER_SOL / 10 {
        4
    } else {
        2
    };
    count.clamp(MIN_NOTES, MAX_NOTES)
}

/// Build the split plan for a deposit.
///
/// Post-condition: the values sum to `amount` exactly and, except when
/// the amount is too small to split, every note is at least
/// `MIN_SPLIT_LAMPORTS`.
pub fn split_plan<R: Rng>(amount: u64, rng: &mut R) -> Vec<u64> {
    if amount <= 2 * MIN_SPLIT_LAMPORTS {
        return vec![amount];
    }

    let n = note_count(amount);
    let mut values: Vec<u64> = Vec::with_capacity(n);
    let mut remaining = amount;

    for _ in 0..n - 1 {
        let fraction: f64 = rng.gen_range(0.15..0.35);
        let drawn = ((remaining as f64) * fraction) as u64;
        let value = drawn.max(MIN_SPLIT_LAMPORTS);
        if remaining.saturating_sub(value) < MIN_SPLIT_LAMPORTS {
            break;
        }
        values.push(value);
        remaining -= value;
    }
    // Remainder is the final note; a sub-minimum tail folds into the
    // previous note so the sum stays exact.
    if remaining >= MIN_SPLIT_LAMPORTS || values.is_empty() {
        values.push(remaining);
    } else if let Some(last) = values.last_mut() {
        *last += remaining;
    }

    values.shuffle(rng);
    values
}
