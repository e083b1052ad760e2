// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Swap Registry
//!
//! Durable authoritative store for swap state, backed by redb (pure
//! Rust, ACID). All coordinator writes go through the atomic operations
//! here; the coordinator holds no cache.
//!
//! ## Table Layout
//!
//! - `swaps`: transaction_id → serialized SwapRecord (steps embedded)
//! - `windows`: window_id → serialized MixingWindowRecord
//! - `recovery`: transaction_id → serialized RecoveryRecord
//! - `memos`: transaction_id → serialized MemoRecord
//! - `counter`: "main" → serialized DepositCounter

pub mod db;
pub mod records;

pub use db::{Registry, RegistryError, RegistryResult};
pub use records::{
    DepositCounter, MemoRecord, MixingWindowRecord, RecoveryReason, RecoveryRecord, SwapRecord,
    SwapStatus, SwapStep,
};
