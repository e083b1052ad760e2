// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! solcloak - Custodial SOL Privacy Relayer
//!
//! This crate provides a custodial relayer that breaks the on-chain link
//! between a sender and a receiver of native SOL: deposits land on
//! single-use intermediate wallets and travel through a randomized
//! split/withdraw/merge/hop pipeline before reaching the destination.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `chain` - Solana RPC integration
//! - `coordinator` - The mixing state machine
//! - `monitor` - Deposit confirmation polling
//! - `recovery` - Emergency direct-withdrawal ledger
//! - `registry` - Durable swap state (redb)
//! - `vault` - Keypair custody and transfer primitives

pub mod api;
pub mod chain;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod monitor;
pub mod recovery;
pub mod registry;
pub mod state;
pub mod storage;
pub mod vault;
