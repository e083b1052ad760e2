// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistent Storage Module
//!
//! Filesystem-backed storage for wallet records.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   wallets/{wallet_id}/
//!     meta.json       # Wallet metadata (pubkey, lifecycle flags)
//!     key.enc         # Sealed secret key (AES-256-GCM, nonce||tag||ct)
//!   registry.redb     # Swap registry (embedded ACID database)
//! ```
//!
//! The secret key file is sealed by the vault **before** it reaches this
//! layer; nothing here handles plaintext key material. Swap state lives
//! in the embedded registry database (see `crate::registry`), not in
//! JSON files, because status transitions must be atomic.

pub mod paths;
pub mod store;
pub mod wallets;

pub use paths::StoragePaths;
pub use store::{FsStore, StorageError, StorageResult};
pub use wallets::{WalletMetadata, WalletRepository};
