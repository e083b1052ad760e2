// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Intermediate wallet repository.
//!
//! ## Storage Layout
//!
//! Each wallet lives in its own directory:
//! ```text
//! {DATA_DIR}/wallets/{wallet_id}/
//!   meta.json       # Wallet metadata
//!   key.enc         # Sealed secret key (nonce||tag||ct)
//! ```
//!
//! ## Security
//!
//! - Secret keys arrive here already sealed by the vault
//! - Sealed keys are NEVER returned via API
//! - A wallet is single-use: once `mark_used` runs, `active` is false
//!   forever and the vault refuses to sign with it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FsStore, StorageError, StorageResult};

/// Wallet metadata stored in meta.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletMetadata {
    /// Unique wallet identifier (UUID)
    pub wallet_id: String,
    /// Base58 public key
    pub public_key: String,
    /// When the wallet was created
    pub created_at: DateTime<Utc>,
    /// When the wallet made its final outgoing transfer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    /// Whether the wallet may still sign
    pub active: bool,
}

/// Repository for intermediate wallet records.
pub struct WalletRepository<'a> {
    store: &'a FsStore,
}

impl<'a> WalletRepository<'a> {
    pub fn new(store: &'a FsStore) -> Self {
        Self { store }
    }

    /// Check if a wallet exists.
    pub fn exists(&self, wallet_id: &str) -> bool {
        self.store.exists(self.store.paths().wallet_meta(wallet_id))
    }

    /// Get wallet metadata by ID.
    pub fn get(&self, wallet_id: &str) -> StorageResult<WalletMetadata> {
        let path = self.store.paths().wallet_meta(wallet_id);
        if !self.store.exists(&path) {
            return Err(StorageError::NotFound(format!("wallet {wallet_id}")));
        }
        self.store.read_json(path)
    }

    /// Create a new wallet record with its sealed secret.
    pub fn create(&self, metadata: &WalletMetadata, sealed_key: &[u8]) -> StorageResult<()> {
        let wallet_id = &metadata.wallet_id;

        if self.exists(wallet_id) {
            return Err(StorageError::AlreadyExists(format!("wallet {wallet_id}")));
        }

        self.store
            .create_dir(self.store.paths().wallet_dir(wallet_id))?;
        self.store
            .write_json(self.store.paths().wallet_meta(wallet_id), metadata)?;
        self.store
            .write_raw(self.store.paths().wallet_key(wallet_id), sealed_key)?;

        Ok(())
    }

    /// Retire a wallet after its final outgoing transfer.
    pub fn mark_used(&self, wallet_id: &str, at: DateTime<Utc>) -> StorageResult<()> {
        let mut metadata = self.get(wallet_id)?;
        metadata.active = false;
        metadata.used_at = Some(at);
        self.store
            .write_json(self.store.paths().wallet_meta(wallet_id), &metadata)
    }

    /// Read the sealed secret key for a wallet.
    ///
    /// **Internal use only** - the vault unseals it for signing.
    pub(crate) fn read_sealed_key(&self, wallet_id: &str) -> StorageResult<Vec<u8>> {
        if !self.exists(wallet_id) {
            return Err(StorageError::NotFound(format!("wallet {wallet_id}")));
        }
        self.store
            .read_raw(self.store.paths().wallet_key(wallet_id))
    }

    /// List all wallet IDs.
    pub fn list_all_ids(&self) -> StorageResult<Vec<String>> {
        self.store.list_dirs(self.store.paths().wallets_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use std::env;
    use std::fs;

    fn test_store() -> FsStore {
        let test_dir = env::temp_dir().join(format!("test-wallet-repo-{}", uuid::Uuid::new_v4()));
        let paths = StoragePaths::new(&test_dir);
        let mut store = FsStore::new(paths);
        store.initialize().expect("Failed to initialize");
        store
    }

    fn cleanup(store: &FsStore) {
        let _ = fs::remove_dir_all(store.paths().root());
    }

    fn test_metadata() -> WalletMetadata {
        WalletMetadata {
            wallet_id: "wallet-123".to_string(),
            public_key: "4Nd1mYdBkYbweBbnXnfM9DFuZjL6hzEyGKfXDKxPCefG".to_string(),
            created_at: Utc::now(),
            used_at: None,
            active: true,
        }
    }

    #[test]
    fn create_and_get_wallet() {
        let store = test_store();
        let repo = WalletRepository::new(&store);

        let meta = test_metadata();
        repo.create(&meta, b"sealed").unwrap();

        let loaded = repo.get(&meta.wallet_id).unwrap();
        assert_eq!(loaded.wallet_id, meta.wallet_id);
        assert_eq!(loaded.public_key, meta.public_key);
        assert!(loaded.active);
        assert!(loaded.used_at.is_none());

        assert_eq!(repo.read_sealed_key(&meta.wallet_id).unwrap(), b"sealed");

        cleanup(&store);
    }

    #[test]
    fn create_duplicate_fails() {
        let store = test_store();
        let repo = WalletRepository::new(&store);

        let meta = test_metadata();
        repo.create(&meta, b"sealed").unwrap();
        let result = repo.create(&meta, b"sealed");

        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));

        cleanup(&store);
    }

    #[test]
    fn mark_used_retires_wallet() {
        let store = test_store();
        let repo = WalletRepository::new(&store);

        let meta = test_metadata();
        repo.create(&meta, b"sealed").unwrap();
        repo.mark_used(&meta.wallet_id, Utc::now()).unwrap();

        let loaded = repo.get(&meta.wallet_id).unwrap();
        assert!(!loaded.active);
        assert!(loaded.used_at.is_some());

        cleanup(&store);
    }

    #[test]
    fn missing_wallet_is_not_found() {
        let store = test_store();
        let repo = WalletRepository::new(&store);

        assert!(matches!(
            repo.get("nope"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            repo.read_sealed_key("nope"),
            Err(StorageError::NotFound(_))
        ));

        cleanup(&store);
    }
}
