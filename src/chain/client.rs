// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana JSON-RPC client.
//!
//! All chain access goes through the [`ChainRpc`] trait so the
//! coordinator and monitor can be exercised against a simulated ledger.
//! The production implementation wraps the nonblocking RPC client at
//! `confirmed` commitment with preflight checks on.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

/// Errors that can occur during chain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("transaction not confirmed: {0}")]
    NotConfirmed(String),
}

/// Chain access seam.
///
/// Every call is read-only except [`send_and_confirm`], which submits a
/// signed transaction and awaits `confirmed` commitment. Each call has a
/// bounded deadline enforced by the underlying HTTP client; exceeding it
/// surfaces as [`ChainError::Rpc`].
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Live lamport balance for an account (never cached).
    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, ChainError>;

    /// A recent blockhash to bind a transaction to.
    async fn latest_blockhash(&self) -> Result<Hash, ChainError>;

    /// Submit a signed transaction and await confirmation.
    async fn send_and_confirm(&self, tx: &Transaction) -> Result<Signature, ChainError>;

    /// Whether a signature has reached `confirmed` commitment.
    async fn is_confirmed(&self, signature: &Signature) -> Result<bool, ChainError>;

    /// Rent-exempt minimum for an account with `data_len` bytes of data.
    async fn rent_exempt_minimum(&self, data_len: usize) -> Result<u64, ChainError>;
}

/// Production RPC client.
pub struct SolanaRpc {
    client: RpcClient,
}

impl SolanaRpc {
    /// Connect to the given endpoint at `confirmed` commitment.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url.into(), CommitmentConfig::confirmed()),
        }
    }
}

#[async_trait]
impl ChainRpc for SolanaRpc {
    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, ChainError> {
        self.client
            .get_balance(pubkey)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    async fn latest_blockhash(&self) -> Result<Hash, ChainError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    async fn send_and_confirm(&self, tx: &Transaction) -> Result<Signature, ChainError> {
        let signature = self
            .client
            .send_transaction_with_config(
                tx,
                RpcSendTransactionConfig {
                    skip_preflight: false,
                    preflight_commitment: Some(CommitmentConfig::confirmed().commitment),
                    ..RpcSendTransactionConfig::default()
                },
            )
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        let blockhash = tx.message.recent_blockhash;
        self.client
            .confirm_transaction_with_spinner(
                &signature,
                &blockhash,
                CommitmentConfig::confirmed(),
            )
            .await
            .map_err(|e| ChainError::NotConfirmed(e.to_string()))?;

        Ok(signature)
    }

    async fn is_confirmed(&self, signature: &Signature) -> Result<bool, ChainError> {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, CommitmentConfig::confirmed())
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Ok(matches!(status, Some(Ok(()))))
    }

    async fn rent_exempt_minimum(&self, data_len: usize) -> Result<u64, ChainError> {
        self.client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }
}
