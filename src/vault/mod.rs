// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Vault
//!
//! Owns every intermediate wallet secret. Generates fresh ed25519
//! keypairs, persists them sealed (see [`crypto`]), signs and submits
//! SOL transfers by opaque wallet id, and enforces the single-use
//! lifecycle: once a wallet is retired the vault refuses to sign with
//! it again, whatever the caller says.
//!
//! ## Fee/rent reservation
//!
//! Every outgoing transfer retains `FEE_RESERVE + rent_exempt_minimum`
//! in the sending wallet. The callable amount is
//! `max(0, balance - reserve)`. A single-recipient request above the
//! callable amount fails with `InsufficientFunds`; a multi-recipient
//! request is scaled uniformly (ratios preserved) and the scale factor
//! is reported in the outcome.

pub mod crypto;

use std::sync::Arc;

use chrono::Utc;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use tracing::debug;

use crate::chain::{ChainError, ChainRpc};
use crate::config::constants::FEE_RESERVE_LAMPORTS;
use crate::storage::{FsStore, StorageError, WalletMetadata, WalletRepository};
use crypto::{MasterKey, SealError};

/// Errors from vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("wallet cannot cover transfer: requested {requested} lamports, callable {callable}")]
    InsufficientFunds { requested: u64, callable: u64 },

    #[error("wallet {0} is retired and may not sign")]
    WalletInactive(String),

    #[error("stored key for wallet {0} is corrupt")]
    CorruptKey(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Seal(#[from] SealError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Result of a submitted transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Confirmed transaction signature.
    pub signature: Signature,
    /// Lamports actually sent to each recipient, in request order.
    pub amounts: Vec<u64>,
    /// Scale factor applied to fit the callable balance (1.0 = none).
    pub scale: f64,
}

/// The vault. Exclusive owner of all intermediate wallet secrets.
pub struct WalletVault {
    store: Arc<FsStore>,
    rpc: Arc<dyn ChainRpc>,
    master_key: MasterKey,
    treasury: Option<Keypair>,
}

impl WalletVault {
    pub fn new(
        store: Arc<FsStore>,
        rpc: Arc<dyn ChainRpc>,
        master_key: MasterKey,
        treasury: Option<Keypair>,
    ) -> Self {
        Self {
            store,
            rpc,
            master_key,
            treasury,
        }
    }

    /// Whether a treasury fallback is configured.
    pub fn has_treasury(&self) -> bool {
        self.treasury.is_some()
    }

    /// Generate a fresh single-use wallet and persist its sealed secret.
    pub fn allocate(&self) -> Result<(String, Pubkey), VaultError> {
        let keypair = Keypair::new();
        let pubkey = keypair.pubkey();
        let wallet_id = uuid::Uuid::new_v4().to_string();

        let sealed = self.master_key.seal(&keypair.to_bytes())?;
        let metadata = WalletMetadata {
            wallet_id: wallet_id.clone(),
            public_key: pubkey.to_string(),
            created_at: Utc::now(),
            used_at: None,
            active: true,
        };
        WalletRepository::new(&self.store).create(&metadata, &sealed)?;

        debug!(wallet_id = %wallet_id, public_key = %pubkey, "allocated wallet");
        Ok((wallet_id, pubkey))
    }

    /// Look up a wallet's public key.
    pub fn pubkey_of(&self, wallet_id: &str) -> Result<Pubkey, VaultError> {
        let meta = WalletRepository::new(&self.store).get(wallet_id)?;
        meta.public_key
            .parse()
            .map_err(|_| VaultError::CorruptKey(wallet_id.to_string()))
    }

    /// Fetch wallet metadata.
    pub fn metadata(&self, wallet_id: &str) -> Result<WalletMetadata, VaultError> {
        Ok(WalletRepository::new(&self.store).get(wallet_id)?)
    }

    /// Live lamport balance for any account (never cached).
    pub async fn balance(&self, pubkey: &Pubkey) -> Result<u64, VaultError> {
        Ok(self.rpc.balance(pubkey).await?)
    }

    /// Lamports every sending wallet must retain: network fee reserve
    /// plus the rent-exempt minimum for a zero-data account.
    pub async fn reserve(&self) -> Result<u64, VaultError> {
        let rent = self.rpc.rent_exempt_minimum(0).await?;
        Ok(FEE_RESERVE_LAMPORTS + rent)
    }

    /// `max(0, balance - reserve)` for a wallet's account.
    pub async fn payable_balance(&self, pubkey: &Pubkey) -> Result<u64, VaultError> {
        let balance = self.rpc.balance(pubkey).await?;
        let reserve = self.reserve().await?;
        Ok(balance.saturating_sub(reserve))
    }

    /// Retire a wallet. The vault will never sign with it again.
    pub fn mark_used(&self, wallet_id: &str) -> Result<(), VaultError> {
        WalletRepository::new(&self.store).mark_used(wallet_id, Utc::now())?;
        Ok(())
    }

    /// Build and sign a transfer with one system-transfer instruction per
    /// recipient, fee-payer = the wallet itself.
    ///
    /// The unsealed secret lives in a zeroizing buffer for the duration
    /// of the call. Refuses to sign for a retired wallet.
    pub fn sign_transfer(
        &self,
        wallet_id: &str,
        recipients: &[(Pubkey, u64)],
        recent_blockhash: Hash,
    ) -> Result<Transaction, VaultError> {
        let repo = WalletRepository::new(&self.store);
        let meta = repo.get(wallet_id)?;
        if !meta.active {
            return Err(VaultError::WalletInactive(wallet_id.to_string()));
        }

        let secret = self.master_key.open(&repo.read_sealed_key(wallet_id)?)?;
        let keypair = Keypair::from_bytes(&secret)
            .map_err(|_| VaultError::CorruptKey(wallet_id.to_string()))?;
        drop(secret);

        let from = keypair.pubkey();
        let instructions: Vec<_> = recipients
            .iter()
            .map(|(to, lamports)| system_instruction::transfer(&from, to, *lamports))
            .collect();

        Ok(Transaction::new_signed_with_payer(
            &instructions,
            Some(&from),
            &[&keypair],
            recent_blockhash,
        ))
    }

    /// Submit a signed transaction and await confirmation.
    pub async fn submit_and_confirm(&self, tx: &Transaction) -> Result<Signature, VaultError> {
        Ok(self.rpc.send_and_confirm(tx).await?)
    }

    /// Transfer the requested amounts from a vault wallet.
    ///
    /// Applies the reservation contract: a single-recipient request above
    /// the callable amount fails; a multi-recipient request is scaled
    /// uniformly to fit, preserving split ratios.
    pub async fn transfer(
        &self,
        wallet_id: &str,
        recipients: &[(Pubkey, u64)],
    ) -> Result<TransferOutcome, VaultError> {
        let from = self.pubkey_of(wallet_id)?;
        let callable = self.payable_balance(&from).await?;
        let requested: u64 = recipients.iter().map(|(_, v)| v).sum();

        if requested == 0 || callable == 0 {
            return Err(VaultError::InsufficientFunds {
                requested,
                callable,
            });
        }

        let (amounts, scale) = if requested <= callable {
            (recipients.iter().map(|(_, v)| *v).collect::<Vec<_>>(), 1.0)
        } else if recipients.len() == 1 {
            return Err(VaultError::InsufficientFunds {
                requested,
                callable,
            });
        } else {
            let scaled: Vec<u64> = recipients
                .iter()
                .map(|(_, v)| ((*v as u128 * callable as u128) / requested as u128) as u64)
                .collect();
            (scaled, callable as f64 / requested as f64)
        };

        let plan: Vec<(Pubkey, u64)> = recipients
            .iter()
            .zip(&amounts)
            .map(|((to, _), v)| (*to, *v))
            .collect();

        let blockhash = self.rpc.latest_blockhash().await?;
        let tx = self.sign_transfer(wallet_id, &plan, blockhash)?;
        let signature = self.rpc.send_and_confirm(&tx).await?;

        debug!(
            wallet_id = %wallet_id,
            signature = %signature,
            recipients = recipients.len(),
            scale,
            "transfer confirmed"
        );
        Ok(TransferOutcome {
            signature,
            amounts,
            scale,
        })
    }

    /// Transfer a wallet's full payable balance to a single recipient.
    pub async fn transfer_payable(
        &self,
        wallet_id: &str,
        to: &Pubkey,
    ) -> Result<(Signature, u64), VaultError> {
        let from = self.pubkey_of(wallet_id)?;
        let callable = self.payable_balance(&from).await?;
        if callable == 0 {
            return Err(VaultError::InsufficientFunds {
                requested: 0,
                callable,
            });
        }
        let outcome = self.transfer(wallet_id, &[(*to, callable)]).await?;
        Ok((outcome.signature, callable))
    }

    /// Fund a freshly allocated wallet's reserve from the treasury.
    ///
    /// Only available when a treasury keypair was configured; callers
    /// fall back here when the in-flight funds cannot cover priming.
    pub async fn prime_from_treasury(
        &self,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, VaultError> {
        let treasury = self.treasury.as_ref().ok_or(VaultError::InsufficientFunds {
            requested: lamports,
            callable: 0,
        })?;

        let blockhash = self.rpc.latest_blockhash().await?;
        let ix = system_instruction::transfer(&treasury.pubkey(), to, lamports);
        let tx = Transaction::new_signed_with_payer(
            &[ix],
            Some(&treasury.pubkey()),
            &[treasury],
            blockhash,
        );
        Ok(self.rpc.send_and_confirm(&tx).await?)
    }
}
