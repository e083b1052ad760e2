// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Simulated ledger for tests.
//!
//! Applies system-transfer instructions to an in-memory balance table,
//! charging a flat signature fee, so the full mixing pipeline can run
//! without a validator. Only system transfers are understood; any other
//! instruction is rejected.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_program;
use solana_sdk::transaction::Transaction;

use super::client::{ChainError, ChainRpc};

/// Flat per-transaction fee charged to the fee payer.
pub const MOCK_TX_FEE: u64 = 5_000;

/// Default rent-exempt minimum for a zero-data account.
pub const MOCK_RENT_EXEMPT_MIN: u64 = 890_880;

struct Ledger {
    balances: HashMap<Pubkey, u64>,
    confirmed: HashSet<Signature>,
    fail_sends: bool,
}

/// In-memory chain double.
pub struct MockChain {
    inner: Mutex<Ledger>,
    rent_exempt_min: u64,
}

impl MockChain {
    pub fn new() -> Self {
        Self::with_rent(MOCK_RENT_EXEMPT_MIN)
    }

    /// Build a mock with a specific rent-exempt minimum (0 simplifies
    /// arithmetic-focused tests).
    pub fn with_rent(rent_exempt_min: u64) -> Self {
        Self {
            inner: Mutex::new(Ledger {
                balances: HashMap::new(),
                confirmed: HashSet::new(),
                fail_sends: false,
            }),
            rent_exempt_min,
        }
    }

    /// Credit an account out of thin air.
    pub fn airdrop(&self, pubkey: Pubkey, lamports: u64) {
        let mut inner = self.inner.lock().unwrap();
        *inner.balances.entry(pubkey).or_insert(0) += lamports;
    }

    /// Mark an externally produced signature (the user's deposit) confirmed.
    pub fn confirm_external(&self, signature: Signature) {
        self.inner.lock().unwrap().confirmed.insert(signature);
    }

    /// Make every subsequent send fail with an RPC error.
    pub fn set_fail_sends(&self, fail: bool) {
        self.inner.lock().unwrap().fail_sends = fail;
    }

    /// Synchronous balance lookup for assertions.
    pub fn balance_of(&self, pubkey: &Pubkey) -> u64 {
        *self
            .inner
            .lock()
            .unwrap()
            .balances
            .get(pubkey)
            .unwrap_or(&0)
    }

    /// Number of confirmed transactions the mock has applied or been told about.
    pub fn confirmed_count(&self) -> usize {
        self.inner.lock().unwrap().confirmed.len()
    }
}

/// Decode a system-transfer instruction payload: u32 LE tag `2`, u64 LE lamports.
fn decode_transfer(data: &[u8]) -> Option<u64> {
    if data.len() != 12 {
        return None;
    }
    let tag = u32::from_le_bytes(data[0..4].try_into().ok()?);
    if tag != 2 {
        return None;
    }
    Some(u64::from_le_bytes(data[4..12].try_into().ok()?))
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, ChainError> {
        Ok(self.balance_of(pubkey))
    }

    async fn latest_blockhash(&self) -> Result<Hash, ChainError> {
        Ok(Hash::new_unique())
    }

    async fn send_and_confirm(&self, tx: &Transaction) -> Result<Signature, ChainError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_sends {
            return Err(ChainError::Rpc("simulated RPC outage".to_string()));
        }

        let message = &tx.message;
        let keys = &message.account_keys;
        let fee_payer = *keys.first().ok_or_else(|| {
            ChainError::Rpc("transaction has no accounts".to_string())
        })?;

        // Collect debits/credits, then validate before applying.
        let mut debits: HashMap<Pubkey, u64> = HashMap::new();
        let mut credits: HashMap<Pubkey, u64> = HashMap::new();
        *debits.entry(fee_payer).or_insert(0) += MOCK_TX_FEE;

        for ix in &message.instructions {
            let program = keys[ix.program_id_index as usize];
            if program != system_program::id() {
                return Err(ChainError::Rpc(format!(
                    "unsupported program in mock: {program}"
                )));
            }
            let lamports = decode_transfer(&ix.data)
                .ok_or_else(|| ChainError::Rpc("not a system transfer".to_string()))?;
            let from = keys[ix.accounts[0] as usize];
            let to = keys[ix.accounts[1] as usize];
            *debits.entry(from).or_insert(0) += lamports;
            *credits.entry(to).or_insert(0) += lamports;
        }

        for (account, debit) in &debits {
            let available = *inner.balances.get(account).unwrap_or(&0);
            if available < *debit {
                return Err(ChainError::Rpc(format!(
                    "insufficient lamports: {account} has {available}, needs {debit}"
                )));
            }
        }

        for (account, debit) in debits {
            *inner.balances.get_mut(&account).unwrap() -= debit;
        }
        for (account, credit) in credits {
            *inner.balances.entry(account).or_insert(0) += credit;
        }

        let signature = tx.signatures[0];
        inner.confirmed.insert(signature);
        Ok(signature)
    }

    async fn is_confirmed(&self, signature: &Signature) -> Result<bool, ChainError> {
        Ok(self.inner.lock().unwrap().confirmed.contains(signature))
    }

    async fn rent_exempt_minimum(&self, _data_len: usize) -> Result<u64, ChainError> {
        Ok(self.rent_exempt_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::{Keypair, Signer};
    use solana_sdk::system_instruction;

    #[tokio::test]
    async fn transfer_moves_lamports_and_charges_fee() {
        let chain = MockChain::with_rent(0);
        let from = Keypair::new();
        let to = Keypair::new().pubkey();
        chain.airdrop(from.pubkey(), 1_000_000);

        let ix = system_instruction::transfer(&from.pubkey(), &to, 400_000);
        let blockhash = chain.latest_blockhash().await.unwrap();
        let tx = Transaction::new_signed_with_payer(
            &[ix],
            Some(&from.pubkey()),
            &[&from],
            blockhash,
        );
        let sig = chain.send_and_confirm(&tx).await.unwrap();

        assert!(chain.is_confirmed(&sig).await.unwrap());
        assert_eq!(chain.balance_of(&to), 400_000);
        assert_eq!(chain.balance_of(&from.pubkey()), 600_000 - MOCK_TX_FEE);
    }

    #[tokio::test]
    async fn overdraw_is_rejected_without_side_effects() {
        let chain = MockChain::with_rent(0);
        let from = Keypair::new();
        let to = Keypair::new().pubkey();
        chain.airdrop(from.pubkey(), 100_000);

        let ix = system_instruction::transfer(&from.pubkey(), &to, 200_000);
        let blockhash = chain.latest_blockhash().await.unwrap();
        let tx = Transaction::new_signed_with_payer(
            &[ix],
            Some(&from.pubkey()),
            &[&from],
            blockhash,
        );
        assert!(chain.send_and_confirm(&tx).await.is_err());
        assert_eq!(chain.balance_of(&from.pubkey()), 100_000);
        assert_eq!(chain.balance_of(&to), 0);
    }
}
