// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secret sealing for wallet keys.
//!
//! Wallet secrets rest on disk under AES-256-GCM with a process-wide
//! master key. Record layout: `nonce(12) || tag(16) || ct`. A fresh
//! 96-bit nonce is drawn per record from the OS RNG.
//!
//! The master key lives in a single allocation and is wiped on drop;
//! unsealed plaintext is handed out in a [`Zeroizing`] buffer so it is
//! wiped as soon as the signer releases it.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Nonce length in bytes (96 bits).
const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Errors from sealing/unsealing.
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed (wrong key or tampered record)")]
    Decrypt,

    #[error("sealed record too short")]
    Malformed,
}

/// Process-wide master key, zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; 32],
}

impl MasterKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.bytes))
    }

    /// Seal a secret: `nonce(12) || tag(16) || ct`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // aes-gcm appends the tag to the ciphertext; the record format
        // carries it up front instead.
        let ct_and_tag = self
            .cipher()
            .encrypt(nonce, plaintext)
            .map_err(|_| SealError::Encrypt)?;
        let (body, tag) = ct_and_tag.split_at(ct_and_tag.len() - TAG_LEN);

        let mut sealed = Vec::with_capacity(NONCE_LEN + TAG_LEN + body.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(tag);
        sealed.extend_from_slice(body);
        Ok(sealed)
    }

    /// Unseal a record produced by [`seal`]. The returned buffer is
    /// zeroed when dropped.
    pub fn open(&self, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, SealError> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(SealError::Malformed);
        }
        let nonce = Nonce::from_slice(&sealed[..NONCE_LEN]);
        let tag = &sealed[NONCE_LEN..NONCE_LEN + TAG_LEN];
        let body = &sealed[NONCE_LEN + TAG_LEN..];

        let mut ct_and_tag = Vec::with_capacity(body.len() + TAG_LEN);
        ct_and_tag.extend_from_slice(body);
        ct_and_tag.extend_from_slice(tag);

        let plaintext = self
            .cipher()
            .decrypt(nonce, ct_and_tag.as_slice())
            .map_err(|_| SealError::Decrypt)?;
        Ok(Zeroizing::new(plaintext))
    }
}
