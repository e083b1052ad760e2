// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, the runtime config struct loaded at
//! startup, and the immutable mixing constants that feed the config hash.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for wallet storage and the registry | `/data` |
//! | `HOST` | Server bind address | `127.0.0.1` |
//! | `PORT` | Server bind port | `8080` |
//! | `SOLANA_RPC_URL` | Solana JSON-RPC endpoint | network default |
//! | `SOLANA_NETWORK` | `mainnet`, `devnet` or `testnet` | `devnet` |
//! | `MASTER_KEY` | Vault master key, 64 hex chars (256 bits) | Required |
//! | `TREASURY_SECRET_KEY` | Optional treasury keypair, base58 (32 or 64 bytes) | None |
//! | `RELAYER_FEE_WALLET` | Optional fee recipient pubkey, base58 | None |
//! | `PRIVACY_MODE` | `standard` (multi-hop) or `enhanced` (full mixing) | `enhanced` |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated allowed origins | permissive |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use serde::Serialize;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;

/// Environment variable name for the storage root directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the vault master key (64 hex chars).
pub const MASTER_KEY_ENV: &str = "MASTER_KEY";

/// Environment variable name for the Solana RPC endpoint override.
pub const RPC_URL_ENV: &str = "SOLANA_RPC_URL";

/// Environment variable name for the network selector.
pub const NETWORK_ENV: &str = "SOLANA_NETWORK";

/// Environment variable name for the optional treasury secret key (base58).
pub const TREASURY_KEY_ENV: &str = "TREASURY_SECRET_KEY";

/// Environment variable name for the optional relayer fee wallet (base58 pubkey).
pub const FEE_WALLET_ENV: &str = "RELAYER_FEE_WALLET";

/// Environment variable name for the privacy strategy selector.
pub const PRIVACY_MODE_ENV: &str = "PRIVACY_MODE";

// =============================================================================
// Immutable Mixing Constants
// =============================================================================

/// Immutable protocol constants.
///
/// These never change without a redeploy; [`config_hash`] commits to
/// every value so an auditor can verify the deployed policy.
pub mod constants {
    /// Lamports per SOL.
    pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

    /// Relayer fee, as a fraction of the swap amount (0.05%).
    pub const RELAYER_FEE_PCT: f64 = 0.0005;

    /// Deposit fee (none).
    pub const DEPOSIT_FEE_PCT: f64 = 0.0;

    /// Minimum swap amount: 0.03 SOL.
    pub const MIN_SWAP_LAMPORTS: u64 = 30_000_000;

    /// Maximum number of notes a swap is split into.
    pub const MAX_NOTES: usize = 8;

    /// Default note count (mid-band).
    pub const DEFAULT_NOTES: usize = 6;

    /// Minimum number of notes when splitting at all.
    pub const MIN_NOTES: usize = 2;

    /// Wall-clock mixing window width, seconds.
    pub const MIXING_WINDOW_SECS: i64 = 60;

    /// Minimum value of a single note: 0.01 SOL.
    pub const MIN_SPLIT_LAMPORTS: u64 = 10_000_000;

    /// Amount obfuscation range R: 0.001 SOL. Jitter is uniform in [-R, +R].
    pub const OBFUSCATION_RANGE_LAMPORTS: u64 = 1_000_000;

    /// Floor for an obfuscated note amount: 0.0001 SOL.
    pub const OBFUSCATION_FLOOR_LAMPORTS: u64 = 100_000;

    /// Deposits that must follow a swap before recovery unlocks.
    pub const RECOVERY_THRESHOLD: u64 = 50;

    /// Inactivity timeout before recovery unlocks (150 slots x 0.4 s).
    pub const RECOVERY_TIMEOUT_SECS: i64 = 60;

    /// Network fee reserve retained in every sending wallet: 0.0001 SOL.
    pub const FEE_RESERVE_LAMPORTS: u64 = 100_000;

    /// Compute the relayer fee for a swap amount, in lamports.
    pub fn relayer_fee(amount: u64) -> u64 {
        ((amount as f64) * RELAYER_FEE_PCT).round() as u64
    }
}

/// Canonical serialization of the immutable constants.
///
/// Field order is fixed; the config hash is a digest of this exact JSON.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImmutableConstants {
    pub relayer_fee_pct: f64,
    pub deposit_fee_pct: f64,
    pub min_swap_lamports: u64,
    pub max_swap_lamports: Option<u64>,
    pub max_notes: usize,
    pub default_notes: usize,
    pub min_notes: usize,
    pub mixing_window_secs: i64,
    pub min_split_lamports: u64,
    pub obfuscation_range_lamports: u64,
    pub recovery_threshold: u64,
    pub recovery_timeout_secs: i64,
    pub fee_reserve_lamports: u64,
}

impl ImmutableConstants {
    pub fn current() -> Self {
        use constants::*;
        Self {
            relayer_fee_pct: RELAYER_FEE_PCT,
            deposit_fee_pct: DEPOSIT_FEE_PCT,
            min_swap_lamports: MIN_SWAP_LAMPORTS,
            max_swap_lamports: None,
            max_notes: MAX_NOTES,
            default_notes: DEFAULT_NOTES,
            min_notes: MIN_NOTES,
            mixing_window_secs: MIXING_WINDOW_SECS,
            min_split_lamports: MIN_SPLIT_LAMPORTS,
            obfuscation_range_lamports: OBFUSCATION_RANGE_LAMPORTS,
            recovery_threshold: RECOVERY_THRESHOLD,
            recovery_timeout_secs: RECOVERY_TIMEOUT_SECS,
            fee_reserve_lamports: FEE_RESERVE_LAMPORTS,
        }
    }
}

/// SHA-256 over the canonical constants encoding, hex-encoded.
///
/// A pure function of the constants above: it changes iff a constant does.
pub fn config_hash() -> String {
    let canonical = serde_json::to_vec(&ImmutableConstants::current())
        .expect("constants serialize infallibly");
    hex::encode(Sha256::digest(&canonical))
}

// =============================================================================
// Privacy Mode
// =============================================================================

/// Which strategy profile the coordinator runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyMode {
    /// Basic multi-hop relay: no withdraw stage, no amount obfuscation.
    Standard,
    /// Full mixing pipeline: split, withdraw, obfuscation, merge, hops.
    Enhanced,
}

impl PrivacyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyMode::Standard => "standard",
            PrivacyMode::Enhanced => "enhanced",
        }
    }
}

impl std::str::FromStr for PrivacyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(PrivacyMode::Standard),
            "enhanced" => Ok(PrivacyMode::Enhanced),
            other => Err(ConfigError::Invalid {
                var: PRIVACY_MODE_ENV,
                reason: format!("unknown privacy mode `{other}`"),
            }),
        }
    }
}

// =============================================================================
// Runtime Config
// =============================================================================

/// Errors raised while loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is required")]
    Missing { var: &'static str },

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Runtime configuration, loaded once at startup.
pub struct RelayerConfig {
    /// Storage root for wallet files and the registry database.
    pub data_dir: std::path::PathBuf,
    /// Network identifier (`mainnet`, `devnet`, `testnet`).
    pub network: String,
    /// RPC endpoint the chain client connects to.
    pub rpc_url: String,
    /// Vault master key bytes (moved into the vault at construction).
    pub master_key: [u8; 32],
    /// Optional treasury keypair for priming freshly allocated wallets.
    pub treasury: Option<Keypair>,
    /// Optional relayer fee recipient.
    pub fee_wallet: Option<Pubkey>,
    /// Strategy profile selector.
    pub privacy_mode: PrivacyMode,
}

impl RelayerConfig {
    /// Load configuration from the process environment.
    ///
    /// Malformed key material aborts startup here rather than failing at
    /// first use.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = std::env::var(DATA_DIR_ENV)
            .unwrap_or_else(|_| "/data".to_string())
            .into();

        let network = std::env::var(NETWORK_ENV).unwrap_or_else(|_| "devnet".to_string());
        let rpc_url = std::env::var(RPC_URL_ENV)
            .unwrap_or_else(|_| crate::chain::default_rpc_url(&network).to_string());

        let master_hex = std::env::var(MASTER_KEY_ENV)
            .map_err(|_| ConfigError::Missing { var: MASTER_KEY_ENV })?;
        let master_key = parse_master_key(&master_hex)?;

        let treasury = match std::env::var(TREASURY_KEY_ENV) {
            Ok(raw) => Some(parse_treasury_key(&raw)?),
            Err(_) => None,
        };

        let fee_wallet = match std::env::var(FEE_WALLET_ENV) {
            Ok(raw) => Some(raw.parse::<Pubkey>().map_err(|e| ConfigError::Invalid {
                var: FEE_WALLET_ENV,
                reason: e.to_string(),
            })?),
            Err(_) => None,
        };

        let privacy_mode = match std::env::var(PRIVACY_MODE_ENV) {
            Ok(raw) => raw.parse()?,
            Err(_) => PrivacyMode::Enhanced,
        };

        Ok(Self {
            data_dir,
            network,
            rpc_url,
            master_key,
            treasury,
            fee_wallet,
            privacy_mode,
        })
    }
}

/// Parse the 64-hex-char master key into its 32 raw bytes.
fn parse_master_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(raw.trim()).map_err(|e| ConfigError::Invalid {
        var: MASTER_KEY_ENV,
        reason: e.to_string(),
    })?;
    bytes.try_into().map_err(|_| ConfigError::Invalid {
        var: MASTER_KEY_ENV,
        reason: "expected 64 hex chars (32 bytes)".to_string(),
    })
}

/// Parse a base58 treasury secret: either a 64-byte keypair or a 32-byte seed.
fn parse_treasury_key(raw: &str) -> Result<Keypair, ConfigError> {
    let bytes = bs58::decode(raw.trim())
        .into_vec()
        .map_err(|e| ConfigError::Invalid {
            var: TREASURY_KEY_ENV,
            reason: e.to_string(),
        })?;
    match bytes.len() {
        64 => Keypair::from_bytes(&bytes).map_err(|e| ConfigError::Invalid {
            var: TREASURY_KEY_ENV,
            reason: e.to_string(),
        }),
        32 => solana_sdk::signer::keypair::keypair_from_seed(&bytes).map_err(|e| {
            ConfigError::Invalid {
                var: TREASURY_KEY_ENV,
                reason: e.to_string(),
            }
        }),
        n => Err(ConfigError::Invalid {
            var: TREASURY_KEY_ENV,
            reason: format!("expected 32 or 64 bytes, got {n}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_hash_is_stable() {
        assert_eq!(config_hash(), config_hash());
        assert_eq!(config_hash().len(), 64);
    }

    #[test]
    fn config_hash_tracks_constants() {
        let mut altered = ImmutableConstants::current();
        altered.recovery_threshold += 1;
        let canonical = serde_json::to_vec(&altered).unwrap();
        let altered_hash = hex::encode(Sha256::digest(&canonical));
        assert_ne!(altered_hash, config_hash());
    }

    #[test]
    fn relayer_fee_is_five_basis_points_of_a_percent() {
        // 0.05 SOL -> 0.000025 SOL
        assert_eq!(constants::relayer_fee(50_000_000), 25_000);
        // 1 SOL -> 0.0005 SOL
        assert_eq!(constants::relayer_fee(1_000_000_000), 500_000);
    }

    #[test]
    fn master_key_must_be_32_bytes() {
        assert!(parse_master_key(&"ab".repeat(32)).is_ok());
        assert!(parse_master_key("abcd").is_err());
        assert!(parse_master_key("zz").is_err());
    }

    #[test]
    fn treasury_key_accepts_seed_and_keypair() {
        let seed = bs58::encode([7u8; 32]).into_string();
        assert!(parse_treasury_key(&seed).is_ok());

        let kp = Keypair::new();
        let full = bs58::encode(kp.to_bytes()).into_string();
        let parsed = parse_treasury_key(&full).unwrap();
        assert_eq!(parsed.to_bytes(), kp.to_bytes());

        let short = bs58::encode([1u8; 16]).into_string();
        assert!(parse_treasury_key(&short).is_err());
    }

    #[test]
    fn privacy_mode_parses() {
        assert_eq!("standard".parse::<PrivacyMode>().unwrap(), PrivacyMode::Standard);
        assert_eq!("Enhanced".parse::<PrivacyMode>().unwrap(), PrivacyMode::Enhanced);
        assert!("turbo".parse::<PrivacyMode>().is_err());
    }
}
