//! Liquidator wallet loading.
//!
//! The keypair comes from `KEYPAIR_PATH` (a Solana CLI keypair file) or from
//! `PRIV_KEY` (the 64 secret key bytes, comma separated).

use anyhow::{bail, Context, Result};
use solana_sdk::signature::{read_keypair_file, Keypair};
use solana_sdk::signer::Signer;
use tracing::info;

pub const KEYPAIR_PATH: &str = "KEYPAIR_PATH";
pub const PRIV_KEY: &str = "PRIV_KEY";

/// Load the wallet from the environment.
pub fn load_keypair() -> Result<Keypair> {
    let keypair = if let Ok(path) = std::env::var(KEYPAIR_PATH) {
        read_keypair_file(&path).map_err(|e| anyhow::anyhow!("reading keypair {path}: {e}"))?
    } else if let Ok(raw) = std::env::var(PRIV_KEY) {
        keypair_from_csv(&raw)?
    } else {
        bail!("Missing env var: set {KEYPAIR_PATH} or {PRIV_KEY}");
    };
    info!(wallet = %keypair.pubkey(), "Wallet loaded");
    Ok(keypair)
}

/// Parse `"12,34,..."` into a keypair.
pub fn keypair_from_csv(raw: &str) -> Result<Keypair> {
    let bytes = raw
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|b| b.trim().parse::<u8>().with_context(|| format!("invalid key byte {b:?}")))
        .collect::<Result<Vec<u8>>>()?;
    if bytes.len() != 64 {
        bail!("secret key must be 64 bytes, got {}", bytes.len());
    }
    Keypair::from_bytes(&bytes).map_err(|e| anyhow::anyhow!("invalid secret key: {e}"))
}
