//! Cluster endpoints and exchange program addresses.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Seed of the exchange authority PDA.
pub const EXCHANGE_AUTHORITY_SEED: &[u8] = b"Synthetify";
/// Seed of the global state PDA.
pub const STATE_SEED: &[u8] = b"statev1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// HTTP RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// WebSocket endpoint for account subscriptions
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Exchange program id (base58)
    #[serde(default = "default_exchange_program")]
    pub exchange_program: String,

    /// processed | confirmed | finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}
fn default_ws_url() -> String {
    "wss://api.mainnet-beta.solana.com".to_string()
}
fn default_exchange_program() -> String {
    "5TeGDBaMNPc2uxvx6YLDycsoxFnBuqierPt3a8Bk4xFX".to_string()
}
fn default_commitment() -> String {
    "confirmed".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            ws_url: default_ws_url(),
            exchange_program: default_exchange_program(),
            commitment: default_commitment(),
        }
    }
}

impl NetworkConfig {
    pub fn devnet() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            ws_url: "wss://api.devnet.solana.com".to_string(),
            ..Default::default()
        }
    }

    pub fn exchange_program_id(&self) -> anyhow::Result<Pubkey> {
        Pubkey::from_str(&self.exchange_program)
            .map_err(|e| anyhow::anyhow!("invalid exchange program {}: {e}", self.exchange_program))
    }

    /// Expand `${VAR}` references in the endpoint strings.
    pub fn expand_env_vars(&mut self) {
        self.rpc_url = expand_env(&self.rpc_url);
        self.ws_url = expand_env(&self.ws_url);
        self.exchange_program = expand_env(&self.exchange_program);
    }
}

/// Protocol PDAs derived from the exchange program id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolAddresses {
    pub program: Pubkey,
    pub state: Pubkey,
    pub exchange_authority: Pubkey,
}

impl ProtocolAddresses {
    pub fn derive(program: Pubkey) -> Self {
        let (state, _) = Pubkey::find_program_address(&[STATE_SEED], &program);
        let (exchange_authority, _) =
            Pubkey::find_program_address(&[EXCHANGE_AUTHORITY_SEED], &program);
        Self {
            program,
            state,
            exchange_authority,
        }
    }

    /// Exchange account PDA of a staking user.
    pub fn exchange_account(&self, owner: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"accountv1", owner.as_ref()], &self.program).0
    }

    pub fn vault(&self, synthetic: &Pubkey, collateral: &Pubkey, vault_type: u8) -> Pubkey {
        Pubkey::find_program_address(
            &[b"vaultv1", synthetic.as_ref(), collateral.as_ref(), &[vault_type]],
            &self.program,
        )
        .0
    }

    pub fn vault_entry(&self, owner: &Pubkey, vault: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[b"vault_entryv1", owner.as_ref(), vault.as_ref()],
            &self.program,
        )
        .0
    }
}

/// Expand ${VAR_NAME} patterns with environment variable values.
/// Unset variables are left as written.
fn expand_env(s: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return s.to_string();
    };
    re.replace_all(s, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
