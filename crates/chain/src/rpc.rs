//! Ledger reads over Solana JSON-RPC and account subscriptions over the
//! websocket pubsub endpoint.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::channel::mpsc::unbounded;
use futures::stream::BoxStream;
use futures::StreamExt;
use liquidator_core::{Ledger, NetworkConfig, TokenHolding};
use solana_account_decoder::{UiAccountData, UiAccountEncoding};
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::RpcFilterType;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub fn commitment(level: &str) -> Result<CommitmentConfig> {
    CommitmentConfig::from_str(level).map_err(|e| anyhow::anyhow!("invalid commitment {level}: {e}"))
}

/// [`Ledger`] backed by an RPC node.
pub struct RpcLedger {
    rpc: Arc<RpcClient>,
    ws_url: String,
    commitment: CommitmentConfig,
    /// Connected on first subscription and shared by every subscription.
    pubsub: OnceCell<Arc<PubsubClient>>,
}

impl RpcLedger {
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let commitment = commitment(&network.commitment)?;
        info!(rpc = %network.rpc_url, ws = %network.ws_url, "Initializing RPC ledger");
        Ok(Self {
            rpc: Arc::new(RpcClient::new_with_commitment(network.rpc_url.clone(), commitment)),
            ws_url: network.ws_url.clone(),
            commitment,
            pubsub: OnceCell::new(),
        })
    }

    pub fn rpc(&self) -> Arc<RpcClient> {
        Arc::clone(&self.rpc)
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    fn account_config(&self) -> RpcAccountInfoConfig {
        RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            commitment: Some(self.commitment),
            ..Default::default()
        }
    }

    async fn pubsub(&self) -> Result<Arc<PubsubClient>> {
        let client = self
            .pubsub
            .get_or_try_init(|| async {
                let client = PubsubClient::new(&self.ws_url)
                    .await
                    .with_context(|| format!("connecting to {}", self.ws_url))?;
                info!(ws = %self.ws_url, "Pubsub connected");
                Ok::<_, anyhow::Error>(Arc::new(client))
            })
            .await?;
        Ok(Arc::clone(client))
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn program_accounts(&self, program: &Pubkey, data_size: u64) -> Result<Vec<(Pubkey, Vec<u8>)>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::DataSize(data_size)]),
            account_config: self.account_config(),
            ..Default::default()
        };
        let accounts = self
            .rpc
            .get_program_accounts_with_config(program, config)
            .await
            .with_context(|| format!("getProgramAccounts {program} size {data_size}"))?;
        debug!(%program, data_size, count = accounts.len(), "Fetched program accounts");
        Ok(accounts.into_iter().map(|(key, account)| (key, account.data)).collect())
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .await
            .with_context(|| format!("getAccountInfo {address}"))?;
        Ok(response.value.map(|account| account.data))
    }

    async fn slot(&self) -> Result<u64> {
        Ok(self.rpc.get_slot().await?)
    }

    async fn token_balance(&self, token_account: &Pubkey) -> Result<u64> {
        let balance = self
            .rpc
            .get_token_account_balance(token_account)
            .await
            .with_context(|| format!("getTokenAccountBalance {token_account}"))?;
        balance
            .amount
            .parse()
            .with_context(|| format!("token amount {:?}", balance.amount))
    }

    async fn token_holdings(&self, owner: &Pubkey) -> Result<Vec<TokenHolding>> {
        let accounts = self
            .rpc
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(spl_token::id()))
            .await
            .with_context(|| format!("getTokenAccountsByOwner {owner}"))?;

        let mut holdings = Vec::with_capacity(accounts.len());
        for keyed in accounts {
            match parse_holding(&keyed.pubkey, &keyed.account.data) {
                Some(holding) => holdings.push(holding),
                None => warn!(account = %keyed.pubkey, "Unparsable token account"),
            }
        }
        Ok(holdings)
    }

    async fn subscribe(&self, address: &Pubkey) -> Result<BoxStream<'static, Vec<u8>>> {
        let pubsub = self.pubsub().await?;
        let (tx, rx) = unbounded();
        let address = *address;
        let config = self.account_config();

        tokio::spawn(async move {
            let (mut updates, unsubscribe) = match pubsub.account_subscribe(&address, Some(config)).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    warn!(%address, error = %e, "Account subscription failed");
                    return;
                }
            };
            while let Some(update) = updates.next().await {
                let Some(data) = update.value.data.decode() else {
                    warn!(%address, "Undecodable account notification");
                    continue;
                };
                if tx.unbounded_send(data).is_err() {
                    break;
                }
            }
            unsubscribe().await;
            debug!(%address, "Account subscription closed");
        });

        Ok(rx.boxed())
    }
}

/// Mint and raw amount of a `jsonParsed` SPL token account.
fn parse_holding(account: &str, data: &UiAccountData) -> Option<TokenHolding> {
    let UiAccountData::Json(parsed) = data else {
        return None;
    };
    let info = parsed.parsed.get("info")?;
    let mint = info.get("mint")?.as_str()?;
    let amount = info.get("tokenAmount")?.get("amount")?.as_str()?;
    Some(TokenHolding {
        account: Pubkey::from_str(account).ok()?,
        mint: Pubkey::from_str(mint).ok()?,
        amount: amount.parse().ok()?,
    })
}
