//! Jupiter swap aggregator client (quote + swap transaction).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};

/// Error codes Jupiter returns when a pair simply has no route.
const NO_ROUTE_CODES: &[&str] = &["COULD_NOT_FIND_ANY_ROUTE", "NO_ROUTES_FOUND", "TOKEN_NOT_TRADABLE"];

/// Jupiter quote API client.
#[derive(Debug, Clone)]
pub struct JupiterClient {
    client: reqwest::Client,
    base_url: String,
}

impl JupiterClient {
    /// Create a client against `base_url` (e.g. `https://quote-api.jup.ag/v6`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Best route for swapping `amount` raw units of `input_mint` into
    /// `output_mint`. `None` when Jupiter has no route for the pair.
    #[instrument(skip(self))]
    pub async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Option<QuoteResponse>> {
        let url = format!("{}/quote", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("inputMint", input_mint.to_string()),
                ("outputMint", output_mint.to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", slippage_bps.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            if is_no_route(&body) {
                debug!(%status, "No route");
                return Ok(None);
            }
            anyhow::bail!("Jupiter quote error: {} - {}", status, body);
        }

        let quote: QuoteResponse =
            serde_json::from_str(&body).context("decoding Jupiter quote")?;
        debug!(
            out_amount = %quote.out_amount,
            price_impact = %quote.price_impact_pct,
            "Got quote"
        );
        Ok(Some(quote))
    }

    /// Serialized transaction executing `quote` for `user`.
    #[instrument(skip(self, quote), fields(input = %quote.input_mint))]
    pub async fn swap(&self, quote: &QuoteResponse, user: &str) -> Result<SwapResponse> {
        let url = format!("{}/swap", self.base_url);
        let request = SwapRequest {
            quote_response: quote,
            user_public_key: user,
            wrap_and_unwrap_sol: true,
        };
        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Jupiter swap error: {} - {}", status, body);
        }

        let swap: SwapResponse = response.json().await.context("decoding Jupiter swap")?;
        Ok(swap)
    }
}

fn is_no_route(body: &str) -> bool {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error_code)
        .is_some_and(|code| NO_ROUTE_CODES.contains(&code.as_str()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error_code: Option<String>,
}

/// Quote as returned by `/quote`. Unknown fields are kept so the quote can be
/// posted back to `/swap` unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub input_mint: String,
    pub in_amount: String,
    pub output_mint: String,
    pub out_amount: String,
    #[serde(default)]
    pub price_impact_pct: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QuoteResponse {
    pub fn in_amount(&self) -> Result<u64> {
        self.in_amount
            .parse()
            .with_context(|| format!("invalid inAmount {:?}", self.in_amount))
    }

    pub fn out_amount(&self) -> Result<u64> {
        self.out_amount
            .parse()
            .with_context(|| format!("invalid outAmount {:?}", self.out_amount))
    }

    /// Price impact as a fraction (0.01 = 1 %). Empty counts as none.
    pub fn price_impact(&self) -> Result<f64> {
        if self.price_impact_pct.is_empty() {
            return Ok(0.0);
        }
        self.price_impact_pct
            .parse()
            .with_context(|| format!("invalid priceImpactPct {:?}", self.price_impact_pct))
    }

    /// The quote as raw JSON.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequest<'a> {
    quote_response: &'a QuoteResponse,
    user_public_key: &'a str,
    wrap_and_unwrap_sol: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponse {
    /// Base64 versioned transaction, unsigned.
    pub swap_transaction: String,
    #[serde(default)]
    pub last_valid_block_height: Option<u64>,
}
