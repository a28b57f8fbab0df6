//! Configuration management with profile support.
//!
//! Provides centralized configuration for all liquidator parameters with
//! support for different profiles (testing, devnet, production).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::network::NetworkConfig;
use crate::decimal::ScaledDecimal;
use crate::math::ACCURACY;

/// Main configuration structure containing all liquidator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Cluster endpoints and program address
    #[serde(default)]
    pub network: NetworkConfig,

    /// Scan scheduling
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Liquidation sizing margins
    #[serde(default)]
    pub liquidation: LiquidationConfig,

    /// Vault interest compounding
    #[serde(default)]
    pub interest: InterestConfig,

    /// Leftover token seller
    #[serde(default)]
    pub seller: SellerConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Scan scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Interval between staking passes; the vault pass runs half an interval later
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Run every pass once and exit
    #[serde(default)]
    pub one_shot: bool,
}

fn default_scan_interval() -> u64 {
    5
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            one_shot: false,
        }
    }
}

impl ScannerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

/// Liquidation sizing margins. Ratios are in basis points so sizing stays in
/// integer arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationConfig {
    /// Shaved off the staking repay amount to absorb debt drift (10 = 0.1%)
    #[serde(default = "default_debt_drift_margin")]
    pub debt_drift_margin_bps: u64,

    /// Haircut on xUSD converted to synthetic when judging affordability
    #[serde(default = "default_affordability_haircut")]
    pub affordability_haircut_bps: u64,

    /// Extra synthetic bought on top of the liquidation amount
    #[serde(default = "default_swap_buffer")]
    pub swap_buffer_bps: u64,

    /// Largest swap value (raw xUSD units) the exchange refuses to trade
    #[serde(default = "default_min_swap_value")]
    pub min_swap_value: u64,

    /// Debt value (raw, 6 decimals) below which a vault entry is repaid in full
    #[serde(default = "default_dust_value")]
    pub dust_value: u64,

    /// Warn at start-up when the xUSD balance (raw) is below this
    #[serde(default = "default_low_balance_warning")]
    pub low_balance_warning: u64,
}

fn default_debt_drift_margin() -> u64 {
    10
}
fn default_affordability_haircut() -> u64 {
    300
}
fn default_swap_buffer() -> u64 {
    200
}
fn default_min_swap_value() -> u64 {
    1_000
}
fn default_dust_value() -> u64 {
    1_000_000
}
fn default_low_balance_warning() -> u64 {
    100_000_000
}

impl Default for LiquidationConfig {
    fn default() -> Self {
        Self {
            debt_drift_margin_bps: default_debt_drift_margin(),
            affordability_haircut_bps: default_affordability_haircut(),
            swap_buffer_bps: default_swap_buffer(),
            min_swap_value: default_min_swap_value(),
            dust_value: default_dust_value(),
            low_balance_warning: default_low_balance_warning(),
        }
    }
}

impl LiquidationConfig {
    /// Dust threshold as a value at [`ACCURACY`].
    pub fn dust(&self) -> ScaledDecimal {
        ScaledDecimal::from_u64(self.dust_value, ACCURACY)
    }
}

/// Vault interest compounding schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestConfig {
    /// Length of one compounding period
    #[serde(default = "default_adjustment_period")]
    pub adjustment_period_secs: u64,

    /// Periods per year used to derive the per-period rate
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: u64,
}

fn default_adjustment_period() -> u64 {
    60
}
fn default_periods_per_year() -> u64 {
    525_600
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self {
            adjustment_period_secs: default_adjustment_period(),
            periods_per_year: default_periods_per_year(),
        }
    }
}

/// Sells stray tokens in the liquidator wallet back into xUSD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_seller_interval")]
    pub interval_secs: u64,

    /// Swap aggregator base URL
    #[serde(default = "default_quote_api")]
    pub quote_api_url: String,

    #[serde(default = "default_slippage")]
    pub slippage_bps: u16,

    /// Minimum xUSD out (raw) for a route to be worth taking
    #[serde(default = "default_min_out")]
    pub min_out_amount: u64,

    /// Maximum accepted price impact, in percent
    #[serde(default = "default_max_price_impact")]
    pub max_price_impact_pct: f64,

    /// Mints never sold
    #[serde(default = "default_skip_mints")]
    pub skip_mints: Vec<String>,
}

fn default_seller_interval() -> u64 {
    60
}
fn default_quote_api() -> String {
    "https://quote-api.jup.ag/v6".to_string()
}
fn default_slippage() -> u16 {
    50
}
fn default_min_out() -> u64 {
    2_000_000
}
fn default_max_price_impact() -> f64 {
    0.5
}
fn default_skip_mints() -> Vec<String> {
    // FTT: no liquid route
    vec!["EzfgjvkSwthhgHaceR3LnKXUoRkP6NUhfghdaHAj1tUv".to_string()]
}

impl Default for SellerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_seller_interval(),
            quote_api_url: default_quote_api(),
            slippage_bps: default_slippage(),
            min_out_amount: default_min_out(),
            max_price_impact_pct: default_max_price_impact(),
            skip_mints: default_skip_mints(),
        }
    }
}

impl SellerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            network: NetworkConfig::default(),
            scanner: ScannerConfig::default(),
            liquidation: LiquidationConfig::default(),
            interest: InterestConfig::default(),
            seller: SellerConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file, expanding `${VAR}` in endpoints.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.network.expand_env_vars();
        Ok(config)
    }

    /// One-shot runs against devnet with the seller off.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            network: NetworkConfig::devnet(),
            scanner: ScannerConfig {
                scan_interval_secs: 2,
                one_shot: true,
            },
            liquidation: LiquidationConfig {
                low_balance_warning: 0,
                ..Default::default()
            },
            interest: InterestConfig::default(),
            seller: SellerConfig::default(),
        }
    }

    /// Continuous scanning against devnet.
    pub fn devnet() -> Self {
        Self {
            profile: "devnet".to_string(),
            network: NetworkConfig::devnet(),
            ..Default::default()
        }
    }

    /// Mainnet scanning with the token seller enabled.
    pub fn production() -> Self {
        Self {
            profile: "production".to_string(),
            network: NetworkConfig::default(),
            scanner: ScannerConfig::default(),
            liquidation: LiquidationConfig::default(),
            interest: InterestConfig::default(),
            seller: SellerConfig {
                enabled: true,
                ..Default::default()
            },
        }
    }

    /// Get profile from environment variable BOT_PROFILE, or default.
    /// Supported values: testing, devnet, production
    pub fn from_env() -> Self {
        let profile = std::env::var("BOT_PROFILE").unwrap_or_else(|_| "default".to_string());
        let mut config = match profile.to_lowercase().as_str() {
            "testing" | "test" => Self::testing(),
            "devnet" | "dev" => Self::devnet(),
            "production" | "prod" => Self::production(),
            _ => Self::default(),
        };
        config.network.expand_env_vars();
        config
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Bot configuration loaded");
        tracing::info!(
            rpc = %self.network.rpc_url,
            ws = %self.network.ws_url,
            program = %self.network.exchange_program,
            commitment = %self.network.commitment,
            "Network"
        );
        tracing::info!(
            interval_secs = self.scanner.scan_interval_secs,
            one_shot = self.scanner.one_shot,
            "Scanner"
        );
        tracing::info!(
            drift_margin_bps = self.liquidation.debt_drift_margin_bps,
            haircut_bps = self.liquidation.affordability_haircut_bps,
            swap_buffer_bps = self.liquidation.swap_buffer_bps,
            min_swap_value = self.liquidation.min_swap_value,
            dust_value = self.liquidation.dust_value,
            "Liquidation parameters"
        );
        tracing::info!(
            enabled = self.seller.enabled,
            min_out = self.seller.min_out_amount,
            max_impact_pct = self.seller.max_price_impact_pct,
            "Token seller"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.scanner.scan_interval(), Duration::from_secs(5));
        assert_eq!(config.interest.adjustment_period_secs, 60);
        assert_eq!(config.interest.periods_per_year, 525_600);
        assert_eq!(config.liquidation.dust().to_string(), "1.000000");
        assert!(!config.seller.enabled);
    }

    #[test]
    fn test_testing_profile() {
        let config = BotConfig::testing();
        assert_eq!(config.profile, "testing");
        assert!(config.scanner.one_shot);
        assert!(config.network.rpc_url.contains("devnet"));
    }

    #[test]
    fn test_production_profile() {
        let config = BotConfig::production();
        assert_eq!(config.profile, "production");
        assert!(config.seller.enabled);
        assert!(!config.scanner.one_shot);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: BotConfig = toml::from_str(
            r#"
            profile = "custom"
            [scanner]
            one_shot = true
            [liquidation]
            swap_buffer_bps = 500
            "#,
        )
        .unwrap();
        assert_eq!(parsed.profile, "custom");
        assert!(parsed.scanner.one_shot);
        assert_eq!(parsed.scanner.scan_interval_secs, 5);
        assert_eq!(parsed.liquidation.swap_buffer_bps, 500);
        assert_eq!(parsed.liquidation.affordability_haircut_bps, 300);
    }

    #[test]
    fn test_serialization() {
        let config = BotConfig::testing();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("profile = \"testing\""));

        let parsed: BotConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.profile, "testing");
        assert_eq!(parsed.seller.skip_mints, config.seller.skip_mints);
    }
}
