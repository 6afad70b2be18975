//! Application configuration.
//!
//! Loaded from environment variables (via `.env` through `dotenvy`) layered
//! with the `config` crate, mirroring the teacher's `AppConfig::load()`
//! call shape. Carries exactly the configuration surface named in spec §6:
//! network, enabled profiles and their watched addresses/script hashes/
//! reference inputs, matcher enable flag, default slippage, fee amounts,
//! and the multi-hop flag.

use serde::Deserialize;

use crate::error::ConfigError;

/// One enabled DEX "profile" — a protocol whose order contracts this
/// instance watches. Out-of-scope adapters (AMM pricers, liquidation
/// bots) are not part of this crate; profiles here only describe which
/// addresses/scripts carry order-book UTxOs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Short identifier used as the `order_id` protocol tag.
    pub name: String,
    /// Bech32 addresses this profile's order UTxOs can appear at.
    pub watched_addresses: Vec<String>,
    /// Hex-encoded validator script hashes relevant to this profile.
    pub script_hashes: Vec<String>,
    /// "tx_hash#index" pointers usable as reference inputs when building
    /// matching transactions.
    pub reference_inputs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Network name (e.g. "mainnet", "preprod"). Part of the startup
    /// fingerprint.
    pub network: String,

    /// Enabled protocol profiles.
    pub profiles: Vec<ProfileConfig>,

    /// Whether the matcher is allowed to build and submit transactions.
    #[serde(default = "default_matcher_enabled")]
    pub matcher_enabled: bool,

    /// Default slippage bound, in basis points, used when a caller does
    /// not specify one explicitly.
    #[serde(default = "default_slippage_bps")]
    pub default_slippage_bps: u32,

    /// Whether two-hop routing is enabled.
    #[serde(default)]
    pub multi_hop_enabled: bool,

    /// Flat maker fee, in the asked asset's smallest unit.
    #[serde(default)]
    pub maker_flat_fee: u64,
    /// Maker fee as a fraction of leg output (numerator over 1_000_000).
    #[serde(default)]
    pub maker_percent_fee_ppm: u64,
    /// Cap on the percent-based maker fee; 0 means uncapped.
    #[serde(default)]
    pub maker_percent_fee_max: u64,

    /// Fixed taker fee.
    #[serde(default = "default_taker_fee")]
    pub taker_fee: u64,
    /// Fixed matcher reward per successful match.
    #[serde(default = "default_matcher_reward")]
    pub matcher_reward: u64,

    /// Minimum lovelace required on any UTxO produced by the matcher.
    #[serde(default = "default_min_utxo_lovelace")]
    pub min_utxo_lovelace: u64,

    /// Redis connection URL backing the `KvStore` adapter.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// HTTP port for the operational `/health` + `/metrics` surface.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_matcher_enabled() -> bool {
    false
}
fn default_slippage_bps() -> u32 {
    500
}
fn default_taker_fee() -> u64 {
    1_000_000
}
fn default_matcher_reward() -> u64 {
    2_000_000
}
fn default_min_utxo_lovelace() -> u64 {
    2_000_000
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_port() -> u16 {
    8080
}

impl AppConfig {
    /// Load configuration from `.env` plus `APP_*`-prefixed environment
    /// variables, following the teacher's `dotenvy::dotenv().ok()` +
    /// `AppConfig::load()` shape in `main.rs`.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = builder
            .build()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))
    }

    /// The stable fingerprint checked against persisted storage on
    /// startup (spec §6: "A fingerprint record (config network + enabled
    /// profiles) MUST match on startup").
    pub fn fingerprint(&self) -> String {
        let mut profile_names: Vec<&str> = self.profiles.iter().map(|p| p.name.as_str()).collect();
        profile_names.sort_unstable();
        format!("network={},profiles={}", self.network, profile_names.join(","))
    }

    /// Validate that every enabled profile is internally consistent
    /// (non-empty watched address set). Unknown-profile / unknown-network
    /// errors are intentionally left to the deployment's own profile
    /// registry, which is out of the core's scope; this only guards
    /// against a profile with nothing to watch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.trim().is_empty() {
            return Err(ConfigError::UnknownNetwork(self.network.clone()));
        }
        for profile in &self.profiles {
            if profile.watched_addresses.is_empty() {
                return Err(ConfigError::UnknownProfile(profile.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            network: "preprod".to_string(),
            profiles: vec![ProfileConfig {
                name: "splash".to_string(),
                watched_addresses: vec!["addr_test1...".to_string()],
                script_hashes: vec![],
                reference_inputs: vec![],
            }],
            matcher_enabled: true,
            default_slippage_bps: 500,
            multi_hop_enabled: true,
            maker_flat_fee: 0,
            maker_percent_fee_ppm: 0,
            maker_percent_fee_max: 0,
            taker_fee: default_taker_fee(),
            matcher_reward: default_matcher_reward(),
            min_utxo_lovelace: default_min_utxo_lovelace(),
            redis_url: default_redis_url(),
            port: default_port(),
        }
    }

    #[test]
    fn fingerprint_is_stable_under_profile_reordering() {
        let mut a = sample();
        let mut b = sample();
        b.profiles.push(ProfileConfig {
            name: "aztec".to_string(),
            watched_addresses: vec!["addr_test1...".to_string()],
            script_hashes: vec![],
            reference_inputs: vec![],
        });
        a.profiles.insert(
            0,
            ProfileConfig {
                name: "aztec".to_string(),
                watched_addresses: vec!["addr_test1...".to_string()],
                script_hashes: vec![],
                reference_inputs: vec![],
            },
        );
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn validate_rejects_profile_with_no_addresses() {
        let mut cfg = sample();
        cfg.profiles[0].watched_addresses.clear();
        assert!(cfg.validate().is_err());
    }
}
