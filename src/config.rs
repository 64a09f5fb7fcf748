//! Configuration for sniperd.
//!
//! Everything resolves from environment variables (after the dotenvy
//! preload in `main`). Each section has a `resolve()` constructor that
//! rejects invalid values with the offending key, so a misconfigured
//! deployment fails at startup rather than mid-task.

use std::net::SocketAddr;
use std::time::Duration;

use alloy::primitives::Address;
use secrecy::SecretString;
use url::Url;

use crate::error::ConfigError;

/// Base mainnet defaults. The permission manager address is the deployed
/// SpendPermissionManager the signing UI points wallets at; overriding it
/// without re-signing permissions invalidates every pending payload.
const DEFAULT_RPC_URL: &str = "https://mainnet.base.org";
const DEFAULT_CHAIN_ID: u64 = 8453;
const DEFAULT_PERMISSION_MANAGER: &str = "0xf85210B21cC50302F477BA56686d2019dC9b67Ad";
const DEFAULT_SWAP_ROUTER: &str = "0x4752ba5DBc23f44D87826276BF6Fd6b1C372aD24";
const DEFAULT_WRAPPED_NATIVE: &str = "0x4200000000000000000000000000000000000006";

const DEFAULT_FEED_BASE_URL: &str = "https://api.dexscreener.com";
const DEFAULT_TARGET_NETWORK: &str = "base";
const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 10_000;

const DEFAULT_SETTLEMENT_DELAY_MS: u64 = 10_000;
const DEFAULT_MAX_TRADE_TARGETS: usize = 4;

const DEFAULT_GATEWAY_BIND: &str = "127.0.0.1:8787";

/// Main configuration for the service.
#[derive(Debug, Clone)]
pub struct Config {
    pub chain: ChainConfig,
    pub spender: SpenderConfig,
    pub discovery: DiscoveryConfig,
    pub engine: EngineConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Resolve the full configuration from the environment.
    pub fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            chain: ChainConfig::resolve()?,
            spender: SpenderConfig::resolve()?,
            discovery: DiscoveryConfig::resolve()?,
            engine: EngineConfig::resolve()?,
            gateway: GatewayConfig::resolve()?,
        })
    }
}

/// Target ledger and contract addresses.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: Url,
    pub chain_id: u64,
    pub permission_manager: Address,
    pub swap_router: Address,
    pub wrapped_native: Address,
}

impl ChainConfig {
    pub fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            rpc_url: parse_env("RPC_URL", DEFAULT_RPC_URL)?,
            chain_id: parse_env("CHAIN_ID", &DEFAULT_CHAIN_ID.to_string())?,
            permission_manager: parse_env(
                "SPEND_PERMISSION_MANAGER",
                DEFAULT_PERMISSION_MANAGER,
            )?,
            swap_router: parse_env("SWAP_ROUTER", DEFAULT_SWAP_ROUTER)?,
            wrapped_native: parse_env("WRAPPED_NATIVE", DEFAULT_WRAPPED_NATIVE)?,
        })
    }
}

/// Delegate wallet credentials.
///
/// The key is kept as a [`SecretString`] and only parsed into a signer
/// when a task execution connects its wallet, so a malformed key surfaces
/// as a per-task setup failure rather than leaking into logs here.
#[derive(Debug, Clone)]
pub struct SpenderConfig {
    pub private_key: SecretString,
}

impl SpenderConfig {
    pub fn resolve() -> Result<Self, ConfigError> {
        let key = require_env("SPENDER_PRIVATE_KEY")?;
        Ok(Self {
            private_key: SecretString::from(key),
        })
    }
}

/// Token discovery feed settings.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub feed_base_url: Url,
    pub target_network: String,
    pub timeout: Duration,
}

impl DiscoveryConfig {
    pub fn resolve() -> Result<Self, ConfigError> {
        let timeout_ms: u64 = parse_env(
            "DISCOVERY_TIMEOUT_MS",
            &DEFAULT_DISCOVERY_TIMEOUT_MS.to_string(),
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DISCOVERY_TIMEOUT_MS".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        Ok(Self {
            feed_base_url: parse_env("DISCOVERY_FEED_URL", DEFAULT_FEED_BASE_URL)?,
            target_network: optional_env("TARGET_NETWORK")?
                .unwrap_or_else(|| DEFAULT_TARGET_NETWORK.to_string()),
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Engine pacing and allocation policy.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wait between the approve and spend submissions, so the approval is
    /// indexed before the dependent call reads it.
    pub settlement_delay: Duration,
    /// Wait between the spend and the first trade.
    pub post_spend_delay: Duration,
    /// Upper bound on how many discovered tokens share the allowance.
    pub max_trade_targets: usize,
}

impl EngineConfig {
    pub fn resolve() -> Result<Self, ConfigError> {
        let settlement_ms: u64 = parse_env(
            "SETTLEMENT_DELAY_MS",
            &DEFAULT_SETTLEMENT_DELAY_MS.to_string(),
        )?;
        let post_spend_ms: u64 =
            parse_env("POST_SPEND_DELAY_MS", &settlement_ms.to_string())?;
        let max_trade_targets: usize = parse_env(
            "MAX_TRADE_TARGETS",
            &DEFAULT_MAX_TRADE_TARGETS.to_string(),
        )?;
        if max_trade_targets == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_TRADE_TARGETS".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        Ok(Self {
            settlement_delay: Duration::from_millis(settlement_ms),
            post_spend_delay: Duration::from_millis(post_spend_ms),
            max_trade_targets,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settlement_delay: Duration::from_millis(DEFAULT_SETTLEMENT_DELAY_MS),
            post_spend_delay: Duration::from_millis(DEFAULT_SETTLEMENT_DELAY_MS),
            max_trade_targets: DEFAULT_MAX_TRADE_TARGETS,
        }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    /// Bearer token the periodic trigger must present on `/api/cron`.
    pub cron_secret: SecretString,
}

impl GatewayConfig {
    pub fn resolve() -> Result<Self, ConfigError> {
        let secret = require_env("CRON_SECRET")?;
        Ok(Self {
            bind: parse_env("GATEWAY_BIND", DEFAULT_GATEWAY_BIND)?,
            cron_secret: SecretString::from(secret),
        })
    }
}

/// Read an env var, treating unset and empty as absent.
fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid unicode".to_string(),
        }),
    }
}

/// Read a required env var; unset or empty is a hard error.
fn require_env(key: &str) -> Result<String, ConfigError> {
    optional_env(key)?.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Read an env var and parse it, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = optional_env(key)?.unwrap_or_else(|| default.to_string());
    raw.parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            std::env::remove_var("RPC_URL");
            std::env::remove_var("CHAIN_ID");
            std::env::remove_var("SPEND_PERMISSION_MANAGER");
            std::env::remove_var("SWAP_ROUTER");
            std::env::remove_var("WRAPPED_NATIVE");
            std::env::remove_var("SPENDER_PRIVATE_KEY");
            std::env::remove_var("DISCOVERY_FEED_URL");
            std::env::remove_var("TARGET_NETWORK");
            std::env::remove_var("DISCOVERY_TIMEOUT_MS");
            std::env::remove_var("SETTLEMENT_DELAY_MS");
            std::env::remove_var("POST_SPEND_DELAY_MS");
            std::env::remove_var("MAX_TRADE_TARGETS");
            std::env::remove_var("GATEWAY_BIND");
            std::env::remove_var("CRON_SECRET");
        }
    }

    #[test]
    fn chain_config_uses_base_defaults() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();

        let chain = ChainConfig::resolve().expect("chain resolve");
        assert_eq!(chain.chain_id, 8453);
        assert_eq!(chain.rpc_url.as_str(), "https://mainnet.base.org/");
        assert_eq!(
            chain.permission_manager,
            DEFAULT_PERMISSION_MANAGER.parse::<Address>().unwrap()
        );
    }

    #[test]
    fn engine_config_applies_overrides_and_delay_fallback() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();

        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            std::env::set_var("SETTLEMENT_DELAY_MS", "250");
            std::env::set_var("MAX_TRADE_TARGETS", "2");
        }

        let engine = EngineConfig::resolve().expect("engine resolve");
        assert_eq!(engine.settlement_delay, Duration::from_millis(250));
        // POST_SPEND_DELAY_MS inherits the settlement delay when unset.
        assert_eq!(engine.post_spend_delay, Duration::from_millis(250));
        assert_eq!(engine.max_trade_targets, 2);

        clear_env();
    }

    #[test]
    fn engine_config_rejects_zero_targets() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();

        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            std::env::set_var("MAX_TRADE_TARGETS", "0");
        }

        let err = EngineConfig::resolve().unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "MAX_TRADE_TARGETS"),
            other => panic!("unexpected error: {other}"),
        }

        clear_env();
    }

    #[test]
    fn spender_key_is_required() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();

        let err = SpenderConfig::resolve().unwrap_err();
        match err {
            ConfigError::MissingEnvVar(key) => assert_eq!(key, "SPENDER_PRIVATE_KEY"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn gateway_config_parses_bind_address() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();

        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            std::env::set_var("CRON_SECRET", "hunter2");
            std::env::set_var("GATEWAY_BIND", "0.0.0.0:9000");
        }

        let gateway = GatewayConfig::resolve().expect("gateway resolve");
        assert_eq!(gateway.bind.port(), 9000);

        clear_env();
    }
}
