//! Candidate token discovery.
//!
//! Freshly listed tokens come from the DexScreener profile feed. The feed
//! spans every network DexScreener indexes, so callers filter the result
//! down to the configured target network before acting on it. Discovery
//! is read-only and fetched per task execution; nothing is cached.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;

const PROFILE_FEED_PATH: &str = "token-profiles/latest/v1";

/// A candidate token from the discovery feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredAsset {
    pub chain_id: String,
    pub token_address: String,
    /// The feed omits the symbol for some listings.
    #[serde(default)]
    pub symbol: Option<String>,
}

impl DiscoveredAsset {
    /// Symbol for log lines, falling back to a shortened address.
    pub fn display_symbol(&self) -> String {
        match &self.symbol {
            Some(symbol) if !symbol.is_empty() => symbol.clone(),
            _ => shorten_address(&self.token_address),
        }
    }
}

/// Shorten `0x`-prefixed addresses for display: `0x1234...cdef`.
fn shorten_address(address: &str) -> String {
    match address.strip_prefix("0x") {
        Some(hex) if hex.len() > 12 => {
            format!("0x{}...{}", &hex[..6], &hex[hex.len() - 4..])
        }
        _ => address.to_string(),
    }
}

/// Read-only adapter over the token discovery feed.
#[async_trait]
pub trait TokenDiscovery: Send + Sync {
    /// Fetch the latest candidate tokens across all networks.
    ///
    /// Upstream failures propagate; there is no local fallback list.
    async fn latest_tokens(&self) -> Result<Vec<DiscoveredAsset>, DiscoveryError>;
}

/// Keep only the assets listed on `network`.
pub fn on_network(assets: Vec<DiscoveredAsset>, network: &str) -> Vec<DiscoveredAsset> {
    assets
        .into_iter()
        .filter(|asset| asset.chain_id == network)
        .collect()
}

/// DexScreener-backed discovery client.
pub struct DexScreenerClient {
    http: reqwest::Client,
    endpoint: String,
}

impl DexScreenerClient {
    pub fn new(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let endpoint = format!(
            "{}/{}",
            config.feed_base_url.as_str().trim_end_matches('/'),
            PROFILE_FEED_PATH
        );
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl TokenDiscovery for DexScreenerClient {
    async fn latest_tokens(&self) -> Result<Vec<DiscoveredAsset>, DiscoveryError> {
        let response = self.http.get(&self.endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserializes_feed_entries_and_ignores_extras() {
        let raw = serde_json::json!([
            {
                "url": "https://dexscreener.com/base/0xabc",
                "chainId": "base",
                "tokenAddress": "0x00112233445566778899aabbccddeeff00112233",
                "symbol": "WIF",
                "icon": "https://cdn.example/icon.png"
            },
            {
                "chainId": "solana",
                "tokenAddress": "GmFJN5q9ZLMwXXgDBGZdVpWGGBvgR8HcX1HEPAbTyr1"
            }
        ])
        .to_string();

        let assets: Vec<DiscoveredAsset> = serde_json::from_str(&raw).unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].symbol.as_deref(), Some("WIF"));
        assert_eq!(assets[1].symbol, None);
    }

    #[test]
    fn filters_to_target_network() {
        let assets = vec![
            DiscoveredAsset {
                chain_id: "base".to_string(),
                token_address: "0x01".to_string(),
                symbol: None,
            },
            DiscoveredAsset {
                chain_id: "ethereum".to_string(),
                token_address: "0x02".to_string(),
                symbol: None,
            },
            DiscoveredAsset {
                chain_id: "base".to_string(),
                token_address: "0x03".to_string(),
                symbol: None,
            },
        ];

        let base_only = on_network(assets, "base");
        assert_eq!(base_only.len(), 2);
        assert!(base_only.iter().all(|a| a.chain_id == "base"));
    }

    #[test]
    fn display_symbol_falls_back_to_short_address() {
        let asset = DiscoveredAsset {
            chain_id: "base".to_string(),
            token_address: "0x00112233445566778899aabbccddeeff00112233".to_string(),
            symbol: None,
        };
        assert_eq!(asset.display_symbol(), "0x001122...2233");

        let named = DiscoveredAsset {
            symbol: Some("WIF".to_string()),
            ..asset
        };
        assert_eq!(named.display_symbol(), "WIF");
    }
}
