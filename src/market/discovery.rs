//! Gamma API client for market discovery
//!
//! Looks up the currently active 15-minute up/down market for a crypto: its
//! slug, the up/down outcome token ids, and the settlement time.

use super::{window_epoch, MarketDef};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;

/// Gamma API base URL
pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

/// Configuration for the discovery client
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Base URL for the Gamma API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_url: GAMMA_API_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Client for looking up active up/down markets
pub struct DiscoveryClient {
    config: DiscoveryConfig,
    client: Client,
}

impl DiscoveryClient {
    /// Create a client with default configuration
    pub fn new() -> Self {
        Self::with_config(DiscoveryConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: DiscoveryConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    /// Fetch the active market for the current window of a crypto
    ///
    /// Returns None when no market matching the current window is listed.
    pub async fn fetch_current_market(&self, crypto: &str) -> anyhow::Result<Option<MarketDef>> {
        let epoch = window_epoch(Utc::now());
        let slug = event_slug(crypto, epoch);
        let url = format!("{}/markets", self.config.base_url);

        tracing::debug!(slug = %slug, "Fetching market from Gamma API");

        let response = self
            .client
            .get(&url)
            .query(&[("slug", slug.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gamma API error: {} - {}", status, body);
        }

        let markets: Vec<GammaMarket> = response.json().await?;

        for market in markets {
            if let Some(def) = convert_market(crypto, epoch, &slug, market)? {
                return Ok(Some(def));
            }
        }

        Ok(None)
    }
}

impl Default for DiscoveryClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Event slug for a crypto's window (e.g. "btc-updown-15m-1767638700")
fn event_slug(crypto: &str, epoch: i64) -> String {
    format!("{}-updown-15m-{}", crypto.to_lowercase(), epoch)
}

/// Raw market response from the Gamma API
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    /// CLOB token IDs as a JSON-encoded string array
    clob_token_ids: Option<String>,
    /// Market end date (RFC 3339)
    end_date: Option<String>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    closed: bool,
}

fn convert_market(
    crypto: &str,
    epoch: i64,
    slug: &str,
    market: GammaMarket,
) -> anyhow::Result<Option<MarketDef>> {
    if !market.active || market.closed {
        return Ok(None);
    }

    let token_ids = match market.clob_token_ids.as_ref() {
        Some(ids) => ids,
        None => return Ok(None),
    };
    let (up_token_id, down_token_id) = parse_token_ids(token_ids)?;

    let end_time = market
        .end_date
        .as_ref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| super::window_end(epoch));

    Ok(Some(MarketDef {
        slug: slug.to_string(),
        crypto: crypto.to_string(),
        up_token_id,
        down_token_id,
        window_epoch: epoch,
        end_time,
    }))
}

/// Parse CLOB token IDs from their JSON-encoded form
///
/// Format: "[\"token1\", \"token2\"]" where token1 is UP and token2 is DOWN
fn parse_token_ids(token_ids_str: &str) -> anyhow::Result<(String, String)> {
    let tokens: Vec<String> = serde_json::from_str(token_ids_str)
        .map_err(|e| anyhow::anyhow!("Failed to parse clobTokenIds: {} - {}", token_ids_str, e))?;

    if tokens.len() < 2 {
        anyhow::bail!(
            "Expected 2 token IDs, got {}: {}",
            tokens.len(),
            token_ids_str
        );
    }

    Ok((tokens[0].clone(), tokens[1].clone()))
}
