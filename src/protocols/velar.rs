//! Velar DEX public API: token listings and liquidity pools.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Velar API client.
#[derive(Debug, Clone)]
pub struct VelarClient {
    base_url: String,
    http: reqwest::Client,
}

// -- Response types ----------------------------------------------------------

/// The token endpoint answers with a bare array or a `{data: [...]}` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokensResponse {
    Bare(Vec<RawToken>),
    Wrapped { data: Vec<RawToken> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawToken {
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    contract_address: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(default)]
    social_links: Option<SocialLinks>,
}

#[derive(Debug, Deserialize)]
struct SocialLinks {
    website: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PoolsResponse {
    data: Option<Vec<RawPool>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPool {
    symbol: String,
    token0_symbol: String,
    token1_symbol: String,
    #[serde(default)]
    stats: Option<PoolStats>,
}

#[derive(Debug, Deserialize)]
struct PoolStats {
    tvl_usd: Option<StatValue>,
}

#[derive(Debug, Deserialize)]
struct StatValue {
    #[serde(default, deserialize_with = "lenient_f64")]
    value: Option<f64>,
}

/// Accept numbers, numeric strings or null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// -- Normalized results ------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VelarToken {
    pub symbol: String,
    pub name: String,
    pub contract_address: String,
    pub price: Option<f64>,
    pub website: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VelarTokens {
    pub tokens: Vec<VelarToken>,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VelarPool {
    pub symbol: String,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub tvl_usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VelarPools {
    pub pools: Vec<VelarPool>,
    pub formatted: String,
}

fn or_na(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl VelarClient {
    pub fn new(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid Velar API URL {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Velar API URL {} cannot take a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let resp = request
            .send()
            .await
            .with_context(|| format!("Velar {} request failed", what))?;
        debug!("Velar {} response from {}", what, resp.url());

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Velar {} failed ({}): {}", what, status, body);
        }
        resp.json()
            .await
            .with_context(|| format!("Failed to parse Velar {} response", what))
    }

    /// Listed tokens, optionally for a single symbol.
    pub async fn tokens(&self, symbol: Option<&str>) -> Result<VelarTokens> {
        let symbol = non_empty(symbol).unwrap_or("all");
        let request = self
            .http
            .get(self.endpoint(&["tokens"])?)
            .query(&[("symbol", symbol)]);
        let body: TokensResponse = self.get_json(request, "tokens").await?;
        let raw = match body {
            TokensResponse::Bare(tokens) | TokensResponse::Wrapped { data: tokens } => tokens,
        };

        let tokens: Vec<VelarToken> = raw
            .into_iter()
            .map(|t| VelarToken {
                website: t
                    .social_links
                    .and_then(|l| l.website)
                    .filter(|w| !w.is_empty())
                    .unwrap_or_else(|| "N/A".into()),
                symbol: t.symbol,
                name: t.name,
                contract_address: t.contract_address,
                price: t.price,
            })
            .collect();

        let formatted = tokens
            .iter()
            .map(|t| {
                format!(
                    "Symbol: {}, Name: {}, Price: {}, Address: {}, Website: {}",
                    t.symbol,
                    t.name,
                    or_na(t.price),
                    t.contract_address,
                    t.website
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(VelarTokens { tokens, formatted })
    }

    /// Liquidity pools. Both tokens select the pair endpoint; a single token
    /// filters the full listing locally.
    pub async fn pools(&self, token0: Option<&str>, token1: Option<&str>) -> Result<VelarPools> {
        let token0 = non_empty(token0);
        let token1 = non_empty(token1);
        let url = match (token0, token1) {
            (Some(a), Some(b)) => self.endpoint(&["pools", a, b])?,
            _ => self.endpoint(&["pools"])?,
        };

        let body: PoolsResponse = self.get_json(self.http.get(url), "pools").await?;
        let Some(raw) = body.data else {
            bail!("Unexpected response format from Velar API: missing data array");
        };

        let one_sided = match (token0, token1) {
            (Some(t), None) | (None, Some(t)) => Some(t),
            _ => None,
        };

        let pools: Vec<VelarPool> = raw
            .into_iter()
            .filter(|p| {
                one_sided.map_or(true, |t| {
                    p.token0_symbol.eq_ignore_ascii_case(t) || p.token1_symbol.eq_ignore_ascii_case(t)
                })
            })
            .map(|p| VelarPool {
                tvl_usd: p.stats.and_then(|s| s.tvl_usd).and_then(|v| v.value),
                symbol: p.symbol,
                token0_symbol: p.token0_symbol,
                token1_symbol: p.token1_symbol,
            })
            .collect();

        let formatted = if pools.is_empty() {
            "No pools found".to_string()
        } else {
            pools
                .iter()
                .map(|p| {
                    format!(
                        "Symbol: {}, Token Pair: {}-{}, Total Value Locked (USD): {}",
                        p.symbol,
                        p.token0_symbol,
                        p.token1_symbol,
                        or_na(p.tvl_usd)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        Ok(VelarPools { pools, formatted })
    }
}
