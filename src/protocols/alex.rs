//! ALEX DEX: swap fee rates (on-chain), swappable tokens and USD prices.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::protocols::units::{self, ALEX_FEE_DECIMALS};
use crate::stacks::{split_contract_id, ClarityValue, HiroClient};

/// Pool factor of the STX/ALEX pair (1.0 in 8-decimal fixed point).
const STX_ALEX_FACTOR: u128 = 100_000_000;

/// Endpoints and contracts the ALEX client talks to.
#[derive(Debug, Clone)]
pub struct AlexSettings {
    pub sdk_api_url: String,
    pub backend_api_url: String,
    pub amm_contract: String,
    pub stx_token: String,
    pub alex_token: String,
}

/// ALEX client.
#[derive(Debug, Clone)]
pub struct AlexClient {
    settings: AlexSettings,
    hiro: HiroClient,
    http: reqwest::Client,
}

// -- Response types ----------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SwappableResponse {
    Wrapped { tokens: Vec<RawSwappable> },
    Bare(Vec<RawSwappable>),
}

/// Entries carry `name` and/or `id`, and `underlyingToken` and/or
/// `contractAddress`, depending on the endpoint version.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSwappable {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "underlying_token")]
    underlying_token: Option<String>,
    #[serde(default)]
    contract_address: Option<String>,
}

impl RawSwappable {
    fn into_token(self) -> Option<AlexToken> {
        let name = self.name.or(self.id)?;
        let id = self.underlying_token.or(self.contract_address)?;
        Some(AlexToken { name, id })
    }
}

#[derive(Debug, Deserialize)]
struct PricesResponse {
    data: Vec<RawPrice>,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    #[serde(alias = "token")]
    contract_id: String,
    #[serde(default, alias = "price", deserialize_with = "lenient_f64")]
    last_price_usd: Option<f64>,
}

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
pub struct AlexFeeRates {
    pub stx_to_alex_fee: f64,
    pub alex_to_stx_fee: f64,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlexToken {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlexTokens {
    pub tokens: Vec<AlexToken>,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlexPrice {
    pub token: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlexPrices {
    pub prices: Vec<AlexPrice>,
    pub formatted: String,
}

impl AlexClient {
    pub fn new(settings: AlexSettings, hiro: HiroClient, http: reqwest::Client) -> Self {
        Self {
            settings: AlexSettings {
                sdk_api_url: settings.sdk_api_url.trim_end_matches('/').to_string(),
                backend_api_url: settings.backend_api_url.trim_end_matches('/').to_string(),
                ..settings
            },
            hiro,
            http,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        debug!("ALEX request: {}", url);
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("ALEX {} request failed", what))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("ALEX {} failed ({}): {}", what, status, body);
        }
        resp.json()
            .await
            .with_context(|| format!("Failed to parse ALEX {} response", what))
    }

    /// Swap fee rates of the STX/ALEX pool in both directions.
    pub async fn fee_rates(&self) -> Result<AlexFeeRates> {
        let (address, name) = split_contract_id(&self.settings.amm_contract)?;
        let args = [
            ClarityValue::principal(&self.settings.stx_token)?,
            ClarityValue::principal(&self.settings.alex_token)?,
            ClarityValue::UInt(STX_ALEX_FACTOR),
        ];
        let details = self
            .hiro
            .call_read_only(address, name, "get-pool-details", &args, address)
            .await?
            .into_ok()
            .map_err(|err| anyhow::anyhow!("get-pool-details returned error: {}", err))?;

        let rate = |field: &str| -> Result<f64> {
            let raw = details
                .tuple_field(field)
                .and_then(ClarityValue::as_uint)
                .with_context(|| format!("Pool details missing {}", field))?;
            units::fixed_point_to_f64(raw, ALEX_FEE_DECIMALS)
        };
        let stx_to_alex_fee = rate("fee-rate-x")?;
        let alex_to_stx_fee = rate("fee-rate-y")?;

        Ok(AlexFeeRates {
            stx_to_alex_fee,
            alex_to_stx_fee,
            formatted: format!(
                "Fee rate from STX to ALEX: {} STX\nFee rate from ALEX to STX: {} ALEX",
                stx_to_alex_fee, alex_to_stx_fee
            ),
        })
    }

    /// Tokens that can be swapped on ALEX.
    pub async fn available_tokens(&self) -> Result<AlexTokens> {
        let body: SwappableResponse = self
            .get_json(&self.settings.sdk_api_url, "token list")
            .await?;
        let raw = match body {
            SwappableResponse::Wrapped { tokens } | SwappableResponse::Bare(tokens) => tokens,
        };
        let tokens: Vec<AlexToken> = raw
            .into_iter()
            .filter_map(RawSwappable::into_token)
            .collect();
        let formatted = tokens
            .iter()
            .map(|t| format!("Name: {}, Id: {}", t.name, t.id))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(AlexTokens { tokens, formatted })
    }

    /// Latest USD prices. Entries without a price are dropped.
    pub async fn token_prices(&self) -> Result<AlexPrices> {
        let url = format!("{}/v2/public/token-prices", self.settings.backend_api_url);
        let body: PricesResponse = self.get_json(&url, "token prices").await?;
        let prices: Vec<AlexPrice> = body
            .data
            .into_iter()
            .filter_map(|p| {
                p.last_price_usd.map(|price| AlexPrice {
                    token: p.contract_id,
                    price,
                })
            })
            .collect();
        let formatted = prices
            .iter()
            .map(|p| format!("Token: {}, Price: {} USD", p.token, p.price))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(AlexPrices { prices, formatted })
    }
}
