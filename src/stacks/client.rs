//! Hiro Stacks API client: indexer endpoints plus node RPC passthrough
//! (read-only calls, fee estimation, broadcast).

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stacks::clarity::ClarityValue;

/// Hiro API client.
#[derive(Debug, Clone)]
pub struct HiroClient {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

// -- Response types ----------------------------------------------------------

/// Raw STX balance in micro-STX, as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct StxBalanceResponse {
    pub balance: String,
    #[serde(default = "zero")]
    pub locked: String,
}

fn zero() -> String {
    "0".into()
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    fungible_tokens: BTreeMap<String, FungibleTokenBalance>,
}

/// A fungible token holding keyed by `ADDRESS.contract::asset`.
#[derive(Debug, Clone, Deserialize)]
pub struct FungibleTokenBalance {
    pub balance: String,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    results: Vec<AddressTransaction>,
}

/// One entry of the v2 address transactions listing.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressTransaction {
    pub tx: TransactionSummary,
    #[serde(default = "zero")]
    pub stx_sent: String,
    #[serde(default = "zero")]
    pub stx_received: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionSummary {
    pub tx_id: String,
    pub sender_address: String,
    pub tx_status: String,
    #[serde(default)]
    pub burn_block_time_iso: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NoncesResponse {
    possible_next_nonce: u64,
}

#[derive(Debug, Serialize)]
struct ReadOnlyRequest<'a> {
    sender: &'a str,
    arguments: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReadOnlyResponse {
    okay: bool,
    result: Option<String>,
    cause: Option<String>,
}

#[derive(Debug, Serialize)]
struct FeeEstimateRequest {
    transaction_payload: String,
    estimated_len: usize,
}

#[derive(Debug, Deserialize)]
struct FeeEstimateResponse {
    estimations: Vec<FeeEstimation>,
}

#[derive(Debug, Deserialize)]
struct FeeEstimation {
    fee: u64,
}

#[derive(Debug, Deserialize)]
struct BroadcastRejection {
    error: Option<String>,
    reason: Option<String>,
}

impl HiroClient {
    /// Create a new client. The API key, when present, is sent as `X-API-Key`.
    pub fn new(base_url: &str, api_key: Option<&str>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(str::to_string),
            http,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.with_key(self.http.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.with_key(self.http.post(format!("{}{}", self.base_url, path)))
    }

    fn with_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("X-API-Key", key),
            None => req,
        }
    }

    async fn json<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("{} failed ({}): {}", what, status, body);
        }
        resp.json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    /// Native STX balance for an address.
    pub async fn stx_balance(&self, address: &str) -> Result<StxBalanceResponse> {
        debug!("Hiro stx balance: {}", address);
        let resp = self
            .get(&format!("/extended/v1/address/{}/stx", address))
            .send()
            .await
            .context("STX balance request failed")?;
        Self::json(resp, "STX balance").await
    }

    /// Fungible token balances for an address.
    pub async fn fungible_balances(
        &self,
        address: &str,
    ) -> Result<BTreeMap<String, FungibleTokenBalance>> {
        debug!("Hiro balances: {}", address);
        let resp = self
            .get(&format!("/extended/v1/address/{}/balances", address))
            .send()
            .await
            .context("Token balances request failed")?;
        let body: BalancesResponse = Self::json(resp, "Token balances").await?;
        Ok(body.fungible_tokens)
    }

    /// Most recent transactions involving an address.
    pub async fn transactions(&self, address: &str, limit: u32) -> Result<Vec<AddressTransaction>> {
        debug!("Hiro transactions: {} (limit {})", address, limit);
        let resp = self
            .get(&format!("/extended/v2/addresses/{}/transactions", address))
            .query(&[("limit", limit)])
            .send()
            .await
            .context("Transactions request failed")?;
        let body: TransactionsResponse = Self::json(resp, "Transactions").await?;
        Ok(body.results)
    }

    /// Next usable account nonce.
    pub async fn next_nonce(&self, address: &str) -> Result<u64> {
        let resp = self
            .get(&format!("/extended/v1/address/{}/nonces", address))
            .send()
            .await
            .context("Nonce request failed")?;
        let body: NoncesResponse = Self::json(resp, "Nonce").await?;
        Ok(body.possible_next_nonce)
    }

    /// Call a read-only contract function and decode its Clarity result.
    pub async fn call_read_only(
        &self,
        contract_address: &str,
        contract_name: &str,
        function_name: &str,
        args: &[ClarityValue],
        sender: &str,
    ) -> Result<ClarityValue> {
        debug!(
            "Read-only call {}.{}::{}",
            contract_address, contract_name, function_name
        );
        let request = ReadOnlyRequest {
            sender,
            arguments: args.iter().map(ClarityValue::to_hex).collect(),
        };
        let resp = self
            .post(&format!(
                "/v2/contracts/call-read/{}/{}/{}",
                contract_address, contract_name, function_name
            ))
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Read-only call to {} failed", function_name))?;

        let body: ReadOnlyResponse = Self::json(resp, function_name).await?;
        if !body.okay {
            bail!(
                "Read-only call {} rejected: {}",
                function_name,
                body.cause.unwrap_or_else(|| "unknown cause".into())
            );
        }
        let result = body
            .result
            .ok_or_else(|| anyhow::anyhow!("Read-only call {} returned no result", function_name))?;
        ClarityValue::from_hex(&result)
            .with_context(|| format!("Failed to decode {} result", function_name))
    }

    /// Estimate a fee (micro-STX) for a serialized payload; picks the middle estimate.
    pub async fn estimate_fee(&self, payload: &[u8], estimated_len: usize) -> Result<u64> {
        let resp = self
            .post("/v2/fees/transaction")
            .json(&FeeEstimateRequest {
                transaction_payload: format!("0x{}", hex::encode(payload)),
                estimated_len,
            })
            .send()
            .await
            .context("Fee estimate request failed")?;
        let body: FeeEstimateResponse = Self::json(resp, "Fee estimate").await?;
        body.estimations
            .get(1)
            .or_else(|| body.estimations.first())
            .map(|e| e.fee)
            .ok_or_else(|| anyhow::anyhow!("Fee estimate returned no estimations"))
    }

    /// Broadcast a serialized transaction; returns the txid reported by the node.
    pub async fn broadcast(&self, tx: Vec<u8>) -> Result<String> {
        let resp = self
            .post("/v2/transactions")
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(tx)
            .send()
            .await
            .context("Broadcast request failed")?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            if let Ok(rejection) = serde_json::from_str::<BroadcastRejection>(&body) {
                bail!(
                    "Transaction rejected: {} ({})",
                    rejection.error.unwrap_or_else(|| "unknown error".into()),
                    rejection.reason.unwrap_or_else(|| "no reason given".into())
                );
            }
            bail!("Broadcast failed ({}): {}", status, body);
        }

        let txid: String =
            serde_json::from_str(&body).unwrap_or_else(|_| body.trim().trim_matches('"').to_string());
        Ok(txid)
    }
}
