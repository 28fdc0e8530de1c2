//! Wallet lookups against the Hiro indexer: STX balance, SIP-10 token
//! balances and recent transactions.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::protocols::units::{self, STX_DECIMALS};
use crate::stacks::{split_contract_id, ClarityValue, HiroClient};

/// Address returned for wallet lookups in mock mode.
pub const MOCK_ADDRESS: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";

/// Default page size for transaction listings.
pub const DEFAULT_TRANSACTION_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StxBalance {
    pub total: f64,
    pub locked: f64,
    pub available: f64,
    pub formatted: String,
}

impl StxBalance {
    /// Build from raw micro-STX amounts; `available` is computed before scaling.
    pub fn from_micro(total: u128, locked: u128) -> Result<Self> {
        let total_stx = units::fixed_point_to_f64(total, STX_DECIMALS)?;
        let locked_stx = units::fixed_point_to_f64(locked, STX_DECIMALS)?;
        let available = units::fixed_point_to_f64(total.saturating_sub(locked), STX_DECIMALS)?;
        Ok(Self {
            total: total_stx,
            locked: locked_stx,
            available,
            formatted: format!(
                "Total: {} STX, Locked: {} STX, Available: {} STX",
                total_stx, locked_stx, available
            ),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub symbol: String,
    pub balance: f64,
    pub contract_id: String,
    pub decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalances {
    pub tokens: Vec<TokenBalance>,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEntry {
    pub id: String,
    pub from: String,
    pub status: String,
    pub stx_sent: f64,
    pub stx_received: f64,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTransactions {
    pub transactions: Vec<TransactionEntry>,
    pub formatted: String,
}

impl RecentTransactions {
    fn new(transactions: Vec<TransactionEntry>) -> Self {
        let formatted = if transactions.is_empty() {
            "No transactions found".to_string()
        } else {
            transactions
                .iter()
                .map(|tx| {
                    let mut line = format!(
                        "Id: {}, From: {}, Status: {}, STX Sent: {}, STX Received: {}",
                        tx.id, tx.from, tx.status, tx.stx_sent, tx.stx_received
                    );
                    if let Some(time) = tx.time {
                        line.push_str(&format!(", Time: {}", time.to_rfc3339()));
                    }
                    line
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        Self {
            transactions,
            formatted,
        }
    }
}

/// Wallet data source: live indexer or canned mock values.
#[derive(Debug, Clone)]
pub struct WalletInfo {
    hiro: HiroClient,
    mock_mode: bool,
}

impl WalletInfo {
    pub fn new(hiro: HiroClient, mock_mode: bool) -> Self {
        Self { hiro, mock_mode }
    }

    /// Native STX balance for an address.
    pub async fn stx_balance(&self, address: &str) -> Result<StxBalance> {
        if self.mock_mode {
            return StxBalance::from_micro(2_500_750_000, 500_250_000);
        }
        let raw = self.hiro.stx_balance(address).await?;
        let total = units::parse_raw_amount(&raw.balance).context("Invalid STX balance")?;
        let locked = units::parse_raw_amount(&raw.locked).context("Invalid locked STX")?;
        StxBalance::from_micro(total, locked)
    }

    /// SIP-10 balances with symbol and decimals resolved per token. A token
    /// whose metadata lookup fails is logged and left out.
    pub async fn token_balances(&self, address: &str) -> Result<TokenBalances> {
        let holdings = self.hiro.fungible_balances(address).await?;
        debug!("{} fungible token entries for {}", holdings.len(), address);

        let lookups = holdings.iter().map(|(asset_id, holding)| async move {
            match self.resolve_token(address, asset_id, &holding.balance).await {
                Ok(token) => Some(token),
                Err(e) => {
                    warn!("Skipping token {}: {:#}", asset_id, e);
                    None
                }
            }
        });
        let tokens: Vec<TokenBalance> = join_all(lookups).await.into_iter().flatten().collect();

        let formatted = if tokens.is_empty() {
            "No token balances found".to_string()
        } else {
            tokens
                .iter()
                .map(|t| {
                    format!(
                        "Token: {}, Balance: {}, Token Id: {}",
                        t.symbol, t.balance, t.contract_id
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        Ok(TokenBalances { tokens, formatted })
    }

    async fn resolve_token(
        &self,
        sender: &str,
        asset_id: &str,
        raw_balance: &str,
    ) -> Result<TokenBalance> {
        let contract_id = asset_id.split("::").next().unwrap_or(asset_id);
        let (contract_address, contract_name) = split_contract_id(contract_id)?;

        let (decimals, symbol) = futures::try_join!(
            self.hiro
                .call_read_only(contract_address, contract_name, "get-decimals", &[], sender),
            self.hiro
                .call_read_only(contract_address, contract_name, "get-symbol", &[], sender),
        )?;

        let decimals = decimals
            .into_ok()
            .ok()
            .as_ref()
            .and_then(ClarityValue::as_uint)
            .and_then(|d| u32::try_from(d).ok())
            .context("get-decimals did not return (ok uint)")?;
        let symbol = symbol
            .into_ok()
            .ok()
            .as_ref()
            .and_then(ClarityValue::as_str)
            .map(str::to_string)
            .context("get-symbol did not return (ok string)")?;

        let raw = units::parse_raw_amount(raw_balance)?;
        Ok(TokenBalance {
            symbol,
            balance: units::fixed_point_to_f64(raw, decimals)?,
            contract_id: contract_id.to_string(),
            decimals,
        })
    }

    /// Most recent transactions, at most `limit` entries.
    pub async fn recent_transactions(&self, address: &str, limit: u32) -> Result<RecentTransactions> {
        let limit = limit.max(1);
        if self.mock_mode {
            let mut txs = mock_transactions();
            txs.truncate(limit as usize);
            return Ok(RecentTransactions::new(txs));
        }

        let results = self.hiro.transactions(address, limit).await?;
        let transactions = results
            .into_iter()
            .take(limit as usize)
            .map(|entry| -> Result<TransactionEntry> {
                Ok(TransactionEntry {
                    stx_sent: units::micro_stx_to_stx(&entry.stx_sent)?,
                    stx_received: units::micro_stx_to_stx(&entry.stx_received)?,
                    time: entry.tx.burn_block_time_iso.as_deref().and_then(parse_time),
                    id: entry.tx.tx_id,
                    from: entry.tx.sender_address,
                    status: entry.tx.tx_status,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RecentTransactions::new(transactions))
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn mock_transactions() -> Vec<TransactionEntry> {
    let canned = [
        ("0x8f1c", "success", 125.0, 0.0, "2024-03-01T12:00:00Z"),
        ("0x4a2e", "success", 0.0, 300.5, "2024-02-27T09:30:00Z"),
        ("0x91b7", "pending", 10.25, 0.0, "2024-02-25T18:45:00Z"),
    ];
    canned
        .iter()
        .map(|(id, status, sent, received, time)| TransactionEntry {
            id: format!("{}{}", id, "0".repeat(62)),
            from: MOCK_ADDRESS.to_string(),
            status: status.to_string(),
            stx_sent: *sent,
            stx_received: *received,
            time: parse_time(time),
        })
        .collect()
}
