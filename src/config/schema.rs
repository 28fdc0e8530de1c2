//! Configuration schema for agent.toml.

use serde::{Deserialize, Serialize};

use crate::stacks::StacksNetwork;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Human-readable agent name.
    pub name: String,

    /// Address the HTTP server binds to.
    pub bind_address: String,

    /// Stacks network the wallet and transactions target.
    pub network: StacksNetwork,

    /// Hiro Stacks API base URL (indexer and node RPC).
    pub hiro_api_url: String,

    /// Hiro API key, sent as `X-API-Key`.
    pub hiro_api_key: String,

    /// Velar public API base URL.
    pub velar_api_url: String,

    /// ALEX SDK metadata endpoint (token list).
    pub alex_sdk_api_url: String,

    /// ALEX backend API base URL (token prices).
    pub alex_backend_api_url: String,

    /// ALEX AMM pool contract used for fee-rate lookups.
    pub alex_amm_contract: String,

    /// Wrapped STX token contract on ALEX.
    pub alex_stx_token: String,

    /// ALEX governance token contract.
    pub alex_token: String,

    /// sBTC yield-rewards contract.
    pub sbtc_rewards_contract: String,

    /// OpenAI-compatible inference API base URL.
    pub inference_api_url: String,

    /// Inference API key (bearer token).
    pub inference_api_key: String,

    /// Default model for chat requests.
    pub inference_model: String,

    /// Maximum tokens per inference call.
    pub max_tokens_per_turn: u32,

    /// Maximum model round-trips per chat request.
    pub max_steps: u32,

    /// Maximum tool calls executed in a single step.
    pub max_tool_calls_per_step: u32,

    /// BIP-39 mnemonic for the agent wallet.
    pub wallet_mnemonic: String,

    /// Serve canned wallet data instead of live lookups.
    pub mock_mode: bool,

    /// Fee (micro-STX) used when fee estimation is unavailable.
    pub default_contract_call_fee: u64,

    /// Log level (debug, info, warn, error).
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "stacks-agent".into(),
            bind_address: "127.0.0.1:3000".into(),
            network: StacksNetwork::Mainnet,
            hiro_api_url: "https://api.hiro.so".into(),
            hiro_api_key: String::new(),
            velar_api_url: "https://api.velar.co".into(),
            alex_sdk_api_url: "https://alex-sdk-api.alexlab.co".into(),
            alex_backend_api_url: "https://api.alexgo.io".into(),
            alex_amm_contract: "SP102V8P0F7JX67ARQ77WEA3D3CFB5XW39REDT0AM.amm-pool-v2-01".into(),
            alex_stx_token: "SP102V8P0F7JX67ARQ77WEA3D3CFB5XW39REDT0AM.token-wstx-v2".into(),
            alex_token: "SP102V8P0F7JX67ARQ77WEA3D3CFB5XW39REDT0AM.token-alex".into(),
            sbtc_rewards_contract: "SP804CDG3KBN9M6E00AD744K8DC697G7HBCG520Q.sbtc-yield-rewards-v3"
                .into(),
            inference_api_url: "https://api.openai.com".into(),
            inference_api_key: String::new(),
            inference_model: "gpt-4o".into(),
            max_tokens_per_turn: 4096,
            max_steps: 5,
            max_tool_calls_per_step: 10,
            wallet_mnemonic: String::new(),
            mock_mode: false,
            default_contract_call_fee: 10_000,
            log_level: "info".into(),
        }
    }
}

impl AgentConfig {
    /// The model to use for a request, honoring a per-request override.
    pub fn effective_model<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.inference_model)
    }
}
