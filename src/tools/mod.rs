pub mod args;
pub mod registry;

pub use args::{ToolError, ToolInvocation};
pub use registry::{tool_definitions, ToolDefinition, ToolKind};

use std::future::Future;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{AgentConfig, ConfigError};
use crate::identity::StacksWallet;
use crate::protocols::wallet_info::MOCK_ADDRESS;
use crate::protocols::{AlexClient, AlexSettings, SbtcClient, VelarClient, WalletInfo};
use crate::stacks::HiroClient;
use crate::types::ToolResult;

// ---------------------------------------------------------------------------
// Tool execution engine
// ---------------------------------------------------------------------------

/// Context passed to tool execution containing all adapter handles.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub wallet_info: WalletInfo,
    pub velar: VelarClient,
    pub alex: AlexClient,
    pub sbtc: SbtcClient,
    pub wallet: Option<StacksWallet>,
    pub mock_mode: bool,
}

#[derive(Debug, Serialize)]
struct WalletAddress {
    address: String,
    formatted: String,
}

impl ToolContext {
    /// Build every adapter client from config, sharing one HTTP client.
    pub fn from_config(
        config: &AgentConfig,
        wallet: Option<StacksWallet>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let hiro = HiroClient::new(
            &config.hiro_api_url,
            Some(config.hiro_api_key.as_str()),
            http.clone(),
        );
        let alex = AlexClient::new(
            AlexSettings {
                sdk_api_url: config.alex_sdk_api_url.clone(),
                backend_api_url: config.alex_backend_api_url.clone(),
                amm_contract: config.alex_amm_contract.clone(),
                stx_token: config.alex_stx_token.clone(),
                alex_token: config.alex_token.clone(),
            },
            hiro.clone(),
            http.clone(),
        );
        let sbtc = SbtcClient::new(
            hiro.clone(),
            &config.sbtc_rewards_contract,
            config.default_contract_call_fee,
        )
        .context("Invalid sbtc_rewards_contract")?;

        Ok(Self {
            wallet_info: WalletInfo::new(hiro, config.mock_mode),
            velar: VelarClient::new(&config.velar_api_url, http),
            alex,
            sbtc,
            wallet,
            mock_mode: config.mock_mode,
        })
    }

    /// The connected wallet's address: canned in mock mode, derived otherwise.
    pub fn default_address(&self) -> Result<String> {
        if self.mock_mode {
            return Ok(MOCK_ADDRESS.to_string());
        }
        self.wallet
            .as_ref()
            .map(|w| w.address.clone())
            .ok_or_else(|| ConfigError::MissingMnemonic.into())
    }

    fn resolve(&self, address: Option<String>) -> Result<String> {
        match address {
            Some(address) => Ok(address),
            None => self.default_address(),
        }
    }

    fn signing_wallet(&self) -> Result<&StacksWallet> {
        if self.mock_mode {
            anyhow::bail!("Enrollment transactions are disabled in mock mode");
        }
        self.wallet
            .as_ref()
            .ok_or_else(|| ConfigError::MissingMnemonic.into())
    }
}

/// Execute a tool call by name. Never fails: unknown tools, bad arguments
/// and adapter errors all come back as `{error}` results.
pub async fn execute_tool(ctx: &ToolContext, name: &str, args: &serde_json::Value) -> ToolResult {
    let invocation = match ToolInvocation::from_call(name, args) {
        Ok(invocation) => invocation,
        Err(e) => {
            warn!("Rejected tool call {}: {}", name, e);
            return ToolResult::failure(name, e.to_string());
        }
    };
    info!("Tool: {} {:?}", name, invocation);
    dispatch(ctx, name, invocation).await
}

/// Run a handler future and fold its outcome into a [`ToolResult`].
pub async fn capture<T, F>(name: &str, handler: F) -> ToolResult
where
    T: Serialize,
    F: Future<Output = Result<T>>,
{
    let outcome = handler.await.and_then(|value| {
        serde_json::to_value(value).context("Failed to serialize tool output")
    });
    match outcome {
        Ok(output) => ToolResult::success(name, output),
        Err(e) => {
            warn!("Tool {} failed: {:#}", name, e);
            ToolResult::failure(name, format!("{:#}", e))
        }
    }
}

async fn dispatch(ctx: &ToolContext, name: &str, invocation: ToolInvocation) -> ToolResult {
    match invocation {
        ToolInvocation::WalletAddress => {
            capture(name, async {
                let address = ctx.default_address()?;
                Ok::<_, anyhow::Error>(WalletAddress {
                    formatted: format!("Connected wallet address: {}", address),
                    address,
                })
            })
            .await
        }
        ToolInvocation::StxBalance { address } => {
            capture(name, async {
                let address = ctx.resolve(address)?;
                ctx.wallet_info.stx_balance(&address).await
            })
            .await
        }
        ToolInvocation::TokenBalances { address } => {
            capture(name, async {
                let address = ctx.resolve(address)?;
                ctx.wallet_info.token_balances(&address).await
            })
            .await
        }
        ToolInvocation::RecentTransactions { address, limit } => {
            capture(name, async {
                let address = ctx.resolve(address)?;
                ctx.wallet_info.recent_transactions(&address, limit).await
            })
            .await
        }
        ToolInvocation::VelarTokens { symbol } => {
            capture(name, ctx.velar.tokens(symbol.as_deref())).await
        }
        ToolInvocation::VelarPools { token0, token1 } => {
            capture(name, ctx.velar.pools(token0.as_deref(), token1.as_deref())).await
        }
        ToolInvocation::AlexFeeRates => capture(name, ctx.alex.fee_rates()).await,
        ToolInvocation::AlexAvailableTokens => capture(name, ctx.alex.available_tokens()).await,
        ToolInvocation::AlexTokenPrices => capture(name, ctx.alex.token_prices()).await,
        ToolInvocation::SbtcEnrollment { address } => {
            capture(name, async {
                let address = ctx.resolve(address)?;
                ctx.sbtc.enrollment(&address).await
            })
            .await
        }
        ToolInvocation::SbtcCurrentCycle => {
            capture(name, async {
                let sender = ctx.default_address().ok();
                ctx.sbtc.current_cycle(sender.as_deref()).await
            })
            .await
        }
        ToolInvocation::SbtcRewardAddress { address } => {
            capture(name, async {
                let address = ctx.resolve(address)?;
                ctx.sbtc.reward_address(&address).await
            })
            .await
        }
        ToolInvocation::SbtcRewardsByCycle { cycle, address } => {
            capture(name, async {
                let address = ctx.resolve(address)?;
                ctx.sbtc.rewards_by_cycle(cycle, &address).await
            })
            .await
        }
        ToolInvocation::SbtcEnroll => {
            capture(name, async {
                let wallet = ctx.signing_wallet()?;
                ctx.sbtc.enroll(wallet).await
            })
            .await
        }
    }
}
