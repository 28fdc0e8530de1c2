//! The static tool catalog: names, descriptions and parameter schemas.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Definition of a tool exposed to the inference model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Every operation the agent can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    WalletAddress,
    StxBalance,
    TokenBalances,
    RecentTransactions,
    VelarTokens,
    VelarPools,
    AlexFeeRates,
    AlexAvailableTokens,
    AlexTokenPrices,
    SbtcEnrollment,
    SbtcCurrentCycle,
    SbtcRewardAddress,
    SbtcRewardsByCycle,
    SbtcEnroll,
}

/// Registered tool names. Several names may share a kind.
pub const CATALOG: &[(&str, ToolKind)] = &[
    ("get_wallet_address", ToolKind::WalletAddress),
    ("get_stx_balance", ToolKind::StxBalance),
    ("get_balance", ToolKind::StxBalance),
    ("get_token_balances", ToolKind::TokenBalances),
    ("get_recent_transactions", ToolKind::RecentTransactions),
    ("get_last_transactions", ToolKind::RecentTransactions),
    ("get_velar_tokens", ToolKind::VelarTokens),
    ("get_velar_pools", ToolKind::VelarPools),
    ("get_alex_fee_rates", ToolKind::AlexFeeRates),
    ("get_alex_available_tokens", ToolKind::AlexAvailableTokens),
    ("get_alex_token_prices", ToolKind::AlexTokenPrices),
    ("is_sbtc_enrolled", ToolKind::SbtcEnrollment),
    ("get_sbtc_current_cycle", ToolKind::SbtcCurrentCycle),
    ("get_sbtc_reward_address", ToolKind::SbtcRewardAddress),
    ("get_sbtc_rewards_by_cycle", ToolKind::SbtcRewardsByCycle),
    ("enroll_sbtc_incentives", ToolKind::SbtcEnroll),
];

/// Upper bound for the transaction listing `limit` argument.
pub const MAX_TRANSACTION_LIMIT: u32 = 50;

impl ToolKind {
    /// Look up a tool by its registered name.
    pub fn from_name(name: &str) -> Option<Self> {
        CATALOG
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, kind)| *kind)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::WalletAddress => "Get the Stacks address of the connected wallet.",
            Self::StxBalance => {
                "Get the native STX balance (total, locked and available) of an address. \
                 Defaults to the connected wallet."
            }
            Self::TokenBalances => {
                "Get fungible (SIP-10) token balances of an address. Defaults to the connected wallet."
            }
            Self::RecentTransactions => {
                "Get the most recent transactions of an address. Defaults to the connected wallet \
                 and 10 transactions."
            }
            Self::VelarTokens => {
                "List tokens available on the Velar DEX, optionally for a single symbol."
            }
            Self::VelarPools => {
                "List liquidity pools on the Velar DEX, optionally filtered by token symbols."
            }
            Self::AlexFeeRates => "Get the ALEX swap fee rates between STX and ALEX.",
            Self::AlexAvailableTokens => "List tokens that can be swapped on ALEX.",
            Self::AlexTokenPrices => "Get the latest USD token prices from ALEX.",
            Self::SbtcEnrollment => {
                "Check whether an address is enrolled in sBTC incentives for the current and \
                 next cycle. Defaults to the connected wallet."
            }
            Self::SbtcCurrentCycle => "Get the current sBTC rewards cycle id.",
            Self::SbtcRewardAddress => {
                "Get the latest sBTC reward address registered for an address. Defaults to the \
                 connected wallet."
            }
            Self::SbtcRewardsByCycle => {
                "Get the sBTC rewards earned by an address in a given cycle. Defaults to the \
                 connected wallet."
            }
            Self::SbtcEnroll => {
                "Enroll the connected wallet in sBTC incentives by broadcasting a contract call."
            }
        }
    }

    /// JSON Schema of the tool's parameters.
    pub fn parameters(self) -> serde_json::Value {
        let address = json!({
            "type": "string",
            "description": "Stacks address (defaults to the connected wallet)"
        });
        match self {
            Self::StxBalance
            | Self::TokenBalances
            | Self::SbtcEnrollment
            | Self::SbtcRewardAddress => json!({
                "type": "object",
                "properties": { "address": address },
                "required": []
            }),
            Self::RecentTransactions => json!({
                "type": "object",
                "properties": {
                    "address": address,
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_TRANSACTION_LIMIT,
                        "description": "Number of transactions to return (default 10)"
                    }
                },
                "required": []
            }),
            Self::VelarTokens => json!({
                "type": "object",
                "properties": {
                    "symbol": {
                        "type": "string",
                        "description": "Token symbol to look up (omit for all tokens)"
                    }
                },
                "required": []
            }),
            Self::VelarPools => json!({
                "type": "object",
                "properties": {
                    "token0": {
                        "type": "string",
                        "description": "Symbol of the first token in the pair"
                    },
                    "token1": {
                        "type": "string",
                        "description": "Symbol of the second token in the pair"
                    }
                },
                "required": []
            }),
            Self::SbtcRewardsByCycle => json!({
                "type": "object",
                "properties": {
                    "cycle": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Rewards cycle id"
                    },
                    "address": address
                },
                "required": ["cycle"]
            }),
            Self::WalletAddress
            | Self::AlexFeeRates
            | Self::AlexAvailableTokens
            | Self::AlexTokenPrices
            | Self::SbtcCurrentCycle
            | Self::SbtcEnroll => json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }
}

/// Build the list of tool definitions exposed to the inference model.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    CATALOG
        .iter()
        .map(|(name, kind)| ToolDefinition {
            name: (*name).to_string(),
            description: kind.description().to_string(),
            parameters: kind.parameters(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = CATALOG.iter().map(|(n, _)| *n).collect();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn aliases_share_kinds() {
        assert_eq!(ToolKind::from_name("get_balance"), Some(ToolKind::StxBalance));
        assert_eq!(
            ToolKind::from_name("get_last_transactions"),
            Some(ToolKind::RecentTransactions)
        );
        assert_eq!(ToolKind::from_name("get_everything"), None);
    }

    #[test]
    fn rewards_schema_requires_cycle() {
        let schema = ToolKind::SbtcRewardsByCycle.parameters();
        assert_eq!(schema["required"], json!(["cycle"]));
        assert_eq!(schema["properties"]["address"]["type"], "string");
    }

    #[test]
    fn every_definition_is_an_object_schema() {
        let defs = tool_definitions();
        assert_eq!(defs.len(), CATALOG.len());
        for def in defs {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }
}
