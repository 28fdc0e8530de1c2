//! Typed tool arguments. Model-supplied JSON is parsed and validated here,
//! before any handler runs.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::protocols::wallet_info::DEFAULT_TRANSACTION_LIMIT;
use crate::stacks::c32;
use crate::tools::registry::{ToolKind, MAX_TRANSACTION_LIMIT};

/// Rejections raised before a handler is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Tool {0} not found")]
    NotFound(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddressArgs {
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransactionArgs {
    address: Option<String>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SymbolArgs {
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PairArgs {
    token0: Option<String>,
    token1: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CycleArgs {
    cycle: u64,
    address: Option<String>,
}

/// A validated request for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    WalletAddress,
    StxBalance { address: Option<String> },
    TokenBalances { address: Option<String> },
    RecentTransactions { address: Option<String>, limit: u32 },
    VelarTokens { symbol: Option<String> },
    VelarPools { token0: Option<String>, token1: Option<String> },
    AlexFeeRates,
    AlexAvailableTokens,
    AlexTokenPrices,
    SbtcEnrollment { address: Option<String> },
    SbtcCurrentCycle,
    SbtcRewardAddress { address: Option<String> },
    SbtcRewardsByCycle { cycle: u64, address: Option<String> },
    SbtcEnroll,
}

impl ToolInvocation {
    /// Resolve a tool name and parse its arguments.
    pub fn from_call(name: &str, args: &serde_json::Value) -> Result<Self, ToolError> {
        let kind = ToolKind::from_name(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        Self::parse(name, kind, args)
    }

    /// Parse arguments for a known tool. `name` is only used in messages.
    pub fn parse(name: &str, kind: ToolKind, args: &serde_json::Value) -> Result<Self, ToolError> {
        let p = Parser { name, args };
        let invocation = match kind {
            ToolKind::WalletAddress => {
                p.parse::<NoArgs>()?;
                Self::WalletAddress
            }
            ToolKind::StxBalance => Self::StxBalance {
                address: p.address(p.parse::<AddressArgs>()?.address)?,
            },
            ToolKind::TokenBalances => Self::TokenBalances {
                address: p.address(p.parse::<AddressArgs>()?.address)?,
            },
            ToolKind::RecentTransactions => {
                let a: TransactionArgs = p.parse()?;
                let limit = a.limit.unwrap_or(DEFAULT_TRANSACTION_LIMIT);
                if !(1..=MAX_TRANSACTION_LIMIT).contains(&limit) {
                    return Err(p.invalid(format!(
                        "limit must be between 1 and {}, got {}",
                        MAX_TRANSACTION_LIMIT, limit
                    )));
                }
                Self::RecentTransactions {
                    address: p.address(a.address)?,
                    limit,
                }
            }
            ToolKind::VelarTokens => Self::VelarTokens {
                symbol: blank_to_none(p.parse::<SymbolArgs>()?.symbol),
            },
            ToolKind::VelarPools => {
                let a: PairArgs = p.parse()?;
                Self::VelarPools {
                    token0: blank_to_none(a.token0),
                    token1: blank_to_none(a.token1),
                }
            }
            ToolKind::AlexFeeRates => {
                p.parse::<NoArgs>()?;
                Self::AlexFeeRates
            }
            ToolKind::AlexAvailableTokens => {
                p.parse::<NoArgs>()?;
                Self::AlexAvailableTokens
            }
            ToolKind::AlexTokenPrices => {
                p.parse::<NoArgs>()?;
                Self::AlexTokenPrices
            }
            ToolKind::SbtcEnrollment => Self::SbtcEnrollment {
                address: p.address(p.parse::<AddressArgs>()?.address)?,
            },
            ToolKind::SbtcCurrentCycle => {
                p.parse::<NoArgs>()?;
                Self::SbtcCurrentCycle
            }
            ToolKind::SbtcRewardAddress => Self::SbtcRewardAddress {
                address: p.address(p.parse::<AddressArgs>()?.address)?,
            },
            ToolKind::SbtcRewardsByCycle => {
                let a: CycleArgs = p.parse()?;
                Self::SbtcRewardsByCycle {
                    cycle: a.cycle,
                    address: p.address(a.address)?,
                }
            }
            ToolKind::SbtcEnroll => {
                p.parse::<NoArgs>()?;
                Self::SbtcEnroll
            }
        };
        Ok(invocation)
    }
}

struct Parser<'a> {
    name: &'a str,
    args: &'a serde_json::Value,
}

impl Parser<'_> {
    fn invalid(&self, reason: impl Into<String>) -> ToolError {
        ToolError::InvalidArguments {
            tool: self.name.to_string(),
            reason: reason.into(),
        }
    }

    fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        let value = match self.args {
            // Models send `null` or nothing for parameterless calls.
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            serde_json::Value::Object(_) => self.args.clone(),
            other => {
                return Err(self.invalid(format!("expected a JSON object, got {}", other)));
            }
        };
        serde_json::from_value(value).map_err(|e| self.invalid(e.to_string()))
    }

    fn address(&self, address: Option<String>) -> Result<Option<String>, ToolError> {
        match blank_to_none(address) {
            Some(a) if !c32::is_valid_principal(&a) => Err(self.invalid(format!(
                "'{}' is not a valid Stacks address",
                a
            ))),
            other => Ok(other),
        }
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ADDR: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";

    #[test]
    fn unknown_tool_is_not_found() {
        let err = ToolInvocation::from_call("launch_rocket", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Tool launch_rocket not found");
    }

    #[test]
    fn limit_defaults_to_ten() {
        let inv = ToolInvocation::from_call("get_recent_transactions", &json!({})).unwrap();
        assert_eq!(
            inv,
            ToolInvocation::RecentTransactions {
                address: None,
                limit: 10
            }
        );
        let inv =
            ToolInvocation::from_call("get_last_transactions", &json!({"limit": 3})).unwrap();
        assert_eq!(
            inv,
            ToolInvocation::RecentTransactions {
                address: None,
                limit: 3
            }
        );
    }

    #[test]
    fn limit_out_of_range_is_rejected() {
        for limit in [0, 51] {
            let err = ToolInvocation::from_call("get_recent_transactions", &json!({"limit": limit}))
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments { .. }));
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = ToolInvocation::from_call("get_stx_balance", &json!({"adress": ADDR}))
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid arguments for get_stx_balance"));
        assert!(ToolInvocation::from_call("get_alex_fee_rates", &json!({"x": 1})).is_err());
    }

    #[test]
    fn null_args_mean_no_args() {
        assert_eq!(
            ToolInvocation::from_call("get_wallet_address", &serde_json::Value::Null).unwrap(),
            ToolInvocation::WalletAddress
        );
        assert!(ToolInvocation::from_call("get_wallet_address", &json!("{oops")).is_err());
    }

    #[test]
    fn addresses_are_validated() {
        let ok = ToolInvocation::from_call("get_balance", &json!({"address": ADDR})).unwrap();
        assert_eq!(
            ok,
            ToolInvocation::StxBalance {
                address: Some(ADDR.into())
            }
        );
        let blank = ToolInvocation::from_call("get_balance", &json!({"address": " "})).unwrap();
        assert_eq!(blank, ToolInvocation::StxBalance { address: None });
        assert!(ToolInvocation::from_call("get_balance", &json!({"address": "0xabc"})).is_err());
    }

    #[test]
    fn cycle_is_required() {
        assert!(ToolInvocation::from_call("get_sbtc_rewards_by_cycle", &json!({})).is_err());
        assert!(
            ToolInvocation::from_call("get_sbtc_rewards_by_cycle", &json!({"cycle": "x"}))
                .is_err()
        );
        let inv = ToolInvocation::from_call("get_sbtc_rewards_by_cycle", &json!({"cycle": 7}))
            .unwrap();
        assert_eq!(
            inv,
            ToolInvocation::SbtcRewardsByCycle {
                cycle: 7,
                address: None
            }
        );
    }
}
