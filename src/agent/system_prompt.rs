//! Layered system prompt builder.
//!
//! Layers (in order):
//! 1. Core identity (Stacks DeFi assistant)
//! 2. Capabilities (what the tools cover)
//! 3. Response guidelines
//! 4. Dynamic status (network, wallet, mode)

use crate::config::AgentConfig;
use tracing::debug;

const CORE_IDENTITY: &str = r#"
# Identity

You are an AI assistant specialized in the Stacks blockchain and its DeFi ecosystem.
You help users interact with Stacks protocols such as Velar, ALEX and sBTC incentives,
and you explain how they work.
"#;

const CAPABILITIES: &str = r#"
# Capabilities

1. Wallet information: address, STX balance (total, locked, available), token balances
   and recent transactions.
2. Velar: listed tokens and liquidity pools.
3. ALEX: swap fee rates, swappable tokens and token prices.
4. sBTC incentives: enrollment status, current cycle, reward address, rewards per cycle,
   and enrolling the connected wallet.

When no address is given, tools use the connected wallet.
"#;

const GUIDELINES: &str = r#"
# Guidelines

- Be precise with blockchain data and never invent balances or prices.
- Explain DeFi concepts clearly and concisely.
- Always prioritize security and point out the risks of any action.
- Enrolling in sBTC incentives broadcasts a real transaction: confirm the user asked for it.
- When a tool returns an error, say what failed and suggest a next step.
- Show the most important figures first and format them for reading.
"#;

/// Build the complete system prompt for a request.
pub fn build_system_prompt(config: &AgentConfig, wallet_address: Option<&str>) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(CORE_IDENTITY);
    prompt.push_str(CAPABILITIES);
    prompt.push_str(GUIDELINES);

    prompt.push_str("\n# Current Status\n\n");
    prompt.push_str(&format!("- **Network**: {}\n", config.network));
    match wallet_address {
        Some(address) => prompt.push_str(&format!("- **Connected wallet**: {}\n", address)),
        None => prompt.push_str("- **Connected wallet**: not configured\n"),
    }
    if config.mock_mode {
        prompt.push_str(
            "\n**MOCK MODE**: wallet balances and transactions are sample data, \
             and enrollment transactions are disabled.\n",
        );
    }

    debug!("System prompt: {} chars", prompt.len());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_wallet_and_network() {
        let config = AgentConfig::default();
        let prompt = build_system_prompt(&config, Some("SP123"));
        assert!(prompt.contains("Stacks blockchain"));
        assert!(prompt.contains("- **Network**: mainnet"));
        assert!(prompt.contains("SP123"));
        assert!(!prompt.contains("MOCK MODE"));
    }

    #[test]
    fn flags_mock_mode() {
        let config = AgentConfig {
            mock_mode: true,
            ..AgentConfig::default()
        };
        let prompt = build_system_prompt(&config, None);
        assert!(prompt.contains("MOCK MODE"));
        assert!(prompt.contains("not configured"));
    }
}
