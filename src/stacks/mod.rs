//! Stacks chain primitives: addresses, Clarity values, transactions and the
//! Hiro indexer / node API client.

pub mod c32;
pub mod clarity;
pub mod client;
pub mod transaction;

pub use clarity::ClarityValue;
pub use client::HiroClient;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target Stacks network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StacksNetwork {
    #[default]
    Mainnet,
    Testnet,
}

impl StacksNetwork {
    /// Address version byte for single-sig (P2PKH) accounts.
    pub fn single_sig_version(self) -> u8 {
        match self {
            Self::Mainnet => c32::MAINNET_SINGLE_SIG,
            Self::Testnet => c32::TESTNET_SINGLE_SIG,
        }
    }

    pub fn transaction_version(self) -> u8 {
        match self {
            Self::Mainnet => 0x00,
            Self::Testnet => 0x80,
        }
    }

    pub fn chain_id(self) -> u32 {
        match self {
            Self::Mainnet => 0x0000_0001,
            Self::Testnet => 0x8000_0000,
        }
    }
}

impl fmt::Display for StacksNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

/// Split `ADDRESS.contract-name` into its two halves.
pub fn split_contract_id(contract_id: &str) -> anyhow::Result<(&str, &str)> {
    contract_id
        .split_once('.')
        .filter(|(address, name)| !address.is_empty() && !name.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid contract identifier: {}", contract_id))
}
