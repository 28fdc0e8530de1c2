//! External data adapters. Each lookup returns a serializable payload with a
//! `formatted` summary; failures are returned to the tool layer.

pub mod alex;
pub mod sbtc;
pub mod units;
pub mod velar;
pub mod wallet_info;

pub use alex::{AlexClient, AlexSettings};
pub use sbtc::SbtcClient;
pub use velar::VelarClient;
pub use wallet_info::WalletInfo;
