//! Stacks DeFi agent: a conversational assistant that answers questions about
//! the Stacks blockchain by calling wallet, Velar, ALEX and sBTC tools.

pub mod agent;
pub mod config;
pub mod identity;
pub mod inference;
pub mod protocols;
pub mod server;
pub mod stacks;
pub mod tools;
pub mod types;
