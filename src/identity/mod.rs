pub mod wallet;

pub use wallet::StacksWallet;
