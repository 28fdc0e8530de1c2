//! Stacks wallet derivation from a BIP-39 mnemonic.
//!
//! Follows the Stacks wallet account layout: BIP-32 path
//! `m/44'/5757'/0'/0/0`, compressed secp256k1 public key, HASH160,
//! c32check-encoded single-sig address.

use anyhow::{Context, Result};
use bip32::{DerivationPath, XPrv};
use bip39::Mnemonic;
use k256::ecdsa::SigningKey;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::stacks::{c32, StacksNetwork};

/// Account 0 of the Stacks derivation path.
pub const STACKS_DERIVATION_PATH: &str = "m/44'/5757'/0'/0/0";

/// An in-memory wallet handle.
#[derive(Clone)]
pub struct StacksWallet {
    signing_key: SigningKey,
    /// HASH160 of the compressed public key.
    pub hash160: [u8; 20],
    /// c32check address for the configured network.
    pub address: String,
    pub network: StacksNetwork,
}

impl std::fmt::Debug for StacksWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StacksWallet")
            .field("address", &self.address)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl StacksWallet {
    /// Derive the first account from a mnemonic phrase (empty passphrase).
    pub fn from_mnemonic(phrase: &str, network: StacksNetwork) -> Result<Self> {
        let mnemonic = Mnemonic::parse(phrase.trim()).context("Invalid wallet mnemonic")?;
        let seed = mnemonic.to_seed("");
        let key_bytes = derive_path(&seed, STACKS_DERIVATION_PATH)?;
        let wallet = Self::from_private_key(&key_bytes, network)?;
        info!("Derived wallet: {}", wallet.address);
        Ok(wallet)
    }

    /// Build a wallet from raw 32-byte private key material.
    pub fn from_private_key(key_bytes: &[u8], network: StacksNetwork) -> Result<Self> {
        let signing_key = SigningKey::from_slice(key_bytes).context("Invalid private key bytes")?;
        let hash160 = hash160(signing_key.verifying_key().to_encoded_point(true).as_bytes());
        let address = c32::encode_address(network.single_sig_version(), &hash160)
            .context("Failed to encode address")?;

        Ok(Self {
            signing_key,
            hash160,
            address,
            network,
        })
    }

    /// Signing key for transaction authorization.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

/// RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let rip = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&rip);
    out
}

/// BIP-32 private derivation from a seed along the given path.
fn derive_path(seed: &[u8], path: &str) -> Result<[u8; 32]> {
    let path: DerivationPath = path
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid derivation path {}: {}", path, e))?;
    let xprv = XPrv::derive_from_path(seed, &path)
        .map_err(|e| anyhow::anyhow!("Key derivation failed: {}", e))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&xprv.private_key().to_bytes());
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const OTHER: &str = "legal winner thank year wave sausage worth useful legal winner thank yellow";
    // Account 0 of the stacks.js wallet-sdk keychain fixture.
    const STACKS_JS_SECRET: &str = "sound idle panel often situate develop unit text design antenna vendor screen opinion balcony share trigger accuse scatter visa uniform brass update opinion media";

    #[test]
    fn derivation_is_deterministic() {
        let a = StacksWallet::from_mnemonic(MNEMONIC, StacksNetwork::Mainnet).unwrap();
        let b = StacksWallet::from_mnemonic(MNEMONIC, StacksNetwork::Mainnet).unwrap();
        assert_eq!(a.address, b.address);
        assert!(a.address.starts_with("SP"));
    }

    #[test]
    fn different_mnemonics_differ() {
        let a = StacksWallet::from_mnemonic(MNEMONIC, StacksNetwork::Mainnet).unwrap();
        let b = StacksWallet::from_mnemonic(OTHER, StacksNetwork::Mainnet).unwrap();
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn testnet_uses_st_prefix_and_same_key_hash() {
        let main = StacksWallet::from_mnemonic(MNEMONIC, StacksNetwork::Mainnet).unwrap();
        let test = StacksWallet::from_mnemonic(MNEMONIC, StacksNetwork::Testnet).unwrap();
        assert!(test.address.starts_with("ST"));
        assert_eq!(main.hash160, test.hash160);
    }

    #[test]
    fn address_round_trips_through_c32() {
        let wallet = StacksWallet::from_mnemonic(MNEMONIC, StacksNetwork::Mainnet).unwrap();
        let (version, hash) = c32::decode_address(&wallet.address).unwrap();
        assert_eq!(version, c32::MAINNET_SINGLE_SIG);
        assert_eq!(hash, wallet.hash160);
    }

    #[test]
    fn invalid_mnemonic_is_rejected() {
        let err = StacksWallet::from_mnemonic("not a real phrase", StacksNetwork::Mainnet)
            .unwrap_err();
        assert!(err.to_string().contains("Invalid wallet mnemonic"));
    }

    #[test]
    fn bip32_master_key_matches_reference_vector() {
        // BIP-32 test vector 1: seed 000102...0f, chain m.
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let key = derive_path(&seed, "m").unwrap();
        assert_eq!(
            hex::encode(key),
            "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35"
        );
    }

    #[test]
    fn bip32_hardened_child_matches_reference_vector() {
        // BIP-32 test vector 1: chain m/0'.
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let key = derive_path(&seed, "m/0'").unwrap();
        assert_eq!(
            hex::encode(key),
            "edb2e14f9ee77d26dd93b4ecede8d16ed408ce149b6cd80b0715a2d911a0afea"
        );
    }

    #[test]
    fn bip32_normal_child_matches_reference_vector() {
        // BIP-32 test vector 1: chain m/0'/1.
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let key = derive_path(&seed, "m/0'/1").unwrap();
        assert_eq!(
            hex::encode(key),
            "3c6cb8d0f6a264c91ea8b5030fadaa8e538b020f0a387421a12de9319dc93368"
        );
    }

    #[test]
    fn mnemonic_derives_known_stacks_address() {
        let wallet = StacksWallet::from_mnemonic(STACKS_JS_SECRET, StacksNetwork::Mainnet).unwrap();
        assert_eq!(wallet.address, "SP384CVPNDTYA0E92TKJZQTYXQHNZSWGCAG7SAPVB");
    }
}
