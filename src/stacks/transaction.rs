//! Contract-call transaction construction and single-sig signing (SIP-005).

use anyhow::{Context, Result};
use k256::ecdsa::SigningKey;
use sha2::{Digest, Sha512_256};

use crate::stacks::clarity::ClarityValue;
use crate::stacks::{c32, StacksNetwork};

const AUTH_STANDARD: u8 = 0x04;
const HASH_MODE_P2PKH: u8 = 0x00;
const KEY_ENCODING_COMPRESSED: u8 = 0x00;
const ANCHOR_MODE_ANY: u8 = 0x03;
const PAYLOAD_CONTRACT_CALL: u8 = 0x02;

/// How the node treats asset movements not covered by post-conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostConditionMode {
    Allow = 0x01,
    Deny = 0x02,
}

/// A contract-call payload.
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub contract_address: String,
    pub contract_name: String,
    pub function_name: String,
    pub function_args: Vec<ClarityValue>,
}

impl ContractCall {
    /// Serialize the payload on its own (used for fee estimation).
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let (version, hash160) = c32::decode_address(&self.contract_address)
            .with_context(|| format!("Invalid contract address {}", self.contract_address))?;

        let mut out = vec![PAYLOAD_CONTRACT_CALL, version];
        out.extend_from_slice(&hash160);
        push_short_string(&mut out, &self.contract_name, "contract name")?;
        push_short_string(&mut out, &self.function_name, "function name")?;
        out.extend_from_slice(&(self.function_args.len() as u32).to_be_bytes());
        for arg in &self.function_args {
            out.extend_from_slice(&arg.serialize());
        }
        Ok(out)
    }
}

fn push_short_string(out: &mut Vec<u8>, value: &str, what: &str) -> Result<()> {
    anyhow::ensure!(
        !value.is_empty() && value.len() <= 128,
        "{} must be 1-128 bytes: {}",
        what,
        value
    );
    out.push(value.len() as u8);
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

/// An unsigned or signed single-sig contract-call transaction.
#[derive(Debug, Clone)]
pub struct ContractCallTransaction {
    pub network: StacksNetwork,
    pub signer_hash160: [u8; 20],
    pub nonce: u64,
    pub fee: u64,
    pub post_condition_mode: PostConditionMode,
    pub payload: ContractCall,
    signature: [u8; 65],
}

impl ContractCallTransaction {
    /// Create an unsigned transaction with no post-conditions.
    pub fn new(
        network: StacksNetwork,
        signer_hash160: [u8; 20],
        nonce: u64,
        fee: u64,
        payload: ContractCall,
    ) -> Self {
        Self {
            network,
            signer_hash160,
            nonce,
            fee,
            post_condition_mode: PostConditionMode::Deny,
            payload,
            signature: [0u8; 65],
        }
    }

    /// Serialize the full transaction.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.serialize_with(self.nonce, self.fee, &self.signature)
    }

    fn serialize_with(&self, nonce: u64, fee: u64, signature: &[u8; 65]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(256);
        out.push(self.network.transaction_version());
        out.extend_from_slice(&self.network.chain_id().to_be_bytes());

        out.push(AUTH_STANDARD);
        out.push(HASH_MODE_P2PKH);
        out.extend_from_slice(&self.signer_hash160);
        out.extend_from_slice(&nonce.to_be_bytes());
        out.extend_from_slice(&fee.to_be_bytes());
        out.push(KEY_ENCODING_COMPRESSED);
        out.extend_from_slice(signature);

        out.push(ANCHOR_MODE_ANY);
        out.push(self.post_condition_mode as u8);
        // No post-conditions.
        out.extend_from_slice(&0u32.to_be_bytes());

        out.extend_from_slice(&self.payload.serialize()?);
        Ok(out)
    }

    /// Transaction id: SHA-512/256 of the serialized transaction.
    pub fn txid(&self) -> Result<String> {
        Ok(hex::encode(Sha512_256::digest(self.serialize()?)))
    }

    /// Sign with the given key using the SIP-005 sighash procedure.
    pub fn sign(&mut self, key: &SigningKey) -> Result<()> {
        // Initial sighash: the transaction with auth fields cleared.
        let cleared = self.serialize_with(0, 0, &[0u8; 65])?;
        let initial_sighash = Sha512_256::digest(&cleared);

        let mut presign = Sha512_256::new();
        presign.update(initial_sighash);
        presign.update([AUTH_STANDARD]);
        presign.update(self.fee.to_be_bytes());
        presign.update(self.nonce.to_be_bytes());
        let presign_hash = presign.finalize();

        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&presign_hash)
            .context("Signing failed")?;

        // Stacks stores signatures as recovery id || r || s.
        let mut encoded = [0u8; 65];
        encoded[0] = recovery_id.to_byte();
        encoded[1..].copy_from_slice(&signature.to_bytes());
        self.signature = encoded;
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        self.signature != [0u8; 65]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_call() -> ContractCall {
        ContractCall {
            contract_address: "SP804CDG3KBN9M6E00AD744K8DC697G7HBCG520Q".into(),
            contract_name: "sbtc-yield-rewards-v3".into(),
            function_name: "enroll".into(),
            function_args: vec![ClarityValue::principal(
                "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7",
            )
            .unwrap()],
        }
    }

    #[test]
    fn payload_layout() {
        let bytes = sample_call().serialize().unwrap();
        assert_eq!(bytes[0], PAYLOAD_CONTRACT_CALL);
        assert_eq!(bytes[1], c32::MAINNET_SINGLE_SIG);
        let name_len = bytes[22] as usize;
        assert_eq!(&bytes[23..23 + name_len], b"sbtc-yield-rewards-v3");
        let fn_at = 23 + name_len;
        assert_eq!(bytes[fn_at] as usize, "enroll".len());
        let argc_at = fn_at + 1 + "enroll".len();
        assert_eq!(&bytes[argc_at..argc_at + 4], &1u32.to_be_bytes());
    }

    #[test]
    fn signing_is_deterministic_and_fills_signature() {
        let key = SigningKey::from_slice(&[7u8; 32]).unwrap();
        let mut tx = ContractCallTransaction::new(
            StacksNetwork::Mainnet,
            [1u8; 20],
            3,
            2_000,
            sample_call(),
        );
        assert!(!tx.is_signed());
        tx.sign(&key).unwrap();
        assert!(tx.is_signed());
        let first = tx.txid().unwrap();

        let mut again =
            ContractCallTransaction::new(StacksNetwork::Mainnet, [1u8; 20], 3, 2_000, sample_call());
        again.sign(&key).unwrap();
        assert_eq!(first, again.txid().unwrap());
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn header_uses_network_version_and_chain_id() {
        let tx = ContractCallTransaction::new(
            StacksNetwork::Testnet,
            [0u8; 20],
            0,
            0,
            sample_call(),
        );
        let bytes = tx.serialize().unwrap();
        assert_eq!(bytes[0], 0x80);
        assert_eq!(&bytes[1..5], &0x8000_0000u32.to_be_bytes());
        assert_eq!(bytes[5], AUTH_STANDARD);
    }
}
