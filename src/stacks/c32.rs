//! c32check address encoding (Crockford base-32 with a double-SHA256 checksum).
//!
//! Stacks addresses are `S` + version character + c32(hash160 || checksum).

use sha2::{Digest, Sha256};
use thiserror::Error;

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Mainnet single-signature address version (`SP...`).
pub const MAINNET_SINGLE_SIG: u8 = 22;
/// Mainnet multi-signature address version (`SM...`).
pub const MAINNET_MULTI_SIG: u8 = 20;
/// Testnet single-signature address version (`ST...`).
pub const TESTNET_SINGLE_SIG: u8 = 26;
/// Testnet multi-signature address version (`SN...`).
pub const TESTNET_MULTI_SIG: u8 = 21;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum C32Error {
    #[error("address must start with 'S': {0}")]
    MissingPrefix(String),
    #[error("invalid c32 character '{0}'")]
    InvalidCharacter(char),
    #[error("c32 payload too short")]
    TooShort,
    #[error("checksum mismatch")]
    BadChecksum,
    #[error("address version {0} out of range")]
    BadVersion(u8),
    #[error("expected a 20-byte hash, got {0} bytes")]
    BadHashLength(usize),
}

/// Encode raw bytes as c32 (no checksum).
pub fn encode(data: &[u8]) -> String {
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 8 / 5 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0;

    for &byte in data.iter().rev() {
        acc |= u32::from(byte) << bits;
        bits += 8;
        while bits >= 5 {
            digits.push((acc & 0x1f) as u8);
            acc >>= 5;
            bits -= 5;
        }
    }
    if bits > 0 {
        digits.push((acc & 0x1f) as u8);
    }

    // Most significant digits sit at the end; drop zero padding there.
    while digits.last() == Some(&0) {
        digits.pop();
    }

    let leading_zero_bytes = data.iter().take_while(|b| **b == 0).count();
    let mut out = String::with_capacity(leading_zero_bytes + digits.len());
    out.extend(std::iter::repeat('0').take(leading_zero_bytes));
    out.extend(digits.iter().rev().map(|d| C32_ALPHABET[*d as usize] as char));
    out
}

/// Decode a c32 string back into bytes (no checksum).
pub fn decode(input: &str) -> Result<Vec<u8>, C32Error> {
    let normalized = normalize(input);
    let mut values = Vec::with_capacity(normalized.len());
    for c in normalized.chars() {
        let pos = C32_ALPHABET
            .iter()
            .position(|a| *a as char == c)
            .ok_or(C32Error::InvalidCharacter(c))?;
        values.push(pos as u32);
    }

    let mut bytes: Vec<u8> = Vec::with_capacity(values.len() * 5 / 8 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for value in values.iter().rev() {
        acc |= value << bits;
        bits += 5;
        while bits >= 8 {
            bytes.push((acc & 0xff) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 && acc != 0 {
        bytes.push((acc & 0xff) as u8);
    }
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    bytes.reverse();

    let leading_zero_chars = normalized.chars().take_while(|c| *c == '0').count();
    let mut out = vec![0u8; leading_zero_chars];
    out.extend(bytes);
    Ok(out)
}

fn normalize(input: &str) -> String {
    input
        .to_ascii_uppercase()
        .chars()
        .map(|c| match c {
            'O' => '0',
            'L' | 'I' => '1',
            other => other,
        })
        .collect()
}

fn checksum(version: u8, data: &[u8]) -> [u8; 4] {
    let mut hasher = Sha256::new();
    hasher.update([version]);
    hasher.update(data);
    let first = hasher.finalize();
    let second = Sha256::digest(first);
    let mut out = [0u8; 4];
    out.copy_from_slice(&second[..4]);
    out
}

/// Encode a version byte and 20-byte hash as a Stacks address.
pub fn encode_address(version: u8, hash160: &[u8; 20]) -> Result<String, C32Error> {
    if version >= 32 {
        return Err(C32Error::BadVersion(version));
    }
    let mut payload = hash160.to_vec();
    payload.extend_from_slice(&checksum(version, hash160));

    Ok(format!(
        "S{}{}",
        C32_ALPHABET[version as usize] as char,
        encode(&payload)
    ))
}

/// Decode a Stacks address into its version byte and 20-byte hash.
pub fn decode_address(address: &str) -> Result<(u8, [u8; 20]), C32Error> {
    let body = address
        .strip_prefix('S')
        .ok_or_else(|| C32Error::MissingPrefix(address.to_string()))?;

    let mut chars = body.chars();
    let version_char = chars.next().ok_or(C32Error::TooShort)?;
    let version_char = normalize(&version_char.to_string())
        .chars()
        .next()
        .ok_or(C32Error::TooShort)?;
    let version = C32_ALPHABET
        .iter()
        .position(|a| *a as char == version_char)
        .ok_or(C32Error::InvalidCharacter(version_char))? as u8;

    let decoded = decode(chars.as_str())?;
    if decoded.len() < 4 {
        return Err(C32Error::TooShort);
    }
    let (data, check) = decoded.split_at(decoded.len() - 4);
    if checksum(version, data) != check {
        return Err(C32Error::BadChecksum);
    }
    if data.len() != 20 {
        return Err(C32Error::BadHashLength(data.len()));
    }

    let mut hash = [0u8; 20];
    hash.copy_from_slice(data);
    Ok((version, hash))
}

/// Check whether a string is a valid standard or contract principal.
pub fn is_valid_principal(principal: &str) -> bool {
    let (address, contract) = match principal.split_once('.') {
        Some((address, name)) => (address, Some(name)),
        None => (principal, None),
    };
    if let Some(name) = contract {
        if name.is_empty() || name.len() > 128 {
            return false;
        }
    }
    decode_address(address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";
    const HASH: &str = "a46ff88886c2ef9762d970b4d2c63678835bd39d";

    fn hash_bytes() -> [u8; 20] {
        let mut out = [0u8; 20];
        out.copy_from_slice(&hex::decode(HASH).unwrap());
        out
    }

    #[test]
    fn encodes_known_mainnet_address() {
        let address = encode_address(MAINNET_SINGLE_SIG, &hash_bytes()).unwrap();
        assert_eq!(address, ADDRESS);
    }

    #[test]
    fn decodes_known_mainnet_address() {
        let (version, hash) = decode_address(ADDRESS).unwrap();
        assert_eq!(version, MAINNET_SINGLE_SIG);
        assert_eq!(hex::encode(hash), HASH);
    }

    #[test]
    fn lowercase_input_decodes() {
        let (version, _) = decode_address(&ADDRESS.to_lowercase().replacen('s', "S", 1)).unwrap();
        assert_eq!(version, MAINNET_SINGLE_SIG);
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let mut corrupted = ADDRESS.to_string();
        corrupted.pop();
        corrupted.push('8');
        assert_eq!(decode_address(&corrupted), Err(C32Error::BadChecksum));
    }

    #[test]
    fn leading_zero_bytes_survive() {
        let data = [0u8, 0, 1, 2, 3];
        let encoded = encode(&data);
        assert!(encoded.starts_with("00"));
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn principal_validation() {
        assert!(is_valid_principal(ADDRESS));
        assert!(is_valid_principal(&format!("{ADDRESS}.sbtc-token")));
        assert!(!is_valid_principal("0x52908400098527886E0F7030069857D2E4169EE7"));
        assert!(!is_valid_principal(&format!("{ADDRESS}.")));
    }
}
