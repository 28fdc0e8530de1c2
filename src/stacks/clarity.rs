//! Clarity value wire codec (SIP-005 consensus serialization).
//!
//! Read-only contract calls take hex-encoded serialized values as arguments
//! and return a hex-encoded serialized value as the result.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::stacks::c32::{self, C32Error};

const TYPE_INT: u8 = 0x00;
const TYPE_UINT: u8 = 0x01;
const TYPE_BUFFER: u8 = 0x02;
const TYPE_TRUE: u8 = 0x03;
const TYPE_FALSE: u8 = 0x04;
const TYPE_PRINCIPAL_STANDARD: u8 = 0x05;
const TYPE_PRINCIPAL_CONTRACT: u8 = 0x06;
const TYPE_RESPONSE_OK: u8 = 0x07;
const TYPE_RESPONSE_ERR: u8 = 0x08;
const TYPE_OPTIONAL_NONE: u8 = 0x09;
const TYPE_OPTIONAL_SOME: u8 = 0x0a;
const TYPE_LIST: u8 = 0x0b;
const TYPE_TUPLE: u8 = 0x0c;
const TYPE_STRING_ASCII: u8 = 0x0d;
const TYPE_STRING_UTF8: u8 = 0x0e;

/// Nesting limit for decoding, matching the Clarity VM depth bound.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum ClarityError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unknown type prefix 0x{0:02x}")]
    UnknownType(u8),
    #[error("value nested deeper than {MAX_DEPTH} levels")]
    TooDeep,
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid utf-8 in string value")]
    Utf8,
    #[error("invalid principal: {0}")]
    Principal(#[from] C32Error),
    #[error("contract name must be 1-128 bytes: {0}")]
    ContractName(String),
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}

/// A Clarity value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    Int(i128),
    UInt(u128),
    Buffer(Vec<u8>),
    Bool(bool),
    StandardPrincipal {
        version: u8,
        hash160: [u8; 20],
    },
    ContractPrincipal {
        version: u8,
        hash160: [u8; 20],
        name: String,
    },
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    OptionalNone,
    OptionalSome(Box<ClarityValue>),
    List(Vec<ClarityValue>),
    Tuple(BTreeMap<String, ClarityValue>),
    StringAscii(String),
    StringUtf8(String),
}

impl ClarityValue {
    /// Build a principal value from `SP...` or `SP....contract-name`.
    pub fn principal(principal: &str) -> Result<Self, ClarityError> {
        match principal.split_once('.') {
            Some((address, name)) => {
                if name.is_empty() || name.len() > 128 {
                    return Err(ClarityError::ContractName(name.to_string()));
                }
                let (version, hash160) = c32::decode_address(address)?;
                Ok(Self::ContractPrincipal {
                    version,
                    hash160,
                    name: name.to_string(),
                })
            }
            None => {
                let (version, hash160) = c32::decode_address(principal)?;
                Ok(Self::StandardPrincipal { version, hash160 })
            }
        }
    }

    /// Serialize to consensus bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    /// Serialize to `0x`-prefixed hex, the form the node API expects.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.serialize()))
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Self::Int(v) => {
                out.push(TYPE_INT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::UInt(v) => {
                out.push(TYPE_UINT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::Buffer(bytes) => {
                out.push(TYPE_BUFFER);
                write_len_prefixed(out, bytes);
            }
            Self::Bool(true) => out.push(TYPE_TRUE),
            Self::Bool(false) => out.push(TYPE_FALSE),
            Self::StandardPrincipal { version, hash160 } => {
                out.push(TYPE_PRINCIPAL_STANDARD);
                out.push(*version);
                out.extend_from_slice(hash160);
            }
            Self::ContractPrincipal {
                version,
                hash160,
                name,
            } => {
                out.push(TYPE_PRINCIPAL_CONTRACT);
                out.push(*version);
                out.extend_from_slice(hash160);
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            }
            Self::ResponseOk(inner) => {
                out.push(TYPE_RESPONSE_OK);
                inner.write_to(out);
            }
            Self::ResponseErr(inner) => {
                out.push(TYPE_RESPONSE_ERR);
                inner.write_to(out);
            }
            Self::OptionalNone => out.push(TYPE_OPTIONAL_NONE),
            Self::OptionalSome(inner) => {
                out.push(TYPE_OPTIONAL_SOME);
                inner.write_to(out);
            }
            Self::List(items) => {
                out.push(TYPE_LIST);
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.write_to(out);
                }
            }
            Self::Tuple(fields) => {
                out.push(TYPE_TUPLE);
                out.extend_from_slice(&(fields.len() as u32).to_be_bytes());
                for (key, value) in fields {
                    out.push(key.len() as u8);
                    out.extend_from_slice(key.as_bytes());
                    value.write_to(out);
                }
            }
            Self::StringAscii(s) => {
                out.push(TYPE_STRING_ASCII);
                write_len_prefixed(out, s.as_bytes());
            }
            Self::StringUtf8(s) => {
                out.push(TYPE_STRING_UTF8);
                write_len_prefixed(out, s.as_bytes());
            }
        }
    }

    /// Decode a complete value from hex (with or without `0x`).
    pub fn from_hex(input: &str) -> Result<Self, ClarityError> {
        let bytes = hex::decode(input.trim_start_matches("0x"))?;
        Self::deserialize(&bytes)
    }

    /// Decode a complete value from bytes, rejecting trailing data.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, ClarityError> {
        let mut reader = Reader { bytes, pos: 0 };
        let value = reader.read_value(0)?;
        let remaining = bytes.len() - reader.pos;
        if remaining > 0 {
            return Err(ClarityError::TrailingBytes(remaining));
        }
        Ok(value)
    }

    /// Unwrap `(ok v)` to `v`; any other value is returned as is.
    pub fn into_ok(self) -> Result<Self, Self> {
        match self {
            Self::ResponseOk(inner) => Ok(*inner),
            Self::ResponseErr(inner) => Err(*inner),
            other => Ok(other),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) if *v >= 0 => Some(*v as u128),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::StringAscii(s) | Self::StringUtf8(s) => Some(s),
            _ => None,
        }
    }

    pub fn tuple_field(&self, key: &str) -> Option<&ClarityValue> {
        match self {
            Self::Tuple(fields) => fields.get(key),
            _ => None,
        }
    }

    /// Render a principal back to its address form.
    pub fn principal_string(&self) -> Option<String> {
        match self {
            Self::StandardPrincipal { version, hash160 } => {
                c32::encode_address(*version, hash160).ok()
            }
            Self::ContractPrincipal {
                version,
                hash160,
                name,
            } => c32::encode_address(*version, hash160)
                .ok()
                .map(|addr| format!("{addr}.{name}")),
            _ => None,
        }
    }
}

impl fmt::Display for ClarityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "u{v}"),
            Self::Buffer(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            Self::Bool(b) => write!(f, "{b}"),
            Self::StandardPrincipal { .. } | Self::ContractPrincipal { .. } => {
                write!(f, "{}", self.principal_string().unwrap_or_default())
            }
            Self::ResponseOk(inner) => write!(f, "(ok {inner})"),
            Self::ResponseErr(inner) => write!(f, "(err {inner})"),
            Self::OptionalNone => write!(f, "none"),
            Self::OptionalSome(inner) => write!(f, "(some {inner})"),
            Self::List(items) => {
                write!(f, "(list")?;
                for item in items {
                    write!(f, " {item}")?;
                }
                write!(f, ")")
            }
            Self::Tuple(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Self::StringAscii(s) | Self::StringUtf8(s) => write!(f, "\"{s}\""),
        }
    }
}

fn write_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ClarityError> {
        let end = self.pos.checked_add(n).ok_or(ClarityError::UnexpectedEof)?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(ClarityError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ClarityError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, ClarityError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn array16(&mut self) -> Result<[u8; 16], ClarityError> {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(self.take(16)?);
        Ok(buf)
    }

    fn hash160(&mut self) -> Result<[u8; 20], ClarityError> {
        let mut buf = [0u8; 20];
        buf.copy_from_slice(self.take(20)?);
        Ok(buf)
    }

    fn string(&mut self, len: usize) -> Result<String, ClarityError> {
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| ClarityError::Utf8)
    }

    fn read_value(&mut self, depth: usize) -> Result<ClarityValue, ClarityError> {
        if depth > MAX_DEPTH {
            return Err(ClarityError::TooDeep);
        }
        let prefix = self.u8()?;
        let value = match prefix {
            TYPE_INT => ClarityValue::Int(i128::from_be_bytes(self.array16()?)),
            TYPE_UINT => ClarityValue::UInt(u128::from_be_bytes(self.array16()?)),
            TYPE_BUFFER => {
                let len = self.u32()? as usize;
                ClarityValue::Buffer(self.take(len)?.to_vec())
            }
            TYPE_TRUE => ClarityValue::Bool(true),
            TYPE_FALSE => ClarityValue::Bool(false),
            TYPE_PRINCIPAL_STANDARD => ClarityValue::StandardPrincipal {
                version: self.u8()?,
                hash160: self.hash160()?,
            },
            TYPE_PRINCIPAL_CONTRACT => {
                let version = self.u8()?;
                let hash160 = self.hash160()?;
                let name_len = self.u8()? as usize;
                ClarityValue::ContractPrincipal {
                    version,
                    hash160,
                    name: self.string(name_len)?,
                }
            }
            TYPE_RESPONSE_OK => ClarityValue::ResponseOk(Box::new(self.read_value(depth + 1)?)),
            TYPE_RESPONSE_ERR => ClarityValue::ResponseErr(Box::new(self.read_value(depth + 1)?)),
            TYPE_OPTIONAL_NONE => ClarityValue::OptionalNone,
            TYPE_OPTIONAL_SOME => {
                ClarityValue::OptionalSome(Box::new(self.read_value(depth + 1)?))
            }
            TYPE_LIST => {
                let len = self.u32()? as usize;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.read_value(depth + 1)?);
                }
                ClarityValue::List(items)
            }
            TYPE_TUPLE => {
                let len = self.u32()? as usize;
                let mut fields = BTreeMap::new();
                for _ in 0..len {
                    let key_len = self.u8()? as usize;
                    let key = self.string(key_len)?;
                    let value = self.read_value(depth + 1)?;
                    fields.insert(key, value);
                }
                ClarityValue::Tuple(fields)
            }
            TYPE_STRING_ASCII => {
                let len = self.u32()? as usize;
                ClarityValue::StringAscii(self.string(len)?)
            }
            TYPE_STRING_UTF8 => {
                let len = self.u32()? as usize;
                ClarityValue::StringUtf8(self.string(len)?)
            }
            other => return Err(ClarityError::UnknownType(other)),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ok_uint() {
        // (ok u8)
        let value = ClarityValue::from_hex("0x070100000000000000000000000000000008").unwrap();
        assert_eq!(value.into_ok().unwrap().as_uint(), Some(8));
    }

    #[test]
    fn decodes_ok_true() {
        let value = ClarityValue::from_hex("0703").unwrap();
        assert_eq!(value, ClarityValue::ResponseOk(Box::new(ClarityValue::Bool(true))));
    }

    #[test]
    fn decodes_ok_ascii_symbol() {
        // (ok "sBTC")
        let value = ClarityValue::from_hex("070d0000000473425443").unwrap();
        assert_eq!(value.into_ok().unwrap().as_str(), Some("sBTC"));
    }

    #[test]
    fn principal_serialization_layout() {
        let value = ClarityValue::principal("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7").unwrap();
        assert_eq!(
            value.to_hex(),
            "0x0516a46ff88886c2ef9762d970b4d2c63678835bd39d"
        );

        let contract =
            ClarityValue::principal("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.token").unwrap();
        let bytes = contract.serialize();
        assert_eq!(bytes[0], 0x06);
        assert_eq!(bytes[22], 5);
        assert_eq!(&bytes[23..], b"token");
        assert_eq!(
            contract.principal_string().as_deref(),
            Some("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.token")
        );
    }

    #[test]
    fn tuple_fields_are_readable() {
        let mut fields = BTreeMap::new();
        fields.insert("fee-rate-x".to_string(), ClarityValue::UInt(500_000));
        fields.insert("fee-rate-y".to_string(), ClarityValue::UInt(300_000));
        let encoded = ClarityValue::ResponseOk(Box::new(ClarityValue::Tuple(fields))).to_hex();

        let decoded = ClarityValue::from_hex(&encoded).unwrap().into_ok().unwrap();
        assert_eq!(
            decoded.tuple_field("fee-rate-y").and_then(ClarityValue::as_uint),
            Some(300_000)
        );
    }

    #[test]
    fn err_response_surfaces_inner_value() {
        // (err u101)
        let value = ClarityValue::from_hex("080100000000000000000000000000000065").unwrap();
        assert_eq!(value.into_ok().unwrap_err().as_uint(), Some(101));
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(matches!(
            ClarityValue::from_hex("0x0100000000"),
            Err(ClarityError::UnexpectedEof)
        ));
        assert!(matches!(
            ClarityValue::from_hex("0x0303"),
            Err(ClarityError::TrailingBytes(1))
        ));
    }
}
