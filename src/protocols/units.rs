//! Fixed-point amount conversion.
//!
//! On-chain amounts are integers scaled by `10^decimals`. Conversion splits
//! the integer exactly and only then parses the decimal string, so values
//! like `2500750000` micro-STX come out as exactly `2500.75`.

use anyhow::{bail, Context, Result};

/// Decimals of native STX (micro-STX).
pub const STX_DECIMALS: u32 = 6;

/// Decimals of sBTC (satoshis).
pub const SBTC_DECIMALS: u32 = 8;

/// Decimals of ALEX fee rates.
pub const ALEX_FEE_DECIMALS: u32 = 8;

/// Render `raw / 10^decimals` as a decimal string without trailing zeros.
pub fn fixed_point_string(raw: u128, decimals: u32) -> Result<String> {
    let scale = 10u128
        .checked_pow(decimals)
        .with_context(|| format!("Unsupported decimals: {}", decimals))?;
    let whole = raw / scale;
    let frac = raw % scale;
    if frac == 0 {
        return Ok(whole.to_string());
    }
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    Ok(format!("{}.{}", whole, frac.trim_end_matches('0')))
}

/// Convert a fixed-point integer into a float.
pub fn fixed_point_to_f64(raw: u128, decimals: u32) -> Result<f64> {
    let text = fixed_point_string(raw, decimals)?;
    text.parse::<f64>()
        .with_context(|| format!("Failed to parse amount {}", text))
}

/// Parse an integer amount delivered as a decimal string (indexer style).
pub fn parse_raw_amount(value: &str) -> Result<u128> {
    let value = value.trim();
    if value.is_empty() {
        bail!("Empty amount");
    }
    value
        .parse::<u128>()
        .with_context(|| format!("Invalid integer amount: {}", value))
}

/// Micro-STX string to STX.
pub fn micro_stx_to_stx(value: &str) -> Result<f64> {
    fixed_point_to_f64(parse_raw_amount(value)?, STX_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_split_before_parse() {
        assert_eq!(fixed_point_string(2_500_750_000, 6).unwrap(), "2500.75");
        assert_eq!(fixed_point_to_f64(2_500_750_000, 6).unwrap(), 2500.75);
        assert_eq!(fixed_point_string(1, 8).unwrap(), "0.00000001");
        assert_eq!(fixed_point_string(300_000, 8).unwrap(), "0.003");
        assert_eq!(fixed_point_string(42, 0).unwrap(), "42");
    }

    #[test]
    fn available_is_computed_in_integers() {
        let total = parse_raw_amount("2500750000").unwrap();
        let locked = parse_raw_amount("500250000").unwrap();
        assert_eq!(fixed_point_to_f64(total - locked, 6).unwrap(), 2000.5);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_raw_amount("").is_err());
        assert!(parse_raw_amount("-5").is_err());
        assert!(parse_raw_amount("1.5").is_err());
        assert!(fixed_point_string(1, 60).is_err());
    }

    #[test]
    fn micro_stx_conversion() {
        assert_eq!(micro_stx_to_stx("1000000").unwrap(), 1.0);
        assert_eq!(micro_stx_to_stx("0").unwrap(), 0.0);
    }
}
