use serde_json::Value;

use crate::error::FormatError;
use crate::types::{NormalizedAddress, NormalizedHash};

const HASH_HEX_LEN: usize = 64;
const ADDRESS_HEX_LEN: usize = 40;

pub fn normalize_hash(raw: &str) -> Result<NormalizedHash, FormatError> {
    canonical_hex(raw, "hash", HASH_HEX_LEN).map(NormalizedHash)
}

pub fn normalize_address(raw: &str) -> Result<NormalizedAddress, FormatError> {
    canonical_hex(raw, "address", ADDRESS_HEX_LEN).map(NormalizedAddress)
}

pub fn parse_nonce(raw: &str) -> Result<u64, FormatError> {
    let quantity = parse_quantity(raw)?;
    u64::try_from(quantity).map_err(|_| FormatError::InvalidQuantity {
        raw: raw.to_string(),
    })
}

pub fn nonce_from_value(value: &Value) -> Result<u64, FormatError> {
    match value {
        Value::Number(number) => number.as_u64().ok_or_else(|| FormatError::InvalidQuantity {
            raw: number.to_string(),
        }),
        Value::String(raw) => parse_nonce(raw),
        other => Err(FormatError::Shape {
            what: "nonce",
            found: other.to_string(),
        }),
    }
}

pub fn parse_quantity(raw: &str) -> Result<u128, FormatError> {
    let trimmed = raw.trim();
    let invalid = || FormatError::InvalidQuantity {
        raw: raw.to_string(),
    };
    if let Some(digits) = strip_hex_prefix(trimmed) {
        if digits.is_empty() {
            return Err(invalid());
        }
        u128::from_str_radix(digits, 16).map_err(|_| invalid())
    } else {
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        trimmed.parse::<u128>().map_err(|_| invalid())
    }
}

pub fn quantity_from_value(value: &Value) -> Result<u128, FormatError> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| FormatError::InvalidQuantity {
                raw: number.to_string(),
            }),
        Value::String(raw) => parse_quantity(raw),
        other => Err(FormatError::Shape {
            what: "quantity",
            found: other.to_string(),
        }),
    }
}

fn strip_hex_prefix(raw: &str) -> Option<&str> {
    raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))
}

fn canonical_hex(raw: &str, kind: &'static str, hex_len: usize) -> Result<String, FormatError> {
    let trimmed = raw.trim();
    let digits = strip_hex_prefix(trimmed).unwrap_or(trimmed);
    let invalid = |reason: String| FormatError::InvalidHex {
        kind,
        raw: raw.to_string(),
        reason,
    };
    if digits.len() != hex_len {
        return Err(invalid(format!(
            "expected {hex_len} hex digits, got {}",
            digits.len()
        )));
    }
    hex::decode(digits).map_err(|err| invalid(err.to_string()))?;
    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HASH: &str = "0xAbCdEf0000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn hash_is_lowercased_and_prefixed() {
        let normalized = normalize_hash(&HASH[2..]).unwrap();
        assert_eq!(
            normalized.as_str(),
            "0xabcdef0000000000000000000000000000000000000000000000000000000001"
        );
        assert_eq!(normalize_hash(HASH).unwrap(), normalized);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_hash(HASH).unwrap();
        let twice = normalize_hash(once.as_str()).unwrap();
        assert_eq!(once, twice);

        let addr = normalize_address("  0X00000000000000000000000000000000000000Ff ").unwrap();
        assert_eq!(addr.as_str(), "0x00000000000000000000000000000000000000ff");
        assert_eq!(normalize_address(addr.as_str()).unwrap(), addr);
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert!(matches!(
            normalize_hash("0x1234"),
            Err(FormatError::InvalidHex { kind: "hash", .. })
        ));
        assert!(normalize_address("0xzz00000000000000000000000000000000000000").is_err());
        assert!(normalize_address("").is_err());
    }

    #[test]
    fn nonce_accepts_hex_and_decimal() {
        assert_eq!(parse_nonce("0x1f").unwrap(), 31);
        assert_eq!(parse_nonce("31").unwrap(), 31);
        assert_eq!(nonce_from_value(&json!(7)).unwrap(), 7);
        assert_eq!(nonce_from_value(&json!("0x7")).unwrap(), 7);
        assert!(parse_nonce("-1").is_err());
        assert!(parse_nonce("0x").is_err());
        assert!(nonce_from_value(&json!(null)).is_err());
    }

    #[test]
    fn quantity_handles_wei_sized_values() {
        assert_eq!(parse_quantity("0x3b9aca00").unwrap(), 1_000_000_000);
        assert_eq!(
            quantity_from_value(&json!("500000000")).unwrap(),
            500_000_000
        );
        assert!(parse_quantity("12 gwei").is_err());
    }
}
