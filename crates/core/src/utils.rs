use crate::error::{Error, FormatError, Result};
use crate::normalize::{normalize_address, normalize_hash};
use crate::types::{NormalizedAddress, NormalizedHash};

pub const GWEI: u128 = 1_000_000_000;

pub fn gwei_to_wei(gwei: f64) -> u128 {
    if !gwei.is_finite() || gwei <= 0.0 {
        return 0;
    }
    (gwei * GWEI as f64) as u128
}

pub fn parse_hash_list(raw: &str) -> Result<Vec<NormalizedHash>> {
    parse_list(raw, normalize_hash)
}

pub fn parse_address_list(raw: &str) -> Result<Vec<NormalizedAddress>> {
    parse_list(raw, normalize_address)
}

fn parse_list<T: PartialEq>(
    raw: &str,
    normalize: fn(&str) -> std::result::Result<T, FormatError>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let value = normalize(item).map_err(|err| Error::Usage(err.to_string()))?;
        if !out.contains(&value) {
            out.push(value);
        }
    }
    Ok(out)
}
