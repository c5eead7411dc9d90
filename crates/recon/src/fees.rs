use scout_core::normalize::parse_quantity;
use scout_core::RawSummary;

const FEE_CAP_FIELDS: &[&str] = &["feeCap", "maxFeePerGas"];
const TIP_FIELDS: &[&str] = &["tip", "maxPriorityFeePerGas"];
const GAS_PRICE_FIELDS: &[&str] = &["gasprice", "gasPrice"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeSummary {
    pub legacy_gas_price: Option<u128>,
    pub fee_cap: Option<u128>,
    pub tip: Option<u128>,
}

impl FeeSummary {
    pub fn decode(summary: &RawSummary) -> Self {
        match summary {
            RawSummary::Text(text) => Self {
                legacy_gas_price: scan_first(text, GAS_PRICE_FIELDS),
                fee_cap: scan_first(text, FEE_CAP_FIELDS),
                tip: scan_first(text, TIP_FIELDS),
            },
            RawSummary::Fields(_) => {
                let fee_cap = field_first(summary, FEE_CAP_FIELDS);
                // Dynamic-fee objects also report gasPrice (set to the fee cap
                // while pending), so it only counts as a legacy price when no
                // cap is present.
                let legacy_gas_price = match fee_cap {
                    Some(_) => None,
                    None => field_first(summary, GAS_PRICE_FIELDS),
                };
                Self {
                    legacy_gas_price,
                    fee_cap,
                    tip: field_first(summary, TIP_FIELDS),
                }
            }
        }
    }
}

fn field_first(summary: &RawSummary, names: &[&str]) -> Option<u128> {
    names
        .iter()
        .filter_map(|name| summary.field(name))
        .find_map(|raw| parse_quantity(raw).ok())
}

fn scan_first(text: &str, names: &[&str]) -> Option<u128> {
    let haystack = text.to_ascii_lowercase();
    names
        .iter()
        .find_map(|name| scan_field(&haystack, &name.to_ascii_lowercase()))
}

fn scan_field(haystack: &str, name: &str) -> Option<u128> {
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(offset) = haystack[from..].find(name) {
        let start = from + offset;
        from = start + name.len();
        if start > 0 && bytes[start - 1].is_ascii_alphanumeric() {
            continue;
        }
        let rest = haystack[from..].trim_start();
        let Some(rest) = rest.strip_prefix([':', '=']) else {
            continue;
        };
        if let Some(value) = leading_quantity(rest.trim_start()) {
            return Some(value);
        }
    }
    None
}

fn leading_quantity(raw: &str) -> Option<u128> {
    let token = if let Some(hex) = raw.strip_prefix("0x") {
        let digits = hex.bytes().take_while(u8::is_ascii_hexdigit).count();
        &raw[..2 + digits]
    } else {
        let digits = raw.bytes().take_while(u8::is_ascii_digit).count();
        &raw[..digits]
    };
    parse_quantity(token).ok()
}

#[cfg(test)]
mod tests {
    use super::FeeSummary;
    use scout_core::RawSummary;
    use std::collections::BTreeMap;

    fn text(raw: &str) -> FeeSummary {
        FeeSummary::decode(&RawSummary::Text(raw.to_string()))
    }

    #[test]
    fn text_summary_accepts_short_and_canonical_names() {
        let fees = text("to: 0xabc feeCap: 0x14, tip = 2");
        assert_eq!(fees.fee_cap, Some(20));
        assert_eq!(fees.tip, Some(2));
        assert_eq!(fees.legacy_gas_price, None);

        let fees = text("maxFeePerGas=30 maxPriorityFeePerGas: 0x1");
        assert_eq!(fees.fee_cap, Some(30));
        assert_eq!(fees.tip, Some(1));
    }

    #[test]
    fn first_listed_name_wins() {
        let fees = text("maxFeePerGas: 99 feeCap: 10");
        assert_eq!(fees.fee_cap, Some(10));
    }

    #[test]
    fn gas_price_matching_is_case_insensitive() {
        assert_eq!(text("GASPRICE: 500000000").legacy_gas_price, Some(500_000_000));
        assert_eq!(text("gasPrice=0x1dcd6500").legacy_gas_price, Some(500_000_000));
    }

    #[test]
    fn names_inside_other_words_do_not_match() {
        let fees = text("multip: 5 gasprice: none");
        assert_eq!(fees, FeeSummary::default());
    }

    #[test]
    fn geth_inspect_line_carries_no_named_fields() {
        let fees = text("0x00000000000000000000000000000000000000bb: 0 wei + 21000 gas × 1000000000 wei");
        assert_eq!(fees, FeeSummary::default());
    }

    #[test]
    fn object_summary_prefers_fee_cap_over_reported_gas_price() {
        let fields = BTreeMap::from([
            ("gasPrice".to_string(), "0x64".to_string()),
            ("maxFeePerGas".to_string(), "0x64".to_string()),
            ("maxPriorityFeePerGas".to_string(), "0x1".to_string()),
        ]);
        let fees = FeeSummary::decode(&RawSummary::Fields(fields));
        assert_eq!(fees.fee_cap, Some(100));
        assert_eq!(fees.tip, Some(1));
        assert_eq!(fees.legacy_gas_price, None);

        let legacy = BTreeMap::from([("gasPrice".to_string(), "0x64".to_string())]);
        let fees = FeeSummary::decode(&RawSummary::Fields(legacy));
        assert_eq!(fees.legacy_gas_price, Some(100));
        assert_eq!(fees.fee_cap, None);
    }
}
