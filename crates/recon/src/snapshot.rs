use scout_core::normalize::{normalize_address, normalize_hash, parse_nonce};
use scout_core::{FormatError, NormalizedAddress, PoolEntry, PoolSnapshot, RawSummary};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

type SenderEntries = BTreeMap<NormalizedAddress, BTreeSet<PoolEntry>>;

pub fn decode_snapshot(result: &Value) -> Result<PoolSnapshot, FormatError> {
    let root = match result {
        Value::Object(root) => root,
        Value::Null => return Ok(PoolSnapshot::default()),
        other => {
            return Err(FormatError::Shape {
                what: "txpool result",
                found: truncate(other.to_string()),
            })
        }
    };

    let mut snapshot = PoolSnapshot::default();
    if let Some(Value::Object(pending)) = root.get("pending") {
        snapshot.has_pending = true;
        snapshot.skipped += decode_section(pending, &mut snapshot.pending);
    }
    if let Some(Value::Object(queued)) = root.get("queued") {
        snapshot.has_queued = true;
        snapshot.skipped += decode_section(queued, &mut snapshot.queued);
    }
    Ok(snapshot)
}

fn decode_section(section: &Map<String, Value>, out: &mut SenderEntries) -> usize {
    let mut skipped = 0;
    for (raw_sender, by_nonce) in section {
        let Value::Object(by_nonce) = by_nonce else {
            debug!(sender = %raw_sender, "skipping sender without nonce map");
            skipped += 1;
            continue;
        };
        let sender = match normalize_address(raw_sender) {
            Ok(sender) => sender,
            Err(err) => {
                debug!(%err, "skipping malformed sender");
                skipped += by_nonce.len().max(1);
                continue;
            }
        };
        for (raw_nonce, tx) in by_nonce {
            match decode_entry(&sender, raw_nonce, tx) {
                Ok(entry) => {
                    out.entry(sender.clone()).or_default().insert(entry);
                }
                Err(err) => {
                    debug!(%sender, %err, "skipping malformed pool entry");
                    skipped += 1;
                }
            }
        }
    }
    skipped
}

fn decode_entry(
    sender: &NormalizedAddress,
    raw_nonce: &str,
    tx: &Value,
) -> Result<PoolEntry, FormatError> {
    let nonce = parse_nonce(raw_nonce)?;
    let (hash, summary) = match tx {
        Value::String(text) => (None, RawSummary::Text(text.clone())),
        Value::Object(fields) => {
            let hash = match fields.get("hash") {
                Some(Value::String(raw)) => Some(normalize_hash(raw)?),
                Some(Value::Null) | None => None,
                Some(other) => {
                    return Err(FormatError::Shape {
                        what: "transaction hash",
                        found: truncate(other.to_string()),
                    })
                }
            };
            (hash, RawSummary::Fields(flatten(fields)))
        }
        other => {
            return Err(FormatError::Shape {
                what: "transaction summary",
                found: truncate(other.to_string()),
            })
        }
    };
    Ok(PoolEntry {
        sender: sender.clone(),
        nonce,
        hash,
        summary,
    })
}

fn flatten(fields: &Map<String, Value>) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn truncate(mut raw: String) -> String {
    const LIMIT: usize = 80;
    if raw.len() > LIMIT {
        let mut cut = LIMIT;
        while !raw.is_char_boundary(cut) {
            cut -= 1;
        }
        raw.truncate(cut);
        raw.push_str("...");
    }
    raw
}
