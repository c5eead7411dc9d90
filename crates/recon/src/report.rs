use crate::classify::{Classification, ReasonTally, SenderRow};
use crate::sampler::{SamplingStats, StatusPeaks, StopReason};
use crate::state::{AggregatedState, MatchRecord, SearchTargets};
use scout_core::{NormalizedAddress, NormalizedHash, QueueReason, RawSummary};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

const RULE: &str = "============================================================";

const FLOOR_NOTE: &str = "Note: transactions below the node's floor are generally rejected \
and will not appear in pending or queued. EIP-1559 fee-capped txs below base fee may be \
retained in the queue until base fee drops.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashFindings {
    pub count: usize,
    pub missing_count: usize,
    pub transactions: BTreeMap<NormalizedHash, MatchRecord>,
    pub missing_hashes: Vec<NormalizedHash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressFindings {
    pub count: usize,
    pub addresses: BTreeMap<NormalizedAddress, usize>,
    pub transactions: BTreeMap<NormalizedAddress, Vec<MatchRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub rpc_url: String,
    pub search_hits: u32,
    pub target_hashes: Vec<NormalizedHash>,
    pub target_addresses: Vec<NormalizedAddress>,
    pub search_stats: SamplingStats,
    pub found_by_hash: HashFindings,
    pub found_by_address: AddressFindings,
}

impl SearchReport {
    pub fn build(
        rpc_url: &str,
        search_hits: u32,
        targets: &SearchTargets,
        stats: SamplingStats,
        state: &AggregatedState,
    ) -> Self {
        let transactions: BTreeMap<_, _> = targets
            .hashes
            .iter()
            .filter_map(|hash| {
                state
                    .found_by_hash
                    .get(hash)
                    .map(|record| (hash.clone(), record.clone()))
            })
            .collect();
        let missing_hashes: Vec<_> = targets
            .hashes
            .iter()
            .filter(|hash| !transactions.contains_key(*hash))
            .cloned()
            .collect();

        let by_address: BTreeMap<_, Vec<MatchRecord>> = state
            .found_by_address
            .iter()
            .map(|(address, observations)| {
                (address.clone(), observations.values().cloned().collect())
            })
            .collect();
        let addresses: BTreeMap<_, _> = by_address
            .iter()
            .map(|(address, records)| (address.clone(), records.len()))
            .collect();

        Self {
            rpc_url: rpc_url.to_string(),
            search_hits,
            target_hashes: targets.hashes.clone(),
            target_addresses: targets.addresses.clone(),
            search_stats: stats,
            found_by_hash: HashFindings {
                count: transactions.len(),
                missing_count: missing_hashes.len(),
                transactions,
                missing_hashes,
            },
            found_by_address: AddressFindings {
                count: addresses.values().sum(),
                addresses,
                transactions: by_address,
            },
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let stats = &self.search_stats;

        let _ = writeln!(out, "{RULE}\nSEARCH RESULTS\n{RULE}");
        let _ = writeln!(out, "\nSearch Statistics:");
        let _ = writeln!(out, "  Total RPC hits: {}", stats.total_hits);
        let _ = writeln!(out, "  Successful hits: {}", stats.successful_hits);
        let _ = writeln!(out, "  Failed hits: {}", stats.failed_hits);
        let _ = writeln!(out, "  Pending searches: {}", stats.pending_searches);
        let _ = writeln!(out, "  Queued searches: {}", stats.queued_searches);
        let _ = writeln!(out, "  Skipped entries: {}", stats.skipped_entries);
        let _ = writeln!(out, "  Stopped: {}", stop_label(stats));

        let _ = writeln!(out, "\nSearch Results:");
        if !self.target_hashes.is_empty() {
            let _ = writeln!(
                out,
                "  Transaction Hashes Found: {}/{}",
                self.found_by_hash.count,
                self.target_hashes.len()
            );
            if self.found_by_hash.missing_count > 0 {
                let _ = writeln!(out, "  Missing Hashes: {}", self.found_by_hash.missing_count);
            }
        }
        if !self.target_addresses.is_empty() {
            let _ = writeln!(
                out,
                "  Transactions by Address: {} total",
                self.found_by_address.count
            );
            for address in &self.target_addresses {
                let count = self
                    .found_by_address
                    .addresses
                    .get(address)
                    .copied()
                    .unwrap_or_default();
                let _ = writeln!(out, "    {address}: {count} transactions");
            }
        }

        if self.found_by_hash.count > 0 {
            let _ = writeln!(out, "\nFound Transactions (by hash):");
            for hash in &self.target_hashes {
                let Some(record) = self.found_by_hash.transactions.get(hash) else {
                    let _ = writeln!(out, "\n  {hash}: NOT FOUND");
                    continue;
                };
                let _ = writeln!(out, "\n  {hash}:");
                let _ = writeln!(out, "    Status: {}", record.status);
                let _ = writeln!(out, "    Address: {}", record.sender);
                let _ = writeln!(out, "    Nonce: {}", record.nonce);
                let _ = writeln!(out, "    Found in hit: {}", record.found_in_hit);
                let _ = writeln!(out, "    Last seen in hit: {}", record.last_seen_in_hit);
                write_details(&mut out, &record.summary, "    ", true);
            }
        }

        if self.found_by_address.count > 0 {
            let _ = writeln!(out, "\nFound Transactions (by address):");
            for (address, records) in &self.found_by_address.transactions {
                let _ = writeln!(
                    out,
                    "\n  Address: {address} ({} transactions)",
                    records.len()
                );
                for record in records {
                    let hash = record
                        .hash
                        .as_ref()
                        .map(NormalizedHash::as_str)
                        .unwrap_or("N/A");
                    let _ = writeln!(
                        out,
                        "    Nonce {}: {hash} ({}, hit {})",
                        record.nonce, record.status, record.found_in_hit
                    );
                    write_details(&mut out, &record.summary, "      ", false);
                }
            }
        }

        if !self.found_by_hash.missing_hashes.is_empty() {
            let _ = writeln!(out, "\nMissing Transaction Hashes (not found within budget):");
            for hash in &self.found_by_hash.missing_hashes {
                let _ = writeln!(out, "  - {hash}");
            }
        }
        out
    }

    pub fn render(&self) -> serde_json::Result<String> {
        let mut out = self.render_text();
        let _ = writeln!(out, "\n{RULE}\nJSON OUTPUT\n{RULE}");
        out.push_str(&serde_json::to_string_pretty(self)?);
        out.push('\n');
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeHeader {
    pub rpc_url: String,
    pub samples: u32,
    pub inspect_hits: u32,
    pub gas_price_floor_gwei: f64,
    pub consolidated_limit: usize,
    pub top_senders_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub rpc_url: String,
    pub samples: u32,
    pub inspect_hits: u32,
    pub gas_price_floor_gwei: f64,
    pub max_pending: u64,
    pub max_queued: u64,
    pub status_polls: StatusPeaks,
    pub inspect_stats: SamplingStats,
    pub queued_unique: usize,
    pub queued_reasons: ReasonTally,
    pub synthesized_nonce_gap_addresses: usize,
    pub top_senders: Vec<(NormalizedAddress, u64)>,
    pub consolidated_limit: usize,
    pub consolidated: Vec<SenderRow>,
}

impl ProbeReport {
    pub fn build(
        header: ProbeHeader,
        peaks: StatusPeaks,
        stats: SamplingStats,
        state: &AggregatedState,
        classification: &Classification,
        rows: Vec<SenderRow>,
    ) -> Self {
        let synthesized_nonce_gap_addresses =
            rows.iter().filter(|row| row.has_union_nonce_gap).count();

        let mut top_senders: Vec<_> = classification
            .by_sender
            .iter()
            .map(|(address, tally)| (address.clone(), tally.total()))
            .collect();
        top_senders.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_senders.truncate(header.top_senders_limit);

        Self {
            rpc_url: header.rpc_url,
            samples: header.samples,
            inspect_hits: header.inspect_hits,
            gas_price_floor_gwei: header.gas_price_floor_gwei,
            max_pending: peaks.max_pending,
            max_queued: peaks.max_queued,
            status_polls: peaks,
            inspect_stats: stats,
            queued_unique: state.queued_entries.len(),
            queued_reasons: classification.totals.clone(),
            synthesized_nonce_gap_addresses,
            top_senders,
            consolidated_limit: header.consolidated_limit,
            consolidated: rank_senders(rows, header.consolidated_limit),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{RULE}\nTXPOOL PROBE\n{RULE}");
        let _ = writeln!(out, "\nPool size (peak over {} status polls):", self.samples);
        let _ = writeln!(out, "  Pending: {}", self.max_pending);
        let _ = writeln!(out, "  Queued: {}", self.max_queued);
        let _ = writeln!(
            out,
            "  Polls ok/failed: {}/{}",
            self.status_polls.successful_polls, self.status_polls.failed_polls
        );

        let stats = &self.inspect_stats;
        let _ = writeln!(out, "\nInspect rounds:");
        let _ = writeln!(
            out,
            "  Hits ok/failed: {}/{} of {}",
            stats.successful_hits, stats.failed_hits, stats.total_hits
        );
        let _ = writeln!(out, "  Skipped entries: {}", stats.skipped_entries);
        let _ = writeln!(out, "  Stopped: {}", stop_label(stats));

        let _ = writeln!(
            out,
            "\nQueued entries: {} unique (floor {} gwei)",
            self.queued_unique, self.gas_price_floor_gwei
        );
        for reason in QueueReason::ALL {
            let _ = writeln!(out, "  {reason}: {}", self.queued_reasons.get(reason));
        }
        let _ = writeln!(
            out,
            "  Senders with a union nonce gap: {}",
            self.synthesized_nonce_gap_addresses
        );

        if !self.top_senders.is_empty() {
            let _ = writeln!(out, "\nTop senders by queued entries:");
            for (address, count) in &self.top_senders {
                let _ = writeln!(out, "  {address}: {count}");
            }
        }
        out
    }

    pub fn render(&self) -> serde_json::Result<String> {
        let mut out = self.render_text();
        let _ = writeln!(out, "\n{RULE}\nJSON OUTPUT\n{RULE}");
        out.push_str(&serde_json::to_string_pretty(self)?);
        let _ = write!(out, "\n\n{FLOOR_NOTE}\n");
        Ok(out)
    }
}

pub fn rank_senders(mut rows: Vec<SenderRow>, limit: usize) -> Vec<SenderRow> {
    rows.sort_by(|a, b| {
        (b.queued_count, b.pending_count)
            .cmp(&(a.queued_count, a.pending_count))
            .then_with(|| a.address.cmp(&b.address))
    });
    rows.truncate(limit);
    rows
}

fn stop_label(stats: &SamplingStats) -> &'static str {
    match stats.stop_reason {
        StopReason::BudgetExhausted => "budget exhausted",
        StopReason::AllHashesFound => "all target hashes found",
        StopReason::Cancelled => "cancelled",
    }
}

fn write_details(out: &mut String, summary: &RawSummary, indent: &str, with_gas: bool) {
    match summary {
        RawSummary::Text(text) => {
            let _ = writeln!(out, "{indent}Summary: {text}");
        }
        RawSummary::Fields(_) => {
            let field = |name: &str| summary.field(name).unwrap_or("N/A");
            let _ = writeln!(out, "{indent}Gas Price: {}", field("gasPrice"));
            if with_gas {
                let _ = writeln!(out, "{indent}Gas Limit: {}", field("gas"));
            }
            let _ = writeln!(out, "{indent}To: {}", field("to"));
            let _ = writeln!(out, "{indent}Value: {}", field("value"));
        }
    }
}
