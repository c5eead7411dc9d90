use scout_core::{
    EntryStatus, NormalizedAddress, NormalizedHash, PoolEntry, PoolSnapshot, RawSummary,
};
use scout_core::utils::{parse_address_list, parse_hash_list};
use scout_core::Error;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const NO_TARGETS: &str =
    "no transaction hashes or addresses provided; pass --hashes and/or --addresses";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTargets {
    pub hashes: Vec<NormalizedHash>,
    pub addresses: Vec<NormalizedAddress>,
}

impl SearchTargets {
    pub fn new(hashes: Vec<NormalizedHash>, addresses: Vec<NormalizedAddress>) -> Self {
        Self { hashes, addresses }
    }

    // Fails when both lists are blank, before any node is contacted.
    pub fn parse(hashes: &str, addresses: &str) -> scout_core::Result<Self> {
        let targets = Self::new(parse_hash_list(hashes)?, parse_address_list(addresses)?);
        if targets.is_empty() {
            return Err(Error::Usage(NO_TARGETS.to_string()));
        }
        Ok(targets)
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty() && self.addresses.is_empty()
    }

    fn has_hash(&self, hash: &NormalizedHash) -> bool {
        self.hashes.contains(hash)
    }

    fn has_address(&self, address: &NormalizedAddress) -> bool {
        self.addresses.contains(address)
    }

    pub fn all_hashes_found(&self, state: &AggregatedState) -> bool {
        !self.hashes.is_empty()
            && self
                .hashes
                .iter()
                .all(|hash| state.found_by_hash.contains_key(hash))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestMode {
    Search,
    Classify,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub status: EntryStatus,
    #[serde(rename = "address")]
    pub sender: NormalizedAddress,
    pub nonce: u64,
    pub hash: Option<NormalizedHash>,
    pub found_in_hit: u32,
    pub last_seen_in_hit: u32,
    #[serde(rename = "data")]
    pub summary: RawSummary,
}

impl MatchRecord {
    fn observed(status: EntryStatus, entry: &PoolEntry, hit_index: u32) -> Self {
        Self {
            status,
            sender: entry.sender.clone(),
            nonce: entry.nonce,
            hash: entry.hash.clone(),
            found_in_hit: hit_index,
            last_seen_in_hit: hit_index,
            summary: entry.summary.clone(),
        }
    }

    fn absorb(&mut self, other: MatchRecord) {
        let first_seen = |r: &MatchRecord| (r.found_in_hit, r.status, r.sender.clone(), r.nonce);
        if first_seen(&other) < first_seen(self) {
            self.found_in_hit = other.found_in_hit;
            self.status = other.status;
            self.sender = other.sender.clone();
            self.nonce = other.nonce;
        }
        if (other.last_seen_in_hit, &other.hash, &other.summary)
            > (self.last_seen_in_hit, &self.hash, &self.summary)
        {
            self.last_seen_in_hit = other.last_seen_in_hit;
            self.hash = other.hash;
            self.summary = other.summary;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObservationKey {
    pub nonce: u64,
    pub hit_index: u32,
    pub status: EntryStatus,
    pub hash: Option<NormalizedHash>,
    pub summary: RawSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueuedEntry {
    pub address: NormalizedAddress,
    pub nonce: u64,
    pub summary: RawSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedState {
    pub pending_nonces: BTreeMap<NormalizedAddress, BTreeSet<u64>>,
    pub queued_entries: BTreeSet<QueuedEntry>,
    pub found_by_hash: BTreeMap<NormalizedHash, MatchRecord>,
    pub found_by_address: BTreeMap<NormalizedAddress, BTreeMap<ObservationKey, MatchRecord>>,
}

impl AggregatedState {
    pub fn from_snapshot(
        snapshot: &PoolSnapshot,
        hit_index: u32,
        targets: &SearchTargets,
        mode: IngestMode,
    ) -> Self {
        let mut state = Self::default();

        for (address, entries) in &snapshot.pending {
            state
                .pending_nonces
                .entry(address.clone())
                .or_default()
                .extend(entries.iter().map(|entry| entry.nonce));
        }

        for (status, entry) in snapshot.entries() {
            if let Some(hash) = entry.hash.as_ref().filter(|hash| targets.has_hash(hash)) {
                let record = MatchRecord::observed(status, entry, hit_index);
                merge_record(&mut state.found_by_hash, hash.clone(), record);
            }
            if targets.has_address(&entry.sender) {
                let key = ObservationKey {
                    nonce: entry.nonce,
                    hit_index,
                    status,
                    hash: entry.hash.clone(),
                    summary: entry.summary.clone(),
                };
                state
                    .found_by_address
                    .entry(entry.sender.clone())
                    .or_default()
                    .insert(key, MatchRecord::observed(status, entry, hit_index));
            }
        }

        if mode == IngestMode::Classify {
            state.queued_entries = snapshot
                .queued
                .values()
                .flatten()
                .map(|entry| QueuedEntry {
                    address: entry.sender.clone(),
                    nonce: entry.nonce,
                    summary: entry.summary.clone(),
                })
                .collect();
        }

        state
    }

    pub fn ingest(
        &mut self,
        snapshot: &PoolSnapshot,
        hit_index: u32,
        targets: &SearchTargets,
        mode: IngestMode,
    ) {
        self.merge(Self::from_snapshot(snapshot, hit_index, targets, mode));
    }

    // Union on every field: order and repetition of rounds do not matter.
    pub fn merge(&mut self, other: AggregatedState) {
        for (address, nonces) in other.pending_nonces {
            self.pending_nonces.entry(address).or_default().extend(nonces);
        }
        self.queued_entries.extend(other.queued_entries);
        for (hash, record) in other.found_by_hash {
            merge_record(&mut self.found_by_hash, hash, record);
        }
        for (address, observations) in other.found_by_address {
            self.found_by_address
                .entry(address)
                .or_default()
                .extend(observations);
        }
    }

    pub fn queued_nonces(&self) -> BTreeMap<NormalizedAddress, BTreeSet<u64>> {
        let mut out: BTreeMap<NormalizedAddress, BTreeSet<u64>> = BTreeMap::new();
        for entry in &self.queued_entries {
            out.entry(entry.address.clone())
                .or_default()
                .insert(entry.nonce);
        }
        out
    }
}

fn merge_record(
    records: &mut BTreeMap<NormalizedHash, MatchRecord>,
    hash: NormalizedHash,
    record: MatchRecord,
) {
    match records.get_mut(&hash) {
        Some(existing) => existing.absorb(record),
        None => {
            records.insert(hash, record);
        }
    }
}
