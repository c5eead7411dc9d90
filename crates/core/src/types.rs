use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::FormatError;
use crate::normalize::{normalize_address, normalize_hash};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedHash(pub(crate) String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedAddress(pub(crate) String);

impl NormalizedHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl NormalizedAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for NormalizedHash {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_hash(s)
    }
}

impl FromStr for NormalizedAddress {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_address(s)
    }
}

impl fmt::Display for NormalizedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for NormalizedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Queued,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Queued => f.write_str("queued"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum RawSummary {
    Text(String),
    Fields(BTreeMap<String, String>),
}

impl RawSummary {
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Fields(fields) => fields.get(name).map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolEntry {
    pub sender: NormalizedAddress,
    pub nonce: u64,
    pub hash: Option<NormalizedHash>,
    pub summary: RawSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub pending: BTreeMap<NormalizedAddress, BTreeSet<PoolEntry>>,
    pub queued: BTreeMap<NormalizedAddress, BTreeSet<PoolEntry>>,
    pub has_pending: bool,
    pub has_queued: bool,
    pub skipped: usize,
}

impl PoolSnapshot {
    pub fn entries(&self) -> impl Iterator<Item = (EntryStatus, &PoolEntry)> {
        let pending = self
            .pending
            .values()
            .flatten()
            .map(|entry| (EntryStatus::Pending, entry));
        let queued = self
            .queued
            .values()
            .flatten()
            .map(|entry| (EntryStatus::Queued, entry));
        pending.chain(queued)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub pending: u64,
    pub queued: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
    NonceGap,
    BelowFloor,
    UnderBasefee,
    Unknown,
}

impl QueueReason {
    pub const ALL: [QueueReason; 4] = [
        Self::NonceGap,
        Self::BelowFloor,
        Self::UnderBasefee,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NonceGap => "nonce_gap",
            Self::BelowFloor => "below_floor",
            Self::UnderBasefee => "under_basefee",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for QueueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
