use crate::fees::FeeSummary;
use crate::metrics::ReconMetrics;
use crate::state::{AggregatedState, QueuedEntry};
use scout_chain::PoolGateway;
use scout_core::{NormalizedAddress, QueueReason};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

// Failed lookups are cached as unavailable too; nothing is invalidated within a run.
#[derive(Debug, Default)]
pub struct NextNonceCache {
    entries: HashMap<NormalizedAddress, Option<u64>>,
}

impl NextNonceCache {
    pub async fn resolve<G>(&mut self, gateway: &G, address: &NormalizedAddress) -> Option<u64>
    where
        G: PoolGateway + ?Sized,
    {
        if let Some(cached) = self.entries.get(address) {
            return *cached;
        }
        let next = match gateway.next_pending_nonce(address).await {
            Ok(next) => Some(next),
            Err(err) => {
                warn!(%address, %err, "next nonce unavailable");
                None
            }
        };
        self.entries.insert(address.clone(), next);
        next
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReasonTally(BTreeMap<QueueReason, u64>);

impl ReasonTally {
    pub fn zeroed() -> Self {
        Self(QueueReason::ALL.iter().map(|reason| (*reason, 0)).collect())
    }

    pub fn add(&mut self, reason: QueueReason) {
        *self.0.entry(reason).or_default() += 1;
    }

    pub fn get(&self, reason: QueueReason) -> u64 {
        self.0.get(&reason).copied().unwrap_or_default()
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub totals: ReasonTally,
    pub by_sender: BTreeMap<NormalizedAddress, ReasonTally>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderRow {
    pub address: NormalizedAddress,
    pub next_nonce: Option<u64>,
    pub pending_count: usize,
    pub queued_count: usize,
    pub pending_min: Option<u64>,
    pub pending_max: Option<u64>,
    pub queued_min: Option<u64>,
    pub queued_max: Option<u64>,
    pub first_gap_nonce: Option<u64>,
    pub has_union_nonce_gap: bool,
    pub reasons: ReasonTally,
}

pub fn has_nonce_gap(nonce: u64, next_nonce: u64, pending: Option<&BTreeSet<u64>>) -> bool {
    if nonce <= next_nonce {
        return false;
    }
    let has_all_prior = match pending {
        Some(pending) => (next_nonce..nonce).all(|prior| pending.contains(&prior)),
        None => false,
    };
    !has_all_prior
}

// A legacy price decides alone; the fee cap only counts without one.
pub fn pricing_reason(fees: &FeeSummary, floor_wei: u128, base_fee: Option<u128>) -> QueueReason {
    if let Some(gas_price) = fees.legacy_gas_price {
        return if gas_price < floor_wei {
            QueueReason::BelowFloor
        } else {
            QueueReason::Unknown
        };
    }
    match (fees.fee_cap, base_fee) {
        (Some(fee_cap), Some(base_fee)) if fee_cap < base_fee => QueueReason::UnderBasefee,
        _ => QueueReason::Unknown,
    }
}

pub struct ClassifyContext<'a, G: ?Sized> {
    gateway: &'a G,
    floor_wei: u128,
    next_nonces: NextNonceCache,
    base_fee: Option<u128>,
    metrics: Option<&'a ReconMetrics>,
}

impl<'a, G> ClassifyContext<'a, G>
where
    G: PoolGateway + ?Sized,
{
    pub fn new(gateway: &'a G, floor_wei: u128) -> Self {
        Self {
            gateway,
            floor_wei,
            next_nonces: NextNonceCache::default(),
            base_fee: None,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<&'a ReconMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub async fn next_nonce(&mut self, address: &NormalizedAddress) -> Option<u64> {
        let next = self.next_nonces.resolve(self.gateway, address).await;
        if let Some(metrics) = self.metrics {
            metrics
                .next_nonce_cache_size
                .set(self.next_nonces.len() as i64);
        }
        next
    }

    async fn base_fee(&mut self) -> Option<u128> {
        if self.base_fee.is_none() {
            match self.gateway.pending_base_fee().await {
                Ok(base_fee) => self.base_fee = Some(base_fee),
                Err(err) => warn!(%err, "pending base fee unavailable"),
            }
        }
        self.base_fee
    }

    pub async fn classify_entry(
        &mut self,
        entry: &QueuedEntry,
        pending: Option<&BTreeSet<u64>>,
    ) -> QueueReason {
        let Some(next_nonce) = self.next_nonce(&entry.address).await else {
            return QueueReason::Unknown;
        };
        if has_nonce_gap(entry.nonce, next_nonce, pending) {
            return QueueReason::NonceGap;
        }

        let fees = FeeSummary::decode(&entry.summary);
        let base_fee = if fees.legacy_gas_price.is_none() && fees.fee_cap.is_some() {
            self.base_fee().await
        } else {
            None
        };
        pricing_reason(&fees, self.floor_wei, base_fee)
    }

    pub async fn classify(&mut self, state: &AggregatedState) -> Classification {
        let mut totals = ReasonTally::zeroed();
        let mut by_sender: BTreeMap<NormalizedAddress, ReasonTally> = BTreeMap::new();
        self.base_fee = None;

        for entry in &state.queued_entries {
            let pending = state.pending_nonces.get(&entry.address);
            let reason = self.classify_entry(entry, pending).await;
            debug!(address = %entry.address, nonce = entry.nonce, %reason, "queued entry classified");

            totals.add(reason);
            by_sender
                .entry(entry.address.clone())
                .or_default()
                .add(reason);
            if let Some(metrics) = self.metrics {
                metrics.record_verdict(reason);
            }
        }

        Classification {
            totals,
            by_sender,
        }
    }

    pub async fn consolidate(
        &mut self,
        state: &AggregatedState,
        classification: &Classification,
    ) -> Vec<SenderRow> {
        let queued_by_sender = state.queued_nonces();
        let addresses: BTreeSet<&NormalizedAddress> = state
            .pending_nonces
            .keys()
            .chain(queued_by_sender.keys())
            .collect();
        let empty = BTreeSet::new();

        let mut rows = Vec::with_capacity(addresses.len());
        for address in addresses {
            let pending = state.pending_nonces.get(address).unwrap_or(&empty);
            let queued = queued_by_sender.get(address).unwrap_or(&empty);
            let next_nonce = self.next_nonce(address).await;
            rows.push(sender_row(
                address,
                next_nonce,
                pending,
                queued,
                classification.by_sender.get(address).cloned().unwrap_or_default(),
            ));
        }
        rows
    }
}

fn sender_row(
    address: &NormalizedAddress,
    next_nonce: Option<u64>,
    pending: &BTreeSet<u64>,
    queued: &BTreeSet<u64>,
    reasons: ReasonTally,
) -> SenderRow {
    let first_gap_nonce = next_nonce.map(|next| {
        let mut first_gap = next;
        while pending.contains(&first_gap) {
            first_gap += 1;
        }
        first_gap
    });
    let has_union_nonce_gap = match (next_nonce, first_gap_nonce, queued.first()) {
        (Some(next), Some(first_gap), Some(queued_min)) => {
            queued.iter().any(|nonce| *nonce > next) && first_gap < *queued_min
        }
        _ => false,
    };

    SenderRow {
        address: address.clone(),
        next_nonce,
        pending_count: pending.len(),
        queued_count: queued.len(),
        pending_min: pending.first().copied(),
        pending_max: pending.last().copied(),
        queued_min: queued.first().copied(),
        queued_max: queued.last().copied(),
        first_gap_nonce,
        has_union_nonce_gap,
        reasons,
    }
}
