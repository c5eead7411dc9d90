use crate::metrics::ReconMetrics;
use crate::snapshot::decode_snapshot;
use crate::state::{AggregatedState, IngestMode, SearchTargets};
use rand::Rng;
use scout_chain::{GatewayError, PoolGateway};
use scout_core::{FormatError, PoolSnapshot};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    pub sleep_ms_min: u64,
    pub sleep_ms_jitter: u64,
}

impl SamplerConfig {
    pub fn new(sleep_ms_min: u64, sleep_ms_jitter: u64) -> Self {
        Self {
            sleep_ms_min,
            sleep_ms_jitter,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    BudgetExhausted,
    AllHashesFound,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SamplingStats {
    pub total_hits: u32,
    pub successful_hits: u32,
    pub failed_hits: u32,
    pub pending_searches: u32,
    pub queued_searches: u32,
    pub skipped_entries: u64,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusPeaks {
    pub max_pending: u64,
    pub max_queued: u64,
    pub successful_polls: u32,
    pub failed_polls: u32,
}

#[derive(Debug, Error)]
pub enum RoundError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("undecodable pool listing: {0}")]
    Format(#[from] FormatError),
}

pub struct Sampler<'a, G: ?Sized> {
    gateway: &'a G,
    cfg: SamplerConfig,
    stop: Option<Arc<AtomicBool>>,
    metrics: Option<&'a ReconMetrics>,
}

impl<'a, G> Sampler<'a, G>
where
    G: PoolGateway + ?Sized,
{
    pub fn new(gateway: &'a G, cfg: SamplerConfig) -> Self {
        Self {
            gateway,
            cfg,
            stop: None,
            metrics: None,
        }
    }

    pub fn with_stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_metrics(mut self, metrics: Option<&'a ReconMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn stopped(&self) -> bool {
        self.stop
            .as_ref()
            .map(|stop| stop.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub async fn poll_status(&self, budget: u32) -> StatusPeaks {
        let mut peaks = StatusPeaks::default();
        for poll in 1..=budget {
            if self.stopped() {
                info!(poll, "status sampling cancelled");
                break;
            }
            match self.gateway.pool_status().await {
                Ok(status) => {
                    peaks.successful_polls += 1;
                    peaks.max_pending = peaks.max_pending.max(status.pending);
                    peaks.max_queued = peaks.max_queued.max(status.queued);
                    debug!(
                        poll,
                        budget,
                        pending = status.pending,
                        queued = status.queued,
                        "status poll"
                    );
                    self.record_round("status", "ok");
                }
                Err(err) => {
                    peaks.failed_polls += 1;
                    warn!(poll, budget, %err, "status poll failed");
                    self.record_round("status", err.kind());
                }
            }
            self.pause().await;
        }
        peaks
    }

    pub async fn inspect(
        &self,
        budget: u32,
        targets: &SearchTargets,
        mode: IngestMode,
        state: &mut AggregatedState,
        stats: &mut SamplingStats,
    ) {
        stats.stop_reason = StopReason::BudgetExhausted;
        for hit in 1..=budget {
            if self.stopped() {
                info!(hit, "inspect sampling cancelled");
                stats.stop_reason = StopReason::Cancelled;
                return;
            }
            stats.total_hits += 1;
            match self.inspect_once().await {
                Ok(snapshot) => {
                    stats.successful_hits += 1;
                    stats.pending_searches += u32::from(snapshot.has_pending);
                    stats.queued_searches += u32::from(snapshot.has_queued);
                    stats.skipped_entries += snapshot.skipped as u64;
                    if let Some(metrics) = self.metrics {
                        metrics.skipped_entries_total.inc_by(snapshot.skipped as u64);
                    }
                    state.ingest(&snapshot, hit, targets, mode);
                    debug!(
                        hit,
                        budget,
                        senders = snapshot.pending.len() + snapshot.queued.len(),
                        skipped = snapshot.skipped,
                        "inspect round merged"
                    );
                    self.record_round("inspect", "ok");
                }
                Err(err) => {
                    stats.failed_hits += 1;
                    warn!(hit, budget, %err, "inspect round failed");
                    let outcome = match &err {
                        RoundError::Gateway(err) => err.kind(),
                        RoundError::Format(_) => "format",
                    };
                    self.record_round("inspect", outcome);
                }
            }

            if targets.all_hashes_found(state) {
                info!(hit, targets = targets.hashes.len(), "all target hashes found");
                stats.stop_reason = StopReason::AllHashesFound;
                return;
            }
            if hit < budget {
                self.pause().await;
            }
        }
    }

    async fn inspect_once(&self) -> Result<PoolSnapshot, RoundError> {
        let result = self.gateway.pool_inspect().await?;
        Ok(decode_snapshot(&result)?)
    }

    fn next_delay(&self) -> Duration {
        let jitter = if self.cfg.sleep_ms_jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.cfg.sleep_ms_jitter)
        };
        Duration::from_millis(self.cfg.sleep_ms_min.saturating_add(jitter))
    }

    async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    fn record_round(&self, kind: &str, outcome: &str) {
        if let Some(metrics) = self.metrics {
            metrics.record_round(kind, outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGateway;
    use scout_core::normalize::{normalize_address, normalize_hash};
    use serde_json::json;

    const SENDER_1: &str = "0x0000000000000000000000000000000000000001";
    const SENDER_2: &str = "0x0000000000000000000000000000000000000002";
    const HASH_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn no_sleep() -> SamplerConfig {
        SamplerConfig::new(0, 0)
    }

    fn hash_targets() -> SearchTargets {
        SearchTargets::new(
            vec![normalize_hash(HASH_A).unwrap(), normalize_hash(HASH_B).unwrap()],
            vec![],
        )
    }

    fn round_with_a() -> serde_json::Value {
        json!({"pending": {SENDER_1: {"7": {"hash": HASH_A, "gasPrice": "0x1"}}}, "queued": {}})
    }

    fn round_with_b() -> serde_json::Value {
        json!({"pending": {}, "queued": {SENDER_2: {"9": {"hash": HASH_B}}}})
    }

    #[tokio::test]
    async fn stops_once_every_hash_is_found() {
        for budget in [2, 3, 10] {
            let gateway = ScriptedGateway::new();
            gateway
                .push_ok("txpool_inspect", round_with_a())
                .push_ok("txpool_inspect", round_with_b())
                .push_ok("txpool_inspect", round_with_a());
            let sampler = Sampler::new(&gateway, no_sleep());
            let mut state = AggregatedState::default();
            let mut stats = SamplingStats::default();

            sampler
                .inspect(budget, &hash_targets(), IngestMode::Search, &mut state, &mut stats)
                .await;

            assert_eq!(gateway.calls_to("txpool_inspect"), 2, "budget {budget}");
            assert_eq!(stats.total_hits, 2);
            assert_eq!(stats.stop_reason, StopReason::AllHashesFound);
            assert_eq!(state.found_by_hash.len(), 2);
        }
    }

    #[tokio::test]
    async fn failed_rounds_count_and_sampling_continues() {
        let gateway = ScriptedGateway::new();
        gateway
            .push_transport_err("txpool_inspect")
            .push_protocol_err("txpool_inspect")
            .push_ok("txpool_inspect", json!("not a pool"))
            .push_ok("txpool_inspect", round_with_a());
        let sampler = Sampler::new(&gateway, no_sleep());
        let mut state = AggregatedState::default();
        let mut stats = SamplingStats::default();

        sampler
            .inspect(5, &hash_targets(), IngestMode::Search, &mut state, &mut stats)
            .await;

        assert_eq!(stats.total_hits, 5);
        assert_eq!(stats.failed_hits, 4);
        assert_eq!(stats.successful_hits, 1);
        assert_eq!(stats.stop_reason, StopReason::BudgetExhausted);
        let record = &state.found_by_hash[&normalize_hash(HASH_A).unwrap()];
        assert_eq!(record.found_in_hit, 4);
    }

    #[tokio::test]
    async fn address_search_runs_the_full_budget() {
        let gateway = ScriptedGateway::new();
        for _ in 0..4 {
            gateway.push_ok("txpool_inspect", round_with_a());
        }
        let targets = SearchTargets::new(vec![], vec![normalize_address(SENDER_1).unwrap()]);
        let sampler = Sampler::new(&gateway, no_sleep());
        let mut state = AggregatedState::default();
        let mut stats = SamplingStats::default();

        sampler
            .inspect(4, &targets, IngestMode::Search, &mut state, &mut stats)
            .await;

        assert_eq!(gateway.calls_to("txpool_inspect"), 4);
        assert_eq!(stats.pending_searches, 4);
        assert_eq!(state.found_by_address[&normalize_address(SENDER_1).unwrap()].len(), 4);
    }

    #[tokio::test]
    async fn stop_flag_cancels_between_rounds() {
        let gateway = ScriptedGateway::new();
        let stop = Arc::new(AtomicBool::new(true));
        let sampler = Sampler::new(&gateway, no_sleep()).with_stop(stop);
        let mut state = AggregatedState::default();
        let mut stats = SamplingStats::default();

        sampler
            .inspect(5, &hash_targets(), IngestMode::Search, &mut state, &mut stats)
            .await;

        assert_eq!(gateway.calls_to("txpool_inspect"), 0);
        assert_eq!(stats.stop_reason, StopReason::Cancelled);
    }

    #[tokio::test]
    async fn status_polls_track_maxima() {
        let gateway = ScriptedGateway::new();
        gateway
            .push_ok("txpool_status", json!({"pending": "0x5", "queued": "0x9"}))
            .push_transport_err("txpool_status")
            .push_ok("txpool_status", json!({"pending": "0xa", "queued": "0x1"}));
        let sampler = Sampler::new(&gateway, no_sleep());

        let peaks = sampler.poll_status(3).await;

        assert_eq!(peaks.max_pending, 10);
        assert_eq!(peaks.max_queued, 9);
        assert_eq!(peaks.successful_polls, 2);
        assert_eq!(peaks.failed_polls, 1);
    }

    #[test]
    fn delay_stays_within_jitter_window() {
        let gateway = ScriptedGateway::new();
        let sampler = Sampler::new(&gateway, SamplerConfig::new(100, 50));
        for _ in 0..100 {
            let delay = sampler.next_delay().as_millis();
            assert!((100..=150).contains(&delay));
        }
    }
}
