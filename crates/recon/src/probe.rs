use crate::classify::ClassifyContext;
use crate::metrics::ReconMetrics;
use crate::report::{ProbeHeader, ProbeReport};
use crate::sampler::{Sampler, SamplerConfig, SamplingStats};
use crate::state::{AggregatedState, IngestMode, SearchTargets};
use anyhow::Result;
use scout_chain::PoolGateway;
use scout_core::utils::gwei_to_wei;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ProbeParams {
    pub rpc_url: String,
    pub samples: u32,
    pub inspect_hits: u32,
    pub gas_price_floor_gwei: f64,
    pub consolidated_limit: usize,
    pub top_senders_limit: usize,
    pub sampler: SamplerConfig,
}

pub async fn run_probe<G>(
    gateway: &G,
    params: &ProbeParams,
    stop: Arc<AtomicBool>,
    metrics: Option<&ReconMetrics>,
) -> Result<ProbeReport>
where
    G: PoolGateway + ?Sized,
{
    let samples = params.samples.max(1);
    let inspect_hits = params.inspect_hits.max(1);
    let sampler = Sampler::new(gateway, params.sampler)
        .with_stop(stop)
        .with_metrics(metrics);

    info!(samples, "polling txpool_status");
    let peaks = sampler.poll_status(samples).await;
    info!(
        max_pending = peaks.max_pending,
        max_queued = peaks.max_queued,
        "status sampling done"
    );

    let mut state = AggregatedState::default();
    let mut stats = SamplingStats::default();
    sampler
        .inspect(
            inspect_hits,
            &SearchTargets::default(),
            IngestMode::Classify,
            &mut state,
            &mut stats,
        )
        .await;
    info!(
        queued_unique = state.queued_entries.len(),
        senders = state.pending_nonces.len(),
        "inspect sampling done"
    );

    let floor_wei = gwei_to_wei(params.gas_price_floor_gwei);
    let mut ctx = ClassifyContext::new(gateway, floor_wei).with_metrics(metrics);
    let classification = ctx.classify(&state).await;
    let rows = ctx.consolidate(&state, &classification).await;

    let header = ProbeHeader {
        rpc_url: params.rpc_url.clone(),
        samples,
        inspect_hits,
        gas_price_floor_gwei: params.gas_price_floor_gwei,
        consolidated_limit: params.consolidated_limit,
        top_senders_limit: params.top_senders_limit,
    };
    Ok(ProbeReport::build(
        header,
        peaks,
        stats,
        &state,
        &classification,
        rows,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGateway;
    use scout_core::normalize::normalize_address;
    use scout_core::QueueReason;
    use serde_json::json;

    const SENDER_1: &str = "0x0000000000000000000000000000000000000001";
    const SENDER_2: &str = "0x0000000000000000000000000000000000000002";

    fn params(samples: u32, inspect_hits: u32) -> ProbeParams {
        ProbeParams {
            rpc_url: "http://node".to_string(),
            samples,
            inspect_hits,
            gas_price_floor_gwei: 1.0,
            consolidated_limit: 50,
            top_senders_limit: 10,
            sampler: SamplerConfig::new(0, 0),
        }
    }

    fn pool_round() -> serde_json::Value {
        json!({
            "pending": {
                SENDER_1: {"0": "gasPrice: 2000000000"},
                SENDER_2: {
                    "0": "gasPrice: 2000000000",
                    "1": "gasPrice: 2000000000",
                    "2": "gasPrice: 2000000000",
                    "3": "gasPrice: 2000000000",
                    "4": "gasPrice: 2000000000"
                }
            },
            "queued": {
                SENDER_1: {"5": "gasPrice: 1", "6": "gasPrice: 1", "7": "gasPrice: 1"},
                SENDER_2: {"5": "feeCap: 1", "6": "feeCap: 1", "7": "feeCap: 1"}
            }
        })
    }

    #[tokio::test]
    async fn consolidated_rows_rank_busier_pending_first() {
        let gateway = ScriptedGateway::new();
        gateway
            .push_ok("txpool_status", json!({"pending": "0x6", "queued": "0x6"}))
            .push_ok("txpool_inspect", pool_round())
            .push_ok("eth_getTransactionCount", json!("0x0"))
            .push_ok("eth_getTransactionCount", json!("0x0"))
            .push_ok("eth_getBlockByNumber", json!({"baseFeePerGas": "0x64"}));

        let report = run_probe(&gateway, &params(1, 1), Arc::default(), None)
            .await
            .unwrap();

        let sender_1 = normalize_address(SENDER_1).unwrap();
        let sender_2 = normalize_address(SENDER_2).unwrap();
        let order: Vec<_> = report
            .consolidated
            .iter()
            .map(|row| (row.address.clone(), row.queued_count, row.pending_count))
            .collect();
        assert_eq!(order, vec![(sender_2.clone(), 3, 5), (sender_1.clone(), 3, 1)]);

        assert_eq!(report.max_pending, 6);
        assert_eq!(report.queued_unique, 6);
        assert_eq!(report.queued_reasons.get(QueueReason::NonceGap), 5);
        assert_eq!(report.queued_reasons.get(QueueReason::UnderBasefee), 1);
        assert_eq!(report.synthesized_nonce_gap_addresses, 1);
        assert!(report.consolidated[1].has_union_nonce_gap);
        assert_eq!(report.top_senders, vec![(sender_1, 3), (sender_2, 3)]);
        assert_eq!(gateway.calls_to("eth_getTransactionCount"), 2);
    }

    #[tokio::test]
    async fn zero_budgets_still_run_one_round_each() {
        let gateway = ScriptedGateway::new();
        gateway
            .push_ok("txpool_status", json!({"pending": "0x0", "queued": "0x0"}))
            .push_ok("txpool_inspect", json!({"pending": {}, "queued": {}}));

        let report = run_probe(&gateway, &params(0, 0), Arc::default(), None)
            .await
            .unwrap();

        assert_eq!(gateway.calls_to("txpool_status"), 1);
        assert_eq!(gateway.calls_to("txpool_inspect"), 1);
        assert_eq!((report.samples, report.inspect_hits), (1, 1));
        assert!(report.consolidated.is_empty());
        assert_eq!(report.queued_reasons.total(), 0);
    }
}
