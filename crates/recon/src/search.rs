use crate::metrics::ReconMetrics;
use crate::report::SearchReport;
use crate::sampler::{Sampler, SamplerConfig, SamplingStats};
use crate::state::{AggregatedState, IngestMode, SearchTargets, NO_TARGETS};
use anyhow::Result;
use scout_chain::PoolGateway;
use scout_core::Error;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub rpc_url: String,
    pub hits: u32,
    pub targets: SearchTargets,
    pub sampler: SamplerConfig,
}

pub async fn run_search<G>(
    gateway: &G,
    params: &SearchParams,
    stop: Arc<AtomicBool>,
    metrics: Option<&ReconMetrics>,
) -> Result<SearchReport>
where
    G: PoolGateway + ?Sized,
{
    if params.targets.is_empty() {
        return Err(Error::Usage(NO_TARGETS.to_string()).into());
    }

    info!(
        hashes = params.targets.hashes.len(),
        addresses = params.targets.addresses.len(),
        hits = params.hits,
        "searching txpool"
    );

    let sampler = Sampler::new(gateway, params.sampler)
        .with_stop(stop)
        .with_metrics(metrics);
    let mut state = AggregatedState::default();
    let mut stats = SamplingStats::default();
    sampler
        .inspect(
            params.hits,
            &params.targets,
            IngestMode::Search,
            &mut state,
            &mut stats,
        )
        .await;

    info!(
        found = state.found_by_hash.len(),
        rounds = stats.total_hits,
        failed = stats.failed_hits,
        "search finished"
    );
    Ok(SearchReport::build(
        &params.rpc_url,
        params.hits,
        &params.targets,
        stats,
        &state,
    ))
}
