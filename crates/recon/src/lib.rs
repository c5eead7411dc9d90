pub mod classify;
pub mod fees;
pub mod metrics;
pub mod probe;
pub mod report;
pub mod sampler;
pub mod search;
pub mod snapshot;
pub mod state;

#[cfg(test)]
mod testing;

pub use classify::{ClassifyContext, NextNonceCache};
pub use metrics::{spawn_metrics_server, ReconMetrics};
pub use probe::{run_probe, ProbeParams};
pub use report::{ProbeReport, SearchReport};
pub use sampler::{Sampler, SamplerConfig, SamplingStats, StopReason};
pub use search::{run_search, SearchParams};
pub use state::{AggregatedState, IngestMode, SearchTargets};
