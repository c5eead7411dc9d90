use anyhow::Result;
use prometheus::{IntCounterVec, Opts, Registry};

#[derive(Clone)]
pub struct GatewayMetrics {
    calls_total: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let calls_total = IntCounterVec::new(
            Opts::new(
                "poolscout_rpc_calls_total",
                "Total JSON-RPC calls by method and outcome",
            ),
            &["method", "outcome"],
        )?;
        registry.register(Box::new(calls_total.clone()))?;
        Ok(Self { calls_total })
    }

    pub fn record(&self, method: &str, outcome: &str) {
        self.calls_total.with_label_values(&[method, outcome]).inc();
    }
}
