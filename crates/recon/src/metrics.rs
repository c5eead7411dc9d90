use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};
use scout_chain::GatewayMetrics;
use scout_core::metrics::Metrics;
use scout_core::QueueReason;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

pub struct ReconMetrics {
    metrics: Metrics,
    pub gateway: GatewayMetrics,
    pub rounds_total: IntCounterVec,
    pub skipped_entries_total: IntCounter,
    pub verdicts_total: IntCounterVec,
    pub next_nonce_cache_size: IntGauge,
}

impl ReconMetrics {
    pub fn new() -> Result<Self> {
        let metrics = Metrics::new();
        let registry = metrics.registry();
        let gateway = GatewayMetrics::new(registry)?;
        let rounds_total = IntCounterVec::new(
            Opts::new(
                "poolscout_rounds_total",
                "Total sampling rounds by kind and outcome",
            ),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(rounds_total.clone()))?;
        let skipped_entries_total = IntCounter::with_opts(Opts::new(
            "poolscout_skipped_entries_total",
            "Total pool entries dropped for malformed sender, nonce or hash",
        ))?;
        registry.register(Box::new(skipped_entries_total.clone()))?;
        let verdicts_total = IntCounterVec::new(
            Opts::new(
                "poolscout_queued_verdicts_total",
                "Total queued entries classified by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(verdicts_total.clone()))?;
        let next_nonce_cache_size = IntGauge::with_opts(Opts::new(
            "poolscout_next_nonce_cache_size",
            "Addresses with a memoized next-nonce lookup",
        ))?;
        registry.register(Box::new(next_nonce_cache_size.clone()))?;

        Ok(Self {
            metrics,
            gateway,
            rounds_total,
            skipped_entries_total,
            verdicts_total,
            next_nonce_cache_size,
        })
    }

    pub fn record_round(&self, kind: &str, outcome: &str) {
        self.rounds_total.with_label_values(&[kind, outcome]).inc();
    }

    pub fn record_verdict(&self, reason: QueueReason) {
        self.verdicts_total
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    pub fn gather(&self) -> String {
        self.metrics.gather()
    }
}

pub fn spawn_metrics_server(bind: &str, metrics: Arc<ReconMetrics>) -> Result<()> {
    let listener = TcpListener::bind(bind)?;
    let bind = bind.to_string();
    thread::spawn(move || {
        info!(%bind, "metrics server listening");
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(err) = handle_connection(stream, &metrics) {
                        warn!(?err, "metrics server connection failed");
                    }
                }
                Err(err) => {
                    warn!(?err, "metrics server accept failed");
                }
            }
        }
    });
    Ok(())
}

fn handle_connection(mut stream: TcpStream, metrics: &ReconMetrics) -> Result<()> {
    let mut buffer = [0u8; 512];
    let _ = stream.read(&mut buffer);
    let body = metrics.gather();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ReconMetrics;
    use scout_core::QueueReason;

    #[test]
    fn counters_show_up_in_gathered_text() {
        let metrics = ReconMetrics::new().unwrap();
        metrics.record_round("inspect", "ok");
        metrics.record_verdict(QueueReason::NonceGap);
        metrics.gateway.record("txpool_inspect", "ok");

        let text = metrics.gather();
        assert!(text.contains("poolscout_rounds_total{kind=\"inspect\",outcome=\"ok\"} 1"));
        assert!(text.contains("poolscout_queued_verdicts_total{reason=\"nonce_gap\"} 1"));
        assert!(text.contains("poolscout_rpc_calls_total"));
    }
}
