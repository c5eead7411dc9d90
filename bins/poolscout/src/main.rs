use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use scout_chain::{NodeClient, RpcGateway};
use scout_core::config::AppConfig;
use scout_core::modes::InspectMethod;
use scout_recon::{
    run_probe, run_search, spawn_metrics_server, ProbeParams, ReconMetrics, SamplerConfig,
    SearchParams, SearchTargets,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "poolscout",
    version,
    about = "Mempool reconnaissance across a load-balanced RPC cluster"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look for transaction hashes and sender activity in the cluster's txpools.
    Search(SearchArgs),
    /// Explain why queued transactions are not pending.
    Probe(ProbeArgs),
    PrintConfig {
        #[arg(short, long, default_value = "config/poolscout.toml")]
        config: String,
    },
}

#[derive(Args)]
struct NodeArgs {
    #[arg(short, long, default_value = "config/poolscout.toml")]
    config: String,
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,
    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<f64>,
    /// `inspect` (txpool_inspect) or `content` (txpool_content).
    #[arg(long)]
    inspect_method: Option<String>,
}

impl NodeArgs {
    fn load(&self) -> Result<AppConfig> {
        let mut cfg = AppConfig::load(&self.config)?;
        if let Some(rpc_url) = &self.rpc_url {
            cfg.chain.rpc_http = rpc_url.clone();
        }
        if let Some(timeout) = self.timeout {
            cfg.chain.request_timeout_ms = (timeout.max(0.0) * 1_000.0) as u64;
        }
        if let Some(method) = &self.inspect_method {
            cfg.sampling.inspect_method = method.clone();
        }
        Ok(cfg)
    }
}

#[derive(Args)]
struct SearchArgs {
    #[command(flatten)]
    node: NodeArgs,
    /// Comma-separated transaction hashes.
    #[arg(long)]
    hashes: Option<String>,
    /// Comma-separated sender addresses.
    #[arg(long)]
    addresses: Option<String>,
    #[arg(long)]
    hits: Option<u32>,
    /// Minimum sleep between rounds in ms.
    #[arg(long)]
    sleep: Option<u64>,
    /// Extra random sleep in ms.
    #[arg(long)]
    jitter: Option<u64>,
}

#[derive(Args)]
struct ProbeArgs {
    #[command(flatten)]
    node: NodeArgs,
    #[arg(long, env = "SAMPLES")]
    samples: Option<u32>,
    #[arg(long, env = "INSPECT_HITS")]
    inspect_hits: Option<u32>,
    #[arg(long, env = "GAS_PRICE_FLOOR_GWEI")]
    gas_price_floor_gwei: Option<f64>,
    #[arg(long, env = "SLEEP_MS_MIN")]
    sleep_ms_min: Option<u64>,
    #[arg(long, env = "SLEEP_MS_JITTER")]
    sleep_ms_jitter: Option<u64>,
    #[arg(long, env = "CONSOLIDATED_LIMIT")]
    consolidated_limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Search(args) => {
            let mut cfg = args.node.load()?;
            if let Some(hits) = args.hits {
                cfg.search.hits = hits;
            }
            if let Some(sleep) = args.sleep {
                cfg.search.sleep_ms_min = sleep;
            }
            if let Some(jitter) = args.jitter {
                cfg.search.sleep_ms_jitter = jitter;
            }
            init_tracing(&cfg.observability.log_level);

            let targets = SearchTargets::parse(
                args.hashes.as_deref().unwrap_or_default(),
                args.addresses.as_deref().unwrap_or_default(),
            )?;
            for hash in &targets.hashes {
                info!(%hash, "target hash");
            }
            for address in &targets.addresses {
                info!(%address, "target address");
            }

            let metrics = start_metrics(&cfg)?;
            let gateway = connect_gateway(&cfg, metrics.as_deref()).await?;
            let params = SearchParams {
                rpc_url: cfg.chain.rpc_http.clone(),
                hits: cfg.search.hits,
                targets,
                sampler: SamplerConfig::new(cfg.search.sleep_ms_min, cfg.search.sleep_ms_jitter),
            };
            let report = run_search(&gateway, &params, stop_on_ctrl_c(), metrics.as_deref()).await?;
            print!("{}", report.render()?);
        }
        Commands::Probe(args) => {
            let mut cfg = args.node.load()?;
            if let Some(samples) = args.samples {
                cfg.probe.samples = samples;
            }
            if let Some(inspect_hits) = args.inspect_hits {
                cfg.probe.inspect_hits = inspect_hits;
            }
            if let Some(floor) = args.gas_price_floor_gwei {
                cfg.probe.gas_price_floor_gwei = floor;
            }
            if let Some(sleep) = args.sleep_ms_min {
                cfg.sampling.sleep_ms_min = sleep;
            }
            if let Some(jitter) = args.sleep_ms_jitter {
                cfg.sampling.sleep_ms_jitter = jitter;
            }
            if let Some(limit) = args.consolidated_limit {
                cfg.probe.consolidated_limit = limit;
            }
            init_tracing(&cfg.observability.log_level);

            let metrics = start_metrics(&cfg)?;
            let gateway = connect_gateway(&cfg, metrics.as_deref()).await?;
            let params = ProbeParams {
                rpc_url: cfg.chain.rpc_http.clone(),
                samples: cfg.probe.samples,
                inspect_hits: cfg.probe.inspect_hits,
                gas_price_floor_gwei: cfg.probe.gas_price_floor_gwei,
                consolidated_limit: cfg.probe.consolidated_limit,
                top_senders_limit: cfg.probe.top_senders_limit,
                sampler: SamplerConfig::new(cfg.sampling.sleep_ms_min, cfg.sampling.sleep_ms_jitter),
            };
            let report = run_probe(&gateway, &params, stop_on_ctrl_c(), metrics.as_deref()).await?;
            print!("{}", report.render()?);
        }
        Commands::PrintConfig { config } => {
            let cfg = AppConfig::load(&config)?;
            init_tracing(&cfg.observability.log_level);
            let json = serde_json::to_string_pretty(&cfg)?;
            println!("{json}");
        }
    }

    info!("done");
    Ok(())
}

async fn connect_gateway(cfg: &AppConfig, metrics: Option<&ReconMetrics>) -> Result<RpcGateway> {
    let inspect_method = InspectMethod::parse(&cfg.sampling.inspect_method)?;
    let client = NodeClient::connect(&cfg.chain).await?;
    info!(
        rpc = %cfg.chain.rpc_http,
        method = inspect_method.rpc_method(),
        timeout_ms = cfg.chain.request_timeout_ms,
        "connected"
    );
    Ok(RpcGateway::new(
        client.http,
        cfg.chain.request_timeout_ms,
        inspect_method,
        metrics.map(|metrics| metrics.gateway.clone()),
    ))
}

fn start_metrics(cfg: &AppConfig) -> Result<Option<Arc<ReconMetrics>>> {
    if !cfg.observability.metrics_enabled {
        return Ok(None);
    }
    let metrics = Arc::new(ReconMetrics::new()?);
    spawn_metrics_server(&cfg.observability.metrics_bind, metrics.clone())?;
    Ok(Some(metrics))
}

fn stop_on_ctrl_c() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, finishing with what was sampled");
                flag.store(true, Ordering::SeqCst);
            }
            Err(err) => warn!(?err, "ctrl-c handler unavailable"),
        }
    });
    stop
}

fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(value) => EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("info")),
        Err(_) => EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
