mod api;
mod logging;

use anyhow::{Context, Result};
use api::AppState;
use clap::Parser;
use hostwatch_core::{
    AlertEvaluator, AlertLog, HostwatchConfig, MetricsProbe, NetworkScanner, NmapDiscovery,
    ProcessLister, SampleCollector, SystemMonitor, TimeSeriesStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hostwatch", version, about = "Host telemetry collector and dashboard API")]
struct Args {
    /// YAML configuration file (falls back to $HOSTWATCH_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.bind`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();
    let args = Args::parse();

    let mut config =
        HostwatchConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let probe: Arc<dyn MetricsProbe> = Arc::new(SystemMonitor::new());
    let store = Arc::new(TimeSeriesStore::new(config.collector.history_capacity));
    let alert_log = Arc::new(AlertLog::new(config.alerts.log_capacity));
    let evaluator = Arc::new(AlertEvaluator::new(
        config.alerts.thresholds(),
        Arc::clone(&alert_log),
    ));

    let discovery = Arc::new(NmapDiscovery::new(
        config.scanner.command.clone(),
        config.scanner.timeout(),
    ));
    let scanner = Arc::new(NetworkScanner::new(
        discovery,
        alert_log,
        config.scanner.cache_ttl(),
    ));

    let collector = Arc::new(SampleCollector::new(Arc::clone(&probe), Arc::clone(&store)));
    tokio::spawn(collector.run(config.collector.interval()));
    tokio::spawn(Arc::clone(&scanner).run(config.scanner.interval(), config.scanner.warmup()));

    let state = AppState {
        store,
        probe,
        scanner,
        evaluator,
        processes: Arc::new(ProcessLister::new()),
        disks: Arc::new(config.disks.clone()),
    };
    let app = api::build_router(state, config.server.static_dir.as_deref());

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!("hostwatch listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
