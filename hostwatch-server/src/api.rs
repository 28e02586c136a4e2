use axum::extract::{Path, Query, State};
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use hostwatch_core::config::DiskConfig;
use hostwatch_core::{
    filter_interfaces, filter_volumes, network_rates, AlertEvaluator, AlertEvent, InterfaceCounters,
    MetricsProbe, NetworkDevice, NetworkRate, NetworkScanner, ProcessInfo, ProcessLister, Sample,
    SortKey, TimeSeriesStore, Volume,
};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TimeSeriesStore>,
    pub probe: Arc<dyn MetricsProbe>,
    pub scanner: Arc<NetworkScanner>,
    pub evaluator: Arc<AlertEvaluator>,
    pub processes: Arc<ProcessLister>,
    pub disks: Arc<DiskConfig>,
}

pub fn build_router(state: AppState, static_dir: Option<&FsPath>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/system", get(get_system))
        .route("/api/disks", get(get_disks))
        .route("/api/network", get(get_network))
        .route("/api/network/rates", get(get_network_rates))
        .route("/api/network/scan", get(scan_network))
        .route("/api/network/latest", get(get_latest_scan))
        .route("/api/processes", get(list_processes))
        .route("/api/processes/{pid}/kill", post(kill_process))
        .route("/api/alerts", get(get_alerts))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// Runs a blocking OS query off the async workers. Errors degrade to `None`.
async fn run_blocking<T, F>(what: &'static str, query: F) -> Option<T>
where
    F: FnOnce() -> hostwatch_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(query).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!("{} unavailable: {}", what, e);
            None
        }
        Err(e) => {
            error!("{} query panicked: {}", what, e);
            None
        }
    }
}

// GET /api/system
async fn get_system(State(app): State<AppState>) -> Json<Vec<Sample>> {
    Json(app.store.read_all())
}

// GET /api/disks
async fn get_disks(State(app): State<AppState>) -> Json<Vec<Volume>> {
    let probe = Arc::clone(&app.probe);
    let volumes = run_blocking("disk volumes", move || probe.volumes())
        .await
        .unwrap_or_default();
    Json(filter_volumes(
        volumes,
        app.disks.min_volume_bytes,
        &app.disks.ignored_fs_types,
    ))
}

// GET /api/network
async fn get_network(State(app): State<AppState>) -> Json<Vec<InterfaceCounters>> {
    let probe = Arc::clone(&app.probe);
    let interfaces = run_blocking("network interfaces", move || probe.interfaces())
        .await
        .unwrap_or_default();
    Json(filter_interfaces(interfaces))
}

// GET /api/network/rates
async fn get_network_rates(State(app): State<AppState>) -> Json<Vec<NetworkRate>> {
    Json(network_rates(&app.store.read_all()))
}

#[derive(Serialize)]
struct ScanResponse {
    devices: Vec<NetworkDevice>,
    local_ip: Option<String>,
}

// GET /api/network/scan
async fn scan_network(State(app): State<AppState>) -> Json<ScanResponse> {
    let devices = app.scanner.scan().await;
    Json(ScanResponse {
        devices,
        local_ip: app.scanner.local_ip().map(|ip| ip.to_string()),
    })
}

#[derive(Serialize)]
struct LatestScanResponse {
    devices: Vec<NetworkDevice>,
    timestamp: Option<i64>,
    local_ip: Option<String>,
}

// GET /api/network/latest (cache only)
async fn get_latest_scan(State(app): State<AppState>) -> Json<LatestScanResponse> {
    let latest = app.scanner.latest();
    Json(LatestScanResponse {
        timestamp: latest.as_ref().map(|cache| cache.captured_at),
        devices: latest.map(|cache| cache.devices).unwrap_or_default(),
        local_ip: app.scanner.local_ip().map(|ip| ip.to_string()),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ProcessQuery {
    sort: Option<String>,
    limit: Option<String>,
}

#[derive(Serialize)]
struct ProcessesResponse {
    processes: Vec<ProcessInfo>,
    count: usize,
}

// GET /api/processes?sort={cpu,mem}&limit=N
async fn list_processes(
    State(app): State<AppState>,
    Query(query): Query<ProcessQuery>,
) -> Json<ProcessesResponse> {
    let sort = query.sort.as_deref().map(SortKey::parse).unwrap_or_default();
    let limit = query
        .limit
        .as_deref()
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(ProcessLister::DEFAULT_LIMIT);

    let lister = Arc::clone(&app.processes);
    let processes = run_blocking("process list", move || Ok(lister.list(sort, limit)))
        .await
        .unwrap_or_default();

    Json(ProcessesResponse {
        count: processes.len(),
        processes,
    })
}

#[derive(Serialize)]
struct KillResponse {
    success: bool,
}

// POST /api/processes/{pid}/kill
async fn kill_process(State(app): State<AppState>, Path(pid): Path<String>) -> Json<KillResponse> {
    let success = match pid.parse::<u32>() {
        Ok(pid) => app.processes.kill(pid),
        Err(_) => {
            warn!("kill requested for invalid pid {:?}", pid);
            false
        }
    };
    Json(KillResponse { success })
}

#[derive(Serialize)]
struct AlertsResponse {
    alerts: Vec<AlertEvent>,
    timestamp: i64,
}

// GET /api/alerts
async fn get_alerts(State(app): State<AppState>) -> Json<AlertsResponse> {
    let latest = app.store.latest();
    Json(AlertsResponse {
        alerts: app.evaluator.evaluate(latest.as_ref()),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
