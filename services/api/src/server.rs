use crate::cli::ServeArgs;
use crate::infra::{build_backend, AppState};
use crate::routes::with_budget_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use mitra_honor::config::AppConfig;
use mitra_honor::error::AppError;
use mitra_honor::planning::BudgetService;
use mitra_honor::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(url) = args.backend_url.take() {
        config.backend.base_url = url.trim_end_matches('/').to_string();
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backend = build_backend(&config.backend, args.snapshot.as_deref())?;
    let budget_service = Arc::new(BudgetService::new(backend));

    let app = with_budget_routes(budget_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        offline = args.snapshot.is_some(),
        "mitra honor budget service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
