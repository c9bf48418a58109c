use crate::cli::ServeArgs;
use crate::infra::{load_seed_data, AppState, InMemoryResponseStore};
use crate::routes::with_screening_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use onco_screen::config::AppConfig;
use onco_screen::error::AppError;
use onco_screen::screening::{ScreeningService, TracingObserver};
use onco_screen::telemetry;
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

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (catalog, tiers) = load_seed_data(&config.quiz)?;
    info!(
        general = catalog.general().len(),
        specialized = catalog.specialized().len(),
        tiers = tiers.tiers().len(),
        "screening data loaded"
    );

    let service = Arc::new(ScreeningService::new(
        Arc::new(catalog),
        Arc::new(InMemoryResponseStore::default()),
        Arc::new(tiers),
        Arc::new(TracingObserver),
    )
    .with_idle_timeout(config.sessions.idle_timeout()));

    let app = with_screening_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "screening service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
