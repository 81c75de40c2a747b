use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryScoreSource, StaticTokenResolver};
use crate::routes::with_lending_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use credit_engine::config::AppConfig;
use credit_engine::error::AppError;
use credit_engine::lending::CreditEngine;
use credit_engine::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const OVERDUE_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

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

    let source = match args.score_history.take() {
        Some(path) => {
            let source = InMemoryScoreSource::from_csv(&path)?;
            info!(path = %path.display(), applicants = source.applicant_count(), "score history imported");
            source
        }
        None => InMemoryScoreSource::default(),
    };
    source.ensure_profile(&config.auth.borrower_id);

    let engine = Arc::new(CreditEngine::new(Arc::new(source), config.lending.clone()));
    let identities = Arc::new(StaticTokenResolver::from_config(&config.auth));

    let sweeper = Arc::clone(&engine);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(OVERDUE_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.refresh_statuses(Utc::now().date_naive());
        }
    });

    let app = with_lending_routes(engine, identities)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        apr = config.lending.default_apr,
        settlement_approval = config.lending.settlement_requires_approval,
        "credit engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
