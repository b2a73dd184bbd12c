use crate::cli::ServeArgs;
use crate::infra::{seeded_data_service, AppState, InMemoryDataService, TracingNotifier};
use crate::routes::with_survey_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Duration, Utc};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use wacho::config::{AppConfig, SurveyConfig};
use wacho::error::AppError;
use wacho::telemetry;
use wacho::workflows::badges::BadgeCatalog;
use wacho::workflows::survey::{SurveyService, SweepOutcome};

const SWEEP_INTERVAL_SECS: u64 = 15 * 60;

pub(crate) fn load_catalog(config: &SurveyConfig) -> Result<BadgeCatalog, AppError> {
    match &config.badge_catalog {
        Some(path) => Ok(BadgeCatalog::from_path(path)?),
        None => Ok(BadgeCatalog::standard()),
    }
}

pub(crate) fn build_service(
    config: &SurveyConfig,
    data: Arc<InMemoryDataService>,
    catalog: BadgeCatalog,
) -> SurveyService<InMemoryDataService> {
    let service = match config.question_seed {
        Some(seed) => SurveyService::with_seed(data, seed),
        None => SurveyService::new(data),
    };
    service.with_catalog(catalog)
}

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

    let catalog = load_catalog(&config.survey)?;
    info!(badges = catalog.len(), "badge catalog loaded");
    let data = Arc::new(seeded_data_service(&catalog, Utc::now() - Duration::days(1)));
    let service = Arc::new(build_service(&config.survey, data.clone(), catalog));

    tokio::spawn(sweep_expired(service.clone(), data));

    let app = with_survey_routes(service, Arc::new(TracingNotifier))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "festival survey service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Closes surveys whose window has elapsed so their badges get awarded without an organizer.
async fn sweep_expired(
    service: Arc<SurveyService<InMemoryDataService>>,
    data: Arc<InMemoryDataService>,
) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
    loop {
        interval.tick().await;
        for entry in service.close_expired(&data.festival_ids(), Utc::now()).await {
            match entry.outcome {
                SweepOutcome::Closed(report) => info!(
                    event = %entry.event_id,
                    awards = report.awards.len(),
                    "expired survey closed"
                ),
                SweepOutcome::Failed(err) => {
                    warn!(event = %entry.event_id, error = %err, "expired survey left open")
                }
                SweepOutcome::AlreadyClosed | SweepOutcome::NotExpired(_) => {}
            }
        }
    }
}
