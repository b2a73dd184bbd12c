use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::domain::{AnswerMap, AttendanceStatus, EventId, UserId};
use super::notifier::Notifier;
use super::repository::DataService;
use super::service::{SurveyError, SurveyService};

/// Shared handler state: the survey service plus the caller-facing notifier.
pub struct SurveyEndpoints<D, N> {
    pub service: Arc<SurveyService<D>>,
    pub notifier: Arc<N>,
}

impl<D, N> Clone for SurveyEndpoints<D, N> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub user_id: UserId,
    pub answers: AnswerMap,
}

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub user_id: UserId,
    pub status: AttendanceStatus,
}

/// Router builder exposing the survey lifecycle over HTTP.
pub fn survey_router<D, N>(service: Arc<SurveyService<D>>, notifier: Arc<N>) -> Router
where
    D: DataService + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/festivals/:event_id/survey",
            get(overview_handler::<D, N>),
        )
        .route(
            "/api/v1/festivals/:event_id/survey/questions",
            get(questions_handler::<D, N>),
        )
        .route(
            "/api/v1/festivals/:event_id/survey/responses",
            post(submit_handler::<D, N>),
        )
        .route(
            "/api/v1/festivals/:event_id/survey/statistics",
            get(statistics_handler::<D, N>),
        )
        .route(
            "/api/v1/festivals/:event_id/survey/close",
            post(close_handler::<D, N>),
        )
        .route(
            "/api/v1/festivals/:event_id/attendance",
            put(attendance_handler::<D, N>),
        )
        .with_state(SurveyEndpoints { service, notifier })
}

impl SurveyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SurveyError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SurveyError::Authorization { .. } => StatusCode::FORBIDDEN,
            SurveyError::NotFound(_) => StatusCode::NOT_FOUND,
            SurveyError::Unavailable { .. }
            | SurveyError::SurveyClosed(_)
            | SurveyError::AttendanceLocked(_) => StatusCode::CONFLICT,
            SurveyError::PartialClosure { .. } | SurveyError::CloseIncomplete { .. } => {
                StatusCode::BAD_GATEWAY
            }
            SurveyError::Service(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

fn error_response<N: Notifier>(notifier: &N, error: SurveyError) -> Response {
    let message = error.to_string();
    match &error {
        SurveyError::Validation(_) => notifier.warning(&message),
        _ => notifier.error(&message),
    }

    let payload = match &error {
        SurveyError::PartialClosure { created, failed } => json!({
            "error": message,
            "created": created,
            "failed": failed,
        }),
        SurveyError::CloseIncomplete { created, .. } => json!({
            "error": message,
            "created": created,
            "failed": [],
        }),
        _ => json!({ "error": message }),
    };
    (error.status_code(), Json(payload)).into_response()
}

pub(crate) async fn overview_handler<D, N>(
    State(state): State<SurveyEndpoints<D, N>>,
    Path(event_id): Path<String>,
    Query(query): Query<OverviewQuery>,
) -> Response
where
    D: DataService + 'static,
    N: Notifier + 'static,
{
    let event_id = EventId(event_id);
    match state
        .service
        .overview(&event_id, &query.user_id, Utc::now())
        .await
    {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(error) => error_response(state.notifier.as_ref(), error),
    }
}

pub(crate) async fn questions_handler<D, N>(
    State(state): State<SurveyEndpoints<D, N>>,
    Path(event_id): Path<String>,
) -> Response
where
    D: DataService + 'static,
    N: Notifier + 'static,
{
    match state.service.questions(&EventId(event_id)).await {
        Ok(questions) => (StatusCode::OK, Json(json!({ "questions": questions }))).into_response(),
        Err(error) => error_response(state.notifier.as_ref(), error),
    }
}

pub(crate) async fn submit_handler<D, N>(
    State(state): State<SurveyEndpoints<D, N>>,
    Path(event_id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Response
where
    D: DataService + 'static,
    N: Notifier + 'static,
{
    let event_id = EventId(event_id);
    match state
        .service
        .submit(&event_id, &request.user_id, &request.answers, Utc::now())
        .await
    {
        Ok(stored) => {
            state.notifier.success("Thanks! Your survey response was saved.");
            (StatusCode::CREATED, Json(stored)).into_response()
        }
        Err(error) => error_response(state.notifier.as_ref(), error),
    }
}

pub(crate) async fn statistics_handler<D, N>(
    State(state): State<SurveyEndpoints<D, N>>,
    Path(event_id): Path<String>,
) -> Response
where
    D: DataService + 'static,
    N: Notifier + 'static,
{
    match state
        .service
        .statistics(&EventId(event_id), Utc::now())
        .await
    {
        Ok(statistics) => (StatusCode::OK, Json(statistics)).into_response(),
        Err(error) => error_response(state.notifier.as_ref(), error),
    }
}

pub(crate) async fn close_handler<D, N>(
    State(state): State<SurveyEndpoints<D, N>>,
    Path(event_id): Path<String>,
    Json(request): Json<CloseRequest>,
) -> Response
where
    D: DataService + 'static,
    N: Notifier + 'static,
{
    match state
        .service
        .close(&EventId(event_id), &request.user_id)
        .await
    {
        Ok(report) => {
            if report.already_closed {
                state.notifier.info("Survey was already closed.");
            } else {
                state.notifier.success(&format!(
                    "Survey closed, {} badge(s) awarded.",
                    report.awards.len()
                ));
            }
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(error) => error_response(state.notifier.as_ref(), error),
    }
}

pub(crate) async fn attendance_handler<D, N>(
    State(state): State<SurveyEndpoints<D, N>>,
    Path(event_id): Path<String>,
    Json(request): Json<AttendanceRequest>,
) -> Response
where
    D: DataService + 'static,
    N: Notifier + 'static,
{
    match state
        .service
        .set_attendance(
            &EventId(event_id),
            &request.user_id,
            request.status,
            Utc::now(),
        )
        .await
    {
        Ok(attendance) => (StatusCode::OK, Json(attendance)).into_response(),
        Err(error) => error_response(state.notifier.as_ref(), error),
    }
}
