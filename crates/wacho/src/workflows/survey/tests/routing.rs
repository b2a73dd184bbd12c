use super::common::*;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::survey::notifier::NoticeLevel;
use crate::workflows::survey::survey_router;

fn router_for(end_date: DateTime<Utc>) -> (Router, Arc<MemoryDataService>, Arc<MemoryNotifier>) {
    let (service, data) = build_service(end_date);
    let notifier = Arc::new(MemoryNotifier::default());
    (survey_router(Arc::new(service), notifier.clone()), data, notifier)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn submit_route_stores_the_response() {
    let (router, data, notifier) = router_for(open_end_date());

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/festivals/fest-1/survey/responses",
            json!({ "user_id": "u1", "answers": complete_answers(5) }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["user_id"], "u1");
    assert_eq!(data.responses().len(), 1);
    assert_eq!(notifier.notices()[0].0, NoticeLevel::Success);
}

#[tokio::test]
async fn submit_route_reports_missing_answers_as_unprocessable() {
    let (router, data, notifier) = router_for(open_end_date());
    let mut answers = complete_answers(5);
    answers.remove("overall_rating");

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/festivals/fest-1/survey/responses",
            json!({ "user_id": "u1", "answers": answers }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .expect("error message")
        .contains("overall_rating"));
    assert_eq!(data.calls(), 0);
    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].0, NoticeLevel::Warning);
}

#[tokio::test]
async fn close_route_forbids_non_organizers() {
    let (router, data, notifier) = router_for(open_end_date());

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/festivals/fest-1/survey/close",
            json!({ "user_id": "u2" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(data.survey_active(&event_id()), None);
    assert_eq!(notifier.notices()[0].0, NoticeLevel::Error);
}

#[tokio::test]
async fn close_route_returns_the_report() {
    let (router, _, notifier) = router_for(open_end_date());
    let answers = with_nomination(complete_answers(4), &badge("best_dancer"), "u3");

    let submitted = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/festivals/fest-1/survey/responses",
            json!({ "user_id": "u1", "answers": answers }),
        ))
        .await
        .expect("route executes");
    assert_eq!(submitted.status(), StatusCode::CREATED);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/festivals/fest-1/survey/close",
            json!({ "user_id": ORGANIZER }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["already_closed"], false);
    assert_eq!(payload["awards"][0]["user_id"], "u3");
    assert_eq!(payload["statistics"]["survey_responses"], 1);
    let notices = notifier.notices();
    assert_eq!(
        notices.last().map(|(_, message)| message.as_str()),
        Some("Survey closed, 1 badge(s) awarded.")
    );
}

#[tokio::test]
async fn partial_closure_lists_created_and_failed_awards() {
    let (router, data, _) = router_for(open_end_date());
    let answers = with_nomination(complete_answers(4), &badge("best_dancer"), "u3");
    router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/festivals/fest-1/survey/responses",
            json!({ "user_id": "u1", "answers": answers }),
        ))
        .await
        .expect("route executes");
    data.fail_award_for(&badge("best_dancer"));

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/festivals/fest-1/survey/close",
            json!({ "user_id": ORGANIZER }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["created"], json!([]));
    assert_eq!(payload["failed"][0]["award"]["user_id"], "u3");
}

#[tokio::test]
async fn flag_failure_after_awards_lists_what_was_created() {
    let (router, data, notifier) = router_for(open_end_date());
    let answers = with_nomination(complete_answers(4), &badge("best_dancer"), "u3");
    router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/festivals/fest-1/survey/responses",
            json!({ "user_id": "u1", "answers": answers }),
        ))
        .await
        .expect("route executes");
    data.fail_set_active();

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/festivals/fest-1/survey/close",
            json!({ "user_id": ORGANIZER }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["created"][0]["user_id"], "u3");
    assert_eq!(payload["failed"], json!([]));
    assert_eq!(
        notifier.notices().last().map(|(level, _)| *level),
        Some(NoticeLevel::Error)
    );
}

#[tokio::test]
async fn questions_route_lists_base_and_badge_questions() {
    let (router, _, _) = router_for(open_end_date());

    let response = router
        .oneshot(get("/api/v1/festivals/fest-1/survey/questions"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let questions = payload["questions"].as_array().expect("question list");
    assert_eq!(questions.len(), 16);
    assert_eq!(questions[0]["key"], "overall_rating");
    assert_eq!(questions[8]["type"], "badge_nomination");
}

#[tokio::test]
async fn statistics_route_serializes_aggregates() {
    let (router, _, _) = router_for(open_end_date());

    let response = router
        .oneshot(get("/api/v1/festivals/fest-1/survey/statistics"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total_participants"], 3);
    assert_eq!(payload["response_rate"], 0);
}

#[tokio::test]
async fn overview_route_returns_not_found_for_unknown_festivals() {
    let (router, _, _) = router_for(open_end_date());

    let response = router
        .oneshot(get("/api/v1/festivals/ghost/survey?user_id=u1"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overview_route_reports_open_window() {
    let (router, _, _) = router_for(open_end_date());

    let response = router
        .oneshot(get("/api/v1/festivals/fest-1/survey?user_id=u1"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "OPEN");
    assert_eq!(payload["can_submit"], true);
}

#[tokio::test]
async fn attendance_route_conflicts_after_the_end() {
    let (router, _, _) = router_for(open_end_date());

    let response = router
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/festivals/fest-1/attendance",
            json!({ "user_id": "u4", "status": "have_ticket" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn attendance_route_updates_before_the_end() {
    let (router, _, _) = router_for(Utc::now() + Duration::days(3));

    let response = router
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/festivals/fest-1/attendance",
            json!({ "user_id": "u4", "status": "have_ticket" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "have_ticket");
}
