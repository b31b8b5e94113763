use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::router::scheduling_routes;
use shared_utils::test_utils::TestConfig;

fn app_for(server: &MockServer) -> Router {
    scheduling_routes(Arc::new(TestConfig::with_url(server.uri()).to_app_config()))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", "Bearer test-token")
        .body(Body::empty())
        .unwrap()
}

fn period_row(id: Uuid, staff_id: Uuid, start: &str, end: &str) -> Value {
    json!({
        "id": id,
        "staff_id": staff_id,
        "clinic_id": Uuid::from_u128(1),
        "day_of_week": 1,
        "start_time": start,
        "end_time": end,
        "slot_duration_minutes": 30
    })
}

#[tokio::test]
async fn test_slots_endpoint_marks_booked_times() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::from_u128(1);
    let staff_id = Uuid::from_u128(2);

    Mock::given(method("GET"))
        .and(path("/rest/v1/work_periods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            period_row(Uuid::new_v4(), staff_id, "09:00:00", "10:30:00")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "appointment_date": "2025-03-10", "time_slot": "09:00:00", "staff_id": staff_id }
        ])))
        .mount(&server)
        .await;

    let (status, body) = send(
        app_for(&server),
        get(&format!("/clinics/{}/slots?date=2025-03-10", clinic_id)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["slots"][0]["time"], "09:00");
    assert_eq!(body["slots"][0]["available"], false);
    assert_eq!(body["first_available"]["time"], "09:30");
}

#[tokio::test]
async fn test_slots_endpoint_rejects_malformed_date() {
    let server = MockServer::start().await;

    let (status, _) = send(
        app_for(&server),
        get(&format!("/clinics/{}/slots?date=10-03-2025", Uuid::from_u128(1))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_slots_endpoint_reports_missing_schedule() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (status, _) = send(
        app_for(&server),
        get(&format!("/clinics/{}/slots?date=2025-03-10", Uuid::from_u128(1))),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conflicts_endpoint_sorts_by_severity() {
    let server = MockServer::start().await;
    let staff_id = Uuid::from_u128(2);

    Mock::given(method("GET"))
        .and(path("/rest/v1/work_periods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            period_row(Uuid::from_u128(10), staff_id, "08:00:00", "09:00:00"),
            period_row(Uuid::from_u128(11), staff_id, "09:10:00", "12:00:00"),
            period_row(Uuid::from_u128(12), staff_id, "11:30:00", "14:00:00"),
        ])))
        .mount(&server)
        .await;

    let (status, body) = send(
        app_for(&server),
        get(&format!(
            "/clinics/{}/conflicts?by_severity=true&from=2025-03-10&to=2025-03-16",
            Uuid::from_u128(1)
        )),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["conflicts"][0]["severity"], "high");
    assert_eq!(body["conflicts"][0]["conflict_type"], "time_overlap");
    assert_eq!(body["conflicts"][0]["date"], "2025-03-10");
    assert_eq!(body["conflicts"][1]["severity"], "medium");
}

#[tokio::test]
async fn test_conflicts_endpoint_rejects_inverted_range() {
    let server = MockServer::start().await;

    let (status, _) = send(
        app_for(&server),
        get(&format!(
            "/clinics/{}/conflicts?from=2025-03-16&to=2025-03-10",
            Uuid::from_u128(1)
        )),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_booking_requires_bearer_token() {
    let server = MockServer::start().await;

    let request = Request::builder()
        .method("POST")
        .uri("/appointments")
        .header("Content-Type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();

    let (status, _) = send(app_for(&server), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_validation_happens_before_submission() {
    let server = MockServer::start().await;

    let request = Request::builder()
        .method("POST")
        .uri("/appointments")
        .header("Authorization", "Bearer test-token")
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({
                "clinic_id": Uuid::from_u128(1),
                "patient_id": Uuid::from_u128(3),
                "service_type": "consultation",
                "date": "2025-03-10",
                "time_slot": "25:99"
            })
            .to_string(),
        ))
        .unwrap();

    let (status, body) = send(app_for(&server), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("24h"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
