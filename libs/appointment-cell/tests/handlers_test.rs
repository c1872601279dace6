mod common;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::handlers::*;
use appointment_cell::*;
use common::*;

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    // Extractor rejections answer in plain text.
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn populate_handler_reports_created_rows() {
    let h = harness_at(at(day(2025, 5, 20), 8, 0));

    let Json(body) = populate_slots(State(h.service.clone()), Path(day(2025, 5, 25)))
        .await
        .unwrap();

    assert_eq!(body["created"], json!(22));
}

#[tokio::test]
async fn double_booking_over_http_returns_conflict_with_nearby() {
    let h = harness_at(at(day(2025, 5, 20), 8, 0));
    let app = scheduling_routes(h.service.clone());

    let (status, _) = send(&app, "POST", "/slots/2025-05-25/populate", None).await;
    assert_eq!(status, StatusCode::OK);

    let booking = json!({ "time": "10:00 AM", "name": "Alice", "contact": "1234567890" });
    let (status, body) = send(&app, "POST", "/slots/2025-05-25/book", Some(booking)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["booking_number"], json!("BOOK-1"));

    let booking = json!({ "time": "10:00 AM", "name": "Bob", "contact": "0987654321" });
    let (status, body) = send(&app, "POST", "/slots/2025-05-25/book", Some(booking)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["booked"], json!(false));
    assert_eq!(body["nearby"]["predecessor"], json!("09:30 AM"));
    assert_eq!(body["nearby"]["successor"], json!("10:30 AM"));

    let (status, body) = send(&app, "GET", "/bookings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["bookings"][0]["occupant"]["name"], json!("Alice"));
}

#[tokio::test]
async fn nearby_route_parses_twelve_hour_time() {
    let h = harness_at(at(day(2025, 5, 20), 8, 0));
    let app = scheduling_routes(h.service.clone());
    send(&app, "POST", "/slots/2025-05-25/populate", None).await;

    let (status, body) = send(&app, "GET", "/slots/2025-05-25/nearby?time=02:00%20PM", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nearby"]["predecessor"], json!("01:30 PM"));
    assert_eq!(body["nearby"]["successor"], json!("02:30 PM"));
}

#[tokio::test]
async fn appointment_lifecycle_over_http() {
    let h = harness_at(at(day(2025, 5, 20), 8, 0));
    let app = scheduling_routes(h.service.clone());
    let new_appointment = json!({
        "patient_name": "Alice",
        "moment": "2025-05-26T10:00:00",
        "doctor": "Dr. Smith",
        "urgency": 4
    });

    let (status, created) = send(&app, "POST", "/appointments", Some(new_appointment.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_u64().unwrap();

    let (status, _) = send(&app, "POST", "/appointments", Some(new_appointment)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, fetched) = send(&app, "GET", &format!("/appointments/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], json!("scheduled"));

    let (status, _) = send(&app, "POST", &format!("/appointments/{}/complete", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", &format!("/appointments/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/appointments/999/cancel", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, listing) = send(&app, "GET", "/appointments/day/2025-05-26", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["appointments"][0]["status"], json!("completed"));

    assert_eq!(h.tracker.outcomes().len(), 1);
    assert!(h.tracker.outcomes()[0].2);
}

#[tokio::test]
async fn next_available_route_skips_weekend() {
    let h = harness_at(at(day(2025, 5, 23), 18, 0));
    let app = scheduling_routes(h.service.clone());

    let (status, body) = send(
        &app,
        "GET",
        "/appointments/next-available?preferred_start=2025-05-23T18:00:00&urgency=2",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["next_available"], json!("2025-05-26T09:00:00"));
}

#[tokio::test]
async fn batch_route_returns_one_outcome_per_request() {
    let h = harness_at(at(day(2025, 5, 26), 8, 0));
    let app = scheduling_routes(h.service.clone());
    let batch = json!([
        {
            "patient_name": "Alice",
            "doctor": "Dr. Smith",
            "urgency": 2,
            "preferred_start": "2025-05-26T09:00:00",
            "request_time": "2025-05-25T12:00:00"
        },
        {
            "patient_name": "Bob",
            "doctor": "Dr. Smith",
            "urgency": 5,
            "preferred_start": "2025-05-26T09:00:00",
            "request_time": "2025-05-26T07:00:00"
        }
    ]);

    let (status, body) = send(&app, "POST", "/appointments/batch", Some(batch)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduled"], json!(2));
    assert_eq!(body["outcomes"][0]["appointment"]["patient_name"], json!("Bob"));
}

#[tokio::test]
async fn invalid_day_in_path_is_rejected() {
    let h = harness_at(at(day(2025, 5, 20), 8, 0));
    let app = scheduling_routes(h.service.clone());

    let (status, _) = send(&app, "GET", "/slots/2025-02-30", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn far_calendar_dates_are_answered_without_results() {
    let h = harness_at(at(day(2025, 5, 20), 8, 0));
    let app = scheduling_routes(h.service.clone());

    let uri = format!("/appointments/day/{}", chrono::NaiveDate::MAX);
    let (status, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(0));

    let uri = format!(
        "/appointments/next-available?preferred_start={}&urgency=2",
        at(chrono::NaiveDate::MIN, 9, 0).format("%Y-%m-%dT%H:%M:%S")
    );
    let (status, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["next_available"], Value::Null);
}
