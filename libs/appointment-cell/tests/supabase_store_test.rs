mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::*;
use common::*;
use shared_database::SupabaseClient;

fn store_for(server: &MockServer) -> SupabaseStore {
    SupabaseStore::new(Arc::new(SupabaseClient::with_base_url(&server.uri(), "test-anon-key")))
}

fn slot_row(time: &str, status: &str, number: Option<&str>, name: Option<&str>) -> serde_json::Value {
    json!({
        "day": "2025-05-25",
        "time": time,
        "status": status,
        "booking_number": number,
        "patient_name": name,
        "patient_contact": name.map(|_| "1234567890"),
    })
}

fn appointment_row(id: u64, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "patient_name": "Alice",
        "contact_email": null,
        "moment": "2025-05-26T10:00:00",
        "duration_minutes": 30,
        "doctor": "Dr. Smith",
        "status": status,
        "reason": "checkup",
        "urgency": 3,
        "request_time": "2025-05-20T08:00:00",
        "is_preferred_time": false,
    })
}

#[tokio::test]
async fn populate_counts_only_new_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/slots"))
        .and(query_param("on_conflict", "day,time"))
        .and(header("apikey", "test-anon-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            slot_row("09:00:00", "Available", None, None),
            slot_row("09:30:00", "Available", None, None),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let created = store_for(&server)
        .populate_day(day(2025, 5, 25), &[slot(9, 0), slot(9, 30), slot(10, 0)])
        .await
        .unwrap();

    assert_eq!(created, 2);
}

#[tokio::test]
async fn booking_goes_through_the_transactional_procedure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/book_slot"))
        .and(body_partial_json(json!({ "p_day": "2025-05-25", "p_time": "10:00:00" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            slot_row("10:00:00", "Booked", Some("BOOK-7"), Some("Alice")),
        ])))
        .mount(&server)
        .await;

    let outcome = store_for(&server)
        .book_slot(
            day(2025, 5, 25),
            slot(10, 0),
            Occupant { name: "Alice".into(), contact: "1234567890".into() },
        )
        .await
        .unwrap();

    assert_matches!(outcome, SlotBookingOutcome::Booked(slot) => {
        assert_eq!(slot.booking_number, Some(BookingNumber(7)));
        assert_eq!(slot.status, SlotStatus::Booked);
    });
}

#[tokio::test]
async fn empty_booking_result_distinguishes_taken_from_missing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/book_slot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .and(query_param("time", "eq.10:00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            slot_row("10:00:00", "Booked", Some("BOOK-1"), Some("Alice")),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .and(query_param("time", "eq.23:00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let occupant = Occupant { name: "Bob".into(), contact: "0987654321".into() };

    assert_eq!(
        store.book_slot(day(2025, 5, 25), slot(10, 0), occupant.clone()).await.unwrap(),
        SlotBookingOutcome::AlreadyBooked
    );
    assert_eq!(
        store.book_slot(day(2025, 5, 25), slot(23, 0), occupant).await.unwrap(),
        SlotBookingOutcome::Missing
    );
}

#[tokio::test]
async fn day_listing_parses_rows_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .and(query_param("day", "eq.2025-05-25"))
        .and(query_param("order", "time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            slot_row("09:00:00", "Available", None, None),
            slot_row("09:30:00", "Booked", Some("BOOK-3"), Some("Alice")),
        ])))
        .mount(&server)
        .await;

    let slots = store_for(&server).slots_for_day(day(2025, 5, 25)).await.unwrap();

    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].time.to_string(), "09:00 AM");
    assert!(slots[0].occupant.is_none());
    assert_eq!(slots[1].occupant.as_ref().unwrap().name, "Alice");
}

#[tokio::test]
async fn rejected_insert_is_reported_as_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/schedule_appointment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let draft = AppointmentDraft {
        patient_name: "Bob".into(),
        contact_email: None,
        moment: at(day(2025, 5, 26), 10, 0),
        duration_minutes: 30,
        doctor: "Dr. Smith".into(),
        reason: String::new(),
        urgency: Default::default(),
        request_time: at(day(2025, 5, 20), 8, 0),
        is_preferred_time: false,
    };

    assert_eq!(
        store_for(&server).insert_appointment(draft).await.unwrap(),
        AppointmentInsert::Conflict
    );
}

#[tokio::test]
async fn status_transition_is_conditional_on_current_status() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.1"))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(1, "cancelled")])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(2, "cancelled")])))
        .mount(&server)
        .await;

    let store = store_for(&server);

    assert_matches!(
        store
            .transition_appointment(1, AppointmentStatus::Scheduled, AppointmentStatus::Cancelled)
            .await
            .unwrap(),
        StatusTransition::Applied(a) if a.status == AppointmentStatus::Cancelled
    );
    assert_matches!(
        store
            .transition_appointment(2, AppointmentStatus::Scheduled, AppointmentStatus::Cancelled)
            .await
            .unwrap(),
        StatusTransition::Unchanged(a) if a.id == 2
    );
}

#[tokio::test]
async fn server_errors_surface_as_database_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = store_for(&server).booked_slots().await;

    assert_matches!(result, Err(AppointmentError::DatabaseError(_)));
}
