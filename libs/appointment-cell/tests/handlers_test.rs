use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::router::appointment_routes;
use appointment_cell::AppointmentState;
use availability_cell::router::availability_routes;
use availability_cell::SchedulingState;
use shared_utils::test_utils::TestConfig;

struct TestApp {
    doctors: Router,
    appointments: Router,
}

impl TestApp {
    fn new() -> Self {
        let scheduling = Arc::new(SchedulingState::in_memory(TestConfig::default().to_app_config()));
        let appointments = Arc::new(AppointmentState::from_scheduling(Arc::clone(&scheduling)));
        Self {
            doctors: availability_routes(scheduling),
            appointments: appointment_routes(appointments),
        }
    }

    async fn open_reference_day(&self, doctor: Uuid) {
        let (status, _) = send(
            &self.doctors,
            Method::POST,
            &format!("/{}/availability/2024-06-10", doctor),
            Some(json!({
                "morning_start_time": "09:00:00",
                "morning_end_time": "11:00:00",
                "slot_duration_minutes": 30
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    async fn book(&self, doctor: Uuid, slot_id: &str, patient: Uuid) -> (StatusCode, Value) {
        send(
            &self.appointments,
            Method::POST,
            &format!("/doctors/{}/dates/2024-06-10/slots/{}/book", doctor, slot_id),
            Some(json!({ "patient_id": patient })),
        )
        .await
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn book_and_list_for_doctor_and_patient() {
    let app = TestApp::new();
    let doctor = Uuid::new_v4();
    let patient = Uuid::new_v4();
    app.open_reference_day(doctor).await;

    let (status, body) = app.book(doctor, "2024-06-10T09:30", patient).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "booked");
    assert_eq!(body["appointment"]["patient_id"], patient.to_string());

    let (status, body) = send(
        &app.appointments,
        Method::GET,
        &format!("/doctors/{}?from=2024-06-01&to=2024-06-30", doctor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["slot_id"], "2024-06-10T09:30");

    let (_, body) = send(
        &app.appointments,
        Method::GET,
        &format!("/patients/{}?from=2024-06-10&to=2024-06-10", patient),
        None,
    )
    .await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn double_booking_is_a_conflict() {
    let app = TestApp::new();
    let doctor = Uuid::new_v4();
    app.open_reference_day(doctor).await;

    app.book(doctor, "2024-06-10T10:00", Uuid::new_v4()).await;
    let (status, body) = app.book(doctor, "2024-06-10T10:00", Uuid::new_v4()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn booking_unknown_slot_is_not_found() {
    let app = TestApp::new();
    let doctor = Uuid::new_v4();
    app.open_reference_day(doctor).await;

    let (status, _) = app.book(doctor, "2024-06-10T13:00", Uuid::new_v4()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_is_idempotent_over_http() {
    let app = TestApp::new();
    let doctor = Uuid::new_v4();
    app.open_reference_day(doctor).await;
    app.book(doctor, "2024-06-10T09:00", Uuid::new_v4()).await;

    let uri = format!("/doctors/{}/dates/2024-06-10/slots/2024-06-10T09:00/cancel", doctor);
    let (status, body) = send(&app.appointments, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert_eq!(body["slot"]["status"], "cancelled");
    assert_eq!(body["slot"]["appointment"]["status"], "cancelled");

    let (status, body) = send(&app.appointments, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);
}

#[tokio::test]
async fn completing_a_past_booking() {
    let app = TestApp::new();
    let doctor = Uuid::new_v4();
    app.open_reference_day(doctor).await;
    app.book(doctor, "2024-06-10T10:30", Uuid::new_v4()).await;

    let (status, body) = send(
        &app.appointments,
        Method::POST,
        &format!("/doctors/{}/dates/2024-06-10/slots/2024-06-10T10:30/complete", doctor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slot"]["status"], "completed");

    // Completed slots pin the date.
    let (status, _) = send(
        &app.doctors,
        Method::DELETE,
        &format!("/{}/availability/2024-06-10", doctor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancel_all_then_day_sheet() {
    let app = TestApp::new();
    let doctor = Uuid::new_v4();
    app.open_reference_day(doctor).await;
    app.book(doctor, "2024-06-10T09:00", Uuid::new_v4()).await;

    let (status, body) = send(
        &app.appointments,
        Method::POST,
        &format!("/doctors/{}/dates/2024-06-10/cancel-all", doctor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], 4);
    assert_eq!(body["skipped"], json!([]));

    let (status, body) = send(
        &app.appointments,
        Method::GET,
        &format!("/doctors/{}/dates/2024-06-10/slots", doctor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_slots"], 4);
    assert!(body["slots"]
        .as_array()
        .unwrap()
        .iter()
        .all(|slot| slot["status"] == "cancelled" && slot["patient"].is_null()));
}

#[tokio::test]
async fn reversed_range_is_a_validation_error() {
    let app = TestApp::new();

    let (status, body) = send(
        &app.appointments,
        Method::GET,
        &format!("/doctors/{}?from=2024-06-30&to=2024-06-01", Uuid::new_v4()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn upcoming_excludes_past_appointments() {
    let app = TestApp::new();
    let doctor = Uuid::new_v4();
    let patient = Uuid::new_v4();
    app.open_reference_day(doctor).await;
    app.book(doctor, "2024-06-10T09:00", patient).await;

    let (status, body) = send(
        &app.appointments,
        Method::GET,
        &format!("/patients/{}/upcoming", patient),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}
