use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, State},
    http::{Request, StatusCode},
    Json, Router,
};
use chrono::NaiveTime;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use booking_cell::handlers::reserve_appointment;
use booking_cell::models::ReserveAppointmentRequest;
use booking_cell::router::{booking_admin_routes, booking_routes};
use shared_database::{AppState, InventoryStore, MemoryStore};
use shared_models::error::AppError;
use shared_models::inventory::{
    Address, AppointmentSlot, Bed, Doctor, Hospital, PrivateClinic, Timings, Ward,
};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    state: AppState,
    hospital: Hospital,
    bed: Bed,
    doctor: Doctor,
    secret: String,
}

async fn setup() -> TestApp {
    let config = TestConfig::default();
    let store = Arc::new(MemoryStore::new());

    let address = Address {
        street: "12 Lake Road".to_string(),
        city: "Kolkata".to_string(),
        state: "West Bengal".to_string(),
        zip_code: "700029".to_string(),
        lat: None,
        lng: None,
    };
    let hospital = Hospital::new("City General".into(), address.clone(), "1234567890".into(), 1, true);
    let bed = Bed::new(hospital.id, Ward::Icu, "1".into());
    let mut doctor = Doctor::new("Dr. Jane Doe".into(), "Cardiology".into(), "1234567899".into());
    doctor.private_clinic = Some(PrivateClinic {
        clinic_name: "Doe Heart Clinic".into(),
        address,
        slot: AppointmentSlot::new(
            Timings {
                start: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            },
            1,
        ),
    });

    store.insert_hospital(&hospital).await.unwrap();
    store.insert_beds(std::slice::from_ref(&bed)).await.unwrap();
    store.insert_doctor(&doctor).await.unwrap();

    TestApp {
        state: AppState::new(config.to_arc(), store),
        hospital,
        bed,
        doctor,
        secret: config.jwt_secret,
    }
}

impl TestApp {
    fn router(&self) -> Router {
        Router::new()
            .nest("/booking", booking_routes(self.state.clone()))
            .nest("/admin", booking_admin_routes(self.state.clone()))
    }

    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.secret, None)
    }

    async fn send(&self, method: &str, uri: &str, user: Option<&TestUser>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("Authorization", format!("Bearer {}", self.token(user)));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn bed_body(&self) -> Value {
        json!({
            "hospital_id": self.hospital.id,
            "bed_id": self.bed.id,
            "patient_name": "John Smith",
            "patient_contact": "9876543210",
            "check_in_date": "2024-10-10T10:00:00Z"
        })
    }
}

#[tokio::test]
async fn booking_routes_require_a_token() {
    let app = setup().await;

    let (status, body) = app.send("POST", "/booking/bed", None, Some(app.bed_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing authorization header");
}

#[tokio::test]
async fn bed_booking_round_trip_over_http() {
    let app = setup().await;
    let user = TestUser::patient("patient@example.com");

    let (status, body) = app.send("POST", "/booking/bed", Some(&user), Some(app.bed_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["booking"]["status"], "confirmed");
    assert_eq!(body["booking"]["booking_type"], "bed_booking");
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    // The only bed is gone.
    let (status, _) = app
        .send("POST", "/booking/bed", Some(&TestUser::default()), Some(app.bed_body()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send("GET", "/booking", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["bookings"][0]["hospital"]["name"], "City General");
    assert_eq!(body["bookings"][0]["bed"]["ward"], "icu");

    let (status, _) = app
        .send("GET", &format!("/booking/{}", booking_id), Some(&TestUser::default()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send("POST", "/booking/cancel", Some(&TestUser::default()), Some(json!({ "booking_id": booking_id })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("POST", "/booking/cancel", Some(&user), Some(json!({ "booking_id": booking_id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "cancelled");

    let (status, _) = app
        .send("POST", "/booking/cancel", Some(&user), Some(json!({ "booking_id": booking_id })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn appointment_errors_map_to_statuses() {
    let app = setup().await;
    let user = TestUser::default();

    let (status, _) = app
        .send(
            "POST",
            "/booking/appointment",
            Some(&user),
            Some(json!({
                "doctor_id": Uuid::new_v4(),
                "patient_name": "John Smith",
                "patient_contact": "9876543210",
                "appointment_date": "2024-10-10T17:30:00Z"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let clinic_body = json!({
        "doctor_id": app.doctor.id,
        "patient_name": "John Smith",
        "patient_contact": "9876543210",
        "appointment_date": "2024-10-10T17:30:00Z"
    });
    let (status, body) = app
        .send("POST", "/booking/appointment", Some(&user), Some(clinic_body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["booking_type"], "clinic_appointment");

    let (status, body) = app
        .send("POST", "/booking/appointment", Some(&user), Some(clinic_body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No appointment slots left");
}

#[tokio::test]
async fn admin_booking_routes_are_admin_only() {
    let app = setup().await;
    let uri = format!("/admin/hospitals/{}/bed-bookings", app.hospital.id);

    let (status, _) = app.send("GET", &uri, Some(&TestUser::default()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let user = TestUser::default();
    let (_, body) = app.send("POST", "/booking/bed", Some(&user), Some(app.bed_body())).await;
    let booking_id = body["booking"]["id"].clone();

    let admin = TestUser::admin("admin@example.com");
    let (status, body) = app.send("GET", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body) = app
        .send("POST", "/admin/bookings/cancel", Some(&admin), Some(json!({ "booking_id": booking_id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "cancelled");

    let (status, _) = app
        .send("GET", &format!("/admin/hospitals/{}/bed-bookings", Uuid::new_v4()), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn handler_rejects_non_uuid_subject() {
    let app = setup().await;
    let mut user = TestUser::default().to_user();
    user.id = "not-a-uuid".to_string();

    let result = reserve_appointment(
        State(app.state.clone()),
        Extension(user),
        Json(ReserveAppointmentRequest {
            hospital_id: None,
            doctor_id: app.doctor.id,
            patient_name: "John Smith".into(),
            patient_contact: "9876543210".into(),
            appointment_date: chrono::Utc::now(),
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::Auth(_))));
}
