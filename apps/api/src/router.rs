use axum::{routing::get, Router};

use booking_cell::router::{booking_admin_routes, booking_routes};
use inventory_cell::router::{inventory_admin_routes, inventory_routes};
use shared_database::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Booking API is running!" }))
        .nest("/booking", booking_routes(state.clone()))
        .nest("/inventory", inventory_routes(state.clone()))
        .nest(
            "/admin",
            booking_admin_routes(state.clone()).merge(inventory_admin_routes(state)),
        )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

    use super::*;

    async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn liveness_needs_no_token() {
        let config = TestConfig::default();
        let app = create_router(AppState::from_config(config.to_app_config()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_setup_then_patient_booking() {
        let config = TestConfig::default();
        let app = create_router(AppState::from_config(config.to_app_config()));
        let admin = JwtTestUtils::create_test_token(&TestUser::admin("admin@example.com"), &config.jwt_secret, None);
        let patient = JwtTestUtils::create_test_token(&TestUser::default(), &config.jwt_secret, None);

        let (status, body) = call(
            &app,
            "POST",
            "/admin/hospitals",
            Some(&admin),
            Some(json!({
                "name": "City General",
                "contact_number": "1234567890",
                "address": {
                    "street": "12 Lake Road",
                    "city": "Kolkata",
                    "state": "West Bengal",
                    "zip_code": "700029"
                },
                "total_beds": 1
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let hospital_id = body["hospital"]["id"].as_str().unwrap().to_string();

        let (_, body) = call(
            &app,
            "POST",
            &format!("/admin/hospitals/{}/beds", hospital_id),
            Some(&admin),
            Some(json!({ "wards": [{ "ward": "general", "count": 1 }] })),
        )
        .await;
        let bed_id = body["beds"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            "/booking/bed",
            Some(&patient),
            Some(json!({
                "hospital_id": hospital_id,
                "bed_id": bed_id,
                "patient_name": "John Smith",
                "patient_contact": "9876543210",
                "check_in_date": "2024-10-10T10:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["booking"]["status"], "confirmed");

        // The last bed is taken, so the hospital drops out of the listing.
        let (status, body) = call(&app, "GET", "/inventory/hospitals", Some(&patient), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hospitals"].as_array().map(Vec::len), Some(0));

        let (status, body) = call(
            &app,
            "GET",
            &format!("/admin/hospitals/{}/bed-bookings", hospital_id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
    }
}
