use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub storage_backend: StorageBackend,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            storage_backend: StorageBackend::Memory,
        }
    }
}

impl TestConfig {
    /// Config pointing the Supabase backend at a mock server.
    pub fn supabase(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            storage_backend: StorageBackend::Supabase,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage_backend: self.storage_backend,
            page_size: 10,
            request_timeout_secs: 5,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", "user")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "user")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).unwrap_or_default()
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    /// Supabase-shaped token: the top-level role is "authenticated" and the
    /// application role lives in `app_metadata`.
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": { "role": user.role },
            "aud": "authenticated",
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// PostgREST row fixtures.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn hospital_row(hospital_id: Uuid, total_beds: u32, beds_available: u32) -> Value {
        json!({
            "id": hospital_id,
            "name": "City General Hospital",
            "address": {
                "street": "12 Lake Road",
                "city": "Kolkata",
                "state": "West Bengal",
                "zip_code": "700029",
                "lat": null,
                "lng": null
            },
            "contact_number": "1234567890",
            "total_beds": total_beds,
            "beds_available": beds_available,
            "doctors": [],
            "emergency_services": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn bed_row(bed_id: Uuid, hospital_id: Uuid, booking_id: Option<Uuid>) -> Value {
        let status = if booking_id.is_some() { "occupied" } else { "available" };
        json!({
            "id": bed_id,
            "hospital_id": hospital_id,
            "ward": "general",
            "bed_number": "101",
            "bed_type": "general",
            "status": status,
            "booking_id": booking_id
        })
    }

    pub fn doctor_row(doctor_id: Uuid, hospital_id: Uuid, max_appointment: u32) -> Value {
        json!({
            "id": doctor_id,
            "name": "Dr. Jane Doe",
            "specialty": "Cardiology",
            "contact_number": "1234567899",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "appointment_slots": [{
                "kind": "hospital",
                "hospital_id": hospital_id,
                "clinic_name": null,
                "address": null,
                "start_time": "09:00:00",
                "end_time": "13:00:00",
                "max_appointment": max_appointment,
                "appointments": []
            }]
        })
    }

    pub fn booking_row(booking_id: Uuid, hospital_id: Uuid, bed_id: Uuid, status: &str) -> Value {
        json!({
            "id": booking_id,
            "patient_name": "John Smith",
            "patient_contact": "9876543210",
            "booking_type": "bed_booking",
            "hospital_id": hospital_id,
            "bed_id": bed_id,
            "doctor_id": null,
            "check_in_date": "2024-10-10T10:00:00Z",
            "check_out_date": null,
            "appointment_date": null,
            "status": status,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
