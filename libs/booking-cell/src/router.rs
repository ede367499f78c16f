use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::{admin_middleware, auth_middleware};

use crate::handlers;

pub fn booking_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::list_user_bookings))
        .route("/bed", post(handlers::reserve_bed))
        .route("/appointment", post(handlers::reserve_appointment))
        .route("/cancel", post(handlers::cancel_booking))
        .route("/{booking_id}", get(handlers::get_booking))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

/// Booking oversight for administrators. Nested under `/admin` next to the inventory admin routes.
pub fn booking_admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/hospitals/{hospital_id}/bed-bookings", get(handlers::bed_bookings))
        .route(
            "/hospitals/{hospital_id}/doctors/{doctor_id}/bookings",
            get(handlers::doctor_bookings),
        )
        .route("/doctors/{doctor_id}/clinic-bookings", get(handlers::clinic_bookings))
        .route("/bookings/cancel", post(handlers::cancel_booking))
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
