use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::{admin_middleware, auth_middleware};

use crate::handlers;

pub fn inventory_routes(state: AppState) -> Router {
    Router::new()
        .route("/hospitals", get(handlers::list_hospitals))
        .route("/hospitals/{hospital_id}/beds", get(handlers::available_beds))
        .route("/hospitals/{hospital_id}/doctors", get(handlers::hospital_doctors))
        .route("/clinics", get(handlers::list_clinics))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

pub fn inventory_admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/hospitals", post(handlers::add_hospital))
        .route("/hospitals/{hospital_id}/beds", post(handlers::init_beds))
        .route("/hospitals/{hospital_id}/doctors", post(handlers::affiliate_doctor))
        .route(
            "/hospitals/{hospital_id}/doctors/{doctor_id}",
            patch(handlers::update_affiliation),
        )
        .route(
            "/hospitals/{hospital_id}/candidate-doctors",
            get(handlers::unaffiliated_doctors),
        )
        .route("/beds/{bed_id}", patch(handlers::update_bed_type))
        .route("/doctors", post(handlers::add_doctor))
        .route(
            "/doctors/{doctor_id}/clinic",
            patch(handlers::update_clinic_timings).put(handlers::set_private_clinic),
        )
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
