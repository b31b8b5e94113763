use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    // Every route forwards the caller's bearer token to the store
    Router::new()
        .route("/clinics/{clinic_id}/slots", get(handlers::get_available_slots))
        .route("/clinics/{clinic_id}/slots/auto-assign", get(handlers::auto_assign_slot))
        .route("/clinics/{clinic_id}/conflicts", get(handlers::get_schedule_conflicts))
        .route("/appointments", post(handlers::book_appointment))
        .with_state(state)
}
