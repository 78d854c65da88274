use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers::{
    admin_dashboard, create_assignment, generate_certificates, get_task, list_assignments,
    list_certificates, revoke_assignment, send_certificates,
};
use crate::app_state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_dashboard))
        .route("/certificates", get(list_certificates))
        .route("/enrollments/{id}/certificates", post(generate_certificates))
        .route("/enrollments/{id}/certificates/send", post(send_certificates))
        .route("/tasks/{id}", get(get_task))
        .route("/assignments", get(list_assignments).post(create_assignment))
        .route("/assignments/{id}", delete(revoke_assignment))
}
