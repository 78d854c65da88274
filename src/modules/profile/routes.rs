use axum::{
    routing::{get, put},
    Router,
};

use super::handlers::{get_profile, update_profile};
use crate::app_state::AppState;

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile))
        .route("/update", put(update_profile))
}
