use axum::{routing::post, Router};

use super::handlers::{phone_sign_in, refresh};
use crate::app_state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/phone-signin", post(phone_sign_in))
        .route("/refresh", post(refresh))
}
