use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::auth::SignIn;
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
pub struct PhoneSignInRequest {
    pub name: Option<String>,
    #[serde(rename = "firebaseToken")]
    pub firebase_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

pub async fn phone_sign_in(
    State(state): State<AppState>,
    Json(request): Json<PhoneSignInRequest>,
) -> AppResult<Json<SignIn>> {
    let signed_in = state
        .auth
        .phone_sign_in(&request.firebase_token, request.name.as_deref())
        .await?;
    Ok(Json(signed_in))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let access_token = state.auth.refresh(&request.refresh_token)?;
    Ok(Json(RefreshResponse { access_token }))
}
