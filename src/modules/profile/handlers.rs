use axum::{extract::State, Json};
use serde::Serialize;

use crate::app_state::AppState;
use crate::auth::AuthenticatedAccount;
use crate::error::AppResult;
use crate::profile::{ProfileOverview, ProfileView, UpdateProfile};

#[derive(Debug, Serialize)]
pub struct ProfileUpdated {
    pub message: &'static str,
    pub data: ProfileView,
}

pub async fn get_profile(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
) -> AppResult<Json<ProfileOverview>> {
    Ok(Json(state.profile.overview(account.id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Json(request): Json<UpdateProfile>,
) -> AppResult<Json<ProfileUpdated>> {
    let data = state.profile.update(account.id, request).await?;
    Ok(Json(ProfileUpdated {
        message: "Profile updated successfully",
        data,
    }))
}
