//! services/api/src/web/auth.rs
//!
//! Sign-up, sign-in, and sign-out endpoints.
//!
//! There are no credentials anywhere here: signing up creates a profile and
//! makes it the session singleton, signing in re-activates an existing
//! profile by id. Identity is a claim, not a verification.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::web::state::AppState;
use drona_core::domain::{new_record_id, Profile, Role};
use drona_core::ports::RecordStore;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    /// "teacher" or "student".
    #[schema(value_type = String)]
    pub role: Role,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SigninRequest {
    pub id: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a profile and make it the active session.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Profile created and session started"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = Profile {
        id: new_record_id(),
        name: req.name,
        role: req.role,
        phone_number: req.phone,
        email: req.email,
    };

    state.store.create_profile(profile.clone()).await.map_err(|e| {
        error!("Failed to create profile: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create profile".to_string(),
        )
    })?;

    state.store.set_session(profile.clone()).await.map_err(|e| {
        error!("Failed to start session: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start session".to_string(),
        )
    })?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// POST /auth/signin - Re-activate an existing profile by id.
#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Session started"),
        (status = 401, description = "Unknown profile id"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SigninRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state
        .store
        .profile_by_id(&req.id)
        .await
        .map_err(|e| {
            error!("Failed to look up profile: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to look up profile".to_string(),
            )
        })?
        .ok_or((StatusCode::UNAUTHORIZED, "Unknown profile id".to_string()))?;

    state.store.set_session(profile.clone()).await.map_err(|e| {
        error!("Failed to start session: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start session".to_string(),
        )
    })?;

    Ok((StatusCode::OK, Json(profile)))
}

/// POST /auth/signout - Clear the active session.
#[utoipa::path(
    post,
    path = "/auth/signout",
    responses(
        (status = 200, description = "Session cleared"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signout_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.store.clear_session().await.map_err(|e| {
        error!("Failed to clear session: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to clear session".to_string(),
        )
    })?;
    Ok(StatusCode::OK)
}

/// GET /auth/session - The active session profile, if any.
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "The active profile, or null"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state.store.session().await.map_err(|e| {
        error!("Failed to load session: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load session".to_string(),
        )
    })?;
    Ok(Json(session))
}
