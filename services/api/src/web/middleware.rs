//! services/api/src/web/middleware.rs
//!
//! Session middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;
use drona_core::ports::RecordStore;

/// Middleware that loads the current session profile and makes it available
/// to handlers.
///
/// If a session exists, inserts the `Profile` into request extensions.
/// If none is active, returns 401 Unauthorized.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let profile = state
        .store
        .session()
        .await
        .map_err(|e| {
            error!("Failed to load session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(profile);

    Ok(next.run(req).await)
}
