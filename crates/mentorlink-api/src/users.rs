use axum::{Extension, Json, extract::State, response::IntoResponse};

use mentorlink_db::UserRepository;
use mentorlink_types::api::UserSummary;
use mentorlink_types::models::Session;

use crate::error::ApiError;
use crate::service::user_summary;
use crate::state::AppState;

/// GET /users: everyone the caller could message, sorted by name.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = session.user_id;
    let users = state.store.call(move |db| db.users_except(caller)).await?;

    let users: Vec<UserSummary> = users.into_iter().map(user_summary).collect();
    Ok(Json(users))
}
