use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use mentorlink_types::api::{SendMessageRequest, StartThreadRequest};
use mentorlink_types::models::Session;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /threads
pub async fn list_threads(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.messaging.list_threads(&session).await?))
}

/// POST /threads: first message to a user, or the next one in their existing thread.
pub async fn start_thread(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<StartThreadRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .messaging
        .start_or_continue_thread(&session, req.recipient_id, &req.message)
        .await?;
    Ok(Json(created))
}

/// GET /threads/{thread_id}
pub async fn get_transcript(
    State(state): State<AppState>,
    WithRejection(Path(thread_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.messaging.get_transcript(&session, thread_id).await?))
}

/// POST /threads/{thread_id}
pub async fn send_message(
    State(state): State<AppState>,
    WithRejection(Path(thread_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .messaging
        .send_message(&session, thread_id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
