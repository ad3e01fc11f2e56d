use axum::{
    Json, Router,
    middleware,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::state::AppState;
use crate::{auth, leaderboard, mentor, threads, users};
use crate::middleware::require_auth;

/// All HTTP routes. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/threads", get(threads::list_threads).post(threads::start_thread))
        .route(
            "/threads/{thread_id}",
            get(threads::get_transcript).post(threads::send_message),
        )
        .route("/users", get(users::list_users))
        .route("/leaderboard", get(leaderboard::get_leaderboard))
        .route("/mentor/students", get(mentor::list_students))
        .route("/mentor/unmentored-students", get(mentor::list_unmentored_students))
        .route("/mentor/assign-student/{student_id}", post(mentor::assign_student))
        .route("/mentor/students/{student_id}/points", post(mentor::award_points))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
