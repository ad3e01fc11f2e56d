use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use mentorlink_db::UserRepository;
use mentorlink_types::api::{LeaderboardEntry, LeaderboardQuery};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /leaderboard?filter=total|academic|athletic
pub async fn get_leaderboard(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<LeaderboardQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.filter;
    let students = state.store.call(move |db| db.leaderboard(filter)).await?;

    let entries: Vec<LeaderboardEntry> = students
        .into_iter()
        .enumerate()
        .map(|(i, user)| LeaderboardEntry {
            rank: i + 1,
            total_points: user.total_points(),
            id: user.id,
            name: user.name,
            school: user.school,
            academic_points: user.academic_points,
            athletic_points: user.athletic_points,
        })
        .collect();

    Ok(Json(entries))
}
