use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use mentorlink_db::UserRepository;
use mentorlink_db::models::{PointsAward, UserRow};
use mentorlink_types::api::{AwardPointsRequest, StudentSummary};
use mentorlink_types::models::Session;

use crate::error::ApiError;
use crate::state::AppState;

/// Largest award per category in a single request.
pub const MAX_AWARD: i64 = 1_000_000;

fn require_mentor(session: &Session) -> Result<(), ApiError> {
    if session.is_mentor() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Mentor access only"))
    }
}

fn student_summary(user: UserRow) -> StudentSummary {
    StudentSummary {
        total_points: user.total_points(),
        id: user.id,
        name: user.name,
        grade: user.grade,
    }
}

/// GET /mentor/students
pub async fn list_students(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    require_mentor(&session)?;
    let students = state.store.call(|db| db.students(false)).await?;
    Ok(Json(students.into_iter().map(student_summary).collect::<Vec<_>>()))
}

/// GET /mentor/unmentored-students
pub async fn list_unmentored_students(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    require_mentor(&session)?;
    let students = state.store.call(|db| db.students(true)).await?;
    Ok(Json(students.into_iter().map(student_summary).collect::<Vec<_>>()))
}

/// POST /mentor/assign-student/{student_id}: the caller becomes the student's mentor.
pub async fn assign_student(
    State(state): State<AppState>,
    WithRejection(Path(student_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    require_mentor(&session)?;
    let mentor_id = session.user_id;

    let student = state
        .store
        .call(move |db| db.assign_mentor(student_id, mentor_id))
        .await?
        .ok_or(ApiError::NotFound("Student"))?;

    info!("Mentor {} assigned to student {}", mentor_id, student_id);
    Ok(Json(student_summary(student)))
}

/// POST /mentor/students/{student_id}/points
pub async fn award_points(
    State(state): State<AppState>,
    WithRejection(Path(student_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<AwardPointsRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    require_mentor(&session)?;
    if req.academic < 0 || req.athletic < 0 {
        return Err(ApiError::validation("Points must not be negative"));
    }
    if req.academic > MAX_AWARD || req.athletic > MAX_AWARD {
        return Err(ApiError::Validation(format!(
            "At most {} points can be awarded at once",
            MAX_AWARD
        )));
    }
    if req.academic == 0 && req.athletic == 0 {
        return Err(ApiError::validation("Nothing to award"));
    }

    let (academic, athletic) = (req.academic, req.athletic);
    let award = state
        .store
        .call(move |db| db.award_points(student_id, academic, athletic))
        .await?
        .ok_or(ApiError::NotFound("Student"))?;
    let student = match award {
        PointsAward::Awarded(student) => student,
        PointsAward::OutOfRange => {
            return Err(ApiError::validation("Student has reached the point limit"));
        }
    };

    info!(
        "Mentor {} awarded {} academic / {} athletic points to {}",
        session.user_id, academic, athletic, student_id
    );
    Ok(Json(student_summary(student)))
}
