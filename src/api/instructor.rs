//! Instructor dashboard endpoints
//!
//! - GET /api/instructor/courses - Own courses, any status, with counts
//! - GET /api/instructor/stats - Totals, revenue and top courses

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{InstructorCourse, InstructorStats};

/// Routes behind `require_instructor`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/instructor/courses", get(my_courses))
        .route("/instructor/stats", get(my_stats))
}

async fn my_courses(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<InstructorCourse>>, ApiError> {
    Ok(Json(state.course_service.instructor_courses(&user).await?))
}

async fn my_stats(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<InstructorStats>, ApiError> {
    Ok(Json(state.course_service.instructor_stats(&user).await?))
}
