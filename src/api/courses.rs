//! Course catalogue and authoring endpoints
//!
//! Public:
//! - GET /api/courses - Published courses (search, category, level, paging)
//! - GET /api/courses/{id} - Course detail with outline
//!
//! Signed in:
//! - GET /api/courses/{id}/lessons/{lesson_id} - Lesson content
//! - POST /api/courses/{id}/enroll - Enroll in a free course
//!
//! Instructor:
//! - POST /api/courses, PUT/DELETE /api/courses/{id}
//! - POST /api/courses/{id}/publish, POST /api/courses/{id}/unpublish
//! - POST /api/courses/{id}/modules, POST /api/modules/{id}/lessons

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::str::FromStr;

use crate::api::common::{default_page, default_page_size, non_empty};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::models::{
    Course, CourseDetail, CourseFilter, CourseLevel, CourseModule, CourseSummary,
    CreateCourseInput, CreateLessonInput, CreateModuleInput, Lesson, ListParams, PagedResult,
    UpdateCourseInput,
};
use crate::services::EnrollResult;

#[derive(Debug, Deserialize)]
pub struct CourseListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl CourseListQuery {
    fn filter(&self) -> Result<CourseFilter, ApiError> {
        let level = non_empty(self.level.clone())
            .map(|l| CourseLevel::from_str(&l))
            .transpose()
            .map_err(|e| ApiError::validation_error(e.to_string()))?;
        Ok(CourseFilter {
            search: non_empty(self.search.clone()),
            category: non_empty(self.category.clone()),
            level,
        })
    }
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses/{id}", get(get_course))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/courses/{id}/lessons/{lesson_id}", get(get_lesson))
        .route("/courses/{id}/enroll", post(enroll))
}

pub fn instructor_router() -> Router<AppState> {
    Router::new()
        .route("/courses", post(create_course))
        .route("/courses/{id}", put(update_course).delete(delete_course))
        .route("/courses/{id}/publish", post(publish_course))
        .route("/courses/{id}/unpublish", post(unpublish_course))
        .route("/courses/{id}/modules", post(add_module))
        .route("/modules/{id}/lessons", post(add_lesson))
}

/// GET /api/courses
async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseListQuery>,
) -> Result<Json<PagedResult<CourseSummary>>, ApiError> {
    let filter = query.filter()?;
    let params = ListParams::new(query.page, query.page_size);
    Ok(Json(state.course_service.list(&filter, &params).await?))
}

/// GET /api/courses/{id}
async fn get_course(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<CourseDetail>, ApiError> {
    Ok(Json(state.course_service.detail(id, viewer.user()).await?))
}

/// GET /api/courses/{id}/lessons/{lesson_id}
async fn get_lesson(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, lesson_id)): Path<(i64, i64)>,
) -> Result<Json<Lesson>, ApiError> {
    Ok(Json(state.course_service.lesson(id, lesson_id, &user).await?))
}

/// POST /api/courses/{id}/enroll
async fn enroll(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let result: EnrollResult = state.enrollment_service.enroll_free(&user, id).await?;
    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)))
}

/// POST /api/courses
async fn create_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCourseInput>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    let course = state.course_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// PUT /api/courses/{id}
async fn update_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCourseInput>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(state.course_service.update(&user, id, body).await?))
}

/// DELETE /api/courses/{id}
async fn delete_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/courses/{id}/publish
async fn publish_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(
        state.course_service.set_published(&user, id, true).await?,
    ))
}

/// POST /api/courses/{id}/unpublish
async fn unpublish_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(
        state.course_service.set_published(&user, id, false).await?,
    ))
}

/// POST /api/courses/{id}/modules
async fn add_module(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CreateModuleInput>,
) -> Result<(StatusCode, Json<CourseModule>), ApiError> {
    let module = state.course_service.add_module(&user, id, body).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

/// POST /api/modules/{id}/lessons
async fn add_lesson(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CreateLessonInput>,
) -> Result<(StatusCode, Json<Lesson>), ApiError> {
    let lesson = state.course_service.add_lesson(&user, id, body).await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}
