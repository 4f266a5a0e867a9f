//! Authentication and account endpoints
//!
//! - POST /api/auth/register - Local registration
//! - POST /api/auth/login - Password login
//! - POST /api/auth/logout - End the current session
//! - GET /api/user - Current user with profiles
//! - PUT /api/user/role - Switch between student and instructor
//! - PUT /api/admin/users/{id}/role - Set any role (admin)

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::models::{User, UserRole};
use crate::services::user::{LoginInput, RegisterInput, UserAccount};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

/// Routes that work without a session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/user", get(current_user))
        .route("/user/role", put(assign_own_role))
}

/// Routes behind `require_admin`
pub fn admin_router() -> Router<AppState> {
    Router::new().route("/admin/users/{id}/role", put(set_user_role))
}

fn session_cookie(token: &str, max_age_secs: i64) -> Result<HeaderValue, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, max_age_secs
    );
    HeaderValue::from_str(&cookie).map_err(ApiError::internal)
}

async fn start_session(
    state: &AppState,
    email: String,
    password: String,
) -> Result<(HeaderMap, AuthResponse), ApiError> {
    let session = state
        .user_service
        .login(LoginInput { email, password })
        .await?;
    let user = state
        .user_service
        .get_by_id(session.user_id)
        .await?
        .ok_or_else(|| ApiError::internal("Session user vanished"))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&session.id, state.session_days * 24 * 60 * 60)?,
    );
    Ok((
        headers,
        AuthResponse {
            user,
            token: session.id,
        },
    ))
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let password = body.password.clone();
    let user = state.user_service.register(body).await?;

    let (headers, response) = start_session(&state, user.email, password).await?;
    Ok((StatusCode::CREATED, headers, Json(response)))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (headers, response) = start_session(&state, body.email, body.password).await?;
    Ok((headers, Json(response)))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.user_service.logout(&token).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/user
async fn current_user(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UserAccount>, ApiError> {
    Ok(Json(state.user_service.account(user).await?))
}

/// PUT /api/user/role
async fn assign_own_role(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<RoleRequest>,
) -> Result<Json<UserAccount>, ApiError> {
    let updated = state.user_service.assign_own_role(&user, body.role).await?;
    Ok(Json(state.user_service.account(updated).await?))
}

/// PUT /api/admin/users/{id}/role
async fn set_user_role(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(
        state.user_service.set_role(&admin, id, body.role).await?,
    ))
}
