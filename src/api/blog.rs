//! Blog endpoints
//!
//! Public:
//! - GET /api/blog - Published posts (sort, category, paging)
//! - GET /api/blog/search?q= - Title and body search
//! - GET /api/blog/trending?limit=&days= - Most engaging recent posts
//! - GET /api/blog/{id}, GET /api/blog/by-slug/{slug}
//! - POST /api/blog/{id}/view - Count a view
//! - GET /api/blog/{id}/comments
//!
//! Signed in:
//! - POST /api/blog, PUT/DELETE /api/blog/{id}
//! - POST /api/blog/{id}/like - Toggle like
//! - POST /api/blog/{id}/comments, DELETE /api/blog/comments/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_page_size, non_empty};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::models::{
    Blog, BlogCommentView, BlogDetail, BlogSort, BlogSummary, CreateBlogInput, LikeState,
    ListParams, PagedResult, UpdateBlogInput,
};

#[derive(Debug, Deserialize)]
pub struct BlogListQuery {
    pub sort: Option<String>,
    pub category: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<i64>,
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/blog", get(list_posts))
        .route("/blog/search", get(search_posts))
        .route("/blog/trending", get(trending_posts))
        .route("/blog/{id}", get(get_post))
        .route("/blog/by-slug/{slug}", get(get_post_by_slug))
        .route("/blog/{id}/view", post(record_view))
        .route("/blog/{id}/comments", get(list_comments))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/blog", post(create_post))
        .route("/blog/{id}", put(update_post).delete(delete_post))
        .route("/blog/{id}/like", post(toggle_like))
        .route("/blog/{id}/comments", post(add_comment))
        .route("/blog/comments/{id}", delete(delete_comment))
}

/// GET /api/blog
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<BlogListQuery>,
) -> Result<Json<PagedResult<BlogSummary>>, ApiError> {
    let sort = match non_empty(query.sort) {
        Some(s) => s
            .parse::<BlogSort>()
            .map_err(|e| ApiError::validation_error(e.to_string()))?,
        None => BlogSort::default(),
    };
    let category = non_empty(query.category);
    let params = ListParams::new(query.page, query.page_size);

    Ok(Json(
        state
            .blog_service
            .list(sort, category.as_deref(), &params)
            .await?,
    ))
}

/// GET /api/blog/search
async fn search_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<BlogSummary>>, ApiError> {
    Ok(Json(state.blog_service.search(&query.q).await?))
}

/// GET /api/blog/trending
async fn trending_posts(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> Result<Json<Vec<BlogSummary>>, ApiError> {
    Ok(Json(
        state
            .blog_service
            .trending(query.limit, query.days)
            .await?,
    ))
}

async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<BlogDetail>, ApiError> {
    Ok(Json(state.blog_service.get(id, viewer.user()).await?))
}

async fn get_post_by_slug(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
) -> Result<Json<BlogDetail>, ApiError> {
    Ok(Json(
        state.blog_service.get_by_slug(&slug, viewer.user()).await?,
    ))
}

/// POST /api/blog/{id}/view
async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.blog_service.record_view(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_comments(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<BlogCommentView>>, ApiError> {
    Ok(Json(state.blog_service.comments(id, viewer.user()).await?))
}

/// POST /api/blog
async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateBlogInput>,
) -> Result<(StatusCode, Json<Blog>), ApiError> {
    let blog = state.blog_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(blog)))
}

/// PUT /api/blog/{id}
async fn update_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBlogInput>,
) -> Result<Json<Blog>, ApiError> {
    Ok(Json(state.blog_service.update(&user, id, body).await?))
}

/// DELETE /api/blog/{id}
async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.blog_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/blog/{id}/like
async fn toggle_like(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LikeState>, ApiError> {
    Ok(Json(state.blog_service.toggle_like(&user, id).await?))
}

/// POST /api/blog/{id}/comments
async fn add_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<BlogCommentView>), ApiError> {
    let comment = state
        .blog_service
        .add_comment(&user, id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /api/blog/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.blog_service.delete_comment(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
