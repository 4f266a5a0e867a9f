//! Cart, wishlist, coupon and order endpoints
//!
//! Public:
//! - GET /api/coupons/{code} - Check a coupon
//!
//! Signed in:
//! - GET/POST /api/cart, DELETE /api/cart/{course_id}
//! - GET/POST /api/wishlist, DELETE /api/wishlist/{course_id}
//! - POST /api/checkout - Turn the cart into a pending order
//! - POST /api/orders/{id}/complete - Pay and enroll
//! - GET /api/orders
//!
//! Admin:
//! - POST /api/admin/coupons

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::non_empty;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CartView, Coupon, CreateCouponInput, Order, WishlistItem};
use crate::services::{CouponQuote, WishlistState};

#[derive(Debug, Deserialize)]
pub struct CourseRef {
    pub course_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub coupon_code: Option<String>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/coupons/{code}", get(check_coupon))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).post(add_to_cart))
        .route("/cart/{course_id}", delete(remove_from_cart))
        .route("/wishlist", get(get_wishlist).post(toggle_wishlist))
        .route("/wishlist/{course_id}", delete(remove_from_wishlist))
        .route("/checkout", post(checkout))
        .route("/orders", get(list_orders))
        .route("/orders/{id}/complete", post(complete_order))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/admin/coupons", post(create_coupon))
}

async fn get_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.commerce_service.cart(&user).await?))
}

async fn add_to_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CourseRef>,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(
        state
            .commerce_service
            .add_to_cart(&user, body.course_id)
            .await?,
    ))
}

async fn remove_from_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(course_id): Path<i64>,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(
        state
            .commerce_service
            .remove_from_cart(&user, course_id)
            .await?,
    ))
}

async fn get_wishlist(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<WishlistItem>>, ApiError> {
    Ok(Json(state.commerce_service.wishlist(&user).await?))
}

/// POST /api/wishlist - add when absent, remove when present
async fn toggle_wishlist(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CourseRef>,
) -> Result<Json<WishlistState>, ApiError> {
    Ok(Json(
        state
            .commerce_service
            .toggle_wishlist(&user, body.course_id)
            .await?,
    ))
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(course_id): Path<i64>,
) -> Result<Json<WishlistState>, ApiError> {
    Ok(Json(
        state
            .commerce_service
            .remove_from_wishlist(&user, course_id)
            .await?,
    ))
}

/// GET /api/coupons/{code}
async fn check_coupon(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<CouponQuote>, ApiError> {
    Ok(Json(state.commerce_service.validate_coupon(&code).await?))
}

/// POST /api/checkout
async fn checkout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    body: Bytes,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    // An empty body means no coupon
    let request: CheckoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CheckoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::validation_error(e.to_string()))?
    };
    let coupon = non_empty(request.coupon_code);
    let order = state
        .commerce_service
        .checkout(&user, coupon.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// POST /api/orders/{id}/complete
async fn complete_order(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.commerce_service.complete_order(&user, id).await?))
}

async fn list_orders(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.commerce_service.orders(&user).await?))
}

/// POST /api/admin/coupons
async fn create_coupon(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCouponInput>,
) -> Result<(StatusCode, Json<Coupon>), ApiError> {
    let coupon = state.commerce_service.create_coupon(&user, body).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}
