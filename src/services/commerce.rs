//! Commerce service
//!
//! Cart, wishlist, coupons and orders. Checkout snapshots the cart into a
//! pending order; completing the order enrolls the buyer. Payment capture
//! happens outside this service.

use crate::cache::Cache;
use crate::db::repositories::{
    CartRepository, CourseRepository, EnrollmentRepository, OrderRepository,
};
use crate::models::{
    discount_for, CartView, Coupon, CreateCouponInput, NewOrder, Order,
    OrderCompletion, OrderItem, User, WishlistItem,
};
use crate::services::course::invalidate_catalogue;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CommerceServiceError {
    #[error("Course not found")]
    CourseNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Coupon not found")]
    CouponNotFound,

    #[error("Already enrolled in this course")]
    AlreadyEnrolled,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Wishlist membership after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WishlistState {
    pub course_id: i64,
    pub wishlisted: bool,
}

/// A valid coupon as shown to a buyer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponQuote {
    pub code: String,
    pub discount_percent: i64,
}

pub struct CommerceService {
    carts: Arc<dyn CartRepository>,
    orders: Arc<dyn OrderRepository>,
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    cache: Arc<Cache>,
}

impl CommerceService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        orders: Arc<dyn OrderRepository>,
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            carts,
            orders,
            courses,
            enrollments,
            cache,
        }
    }

    pub async fn cart(&self, user: &User) -> Result<CartView, CommerceServiceError> {
        Ok(CartView::new(self.carts.cart_items(user.id).await?))
    }

    /// Put a published course in the cart. Adding it twice is a no-op.
    pub async fn add_to_cart(
        &self,
        user: &User,
        course_id: i64,
    ) -> Result<CartView, CommerceServiceError> {
        self.published_course(course_id).await?;
        if self.enrollments.is_enrolled(user.id, course_id).await? {
            return Err(CommerceServiceError::AlreadyEnrolled);
        }
        self.carts.add_to_cart(user.id, course_id).await?;
        self.cart(user).await
    }

    pub async fn remove_from_cart(
        &self,
        user: &User,
        course_id: i64,
    ) -> Result<CartView, CommerceServiceError> {
        self.carts.remove_from_cart(user.id, course_id).await?;
        self.cart(user).await
    }

    pub async fn wishlist(&self, user: &User) -> Result<Vec<WishlistItem>, CommerceServiceError> {
        Ok(self.carts.wishlist_items(user.id).await?)
    }

    /// Add the course if absent, remove it if present
    pub async fn toggle_wishlist(
        &self,
        user: &User,
        course_id: i64,
    ) -> Result<WishlistState, CommerceServiceError> {
        let wishlisted = if self.carts.is_wishlisted(user.id, course_id).await? {
            self.carts.remove_from_wishlist(user.id, course_id).await?;
            false
        } else {
            self.published_course(course_id).await?;
            self.carts.add_to_wishlist(user.id, course_id).await?;
            true
        };
        Ok(WishlistState {
            course_id,
            wishlisted,
        })
    }

    pub async fn remove_from_wishlist(
        &self,
        user: &User,
        course_id: i64,
    ) -> Result<WishlistState, CommerceServiceError> {
        self.carts.remove_from_wishlist(user.id, course_id).await?;
        Ok(WishlistState {
            course_id,
            wishlisted: false,
        })
    }

    /// Look up a coupon and check it can be redeemed now
    pub async fn validate_coupon(&self, code: &str) -> Result<CouponQuote, CommerceServiceError> {
        let coupon = self.redeemable_coupon(code).await?;
        Ok(CouponQuote {
            code: coupon.code,
            discount_percent: coupon.discount_percent,
        })
    }

    pub async fn create_coupon(
        &self,
        user: &User,
        input: CreateCouponInput,
    ) -> Result<Coupon, CommerceServiceError> {
        if !user.is_admin() {
            return Err(CommerceServiceError::Forbidden(
                "Only admins can create coupons".to_string(),
            ));
        }

        let code = normalize_code(&input.code);
        if code.is_empty() || code.chars().any(char::is_whitespace) {
            return Err(CommerceServiceError::ValidationError(
                "Coupon code must be a single non-empty word".to_string(),
            ));
        }
        if !(1..=100).contains(&input.discount_percent) {
            return Err(CommerceServiceError::ValidationError(
                "Discount must be between 1 and 100 percent".to_string(),
            ));
        }
        if matches!(input.max_uses, Some(max) if max < 1) {
            return Err(CommerceServiceError::ValidationError(
                "Max uses must be at least 1".to_string(),
            ));
        }
        if self.orders.get_coupon_by_code(&code).await?.is_some() {
            return Err(CommerceServiceError::Conflict(format!(
                "Coupon '{}' already exists",
                code
            )));
        }

        let coupon = self
            .orders
            .create_coupon(&CreateCouponInput { code, ..input })
            .await?;
        tracing::info!(code = %coupon.code, percent = coupon.discount_percent, "coupon created");
        Ok(coupon)
    }

    /// Turn the cart into a pending order and empty the cart
    pub async fn checkout(
        &self,
        user: &User,
        coupon_code: Option<&str>,
    ) -> Result<Order, CommerceServiceError> {
        let cart = self.cart(user).await?;
        if cart.items.is_empty() {
            return Err(CommerceServiceError::EmptyCart);
        }

        for item in &cart.items {
            if self.enrollments.is_enrolled(user.id, item.course.id).await? {
                return Err(CommerceServiceError::AlreadyEnrolled);
            }
        }

        let coupon = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(self.redeemable_coupon(code).await?),
            None => None,
        };

        let subtotal_cents = cart.subtotal_cents;
        let discount_cents = coupon
            .as_ref()
            .map(|c| discount_for(subtotal_cents, c.discount_percent))
            .unwrap_or(0);

        let order = self
            .orders
            .create_order(&NewOrder {
                user_id: user.id,
                subtotal_cents,
                discount_cents,
                total_cents: subtotal_cents - discount_cents,
                coupon_code: coupon.map(|c| c.code),
                items: cart
                    .items
                    .into_iter()
                    .map(|item| OrderItem {
                        course_id: item.course.id,
                        title: item.course.title,
                        price_cents: item.course.price_cents,
                    })
                    .collect(),
            })
            .await?;

        tracing::info!(order_id = order.id, user_id = user.id, total = order.total_cents, "order created");
        Ok(order)
    }

    /// Mark the caller's pending order completed and enroll them
    pub async fn complete_order(&self, user: &User, id: i64) -> Result<Order, CommerceServiceError> {
        let order = self
            .orders
            .get_order(id)
            .await?
            .filter(|o| o.user_id == user.id)
            .ok_or(CommerceServiceError::OrderNotFound)?;

        match self.orders.complete_order(order.id).await? {
            OrderCompletion::Completed => {}
            OrderCompletion::NotPending => {
                return Err(CommerceServiceError::Conflict(
                    "Order is already completed".to_string(),
                ))
            }
            OrderCompletion::AlreadyOwned => return Err(CommerceServiceError::AlreadyEnrolled),
            OrderCompletion::CouponUnavailable => {
                return Err(CommerceServiceError::InvalidCoupon(
                    "coupon can no longer be redeemed".to_string(),
                ))
            }
        }
        tracing::info!(order_id = id, user_id = user.id, "order completed");
        invalidate_catalogue(&self.cache).await;

        self.orders
            .get_order(id)
            .await?
            .ok_or(CommerceServiceError::OrderNotFound)
    }

    pub async fn orders(&self, user: &User) -> Result<Vec<Order>, CommerceServiceError> {
        Ok(self.orders.list_orders(user.id).await?)
    }

    async fn published_course(&self, course_id: i64) -> Result<(), CommerceServiceError> {
        self.courses
            .get_by_id(course_id)
            .await?
            .filter(|c| c.is_published())
            .map(|_| ())
            .ok_or(CommerceServiceError::CourseNotFound)
    }

    async fn redeemable_coupon(&self, code: &str) -> Result<Coupon, CommerceServiceError> {
        let code = normalize_code(code);
        let coupon = self
            .orders
            .get_coupon_by_code(&code)
            .await?
            .ok_or(CommerceServiceError::CouponNotFound)?;
        coupon
            .check(Utc::now())
            .map_err(|reason| CommerceServiceError::InvalidCoupon(reason.to_string()))?;
        Ok(coupon)
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCartRepository, SqlxCourseRepository, SqlxEnrollmentRepository, SqlxOrderRepository};
    use crate::models::{OrderStatus, UserRole};
    use crate::services::course::tests::{published_course, setup, user_with_role, Fixture};
    use chrono::Duration;

    fn service_for(f: &Fixture) -> CommerceService {
        CommerceService::new(
            SqlxCartRepository::boxed(f.pool.clone()),
            SqlxOrderRepository::boxed(f.pool.clone()),
            SqlxCourseRepository::boxed(f.pool.clone()),
            SqlxEnrollmentRepository::boxed(f.pool.clone()),
            f.cache.clone(),
        )
    }

    fn coupon(code: &str, percent: i64) -> CreateCouponInput {
        CreateCouponInput {
            code: code.to_string(),
            discount_percent: percent,
            max_uses: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_checkout_with_coupon_and_complete() {
        let f = setup().await;
        let service = service_for(&f);
        let admin = user_with_role(&f.pool, "admin@example.com", UserRole::Admin).await;
        let buyer = user_with_role(&f.pool, "buyer@example.com", UserRole::Student).await;
        let a = published_course(&f, "Course A", 1999).await;
        let b = published_course(&f, "Course B", 1000).await;

        service.create_coupon(&admin, coupon("save15", 15)).await.unwrap();
        let quote = service.validate_coupon("Save15").await.unwrap();
        assert_eq!(quote.code, "SAVE15");

        service.add_to_cart(&buyer, a.id).await.unwrap();
        service.add_to_cart(&buyer, a.id).await.unwrap();
        let cart = service.add_to_cart(&buyer, b.id).await.unwrap();
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.subtotal_cents, 2999);

        let order = service.checkout(&buyer, Some("save15")).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(service.cart(&buyer).await.unwrap().items.is_empty());
        assert!(matches!(
            service.checkout(&buyer, None).await,
            Err(CommerceServiceError::EmptyCart)
        ));
        assert_eq!(order.discount_cents, 449);
        assert_eq!(order.total_cents, 2550);

        let done = service.complete_order(&buyer, order.id).await.unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
        assert!(service.cart(&buyer).await.unwrap().items.is_empty());
        assert!(matches!(
            service.complete_order(&buyer, order.id).await,
            Err(CommerceServiceError::Conflict(_))
        ));
        assert!(matches!(
            service.add_to_cart(&buyer, a.id).await,
            Err(CommerceServiceError::AlreadyEnrolled)
        ));
        assert_eq!(service.orders(&buyer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_rejections() {
        let f = setup().await;
        let service = service_for(&f);
        let admin = user_with_role(&f.pool, "admin@example.com", UserRole::Admin).await;
        let buyer = user_with_role(&f.pool, "buyer@example.com", UserRole::Student).await;

        assert!(matches!(
            service.checkout(&buyer, None).await,
            Err(CommerceServiceError::EmptyCart)
        ));

        let course = published_course(&f, "Course", 500).await;
        service.add_to_cart(&buyer, course.id).await.unwrap();
        assert!(matches!(
            service.checkout(&buyer, Some("NOPE")).await,
            Err(CommerceServiceError::CouponNotFound)
        ));

        let mut expired = coupon("OLD", 10);
        expired.expires_at = Some(Utc::now() - Duration::days(1));
        service.create_coupon(&admin, expired).await.unwrap();
        assert!(matches!(
            service.checkout(&buyer, Some("old")).await,
            Err(CommerceServiceError::InvalidCoupon(_))
        ));
    }

    #[tokio::test]
    async fn test_exhausted_coupon_blocks_second_completion() {
        let f = setup().await;
        let service = service_for(&f);
        let admin = user_with_role(&f.pool, "admin@example.com", UserRole::Admin).await;
        let first = user_with_role(&f.pool, "first@example.com", UserRole::Student).await;
        let second = user_with_role(&f.pool, "second@example.com", UserRole::Student).await;
        let course = published_course(&f, "Course", 1000).await;

        let mut once = coupon("ONCE", 50);
        once.max_uses = Some(1);
        service.create_coupon(&admin, once).await.unwrap();

        service.add_to_cart(&first, course.id).await.unwrap();
        service.add_to_cart(&second, course.id).await.unwrap();
        let a = service.checkout(&first, Some("ONCE")).await.unwrap();
        let b = service.checkout(&second, Some("ONCE")).await.unwrap();
        assert_eq!(b.discount_cents, 500);

        service.complete_order(&first, a.id).await.unwrap();
        assert!(matches!(
            service.complete_order(&second, b.id).await,
            Err(CommerceServiceError::InvalidCoupon(_))
        ));
        assert!(matches!(
            service.validate_coupon("ONCE").await,
            Err(CommerceServiceError::InvalidCoupon(_))
        ));
    }

    #[tokio::test]
    async fn test_owned_course_cannot_be_bought_twice() {
        let f = setup().await;
        let service = service_for(&f);
        let buyer = user_with_role(&f.pool, "buyer@example.com", UserRole::Student).await;
        let course = published_course(&f, "Course", 1000).await;

        service.add_to_cart(&buyer, course.id).await.unwrap();
        let first = service.checkout(&buyer, None).await.unwrap();
        service.add_to_cart(&buyer, course.id).await.unwrap();
        let second = service.checkout(&buyer, None).await.unwrap();

        service.complete_order(&buyer, first.id).await.unwrap();
        assert!(matches!(
            service.complete_order(&buyer, second.id).await,
            Err(CommerceServiceError::AlreadyEnrolled)
        ));
        let orders = service.orders(&buyer).await.unwrap();
        let second = orders.iter().find(|o| o.id == second.id).unwrap();
        assert_eq!(second.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_only_owner_completes_order() {
        let f = setup().await;
        let service = service_for(&f);
        let buyer = user_with_role(&f.pool, "buyer@example.com", UserRole::Student).await;
        let other = user_with_role(&f.pool, "other@example.com", UserRole::Student).await;
        let course = published_course(&f, "Course", 500).await;

        service.add_to_cart(&buyer, course.id).await.unwrap();
        let order = service.checkout(&buyer, None).await.unwrap();
        assert!(matches!(
            service.complete_order(&other, order.id).await,
            Err(CommerceServiceError::OrderNotFound)
        ));
    }

    #[tokio::test]
    async fn test_coupon_creation_rules() {
        let f = setup().await;
        let service = service_for(&f);
        let admin = user_with_role(&f.pool, "admin@example.com", UserRole::Admin).await;

        assert!(matches!(
            service.create_coupon(&f.instructor, coupon("X", 10)).await,
            Err(CommerceServiceError::Forbidden(_))
        ));
        for percent in [0, 101] {
            assert!(matches!(
                service.create_coupon(&admin, coupon("RANGE", percent)).await,
                Err(CommerceServiceError::ValidationError(_))
            ));
        }
        service.create_coupon(&admin, coupon("dup", 10)).await.unwrap();
        assert!(matches!(
            service.create_coupon(&admin, coupon("DUP", 20)).await,
            Err(CommerceServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_wishlist_toggle() {
        let f = setup().await;
        let service = service_for(&f);
        let user = user_with_role(&f.pool, "u@example.com", UserRole::Student).await;
        let course = published_course(&f, "Wish", 100).await;

        let on = service.toggle_wishlist(&user, course.id).await.unwrap();
        assert!(on.wishlisted);
        assert_eq!(service.wishlist(&user).await.unwrap().len(), 1);

        let off = service.toggle_wishlist(&user, course.id).await.unwrap();
        assert!(!off.wishlisted);
        assert!(service.wishlist(&user).await.unwrap().is_empty());

        assert!(matches!(
            service.toggle_wishlist(&user, 9999).await,
            Err(CommerceServiceError::CourseNotFound)
        ));
    }
}
