//! Cart, wishlist, order and coupon models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::CourseSummary;

/// Course sitting in a user's cart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub course: CourseSummary,
    pub added_at: DateTime<Utc>,
}

/// Cart contents with the running subtotal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub subtotal_cents: i64,
}

impl CartView {
    pub fn new(items: Vec<CartItem>) -> Self {
        let subtotal_cents = items.iter().map(|i| i.course.price_cents).sum();
        Self {
            items,
            subtotal_cents,
        }
    }
}

/// Course saved for later
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishlistItem {
    pub course: CourseSummary,
    pub added_at: DateTime<Utc>,
}

/// Order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(anyhow::anyhow!("Invalid order status: {}", s)),
        }
    }
}

/// One purchased course line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub course_id: i64,
    pub title: String,
    pub price_cents: i64,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub coupon_code: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Order about to be written
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub coupon_code: Option<String>,
    pub items: Vec<OrderItem>,
}

/// Result of completing a pending order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCompletion {
    Completed,
    /// The order was not pending
    NotPending,
    /// The buyer already owns one of the purchased courses
    AlreadyOwned,
    /// The order's coupon can no longer be redeemed
    CouponUnavailable,
}

/// Discount coupon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub discount_percent: i64,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Why a coupon cannot be redeemed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponRejection {
    Inactive,
    Expired,
    Exhausted,
}

impl fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "coupon is not active"),
            Self::Expired => write!(f, "coupon has expired"),
            Self::Exhausted => write!(f, "coupon has no uses left"),
        }
    }
}

impl Coupon {
    /// Check that the coupon can be redeemed at `now`
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !self.active {
            return Err(CouponRejection::Inactive);
        }
        if matches!(self.expires_at, Some(at) if at <= now) {
            return Err(CouponRejection::Expired);
        }
        if matches!(self.max_uses, Some(max) if self.used_count >= max) {
            return Err(CouponRejection::Exhausted);
        }
        Ok(())
    }
}

/// Input for creating a coupon
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCouponInput {
    pub code: String,
    pub discount_percent: i64,
    #[serde(default)]
    pub max_uses: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Discount for `subtotal_cents` at `percent`, rounded down to the cent
pub fn discount_for(subtotal_cents: i64, percent: i64) -> i64 {
    let percent = percent.clamp(0, 100);
    subtotal_cents.max(0) * percent / 100
}
