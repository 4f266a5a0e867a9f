//! Order and coupon repository

use super::enrollment::{ENROLL_MYSQL, ENROLL_SQLITE};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    Coupon, CreateCouponInput, NewOrder, Order, OrderCompletion, OrderItem, OrderStatus,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Write a pending order with its items and take them out of the cart
    async fn create_order(&self, order: &NewOrder) -> Result<Order>;

    async fn get_order(&self, id: i64) -> Result<Option<Order>>;

    /// Orders of a user, newest first
    async fn list_orders(&self, user_id: i64) -> Result<Vec<Order>>;

    /// Complete a pending order in one transaction: enroll the buyer in every
    /// purchased course, clear those courses from cart and wishlist and count
    /// the coupon use. Nothing is written unless the outcome is `Completed`.
    async fn complete_order(&self, id: i64) -> Result<OrderCompletion>;

    async fn create_coupon(&self, input: &CreateCouponInput) -> Result<Coupon>;

    async fn get_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>>;
}

pub struct SqlxOrderRepository {
    pool: DynDatabasePool,
}

impl SqlxOrderRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn OrderRepository> {
        Arc::new(Self::new(pool))
    }
}

const ORDER_COLUMNS: &str = "id, user_id, status, subtotal_cents, discount_cents, total_cents, \
     coupon_code, created_at, completed_at";

const COUPON_COLUMNS: &str =
    "id, code, discount_percent, max_uses, used_count, expires_at, active, created_at";

/// Count one use only while the coupon is still redeemable
const REDEEM_COUPON: &str = "UPDATE coupons SET used_count = used_count + 1 \
     WHERE code = ? AND active = 1 \
     AND (max_uses IS NULL OR used_count < max_uses) \
     AND (expires_at IS NULL OR expires_at > ?)";

#[async_trait]
impl OrderRepository for SqlxOrderRepository {
    async fn create_order(&self, order: &NewOrder) -> Result<Order> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_order_sqlite(self.pool.sqlite()?, order).await,
            DatabaseDriver::Mysql => create_order_mysql(self.pool.mysql()?, order).await,
        }
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_order_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_order_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_orders(&self, user_id: i64) -> Result<Vec<Order>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_orders_sqlite(self.pool.sqlite()?, user_id).await,
            DatabaseDriver::Mysql => list_orders_mysql(self.pool.mysql()?, user_id).await,
        }
    }

    async fn complete_order(&self, id: i64) -> Result<OrderCompletion> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => complete_order_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => complete_order_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn create_coupon(&self, input: &CreateCouponInput) -> Result<Coupon> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_coupon_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_coupon_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn get_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_coupon_sqlite(self.pool.sqlite()?, code).await,
            DatabaseDriver::Mysql => get_coupon_mysql(self.pool.mysql()?, code).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_order_sqlite(pool: &SqlitePool, order: &NewOrder) -> Result<Order> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO orders (user_id, status, subtotal_cents, discount_cents, total_cents,
                            coupon_code, created_at)
        VALUES (?, 'pending', ?, ?, ?, ?, ?)
        "#,
    )
    .bind(order.user_id)
    .bind(order.subtotal_cents)
    .bind(order.discount_cents)
    .bind(order.total_cents)
    .bind(&order.coupon_code)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create order")?;
    let order_id = result.last_insert_rowid();

    for item in &order.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, course_id, title, price_cents) VALUES (?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(item.course_id)
        .bind(&item.title)
        .bind(item.price_cents)
        .execute(&mut *tx)
        .await
        .context("Failed to create order item")?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = ? AND course_id = ?")
            .bind(order.user_id)
            .bind(item.course_id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear cart")?;
    }

    tx.commit().await?;
    Ok(Order {
        id: order_id,
        user_id: order.user_id,
        status: OrderStatus::Pending,
        subtotal_cents: order.subtotal_cents,
        discount_cents: order.discount_cents,
        total_cents: order.total_cents,
        coupon_code: order.coupon_code.clone(),
        items: order.items.clone(),
        created_at: now,
        completed_at: None,
    })
}

async fn get_order_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS);
    let Some(row) = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get order")?
    else {
        return Ok(None);
    };

    let items = sqlx::query(
        "SELECT course_id, title, price_cents FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to get order items")?;

    let items = items.iter().map(row_to_order_item_sqlite).collect();
    Ok(Some(row_to_order_sqlite(&row, items)?))
}

async fn list_orders_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<Order>> {
    let sql = format!(
        "SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list orders")?;

    let item_rows = sqlx::query(
        r#"
        SELECT oi.order_id, oi.course_id, oi.title, oi.price_cents
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.user_id = ?
        ORDER BY oi.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list order items")?;

    let mut items: HashMap<i64, Vec<OrderItem>> = HashMap::new();
    for row in &item_rows {
        items
            .entry(row.get("order_id"))
            .or_default()
            .push(row_to_order_item_sqlite(row));
    }

    rows.iter()
        .map(|row| {
            let id: i64 = row.get("id");
            row_to_order_sqlite(row, items.remove(&id).unwrap_or_default())
        })
        .collect()
}

async fn complete_order_sqlite(pool: &SqlitePool, id: i64) -> Result<OrderCompletion> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE orders SET status = 'completed', completed_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to complete order")?
    .rows_affected();
    if updated == 0 {
        return Ok(OrderCompletion::NotPending);
    }

    let order = sqlx::query("SELECT user_id, coupon_code FROM orders WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    let user_id: i64 = order.get("user_id");
    let coupon_code: Option<String> = order.get("coupon_code");

    let course_ids: Vec<i64> =
        sqlx::query_scalar("SELECT course_id FROM order_items WHERE order_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

    for course_id in course_ids {
        let enrolled = sqlx::query(ENROLL_SQLITE)
            .bind(user_id)
            .bind(course_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to enroll buyer")?
            .rows_affected();
        if enrolled == 0 {
            tx.rollback().await?;
            return Ok(OrderCompletion::AlreadyOwned);
        }
        for table in ["cart_items", "wishlist_items"] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE user_id = ? AND course_id = ?",
                table
            ))
            .bind(user_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    if let Some(code) = coupon_code {
        let redeemed = sqlx::query(REDEEM_COUPON)
            .bind(code)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to count coupon use")?
            .rows_affected();
        if redeemed == 0 {
            tx.rollback().await?;
            return Ok(OrderCompletion::CouponUnavailable);
        }
    }

    tx.commit().await?;
    Ok(OrderCompletion::Completed)
}

async fn create_coupon_sqlite(pool: &SqlitePool, input: &CreateCouponInput) -> Result<Coupon> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO coupons (code, discount_percent, max_uses, used_count, expires_at, active, created_at)
        VALUES (?, ?, ?, 0, ?, ?, ?)
        "#,
    )
    .bind(&input.code)
    .bind(input.discount_percent)
    .bind(input.max_uses)
    .bind(input.expires_at)
    .bind(true)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create coupon")?;

    Ok(Coupon {
        id: result.last_insert_rowid(),
        code: input.code.clone(),
        discount_percent: input.discount_percent,
        max_uses: input.max_uses,
        used_count: 0,
        expires_at: input.expires_at,
        active: true,
        created_at: now,
    })
}

async fn get_coupon_sqlite(pool: &SqlitePool, code: &str) -> Result<Option<Coupon>> {
    let sql = format!("SELECT {} FROM coupons WHERE code = ?", COUPON_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(code)
        .fetch_optional(pool)
        .await
        .context("Failed to get coupon")?;

    Ok(row.map(|r| Coupon {
        id: r.get("id"),
        code: r.get("code"),
        discount_percent: r.get("discount_percent"),
        max_uses: r.get("max_uses"),
        used_count: r.get("used_count"),
        expires_at: r.get("expires_at"),
        active: r.get("active"),
        created_at: r.get("created_at"),
    }))
}

fn row_to_order_sqlite(row: &sqlx::sqlite::SqliteRow, items: Vec<OrderItem>) -> Result<Order> {
    let status: String = row.get("status");
    Ok(Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        status: OrderStatus::from_str(&status)?,
        subtotal_cents: row.get("subtotal_cents"),
        discount_cents: row.get("discount_cents"),
        total_cents: row.get("total_cents"),
        coupon_code: row.get("coupon_code"),
        items,
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    })
}

fn row_to_order_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> OrderItem {
    OrderItem {
        course_id: row.get("course_id"),
        title: row.get("title"),
        price_cents: row.get("price_cents"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_order_mysql(pool: &MySqlPool, order: &NewOrder) -> Result<Order> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO orders (user_id, status, subtotal_cents, discount_cents, total_cents,
                            coupon_code, created_at)
        VALUES (?, 'pending', ?, ?, ?, ?, ?)
        "#,
    )
    .bind(order.user_id)
    .bind(order.subtotal_cents)
    .bind(order.discount_cents)
    .bind(order.total_cents)
    .bind(&order.coupon_code)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create order")?;
    let order_id = result.last_insert_id() as i64;

    for item in &order.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, course_id, title, price_cents) VALUES (?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(item.course_id)
        .bind(&item.title)
        .bind(item.price_cents)
        .execute(&mut *tx)
        .await
        .context("Failed to create order item")?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = ? AND course_id = ?")
            .bind(order.user_id)
            .bind(item.course_id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear cart")?;
    }

    tx.commit().await?;
    Ok(Order {
        id: order_id,
        user_id: order.user_id,
        status: OrderStatus::Pending,
        subtotal_cents: order.subtotal_cents,
        discount_cents: order.discount_cents,
        total_cents: order.total_cents,
        coupon_code: order.coupon_code.clone(),
        items: order.items.clone(),
        created_at: now,
        completed_at: None,
    })
}

async fn get_order_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS);
    let Some(row) = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get order")?
    else {
        return Ok(None);
    };

    let items = sqlx::query(
        "SELECT course_id, title, price_cents FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to get order items")?;

    let items = items.iter().map(row_to_order_item_mysql).collect();
    Ok(Some(row_to_order_mysql(&row, items)?))
}

async fn list_orders_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<Order>> {
    let sql = format!(
        "SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list orders")?;

    let item_rows = sqlx::query(
        r#"
        SELECT oi.order_id, oi.course_id, oi.title, oi.price_cents
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.user_id = ?
        ORDER BY oi.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list order items")?;

    let mut items: HashMap<i64, Vec<OrderItem>> = HashMap::new();
    for row in &item_rows {
        items
            .entry(row.get("order_id"))
            .or_default()
            .push(row_to_order_item_mysql(row));
    }

    rows.iter()
        .map(|row| {
            let id: i64 = row.get("id");
            row_to_order_mysql(row, items.remove(&id).unwrap_or_default())
        })
        .collect()
}

async fn complete_order_mysql(pool: &MySqlPool, id: i64) -> Result<OrderCompletion> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE orders SET status = 'completed', completed_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to complete order")?
    .rows_affected();
    if updated == 0 {
        return Ok(OrderCompletion::NotPending);
    }

    let order = sqlx::query("SELECT user_id, coupon_code FROM orders WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    let user_id: i64 = order.get("user_id");
    let coupon_code: Option<String> = order.get("coupon_code");

    let course_ids: Vec<i64> =
        sqlx::query_scalar("SELECT course_id FROM order_items WHERE order_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

    for course_id in course_ids {
        let enrolled = sqlx::query(ENROLL_MYSQL)
            .bind(user_id)
            .bind(course_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to enroll buyer")?
            .rows_affected();
        if enrolled == 0 {
            tx.rollback().await?;
            return Ok(OrderCompletion::AlreadyOwned);
        }
        for table in ["cart_items", "wishlist_items"] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE user_id = ? AND course_id = ?",
                table
            ))
            .bind(user_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    if let Some(code) = coupon_code {
        let redeemed = sqlx::query(REDEEM_COUPON)
            .bind(code)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to count coupon use")?
            .rows_affected();
        if redeemed == 0 {
            tx.rollback().await?;
            return Ok(OrderCompletion::CouponUnavailable);
        }
    }

    tx.commit().await?;
    Ok(OrderCompletion::Completed)
}

async fn create_coupon_mysql(pool: &MySqlPool, input: &CreateCouponInput) -> Result<Coupon> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO coupons (code, discount_percent, max_uses, used_count, expires_at, active, created_at)
        VALUES (?, ?, ?, 0, ?, ?, ?)
        "#,
    )
    .bind(&input.code)
    .bind(input.discount_percent)
    .bind(input.max_uses)
    .bind(input.expires_at)
    .bind(true)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create coupon")?;

    Ok(Coupon {
        id: result.last_insert_id() as i64,
        code: input.code.clone(),
        discount_percent: input.discount_percent,
        max_uses: input.max_uses,
        used_count: 0,
        expires_at: input.expires_at,
        active: true,
        created_at: now,
    })
}

async fn get_coupon_mysql(pool: &MySqlPool, code: &str) -> Result<Option<Coupon>> {
    let sql = format!("SELECT {} FROM coupons WHERE code = ?", COUPON_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(code)
        .fetch_optional(pool)
        .await
        .context("Failed to get coupon")?;

    Ok(row.map(|r| Coupon {
        id: r.get("id"),
        code: r.get("code"),
        discount_percent: r.get("discount_percent"),
        max_uses: r.get("max_uses"),
        used_count: r.get("used_count"),
        expires_at: r.get("expires_at"),
        active: r.get("active"),
        created_at: r.get("created_at"),
    }))
}

fn row_to_order_mysql(row: &sqlx::mysql::MySqlRow, items: Vec<OrderItem>) -> Result<Order> {
    let status: String = row.get("status");
    Ok(Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        status: OrderStatus::from_str(&status)?,
        subtotal_cents: row.get("subtotal_cents"),
        discount_cents: row.get("discount_cents"),
        total_cents: row.get("total_cents"),
        coupon_code: row.get("coupon_code"),
        items,
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    })
}

fn row_to_order_item_mysql(row: &sqlx::mysql::MySqlRow) -> OrderItem {
    OrderItem {
        course_id: row.get("course_id"),
        title: row.get("title"),
        price_cents: row.get("price_cents"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::course::tests::{course_input, insert_user};
    use crate::db::repositories::{
        CartRepository, CourseRepository, EnrollmentRepository, SqlxCartRepository,
        SqlxCourseRepository, SqlxEnrollmentRepository,
    };
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_order_lifecycle() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let courses = SqlxCourseRepository::new(pool.clone());
        let carts = SqlxCartRepository::new(pool.clone());
        let enrollments = SqlxEnrollmentRepository::new(pool.clone());
        let repo = SqlxOrderRepository::new(pool.clone());

        let instructor = insert_user(&pool, "teach@example.com").await;
        let buyer = insert_user(&pool, "buyer@example.com").await;
        let course = courses
            .create(instructor, &course_input("Paid", 5000), "paid")
            .await
            .unwrap();
        carts.add_to_cart(buyer, course.id).await.unwrap();
        carts.add_to_wishlist(buyer, course.id).await.unwrap();

        let coupon = repo
            .create_coupon(&CreateCouponInput {
                code: "HALF".to_string(),
                discount_percent: 50,
                max_uses: Some(10),
                expires_at: None,
            })
            .await
            .unwrap();
        assert!(coupon.active);

        let order = repo
            .create_order(&NewOrder {
                user_id: buyer,
                subtotal_cents: 5000,
                discount_cents: 2500,
                total_cents: 2500,
                coupon_code: Some("HALF".to_string()),
                items: vec![OrderItem {
                    course_id: course.id,
                    title: course.title.clone(),
                    price_cents: 5000,
                }],
            })
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        assert!(carts.cart_items(buyer).await.unwrap().is_empty());
        assert!(carts.is_wishlisted(buyer, course.id).await.unwrap());

        assert_eq!(
            repo.complete_order(order.id).await.unwrap(),
            OrderCompletion::Completed
        );
        assert_eq!(
            repo.complete_order(order.id).await.unwrap(),
            OrderCompletion::NotPending
        );

        let stored = repo.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
        assert!(stored.completed_at.is_some());
        assert_eq!(stored.items.len(), 1);

        assert!(enrollments.is_enrolled(buyer, course.id).await.unwrap());
        assert!(carts.cart_items(buyer).await.unwrap().is_empty());
        assert!(!carts.is_wishlisted(buyer, course.id).await.unwrap());

        let coupon = repo.get_coupon_by_code("HALF").await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 1);

        let listed = repo.list_orders(buyer).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].items[0].price_cents, 5000);
        assert!(repo.list_orders(instructor).await.unwrap().is_empty());
    }

    fn single_item_order(user_id: i64, course_id: i64, coupon_code: Option<&str>) -> NewOrder {
        NewOrder {
            user_id,
            subtotal_cents: 1000,
            discount_cents: if coupon_code.is_some() { 500 } else { 0 },
            total_cents: if coupon_code.is_some() { 500 } else { 1000 },
            coupon_code: coupon_code.map(str::to_string),
            items: vec![OrderItem {
                course_id,
                title: "Course".to_string(),
                price_cents: 1000,
            }],
        }
    }

    #[tokio::test]
    async fn test_coupon_cannot_be_redeemed_past_max_uses() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let courses = SqlxCourseRepository::new(pool.clone());
        let enrollments = SqlxEnrollmentRepository::new(pool.clone());
        let repo = SqlxOrderRepository::new(pool.clone());

        let instructor = insert_user(&pool, "teach@example.com").await;
        let first = insert_user(&pool, "first@example.com").await;
        let second = insert_user(&pool, "second@example.com").await;
        let course = courses
            .create(instructor, &course_input("Paid", 1000), "paid")
            .await
            .unwrap();
        repo.create_coupon(&CreateCouponInput {
            code: "SINGLE".to_string(),
            discount_percent: 50,
            max_uses: Some(1),
            expires_at: None,
        })
        .await
        .unwrap();

        // Both orders are placed while the coupon still has a use left
        let a = repo
            .create_order(&single_item_order(first, course.id, Some("SINGLE")))
            .await
            .unwrap();
        let b = repo
            .create_order(&single_item_order(second, course.id, Some("SINGLE")))
            .await
            .unwrap();

        assert_eq!(
            repo.complete_order(a.id).await.unwrap(),
            OrderCompletion::Completed
        );
        assert_eq!(
            repo.complete_order(b.id).await.unwrap(),
            OrderCompletion::CouponUnavailable
        );

        let coupon = repo.get_coupon_by_code("SINGLE").await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 1);
        let b = repo.get_order(b.id).await.unwrap().unwrap();
        assert_eq!(b.status, OrderStatus::Pending);
        assert!(!enrollments.is_enrolled(second, course.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_second_order_for_owned_course_is_refused() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let courses = SqlxCourseRepository::new(pool.clone());
        let repo = SqlxOrderRepository::new(pool.clone());

        let instructor = insert_user(&pool, "teach@example.com").await;
        let buyer = insert_user(&pool, "buyer@example.com").await;
        let course = courses
            .create(instructor, &course_input("Paid", 1000), "paid")
            .await
            .unwrap();

        let first = repo
            .create_order(&single_item_order(buyer, course.id, None))
            .await
            .unwrap();
        let again = repo
            .create_order(&single_item_order(buyer, course.id, None))
            .await
            .unwrap();

        assert_eq!(
            repo.complete_order(first.id).await.unwrap(),
            OrderCompletion::Completed
        );
        assert_eq!(
            repo.complete_order(again.id).await.unwrap(),
            OrderCompletion::AlreadyOwned
        );
        let again = repo.get_order(again.id).await.unwrap().unwrap();
        assert_eq!(again.status, OrderStatus::Pending);
        assert!(again.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_coupon_code_fails() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxOrderRepository::new(pool);
        let input = CreateCouponInput {
            code: "ONCE".to_string(),
            discount_percent: 10,
            max_uses: None,
            expires_at: None,
        };
        repo.create_coupon(&input).await.unwrap();
        assert!(repo.create_coupon(&input).await.is_err());
        assert!(repo.get_coupon_by_code("missing").await.unwrap().is_none());
    }
}
