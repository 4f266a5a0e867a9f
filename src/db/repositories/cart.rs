//! Cart and wishlist repository
//!
//! Both are sets of `(user_id, course_id)` pairs stored in `cart_items` and
//! `wishlist_items`.

use super::course::{COURSE_SUMMARY_FROM, COURSE_SUMMARY_SELECT};
use super::course::{row_to_course_summary_mysql, row_to_course_summary_sqlite};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CartItem, CourseSummary, WishlistItem};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const CART_TABLE: &str = "cart_items";
const WISHLIST_TABLE: &str = "wishlist_items";

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Cart contents, oldest first
    async fn cart_items(&self, user_id: i64) -> Result<Vec<CartItem>>;

    /// Returns false when the course was already in the cart
    async fn add_to_cart(&self, user_id: i64, course_id: i64) -> Result<bool>;

    async fn remove_from_cart(&self, user_id: i64, course_id: i64) -> Result<bool>;

    /// Wishlist contents, newest first
    async fn wishlist_items(&self, user_id: i64) -> Result<Vec<WishlistItem>>;

    async fn is_wishlisted(&self, user_id: i64, course_id: i64) -> Result<bool>;

    async fn add_to_wishlist(&self, user_id: i64, course_id: i64) -> Result<bool>;

    async fn remove_from_wishlist(&self, user_id: i64, course_id: i64) -> Result<bool>;
}

pub struct SqlxCartRepository {
    pool: DynDatabasePool,
}

impl SqlxCartRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CartRepository> {
        Arc::new(Self::new(pool))
    }

    async fn list(
        &self,
        table: &str,
        order: &str,
        user_id: i64,
    ) -> Result<Vec<(CourseSummary, DateTime<Utc>)>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_saved_sqlite(self.pool.sqlite()?, table, order, user_id).await
            }
            DatabaseDriver::Mysql => {
                list_saved_mysql(self.pool.mysql()?, table, order, user_id).await
            }
        }
    }

    async fn add(&self, table: &str, user_id: i64, course_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                add_saved_sqlite(self.pool.sqlite()?, table, user_id, course_id).await
            }
            DatabaseDriver::Mysql => {
                add_saved_mysql(self.pool.mysql()?, table, user_id, course_id).await
            }
        }
    }

    async fn remove(&self, table: &str, user_id: i64, course_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                remove_saved_sqlite(self.pool.sqlite()?, table, user_id, course_id).await
            }
            DatabaseDriver::Mysql => {
                remove_saved_mysql(self.pool.mysql()?, table, user_id, course_id).await
            }
        }
    }
}

#[async_trait]
impl CartRepository for SqlxCartRepository {
    async fn cart_items(&self, user_id: i64) -> Result<Vec<CartItem>> {
        let rows = self.list(CART_TABLE, "ASC", user_id).await?;
        Ok(rows
            .into_iter()
            .map(|(course, added_at)| CartItem { course, added_at })
            .collect())
    }

    async fn add_to_cart(&self, user_id: i64, course_id: i64) -> Result<bool> {
        self.add(CART_TABLE, user_id, course_id).await
    }

    async fn remove_from_cart(&self, user_id: i64, course_id: i64) -> Result<bool> {
        self.remove(CART_TABLE, user_id, course_id).await
    }

    async fn wishlist_items(&self, user_id: i64) -> Result<Vec<WishlistItem>> {
        let rows = self.list(WISHLIST_TABLE, "DESC", user_id).await?;
        Ok(rows
            .into_iter()
            .map(|(course, added_at)| WishlistItem { course, added_at })
            .collect())
    }

    async fn is_wishlisted(&self, user_id: i64, course_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM wishlist_items WHERE user_id = ? AND course_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql)
                    .bind(user_id)
                    .bind(course_id)
                    .fetch_one(self.pool.sqlite()?)
                    .await?
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(sql)
                    .bind(user_id)
                    .bind(course_id)
                    .fetch_one(self.pool.mysql()?)
                    .await?
            }
        };
        Ok(count > 0)
    }

    async fn add_to_wishlist(&self, user_id: i64, course_id: i64) -> Result<bool> {
        self.add(WISHLIST_TABLE, user_id, course_id).await
    }

    async fn remove_from_wishlist(&self, user_id: i64, course_id: i64) -> Result<bool> {
        self.remove(WISHLIST_TABLE, user_id, course_id).await
    }
}

const INSERT_IGNORE_SQLITE: &str = "INSERT OR IGNORE INTO";
const INSERT_IGNORE_MYSQL: &str = "INSERT IGNORE INTO";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_saved_sqlite(
    pool: &SqlitePool,
    table: &str,
    order: &str,
    user_id: i64,
) -> Result<Vec<(CourseSummary, DateTime<Utc>)>> {
    let sql = format!(
        "{}, s.created_at AS added_at {} JOIN {} s ON s.course_id = c.id \
         WHERE s.user_id = ? ORDER BY s.created_at {}, c.id {}",
        COURSE_SUMMARY_SELECT, COURSE_SUMMARY_FROM, table, order, order
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to list {}", table))?;

    rows.iter()
        .map(|row| Ok((row_to_course_summary_sqlite(row)?, row.get("added_at"))))
        .collect()
}

async fn add_saved_sqlite(
    pool: &SqlitePool,
    table: &str,
    user_id: i64,
    course_id: i64,
) -> Result<bool> {
    let sql = format!(
        "{} {} (user_id, course_id, created_at) VALUES (?, ?, ?)",
        INSERT_IGNORE_SQLITE, table
    );
    let result = sqlx::query(&sql)
        .bind(user_id)
        .bind(course_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .with_context(|| format!("Failed to add to {}", table))?;
    Ok(result.rows_affected() > 0)
}

async fn remove_saved_sqlite(
    pool: &SqlitePool,
    table: &str,
    user_id: i64,
    course_id: i64,
) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE user_id = ? AND course_id = ?", table);
    let result = sqlx::query(&sql)
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to remove from {}", table))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_saved_mysql(
    pool: &MySqlPool,
    table: &str,
    order: &str,
    user_id: i64,
) -> Result<Vec<(CourseSummary, DateTime<Utc>)>> {
    let sql = format!(
        "{}, s.created_at AS added_at {} JOIN {} s ON s.course_id = c.id \
         WHERE s.user_id = ? ORDER BY s.created_at {}, c.id {}",
        COURSE_SUMMARY_SELECT, COURSE_SUMMARY_FROM, table, order, order
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to list {}", table))?;

    rows.iter()
        .map(|row| Ok((row_to_course_summary_mysql(row)?, row.get("added_at"))))
        .collect()
}

async fn add_saved_mysql(
    pool: &MySqlPool,
    table: &str,
    user_id: i64,
    course_id: i64,
) -> Result<bool> {
    let sql = format!(
        "{} {} (user_id, course_id, created_at) VALUES (?, ?, ?)",
        INSERT_IGNORE_MYSQL, table
    );
    let result = sqlx::query(&sql)
        .bind(user_id)
        .bind(course_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .with_context(|| format!("Failed to add to {}", table))?;
    Ok(result.rows_affected() > 0)
}

async fn remove_saved_mysql(
    pool: &MySqlPool,
    table: &str,
    user_id: i64,
    course_id: i64,
) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE user_id = ? AND course_id = ?", table);
    let result = sqlx::query(&sql)
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to remove from {}", table))?;
    Ok(result.rows_affected() > 0)
}
