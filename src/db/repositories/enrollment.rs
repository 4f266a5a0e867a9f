//! Enrollment repository
//!
//! Course enrollments and per-lesson completion records.

use super::course::{COURSE_SUMMARY_FROM, COURSE_SUMMARY_SELECT};
use super::course::{row_to_course_summary_mysql, row_to_course_summary_sqlite};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CourseProgress, EnrollmentWithCourse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Enroll a user; returns false when the enrollment already existed
    async fn enroll(&self, user_id: i64, course_id: i64) -> Result<bool>;

    async fn is_enrolled(&self, user_id: i64, course_id: i64) -> Result<bool>;

    /// Enrollments of a user with course summary and progress, newest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<EnrollmentWithCourse>>;

    /// Record a lesson as completed; completing twice keeps the first record
    async fn complete_lesson(&self, user_id: i64, lesson_id: i64) -> Result<()>;

    /// Number of completed lessons of a course
    async fn completed_count(&self, user_id: i64, course_id: i64) -> Result<i64>;
}

pub struct SqlxEnrollmentRepository {
    pool: DynDatabasePool,
}

impl SqlxEnrollmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EnrollmentRepository> {
        Arc::new(Self::new(pool))
    }
}

pub(crate) const ENROLL_SQLITE: &str =
    "INSERT OR IGNORE INTO enrollments (user_id, course_id, created_at) VALUES (?, ?, ?)";
pub(crate) const ENROLL_MYSQL: &str =
    "INSERT IGNORE INTO enrollments (user_id, course_id, created_at) VALUES (?, ?, ?)";

const COMPLETE_LESSON_SQLITE: &str =
    "INSERT OR IGNORE INTO lesson_progress (user_id, lesson_id, completed_at) VALUES (?, ?, ?)";
const COMPLETE_LESSON_MYSQL: &str =
    "INSERT IGNORE INTO lesson_progress (user_id, lesson_id, completed_at) VALUES (?, ?, ?)";

const COMPLETED_COUNT: &str = r#"
    SELECT COUNT(*)
    FROM lesson_progress lp
    JOIN lessons ls ON ls.id = lp.lesson_id
    WHERE lp.user_id = ? AND ls.course_id = ?
"#;

#[async_trait]
impl EnrollmentRepository for SqlxEnrollmentRepository {
    async fn enroll(&self, user_id: i64, course_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => enroll_sqlite(self.pool.sqlite()?, user_id, course_id).await,
            DatabaseDriver::Mysql => enroll_mysql(self.pool.mysql()?, user_id, course_id).await,
        }
    }

    async fn is_enrolled(&self, user_id: i64, course_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                is_enrolled_sqlite(self.pool.sqlite()?, user_id, course_id).await
            }
            DatabaseDriver::Mysql => is_enrolled_mysql(self.pool.mysql()?, user_id, course_id).await,
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<EnrollmentWithCourse>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_enrollments_sqlite(self.pool.sqlite()?, user_id).await,
            DatabaseDriver::Mysql => list_enrollments_mysql(self.pool.mysql()?, user_id).await,
        }
    }

    async fn complete_lesson(&self, user_id: i64, lesson_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                complete_lesson_sqlite(self.pool.sqlite()?, user_id, lesson_id).await
            }
            DatabaseDriver::Mysql => {
                complete_lesson_mysql(self.pool.mysql()?, user_id, lesson_id).await
            }
        }
    }

    async fn completed_count(&self, user_id: i64, course_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                completed_count_sqlite(self.pool.sqlite()?, user_id, course_id).await
            }
            DatabaseDriver::Mysql => {
                completed_count_mysql(self.pool.mysql()?, user_id, course_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn enroll_sqlite(pool: &SqlitePool, user_id: i64, course_id: i64) -> Result<bool> {
    let result = sqlx::query(ENROLL_SQLITE)
        .bind(user_id)
        .bind(course_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to enroll user")?;
    Ok(result.rows_affected() > 0)
}

async fn is_enrolled_sqlite(pool: &SqlitePool, user_id: i64, course_id: i64) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE user_id = ? AND course_id = ?")
            .bind(user_id)
            .bind(course_id)
            .fetch_one(pool)
            .await
            .context("Failed to check enrollment")?;
    Ok(count > 0)
}

async fn list_enrollments_sqlite(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<EnrollmentWithCourse>> {
    let sql = format!(
        r#"
        {}, en.id AS enrollment_id, en.created_at AS enrolled_at,
           (SELECT COUNT(*) FROM lesson_progress lp JOIN lessons ls ON ls.id = lp.lesson_id
            WHERE lp.user_id = en.user_id AND ls.course_id = c.id) AS completed_lessons
        {}
        JOIN enrollments en ON en.course_id = c.id
        WHERE en.user_id = ?
        ORDER BY en.created_at DESC, en.id DESC
        "#,
        COURSE_SUMMARY_SELECT, COURSE_SUMMARY_FROM
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list enrollments")?;

    rows.iter()
        .map(|row| {
            let course = row_to_course_summary_sqlite(row)?;
            let progress = CourseProgress::new(row.get("completed_lessons"), course.lesson_count);
            Ok(EnrollmentWithCourse {
                id: row.get("enrollment_id"),
                enrolled_at: row.get("enrolled_at"),
                course,
                progress,
            })
        })
        .collect()
}

async fn complete_lesson_sqlite(pool: &SqlitePool, user_id: i64, lesson_id: i64) -> Result<()> {
    sqlx::query(COMPLETE_LESSON_SQLITE)
        .bind(user_id)
        .bind(lesson_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to record lesson completion")?;
    Ok(())
}

async fn completed_count_sqlite(pool: &SqlitePool, user_id: i64, course_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(COMPLETED_COUNT)
        .bind(user_id)
        .bind(course_id)
        .fetch_one(pool)
        .await
        .context("Failed to count completed lessons")?;
    Ok(count)
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn enroll_mysql(pool: &MySqlPool, user_id: i64, course_id: i64) -> Result<bool> {
    let result = sqlx::query(ENROLL_MYSQL)
        .bind(user_id)
        .bind(course_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to enroll user")?;
    Ok(result.rows_affected() > 0)
}

async fn is_enrolled_mysql(pool: &MySqlPool, user_id: i64, course_id: i64) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE user_id = ? AND course_id = ?")
            .bind(user_id)
            .bind(course_id)
            .fetch_one(pool)
            .await
            .context("Failed to check enrollment")?;
    Ok(count > 0)
}

async fn list_enrollments_mysql(
    pool: &MySqlPool,
    user_id: i64,
) -> Result<Vec<EnrollmentWithCourse>> {
    let sql = format!(
        r#"
        {}, en.id AS enrollment_id, en.created_at AS enrolled_at,
           (SELECT COUNT(*) FROM lesson_progress lp JOIN lessons ls ON ls.id = lp.lesson_id
            WHERE lp.user_id = en.user_id AND ls.course_id = c.id) AS completed_lessons
        {}
        JOIN enrollments en ON en.course_id = c.id
        WHERE en.user_id = ?
        ORDER BY en.created_at DESC, en.id DESC
        "#,
        COURSE_SUMMARY_SELECT, COURSE_SUMMARY_FROM
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list enrollments")?;

    rows.iter()
        .map(|row| {
            let course = row_to_course_summary_mysql(row)?;
            let progress = CourseProgress::new(row.get("completed_lessons"), course.lesson_count);
            Ok(EnrollmentWithCourse {
                id: row.get("enrollment_id"),
                enrolled_at: row.get("enrolled_at"),
                course,
                progress,
            })
        })
        .collect()
}

async fn complete_lesson_mysql(pool: &MySqlPool, user_id: i64, lesson_id: i64) -> Result<()> {
    sqlx::query(COMPLETE_LESSON_MYSQL)
        .bind(user_id)
        .bind(lesson_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to record lesson completion")?;
    Ok(())
}

async fn completed_count_mysql(pool: &MySqlPool, user_id: i64, course_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(COMPLETED_COUNT)
        .bind(user_id)
        .bind(course_id)
        .fetch_one(pool)
        .await
        .context("Failed to count completed lessons")?;
    Ok(count)
}
