//! Course repository
//!
//! Courses, their modules and lessons, catalogue queries and the numbers
//! behind the instructor dashboard.

use super::{contains_pattern, search_text, LIKE_ESCAPE};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    Course, CourseEnrollmentStat, CourseFilter, CourseLevel, CourseModule, CourseStatus,
    CourseSummary, CreateCourseInput, CreateLessonInput, InstructorCourse, InstructorRef,
    InstructorStats, Lesson, ListParams,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Course repository trait
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(
        &self,
        instructor_id: i64,
        input: &CreateCourseInput,
        slug: &str,
    ) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Persist the editable fields of `course`
    async fn update(&self, course: &Course) -> Result<()>;

    async fn set_status(&self, id: i64, status: CourseStatus) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// One page of the public catalogue plus the total match count
    async fn list_published(
        &self,
        filter: &CourseFilter,
        params: &ListParams,
    ) -> Result<(Vec<CourseSummary>, i64)>;

    /// Catalogue entry for one course regardless of status
    async fn summary(&self, id: i64) -> Result<Option<CourseSummary>>;

    /// All courses of an instructor, newest first
    async fn list_by_instructor(&self, instructor_id: i64) -> Result<Vec<InstructorCourse>>;

    /// Append a module after the existing ones
    async fn add_module(&self, course_id: i64, title: &str) -> Result<CourseModule>;

    async fn get_module(&self, id: i64) -> Result<Option<CourseModule>>;

    /// Append a lesson to the end of `module`
    async fn add_lesson(&self, module: &CourseModule, input: &CreateLessonInput)
        -> Result<Lesson>;

    async fn get_lesson(&self, id: i64) -> Result<Option<Lesson>>;

    async fn list_modules(&self, course_id: i64) -> Result<Vec<CourseModule>>;

    /// Lessons of a course in module then lesson order
    async fn list_lessons(&self, course_id: i64) -> Result<Vec<Lesson>>;

    async fn lesson_count(&self, course_id: i64) -> Result<i64>;

    async fn enrollment_count(&self, course_id: i64) -> Result<i64>;

    async fn instructor_stats(&self, instructor_id: i64) -> Result<InstructorStats>;
}

pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Select list of a catalogue entry; the course table is aliased `c`
pub(crate) const COURSE_SUMMARY_SELECT: &str = r#"
    SELECT c.id, c.title, c.slug, c.description, c.thumbnail, c.price_cents,
           c.category, c.level, c.created_at,
           u.id AS instructor_id, u.name AS instructor_name,
           (SELECT COUNT(*) FROM lessons l WHERE l.course_id = c.id) AS lesson_count,
           (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id) AS enrollment_count
"#;

/// FROM clause matching [`COURSE_SUMMARY_SELECT`]
pub(crate) const COURSE_SUMMARY_FROM: &str = "FROM courses c JOIN users u ON u.id = c.instructor_id";

const COURSE_COLUMNS: &str = "id, instructor_id, title, slug, description, thumbnail, price_cents, \
     category, level, status, created_at, updated_at";

const LESSON_COLUMNS: &str =
    "id, module_id, course_id, title, content, video_url, duration_minutes, position, is_preview";

const REVENUE_SQLITE: &str = r#"
    SELECT COALESCE(SUM(oi.price_cents), 0)
    FROM order_items oi
    JOIN orders o ON o.id = oi.order_id
    JOIN courses c ON c.id = oi.course_id
    WHERE o.status = 'completed' AND c.instructor_id = ?
"#;
const REVENUE_MYSQL: &str = r#"
    SELECT CAST(COALESCE(SUM(oi.price_cents), 0) AS SIGNED)
    FROM order_items oi
    JOIN orders o ON o.id = oi.order_id
    JOIN courses c ON c.id = oi.course_id
    WHERE o.status = 'completed' AND c.instructor_id = ?
"#;

/// WHERE clause and its string binds for a catalogue query
fn catalogue_filter(filter: &CourseFilter) -> (String, Vec<String>) {
    let mut clause = String::from("c.status = 'published'");
    let mut binds = Vec::new();

    if let Some(search) = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        clause.push_str(&format!(" AND c.search_text LIKE ? ESCAPE '{}'", LIKE_ESCAPE));
        binds.push(contains_pattern(search));
    }
    if let Some(category) = filter
        .category
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        clause.push_str(" AND c.category = ?");
        binds.push(category.to_string());
    }
    if let Some(level) = filter.level {
        clause.push_str(" AND c.level = ?");
        binds.push(level.to_string());
    }

    (clause, binds)
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(
        &self,
        instructor_id: i64,
        input: &CreateCourseInput,
        slug: &str,
    ) -> Result<Course> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_course_sqlite(self.pool.sqlite()?, instructor_id, input, slug).await
            }
            DatabaseDriver::Mysql => {
                create_course_mysql(self.pool.mysql()?, instructor_id, input, slug).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_course_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_course_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => course_slug_exists_sqlite(self.pool.sqlite()?, slug).await,
            DatabaseDriver::Mysql => course_slug_exists_mysql(self.pool.mysql()?, slug).await,
        }
    }

    async fn update(&self, course: &Course) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_course_sqlite(self.pool.sqlite()?, course).await,
            DatabaseDriver::Mysql => update_course_mysql(self.pool.mysql()?, course).await,
        }
    }

    async fn set_status(&self, id: i64, status: CourseStatus) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => set_status_sqlite(self.pool.sqlite()?, id, status).await,
            DatabaseDriver::Mysql => set_status_mysql(self.pool.mysql()?, id, status).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_course_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_course_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_published(
        &self,
        filter: &CourseFilter,
        params: &ListParams,
    ) -> Result<(Vec<CourseSummary>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_published_sqlite(self.pool.sqlite()?, filter, params).await
            }
            DatabaseDriver::Mysql => list_published_mysql(self.pool.mysql()?, filter, params).await,
        }
    }

    async fn summary(&self, id: i64) -> Result<Option<CourseSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => course_summary_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => course_summary_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_by_instructor(&self, instructor_id: i64) -> Result<Vec<InstructorCourse>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_instructor_sqlite(self.pool.sqlite()?, instructor_id).await
            }
            DatabaseDriver::Mysql => {
                list_by_instructor_mysql(self.pool.mysql()?, instructor_id).await
            }
        }
    }

    async fn add_module(&self, course_id: i64, title: &str) -> Result<CourseModule> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => add_module_sqlite(self.pool.sqlite()?, course_id, title).await,
            DatabaseDriver::Mysql => add_module_mysql(self.pool.mysql()?, course_id, title).await,
        }
    }

    async fn get_module(&self, id: i64) -> Result<Option<CourseModule>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_module_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_module_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn add_lesson(
        &self,
        module: &CourseModule,
        input: &CreateLessonInput,
    ) -> Result<Lesson> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => add_lesson_sqlite(self.pool.sqlite()?, module, input).await,
            DatabaseDriver::Mysql => add_lesson_mysql(self.pool.mysql()?, module, input).await,
        }
    }

    async fn get_lesson(&self, id: i64) -> Result<Option<Lesson>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_lesson_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_lesson_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_modules(&self, course_id: i64) -> Result<Vec<CourseModule>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_modules_sqlite(self.pool.sqlite()?, course_id).await,
            DatabaseDriver::Mysql => list_modules_mysql(self.pool.mysql()?, course_id).await,
        }
    }

    async fn list_lessons(&self, course_id: i64) -> Result<Vec<Lesson>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_lessons_sqlite(self.pool.sqlite()?, course_id).await,
            DatabaseDriver::Mysql => list_lessons_mysql(self.pool.mysql()?, course_id).await,
        }
    }

    async fn lesson_count(&self, course_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM lessons WHERE course_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_by_id_sqlite(self.pool.sqlite()?, sql, course_id).await,
            DatabaseDriver::Mysql => count_by_id_mysql(self.pool.mysql()?, sql, course_id).await,
        }
    }

    async fn enrollment_count(&self, course_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM enrollments WHERE course_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_by_id_sqlite(self.pool.sqlite()?, sql, course_id).await,
            DatabaseDriver::Mysql => count_by_id_mysql(self.pool.mysql()?, sql, course_id).await,
        }
    }

    async fn instructor_stats(&self, instructor_id: i64) -> Result<InstructorStats> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                instructor_stats_sqlite(self.pool.sqlite()?, instructor_id).await
            }
            DatabaseDriver::Mysql => instructor_stats_mysql(self.pool.mysql()?, instructor_id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_course_sqlite(
    pool: &SqlitePool,
    instructor_id: i64,
    input: &CreateCourseInput,
    slug: &str,
) -> Result<Course> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO courses (instructor_id, title, slug, description, thumbnail, price_cents,
                             category, level, status, search_text, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'draft', ?, ?, ?)
        "#,
    )
    .bind(instructor_id)
    .bind(input.title.trim())
    .bind(slug)
    .bind(&input.description)
    .bind(&input.thumbnail)
    .bind(input.price_cents)
    .bind(&input.category)
    .bind(input.level.to_string())
    .bind(search_text(&[&input.title, &input.description]))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create course")?;

    Ok(Course {
        id: result.last_insert_rowid(),
        instructor_id,
        title: input.title.trim().to_string(),
        slug: slug.to_string(),
        description: input.description.clone(),
        thumbnail: input.thumbnail.clone(),
        price_cents: input.price_cents,
        category: input.category.clone(),
        level: input.level,
        status: CourseStatus::Draft,
        created_at: now,
        updated_at: now,
    })
}

async fn get_course_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get course")?;
    row.map(|r| row_to_course_sqlite(&r)).transpose()
}

async fn course_slug_exists_sqlite(pool: &SqlitePool, slug: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses WHERE slug = ?")
        .bind(slug)
        .fetch_one(pool)
        .await
        .context("Failed to check course slug")?;
    Ok(count > 0)
}

async fn update_course_sqlite(pool: &SqlitePool, course: &Course) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE courses
        SET title = ?, description = ?, thumbnail = ?, price_cents = ?, category = ?,
            level = ?, search_text = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&course.title)
    .bind(&course.description)
    .bind(&course.thumbnail)
    .bind(course.price_cents)
    .bind(&course.category)
    .bind(course.level.to_string())
    .bind(search_text(&[&course.title, &course.description]))
    .bind(Utc::now())
    .bind(course.id)
    .execute(pool)
    .await
    .context("Failed to update course")?;
    Ok(())
}

async fn set_status_sqlite(pool: &SqlitePool, id: i64, status: CourseStatus) -> Result<()> {
    sqlx::query("UPDATE courses SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update course status")?;
    Ok(())
}

async fn delete_course_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete course")?;
    Ok(result.rows_affected() > 0)
}

async fn list_published_sqlite(
    pool: &SqlitePool,
    filter: &CourseFilter,
    params: &ListParams,
) -> Result<(Vec<CourseSummary>, i64)> {
    let (clause, binds) = catalogue_filter(filter);

    let count_sql = format!("SELECT COUNT(*) FROM courses c WHERE {}", clause);
    let mut count_query = sqlx::query_scalar(&count_sql);
    for value in &binds {
        count_query = count_query.bind(value);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count courses")?;

    let sql = format!(
        "{} {} WHERE {} ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
        COURSE_SUMMARY_SELECT, COURSE_SUMMARY_FROM, clause
    );
    let mut query = sqlx::query(&sql);
    for value in &binds {
        query = query.bind(value);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list courses")?;

    let items = rows
        .iter()
        .map(row_to_course_summary_sqlite)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

async fn course_summary_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<CourseSummary>> {
    let sql = format!(
        "{} {} WHERE c.id = ?",
        COURSE_SUMMARY_SELECT, COURSE_SUMMARY_FROM
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get course summary")?;
    row.map(|r| row_to_course_summary_sqlite(&r)).transpose()
}

async fn list_by_instructor_sqlite(
    pool: &SqlitePool,
    instructor_id: i64,
) -> Result<Vec<InstructorCourse>> {
    let sql = format!(
        r#"
        SELECT {},
               (SELECT COUNT(*) FROM lessons l WHERE l.course_id = courses.id) AS lesson_count,
               (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = courses.id) AS enrollment_count
        FROM courses
        WHERE instructor_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
        COURSE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(instructor_id)
        .fetch_all(pool)
        .await
        .context("Failed to list instructor courses")?;

    rows.iter()
        .map(|row| {
            Ok(InstructorCourse {
                course: row_to_course_sqlite(row)?,
                lesson_count: row.get("lesson_count"),
                enrollment_count: row.get("enrollment_count"),
            })
        })
        .collect()
}

async fn add_module_sqlite(pool: &SqlitePool, course_id: i64, title: &str) -> Result<CourseModule> {
    let position: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM course_modules WHERE course_id = ?",
    )
    .bind(course_id)
    .fetch_one(pool)
    .await
    .context("Failed to compute module position")?;

    let result =
        sqlx::query("INSERT INTO course_modules (course_id, title, position) VALUES (?, ?, ?)")
            .bind(course_id)
            .bind(title)
            .bind(position)
            .execute(pool)
            .await
            .context("Failed to create module")?;

    Ok(CourseModule {
        id: result.last_insert_rowid(),
        course_id,
        title: title.to_string(),
        position,
    })
}

async fn get_module_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<CourseModule>> {
    let row = sqlx::query("SELECT id, course_id, title, position FROM course_modules WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get module")?;
    Ok(row.map(|r| row_to_module_sqlite(&r)))
}

async fn add_lesson_sqlite(
    pool: &SqlitePool,
    module: &CourseModule,
    input: &CreateLessonInput,
) -> Result<Lesson> {
    let position: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(position), 0) + 1 FROM lessons WHERE module_id = ?")
            .bind(module.id)
            .fetch_one(pool)
            .await
            .context("Failed to compute lesson position")?;

    let result = sqlx::query(
        r#"
        INSERT INTO lessons (module_id, course_id, title, content, video_url, duration_minutes,
                             position, is_preview)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(module.id)
    .bind(module.course_id)
    .bind(input.title.trim())
    .bind(&input.content)
    .bind(&input.video_url)
    .bind(input.duration_minutes)
    .bind(position)
    .bind(input.is_preview)
    .execute(pool)
    .await
    .context("Failed to create lesson")?;

    Ok(Lesson {
        id: result.last_insert_rowid(),
        module_id: module.id,
        course_id: module.course_id,
        title: input.title.trim().to_string(),
        content: input.content.clone(),
        video_url: input.video_url.clone(),
        duration_minutes: input.duration_minutes,
        position,
        is_preview: input.is_preview,
    })
}

async fn get_lesson_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Lesson>> {
    let sql = format!("SELECT {} FROM lessons WHERE id = ?", LESSON_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get lesson")?;
    Ok(row.map(|r| row_to_lesson_sqlite(&r)))
}

async fn list_modules_sqlite(pool: &SqlitePool, course_id: i64) -> Result<Vec<CourseModule>> {
    let rows = sqlx::query(
        "SELECT id, course_id, title, position FROM course_modules WHERE course_id = ? ORDER BY position, id",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
    .context("Failed to list modules")?;
    Ok(rows.iter().map(row_to_module_sqlite).collect())
}

async fn list_lessons_sqlite(pool: &SqlitePool, course_id: i64) -> Result<Vec<Lesson>> {
    let sql = format!(
        r#"
        SELECT l.{}
        FROM lessons l
        JOIN course_modules m ON m.id = l.module_id
        WHERE l.course_id = ?
        ORDER BY m.position, m.id, l.position, l.id
        "#,
        LESSON_COLUMNS.replace(", ", ", l.")
    );
    let rows = sqlx::query(&sql)
        .bind(course_id)
        .fetch_all(pool)
        .await
        .context("Failed to list lessons")?;
    Ok(rows.iter().map(row_to_lesson_sqlite).collect())
}

async fn count_by_id_sqlite(pool: &SqlitePool, sql: &str, id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(sql)
        .bind(id)
        .fetch_one(pool)
        .await
        .context("Failed to count rows")?;
    Ok(count)
}

async fn instructor_stats_sqlite(pool: &SqlitePool, instructor_id: i64) -> Result<InstructorStats> {
    let courses = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(CASE WHEN status = 'published' THEN 1 END) AS published
        FROM courses WHERE instructor_id = ?
        "#,
    )
    .bind(instructor_id)
    .fetch_one(pool)
    .await
    .context("Failed to count instructor courses")?;

    let students = sqlx::query(
        r#"
        SELECT COUNT(DISTINCT e.user_id) AS students, COUNT(*) AS enrollments
        FROM enrollments e
        JOIN courses c ON c.id = e.course_id
        WHERE c.instructor_id = ?
        "#,
    )
    .bind(instructor_id)
    .fetch_one(pool)
    .await
    .context("Failed to count instructor students")?;

    let revenue: i64 = sqlx::query_scalar(REVENUE_SQLITE)
        .bind(instructor_id)
        .fetch_one(pool)
        .await
        .context("Failed to sum instructor revenue")?;

    let top = sqlx::query(
        r#"
        SELECT c.id, c.title, COUNT(e.id) AS enrollments
        FROM courses c
        LEFT JOIN enrollments e ON e.course_id = c.id
        WHERE c.instructor_id = ?
        GROUP BY c.id, c.title
        ORDER BY enrollments DESC, c.id ASC
        LIMIT 5
        "#,
    )
    .bind(instructor_id)
    .fetch_all(pool)
    .await
    .context("Failed to rank instructor courses")?;

    Ok(InstructorStats {
        total_courses: courses.get("total"),
        published_courses: courses.get("published"),
        total_students: students.get("students"),
        total_enrollments: students.get("enrollments"),
        total_revenue_cents: revenue,
        top_courses: top
            .iter()
            .map(|r| CourseEnrollmentStat {
                course_id: r.get("id"),
                title: r.get("title"),
                enrollments: r.get("enrollments"),
            })
            .collect(),
    })
}

fn row_to_course_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Course> {
    let level: String = row.get("level");
    let status: String = row.get("status");
    Ok(Course {
        id: row.get("id"),
        instructor_id: row.get("instructor_id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        thumbnail: row.get("thumbnail"),
        price_cents: row.get("price_cents"),
        category: row.get("category"),
        level: CourseLevel::from_str(&level)?,
        status: CourseStatus::from_str(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a row selected with [`COURSE_SUMMARY_SELECT`]
pub(crate) fn row_to_course_summary_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CourseSummary> {
    let level: String = row.get("level");
    Ok(CourseSummary {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        thumbnail: row.get("thumbnail"),
        price_cents: row.get("price_cents"),
        category: row.get("category"),
        level: CourseLevel::from_str(&level)?,
        instructor: InstructorRef {
            id: row.get("instructor_id"),
            name: row.get("instructor_name"),
        },
        lesson_count: row.get("lesson_count"),
        enrollment_count: row.get("enrollment_count"),
        created_at: row.get("created_at"),
    })
}

fn row_to_module_sqlite(row: &sqlx::sqlite::SqliteRow) -> CourseModule {
    CourseModule {
        id: row.get("id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        position: row.get("position"),
    }
}

fn row_to_lesson_sqlite(row: &sqlx::sqlite::SqliteRow) -> Lesson {
    Lesson {
        id: row.get("id"),
        module_id: row.get("module_id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        content: row.get("content"),
        video_url: row.get("video_url"),
        duration_minutes: row.get("duration_minutes"),
        position: row.get("position"),
        is_preview: row.get("is_preview"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_course_mysql(
    pool: &MySqlPool,
    instructor_id: i64,
    input: &CreateCourseInput,
    slug: &str,
) -> Result<Course> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO courses (instructor_id, title, slug, description, thumbnail, price_cents,
                             category, level, status, search_text, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'draft', ?, ?, ?)
        "#,
    )
    .bind(instructor_id)
    .bind(input.title.trim())
    .bind(slug)
    .bind(&input.description)
    .bind(&input.thumbnail)
    .bind(input.price_cents)
    .bind(&input.category)
    .bind(input.level.to_string())
    .bind(search_text(&[&input.title, &input.description]))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create course")?;

    Ok(Course {
        id: result.last_insert_id() as i64,
        instructor_id,
        title: input.title.trim().to_string(),
        slug: slug.to_string(),
        description: input.description.clone(),
        thumbnail: input.thumbnail.clone(),
        price_cents: input.price_cents,
        category: input.category.clone(),
        level: input.level,
        status: CourseStatus::Draft,
        created_at: now,
        updated_at: now,
    })
}

async fn get_course_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get course")?;
    row.map(|r| row_to_course_mysql(&r)).transpose()
}

async fn course_slug_exists_mysql(pool: &MySqlPool, slug: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses WHERE slug = ?")
        .bind(slug)
        .fetch_one(pool)
        .await
        .context("Failed to check course slug")?;
    Ok(count > 0)
}

async fn update_course_mysql(pool: &MySqlPool, course: &Course) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE courses
        SET title = ?, description = ?, thumbnail = ?, price_cents = ?, category = ?,
            level = ?, search_text = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&course.title)
    .bind(&course.description)
    .bind(&course.thumbnail)
    .bind(course.price_cents)
    .bind(&course.category)
    .bind(course.level.to_string())
    .bind(search_text(&[&course.title, &course.description]))
    .bind(Utc::now())
    .bind(course.id)
    .execute(pool)
    .await
    .context("Failed to update course")?;
    Ok(())
}

async fn set_status_mysql(pool: &MySqlPool, id: i64, status: CourseStatus) -> Result<()> {
    sqlx::query("UPDATE courses SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update course status")?;
    Ok(())
}

async fn delete_course_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete course")?;
    Ok(result.rows_affected() > 0)
}

async fn list_published_mysql(
    pool: &MySqlPool,
    filter: &CourseFilter,
    params: &ListParams,
) -> Result<(Vec<CourseSummary>, i64)> {
    let (clause, binds) = catalogue_filter(filter);

    let count_sql = format!("SELECT COUNT(*) FROM courses c WHERE {}", clause);
    let mut count_query = sqlx::query_scalar(&count_sql);
    for value in &binds {
        count_query = count_query.bind(value);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count courses")?;

    let sql = format!(
        "{} {} WHERE {} ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
        COURSE_SUMMARY_SELECT, COURSE_SUMMARY_FROM, clause
    );
    let mut query = sqlx::query(&sql);
    for value in &binds {
        query = query.bind(value);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list courses")?;

    let items = rows
        .iter()
        .map(row_to_course_summary_mysql)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

async fn course_summary_mysql(pool: &MySqlPool, id: i64) -> Result<Option<CourseSummary>> {
    let sql = format!(
        "{} {} WHERE c.id = ?",
        COURSE_SUMMARY_SELECT, COURSE_SUMMARY_FROM
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get course summary")?;
    row.map(|r| row_to_course_summary_mysql(&r)).transpose()
}

async fn list_by_instructor_mysql(
    pool: &MySqlPool,
    instructor_id: i64,
) -> Result<Vec<InstructorCourse>> {
    let sql = format!(
        r#"
        SELECT {},
               (SELECT COUNT(*) FROM lessons l WHERE l.course_id = courses.id) AS lesson_count,
               (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = courses.id) AS enrollment_count
        FROM courses
        WHERE instructor_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
        COURSE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(instructor_id)
        .fetch_all(pool)
        .await
        .context("Failed to list instructor courses")?;

    rows.iter()
        .map(|row| {
            Ok(InstructorCourse {
                course: row_to_course_mysql(row)?,
                lesson_count: row.get("lesson_count"),
                enrollment_count: row.get("enrollment_count"),
            })
        })
        .collect()
}

async fn add_module_mysql(pool: &MySqlPool, course_id: i64, title: &str) -> Result<CourseModule> {
    let position: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM course_modules WHERE course_id = ?",
    )
    .bind(course_id)
    .fetch_one(pool)
    .await
    .context("Failed to compute module position")?;

    let result =
        sqlx::query("INSERT INTO course_modules (course_id, title, position) VALUES (?, ?, ?)")
            .bind(course_id)
            .bind(title)
            .bind(position)
            .execute(pool)
            .await
            .context("Failed to create module")?;

    Ok(CourseModule {
        id: result.last_insert_id() as i64,
        course_id,
        title: title.to_string(),
        position,
    })
}

async fn get_module_mysql(pool: &MySqlPool, id: i64) -> Result<Option<CourseModule>> {
    let row = sqlx::query("SELECT id, course_id, title, position FROM course_modules WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get module")?;
    Ok(row.map(|r| row_to_module_mysql(&r)))
}

async fn add_lesson_mysql(
    pool: &MySqlPool,
    module: &CourseModule,
    input: &CreateLessonInput,
) -> Result<Lesson> {
    let position: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(position), 0) + 1 FROM lessons WHERE module_id = ?")
            .bind(module.id)
            .fetch_one(pool)
            .await
            .context("Failed to compute lesson position")?;

    let result = sqlx::query(
        r#"
        INSERT INTO lessons (module_id, course_id, title, content, video_url, duration_minutes,
                             position, is_preview)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(module.id)
    .bind(module.course_id)
    .bind(input.title.trim())
    .bind(&input.content)
    .bind(&input.video_url)
    .bind(input.duration_minutes)
    .bind(position)
    .bind(input.is_preview)
    .execute(pool)
    .await
    .context("Failed to create lesson")?;

    Ok(Lesson {
        id: result.last_insert_id() as i64,
        module_id: module.id,
        course_id: module.course_id,
        title: input.title.trim().to_string(),
        content: input.content.clone(),
        video_url: input.video_url.clone(),
        duration_minutes: input.duration_minutes,
        position,
        is_preview: input.is_preview,
    })
}

async fn get_lesson_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Lesson>> {
    let sql = format!("SELECT {} FROM lessons WHERE id = ?", LESSON_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get lesson")?;
    Ok(row.map(|r| row_to_lesson_mysql(&r)))
}

async fn list_modules_mysql(pool: &MySqlPool, course_id: i64) -> Result<Vec<CourseModule>> {
    let rows = sqlx::query(
        "SELECT id, course_id, title, position FROM course_modules WHERE course_id = ? ORDER BY position, id",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
    .context("Failed to list modules")?;
    Ok(rows.iter().map(row_to_module_mysql).collect())
}

async fn list_lessons_mysql(pool: &MySqlPool, course_id: i64) -> Result<Vec<Lesson>> {
    let sql = format!(
        r#"
        SELECT l.{}
        FROM lessons l
        JOIN course_modules m ON m.id = l.module_id
        WHERE l.course_id = ?
        ORDER BY m.position, m.id, l.position, l.id
        "#,
        LESSON_COLUMNS.replace(", ", ", l.")
    );
    let rows = sqlx::query(&sql)
        .bind(course_id)
        .fetch_all(pool)
        .await
        .context("Failed to list lessons")?;
    Ok(rows.iter().map(row_to_lesson_mysql).collect())
}

async fn count_by_id_mysql(pool: &MySqlPool, sql: &str, id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(sql)
        .bind(id)
        .fetch_one(pool)
        .await
        .context("Failed to count rows")?;
    Ok(count)
}

async fn instructor_stats_mysql(pool: &MySqlPool, instructor_id: i64) -> Result<InstructorStats> {
    let courses = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(CASE WHEN status = 'published' THEN 1 END) AS published
        FROM courses WHERE instructor_id = ?
        "#,
    )
    .bind(instructor_id)
    .fetch_one(pool)
    .await
    .context("Failed to count instructor courses")?;

    let students = sqlx::query(
        r#"
        SELECT COUNT(DISTINCT e.user_id) AS students, COUNT(*) AS enrollments
        FROM enrollments e
        JOIN courses c ON c.id = e.course_id
        WHERE c.instructor_id = ?
        "#,
    )
    .bind(instructor_id)
    .fetch_one(pool)
    .await
    .context("Failed to count instructor students")?;

    let revenue: i64 = sqlx::query_scalar(REVENUE_MYSQL)
        .bind(instructor_id)
        .fetch_one(pool)
        .await
        .context("Failed to sum instructor revenue")?;

    let top = sqlx::query(
        r#"
        SELECT c.id, c.title, COUNT(e.id) AS enrollments
        FROM courses c
        LEFT JOIN enrollments e ON e.course_id = c.id
        WHERE c.instructor_id = ?
        GROUP BY c.id, c.title
        ORDER BY enrollments DESC, c.id ASC
        LIMIT 5
        "#,
    )
    .bind(instructor_id)
    .fetch_all(pool)
    .await
    .context("Failed to rank instructor courses")?;

    Ok(InstructorStats {
        total_courses: courses.get("total"),
        published_courses: courses.get("published"),
        total_students: students.get("students"),
        total_enrollments: students.get("enrollments"),
        total_revenue_cents: revenue,
        top_courses: top
            .iter()
            .map(|r| CourseEnrollmentStat {
                course_id: r.get("id"),
                title: r.get("title"),
                enrollments: r.get("enrollments"),
            })
            .collect(),
    })
}

fn row_to_course_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Course> {
    let level: String = row.get("level");
    let status: String = row.get("status");
    Ok(Course {
        id: row.get("id"),
        instructor_id: row.get("instructor_id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        thumbnail: row.get("thumbnail"),
        price_cents: row.get("price_cents"),
        category: row.get("category"),
        level: CourseLevel::from_str(&level)?,
        status: CourseStatus::from_str(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a row selected with [`COURSE_SUMMARY_SELECT`]
pub(crate) fn row_to_course_summary_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CourseSummary> {
    let level: String = row.get("level");
    Ok(CourseSummary {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        thumbnail: row.get("thumbnail"),
        price_cents: row.get("price_cents"),
        category: row.get("category"),
        level: CourseLevel::from_str(&level)?,
        instructor: InstructorRef {
            id: row.get("instructor_id"),
            name: row.get("instructor_name"),
        },
        lesson_count: row.get("lesson_count"),
        enrollment_count: row.get("enrollment_count"),
        created_at: row.get("created_at"),
    })
}

fn row_to_module_mysql(row: &sqlx::mysql::MySqlRow) -> CourseModule {
    CourseModule {
        id: row.get("id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        position: row.get("position"),
    }
}

fn row_to_lesson_mysql(row: &sqlx::mysql::MySqlRow) -> Lesson {
    Lesson {
        id: row.get("id"),
        module_id: row.get("module_id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        content: row.get("content"),
        video_url: row.get("video_url"),
        duration_minutes: row.get("duration_minutes"),
        position: row.get("position"),
        is_preview: row.get("is_preview"),
    }
}
