//! Blog repository
//!
//! Posts, likes and comments. The denormalised `like_count` and
//! `comment_count` columns are only changed inside the same transaction as
//! the rows they count.

use super::{contains_pattern, search_text, LIKE_ESCAPE};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    gravatar_url, Blog, BlogAuthor, BlogComment, BlogCommentView, BlogSort, BlogStatus,
    BlogSummary, LikeState, ListParams,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Blog repository trait
#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Insert a post; the id on `blog` is ignored and the new id returned
    async fn create(&self, blog: &Blog) -> Result<i64>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Blog>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Persist the editable fields of `blog`
    async fn update(&self, blog: &Blog) -> Result<()>;

    /// Delete a post with its likes and comments in one transaction
    async fn delete_cascade(&self, id: i64) -> Result<bool>;

    /// One page of published posts plus the total count
    async fn list_published(
        &self,
        sort: BlogSort,
        category: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<BlogSummary>, i64)>;

    /// Published posts whose title, excerpt or content contains `query`
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<BlogSummary>>;

    /// Published posts since `since`, best engagement first
    async fn trending(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<BlogSummary>>;

    async fn increment_view(&self, id: i64) -> Result<bool>;

    async fn is_liked(&self, blog_id: i64, user_id: i64) -> Result<bool>;

    /// Like when not liked yet, unlike otherwise
    async fn toggle_like(&self, blog_id: i64, user_id: i64) -> Result<LikeState>;

    async fn add_comment(&self, blog_id: i64, user_id: i64, content: &str) -> Result<BlogComment>;

    async fn get_comment(&self, id: i64) -> Result<Option<BlogComment>>;

    /// Comments of a post, oldest first
    async fn list_comments(&self, blog_id: i64) -> Result<Vec<BlogCommentView>>;

    async fn delete_comment(&self, id: i64) -> Result<bool>;
}

pub struct SqlxBlogRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }
}

const BLOG_COLUMNS: &str = "id, author_id, title, slug, excerpt, content, content_html, category, \
     cover_image, status, view_count, like_count, comment_count, published_at, created_at, updated_at";

const BLOG_SUMMARY_SELECT: &str = r#"
    SELECT b.id, b.title, b.slug, b.excerpt, b.category, b.cover_image,
           b.view_count, b.like_count, b.comment_count, b.published_at, b.created_at,
           u.id AS author_id, u.name AS author_name, u.email AS author_email,
           u.image_url AS author_image
    FROM blogs b
    JOIN users u ON u.id = b.author_id
"#;

const TRENDING_ORDER: &str =
    "(b.view_count + 3 * b.like_count + 5 * b.comment_count) DESC, \
     COALESCE(b.published_at, b.created_at) DESC, b.id DESC";

const DECREMENT_COMMENTS_SQLITE: &str =
    "UPDATE blogs SET comment_count = MAX(0, comment_count - 1) WHERE id = ?";
const DECREMENT_COMMENTS_MYSQL: &str =
    "UPDATE blogs SET comment_count = GREATEST(0, comment_count - 1) WHERE id = ?";
const DECREMENT_LIKES_SQLITE: &str =
    "UPDATE blogs SET like_count = MAX(0, like_count - 1) WHERE id = ?";
const DECREMENT_LIKES_MYSQL: &str =
    "UPDATE blogs SET like_count = GREATEST(0, like_count - 1) WHERE id = ?";

fn blog_search_text(blog: &Blog) -> String {
    search_text(&[
        &blog.title,
        blog.excerpt.as_deref().unwrap_or_default(),
        &blog.content,
    ])
}

fn author_block(id: i64, name: String, email: &str, image: Option<String>) -> BlogAuthor {
    BlogAuthor {
        id,
        name,
        avatar_url: image
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| gravatar_url(email)),
    }
}

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create(&self, blog: &Blog) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_blog_sqlite(self.pool.sqlite()?, blog).await,
            DatabaseDriver::Mysql => create_blog_mysql(self.pool.mysql()?, blog).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_blog_sqlite(self.pool.sqlite()?, "id", id).await,
            DatabaseDriver::Mysql => find_blog_mysql(self.pool.mysql()?, "id", id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Blog>> {
        let slug = slug.to_string();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_blog_sqlite(self.pool.sqlite()?, "slug", slug).await,
            DatabaseDriver::Mysql => find_blog_mysql(self.pool.mysql()?, "slug", slug).await,
        }
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.get_by_slug(slug).await?.is_some())
    }

    async fn update(&self, blog: &Blog) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_blog_sqlite(self.pool.sqlite()?, blog).await,
            DatabaseDriver::Mysql => update_blog_mysql(self.pool.mysql()?, blog).await,
        }
    }

    async fn delete_cascade(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_blog_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_blog_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_published(
        &self,
        sort: BlogSort,
        category: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<BlogSummary>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_blogs_sqlite(self.pool.sqlite()?, sort, category, params).await
            }
            DatabaseDriver::Mysql => {
                list_blogs_mysql(self.pool.mysql()?, sort, category, params).await
            }
        }
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<BlogSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => search_blogs_sqlite(self.pool.sqlite()?, query, limit).await,
            DatabaseDriver::Mysql => search_blogs_mysql(self.pool.mysql()?, query, limit).await,
        }
    }

    async fn trending(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<BlogSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => trending_sqlite(self.pool.sqlite()?, since, limit).await,
            DatabaseDriver::Mysql => trending_mysql(self.pool.mysql()?, since, limit).await,
        }
    }

    async fn increment_view(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => increment_view_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => increment_view_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn is_liked(&self, blog_id: i64, user_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => is_liked_sqlite(self.pool.sqlite()?, blog_id, user_id).await,
            DatabaseDriver::Mysql => is_liked_mysql(self.pool.mysql()?, blog_id, user_id).await,
        }
    }

    async fn toggle_like(&self, blog_id: i64, user_id: i64) -> Result<LikeState> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                toggle_like_sqlite(self.pool.sqlite()?, blog_id, user_id).await
            }
            DatabaseDriver::Mysql => toggle_like_mysql(self.pool.mysql()?, blog_id, user_id).await,
        }
    }

    async fn add_comment(&self, blog_id: i64, user_id: i64, content: &str) -> Result<BlogComment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                add_comment_sqlite(self.pool.sqlite()?, blog_id, user_id, content).await
            }
            DatabaseDriver::Mysql => {
                add_comment_mysql(self.pool.mysql()?, blog_id, user_id, content).await
            }
        }
    }

    async fn get_comment(&self, id: i64) -> Result<Option<BlogComment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_comment_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_comment_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_comments(&self, blog_id: i64) -> Result<Vec<BlogCommentView>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_comments_sqlite(self.pool.sqlite()?, blog_id).await,
            DatabaseDriver::Mysql => list_comments_mysql(self.pool.mysql()?, blog_id).await,
        }
    }

    async fn delete_comment(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_comment_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_comment_mysql(self.pool.mysql()?, id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_blog_sqlite(pool: &SqlitePool, blog: &Blog) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO blogs (author_id, title, slug, excerpt, content, content_html, category,
                           cover_image, status, search_text, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(blog.author_id)
    .bind(&blog.title)
    .bind(&blog.slug)
    .bind(&blog.excerpt)
    .bind(&blog.content)
    .bind(&blog.content_html)
    .bind(&blog.category)
    .bind(&blog.cover_image)
    .bind(blog.status.to_string())
    .bind(blog_search_text(blog))
    .bind(blog.published_at)
    .bind(blog.created_at)
    .bind(blog.updated_at)
    .execute(pool)
    .await
    .context("Failed to create blog post")?;

    Ok(result.last_insert_rowid())
}

async fn find_blog_sqlite<T>(pool: &SqlitePool, column: &str, value: T) -> Result<Option<Blog>>
where
    T: for<'q> sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite> + Send + 'static,
{
    let sql = format!("SELECT {} FROM blogs WHERE {} = ?", BLOG_COLUMNS, column);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get blog post by {}", column))?;
    row.map(|r| row_to_blog_sqlite(&r)).transpose()
}

async fn update_blog_sqlite(pool: &SqlitePool, blog: &Blog) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE blogs
        SET title = ?, slug = ?, excerpt = ?, content = ?, content_html = ?, category = ?,
            cover_image = ?, status = ?, search_text = ?, published_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&blog.title)
    .bind(&blog.slug)
    .bind(&blog.excerpt)
    .bind(&blog.content)
    .bind(&blog.content_html)
    .bind(&blog.category)
    .bind(&blog.cover_image)
    .bind(blog.status.to_string())
    .bind(blog_search_text(blog))
    .bind(blog.published_at)
    .bind(Utc::now())
    .bind(blog.id)
    .execute(pool)
    .await
    .context("Failed to update blog post")?;
    Ok(())
}

async fn delete_blog_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM blog_likes WHERE blog_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete blog likes")?;
    sqlx::query("DELETE FROM blog_comments WHERE blog_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete blog comments")?;
    let result = sqlx::query("DELETE FROM blogs WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete blog post")?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

async fn list_blogs_sqlite(
    pool: &SqlitePool,
    sort: BlogSort,
    category: Option<&str>,
    params: &ListParams,
) -> Result<(Vec<BlogSummary>, i64)> {
    let mut clause = String::from("b.status = 'published'");
    if category.is_some() {
        clause.push_str(" AND b.category = ?");
    }

    let count_sql = format!("SELECT COUNT(*) FROM blogs b WHERE {}", clause);
    let mut count_query = sqlx::query_scalar(&count_sql);
    if let Some(category) = category {
        count_query = count_query.bind(category);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count blog posts")?;

    let sql = format!(
        "{} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        BLOG_SUMMARY_SELECT,
        clause,
        sort.order_by()
    );
    let mut query = sqlx::query(&sql);
    if let Some(category) = category {
        query = query.bind(category);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list blog posts")?;

    Ok((rows.iter().map(row_to_blog_summary_sqlite).collect(), total))
}

async fn search_blogs_sqlite(pool: &SqlitePool, query: &str, limit: i64) -> Result<Vec<BlogSummary>> {
    let sql = format!(
        r#"
        {}
        WHERE b.status = 'published' AND b.search_text LIKE ? ESCAPE '{}'
        ORDER BY {}
        LIMIT ?
        "#,
        BLOG_SUMMARY_SELECT,
        LIKE_ESCAPE,
        BlogSort::Latest.order_by()
    );
    let rows = sqlx::query(&sql)
        .bind(contains_pattern(query))
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to search blog posts")?;
    Ok(rows.iter().map(row_to_blog_summary_sqlite).collect())
}

async fn trending_sqlite(
    pool: &SqlitePool,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<BlogSummary>> {
    let sql = format!(
        "{} WHERE b.status = 'published' AND b.published_at >= ? ORDER BY {} LIMIT ?",
        BLOG_SUMMARY_SELECT, TRENDING_ORDER
    );
    let rows = sqlx::query(&sql)
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to load trending posts")?;
    Ok(rows.iter().map(row_to_blog_summary_sqlite).collect())
}

async fn increment_view_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE blogs SET view_count = view_count + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to increment view count")?;
    Ok(result.rows_affected() > 0)
}

async fn is_liked_sqlite(pool: &SqlitePool, blog_id: i64, user_id: i64) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM blog_likes WHERE blog_id = ? AND user_id = ?")
            .bind(blog_id)
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("Failed to check like")?;
    Ok(count > 0)
}

async fn toggle_like_sqlite(pool: &SqlitePool, blog_id: i64, user_id: i64) -> Result<LikeState> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM blog_likes WHERE blog_id = ? AND user_id = ?")
        .bind(blog_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to remove like")?
        .rows_affected()
        > 0;

    if removed {
        sqlx::query(DECREMENT_LIKES_SQLITE)
            .bind(blog_id)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query("INSERT INTO blog_likes (blog_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(blog_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .context("Failed to add like")?;
        sqlx::query("UPDATE blogs SET like_count = like_count + 1 WHERE id = ?")
            .bind(blog_id)
            .execute(&mut *tx)
            .await?;
    }

    let like_count: i64 = sqlx::query_scalar("SELECT like_count FROM blogs WHERE id = ?")
        .bind(blog_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to read like count")?;

    tx.commit().await?;
    Ok(LikeState {
        liked: !removed,
        like_count,
    })
}

async fn add_comment_sqlite(
    pool: &SqlitePool,
    blog_id: i64,
    user_id: i64,
    content: &str,
) -> Result<BlogComment> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO blog_comments (blog_id, user_id, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(blog_id)
    .bind(user_id)
    .bind(content)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create comment")?;
    sqlx::query("UPDATE blogs SET comment_count = comment_count + 1 WHERE id = ?")
        .bind(blog_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(BlogComment {
        id: result.last_insert_rowid(),
        blog_id,
        user_id,
        content: content.to_string(),
        created_at: now,
    })
}

async fn get_comment_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<BlogComment>> {
    let row = sqlx::query(
        "SELECT id, blog_id, user_id, content, created_at FROM blog_comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get comment")?;

    Ok(row.map(|r| BlogComment {
        id: r.get("id"),
        blog_id: r.get("blog_id"),
        user_id: r.get("user_id"),
        content: r.get("content"),
        created_at: r.get("created_at"),
    }))
}

async fn list_comments_sqlite(pool: &SqlitePool, blog_id: i64) -> Result<Vec<BlogCommentView>> {
    let rows = sqlx::query(
        r#"
        SELECT bc.id, bc.blog_id, bc.content, bc.created_at,
               u.id AS author_id, u.name AS author_name, u.email AS author_email,
               u.image_url AS author_image
        FROM blog_comments bc
        JOIN users u ON u.id = bc.user_id
        WHERE bc.blog_id = ?
        ORDER BY bc.created_at ASC, bc.id ASC
        "#,
    )
    .bind(blog_id)
    .fetch_all(pool)
    .await
    .context("Failed to list comments")?;

    Ok(rows
        .iter()
        .map(|r| {
            let email: String = r.get("author_email");
            BlogCommentView {
                id: r.get("id"),
                blog_id: r.get("blog_id"),
                content: r.get("content"),
                created_at: r.get("created_at"),
                author: author_block(
                    r.get("author_id"),
                    r.get("author_name"),
                    &email,
                    r.get("author_image"),
                ),
            }
        })
        .collect())
}

async fn delete_comment_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let blog_id: Option<i64> = sqlx::query_scalar("SELECT blog_id FROM blog_comments WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to look up comment")?;
    let Some(blog_id) = blog_id else {
        return Ok(false);
    };

    sqlx::query("DELETE FROM blog_comments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete comment")?;
    sqlx::query(DECREMENT_COMMENTS_SQLITE)
        .bind(blog_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

fn row_to_blog_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Blog> {
    let status: String = row.get("status");
    Ok(Blog {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        slug: row.get("slug"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        category: row.get("category"),
        cover_image: row.get("cover_image"),
        status: BlogStatus::from_str(&status)?,
        view_count: row.get("view_count"),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_blog_summary_sqlite(row: &sqlx::sqlite::SqliteRow) -> BlogSummary {
    let email: String = row.get("author_email");
    BlogSummary {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        excerpt: row.get("excerpt"),
        category: row.get("category"),
        cover_image: row.get("cover_image"),
        author: author_block(
            row.get("author_id"),
            row.get("author_name"),
            &email,
            row.get("author_image"),
        ),
        view_count: row.get("view_count"),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_blog_mysql(pool: &MySqlPool, blog: &Blog) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO blogs (author_id, title, slug, excerpt, content, content_html, category,
                           cover_image, status, search_text, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(blog.author_id)
    .bind(&blog.title)
    .bind(&blog.slug)
    .bind(&blog.excerpt)
    .bind(&blog.content)
    .bind(&blog.content_html)
    .bind(&blog.category)
    .bind(&blog.cover_image)
    .bind(blog.status.to_string())
    .bind(blog_search_text(blog))
    .bind(blog.published_at)
    .bind(blog.created_at)
    .bind(blog.updated_at)
    .execute(pool)
    .await
    .context("Failed to create blog post")?;

    Ok(result.last_insert_id() as i64)
}

async fn find_blog_mysql<T>(pool: &MySqlPool, column: &str, value: T) -> Result<Option<Blog>>
where
    T: for<'q> sqlx::Encode<'q, sqlx::MySql> + sqlx::Type<sqlx::MySql> + Send + 'static,
{
    let sql = format!("SELECT {} FROM blogs WHERE {} = ?", BLOG_COLUMNS, column);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get blog post by {}", column))?;
    row.map(|r| row_to_blog_mysql(&r)).transpose()
}

async fn update_blog_mysql(pool: &MySqlPool, blog: &Blog) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE blogs
        SET title = ?, slug = ?, excerpt = ?, content = ?, content_html = ?, category = ?,
            cover_image = ?, status = ?, search_text = ?, published_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&blog.title)
    .bind(&blog.slug)
    .bind(&blog.excerpt)
    .bind(&blog.content)
    .bind(&blog.content_html)
    .bind(&blog.category)
    .bind(&blog.cover_image)
    .bind(blog.status.to_string())
    .bind(blog_search_text(blog))
    .bind(blog.published_at)
    .bind(Utc::now())
    .bind(blog.id)
    .execute(pool)
    .await
    .context("Failed to update blog post")?;
    Ok(())
}

async fn delete_blog_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM blog_likes WHERE blog_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete blog likes")?;
    sqlx::query("DELETE FROM blog_comments WHERE blog_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete blog comments")?;
    let result = sqlx::query("DELETE FROM blogs WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete blog post")?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

async fn list_blogs_mysql(
    pool: &MySqlPool,
    sort: BlogSort,
    category: Option<&str>,
    params: &ListParams,
) -> Result<(Vec<BlogSummary>, i64)> {
    let mut clause = String::from("b.status = 'published'");
    if category.is_some() {
        clause.push_str(" AND b.category = ?");
    }

    let count_sql = format!("SELECT COUNT(*) FROM blogs b WHERE {}", clause);
    let mut count_query = sqlx::query_scalar(&count_sql);
    if let Some(category) = category {
        count_query = count_query.bind(category);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count blog posts")?;

    let sql = format!(
        "{} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        BLOG_SUMMARY_SELECT,
        clause,
        sort.order_by()
    );
    let mut query = sqlx::query(&sql);
    if let Some(category) = category {
        query = query.bind(category);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list blog posts")?;

    Ok((rows.iter().map(row_to_blog_summary_mysql).collect(), total))
}

async fn search_blogs_mysql(pool: &MySqlPool, query: &str, limit: i64) -> Result<Vec<BlogSummary>> {
    let sql = format!(
        r#"
        {}
        WHERE b.status = 'published' AND b.search_text LIKE ? ESCAPE '{}'
        ORDER BY {}
        LIMIT ?
        "#,
        BLOG_SUMMARY_SELECT,
        LIKE_ESCAPE,
        BlogSort::Latest.order_by()
    );
    let rows = sqlx::query(&sql)
        .bind(contains_pattern(query))
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to search blog posts")?;
    Ok(rows.iter().map(row_to_blog_summary_mysql).collect())
}

async fn trending_mysql(
    pool: &MySqlPool,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<BlogSummary>> {
    let sql = format!(
        "{} WHERE b.status = 'published' AND b.published_at >= ? ORDER BY {} LIMIT ?",
        BLOG_SUMMARY_SELECT, TRENDING_ORDER
    );
    let rows = sqlx::query(&sql)
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to load trending posts")?;
    Ok(rows.iter().map(row_to_blog_summary_mysql).collect())
}

async fn increment_view_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE blogs SET view_count = view_count + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to increment view count")?;
    Ok(result.rows_affected() > 0)
}

async fn is_liked_mysql(pool: &MySqlPool, blog_id: i64, user_id: i64) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM blog_likes WHERE blog_id = ? AND user_id = ?")
            .bind(blog_id)
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("Failed to check like")?;
    Ok(count > 0)
}

async fn toggle_like_mysql(pool: &MySqlPool, blog_id: i64, user_id: i64) -> Result<LikeState> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM blog_likes WHERE blog_id = ? AND user_id = ?")
        .bind(blog_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to remove like")?
        .rows_affected()
        > 0;

    if removed {
        sqlx::query(DECREMENT_LIKES_MYSQL)
            .bind(blog_id)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query("INSERT INTO blog_likes (blog_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(blog_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .context("Failed to add like")?;
        sqlx::query("UPDATE blogs SET like_count = like_count + 1 WHERE id = ?")
            .bind(blog_id)
            .execute(&mut *tx)
            .await?;
    }

    let like_count: i64 = sqlx::query_scalar("SELECT like_count FROM blogs WHERE id = ?")
        .bind(blog_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to read like count")?;

    tx.commit().await?;
    Ok(LikeState {
        liked: !removed,
        like_count,
    })
}

async fn add_comment_mysql(
    pool: &MySqlPool,
    blog_id: i64,
    user_id: i64,
    content: &str,
) -> Result<BlogComment> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO blog_comments (blog_id, user_id, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(blog_id)
    .bind(user_id)
    .bind(content)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create comment")?;
    sqlx::query("UPDATE blogs SET comment_count = comment_count + 1 WHERE id = ?")
        .bind(blog_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(BlogComment {
        id: result.last_insert_id() as i64,
        blog_id,
        user_id,
        content: content.to_string(),
        created_at: now,
    })
}

async fn get_comment_mysql(pool: &MySqlPool, id: i64) -> Result<Option<BlogComment>> {
    let row = sqlx::query(
        "SELECT id, blog_id, user_id, content, created_at FROM blog_comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get comment")?;

    Ok(row.map(|r| BlogComment {
        id: r.get("id"),
        blog_id: r.get("blog_id"),
        user_id: r.get("user_id"),
        content: r.get("content"),
        created_at: r.get("created_at"),
    }))
}

async fn list_comments_mysql(pool: &MySqlPool, blog_id: i64) -> Result<Vec<BlogCommentView>> {
    let rows = sqlx::query(
        r#"
        SELECT bc.id, bc.blog_id, bc.content, bc.created_at,
               u.id AS author_id, u.name AS author_name, u.email AS author_email,
               u.image_url AS author_image
        FROM blog_comments bc
        JOIN users u ON u.id = bc.user_id
        WHERE bc.blog_id = ?
        ORDER BY bc.created_at ASC, bc.id ASC
        "#,
    )
    .bind(blog_id)
    .fetch_all(pool)
    .await
    .context("Failed to list comments")?;

    Ok(rows
        .iter()
        .map(|r| {
            let email: String = r.get("author_email");
            BlogCommentView {
                id: r.get("id"),
                blog_id: r.get("blog_id"),
                content: r.get("content"),
                created_at: r.get("created_at"),
                author: author_block(
                    r.get("author_id"),
                    r.get("author_name"),
                    &email,
                    r.get("author_image"),
                ),
            }
        })
        .collect())
}

async fn delete_comment_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let blog_id: Option<i64> = sqlx::query_scalar("SELECT blog_id FROM blog_comments WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to look up comment")?;
    let Some(blog_id) = blog_id else {
        return Ok(false);
    };

    sqlx::query("DELETE FROM blog_comments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete comment")?;
    sqlx::query(DECREMENT_COMMENTS_MYSQL)
        .bind(blog_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

fn row_to_blog_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Blog> {
    let status: String = row.get("status");
    Ok(Blog {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        slug: row.get("slug"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        category: row.get("category"),
        cover_image: row.get("cover_image"),
        status: BlogStatus::from_str(&status)?,
        view_count: row.get("view_count"),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_blog_summary_mysql(row: &sqlx::mysql::MySqlRow) -> BlogSummary {
    let email: String = row.get("author_email");
    BlogSummary {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        excerpt: row.get("excerpt"),
        category: row.get("category"),
        cover_image: row.get("cover_image"),
        author: author_block(
            row.get("author_id"),
            row.get("author_name"),
            &email,
            row.get("author_image"),
        ),
        view_count: row.get("view_count"),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
    }
}
