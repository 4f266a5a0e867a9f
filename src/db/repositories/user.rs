//! User repository
//!
//! Users, their instructor/student profiles, and account removal.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreateUserInput, InstructorProfile, StudentProfile, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, input: &CreateUserInput) -> Result<User>;

    /// Create a user provisioned by the auth provider
    async fn create_external(
        &self,
        external_id: &str,
        email: &str,
        name: &str,
        image_url: Option<&str>,
        role: UserRole,
    ) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>>;

    /// Overwrite the provider-managed identity fields of a user
    async fn update_identity(
        &self,
        id: i64,
        external_id: &str,
        email: &str,
        name: &str,
        image_url: Option<&str>,
    ) -> Result<()>;

    async fn update_role(&self, id: i64, role: UserRole) -> Result<()>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// Delete a user and everything they own, keeping blog counters in step
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn get_instructor_profile(&self, user_id: i64) -> Result<Option<InstructorProfile>>;

    /// Create the instructor profile if missing
    async fn ensure_instructor_profile(&self, user_id: i64) -> Result<()>;

    async fn get_student_profile(&self, user_id: i64) -> Result<Option<StudentProfile>>;

    /// Create the student profile if missing
    async fn ensure_student_profile(&self, user_id: i64) -> Result<()>;
}

/// SQLx-based user repository (SQLite and MySQL)
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str =
    "id, external_id, email, name, image_url, password_hash, role, created_at, updated_at";

const INSERT_INSTRUCTOR_PROFILE_SQLITE: &str =
    "INSERT OR IGNORE INTO instructor_profiles (user_id) VALUES (?)";
const INSERT_INSTRUCTOR_PROFILE_MYSQL: &str =
    "INSERT IGNORE INTO instructor_profiles (user_id) VALUES (?)";
const INSERT_STUDENT_PROFILE_SQLITE: &str =
    "INSERT OR IGNORE INTO student_profiles (user_id) VALUES (?)";
const INSERT_STUDENT_PROFILE_MYSQL: &str =
    "INSERT IGNORE INTO student_profiles (user_id) VALUES (?)";

const RELEASE_LIKES_SQLITE: &str = r#"
    UPDATE blogs SET like_count = MAX(0, like_count - 1)
    WHERE id IN (SELECT blog_id FROM blog_likes WHERE user_id = ?)
"#;
const RELEASE_LIKES_MYSQL: &str = r#"
    UPDATE blogs SET like_count = GREATEST(0, like_count - 1)
    WHERE id IN (SELECT blog_id FROM blog_likes WHERE user_id = ?)
"#;
const RELEASE_COMMENTS_SQLITE: &str = r#"
    UPDATE blogs SET comment_count = MAX(0, comment_count -
        (SELECT COUNT(*) FROM blog_comments bc WHERE bc.blog_id = blogs.id AND bc.user_id = ?))
    WHERE id IN (SELECT blog_id FROM blog_comments WHERE user_id = ?)
"#;
const RELEASE_COMMENTS_MYSQL: &str = r#"
    UPDATE blogs SET comment_count = GREATEST(0, comment_count -
        (SELECT COUNT(*) FROM blog_comments bc WHERE bc.blog_id = blogs.id AND bc.user_id = ?))
    WHERE id IN (SELECT blog_id FROM blog_comments WHERE user_id = ?)
"#;

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn create_external(
        &self,
        external_id: &str,
        email: &str,
        name: &str,
        image_url: Option<&str>,
        role: UserRole,
    ) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_external_sqlite(self.pool.sqlite()?, external_id, email, name, image_url, role)
                    .await
            }
            DatabaseDriver::Mysql => {
                create_external_mysql(self.pool.mysql()?, external_id, email, name, image_url, role)
                    .await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_user_sqlite(self.pool.sqlite()?, "id", id).await,
            DatabaseDriver::Mysql => find_user_mysql(self.pool.mysql()?, "id", id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_user_sqlite(self.pool.sqlite()?, "email", email).await,
            DatabaseDriver::Mysql => find_user_mysql(self.pool.mysql()?, "email", email).await,
        }
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        let external_id = external_id.to_string();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_user_sqlite(self.pool.sqlite()?, "external_id", external_id).await
            }
            DatabaseDriver::Mysql => {
                find_user_mysql(self.pool.mysql()?, "external_id", external_id).await
            }
        }
    }

    async fn update_identity(
        &self,
        id: i64,
        external_id: &str,
        email: &str,
        name: &str,
        image_url: Option<&str>,
    ) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_identity_sqlite(self.pool.sqlite()?, id, external_id, email, name, image_url)
                    .await
            }
            DatabaseDriver::Mysql => {
                update_identity_mysql(self.pool.mysql()?, id, external_id, email, name, image_url)
                    .await
            }
        }
    }

    async fn update_role(&self, id: i64, role: UserRole) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_role_sqlite(self.pool.sqlite()?, id, role).await,
            DatabaseDriver::Mysql => update_role_mysql(self.pool.mysql()?, id, role).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_users_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => count_users_mysql(self.pool.mysql()?).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_user_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_user_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_instructor_profile(&self, user_id: i64) -> Result<Option<InstructorProfile>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_instructor_profile_sqlite(self.pool.sqlite()?, user_id).await
            }
            DatabaseDriver::Mysql => get_instructor_profile_mysql(self.pool.mysql()?, user_id).await,
        }
    }

    async fn ensure_instructor_profile(&self, user_id: i64) -> Result<()> {
        let sql = match self.pool.driver() {
            DatabaseDriver::Sqlite => INSERT_INSTRUCTOR_PROFILE_SQLITE,
            DatabaseDriver::Mysql => INSERT_INSTRUCTOR_PROFILE_MYSQL,
        };
        self.execute_for_user(sql, user_id)
            .await
            .context("Failed to create instructor profile")
    }

    async fn get_student_profile(&self, user_id: i64) -> Result<Option<StudentProfile>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_student_profile_sqlite(self.pool.sqlite()?, user_id).await,
            DatabaseDriver::Mysql => get_student_profile_mysql(self.pool.mysql()?, user_id).await,
        }
    }

    async fn ensure_student_profile(&self, user_id: i64) -> Result<()> {
        let sql = match self.pool.driver() {
            DatabaseDriver::Sqlite => INSERT_STUDENT_PROFILE_SQLITE,
            DatabaseDriver::Mysql => INSERT_STUDENT_PROFILE_MYSQL,
        };
        self.execute_for_user(sql, user_id)
            .await
            .context("Failed to create student profile")
    }
}

impl SqlxUserRepository {
    async fn execute_for_user(&self, sql: &str, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(user_id)
                    .execute(self.pool.sqlite()?)
                    .await?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(user_id)
                    .execute(self.pool.mysql()?)
                    .await?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();
    let email = input.email.trim().to_lowercase();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, name, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&email)
    .bind(&input.name)
    .bind(&input.password_hash)
    .bind(input.role.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        external_id: None,
        email,
        name: input.name.clone(),
        image_url: None,
        password_hash: input.password_hash.clone(),
        role: input.role,
        created_at: now,
        updated_at: now,
    })
}

async fn create_external_sqlite(
    pool: &SqlitePool,
    external_id: &str,
    email: &str,
    name: &str,
    image_url: Option<&str>,
    role: UserRole,
) -> Result<User> {
    let now = Utc::now();
    let email = email.trim().to_lowercase();

    let result = sqlx::query(
        r#"
        INSERT INTO users (external_id, email, name, image_url, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(external_id)
    .bind(&email)
    .bind(name)
    .bind(image_url)
    .bind(role.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create external user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        external_id: Some(external_id.to_string()),
        email,
        name: name.to_string(),
        image_url: image_url.map(str::to_string),
        password_hash: None,
        role,
        created_at: now,
        updated_at: now,
    })
}

async fn find_user_sqlite<T>(pool: &SqlitePool, column: &str, value: T) -> Result<Option<User>>
where
    T: for<'q> sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite> + Send + 'static,
{
    let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", column))?;

    row.map(|r| row_to_user_sqlite(&r)).transpose()
}

async fn update_identity_sqlite(
    pool: &SqlitePool,
    id: i64,
    external_id: &str,
    email: &str,
    name: &str,
    image_url: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET external_id = ?, email = ?, name = ?, image_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(external_id)
    .bind(email.trim().to_lowercase())
    .bind(name)
    .bind(image_url)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update user identity")?;
    Ok(())
}

async fn update_role_sqlite(pool: &SqlitePool, id: i64, role: UserRole) -> Result<()> {
    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update user role")?;
    Ok(())
}

async fn count_users_sqlite(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;
    Ok(count)
}

async fn delete_user_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query(RELEASE_LIKES_SQLITE)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to release user likes")?;
    sqlx::query(RELEASE_COMMENTS_SQLITE)
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to release user comments")?;
    sqlx::query("DELETE FROM blog_likes WHERE user_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM blog_comments WHERE user_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete user")?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

async fn get_instructor_profile_sqlite(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<InstructorProfile>> {
    let row = sqlx::query(
        "SELECT user_id, headline, bio, website FROM instructor_profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get instructor profile")?;

    Ok(row.map(|r| InstructorProfile {
        user_id: r.get("user_id"),
        headline: r.get("headline"),
        bio: r.get("bio"),
        website: r.get("website"),
    }))
}

async fn get_student_profile_sqlite(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<StudentProfile>> {
    let row = sqlx::query("SELECT user_id, interests FROM student_profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get student profile")?;

    Ok(row.map(|r| StudentProfile {
        user_id: r.get("user_id"),
        interests: r.get("interests"),
    }))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        external_id: row.get("external_id"),
        email: row.get("email"),
        name: row.get("name"),
        image_url: row.get("image_url"),
        password_hash: row.get("password_hash"),
        role,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();
    let email = input.email.trim().to_lowercase();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, name, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&email)
    .bind(&input.name)
    .bind(&input.password_hash)
    .bind(input.role.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        external_id: None,
        email,
        name: input.name.clone(),
        image_url: None,
        password_hash: input.password_hash.clone(),
        role: input.role,
        created_at: now,
        updated_at: now,
    })
}

async fn create_external_mysql(
    pool: &MySqlPool,
    external_id: &str,
    email: &str,
    name: &str,
    image_url: Option<&str>,
    role: UserRole,
) -> Result<User> {
    let now = Utc::now();
    let email = email.trim().to_lowercase();

    let result = sqlx::query(
        r#"
        INSERT INTO users (external_id, email, name, image_url, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(external_id)
    .bind(&email)
    .bind(name)
    .bind(image_url)
    .bind(role.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create external user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        external_id: Some(external_id.to_string()),
        email,
        name: name.to_string(),
        image_url: image_url.map(str::to_string),
        password_hash: None,
        role,
        created_at: now,
        updated_at: now,
    })
}

async fn find_user_mysql<T>(pool: &MySqlPool, column: &str, value: T) -> Result<Option<User>>
where
    T: for<'q> sqlx::Encode<'q, sqlx::MySql> + sqlx::Type<sqlx::MySql> + Send + 'static,
{
    let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", column))?;

    row.map(|r| row_to_user_mysql(&r)).transpose()
}

async fn update_identity_mysql(
    pool: &MySqlPool,
    id: i64,
    external_id: &str,
    email: &str,
    name: &str,
    image_url: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET external_id = ?, email = ?, name = ?, image_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(external_id)
    .bind(email.trim().to_lowercase())
    .bind(name)
    .bind(image_url)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update user identity")?;
    Ok(())
}

async fn update_role_mysql(pool: &MySqlPool, id: i64, role: UserRole) -> Result<()> {
    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update user role")?;
    Ok(())
}

async fn count_users_mysql(pool: &MySqlPool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;
    Ok(count)
}

async fn delete_user_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query(RELEASE_LIKES_MYSQL)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to release user likes")?;
    sqlx::query(RELEASE_COMMENTS_MYSQL)
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to release user comments")?;
    sqlx::query("DELETE FROM blog_likes WHERE user_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM blog_comments WHERE user_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete user")?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

async fn get_instructor_profile_mysql(
    pool: &MySqlPool,
    user_id: i64,
) -> Result<Option<InstructorProfile>> {
    let row = sqlx::query(
        "SELECT user_id, headline, bio, website FROM instructor_profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get instructor profile")?;

    Ok(row.map(|r| InstructorProfile {
        user_id: r.get("user_id"),
        headline: r.get("headline"),
        bio: r.get("bio"),
        website: r.get("website"),
    }))
}

async fn get_student_profile_mysql(
    pool: &MySqlPool,
    user_id: i64,
) -> Result<Option<StudentProfile>> {
    let row = sqlx::query("SELECT user_id, interests FROM student_profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get student profile")?;

    Ok(row.map(|r| StudentProfile {
        user_id: r.get("user_id"),
        interests: r.get("interests"),
    }))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        external_id: row.get("external_id"),
        email: row.get("email"),
        name: row.get("name"),
        image_url: row.get("image_url"),
        password_hash: row.get("password_hash"),
        role,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    fn input(email: &str) -> CreateUserInput {
        CreateUserInput {
            email: email.to_string(),
            name: "Test User".to_string(),
            password_hash: Some("hash".to_string()),
            role: UserRole::Student,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create(&input("Test@Example.com")).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.email, "test@example.com");

        let found = repo.get_by_id(created.id).await.unwrap().expect("User not found");
        assert_eq!(found.name, "Test User");
        assert_eq!(found.role, UserRole::Student);
        assert_eq!(found.password_hash.as_deref(), Some("hash"));

        let by_email = repo.get_by_email(" TEST@example.com ").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_get_missing_user() {
        let (_pool, repo) = setup_test_repo().await;
        assert!(repo.get_by_id(999).await.unwrap().is_none());
        assert!(repo.get_by_external_id("user_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_external_user_lifecycle() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo
            .create_external("user_abc", "ext@example.com", "Ext", None, UserRole::Student)
            .await
            .unwrap();
        assert!(created.password_hash.is_none());

        repo.update_identity(
            created.id,
            "user_abc",
            "new@example.com",
            "Renamed",
            Some("https://img.example.com/a.png"),
        )
        .await
        .unwrap();

        let found = repo.get_by_external_id("user_abc").await.unwrap().unwrap();
        assert_eq!(found.email, "new@example.com");
        assert_eq!(found.name, "Renamed");
        assert_eq!(found.image_url.as_deref(), Some("https://img.example.com/a.png"));
    }

    #[tokio::test]
    async fn test_update_role_and_count() {
        let (_pool, repo) = setup_test_repo().await;
        let a = repo.create(&input("a@example.com")).await.unwrap();
        repo.create(&input("b@example.com")).await.unwrap();

        repo.update_role(a.id, UserRole::Instructor).await.unwrap();
        let a = repo.get_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(a.role, UserRole::Instructor);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_profiles_are_created_once() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo.create(&input("p@example.com")).await.unwrap();

        assert!(repo.get_instructor_profile(user.id).await.unwrap().is_none());
        repo.ensure_instructor_profile(user.id).await.unwrap();
        repo.ensure_instructor_profile(user.id).await.unwrap();
        assert!(repo.get_instructor_profile(user.id).await.unwrap().is_some());

        repo.ensure_student_profile(user.id).await.unwrap();
        assert!(repo.get_student_profile(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_user_releases_blog_counters() {
        let (pool, repo) = setup_test_repo().await;
        let author = repo.create(&input("author@example.com")).await.unwrap();
        let reader = repo.create(&input("reader@example.com")).await.unwrap();
        let sqlite = pool.sqlite().unwrap();

        let blog_id = sqlx::query(
            "INSERT INTO blogs (author_id, title, slug, content, content_html, like_count, comment_count)
             VALUES (?, 'Post', 'post', 'x', '<p>x</p>', 1, 2)",
        )
        .bind(author.id)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        sqlx::query("INSERT INTO blog_likes (blog_id, user_id) VALUES (?, ?)")
            .bind(blog_id)
            .bind(reader.id)
            .execute(sqlite)
            .await
            .unwrap();
        for _ in 0..2 {
            sqlx::query("INSERT INTO blog_comments (blog_id, user_id, content) VALUES (?, ?, 'hi')")
                .bind(blog_id)
                .bind(reader.id)
                .execute(sqlite)
                .await
                .unwrap();
        }

        assert!(repo.delete(reader.id).await.unwrap());
        assert!(!repo.delete(reader.id).await.unwrap());

        let row = sqlx::query("SELECT like_count, comment_count FROM blogs WHERE id = ?")
            .bind(blog_id)
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("like_count"), 0);
        assert_eq!(row.get::<i64, _>("comment_count"), 0);
    }
}
