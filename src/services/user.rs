//! User service
//!
//! Local registration and login, session validation, role assignment and
//! the upsert path used by the auth-provider webhook.
//!
//! The first locally registered user becomes an admin; everyone else starts
//! as a student with a student profile.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{
    CreateUserInput, ExternalUserInput, InstructorProfile, Session, StudentProfile, User, UserRole,
};
use crate::services::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use crate::services::rate_limiter::LoginRateLimiter;
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default session lifetime in days
const DEFAULT_SESSION_DAYS: i64 = 7;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many failed login attempts, try again later")]
    TooManyAttempts,

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Registration request
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// The signed-in user with whichever profiles exist
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    #[serde(flatten)]
    pub user: User,
    pub avatar_url: String,
    pub instructor_profile: Option<InstructorProfile>,
    pub student_profile: Option<StudentProfile>,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
    login_limiter: LoginRateLimiter,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_days(user_repo, session_repo, DEFAULT_SESSION_DAYS)
    }

    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days,
            login_limiter: LoginRateLimiter::default(),
        }
    }

    /// Register a local user.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for an empty name, malformed email or short password
    /// - `UserExists` if the email is already registered
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                input.email.trim()
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Student
        };

        let password_hash = hash_password(&input.password)?;
        let user = self
            .user_repo
            .create(&CreateUserInput {
                email: input.email,
                name: input.name.trim().to_string(),
                password_hash: Some(password_hash),
                role,
            })
            .await?;

        if role == UserRole::Student {
            self.user_repo.ensure_student_profile(user.id).await?;
        }

        tracing::info!(user_id = user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Check credentials and open a session
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let key = input.email.trim().to_lowercase();
        if self.login_limiter.is_limited(&key).await {
            return Err(UserServiceError::TooManyAttempts);
        }

        let user = self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to look up user")?;

        // Provider-managed accounts have no hash and sign in at the provider
        let verified = match user.as_ref().and_then(|u| u.password_hash.as_deref()) {
            Some(hash) => verify_password(&input.password, hash)?,
            None => false,
        };
        let user = match user {
            Some(user) if verified => user,
            _ => {
                self.login_limiter.record(&key).await;
                return Err(UserServiceError::AuthenticationError(
                    "Invalid email or password".to_string(),
                ));
            }
        };
        self.login_limiter.clear(&key).await;

        let session = Session::start(user.id, self.session_days);
        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(session)
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// The user behind a session token, or `None` when the token is unknown
    /// or expired. Expired sessions are removed on sight.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        Ok(self.user_repo.get_by_id(session.user_id).await?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await?)
    }

    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Current user plus profiles, for `GET /api/user`
    pub async fn account(&self, user: User) -> Result<UserAccount, UserServiceError> {
        let instructor_profile = self.user_repo.get_instructor_profile(user.id).await?;
        let student_profile = self.user_repo.get_student_profile(user.id).await?;
        Ok(UserAccount {
            avatar_url: user.avatar_url(),
            user,
            instructor_profile,
            student_profile,
        })
    }

    /// Let a user pick their own role. Only student and instructor can be
    /// self-assigned.
    pub async fn assign_own_role(
        &self,
        user: &User,
        role: UserRole,
    ) -> Result<User, UserServiceError> {
        if role == UserRole::Admin {
            return Err(UserServiceError::Forbidden(
                "The admin role cannot be self-assigned".to_string(),
            ));
        }
        self.apply_role(user.id, role).await
    }

    /// Admin-only: set any role on any user
    pub async fn set_role(
        &self,
        actor: &User,
        target_id: i64,
        role: UserRole,
    ) -> Result<User, UserServiceError> {
        if !actor.is_admin() {
            return Err(UserServiceError::Forbidden(
                "Only admins can change other users' roles".to_string(),
            ));
        }
        if self.user_repo.get_by_id(target_id).await?.is_none() {
            return Err(UserServiceError::NotFound);
        }
        self.apply_role(target_id, role).await
    }

    /// Create or refresh a provider-managed user.
    ///
    /// Matches on `external_id` first, then links an existing local account
    /// with the same email. A role carried by the provider is applied unless
    /// it is admin.
    pub async fn upsert_external(
        &self,
        input: ExternalUserInput,
    ) -> Result<User, UserServiceError> {
        let role = input.role.filter(|r| *r != UserRole::Admin);

        let existing = match self.user_repo.get_by_external_id(&input.external_id).await? {
            Some(user) => Some(user),
            None => self.user_repo.get_by_email(&input.email).await?,
        };

        let user_id = match existing {
            Some(user) => {
                self.user_repo
                    .update_identity(
                        user.id,
                        &input.external_id,
                        &input.email,
                        &input.name,
                        input.image_url.as_deref(),
                    )
                    .await?;
                if let Some(role) = role.filter(|r| *r != user.role && !user.is_admin()) {
                    self.user_repo.update_role(user.id, role).await?;
                }
                user.id
            }
            None => {
                let user = self
                    .user_repo
                    .create_external(
                        &input.external_id,
                        &input.email,
                        &input.name,
                        input.image_url.as_deref(),
                        role.unwrap_or_default(),
                    )
                    .await?;
                user.id
            }
        };

        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(UserServiceError::NotFound)?;
        self.ensure_profile(&user).await?;
        Ok(user)
    }

    /// Remove a provider-managed user; returns false when unknown
    pub async fn delete_external(&self, external_id: &str) -> Result<bool, UserServiceError> {
        match self.user_repo.get_by_external_id(external_id).await? {
            Some(user) => Ok(self.user_repo.delete(user.id).await?),
            None => Ok(false),
        }
    }

    /// Periodic housekeeping: expired sessions and aged-out login failures
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        self.login_limiter.cleanup().await;
        Ok(self.session_repo.delete_expired().await?)
    }

    async fn apply_role(&self, user_id: i64, role: UserRole) -> Result<User, UserServiceError> {
        self.user_repo.update_role(user_id, role).await?;
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(UserServiceError::NotFound)?;
        self.ensure_profile(&user).await?;
        tracing::info!(user_id, role = %role, "role assigned");
        Ok(user)
    }

    async fn ensure_profile(&self, user: &User) -> Result<(), UserServiceError> {
        match user.role {
            UserRole::Instructor => self.user_repo.ensure_instructor_profile(user.id).await?,
            UserRole::Student => self.user_repo.ensure_student_profile(user.id).await?,
            UserRole::Admin => {}
        }
        Ok(())
    }
}

fn validate_register_input(input: &RegisterInput) -> Result<(), UserServiceError> {
    if input.name.trim().is_empty() {
        return Err(UserServiceError::ValidationError(
            "Name cannot be empty".to_string(),
        ));
    }
    if !is_valid_email(&input.email) {
        return Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }
    if input.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(UserServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, Utc};

    async fn setup_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            name: "Someone".to_string(),
            password: "password123".to_string(),
        }
    }

    fn external(id: &str, email: &str, role: Option<UserRole>) -> ExternalUserInput {
        ExternalUserInput {
            external_id: id.to_string(),
            email: email.to_string(),
            name: "Provider User".to_string(),
            image_url: Some("https://img.example.com/p.png".to_string()),
            role,
        }
    }

    #[tokio::test]
    async fn test_first_user_is_admin_then_students() {
        let service = setup_test_service().await;
        assert!(service.is_first_user().await.unwrap());

        let first = service.register(register_input("first@example.com")).await.unwrap();
        assert_eq!(first.role, UserRole::Admin);

        let second = service.register(register_input("second@example.com")).await.unwrap();
        assert_eq!(second.role, UserRole::Student);

        let account = service.account(second).await.unwrap();
        assert!(account.student_profile.is_some());
        assert!(account.instructor_profile.is_none());
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = setup_test_service().await;

        let mut input = register_input("a@example.com");
        input.name = "  ".to_string();
        assert!(matches!(
            service.register(input).await,
            Err(UserServiceError::ValidationError(_))
        ));

        assert!(matches!(
            service.register(register_input("not-an-email")).await,
            Err(UserServiceError::ValidationError(_))
        ));

        let mut input = register_input("a@example.com");
        input.password = "short".to_string();
        assert!(matches!(
            service.register(input).await,
            Err(UserServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_fails() {
        let service = setup_test_service().await;
        service.register(register_input("dup@example.com")).await.unwrap();
        assert!(matches!(
            service.register(register_input("DUP@example.com")).await,
            Err(UserServiceError::UserExists(_))
        ));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let service = setup_test_service().await;
        let user = service.register(register_input("login@example.com")).await.unwrap();

        let session = service
            .login(LoginInput {
                email: "login@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        let found = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let service = setup_test_service().await;
        service.register(register_input("who@example.com")).await.unwrap();

        for (email, password) in [
            ("who@example.com", "wrong-password"),
            ("nobody@example.com", "password123"),
        ] {
            let result = service
                .login(LoginInput {
                    email: email.to_string(),
                    password: password.to_string(),
                })
                .await;
            assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
        }
    }

    #[tokio::test]
    async fn test_provider_user_cannot_password_login() {
        let service = setup_test_service().await;
        service
            .upsert_external(external("user_1", "ext@example.com", None))
            .await
            .unwrap();
        let result = service
            .login(LoginInput {
                email: "ext@example.com".to_string(),
                password: "anything-goes".to_string(),
            })
            .await;
        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_removed() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let service = UserService::new(SqlxUserRepository::boxed(pool), sessions.clone());

        let user = service.register(register_input("old@example.com")).await.unwrap();
        let mut session = Session::start(user.id, 1);
        session.expires_at = Utc::now() - Duration::hours(1);
        sessions.create(&session).await.unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert!(sessions.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_assign_own_role() {
        let service = setup_test_service().await;
        service.register(register_input("admin@example.com")).await.unwrap();
        let student = service.register(register_input("s@example.com")).await.unwrap();

        let teacher = service
            .assign_own_role(&student, UserRole::Instructor)
            .await
            .unwrap();
        assert_eq!(teacher.role, UserRole::Instructor);
        let account = service.account(teacher.clone()).await.unwrap();
        assert!(account.instructor_profile.is_some());

        assert!(matches!(
            service.assign_own_role(&teacher, UserRole::Admin).await,
            Err(UserServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_sets_roles() {
        let service = setup_test_service().await;
        let admin = service.register(register_input("admin@example.com")).await.unwrap();
        let student = service.register(register_input("s@example.com")).await.unwrap();

        let promoted = service
            .set_role(&admin, student.id, UserRole::Instructor)
            .await
            .unwrap();
        assert_eq!(promoted.role, UserRole::Instructor);

        assert!(matches!(
            service.set_role(&promoted, admin.id, UserRole::Student).await,
            Err(UserServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.set_role(&admin, 9999, UserRole::Student).await,
            Err(UserServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_upsert_external_creates_updates_and_links() {
        let service = setup_test_service().await;

        let created = service
            .upsert_external(external("user_a", "a@example.com", Some(UserRole::Instructor)))
            .await
            .unwrap();
        assert_eq!(created.role, UserRole::Instructor);

        let mut changed = external("user_a", "a2@example.com", Some(UserRole::Admin));
        changed.name = "Renamed".to_string();
        let updated = service.upsert_external(changed).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.email, "a2@example.com");
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.role, UserRole::Instructor);

        let local = service.register(register_input("local@example.com")).await.unwrap();
        let linked = service
            .upsert_external(external("user_b", "local@example.com", None))
            .await
            .unwrap();
        assert_eq!(linked.id, local.id);
        assert_eq!(linked.external_id.as_deref(), Some("user_b"));

        assert!(service.delete_external("user_a").await.unwrap());
        assert!(!service.delete_external("user_a").await.unwrap());
        assert!(service.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repeated_failures_are_throttled() {
        let service = setup_test_service().await;
        service.register(register_input("t@example.com")).await.unwrap();
        let attempt = |password: &str| LoginInput {
            email: "t@example.com".to_string(),
            password: password.to_string(),
        };

        for _ in 0..crate::services::rate_limiter::LOGIN_MAX_ATTEMPTS {
            assert!(matches!(
                service.login(attempt("wrong-password")).await,
                Err(UserServiceError::AuthenticationError(_))
            ));
        }
        assert!(matches!(
            service.login(attempt("password123")).await,
            Err(UserServiceError::TooManyAttempts)
        ));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("  first.last+tag@example.org "));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
    }
}
