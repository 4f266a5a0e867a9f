//! User model
//!
//! Users are either registered locally (email + password) or provisioned by
//! the external auth provider through its webhooks, in which case they carry
//! an `external_id` and usually no password hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A marketplace user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Identifier at the external auth provider, if provisioned from there
    pub external_id: Option<String>,
    /// Email address (unique)
    pub email: String,
    /// Display name
    pub name: String,
    /// Avatar URL
    pub image_url: Option<String>,
    /// Password hash (argon2), absent for provider-managed accounts
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// User role
    pub role: UserRole,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Instructors and admins may author courses
    pub fn can_teach(&self) -> bool {
        matches!(self.role, UserRole::Instructor | UserRole::Admin)
    }

    /// Check if the user may edit content owned by `owner_id`
    pub fn can_manage(&self, owner_id: i64) -> bool {
        self.is_admin() || self.id == owner_id
    }

    /// Avatar to display: the stored image, or a gravatar derived from the email
    pub fn avatar_url(&self) -> String {
        match &self.image_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => gravatar_url(&self.email),
        }
    }
}

/// Gravatar URL for an email address (identicon fallback)
pub fn gravatar_url(email: &str) -> String {
    let digest = md5::compute(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{:x}?d=identicon", digest)
}

/// User role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Buys and takes courses
    #[default]
    Student,
    /// Publishes courses
    Instructor,
    /// Full access
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Student => write!(f, "student"),
            UserRole::Instructor => write!(f, "instructor"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "instructor" => Ok(UserRole::Instructor),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Instructor profile, created when a user takes the instructor role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstructorProfile {
    pub user_id: i64,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
}

/// Student profile, created on registration or when switching to student
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentProfile {
    pub user_id: i64,
    pub interests: Option<String>,
}

/// Input for creating a local user (password already hashed)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub role: UserRole,
}

/// User data pushed by the auth provider
#[derive(Debug, Clone)]
pub struct ExternalUserInput {
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub image_url: Option<String>,
    /// Role from the provider's public metadata, if it carried a usable one
    pub role: Option<UserRole>,
}
