//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They own
//! validation, permission checks and cache invalidation, and report failures
//! through one error enum per service.

pub mod blog;
pub mod commerce;
pub mod course;
pub mod enrollment;
pub mod markdown;
pub mod password;
pub mod rate_limiter;
pub mod slug;
pub mod user;
pub mod webhook;

pub use blog::{BlogService, BlogServiceError};
pub use commerce::{CommerceService, CommerceServiceError, CouponQuote, WishlistState};
pub use course::{CourseService, CourseServiceError};
pub use enrollment::{EnrollResult, EnrollmentService, EnrollmentServiceError};
pub use markdown::MarkdownRenderer;
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use slug::generate_slug;
pub use user::{LoginInput, RegisterInput, UserAccount, UserService, UserServiceError};
pub use webhook::{SignatureHeaders, WebhookError, WebhookOutcome, WebhookService};
