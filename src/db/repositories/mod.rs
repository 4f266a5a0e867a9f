//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles one aggregate of the marketplace.

pub mod blog;
pub mod cart;
pub mod course;
pub mod enrollment;
pub mod order;
pub mod session;
pub mod user;

pub use blog::{BlogRepository, SqlxBlogRepository};
pub use cart::{CartRepository, SqlxCartRepository};
pub use course::{CourseRepository, SqlxCourseRepository};
pub use enrollment::{EnrollmentRepository, SqlxEnrollmentRepository};
pub use order::{OrderRepository, SqlxOrderRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Escape character of every `LIKE ... ESCAPE` clause
pub(crate) const LIKE_ESCAPE: char = '!';

/// Lowercased text that catalogue and blog searches match against.
/// Folding happens here rather than in SQL so non-ASCII text compares
/// case-insensitively on every driver.
pub(crate) fn search_text(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase()
}

/// `%term%` for a `LIKE` match, lowercased and with wildcards escaped
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
