//! Blog models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Blog post status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    #[default]
    Draft,
    Published,
}

impl fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Published => write!(f, "published"),
        }
    }
}

impl FromStr for BlogStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            _ => Err(anyhow::anyhow!("Invalid blog status: {}", s)),
        }
    }
}

/// Blog post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub content_html: String,
    pub category: Option<String>,
    pub cover_image: Option<String>,
    pub status: BlogStatus,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    pub fn is_published(&self) -> bool {
        self.status == BlogStatus::Published
    }

    /// Weighted engagement used to rank trending posts
    pub fn trending_score(&self) -> i64 {
        trending_score(self.view_count, self.like_count, self.comment_count)
    }
}

/// `views + 3 * likes + 5 * comments`
pub fn trending_score(views: i64, likes: i64, comments: i64) -> i64 {
    views + 3 * likes + 5 * comments
}

/// Ordering of the public blog list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlogSort {
    #[default]
    Latest,
    Oldest,
    /// Most liked
    Popular,
    MostViewed,
    MostCommented,
}

impl BlogSort {
    /// ORDER BY clause. Posts are dated by publication, falling back to
    /// creation for drafts; ties go to the newest.
    pub fn order_by(&self) -> &'static str {
        match self {
            BlogSort::Latest => "COALESCE(b.published_at, b.created_at) DESC, b.id DESC",
            BlogSort::Oldest => "COALESCE(b.published_at, b.created_at) ASC, b.id ASC",
            BlogSort::Popular => {
                "b.like_count DESC, COALESCE(b.published_at, b.created_at) DESC, b.id DESC"
            }
            BlogSort::MostViewed => {
                "b.view_count DESC, COALESCE(b.published_at, b.created_at) DESC, b.id DESC"
            }
            BlogSort::MostCommented => {
                "b.comment_count DESC, COALESCE(b.published_at, b.created_at) DESC, b.id DESC"
            }
        }
    }
}

impl FromStr for BlogSort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "latest" | "newest" => Ok(BlogSort::Latest),
            "oldest" => Ok(BlogSort::Oldest),
            "popular" | "most_liked" => Ok(BlogSort::Popular),
            "most_viewed" => Ok(BlogSort::MostViewed),
            "most_commented" => Ok(BlogSort::MostCommented),
            _ => Err(anyhow::anyhow!("Invalid sort: {}", s)),
        }
    }
}

/// Author block embedded in blog responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogAuthor {
    pub id: i64,
    pub name: String,
    pub avatar_url: String,
}

/// Blog list entry (no body)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub cover_image: Option<String>,
    pub author: BlogAuthor,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Full post with personalised like state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogDetail {
    #[serde(flatten)]
    pub blog: Blog,
    pub author: BlogAuthor,
    pub liked: bool,
}

/// Blog comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogComment {
    pub id: i64,
    pub blog_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Comment with its author for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogCommentView {
    pub id: i64,
    pub blog_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: BlogAuthor,
}

/// Result of toggling a like
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i64,
}

/// Input for creating a post
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBlogInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub status: BlogStatus,
}

/// Partial post update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBlogInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub cover_image: Option<String>,
    pub status: Option<BlogStatus>,
}
