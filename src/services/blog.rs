//! Blog service
//!
//! Community posts with Markdown bodies, likes, comments and view counts.
//! Any signed-in user can write; authors and admins edit and delete.
//!
//! The trending list is cached under `blog:trending:*` and dropped whenever
//! a post, like or comment changes.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{BlogRepository, UserRepository};
use crate::models::{
    Blog, BlogAuthor, BlogCommentView, BlogDetail, BlogSort, BlogStatus, BlogSummary,
    CreateBlogInput, LikeState, ListParams, PagedResult, UpdateBlogInput, User,
};
use crate::services::markdown::MarkdownRenderer;
use crate::services::slug::{generate_slug, unique_slug};
use chrono::{Duration, Utc};
use std::sync::Arc;

const TRENDING_CACHE_PATTERN: &str = "blog:trending:*";
const DEFAULT_TRENDING_LIMIT: i64 = 5;
const MAX_TRENDING_LIMIT: i64 = 20;
const DEFAULT_TRENDING_DAYS: i64 = 30;
const SEARCH_LIMIT: i64 = 20;
const EXCERPT_CHARS: usize = 200;
const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum BlogServiceError {
    #[error("Post not found")]
    NotFound,

    #[error("Comment not found")]
    CommentNotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct BlogService {
    blogs: Arc<dyn BlogRepository>,
    users: Arc<dyn UserRepository>,
    cache: Arc<Cache>,
    renderer: MarkdownRenderer,
}

impl BlogService {
    pub fn new(
        blogs: Arc<dyn BlogRepository>,
        users: Arc<dyn UserRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            blogs,
            users,
            cache,
            renderer: MarkdownRenderer::new(),
        }
    }

    pub async fn list(
        &self,
        sort: BlogSort,
        category: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<BlogSummary>, BlogServiceError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let (items, total) = self.blogs.list_published(sort, category, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Case-insensitive search over published posts. A blank query matches
    /// nothing and never reaches the database.
    pub async fn search(&self, query: &str) -> Result<Vec<BlogSummary>, BlogServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.blogs.search(query, SEARCH_LIMIT).await?)
    }

    /// Most engaging posts published in the last `days` days
    pub async fn trending(
        &self,
        limit: Option<i64>,
        days: Option<i64>,
    ) -> Result<Vec<BlogSummary>, BlogServiceError> {
        let limit = limit
            .unwrap_or(DEFAULT_TRENDING_LIMIT)
            .clamp(1, MAX_TRENDING_LIMIT);
        let days = days.unwrap_or(DEFAULT_TRENDING_DAYS).clamp(1, 365);

        let key = format!("blog:trending:{}:{}", limit, days);
        if let Ok(Some(cached)) = self.cache.get::<Vec<BlogSummary>>(&key).await {
            return Ok(cached);
        }

        let since = Utc::now() - Duration::days(days);
        let posts = self.blogs.trending(since, limit).await?;
        let _ = self.cache.set(&key, &posts, self.cache.default_ttl()).await;
        Ok(posts)
    }

    pub async fn get(&self, id: i64, viewer: Option<&User>) -> Result<BlogDetail, BlogServiceError> {
        let blog = self.blogs.get_by_id(id).await?;
        self.detail(blog, viewer).await
    }

    pub async fn get_by_slug(
        &self,
        slug: &str,
        viewer: Option<&User>,
    ) -> Result<BlogDetail, BlogServiceError> {
        let blog = self.blogs.get_by_slug(slug).await?;
        self.detail(blog, viewer).await
    }

    /// Count one view of a published post
    pub async fn record_view(&self, id: i64) -> Result<(), BlogServiceError> {
        self.visible(id, None).await?;
        if !self.blogs.increment_view(id).await? {
            return Err(BlogServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn create(&self, user: &User, input: CreateBlogInput) -> Result<Blog, BlogServiceError> {
        let title = input.title.trim().to_string();
        validate_post(&title, &input.content)?;

        let blogs = self.blogs.clone();
        let slug = unique_slug(&generate_slug(&title), "post", |candidate| {
            let blogs = blogs.clone();
            async move { blogs.slug_exists(&candidate).await }
        })
        .await?;

        let now = Utc::now();
        let mut blog = Blog {
            id: 0,
            author_id: user.id,
            title,
            slug,
            excerpt: self.excerpt_for(input.excerpt, &input.content),
            content_html: self.renderer.render(&input.content),
            content: input.content,
            category: clean(input.category),
            cover_image: clean(input.cover_image),
            status: input.status,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            published_at: (input.status == BlogStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        };
        blog.id = self.blogs.create(&blog).await?;

        tracing::info!(blog_id = blog.id, author_id = user.id, "blog post created");
        self.invalidate_trending().await;
        Ok(blog)
    }

    pub async fn update(
        &self,
        user: &User,
        id: i64,
        input: UpdateBlogInput,
    ) -> Result<Blog, BlogServiceError> {
        let mut blog = self.owned(user, id).await?;

        if let Some(title) = input.title {
            blog.title = title.trim().to_string();
        }
        if let Some(content) = input.content {
            blog.content_html = self.renderer.render(&content);
            blog.content = content;
            if input.excerpt.is_none() {
                blog.excerpt = self.excerpt_for(None, &blog.content);
            }
        }
        if let Some(excerpt) = input.excerpt {
            blog.excerpt = self.excerpt_for(Some(excerpt), &blog.content);
        }
        if let Some(category) = input.category {
            blog.category = clean(Some(category));
        }
        if let Some(cover_image) = input.cover_image {
            blog.cover_image = clean(Some(cover_image));
        }
        validate_post(&blog.title, &blog.content)?;

        let now = Utc::now();
        if let Some(status) = input.status {
            blog.status = status;
            if status == BlogStatus::Published && blog.published_at.is_none() {
                blog.published_at = Some(now);
            }
        }
        blog.updated_at = now;

        self.blogs.update(&blog).await?;
        self.invalidate_trending().await;
        Ok(blog)
    }

    /// Delete a post together with its likes and comments
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), BlogServiceError> {
        self.owned(user, id).await?;
        if !self.blogs.delete_cascade(id).await? {
            return Err(BlogServiceError::NotFound);
        }
        tracing::info!(blog_id = id, user_id = user.id, "blog post deleted");
        self.invalidate_trending().await;
        Ok(())
    }

    /// Like or unlike a published post
    pub async fn toggle_like(&self, user: &User, id: i64) -> Result<LikeState, BlogServiceError> {
        self.visible(id, None).await?;
        let state = self.blogs.toggle_like(id, user.id).await?;
        self.invalidate_trending().await;
        Ok(state)
    }

    /// Comments on a post, oldest first
    pub async fn comments(
        &self,
        id: i64,
        viewer: Option<&User>,
    ) -> Result<Vec<BlogCommentView>, BlogServiceError> {
        self.visible(id, viewer).await?;
        Ok(self.blogs.list_comments(id).await?)
    }

    pub async fn add_comment(
        &self,
        user: &User,
        id: i64,
        content: &str,
    ) -> Result<BlogCommentView, BlogServiceError> {
        let content = content.trim();
        let len = content.chars().count();
        if len == 0 || len > MAX_COMMENT_CHARS {
            return Err(BlogServiceError::ValidationError(format!(
                "Comment must be between 1 and {} characters",
                MAX_COMMENT_CHARS
            )));
        }
        self.visible(id, Some(user)).await?;

        let comment = self.blogs.add_comment(id, user.id, content).await?;
        self.invalidate_trending().await;
        Ok(BlogCommentView {
            id: comment.id,
            blog_id: comment.blog_id,
            content: comment.content,
            created_at: comment.created_at,
            author: author_of(user),
        })
    }

    /// Delete a comment as its author, the post's author or an admin
    pub async fn delete_comment(&self, user: &User, comment_id: i64) -> Result<(), BlogServiceError> {
        let comment = self
            .blogs
            .get_comment(comment_id)
            .await?
            .ok_or(BlogServiceError::CommentNotFound)?;

        let allowed = user.can_manage(comment.user_id)
            || self
                .blogs
                .get_by_id(comment.blog_id)
                .await?
                .is_some_and(|b| b.author_id == user.id);
        if !allowed {
            return Err(BlogServiceError::Forbidden(
                "You cannot delete this comment".to_string(),
            ));
        }

        self.blogs.delete_comment(comment_id).await?;
        self.invalidate_trending().await;
        Ok(())
    }

    async fn detail(
        &self,
        blog: Option<Blog>,
        viewer: Option<&User>,
    ) -> Result<BlogDetail, BlogServiceError> {
        let blog = blog
            .filter(|b| can_see(b, viewer))
            .ok_or(BlogServiceError::NotFound)?;

        let author = match self.users.get_by_id(blog.author_id).await? {
            Some(user) => author_of(&user),
            None => BlogAuthor {
                id: blog.author_id,
                name: "Deleted user".to_string(),
                avatar_url: String::new(),
            },
        };
        let liked = match viewer {
            Some(user) => self.blogs.is_liked(blog.id, user.id).await?,
            None => false,
        };

        Ok(BlogDetail { blog, author, liked })
    }

    async fn visible(&self, id: i64, viewer: Option<&User>) -> Result<Blog, BlogServiceError> {
        self.blogs
            .get_by_id(id)
            .await?
            .filter(|b| can_see(b, viewer))
            .ok_or(BlogServiceError::NotFound)
    }

    async fn owned(&self, user: &User, id: i64) -> Result<Blog, BlogServiceError> {
        let blog = self
            .blogs
            .get_by_id(id)
            .await?
            .ok_or(BlogServiceError::NotFound)?;
        if !user.can_manage(blog.author_id) {
            return Err(BlogServiceError::Forbidden(
                "Only the author can change this post".to_string(),
            ));
        }
        Ok(blog)
    }

    fn excerpt_for(&self, excerpt: Option<String>, content: &str) -> Option<String> {
        match clean(excerpt) {
            Some(e) => Some(e),
            None => Some(self.renderer.excerpt(content, EXCERPT_CHARS)).filter(|e| !e.is_empty()),
        }
    }

    async fn invalidate_trending(&self) {
        if let Err(e) = self.cache.delete_pattern(TRENDING_CACHE_PATTERN).await {
            tracing::warn!("Failed to invalidate trending cache: {}", e);
        }
    }
}

/// Published posts are public; drafts only reach their author and admins
fn can_see(blog: &Blog, viewer: Option<&User>) -> bool {
    blog.is_published() || viewer.is_some_and(|u| u.can_manage(blog.author_id))
}

fn author_of(user: &User) -> BlogAuthor {
    BlogAuthor {
        id: user.id,
        name: user.name.clone(),
        avatar_url: user.avatar_url(),
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_post(title: &str, content: &str) -> Result<(), BlogServiceError> {
    if title.trim().is_empty() {
        return Err(BlogServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if content.trim().is_empty() {
        return Err(BlogServiceError::ValidationError(
            "Content cannot be empty".to_string(),
        ));
    }
    Ok(())
}
