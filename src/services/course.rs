//! Course service
//!
//! Catalogue reads (cached), course detail with lesson locking and the
//! authoring operations instructors use to build and publish courses.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{CourseRepository, EnrollmentRepository};
use crate::models::{
    Course, CourseDetail, CourseFilter, CourseModule, CourseStatus, CourseSummary,
    CreateCourseInput, CreateLessonInput, CreateModuleInput, InstructorCourse, InstructorStats,
    Lesson, LessonOutline, ListParams, ModuleOutline, PagedResult, UpdateCourseInput, User,
};
use crate::services::slug::{generate_slug, unique_slug};
use anyhow::Context;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

/// Prefix of every cached catalogue entry
pub(crate) const COURSE_CACHE_PATTERN: &str = "courses:*";

/// Error types for course service operations
#[derive(Debug, thiserror::Error)]
pub enum CourseServiceError {
    #[error("Course not found")]
    NotFound,

    #[error("Lesson not found")]
    LessonNotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Drop every cached catalogue page
pub(crate) async fn invalidate_catalogue(cache: &Cache) {
    if let Err(e) = cache.delete_pattern(COURSE_CACHE_PATTERN).await {
        tracing::warn!("Failed to invalidate course cache: {}", e);
    }
}

pub struct CourseService {
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    cache: Arc<Cache>,
}

impl CourseService {
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            courses,
            enrollments,
            cache,
        }
    }

    /// Published courses matching `filter`, newest first
    pub async fn list(
        &self,
        filter: &CourseFilter,
        params: &ListParams,
    ) -> Result<PagedResult<CourseSummary>, CourseServiceError> {
        let key = format!(
            "courses:list:{}:{}:{}",
            filter.cache_key(),
            params.page,
            params.per_page
        );
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<CourseSummary>>(&key).await {
            return Ok(cached);
        }

        let (items, total) = self.courses.list_published(filter, params).await?;
        let result = PagedResult::new(items, total, params);
        let _ = self
            .cache
            .set(&key, &result, self.cache.default_ttl())
            .await;
        Ok(result)
    }

    /// Course with its outline.
    ///
    /// Drafts are visible only to their instructor and admins. Lesson bodies
    /// are included for previews, enrolled students, the owner and admins.
    pub async fn detail(
        &self,
        id: i64,
        viewer: Option<&User>,
    ) -> Result<CourseDetail, CourseServiceError> {
        let course = self.visible_course(id, viewer).await?;
        let summary = self
            .courses
            .summary(id)
            .await?
            .ok_or(CourseServiceError::NotFound)?;

        let is_enrolled = match viewer {
            Some(user) => self.enrollments.is_enrolled(user.id, id).await?,
            None => false,
        };
        let unlocked = is_enrolled || viewer.is_some_and(|u| u.can_manage(course.instructor_id));

        let modules = self.courses.list_modules(id).await?;
        let mut lessons_by_module: HashMap<i64, Vec<LessonOutline>> = HashMap::new();
        for lesson in self.courses.list_lessons(id).await? {
            lessons_by_module
                .entry(lesson.module_id)
                .or_default()
                .push(LessonOutline::from_lesson(lesson, unlocked));
        }

        let modules = modules
            .into_iter()
            .map(|m| ModuleOutline {
                lessons: lessons_by_module.remove(&m.id).unwrap_or_default(),
                id: m.id,
                title: m.title,
                position: m.position,
            })
            .collect();

        Ok(CourseDetail {
            course,
            instructor: summary.instructor,
            modules,
            lesson_count: summary.lesson_count,
            enrollment_count: summary.enrollment_count,
            is_enrolled,
        })
    }

    /// Full lesson for users allowed to take it
    pub async fn lesson(
        &self,
        course_id: i64,
        lesson_id: i64,
        viewer: &User,
    ) -> Result<Lesson, CourseServiceError> {
        let course = self.visible_course(course_id, Some(viewer)).await?;
        let lesson = self
            .courses
            .get_lesson(lesson_id)
            .await?
            .filter(|l| l.course_id == course_id)
            .ok_or(CourseServiceError::LessonNotFound)?;

        if lesson.is_preview || viewer.can_manage(course.instructor_id) {
            return Ok(lesson);
        }
        if self.enrollments.is_enrolled(viewer.id, course_id).await? {
            return Ok(lesson);
        }
        Err(CourseServiceError::Forbidden(
            "Enroll in this course to access the lesson".to_string(),
        ))
    }

    pub async fn create(
        &self,
        user: &User,
        input: CreateCourseInput,
    ) -> Result<Course, CourseServiceError> {
        if !user.can_teach() {
            return Err(CourseServiceError::Forbidden(
                "Only instructors can create courses".to_string(),
            ));
        }
        validate_title(&input.title)?;
        validate_price(input.price_cents)?;

        let input = CreateCourseInput {
            title: input.title.trim().to_string(),
            ..input
        };
        let courses = self.courses.clone();
        let slug = unique_slug(&generate_slug(&input.title), "course", |candidate| {
            let courses = courses.clone();
            async move { courses.slug_exists(&candidate).await }
        })
        .await?;

        let course = self.courses.create(user.id, &input, &slug).await?;
        tracing::info!(course_id = course.id, instructor_id = user.id, "course created");
        invalidate_catalogue(&self.cache).await;
        Ok(course)
    }

    pub async fn update(
        &self,
        user: &User,
        id: i64,
        input: UpdateCourseInput,
    ) -> Result<Course, CourseServiceError> {
        let mut course = self.owned_course(user, id).await?;

        if let Some(title) = input.title {
            validate_title(&title)?;
            course.title = title.trim().to_string();
        }
        if let Some(price) = input.price_cents {
            validate_price(price)?;
            course.price_cents = price;
        }
        if let Some(description) = input.description {
            course.description = description;
        }
        if let Some(thumbnail) = input.thumbnail {
            course.thumbnail = Some(thumbnail).filter(|t| !t.is_empty());
        }
        if let Some(category) = input.category {
            course.category = category;
        }
        if let Some(level) = input.level {
            course.level = level;
        }
        course.updated_at = Utc::now();

        self.courses.update(&course).await?;
        invalidate_catalogue(&self.cache).await;
        Ok(course)
    }

    /// Delete a course that nobody is enrolled in
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), CourseServiceError> {
        self.owned_course(user, id).await?;

        if self.courses.enrollment_count(id).await? > 0 {
            return Err(CourseServiceError::Conflict(
                "Course has enrolled students and cannot be deleted".to_string(),
            ));
        }

        self.courses.delete(id).await?;
        tracing::info!(course_id = id, "course deleted");
        invalidate_catalogue(&self.cache).await;
        Ok(())
    }

    /// Publish or unpublish. A course needs at least one lesson to go live.
    pub async fn set_published(
        &self,
        user: &User,
        id: i64,
        publish: bool,
    ) -> Result<Course, CourseServiceError> {
        let mut course = self.owned_course(user, id).await?;

        let status = if publish {
            if self.courses.lesson_count(id).await? == 0 {
                return Err(CourseServiceError::ValidationError(
                    "A course needs at least one lesson before it can be published".to_string(),
                ));
            }
            CourseStatus::Published
        } else {
            CourseStatus::Draft
        };

        self.courses.set_status(id, status).await?;
        course.status = status;
        invalidate_catalogue(&self.cache).await;
        Ok(course)
    }

    pub async fn add_module(
        &self,
        user: &User,
        course_id: i64,
        input: CreateModuleInput,
    ) -> Result<CourseModule, CourseServiceError> {
        self.owned_course(user, course_id).await?;
        validate_title(&input.title)?;
        Ok(self
            .courses
            .add_module(course_id, input.title.trim())
            .await?)
    }

    pub async fn add_lesson(
        &self,
        user: &User,
        module_id: i64,
        input: CreateLessonInput,
    ) -> Result<Lesson, CourseServiceError> {
        let module = self
            .courses
            .get_module(module_id)
            .await?
            .ok_or(CourseServiceError::NotFound)?;
        self.owned_course(user, module.course_id).await?;

        validate_title(&input.title)?;
        if input.duration_minutes < 0 {
            return Err(CourseServiceError::ValidationError(
                "Duration cannot be negative".to_string(),
            ));
        }
        let input = CreateLessonInput {
            title: input.title.trim().to_string(),
            ..input
        };

        let lesson = self.courses.add_lesson(&module, &input).await?;
        invalidate_catalogue(&self.cache).await;
        Ok(lesson)
    }

    /// The caller's own courses, any status
    pub async fn instructor_courses(
        &self,
        user: &User,
    ) -> Result<Vec<InstructorCourse>, CourseServiceError> {
        Ok(self.courses.list_by_instructor(user.id).await?)
    }

    pub async fn instructor_stats(&self, user: &User) -> Result<InstructorStats, CourseServiceError> {
        Ok(self
            .courses
            .instructor_stats(user.id)
            .await
            .context("Failed to compute instructor stats")?)
    }

    async fn visible_course(
        &self,
        id: i64,
        viewer: Option<&User>,
    ) -> Result<Course, CourseServiceError> {
        let course = self
            .courses
            .get_by_id(id)
            .await?
            .ok_or(CourseServiceError::NotFound)?;
        if course.is_published() || viewer.is_some_and(|u| u.can_manage(course.instructor_id)) {
            Ok(course)
        } else {
            Err(CourseServiceError::NotFound)
        }
    }

    async fn owned_course(&self, user: &User, id: i64) -> Result<Course, CourseServiceError> {
        let course = self
            .courses
            .get_by_id(id)
            .await?
            .ok_or(CourseServiceError::NotFound)?;
        if !user.can_manage(course.instructor_id) {
            return Err(CourseServiceError::Forbidden(
                "You can only manage your own courses".to_string(),
            ));
        }
        Ok(course)
    }
}

fn validate_title(title: &str) -> Result<(), CourseServiceError> {
    if title.trim().is_empty() {
        return Err(CourseServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_price(price_cents: i64) -> Result<(), CourseServiceError> {
    if price_cents < 0 {
        return Err(CourseServiceError::ValidationError(
            "Price cannot be negative".to_string(),
        ));
    }
    Ok(())
}
