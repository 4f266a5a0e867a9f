//! Enrollment service
//!
//! Free-course enrollment, the student's course list and lesson progress.
//! Paid courses are enrolled through order completion instead.

use crate::cache::Cache;
use crate::db::repositories::{CourseRepository, EnrollmentRepository};
use crate::models::{CourseProgress, EnrollmentWithCourse, User};
use crate::services::course::invalidate_catalogue;
use serde::Serialize;
use std::sync::Arc;

/// Error types for enrollment operations
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentServiceError {
    #[error("Course not found")]
    CourseNotFound,

    #[error("Lesson not found")]
    LessonNotFound,

    #[error("Purchase required")]
    PurchaseRequired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Result of an enroll request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrollResult {
    pub course_id: i64,
    pub enrolled: bool,
    /// False when the user was already enrolled
    pub created: bool,
}

pub struct EnrollmentService {
    enrollments: Arc<dyn EnrollmentRepository>,
    courses: Arc<dyn CourseRepository>,
    cache: Arc<Cache>,
}

impl EnrollmentService {
    pub fn new(
        enrollments: Arc<dyn EnrollmentRepository>,
        courses: Arc<dyn CourseRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            enrollments,
            courses,
            cache,
        }
    }

    pub async fn list(
        &self,
        user: &User,
    ) -> Result<Vec<EnrollmentWithCourse>, EnrollmentServiceError> {
        Ok(self.enrollments.list_for_user(user.id).await?)
    }

    /// Enroll in a free, published course. Idempotent.
    pub async fn enroll_free(
        &self,
        user: &User,
        course_id: i64,
    ) -> Result<EnrollResult, EnrollmentServiceError> {
        let course = self
            .courses
            .get_by_id(course_id)
            .await?
            .filter(|c| c.is_published())
            .ok_or(EnrollmentServiceError::CourseNotFound)?;

        if !course.is_free() {
            return Err(EnrollmentServiceError::PurchaseRequired);
        }

        let created = self.enrollments.enroll(user.id, course_id).await?;
        if created {
            tracing::info!(user_id = user.id, course_id, "enrolled in free course");
            invalidate_catalogue(&self.cache).await;
        }
        Ok(EnrollResult {
            course_id,
            enrolled: true,
            created,
        })
    }

    /// Mark a lesson done and return progress through its course
    pub async fn complete_lesson(
        &self,
        user: &User,
        lesson_id: i64,
    ) -> Result<CourseProgress, EnrollmentServiceError> {
        let lesson = self
            .courses
            .get_lesson(lesson_id)
            .await?
            .ok_or(EnrollmentServiceError::LessonNotFound)?;

        if !self
            .enrollments
            .is_enrolled(user.id, lesson.course_id)
            .await?
        {
            return Err(EnrollmentServiceError::Forbidden(
                "You are not enrolled in this course".to_string(),
            ));
        }

        self.enrollments.complete_lesson(user.id, lesson_id).await?;
        self.progress(user.id, lesson.course_id).await
    }

    async fn progress(
        &self,
        user_id: i64,
        course_id: i64,
    ) -> Result<CourseProgress, EnrollmentServiceError> {
        let completed = self.enrollments.completed_count(user_id, course_id).await?;
        let total = self.courses.lesson_count(course_id).await?;
        Ok(CourseProgress::new(completed, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCourseRepository, SqlxEnrollmentRepository};
    use crate::models::UserRole;
    use crate::services::course::tests::{published_course, setup, user_with_role};

    fn service_for(f: &crate::services::course::tests::Fixture) -> EnrollmentService {
        EnrollmentService::new(
            SqlxEnrollmentRepository::boxed(f.pool.clone()),
            SqlxCourseRepository::boxed(f.pool.clone()),
            f.cache.clone(),
        )
    }

    #[tokio::test]
    async fn test_enroll_free_course_is_idempotent() {
        let f = setup().await;
        let service = service_for(&f);
        let course = published_course(&f, "Free", 0).await;
        let student = user_with_role(&f.pool, "s@example.com", UserRole::Student).await;

        let first = service.enroll_free(&student, course.id).await.unwrap();
        assert!(first.created);
        let second = service.enroll_free(&student, course.id).await.unwrap();
        assert!(second.enrolled);
        assert!(!second.created);

        let list = service.list(&student).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].course.id, course.id);
        assert_eq!(list[0].progress.total_lessons, 2);
        assert_eq!(list[0].progress.percent, 0);
    }

    #[tokio::test]
    async fn test_paid_and_draft_courses_refused() {
        let f = setup().await;
        let service = service_for(&f);
        let paid = published_course(&f, "Paid", 1999).await;
        let student = user_with_role(&f.pool, "s@example.com", UserRole::Student).await;

        assert!(matches!(
            service.enroll_free(&student, paid.id).await,
            Err(EnrollmentServiceError::PurchaseRequired)
        ));

        let draft = f
            .service
            .create(&f.instructor, crate::db::repositories::course::tests::course_input("Draft", 0))
            .await
            .unwrap();
        assert!(matches!(
            service.enroll_free(&student, draft.id).await,
            Err(EnrollmentServiceError::CourseNotFound)
        ));
    }

    #[tokio::test]
    async fn test_complete_lesson_requires_enrollment() {
        let f = setup().await;
        let service = service_for(&f);
        let course = published_course(&f, "Progress", 0).await;
        let student = user_with_role(&f.pool, "s@example.com", UserRole::Student).await;

        let detail = f.service.detail(course.id, None).await.unwrap();
        let lesson_id = detail.modules[0].lessons[0].id;

        assert!(matches!(
            service.complete_lesson(&student, lesson_id).await,
            Err(EnrollmentServiceError::Forbidden(_))
        ));

        service.enroll_free(&student, course.id).await.unwrap();
        let progress = service.complete_lesson(&student, lesson_id).await.unwrap();
        assert_eq!(progress, CourseProgress::new(1, 2));
        assert_eq!(progress.percent, 50);

        let again = service.complete_lesson(&student, lesson_id).await.unwrap();
        assert_eq!(again.completed_lessons, 1);

        assert!(matches!(
            service.complete_lesson(&student, 9999).await,
            Err(EnrollmentServiceError::LessonNotFound)
        ));
    }
}
