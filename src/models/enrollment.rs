//! Enrollment and lesson progress models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CourseSummary;

/// A user's access to a course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Completion progress through one course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgress {
    pub completed_lessons: i64,
    pub total_lessons: i64,
    /// Whole percent, rounded down
    pub percent: i64,
}

impl CourseProgress {
    pub fn new(completed_lessons: i64, total_lessons: i64) -> Self {
        let percent = if total_lessons <= 0 {
            0
        } else {
            (completed_lessons.clamp(0, total_lessons) * 100) / total_lessons
        };
        Self {
            completed_lessons,
            total_lessons,
            percent,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_lessons > 0 && self.completed_lessons >= self.total_lessons
    }
}

/// Enrollment listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentWithCourse {
    pub id: i64,
    pub enrolled_at: DateTime<Utc>,
    pub course: CourseSummary,
    pub progress: CourseProgress,
}
