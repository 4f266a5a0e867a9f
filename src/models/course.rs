//! Course catalogue models
//!
//! A course is split into ordered modules, each holding ordered lessons.
//! Prices are integer cents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Course entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub instructor_id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub thumbnail: Option<String>,
    pub price_cents: i64,
    pub category: String,
    pub level: CourseLevel,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn is_published(&self) -> bool {
        self.status == CourseStatus::Published
    }

    pub fn is_free(&self) -> bool {
        self.price_cents == 0
    }
}

/// Publication status of a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    #[default]
    Draft,
    Published,
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseStatus::Draft => write!(f, "draft"),
            CourseStatus::Published => write!(f, "published"),
        }
    }
}

impl FromStr for CourseStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(CourseStatus::Draft),
            "published" => Ok(CourseStatus::Published),
            _ => Err(anyhow::anyhow!("Invalid course status: {}", s)),
        }
    }
}

/// Target audience level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
    #[default]
    All,
}

impl fmt::Display for CourseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CourseLevel::Beginner => "beginner",
            CourseLevel::Intermediate => "intermediate",
            CourseLevel::Advanced => "advanced",
            CourseLevel::All => "all",
        };
        f.write_str(s)
    }
}

impl FromStr for CourseLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(CourseLevel::Beginner),
            "intermediate" => Ok(CourseLevel::Intermediate),
            "advanced" => Ok(CourseLevel::Advanced),
            "all" => Ok(CourseLevel::All),
            _ => Err(anyhow::anyhow!("Invalid course level: {}", s)),
        }
    }
}

/// Section of a course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseModule {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub position: i64,
}

/// Lesson entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub module_id: i64,
    pub course_id: i64,
    pub title: String,
    pub content: String,
    pub video_url: Option<String>,
    pub duration_minutes: i64,
    pub position: i64,
    pub is_preview: bool,
}

/// Instructor reference embedded in course listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructorRef {
    pub id: i64,
    pub name: String,
}

/// Public catalogue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub thumbnail: Option<String>,
    pub price_cents: i64,
    pub category: String,
    pub level: CourseLevel,
    pub instructor: InstructorRef,
    pub lesson_count: i64,
    pub enrollment_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Course as seen from the instructor dashboard (any status)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructorCourse {
    #[serde(flatten)]
    pub course: Course,
    pub lesson_count: i64,
    pub enrollment_count: i64,
}

/// Lesson as shown in a course outline; body fields are withheld when locked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonOutline {
    pub id: i64,
    pub title: String,
    pub duration_minutes: i64,
    pub position: i64,
    pub is_preview: bool,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

impl LessonOutline {
    pub fn from_lesson(lesson: Lesson, unlocked: bool) -> Self {
        let open = unlocked || lesson.is_preview;
        Self {
            id: lesson.id,
            title: lesson.title,
            duration_minutes: lesson.duration_minutes,
            position: lesson.position,
            is_preview: lesson.is_preview,
            locked: !open,
            content: open.then_some(lesson.content),
            video_url: if open { lesson.video_url } else { None },
        }
    }
}

/// Module with its lessons
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutline {
    pub id: i64,
    pub title: String,
    pub position: i64,
    pub lessons: Vec<LessonOutline>,
}

/// Full course page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub instructor: InstructorRef,
    pub modules: Vec<ModuleOutline>,
    pub lesson_count: i64,
    pub enrollment_count: i64,
    pub is_enrolled: bool,
}

/// Catalogue filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFilter {
    /// Case-insensitive match on title or description
    pub search: Option<String>,
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
}

impl CourseFilter {
    /// Stable cache key fragment for this filter
    pub fn cache_key(&self) -> String {
        format!(
            "s={}&c={}&l={}",
            self.search.as_deref().unwrap_or(""),
            self.category.as_deref().unwrap_or(""),
            self.level.map(|l| l.to_string()).unwrap_or_default()
        )
    }
}

/// Input for creating a course
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCourseInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub level: CourseLevel,
}

fn default_category() -> String {
    "general".to_string()
}

/// Partial course update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub price_cents: Option<i64>,
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
}

/// Input for adding a module
#[derive(Debug, Clone, Deserialize)]
pub struct CreateModuleInput {
    pub title: String,
}

/// Input for adding a lesson to a module
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLessonInput {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub duration_minutes: i64,
    #[serde(default)]
    pub is_preview: bool,
}

/// Per-course line of the instructor stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEnrollmentStat {
    pub course_id: i64,
    pub title: String,
    pub enrollments: i64,
}

/// Instructor dashboard numbers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstructorStats {
    pub total_courses: i64,
    pub published_courses: i64,
    pub total_students: i64,
    pub total_enrollments: i64,
    pub total_revenue_cents: i64,
    pub top_courses: Vec<CourseEnrollmentStat>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(is_preview: bool) -> Lesson {
        Lesson {
            id: 1,
            module_id: 1,
            course_id: 1,
            title: "Intro".to_string(),
            content: "Welcome".to_string(),
            video_url: Some("https://video.example.com/1".to_string()),
            duration_minutes: 5,
            position: 1,
            is_preview,
        }
    }

    #[test]
    fn test_locked_lesson_hides_body() {
        let outline = LessonOutline::from_lesson(lesson(false), false);
        assert!(outline.locked);
        assert!(outline.content.is_none());
        assert!(outline.video_url.is_none());

        let json = serde_json::to_value(&outline).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["locked"], true);
    }

    #[test]
    fn test_preview_and_unlocked_lessons_show_body() {
        let preview = LessonOutline::from_lesson(lesson(true), false);
        assert!(!preview.locked);
        assert_eq!(preview.content.as_deref(), Some("Welcome"));

        let enrolled = LessonOutline::from_lesson(lesson(false), true);
        assert!(!enrolled.locked);
        assert!(enrolled.video_url.is_some());
    }

    #[test]
    fn test_enum_round_trips() {
        for level in [
            CourseLevel::Beginner,
            CourseLevel::Intermediate,
            CourseLevel::Advanced,
            CourseLevel::All,
        ] {
            assert_eq!(level.to_string().parse::<CourseLevel>().unwrap(), level);
        }
        assert_eq!("PUBLISHED".parse::<CourseStatus>().unwrap(), CourseStatus::Published);
        assert!("archived".parse::<CourseStatus>().is_err());
    }

    #[test]
    fn test_filter_cache_key_distinguishes_filters() {
        let a = CourseFilter {
            search: Some("rust".to_string()),
            ..Default::default()
        };
        let b = CourseFilter {
            category: Some("rust".to_string()),
            ..Default::default()
        };
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(CourseFilter::default().cache_key(), "s=&c=&l=");
    }
}
