//! Data models
//!
//! Database entities of the marketplace (users, courses, enrollments, blog
//! posts, carts, orders) together with the API-facing views and inputs built
//! from them.

mod blog;
mod commerce;
mod course;
mod enrollment;
mod pagination;
mod session;
mod user;

pub use blog::{
    trending_score, Blog, BlogAuthor, BlogComment, BlogCommentView, BlogDetail, BlogSort,
    BlogStatus, BlogSummary, CreateBlogInput, LikeState, UpdateBlogInput,
};
pub use commerce::{
    discount_for, CartItem, CartView, Coupon, CouponRejection, CreateCouponInput, NewOrder, Order,
    OrderCompletion, OrderItem, OrderStatus, WishlistItem,
};
pub use course::{
    Course, CourseDetail, CourseEnrollmentStat, CourseFilter, CourseLevel, CourseModule,
    CourseStatus, CourseSummary, CreateCourseInput, CreateLessonInput, CreateModuleInput,
    InstructorCourse, InstructorRef, InstructorStats, Lesson, LessonOutline, ModuleOutline,
    UpdateCourseInput,
};
pub use enrollment::{CourseProgress, Enrollment, EnrollmentWithCourse};
pub use pagination::{ListParams, PagedResult};
pub use session::Session;
pub use user::{
    gravatar_url, CreateUserInput, ExternalUserInput, InstructorProfile, StudentProfile, User,
    UserRole,
};
