pub mod cascade;
pub mod course_service;
pub mod dashboard_service;
pub mod enrollment_service;
pub mod file_service;
pub mod quiz_service;
pub mod review_service;
pub mod subscription_service;
pub mod taxonomy_service;
pub mod user_service;

pub use course_service::CourseService;
pub use dashboard_service::DashboardService;
pub use enrollment_service::EnrollmentService;
pub use file_service::FileService;
pub use quiz_service::QuizService;
pub use review_service::ReviewService;
pub use subscription_service::SubscriptionService;
pub use taxonomy_service::TaxonomyService;
pub use user_service::UserService;
