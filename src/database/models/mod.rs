pub mod course;
pub mod enrollment;
pub mod quiz;
pub mod review;
pub mod taxonomy;
pub mod user;

pub use course::{Course, CourseDetail, CourseListItem};
pub use enrollment::{Certificate, CertificateListItem, Enrollment, EnrollmentListItem};
pub use quiz::{Question, QuestionView, Quiz, QuizAttempt, QuizView};
pub use review::{Review, ReviewFeedItem};
pub use taxonomy::{
    CourseGroup, GroupTree, SubGroupListItem, SubGroupTree, SubSubGroupDetail, SubSubGroupListItem,
};
pub use user::{User, UserDetail};
