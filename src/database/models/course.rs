use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::quiz::QuizView;
use super::review::ReviewFeedItem;

/// Row of the `courses` table
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub overview: String,
    pub duration: String,
    pub learning_points: Vec<String>,
    pub provider_id: Uuid,
    pub sub_sub_group_id: Uuid,
    pub resources: Vec<String>,
    pub video_url: Option<String>,
    pub video_uploaded: bool,
    pub rating: f64,
    pub total_ratings: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of `course_catalog`: course with provider and taxonomy chain
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CourseListItem {
    pub id: Uuid,
    pub name: String,
    pub overview: String,
    pub duration: String,
    pub learning_points: Vec<String>,
    pub resources: Vec<String>,
    pub video_url: Option<String>,
    pub video_uploaded: bool,
    pub rating: f64,
    pub total_ratings: i32,
    pub provider_id: Uuid,
    pub provider_name: String,
    pub provider_email: String,
    pub sub_sub_group_id: Uuid,
    pub sub_sub_group_name: String,
    pub sub_group_id: Uuid,
    pub sub_group_name: String,
    pub group_id: Uuid,
    pub group_name: String,
    pub enrollment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseListItem,
    pub reviews: Vec<ReviewFeedItem>,
    pub quiz: Option<QuizView>,
}
