use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub enrolled_at: DateTime<Utc>,
}

/// Row of `enrollment_catalog`
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentListItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub student_id: Option<String>,
    pub course_id: Uuid,
    pub course_name: String,
    pub course_overview: String,
    pub video_url: Option<String>,
    pub provider_id: Uuid,
    pub provider_name: String,
    pub sub_sub_group_id: Uuid,
    pub sub_group_id: Uuid,
    pub group_id: Uuid,
    pub group_name: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub issued_at: DateTime<Utc>,
}

/// Row of `certificate_catalog`
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CertificateListItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub course_name: String,
    pub provider_id: Uuid,
    pub provider_name: String,
    pub sub_sub_group_id: Uuid,
    pub sub_group_id: Uuid,
    pub group_id: Uuid,
    pub group_name: String,
    pub issued_at: DateTime<Utc>,
}
