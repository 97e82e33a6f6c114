use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::Role;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
    pub profile_image: Option<String>,
    pub student_id: Option<String>,
    pub access_end_date: DateTime<Utc>,
    pub last_login_date: DateTime<Utc>,
    pub stripe_customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_access(&self, now: DateTime<Utc>) -> bool {
        self.access_end_date > now
    }
}

/// Admin view of a user with activity counts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub enrollment_count: i64,
    pub quiz_attempt_count: i64,
    pub certificate_count: i64,
}
