use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::{Certificate, CertificateListItem, Enrollment, EnrollmentListItem, QuizAttempt, User};
use crate::database::Repository;
use crate::error::{ApiError, AppResult};
use crate::filter::{Condition, FilterData, FilterOrder, FilterOrderInfo, PageMeta, PaginationQuery, SortDirection};
use crate::middleware::AuthUser;
use crate::services::cascade;
use crate::services::quiz_service::{is_passing, PASS_PERCENT};

const SORTABLE: &[(&str, &str)] = &[
    ("enrolledAt", "enrolled_at"),
    ("createdAt", "enrolled_at"),
    ("completedAt", "completed_at"),
    ("courseName", "course_name"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Completed,
    Ongoing,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentFilter {
    pub status: Option<EnrollmentStatus>,
    pub group_id: Option<Uuid>,
    pub sub_group_id: Option<Uuid>,
    pub sub_sub_group_id: Option<Uuid>,
}

impl EnrollmentFilter {
    fn conditions(&self) -> Vec<Condition> {
        let mut conditions = self.taxonomy_conditions();
        match self.status {
            Some(EnrollmentStatus::Completed) => conditions.push(Condition::eq("completed", true)),
            Some(EnrollmentStatus::Ongoing) => conditions.push(Condition::eq("completed", false)),
            None => {}
        }
        conditions
    }

    fn taxonomy_conditions(&self) -> Vec<Condition> {
        let mut conditions = vec![];
        if let Some(id) = self.group_id {
            conditions.push(Condition::eq("group_id", id));
        }
        if let Some(id) = self.sub_group_id {
            conditions.push(Condition::eq("sub_group_id", id));
        }
        if let Some(id) = self.sub_sub_group_id {
            conditions.push(Condition::eq("sub_sub_group_id", id));
        }
        conditions
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentCheck {
    pub is_enrolled: bool,
    pub completed: bool,
    pub enrollment: Option<Enrollment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub enrollment: Enrollment,
    pub certificate: Certificate,
}

pub struct EnrollmentService {
    pool: PgPool,
}

impl EnrollmentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn catalog(&self) -> Repository<EnrollmentListItem> {
        Repository::new("enrollment_catalog", self.pool.clone())
    }

    pub async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Enrollment> {
        let course_exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM courses WHERE id = $1)")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;
        if !course_exists {
            return Err(ApiError::not_found("Course not found"));
        }

        let user = Repository::<User>::new("users", self.pool.clone())
            .select_id(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        if !user.has_access(Utc::now()) {
            return Err(ApiError::forbidden("Your access period has expired"));
        }

        // duplicates surface as enrollments_user_course_key -> 409
        let enrollment = sqlx::query_as::<_, Enrollment>(
            "INSERT INTO enrollments (id, user_id, course_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = %user_id, course_id = %course_id, "Enrolled");
        Ok(enrollment)
    }

    /// Mark the enrollment complete and issue the certificate in one
    /// transaction. Courses with a quiz need a passing attempt first.
    pub async fn complete(&self, user_id: Uuid, course_id: Uuid) -> AppResult<CompletionResult> {
        let mut tx = self.pool.begin().await?;

        // course row first, same order as course deletion
        if cascade::lock_courses(&mut tx, &[course_id]).await?.is_empty() {
            return Err(ApiError::not_found("Course not found"));
        }

        let enrollment = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Enrollment not found"))?;

        if enrollment.completed {
            return Err(ApiError::conflict("Course already completed"));
        }

        let quiz_id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM quizzes WHERE course_id = $1")
            .bind(course_id)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(quiz_id) = quiz_id {
            let attempt = sqlx::query_as::<_, QuizAttempt>(
                "SELECT * FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2",
            )
            .bind(user_id)
            .bind(quiz_id)
            .fetch_optional(&mut *tx)
            .await?;

            let passed = attempt.is_some_and(|a| is_passing(a.score, a.total_questions));
            if !passed {
                return Err(ApiError::bad_request(format!(
                    "You must pass the course quiz with at least {}% before completing the course",
                    PASS_PERCENT
                )));
            }
        }

        let enrollment = sqlx::query_as::<_, Enrollment>(
            "UPDATE enrollments SET completed = true, completed_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(enrollment.id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO certificates (id, user_id, course_id) VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT certificates_user_course_key DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

        let certificate =
            sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE user_id = $1 AND course_id = $2")
                .bind(user_id)
                .bind(course_id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, course_id = %course_id, certificate_id = %certificate.id, "Course completed");
        Ok(CompletionResult { enrollment, certificate })
    }

    pub async fn check(&self, user_id: Uuid, course_id: Uuid) -> AppResult<EnrollmentCheck> {
        let enrollment =
            sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2")
                .bind(user_id)
                .bind(course_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(EnrollmentCheck {
            is_enrolled: enrollment.is_some(),
            completed: enrollment.as_ref().is_some_and(|e| e.completed),
            enrollment,
        })
    }

    pub async fn my_enrollments(
        &self,
        user_id: Uuid,
        query: &PaginationQuery,
        filter: &EnrollmentFilter,
    ) -> AppResult<(Vec<EnrollmentListItem>, PageMeta)> {
        let mut conditions = filter.conditions();
        conditions.push(Condition::eq("user_id", user_id));
        self.page(query, conditions, &["course_name"]).await
    }

    pub async fn my_certificates(&self, user_id: Uuid, filter: &EnrollmentFilter) -> AppResult<Vec<CertificateListItem>> {
        let mut conditions = filter.taxonomy_conditions();
        conditions.push(Condition::eq("user_id", user_id));

        Ok(Repository::<CertificateListItem>::new("certificate_catalog", self.pool.clone())
            .select_any(FilterData {
                conditions,
                order: vec![FilterOrderInfo::new("issued_at", SortDirection::Desc)],
                ..Default::default()
            })
            .await?)
    }

    /// Learners of one course, for its provider or an admin.
    pub async fn course_enrollments(
        &self,
        auth: &AuthUser,
        course_id: Uuid,
        query: &PaginationQuery,
        filter: &EnrollmentFilter,
    ) -> AppResult<(Vec<EnrollmentListItem>, PageMeta)> {
        let provider_id = sqlx::query_scalar::<_, Uuid>("SELECT provider_id FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))?;
        if !auth.can_manage(provider_id) {
            return Err(ApiError::forbidden("You can only view enrollments of your own courses"));
        }

        let mut conditions = filter.conditions();
        conditions.push(Condition::eq("course_id", course_id));
        self.page(query, conditions, &["user_name", "user_email", "student_id"]).await
    }

    async fn page(
        &self,
        query: &PaginationQuery,
        mut conditions: Vec<Condition>,
        search_columns: &[&str],
    ) -> AppResult<(Vec<EnrollmentListItem>, PageMeta)> {
        let page = query.page_request();
        if let Some(term) = query.search() {
            conditions.push(Condition::search(search_columns, term));
        }

        let (rows, total) = self
            .catalog()
            .select_page(FilterData {
                conditions,
                order: FilterOrder::resolve(query.sort_by.as_deref(), query.sort_order.as_deref(), SORTABLE, "enrolledAt")?,
                limit: Some(page.limit),
                offset: Some(page.offset()),
                ..Default::default()
            })
            .await?;
        Ok((rows, PageMeta::new(page, total)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_parses_and_maps() {
        let filter: EnrollmentFilter = serde_json::from_str(r#"{"status":"ongoing"}"#).unwrap();
        assert_eq!(filter.status, Some(EnrollmentStatus::Ongoing));
        assert_eq!(filter.conditions().len(), 1);
        assert!(filter.taxonomy_conditions().is_empty());

        assert!(serde_json::from_str::<EnrollmentFilter>(r#"{"status":"paused"}"#).is_err());
    }

    #[test]
    fn taxonomy_filters_stack() {
        let filter = EnrollmentFilter {
            group_id: Some(Uuid::new_v4()),
            sub_sub_group_id: Some(Uuid::new_v4()),
            status: Some(EnrollmentStatus::Completed),
            ..Default::default()
        };
        assert_eq!(filter.taxonomy_conditions().len(), 2);
        assert_eq!(filter.conditions().len(), 3);
    }
}
