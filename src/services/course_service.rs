use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::database::models::{Course, CourseDetail, CourseListItem, ReviewFeedItem};
use crate::database::Repository;
use crate::error::{ApiError, AppResult};
use crate::filter::{Condition, FilterData, FilterOrder, FilterOrderInfo, PageMeta, PaginationQuery, SortDirection};
use crate::middleware::AuthUser;
use crate::services::{cascade, quiz_service};

const SORTABLE: &[(&str, &str)] = &[
    ("createdAt", "created_at"),
    ("name", "name"),
    ("rating", "rating"),
    ("totalRatings", "total_ratings"),
];

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseInput {
    #[validate(custom(function = "crate::extract::not_blank", message = "Course name is required"))]
    pub name: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub learning_points: Vec<String>,
    pub sub_sub_group_id: Uuid,
    #[serde(default)]
    pub resources: Vec<String>,
    #[validate(url(message = "Video URL must be a valid URL"))]
    pub video_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseInput {
    #[validate(custom(function = "crate::extract::not_blank", message = "Course name cannot be empty"))]
    pub name: Option<String>,
    pub overview: Option<String>,
    pub duration: Option<String>,
    pub learning_points: Option<Vec<String>>,
    pub sub_sub_group_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VideoInput {
    #[validate(length(min = 1, message = "Video URL is required"))]
    pub video_url: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInput {
    #[validate(length(min = 1, message = "Resource URL is required"))]
    pub resource_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseFilter {
    pub group_id: Option<Uuid>,
    pub sub_group_id: Option<Uuid>,
    pub sub_sub_group_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
}

impl CourseFilter {
    fn conditions(&self) -> Vec<Condition> {
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
        if let Some(id) = self.provider_id {
            conditions.push(Condition::eq("provider_id", id));
        }
        conditions
    }
}

pub struct CourseService {
    pool: PgPool,
}

impl CourseService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn catalog(&self) -> Repository<CourseListItem> {
        Repository::new("course_catalog", self.pool.clone())
    }

    /// The sub-sub-group is checked before anything is written; the caller
    /// becomes the provider.
    pub async fn create(&self, auth: &AuthUser, input: CreateCourseInput) -> AppResult<CourseListItem> {
        let sub_sub_group_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM course_sub_sub_groups WHERE id = $1)",
        )
        .bind(input.sub_sub_group_id)
        .fetch_one(&self.pool)
        .await?;
        if !sub_sub_group_exists {
            return Err(ApiError::not_found("Course sub-sub-group not found"));
        }

        let name = input.name.trim();
        let name_taken = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM courses WHERE name = $1)")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        if name_taken {
            return Err(ApiError::bad_request("Course name already exists"));
        }

        let course = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (id, name, overview, duration, learning_points, provider_id, sub_sub_group_id, resources, video_url, video_uploaded)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(input.overview)
        .bind(input.duration)
        .bind(input.learning_points)
        .bind(auth.id)
        .bind(input.sub_sub_group_id)
        .bind(input.resources)
        .bind(input.video_url.as_deref())
        .bind(input.video_url.is_some())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(course_id = %course.id, provider_id = %auth.id, "Course created");
        self.list_item(course.id).await
    }

    pub async fn list(
        &self,
        query: &PaginationQuery,
        filter: &CourseFilter,
    ) -> AppResult<(Vec<CourseListItem>, PageMeta)> {
        let page = query.page_request();
        let mut conditions = filter.conditions();
        if let Some(term) = query.search() {
            conditions.push(Condition::search(&["name", "overview"], term));
        }

        let (rows, total) = self
            .catalog()
            .select_page(FilterData {
                conditions,
                order: FilterOrder::resolve(query.sort_by.as_deref(), query.sort_order.as_deref(), SORTABLE, "createdAt")?,
                limit: Some(page.limit),
                offset: Some(page.offset()),
                ..Default::default()
            })
            .await?;
        Ok((rows, PageMeta::new(page, total)))
    }

    pub async fn detail(&self, id: Uuid) -> AppResult<CourseDetail> {
        let course = self.list_item(id).await?;
        let reviews = Repository::<ReviewFeedItem>::new("review_feed", self.pool.clone())
            .select_any(FilterData {
                conditions: vec![Condition::eq("course_id", id)],
                order: vec![FilterOrderInfo::new("created_at", SortDirection::Desc)],
                ..Default::default()
            })
            .await?;
        let quiz = quiz_service::load_quiz_view(&self.pool, id, false).await?;

        Ok(CourseDetail { course, reviews, quiz })
    }

    pub async fn update(&self, auth: &AuthUser, id: Uuid, input: UpdateCourseInput) -> AppResult<CourseListItem> {
        self.owned_course(auth, id).await?;

        if let Some(sub_sub_group_id) = input.sub_sub_group_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM course_sub_sub_groups WHERE id = $1)",
            )
            .bind(sub_sub_group_id)
            .fetch_one(&self.pool)
            .await?;
            if !exists {
                return Err(ApiError::not_found("Course sub-sub-group not found"));
            }
        }

        sqlx::query(
            r#"
            UPDATE courses SET
                name = COALESCE($2, name),
                overview = COALESCE($3, overview),
                duration = COALESCE($4, duration),
                learning_points = COALESCE($5, learning_points),
                sub_sub_group_id = COALESCE($6, sub_sub_group_id),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.overview)
        .bind(input.duration)
        .bind(input.learning_points)
        .bind(input.sub_sub_group_id)
        .execute(&self.pool)
        .await?;

        self.list_item(id).await
    }

    pub async fn delete(&self, auth: &AuthUser, id: Uuid) -> AppResult<()> {
        self.owned_course(auth, id).await?;

        let mut tx = self.pool.begin().await?;
        if !cascade::purge_course(&mut tx, id).await? {
            return Err(ApiError::not_found("Course not found"));
        }
        tx.commit().await?;

        tracing::info!(course_id = %id, "Course deleted");
        Ok(())
    }

    pub async fn set_video(&self, auth: &AuthUser, id: Uuid, video_url: &str) -> AppResult<Course> {
        let course = self.owned_course(auth, id).await?;
        if course.video_url.as_deref() == Some(video_url) {
            return Err(ApiError::bad_request("This video has already been uploaded to this course"));
        }

        let course = sqlx::query_as::<_, Course>(
            "UPDATE courses SET video_url = $2, video_uploaded = true, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(video_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(course)
    }

    pub async fn remove_video(&self, auth: &AuthUser, id: Uuid) -> AppResult<Course> {
        let course = self.owned_course(auth, id).await?;
        if course.video_url.is_none() {
            return Err(ApiError::not_found("No video exists for this course"));
        }

        let course = sqlx::query_as::<_, Course>(
            "UPDATE courses SET video_url = NULL, video_uploaded = false, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(course)
    }

    pub async fn add_resource(&self, auth: &AuthUser, id: Uuid, resource_url: &str) -> AppResult<Course> {
        let course = self.owned_course(auth, id).await?;
        if course.resources.iter().any(|r| r == resource_url) {
            return Err(ApiError::bad_request("This resource has already been added to this course"));
        }

        let course = sqlx::query_as::<_, Course>(
            "UPDATE courses SET resources = array_append(resources, $2), updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(resource_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(course)
    }

    /// Removing a URL that is not attached leaves the list unchanged.
    pub async fn remove_resource(&self, auth: &AuthUser, id: Uuid, resource_url: &str) -> AppResult<Course> {
        self.owned_course(auth, id).await?;

        let course = sqlx::query_as::<_, Course>(
            "UPDATE courses SET resources = array_remove(resources, $2), updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(resource_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(course)
    }

    pub async fn get_course(&self, id: Uuid) -> AppResult<Course> {
        Repository::<Course>::new("courses", self.pool.clone())
            .select_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))
    }

    /// 404 when missing, 403 unless the caller provides the course or is an admin.
    pub async fn owned_course(&self, auth: &AuthUser, id: Uuid) -> AppResult<Course> {
        let course = self.get_course(id).await?;
        if !auth.can_manage(course.provider_id) {
            return Err(ApiError::forbidden("You can only manage your own courses"));
        }
        Ok(course)
    }

    async fn list_item(&self, id: Uuid) -> AppResult<CourseListItem> {
        self.catalog()
            .select_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_conditions_follow_query_params() {
        let filter = CourseFilter {
            group_id: Some(Uuid::new_v4()),
            provider_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert_eq!(filter.conditions().len(), 2);
        assert!(CourseFilter::default().conditions().is_empty());
    }

    #[test]
    fn create_body_defaults_optional_lists() {
        let input: CreateCourseInput = serde_json::from_str(
            r#"{"name":"Rust 101","subSubGroupId":"6f1c1b9e-8a57-4c37-9a39-2f7bd0d1f0aa"}"#,
        )
        .unwrap();
        assert!(input.learning_points.is_empty());
        assert!(input.resources.is_empty());
        assert!(input.validate().is_ok());

        let blank: CreateCourseInput = serde_json::from_str(
            r#"{"name":"","subSubGroupId":"6f1c1b9e-8a57-4c37-9a39-2f7bd0d1f0aa"}"#,
        )
        .unwrap();
        assert!(blank.validate().is_err());

        let spaces: CreateCourseInput = serde_json::from_str(
            r#"{"name":"   ","subSubGroupId":"6f1c1b9e-8a57-4c37-9a39-2f7bd0d1f0aa"}"#,
        )
        .unwrap();
        assert!(spaces.validate().is_err());
    }

    #[test]
    fn update_rejects_whitespace_name_but_allows_omitting_it() {
        let rename = UpdateCourseInput { name: Some(" \t ".into()), ..Default::default() };
        assert!(rename.validate().is_err());
        assert!(UpdateCourseInput::default().validate().is_ok());
    }
}
