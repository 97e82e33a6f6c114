use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::database::models::{Review, ReviewFeedItem};
use crate::database::Repository;
use crate::error::{ApiError, AppResult};
use crate::filter::{Condition, FilterData, FilterOrderInfo, PageMeta, PaginationQuery, SortDirection};
use crate::middleware::AuthUser;
use crate::services::cascade;

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewInput {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    pub comment: Option<String>,
}

pub struct ReviewService {
    pool: PgPool,
}

impl ReviewService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn feed(&self) -> Repository<ReviewFeedItem> {
        Repository::new("review_feed", self.pool.clone())
    }

    /// Create or replace the caller's review, then re-aggregate the course
    /// while holding its row lock.
    pub async fn upsert(&self, user_id: Uuid, course_id: Uuid, input: ReviewInput) -> AppResult<Review> {
        let mut tx = self.pool.begin().await?;

        if cascade::lock_courses(&mut tx, &[course_id]).await?.is_empty() {
            return Err(ApiError::not_found("Course not found"));
        }

        let enrolled = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;
        if !enrolled {
            return Err(ApiError::forbidden("You must be enrolled in this course to review it"));
        }

        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (id, user_id, course_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT reviews_user_course_key
            DO UPDATE SET rating = EXCLUDED.rating, comment = EXCLUDED.comment, updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .bind(input.rating)
        .bind(input.comment)
        .fetch_one(&mut *tx)
        .await?;

        cascade::recompute_course_rating(&mut tx, course_id).await?;
        tx.commit().await?;
        Ok(review)
    }

    pub async fn course_reviews(&self, course_id: Uuid, query: &PaginationQuery) -> AppResult<(Vec<ReviewFeedItem>, PageMeta)> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM courses WHERE id = $1)")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(ApiError::not_found("Course not found"));
        }
        self.page(Condition::eq("course_id", course_id), query).await
    }

    pub async fn my_reviews(&self, user_id: Uuid, query: &PaginationQuery) -> AppResult<(Vec<ReviewFeedItem>, PageMeta)> {
        self.page(Condition::eq("user_id", user_id), query).await
    }

    /// 404 covers both a missing review and one the caller may not touch.
    pub async fn delete(&self, auth: &AuthUser, review_id: Uuid) -> AppResult<()> {
        let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await?
            .filter(|r| auth.can_manage(r.user_id))
            .ok_or_else(|| ApiError::not_found("Review not found"))?;

        let mut tx = self.pool.begin().await?;
        cascade::lock_courses(&mut tx, &[review.course_id]).await?;
        let deleted = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(ApiError::not_found("Review not found"));
        }
        cascade::recompute_course_rating(&mut tx, review.course_id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn page(&self, scope: Condition, query: &PaginationQuery) -> AppResult<(Vec<ReviewFeedItem>, PageMeta)> {
        let page = query.page_request();
        let (rows, total) = self
            .feed()
            .select_page(FilterData {
                conditions: vec![scope],
                order: vec![FilterOrderInfo::new("created_at", SortDirection::Desc)],
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
    fn rating_must_be_one_to_five() {
        for (rating, ok) in [(0, false), (1, true), (5, true), (6, false)] {
            let input = ReviewInput { rating, comment: None };
            assert_eq!(input.validate().is_ok(), ok, "rating {}", rating);
        }
    }
}
