use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{generate_jwt, hash_password, verify_password, Claims};
use crate::billing::BillingProvider;
use crate::database::models::{User, UserDetail};
use crate::database::Repository;
use crate::error::{ApiError, AppResult};
use crate::filter::{Condition, FilterData, FilterOrder, PageMeta, PaginationQuery};
use crate::services::cascade;
use crate::types::Role;

const SORTABLE: &[(&str, &str)] = &[
    ("createdAt", "created_at"),
    ("name", "name"),
    ("email", "email"),
    ("lastLoginDate", "last_login_date"),
];

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Option<Role>,
    pub profile_image: Option<String>,
    pub student_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    #[validate(length(min = 1, message = "Old password is required"))]
    pub old_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserInput {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "A valid email is required"))]
    pub email: Option<String>,
    pub student_id: Option<String>,
    pub profile_image: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    pub access_end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleInput {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginOutput {
    pub token: String,
    pub user: User,
}

pub struct UserService {
    pool: PgPool,
    billing: Arc<dyn BillingProvider>,
}

impl UserService {
    pub fn new(pool: PgPool, billing: Arc<dyn BillingProvider>) -> Self {
        Self { pool, billing }
    }

    fn users(&self) -> Repository<User> {
        Repository::new("users", self.pool.clone())
    }

    /// Public registration. ADMIN accounts come from the CLI or a role change.
    pub async fn register(&self, input: RegisterInput) -> AppResult<User> {
        let role = input.role.unwrap_or(Role::User);
        if role == Role::Admin {
            return Err(ApiError::bad_request("Invalid role"));
        }
        self.create_user(&input.name, &input.email, &input.password, role, input.profile_image, input.student_id)
            .await
    }

    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
        profile_image: Option<String>,
        student_id: Option<String>,
    ) -> AppResult<User> {
        if self.find_by_email(email).await?.is_some() {
            return Err(ApiError::bad_request("Email already exists"));
        }

        let now = Utc::now();
        let password_hash = hash_password(password)?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password, role, profile_image, student_id, access_end_date, last_login_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(profile_image)
        .bind(student_id)
        .bind(role.initial_access_end(now))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    pub async fn login(&self, input: LoginInput) -> AppResult<LoginOutput> {
        let user = self
            .find_by_email(&input.email)
            .await?
            .filter(|user| verify_password(&input.password, &user.password))
            .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

        let user = sqlx::query_as::<_, User>("UPDATE users SET last_login_date = now() WHERE id = $1 RETURNING *")
            .bind(user.id)
            .fetch_one(&self.pool)
            .await?;

        let token = generate_jwt(&Claims::new(user.id, user.role))?;
        Ok(LoginOutput { token, user })
    }

    pub async fn change_password(&self, user_id: Uuid, input: ChangePasswordInput) -> AppResult<()> {
        let user = self.get_user(user_id).await?;
        if !verify_password(&input.old_password, &user.password) {
            return Err(ApiError::unauthorized("Old password is incorrect"));
        }

        sqlx::query("UPDATE users SET password = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(hash_password(&input.new_password)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.users()
            .select_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub async fn update_profile(&self, id: Uuid, input: UpdateProfileInput) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name), profile_image = COALESCE($3, profile_image), updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.name)
        .bind(input.profile_image)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub async fn list(&self, query: &PaginationQuery) -> AppResult<(Vec<User>, PageMeta)> {
        let page = query.page_request();
        let mut conditions = vec![];
        if let Some(term) = query.search() {
            conditions.push(Condition::search(&["name", "email"], term));
        }

        let (rows, total) = self
            .users()
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

    pub async fn detail(&self, id: Uuid) -> AppResult<UserDetail> {
        let user = self.get_user(id).await?;
        let (enrollment_count, quiz_attempt_count, certificate_count): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM enrollments WHERE user_id = $1),
                (SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1),
                (SELECT COUNT(*) FROM certificates WHERE user_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserDetail {
            user,
            enrollment_count,
            quiz_attempt_count,
            certificate_count,
        })
    }

    pub async fn update(&self, id: Uuid, input: AdminUpdateUserInput) -> AppResult<User> {
        if let Some(email) = input.email.as_deref() {
            if self.taken_by_other("email", email, id).await? {
                return Err(ApiError::bad_request("Email already exists"));
            }
        }
        if let Some(student_id) = input.student_id.as_deref() {
            if self.taken_by_other("student_id", student_id, id).await? {
                return Err(ApiError::bad_request("Student ID already exists"));
            }
        }
        let password_hash = input.password.as_deref().map(hash_password).transpose()?;

        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                student_id = COALESCE($4, student_id),
                profile_image = COALESCE($5, profile_image),
                password = COALESCE($6, password),
                access_end_date = COALESCE($7, access_end_date),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.name)
        .bind(input.email)
        .bind(input.student_id)
        .bind(input.profile_image)
        .bind(password_hash)
        .bind(input.access_end_date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub async fn update_role(&self, id: Uuid, role: Role) -> AppResult<User> {
        sqlx::query_as::<_, User>("UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(role)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Cancel billing, then remove the user and every dependent row in one
    /// transaction. A failed cancellation is logged and does not block deletion.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let user = self.get_user(id).await?;

        if let Some(subscription_id) = user.subscription_id.as_deref() {
            if let Err(e) = self.billing.cancel_subscription(subscription_id).await {
                tracing::warn!(user_id = %id, "Failed to cancel subscription {} before deletion: {}", subscription_id, e);
            }
        }

        let mut tx = self.pool.begin().await?;
        if !cascade::purge_user(&mut tx, id).await? {
            return Err(ApiError::not_found("User not found"));
        }
        tx.commit().await?;

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users()
            .select_one(FilterData::where_all(vec![Condition::eq("email", email)]))
            .await?)
    }

    async fn taken_by_other(&self, column: &str, value: &str, id: Uuid) -> AppResult<bool> {
        let count = self
            .users()
            .count(FilterData::where_all(vec![Condition::eq(column, value), Condition::ne("id", id)]))
            .await?;
        Ok(count > 0)
    }
}
