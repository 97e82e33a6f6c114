// HTTP API Error Types
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::multipart::MultipartError,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

/// One entry of the `errorMessages` array in the error envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMessage {
    pub path: String,
    pub message: String,
}

impl ErrorMessage {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Vec<ErrorMessage>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
    RouteNotFound { path: String },

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

pub type AppResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::RouteNotFound { .. } => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::RouteNotFound { .. } => "Not Found",
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Entries for the `errorMessages` array. Plain errors report a single
    /// entry with an empty path.
    pub fn error_messages(&self) -> Vec<ErrorMessage> {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                if field_errors.is_empty() {
                    vec![ErrorMessage::new("", message.clone())]
                } else {
                    field_errors.clone()
                }
            }
            ApiError::RouteNotFound { path } => vec![ErrorMessage::new(path.clone(), "API Not Found")],
            other => vec![ErrorMessage::new("", other.message())],
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "message": self.message(),
            "errorMessages": self.error_messages(),
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Vec<ErrorMessage>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn route_not_found(path: impl Into<String>) -> Self {
        ApiError::RouteNotFound { path: path.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

/// Map a named Postgres constraint violation onto the domain error clients see.
/// Returns `None` for codes and constraints that have no domain meaning.
pub fn constraint_violation(code: &str, constraint: Option<&str>) -> Option<ApiError> {
    let constraint = constraint?;
    let error = match (code, constraint) {
        // unique_violation
        ("23505", "users_email_key") => ApiError::bad_request("Email already exists"),
        ("23505", "users_student_id_key") => ApiError::bad_request("Student ID already exists"),
        ("23505", "course_groups_name_key") => ApiError::bad_request("Course group name already exists"),
        ("23505", "course_sub_groups_name_key") => ApiError::bad_request("Course sub-group name already exists"),
        ("23505", "course_sub_sub_groups_name_key") => {
            ApiError::bad_request("Course sub-sub-group name already exists")
        }
        ("23505", "courses_name_key") => ApiError::bad_request("Course name already exists"),
        ("23505", "quizzes_course_id_key") => ApiError::bad_request("Quiz already exists for this course"),
        ("23505", "quiz_attempts_user_quiz_key") => ApiError::bad_request("You have already attempted this quiz"),
        ("23505", "enrollments_user_course_key") => ApiError::conflict("Already enrolled in this course"),
        ("23505", "certificates_user_course_key") => ApiError::conflict("Certificate already issued for this course"),
        ("23505", "reviews_user_course_key") => ApiError::bad_request("You have already reviewed this course"),

        // foreign_key_violation
        ("23503", "course_sub_groups_group_id_fkey") => {
            ApiError::bad_request("Course group is still referenced by sub-groups")
        }
        ("23503", "course_sub_sub_groups_sub_group_id_fkey") => {
            ApiError::bad_request("Course sub-group is still referenced by sub-sub-groups")
        }
        ("23503", "courses_sub_sub_group_id_fkey") => {
            ApiError::bad_request("Course sub-sub-group is still referenced by courses")
        }
        ("23503", "courses_provider_id_fkey") => ApiError::bad_request("Provider is still referenced by courses"),
        ("23503", _) => ApiError::bad_request("Operation violates a relationship between records"),

        // check_violation
        ("23514", "reviews_rating_check") => ApiError::bad_request("Rating must be between 1 and 5"),

        _ => return None,
    };
    Some(error)
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if let Some(mapped) = constraint_violation(&code, db_err.constraint()) {
                    return mapped;
                }
            }
        }
        // Log the real error but return generic message
        tracing::error!("SQLx error: {}", err);
        ApiError::internal_server_error("Database error occurred")
    }
}

impl From<crate::database::manager::DatabaseError> for ApiError {
    fn from(err: crate::database::manager::DatabaseError) -> Self {
        use crate::database::manager::DatabaseError;
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Database configuration error: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::QueryError(msg) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Database query error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            DatabaseError::Migration(e) => {
                tracing::error!("Migration error: {}", e);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            DatabaseError::Sqlx(sqlx_err) => ApiError::from(sqlx_err),
        }
    }
}

impl From<crate::filter::error::FilterError> for ApiError {
    fn from(err: crate::filter::error::FilterError) -> Self {
        use crate::filter::error::FilterError;
        match err {
            FilterError::InvalidSort(field) => ApiError::validation_error(
                "Invalid sort parameter",
                vec![ErrorMessage::new("sortBy", format!("Cannot sort by '{}'", field))],
            ),
            other => {
                tracing::error!("Filter error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::auth::JwtError> for ApiError {
    fn from(err: crate::auth::JwtError) -> Self {
        use crate::auth::JwtError;
        match err {
            JwtError::InvalidToken(_) | JwtError::Expired => ApiError::unauthorized("Invalid or expired token"),
            other => {
                tracing::error!("Credential error: {}", other);
                ApiError::internal_server_error("Unable to process credentials")
            }
        }
    }
}

impl From<crate::billing::BillingError> for ApiError {
    fn from(err: crate::billing::BillingError) -> Self {
        use crate::billing::BillingError;
        match err {
            BillingError::NotConfigured => ApiError::service_unavailable("Billing is not configured"),
            BillingError::Api { status, message } if (400..500).contains(&status) => ApiError::bad_request(message),
            other => {
                tracing::error!("Billing provider error: {}", other);
                ApiError::bad_gateway("Billing provider request failed")
            }
        }
    }
}

impl From<crate::storage::StorageError> for ApiError {
    fn from(err: crate::storage::StorageError) -> Self {
        use crate::storage::StorageError;
        match err {
            StorageError::NotFound(_) => ApiError::not_found("File not found"),
            StorageError::ForeignUrl(url) => ApiError::bad_request(format!("URL is not managed by this server: {}", url)),
            StorageError::NotConfigured(what) => {
                tracing::error!("Storage is not configured: {}", what);
                ApiError::service_unavailable("File storage is not configured")
            }
            other => {
                tracing::error!("Storage error: {}", other);
                ApiError::bad_gateway("File storage request failed")
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut field_errors: Vec<ErrorMessage> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}", field));
                    ErrorMessage::new(field.to_string(), message)
                })
            })
            .collect();
        field_errors.sort_by(|a, b| a.path.cmp(&b.path));
        ApiError::validation_error("Validation Error", field_errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation_error("Invalid query parameters", vec![ErrorMessage::new("query", rejection.body_text())])
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation_error("Invalid path parameter", vec![ErrorMessage::new("params", rejection.body_text())])
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::bad_request(format!("Invalid upload: {}", err.body_text()))
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_render_single_entry() {
        let body = ApiError::not_found("Course not found").to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Course not found");
        assert_eq!(body["errorMessages"], json!([{ "path": "", "message": "Course not found" }]));
    }

    #[test]
    fn route_not_found_reports_path() {
        let err = ApiError::route_not_found("/api/v1/nope");
        assert_eq!(err.status_code(), 404);
        let body = err.to_json();
        assert_eq!(body["message"], "Not Found");
        assert_eq!(body["errorMessages"][0]["path"], "/api/v1/nope");
        assert_eq!(body["errorMessages"][0]["message"], "API Not Found");
    }

    #[test]
    fn validation_errors_keep_field_paths() {
        let err = ApiError::validation_error(
            "Validation Error",
            vec![ErrorMessage::new("rating", "Rating must be between 1 and 5")],
        );
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_json()["errorMessages"][0]["path"], "rating");
    }

    #[test]
    fn maps_unique_violations_by_constraint() {
        let err = constraint_violation("23505", Some("enrollments_user_course_key")).unwrap();
        assert_eq!(err.status_code(), 409);

        let err = constraint_violation("23505", Some("users_email_key")).unwrap();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message(), "Email already exists");

        let err = constraint_violation("23505", Some("courses_name_key")).unwrap();
        assert_eq!(err.message(), "Course name already exists");
    }

    #[test]
    fn maps_foreign_key_violations_to_bad_request() {
        let err = constraint_violation("23503", Some("course_sub_groups_group_id_fkey")).unwrap();
        assert_eq!(err.status_code(), 400);

        let err = constraint_violation("23503", Some("something_else_fkey")).unwrap();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn unknown_codes_are_not_mapped() {
        assert!(constraint_violation("23505", None).is_none());
        assert!(constraint_violation("40001", Some("users_email_key")).is_none());
        assert!(constraint_violation("23505", Some("unknown_key")).is_none());
    }
}
