use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::filter::pagination::PageMeta;

/// Wrapper for API responses that automatically adds success envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<PageMeta>,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta: None,
            status_code: None, // Default to 200 OK
        }
    }

    /// Create a 201 Created response
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: Some(StatusCode::CREATED),
            ..Self::success(message, data)
        }
    }

    /// A page of results plus its `meta` block
    pub fn paginated(message: impl Into<String>, data: T, meta: PageMeta) -> Self {
        Self {
            meta: Some(meta),
            ..Self::success(message, data)
        }
    }
}

impl ApiResponse<()> {
    /// Envelope without a `data` member
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            meta: None,
            status_code: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let mut envelope = Map::new();
        envelope.insert("success".to_string(), Value::Bool(true));
        envelope.insert("message".to_string(), Value::String(self.message));

        if let Some(data) = self.data {
            // Convert data to JSON Value for consistent envelope format
            match serde_json::to_value(&data) {
                Ok(value) => {
                    envelope.insert("data".to_string(), value);
                }
                Err(e) => {
                    tracing::error!("Failed to serialize response data: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({
                            "success": false,
                            "message": "Failed to serialize response data",
                            "errorMessages": [{ "path": "", "message": "Failed to serialize response data" }]
                        })),
                    )
                        .into_response();
                }
            }
        }

        if let Some(meta) = self.meta {
            envelope.insert("meta".to_string(), json!(meta));
        }

        (status, Json(Value::Object(envelope))).into_response()
    }
}

// Convenience type alias
pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
