//! API error handling.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use bdgeo_core::error::GeoError;

/// A single failed field check.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    /// Parameter name
    pub field: String,
    /// What is wrong with it
    pub message: String,
    /// The rejected value
    pub value: String,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    errors: Vec<FieldError>,
    detail: Option<String>,
    empty_data: bool,
    retry_after: Option<Duration>,
    allowed_methods: Option<&'static [&'static str]>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: Vec::new(),
            detail: None,
            empty_data: false,
            retry_after: None,
            allowed_methods: None,
        }
    }

    /// Bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Not found error. The body carries an empty `data` list.
    pub fn not_found(message: impl Into<String>) -> Self {
        let mut err = Self::new(StatusCode::NOT_FOUND, message);
        err.empty_data = true;
        err
    }

    /// Internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Backing store unavailable.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Parameter validation failure.
    pub fn validation(errors: Vec<FieldError>) -> Self {
        let mut err = Self::new(StatusCode::BAD_REQUEST, "Validation failed");
        err.errors = errors;
        err
    }

    /// Rate limit exceeded.
    pub fn too_many_requests(retry_after: Duration) -> Self {
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests, please try again later",
        );
        err.retry_after = Some(retry_after);
        err
    }

    /// Only GET is served on this route.
    pub fn method_not_allowed(method: &str) -> Self {
        let mut err = Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("Method {method} not allowed for this endpoint. Only GET requests are supported."),
        );
        err.allowed_methods = Some(&["GET"]);
        err
    }

    /// Missing or wrong credentials.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// Endpoint closed by configuration.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// Unknown route.
    pub fn route_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "API endpoint not found. Please check the URL.")
    }

    /// Translates a store error, attaching internal details when `diagnostics` is on.
    ///
    /// `context` is the message shown for unexpected faults.
    pub fn from_store(err: GeoError, context: &str, diagnostics: bool) -> Self {
        let mut api = match err {
            GeoError::InvalidArgument(message) => return Self::bad_request(message),
            GeoError::NotFound(message) => return Self::not_found(message),
            GeoError::UpstreamUnavailable(_) => {
                tracing::warn!(error = %err, "Store unavailable");
                Self::unavailable("Database connection error")
            }
            _ => {
                tracing::error!(error = %err, "Store failure");
                Self::internal(context)
            }
        };
        if diagnostics {
            api.detail = Some(err.to_string());
        }
        api
    }

    /// HTTP status of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// User-visible message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error response body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse<'a> {
    success: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<[(); 0]>,
    #[serde(skip_serializing_if = "<[FieldError]>::is_empty")]
    errors: &'a [FieldError],
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_methods: Option<&'static [&'static str]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    timestamp: DateTime<Utc>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            message: &self.message,
            data: self.empty_data.then_some([]),
            errors: &self.errors,
            allowed_methods: self.allowed_methods,
            error: self.detail.as_deref(),
            timestamp: Utc::now(),
        };

        let mut response = (self.status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after {
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        if self.allowed_methods.is_some() {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET"));
        }
        response
    }
}

impl From<GeoError> for ApiError {
    fn from(err: GeoError) -> Self {
        ApiError::from_store(err, "An internal error occurred", false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_has_empty_data() {
        let (status, json) = body_json(ApiError::not_found("No unions found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert_eq!(json["data"], serde_json::json!([]));
        assert!(json.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_validation_lists_fields() {
        let err = ApiError::validation(vec![FieldError {
            field: "id".into(),
            message: "ID parameter is required".into(),
            value: "".into(),
        }]);
        let (status, json) = body_json(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Validation failed");
        assert_eq!(json["errors"][0]["field"], "id");
    }

    #[tokio::test]
    async fn test_store_error_mapping() {
        let unavailable = ApiError::from_store(
            GeoError::UpstreamUnavailable("timed out".into()),
            "Failed to retrieve divisions.",
            false,
        );
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.message(), "Database connection error");

        let short = ApiError::from(GeoError::InvalidArgument("too short".into()));
        assert_eq!(short.status(), StatusCode::BAD_REQUEST);
        assert_eq!(short.message(), "too short");
    }

    #[tokio::test]
    async fn test_internal_detail_only_with_diagnostics() {
        let hidden = ApiError::from_store(GeoError::Internal("boom".into()), "Failed.", false);
        let (_, json) = body_json(hidden).await;
        assert!(json.get("error").is_none());

        let shown = ApiError::from_store(GeoError::Internal("boom".into()), "Failed.", true);
        let (status, json) = body_json(shown).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Failed.");
        assert!(json["error"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_rate_limit_sets_retry_after() {
        let response = ApiError::too_many_requests(Duration::from_millis(2500)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }
}
