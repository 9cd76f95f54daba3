//! Centralized Error Handling Module
//!
//! Every failure carries a unique code so logs and API responses can be
//! grouped without parsing messages.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - UPSTREAM_xxx: third-party provider errors
//! - API_xxx: inbound request errors
//! - CFG_xxx: configuration errors
//! - STREAM_xxx: SSE / WebSocket relay errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

use crate::api::types::{ApiError, ApiResponse, Meta};

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Upstream Errors
    // ============================================
    /// Could not connect to provider
    UpstreamConnectionFailed,
    /// Provider request timed out
    UpstreamTimeout,
    /// Provider answered HTTP 429
    UpstreamRateLimited,
    /// Provider answered 5xx
    UpstreamServerError,
    /// Provider rejected the request (4xx other than 429)
    UpstreamRejected,
    /// Provider body did not match the expected shape
    UpstreamInvalidResponse,
    /// Every provider in a fallback chain failed
    UpstreamExhausted,

    // ============================================
    // API Errors
    // ============================================
    ApiBadRequest,
    ApiUnauthorized,
    ApiRateLimited,
    ApiInternalError,
    ApiNotFound,

    // ============================================
    // Configuration Errors
    // ============================================
    ConfigInvalidValue,
    ConfigMissingApiKey,

    // ============================================
    // Stream Errors
    // ============================================
    StreamRelayUnavailable,

    // ============================================
    // Generic Errors
    // ============================================
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpstreamConnectionFailed => "UPSTREAM_CONNECTION_FAILED",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamRateLimited => "UPSTREAM_RATE_LIMITED",
            Self::UpstreamServerError => "UPSTREAM_SERVER_ERROR",
            Self::UpstreamRejected => "UPSTREAM_REJECTED",
            Self::UpstreamInvalidResponse => "UPSTREAM_INVALID_RESPONSE",
            Self::UpstreamExhausted => "UPSTREAM_EXHAUSTED",

            Self::ApiBadRequest => "API_BAD_REQUEST",
            Self::ApiUnauthorized => "API_UNAUTHORIZED",
            Self::ApiRateLimited => "API_RATE_LIMITED",
            Self::ApiInternalError => "API_INTERNAL_ERROR",
            Self::ApiNotFound => "API_NOT_FOUND",

            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::ConfigMissingApiKey => "CFG_MISSING_API_KEY",

            Self::StreamRelayUnavailable => "STREAM_RELAY_UNAVAILABLE",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ApiBadRequest | Self::ConfigInvalidValue => 400,
            Self::ApiUnauthorized => 401,
            Self::ApiNotFound => 404,
            Self::ApiRateLimited => 429,
            Self::UpstreamConnectionFailed
            | Self::UpstreamServerError
            | Self::UpstreamRejected
            | Self::UpstreamInvalidResponse
            | Self::UpstreamExhausted
            | Self::UpstreamRateLimited => 502,
            Self::UpstreamTimeout => 504,
            Self::StreamRelayUnavailable | Self::ConfigMissingApiKey => 503,
            _ => 500,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTimeout
                | Self::UpstreamRateLimited
                | Self::UpstreamConnectionFailed
                | Self::UpstreamServerError
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiNotFound, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInternalError, msg)
    }

    pub fn upstream_status(provider: &str, status: reqwest::StatusCode) -> Self {
        let code = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            ErrorCode::UpstreamRateLimited
        } else if status.is_server_error() {
            ErrorCode::UpstreamServerError
        } else {
            ErrorCode::UpstreamRejected
        };
        Self::new(code, format!("{} returned HTTP {}", provider, status.as_u16()))
    }

    pub fn exhausted(what: &str) -> Self {
        Self::new(
            ErrorCode::UpstreamExhausted,
            format!("All providers failed for {}", what),
        )
    }

    pub fn missing_api_key(key_name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingApiKey,
            format!("Missing API key: {}", key_name),
        )
    }

    pub fn relay_unavailable() -> Self {
        Self::new(ErrorCode::StreamRelayUnavailable, "Live relay is disabled")
    }
}

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        // Provider code wraps AppError in eyre; recover the original code
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(err) => Self::new(ErrorCode::Unknown, err.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::UpstreamTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::UpstreamConnectionFailed, "Connection failed")
        } else if err.is_decode() {
            Self::with_source(ErrorCode::UpstreamInvalidResponse, "Response decode failed", err)
        } else if let Some(status) = err.status() {
            Self::upstream_status("upstream", status)
        } else {
            Self::new(ErrorCode::Unknown, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::UpstreamInvalidResponse, "JSON parse error", err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ApiResponse::<()>::error(
            ApiError::new(self.code_str(), self.message),
            Meta::empty(),
        );
        (status, Json(body)).into_response()
    }
}
