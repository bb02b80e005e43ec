/// Error types for Live Stream Service
///
/// Every failure a request can hit maps to exactly one variant here, and each
/// variant knows its HTTP status and response body. Nothing in this module is
/// retried; rate limiting hands the retry decision back to the caller through
/// `Retry-After`.
use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    HttpResponse,
};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for live-stream-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed, missing or oversized input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request schema violations, keyed by field name
    #[error("Validation error: invalid request fields")]
    InvalidFields(BTreeMap<String, Vec<String>>),

    /// Store stream already holds the maximum number of active featured products
    #[error("Featured product limit reached ({current}/{max})")]
    FeaturedCapacity { current: usize, max: usize },

    /// No (or an unusable) bearer token on an endpoint that needs one
    #[error("Authentication required")]
    Unauthenticated,

    /// Caller is not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Broadcaster KYC tier too low for the requested stream type
    #[error("KYC tier {required} required, current tier is {current}")]
    KycRequired {
        required: i16,
        current: i16,
        verification_url: String,
    },

    /// Unknown stream, message, product or session
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid state transition
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Fixed-window rate limit exhausted for this actor/stream/action
    #[error("Rate limit exceeded: {limit} requests per {window_seconds}s")]
    RateLimited {
        limit: u32,
        window_seconds: u64,
        retry_after_seconds: u64,
        current_count: u32,
    },

    /// Aggregated figures disagree with each other; never papered over
    #[error("Aggregation inconsistency: {0}")]
    AggregationInconsistency(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cache operation failed
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// External collaborator (catalog, etc.) failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::InvalidFields(_) => "validation_error",
            AppError::FeaturedCapacity { .. } => "featured_product_limit",
            AppError::Unauthenticated => "authentication_error",
            AppError::Forbidden(_) => "authorization_error",
            AppError::KycRequired { .. } => "kyc_required",
            AppError::NotFound(_) => "not_found_error",
            AppError::Conflict(_) => "conflict_error",
            AppError::RateLimited { .. } => "rate_limit_error",
            AppError::AggregationInconsistency(_) => "aggregation_inconsistency",
            AppError::Upstream(_) => "upstream_error",
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => "server_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidFields(_)
            | AppError::FeaturedCapacity { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::KycRequired { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::AggregationInconsistency(_)
            | AppError::Database(_)
            | AppError::Cache(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = json!({
            "error": self.to_string(),
            "error_type": self.kind(),
            "status": status.as_u16(),
        });

        match self {
            AppError::InvalidFields(fields) => {
                body["fields"] = json!(fields);
            }
            AppError::FeaturedCapacity { current, max } => {
                body["current_product_count"] = json!(current);
                body["max_allowed"] = json!(max);
            }
            AppError::KycRequired {
                required,
                current,
                verification_url,
            } => {
                body["required_kyc_tier"] = json!(required);
                body["current_kyc_tier"] = json!(current);
                body["verification_url"] = json!(verification_url);
            }
            AppError::RateLimited {
                limit,
                window_seconds,
                retry_after_seconds,
                current_count,
            } => {
                body["limit"] = json!(limit);
                body["window"] = json!(window_seconds);
                body["retry_after"] = json!(retry_after_seconds);
                body["current_count"] = json!(current_count);

                return HttpResponse::build(status)
                    .insert_header((header::RETRY_AFTER, retry_after_seconds.to_string()))
                    .json(body);
            }
            _ => {}
        }

        HttpResponse::build(status).json(body)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        AppError::InvalidFields(fields)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(err.to_string())
    }
}
