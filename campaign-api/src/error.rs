/// Error handling for the API server
///
/// Every handler returns `ApiResult<T>`. Failures from the shared crate are
/// converted with `?` and rendered as the uniform error envelope:
///
/// ```json
/// {
///   "status": "error",
///   "message": "Campaign not found",
///   "error": "not_found"
/// }
/// ```
///
/// Validation failures carry every violation in `errors` with status 422.

use std::fmt;

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use campaign_shared::{
    auth::{jwt::JwtError, password::PasswordError},
    donations::DonationError,
    payment::{PaymentError, WebhookError},
    uploads::UploadError,
    validation::{LookupError, ValidationError, Violations},
};
use serde::{Deserialize, Serialize};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. a duplicate email that slipped past validation
    Conflict(String),

    /// Payload too large (413)
    PayloadTooLarge(String),

    /// Unprocessable entity (422)
    Validation(Violations),

    /// Too many requests (429)
    RateLimitExceeded { retry_after: u64 },

    /// The payment gateway failed or timed out (502)
    BadGateway(String),

    /// Internal server error (500); the message is logged, never returned
    InternalError(String),
}

/// Error envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `"error"`
    pub status: String,

    pub message: String,

    /// Machine-readable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Field violations (validation failures only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Violations>,
}

impl ErrorResponse {
    fn new(message: impl Into<String>, code: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            error: Some(code.to_string()),
            errors: None,
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::Validation(errors) => write!(f, "Validation failed: {} errors", errors.len()),
            ApiError::RateLimitExceeded { retry_after } => {
                write!(f, "Rate limit exceeded, retry after {}s", retry_after)
            }
            ApiError::BadGateway(msg) => write!(f, "Payment gateway error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            ApiError::BadRequest(msg) => ErrorResponse::new(msg, "bad_request"),
            ApiError::Unauthorized(msg) => ErrorResponse::new(msg, "unauthorized"),
            ApiError::Forbidden(msg) => ErrorResponse::new(msg, "forbidden"),
            ApiError::NotFound(msg) => ErrorResponse::new(msg, "not_found"),
            ApiError::Conflict(msg) => ErrorResponse::new(msg, "conflict"),
            ApiError::PayloadTooLarge(msg) => ErrorResponse::new(msg, "payload_too_large"),
            ApiError::Validation(errors) => ErrorResponse {
                status: "error".to_string(),
                message: "Validation failed".to_string(),
                error: None,
                errors: Some(errors),
            },
            ApiError::RateLimitExceeded { retry_after } => {
                let body = ErrorResponse::new(
                    "Rate limit exceeded. Please try again later.",
                    "rate_limit_exceeded",
                );
                let mut response = (status, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                return response;
            }
            ApiError::BadGateway(msg) => {
                tracing::error!("Payment gateway error: {}", msg);
                ErrorResponse::new("Payment service is unavailable, please try again", "payment_gateway_error")
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ErrorResponse::new("Internal server error", "internal_error")
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                let constraint = db_err.constraint().unwrap_or_default();
                if constraint.contains("email") {
                    ApiError::Conflict("Email already exists".to_string())
                } else if constraint.contains("slug") {
                    ApiError::Conflict("Slug already exists".to_string())
                } else {
                    ApiError::Conflict("Resource already exists".to_string())
                }
            }
            other => ApiError::InternalError(format!("Database error: {}", other)),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Invalid(violations) => ApiError::Validation(violations),
            ValidationError::Lookup(e) => e.into(),
        }
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<DonationError> for ApiError {
    fn from(err: DonationError) -> Self {
        match err {
            DonationError::CampaignNotFound => ApiError::NotFound("Campaign not found".to_string()),
            DonationError::SelfDonation | DonationError::CampaignClosed(_) | DonationError::InvalidAmount => {
                ApiError::BadRequest(err.to_string())
            }
            DonationError::PaymentNotFound(_) => ApiError::NotFound("Payment not found".to_string()),
            DonationError::Gateway(e) => e.into(),
            DonationError::Database(e) => e.into(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidRequest(msg) => ApiError::InternalError(format!("Invalid invoice request: {}", msg)),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::UnknownModule(_) | UploadError::ForeignUrl => ApiError::BadRequest(err.to_string()),
            UploadError::TooSmall { .. } | UploadError::UnsupportedType(_) => ApiError::BadRequest(err.to_string()),
            UploadError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            UploadError::NotFound => ApiError::NotFound("Image not found".to_string()),
            UploadError::NotOwner => ApiError::Forbidden("You can only delete images you uploaded".to_string()),
            UploadError::Io(e) => ApiError::InternalError(format!("File storage failed: {}", e)),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer | JwtError::Invalid(_) => ApiError::Unauthorized("Invalid token".to_string()),
            JwtError::MissingSecret | JwtError::Create(_) => {
                ApiError::InternalError(format!("Error when generating token: {}", err))
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge("Request body is too large".to_string());
        }
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge("Upload is too large".to_string());
        }
        ApiError::BadRequest(format!("Invalid upload request: {}", err.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(format!("Invalid multipart form data: {}", rejection.body_text()))
    }
}
