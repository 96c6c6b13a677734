/// Error handling for the API server
///
/// Every handler returns `ApiResult<T>`; the error side renders as
///
/// ```json
/// { "error": "Project not found" }
/// ```
///
/// with an extra `details` array for validation failures. Errors from the
/// shared crate convert with `?`, so handlers carry no per-route logging
/// or catch blocks.
///
/// # Example
///
/// ```no_run
/// use agencyhub_api::error::{ApiError, ApiResult};
///
/// fn find_budget(budget: Option<i64>) -> ApiResult<i64> {
///     budget.ok_or_else(|| ApiError::NotFound("Project not found".to_string()))
/// }
/// ```

use agencyhub_shared::{
    auth::{
        authorization::AuthzError, google::GoogleError, jwt::JwtError, middleware::AuthError,
        password::PasswordError,
    },
    models::{billing::BillingError, quotation::QuotationError, time_log::TimerError},
};
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{ValidationErrors, ValidationErrorsKind};

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

    /// Conflict (409), e.g. duplicate email or a running timer
    Conflict(String),

    /// Request body failed validation (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation, e.g. `items[1].quantity`
    pub field: String,

    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Single-field validation failure
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
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
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (error, details) = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::ServiceUnavailable(msg) => (msg, None),
            ApiError::ValidationError(errors) => {
                ("Request validation failed".to_string(), Some(errors))
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!(error = %msg, "Internal error");
                ("An internal error occurred".to_string(), None)
            }
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// Flattens nested validator output into `field` paths
pub fn validation_details(errors: &ValidationErrors) -> Vec<ValidationErrorDetail> {
    let mut details = Vec::new();
    collect_details("", errors, &mut details);
    details.sort_by(|a, b| a.field.cmp(&b.field));
    details
}

fn collect_details(prefix: &str, errors: &ValidationErrors, out: &mut Vec<ValidationErrorDetail>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                out.extend(field_errors.iter().map(|error| {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{path} is invalid ({})", error.code));
                    ValidationErrorDetail::new(path.clone(), message)
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect_details(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_details(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::ValidationError(validation_details(&errors))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => match db_err.constraint() {
                    Some("users_email_key") => {
                        ApiError::Conflict("Email already exists".to_string())
                    }
                    Some("invoices_number_key") => {
                        ApiError::Conflict("Invoice number already exists".to_string())
                    }
                    Some("quotations_number_key") => {
                        ApiError::Conflict("Quotation number already exists".to_string())
                    }
                    Some("memberships_pkey") => ApiError::Conflict(
                        "User is already a member of this organization".to_string(),
                    ),
                    _ => ApiError::Conflict("Resource already exists".to_string()),
                },
                // foreign_key_violation
                Some("23503") => {
                    ApiError::BadRequest("Referenced resource does not exist".to_string())
                }
                // check_violation
                Some("23514") => ApiError::BadRequest("Value out of range".to_string()),
                _ => ApiError::InternalError(format!("Database error: {}", db_err)),
            },
            sqlx::Error::PoolTimedOut => {
                ApiError::ServiceUnavailable("Database is busy, try again".to_string())
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember(_) => {
                ApiError::Forbidden("Not a member of this organization".to_string())
            }
            AuthzError::MissingPermission { .. } => ApiError::Forbidden(err.to_string()),
            AuthzError::LastOwner => ApiError::BadRequest(err.to_string()),
            AuthzError::DatabaseError(err) => err.into(),
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
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Token creation failed: {}", msg))
            }
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            _ => ApiError::Unauthorized(err.to_string()),
        }
    }
}

impl From<GoogleError> for ApiError {
    fn from(err: GoogleError) -> Self {
        match err {
            GoogleError::InvalidToken(_) | GoogleError::EmailNotVerified => {
                ApiError::Unauthorized(err.to_string())
            }
            GoogleError::Unavailable(_) => {
                tracing::warn!(error = %err, "Google sign-in unavailable");
                ApiError::ServiceUnavailable("Google sign-in is unavailable".to_string())
            }
        }
    }
}

impl From<TimerError> for ApiError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::AlreadyRunning => ApiError::Conflict(err.to_string()),
            TimerError::Database(err) => err.into(),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::AmountTooLarge => ApiError::invalid_field("items", err.to_string()),
            BillingError::Database(err) => err.into(),
        }
    }
}

impl From<QuotationError> for ApiError {
    fn from(err: QuotationError) -> Self {
        match err {
            QuotationError::NotFound => ApiError::NotFound(err.to_string()),
            QuotationError::InvalidTransition { .. } | QuotationError::NotAccepted(_) => {
                ApiError::BadRequest(err.to_string())
            }
            QuotationError::AlreadyConverted => ApiError::Conflict(err.to_string()),
            QuotationError::Billing(err) => err.into(),
            QuotationError::Database(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agencyhub_shared::models::{
        billing::{compute_totals, LineItem},
        quotation::QuotationStatus,
    };
    use axum::body::to_bytes;
    use validator::Validate;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Client not found".to_string());
        assert_eq!(err.to_string(), "Not found: Client not found");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, body) = body_json(ApiError::NotFound("Task not found".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({ "error": "Task not found" }));
    }

    #[tokio::test]
    async fn test_internal_error_is_not_leaked() {
        let (status, body) =
            body_json(ApiError::InternalError("relation \"x\" does not exist".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_validation_error_has_details() {
        #[derive(Validate)]
        struct Doc {
            #[validate(length(min = 1))]
            title: String,
            #[validate(nested)]
            items: Vec<LineItem>,
        }

        let doc = Doc {
            title: String::new(),
            items: vec![LineItem {
                description: "Design".to_string(),
                quantity: -2.0,
                unit_price_cents: 100,
            }],
        };
        let err: ApiError = doc.validate().unwrap_err().into();

        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, ["items[0].quantity", "title"]);
    }

    #[test]
    fn test_domain_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(TimerError::AlreadyRunning).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(QuotationError::AlreadyConverted).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(QuotationError::NotAccepted(QuotationStatus::Draft)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthzError::LastOwner).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(sqlx::Error::RowNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(JwtError::Expired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(GoogleError::EmailNotVerified).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_a_field_error() {
        let items = vec![
            LineItem {
                description: "Retainer".to_string(),
                quantity: 1_000_000.0,
                unit_price_cents: 100_000_000_000,
            };
            100
        ];
        assert!(items.iter().all(|item| item.validate().is_ok()));

        let err = compute_totals(&items, 2_000).unwrap_err();
        let (status, body) = body_json(QuotationError::from(err).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "items");
    }
}
