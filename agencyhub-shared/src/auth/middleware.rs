/// Request authentication for Axum
///
/// Turns the `Authorization: Bearer <token>` header into an [`AuthContext`]
/// that handlers pull out of request extensions. The API server wires
/// [`authenticate_request`] into its router with
/// `axum::middleware::from_fn_with_state`.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use agencyhub_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("user {} in organization {}", auth.user_id, auth.organization_id)
/// }
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::jwt::{validate_access_token, Claims, JwtError};

/// Identity attached to every authenticated request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    /// Organization all reads and writes of this request are scoped to
    pub organization_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid, organization_id: Uuid) -> Self {
        Self {
            user_id,
            organization_id,
        }
    }

    pub fn from_claims(claims: &Claims) -> Self {
        Self::new(claims.sub, claims.organization_id)
    }
}

/// Why a request could not be authenticated
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidToken(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid token issuer".to_string()),
            JwtError::WrongTokenType { .. } => {
                AuthError::InvalidToken("Access token required".to_string())
            }
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Extracts the bearer token from the request headers
///
/// # Errors
///
/// - `AuthError::MissingCredentials` without an `Authorization` header
/// - `AuthError::InvalidFormat` when the scheme is not `Bearer`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Validates the request's access token and stores the [`AuthContext`] in its extensions
///
/// # Errors
///
/// Any [`AuthError`]; the caller turns it into a 401 or 400 response.
pub fn authenticate_request(req: &mut Request, secret: &str) -> Result<AuthContext, AuthError> {
    let token = bearer_token(req.headers())?;
    let claims = validate_access_token(token, secret)?;
    let context = AuthContext::from_claims(&claims);

    req.extensions_mut().insert(context);
    Ok(context)
}
