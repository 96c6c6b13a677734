/// Google sign-in
///
/// The dashboard obtains a Google ID token in the browser and posts it to
/// `POST /api/auth/google`. The server never trusts its contents directly:
/// a [`GoogleVerifier`] checks it and returns the identity it vouches for.
///
/// [`HttpGoogleVerifier`] asks Google's `tokeninfo` endpoint to validate
/// the signature, then [`validate_google_claims`] checks audience, issuer,
/// expiry and that the e-mail address is verified.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

const ACCEPTED_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Error type for Google ID token verification
#[derive(Debug, thiserror::Error)]
pub enum GoogleError {
    /// Google rejected the token or a claim check failed
    #[error("Invalid Google token: {0}")]
    InvalidToken(String),

    #[error("Google account e-mail is not verified")]
    EmailNotVerified,

    /// Google could not be reached
    #[error("Google verification unavailable: {0}")]
    Unavailable(String),
}

/// Identity confirmed by a verified Google ID token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    /// Stable Google account ID (`sub`)
    pub google_id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Claims as returned by the `tokeninfo` endpoint
///
/// Google encodes booleans and numbers as strings there, so both forms are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTokenClaims {
    pub aud: String,
    pub iss: String,
    pub sub: String,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub email_verified: bool,
    #[serde(deserialize_with = "i64_or_string")]
    pub exp: i64,
    pub name: Option<String>,
    pub picture: Option<String>,
}

fn bool_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(value) => value,
        Raw::Text(text) => text.eq_ignore_ascii_case("true"),
    })
}

fn i64_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

/// Checks the claims of a Google ID token that Google has already signature-checked
///
/// # Errors
///
/// - `GoogleError::InvalidToken` for a wrong audience or issuer, an
///   expired token, or a missing e-mail
/// - `GoogleError::EmailNotVerified` when Google has not verified the address
pub fn validate_google_claims(
    claims: GoogleTokenClaims,
    client_id: &str,
    now: i64,
) -> Result<GoogleIdentity, GoogleError> {
    if claims.aud != client_id {
        return Err(GoogleError::InvalidToken("audience mismatch".to_string()));
    }
    if !ACCEPTED_ISSUERS.contains(&claims.iss.as_str()) {
        return Err(GoogleError::InvalidToken(format!("unexpected issuer {}", claims.iss)));
    }
    if claims.exp <= now {
        return Err(GoogleError::InvalidToken("token expired".to_string()));
    }
    let email = claims
        .email
        .filter(|email| !email.is_empty())
        .ok_or_else(|| GoogleError::InvalidToken("token has no e-mail".to_string()))?;
    if !claims.email_verified {
        return Err(GoogleError::EmailNotVerified);
    }

    Ok(GoogleIdentity {
        google_id: claims.sub,
        email: email.to_lowercase(),
        name: claims.name,
        picture: claims.picture,
    })
}

/// Verifies Google ID tokens
///
/// The API holds one behind an `Arc<dyn GoogleVerifier>` so tests can swap
/// in a fake that does not call Google.
#[async_trait]
pub trait GoogleVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleError>;
}

/// Verifier backed by Google's `tokeninfo` endpoint
#[derive(Debug, Clone)]
pub struct HttpGoogleVerifier {
    client: reqwest::Client,
    client_id: String,
    tokeninfo_url: String,
}

impl HttpGoogleVerifier {
    /// # Errors
    ///
    /// `GoogleError::Unavailable` if the HTTP client cannot be built.
    pub fn new(
        client_id: impl Into<String>,
        tokeninfo_url: impl Into<String>,
    ) -> Result<Self, GoogleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GoogleError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            client_id: client_id.into(),
            tokeninfo_url: tokeninfo_url.into(),
        })
    }
}

#[async_trait]
impl GoogleVerifier for HttpGoogleVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleError> {
        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Google tokeninfo request failed");
                GoogleError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if status.is_client_error() {
            debug!(%status, "Google rejected ID token");
            return Err(GoogleError::InvalidToken("rejected by Google".to_string()));
        }
        if !status.is_success() {
            return Err(GoogleError::Unavailable(format!("tokeninfo returned {status}")));
        }

        let claims: GoogleTokenClaims = response
            .json()
            .await
            .map_err(|e| GoogleError::InvalidToken(format!("unreadable tokeninfo response: {e}")))?;

        validate_google_claims(claims, &self.client_id, Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CLIENT_ID: &str = "agencyhub-web.apps.googleusercontent.com";
    const NOW: i64 = 1_750_000_000;

    fn claims(overrides: serde_json::Value) -> GoogleTokenClaims {
        let mut base = json!({
            "aud": CLIENT_ID,
            "iss": "https://accounts.google.com",
            "sub": "109876543210",
            "email": "Dana@Studio.example",
            "email_verified": "true",
            "exp": (NOW + 600).to_string(),
            "name": "Dana Reyes",
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_valid_claims_yield_identity() {
        let identity = validate_google_claims(claims(json!({})), CLIENT_ID, NOW).unwrap();
        assert_eq!(identity.google_id, "109876543210");
        assert_eq!(identity.email, "dana@studio.example");
        assert_eq!(identity.name.as_deref(), Some("Dana Reyes"));
    }

    #[test]
    fn test_numeric_and_boolean_forms_accepted() {
        let parsed = claims(json!({ "email_verified": true, "exp": NOW + 5 }));
        assert!(parsed.email_verified);
        assert_eq!(parsed.exp, NOW + 5);
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let result = validate_google_claims(claims(json!({ "aud": "other-app" })), CLIENT_ID, NOW);
        assert!(matches!(result, Err(GoogleError::InvalidToken(_))));
    }

    #[test]
    fn test_both_issuer_forms_accepted() {
        let bare = claims(json!({ "iss": "accounts.google.com" }));
        assert!(validate_google_claims(bare, CLIENT_ID, NOW).is_ok());

        let foreign = claims(json!({ "iss": "https://login.example.com" }));
        assert!(validate_google_claims(foreign, CLIENT_ID, NOW).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let result = validate_google_claims(claims(json!({ "exp": NOW })), CLIENT_ID, NOW);
        assert!(matches!(result, Err(GoogleError::InvalidToken(_))));
    }

    #[test]
    fn test_unverified_email_rejected() {
        let result =
            validate_google_claims(claims(json!({ "email_verified": "false" })), CLIENT_ID, NOW);
        assert!(matches!(result, Err(GoogleError::EmailNotVerified)));
    }

    #[test]
    fn test_missing_email_rejected() {
        let result = validate_google_claims(claims(json!({ "email": null })), CLIENT_ID, NOW);
        assert!(matches!(result, Err(GoogleError::InvalidToken(_))));
    }
}
