/// Request extractors

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// JSON body that has passed its `validator` rules
///
/// Malformed JSON is a 400 with the parser's message; rule failures are a
/// 400 with per-field `details`.
///
/// ```rust,ignore
/// async fn create_client(ValidatedJson(body): ValidatedJson<CreateClient>) { /* ... */ }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// `Path` whose rejection is a JSON 400, e.g. for a malformed UUID
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `Query` whose rejection is a JSON 400
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header::CONTENT_TYPE};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Rename {
        #[validate(length(min = 1, max = 10))]
        name: String,
    }

    fn request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body_passes() {
        let ValidatedJson(rename) = ValidatedJson::<Rename>::from_request(request(r#"{"name":"Acme"}"#), &())
            .await
            .unwrap();
        assert_eq!(rename.name, "Acme");
    }

    #[tokio::test]
    async fn test_rule_failure_is_validation_error() {
        let err = ValidatedJson::<Rename>::from_request(request(r#"{"name":""}"#), &())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::ValidationError(ref d) if d[0].field == "name"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let err = ValidatedJson::<Rename>::from_request(request("{"), &())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
