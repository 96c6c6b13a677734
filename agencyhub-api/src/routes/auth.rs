/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/register` - Create an account and its organization
/// - `POST /api/auth/login` - Password sign-in
/// - `POST /api/auth/google` - Sign in with a Google ID token
/// - `POST /api/auth/refresh` - Exchange a refresh token for an access token
/// - `GET /api/auth/me` - Current user, organization, role and permissions
/// - `PUT /api/auth/me` - Update the caller's profile or password
///
/// Sign-in responses carry `{ token, refresh_token, expires_in, user,
/// organization, role }` inside the usual envelope.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    response::ApiResponse,
};
use agencyhub_shared::{
    auth::{
        authorization::require_membership,
        google::GoogleIdentity,
        jwt::{self, TokenPair},
        middleware::AuthContext,
        password,
        permissions::{permissions_for, Permission},
    },
    models::{
        membership::{CreateMembership, MemberRole, Membership},
        organization::{CreateOrganization, Organization},
        user::{CreateUser, UpdateUser, User},
    },
};
use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked again by `validate_password_strength`
    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: Option<String>,

    /// Defaults to "<name>'s Agency"
    #[validate(length(min = 1, max = 100, message = "Organization name must be 1 to 100 characters"))]
    pub organization_name: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Google sign-in request
#[derive(Debug, Deserialize, Validate)]
pub struct GoogleSignInRequest {
    /// ID token from Google Identity Services (`credential`)
    #[validate(length(min = 1, message = "ID token is required"))]
    pub id_token: String,
}

/// Refresh token request
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Profile update; a new password needs the current one
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(url)]
    pub avatar_url: Option<String>,

    pub current_password: Option<String>,

    #[validate(length(min = 8, max = 128))]
    pub new_password: Option<String>,
}

/// Body of every successful sign-in
#[derive(Debug, Serialize)]
pub struct AuthPayload {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
    pub organization: Organization,
    pub role: MemberRole,
}

/// Refresh response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub token: String,
    pub expires_in: i64,
}

/// `GET /api/auth/me`
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub organization: Organization,
    pub role: MemberRole,
    pub permissions: &'static [Permission],
}

/// Register a new user
///
/// Creates the user, a new organization and the owner membership in one
/// transaction.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or weak password
/// - `409 Conflict`: Email already exists
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<ApiResponse<AuthPayload>> {
    password::validate_password_strength(&req.password)
        .map_err(|e| ApiError::invalid_field("password", e))?;

    let password_hash = password::hash_password(&req.password)?;
    let organization_name = req.organization_name.clone().unwrap_or_else(|| {
        format!("{}'s Agency", req.name.as_deref().unwrap_or("My"))
    });

    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email: req.email,
            password_hash: Some(password_hash),
            name: req.name,
            ..Default::default()
        },
    )
    .await?;

    let organization = create_owned_organization(&mut tx, &user, organization_name).await?;

    tx.commit().await?;

    info!(user_id = %user.id, organization_id = %organization.id, "User registered");

    let tokens = jwt::issue_token_pair(user.id, organization.id, state.jwt_secret())?;
    Ok(ApiResponse::created(
        AuthPayload {
            tokens,
            user,
            organization,
            role: MemberRole::Owner,
        },
        "Registration successful",
    ))
}

/// Password sign-in
///
/// Unknown e-mail, wrong password and Google-only accounts all answer with
/// the same 401 message.
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<ApiResponse<AuthPayload>> {
    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !password::verify_password(&req.password, hash)? {
        info!(user_id = %user.id, "Failed login attempt");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let payload = sign_in(&state, user).await?;
    Ok(ApiResponse::ok(payload, "Login successful"))
}

/// Sign in with Google
///
/// Matches the Google account by ID, then by verified e-mail (linking the
/// two), and otherwise creates a new account with its own organization.
///
/// # Errors
///
/// - `401 Unauthorized`: Google rejected the token
/// - `503 Service Unavailable`: Google sign-in is not configured or unreachable
pub async fn google_sign_in(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<GoogleSignInRequest>,
) -> ApiResult<ApiResponse<AuthPayload>> {
    let verifier = state
        .google
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("Google sign-in is not configured".to_string()))?;

    let identity = verifier.verify(&req.id_token).await?;
    let (user, created) = find_or_create_google_user(&state, &identity).await?;

    let payload = sign_in(&state, user).await?;
    if created {
        Ok(ApiResponse::created(payload, "Account created with Google"))
    } else {
        Ok(ApiResponse::ok(payload, "Login successful"))
    }
}

/// Exchanges a refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> ApiResult<ApiResponse<RefreshResponse>> {
    let token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(ApiResponse::ok(
        RefreshResponse {
            token,
            expires_in: jwt::TokenType::Access.default_expiration().num_seconds(),
        },
        "Token refreshed",
    ))
}

/// Current user with their organization, role and permission list
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<MeResponse>> {
    let role = require_membership(&state.db, &auth).await?;
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let organization = Organization::find_by_id(&state.db, auth.organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;

    Ok(ApiResponse::ok(
        MeResponse {
            user,
            organization,
            role,
            permissions: permissions_for(role),
        },
        "Current user retrieved",
    ))
}

/// Updates the caller's name, avatar or password
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> ApiResult<ApiResponse<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let password_hash = match req.new_password {
        Some(new_password) => {
            if let Some(hash) = user.password_hash.as_deref() {
                let current = req.current_password.as_deref().unwrap_or_default();
                if !password::verify_password(current, hash)? {
                    return Err(ApiError::invalid_field(
                        "current_password",
                        "Current password is incorrect",
                    ));
                }
            }
            password::validate_password_strength(&new_password)
                .map_err(|e| ApiError::invalid_field("new_password", e))?;
            Some(password::hash_password(&new_password)?)
        }
        None => None,
    };

    let updated = User::update(
        &state.db,
        user.id,
        UpdateUser {
            name: req.name.map(Some),
            avatar_url: req.avatar_url.map(Some),
            password_hash,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok(updated, "Profile updated"))
}

/// Issues tokens scoped to the user's first organization
async fn sign_in(state: &AppState, user: User) -> ApiResult<AuthPayload> {
    let membership = Membership::primary_for_user(&state.db, user.id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("User does not belong to any organization".to_string()))?;
    let organization = Organization::find_by_id(&state.db, membership.organization_id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("Organization no longer exists".to_string()))?;

    User::update_last_login(&state.db, user.id).await?;

    let tokens = jwt::issue_token_pair(user.id, organization.id, state.jwt_secret())?;
    info!(user_id = %user.id, organization_id = %organization.id, "User signed in");

    Ok(AuthPayload {
        tokens,
        user,
        organization,
        role: membership.role,
    })
}

/// Returns the matching user and whether it was just created
async fn find_or_create_google_user(
    state: &AppState,
    identity: &GoogleIdentity,
) -> ApiResult<(User, bool)> {
    if let Some(user) = User::find_by_google_id(&state.db, &identity.google_id).await? {
        return Ok((user, false));
    }

    if let Some(existing) = User::find_by_email(&state.db, &identity.email).await? {
        let linked = User::link_google_account(
            &state.db,
            existing.id,
            &identity.google_id,
            identity.picture.as_deref(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
        info!(user_id = %linked.id, "Linked Google account to existing user");
        return Ok((linked, false));
    }

    let mut tx = state.db.begin().await?;
    let user = User::create(
        &mut *tx,
        CreateUser {
            email: identity.email.clone(),
            password_hash: None,
            name: identity.name.clone(),
            avatar_url: identity.picture.clone(),
            google_id: Some(identity.google_id.clone()),
        },
    )
    .await?;
    let organization_name = format!("{}'s Agency", user.display_name());
    let organization = create_owned_organization(&mut tx, &user, organization_name).await?;
    tx.commit().await?;

    info!(user_id = %user.id, organization_id = %organization.id, "User registered with Google");
    Ok((user, true))
}

async fn create_owned_organization(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    owner: &User,
    name: String,
) -> Result<Organization, sqlx::Error> {
    let organization = Organization::create(
        &mut **tx,
        CreateOrganization {
            name,
            settings: None,
        },
    )
    .await?;

    Membership::create(
        &mut **tx,
        CreateMembership {
            organization_id: organization.id,
            user_id: owner.id,
            role: MemberRole::Owner,
        },
    )
    .await?;

    Ok(organization)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let req = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            name: None,
            organization_name: Some(String::new()),
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("organization_name"));
    }

    #[test]
    fn test_auth_payload_flattens_tokens() {
        let now = chrono::Utc::now();
        let user_id = uuid::Uuid::new_v4();
        let organization_id = uuid::Uuid::new_v4();
        let payload = AuthPayload {
            tokens: TokenPair {
                token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                expires_in: 86_400,
            },
            user: User {
                id: user_id,
                email: "mia@studio.example".to_string(),
                password_hash: Some("$argon2id$secret".to_string()),
                name: Some("Mia".to_string()),
                avatar_url: None,
                google_id: None,
                created_at: now,
                updated_at: now,
                last_login_at: None,
            },
            organization: Organization {
                id: organization_id,
                name: "Mia's Agency".to_string(),
                slug: "mias-agency-1a2b3c".to_string(),
                settings: sqlx::types::Json(serde_json::json!({})),
                created_at: now,
                updated_at: now,
            },
            role: MemberRole::Owner,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["token"], "access");
        assert_eq!(json["refresh_token"], "refresh");
        assert_eq!(json["role"], "owner");
        assert!(json["user"].get("password_hash").is_none());
    }
}
