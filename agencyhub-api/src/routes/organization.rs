/// Organization settings
///
/// - `GET /api/organization` - any member
/// - `PUT /api/organization` - `organization:manage`; `settings` keys are
///   merged into the stored object

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    response::ApiResponse,
};
use agencyhub_shared::{
    auth::{
        authorization::{require_membership, require_permission},
        middleware::AuthContext,
        permissions::Permission,
    },
    events::ActivityKind,
    models::organization::{Organization, UpdateOrganization},
};
use axum::{extract::State, Extension};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrganizationRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(custom(function = "json_object"))]
    pub settings: Option<JsonValue>,
}

fn json_object(value: &JsonValue) -> Result<(), ValidationError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ValidationError::new("object").with_message("settings must be a JSON object".into()))
    }
}

pub async fn get_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Organization>> {
    require_membership(&state.db, &auth).await?;

    let organization = Organization::find_by_id(&state.db, auth.organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;

    Ok(ApiResponse::ok(organization, "Organization retrieved"))
}

pub async fn update_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<UpdateOrganizationRequest>,
) -> ApiResult<ApiResponse<Organization>> {
    require_permission(&state.db, &auth, Permission::OrganizationManage).await?;

    let organization = Organization::update(
        &state.db,
        auth.organization_id,
        UpdateOrganization {
            name: req.name.map(|name| name.trim().to_string()),
            settings: req.settings,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;

    state.publish(&auth, ActivityKind::OrganizationUpdated, organization.id);
    Ok(ApiResponse::ok(organization, "Organization updated"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_must_be_object() {
        let req: UpdateOrganizationRequest =
            serde_json::from_value(json!({ "settings": ["not", "an", "object"] })).unwrap();
        assert!(req.validate().is_err());

        let req: UpdateOrganizationRequest =
            serde_json::from_value(json!({ "settings": { "currency": "EUR" } })).unwrap();
        assert!(req.validate().is_ok());
    }
}
