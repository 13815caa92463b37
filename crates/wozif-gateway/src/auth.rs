use wozif_core::config::{ApiKeyRole, GatewayConfig};

/// Result of a successful authentication.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub name: String,
    pub role: ApiKeyRole,
}

/// Bearer key -> configured api_keys -> anonymous.
///
/// Returns `None` when a bearer key matches nothing, or when keys are
/// configured and none was presented. Without configured keys every
/// caller without a bearer is an anonymous admin.
pub fn validate_auth(config: &GatewayConfig, bearer: Option<&str>) -> Option<AuthResult> {
    if let Some(bearer_val) = bearer {
        return config
            .api_keys
            .iter()
            .find(|ak| ak.key == bearer_val)
            .map(|ak| AuthResult {
                name: ak.name.clone(),
                role: ak.role,
            });
    }

    if config.api_keys.is_empty() {
        Some(AuthResult {
            name: "anonymous".into(),
            role: ApiKeyRole::Admin,
        })
    } else {
        None
    }
}

/// Check if a role may run workflows.
pub fn has_operator_access(role: ApiKeyRole) -> bool {
    role >= ApiKeyRole::Operator
}

/// Check if a role may manage the knowledge base.
pub fn has_admin_access(role: ApiKeyRole) -> bool {
    role >= ApiKeyRole::Admin
}
