use serde::{Deserialize, Serialize};

use ums_core::{OrganizationId, TenantId, UserId};

use crate::LoginData;

/// Snapshot of the login response kept alongside the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub tenant_id: TenantId,
    pub organization_id: OrganizationId,
    pub region_endpoint: String,
}

impl From<&LoginData> for UserProfile {
    fn from(data: &LoginData) -> Self {
        Self {
            user_id: data.user_id,
            name: data.name.clone(),
            email: data.email.clone(),
            tenant_id: data.tenant_id,
            organization_id: data.organization_id,
            region_endpoint: data.region_endpoint.clone(),
        }
    }
}
