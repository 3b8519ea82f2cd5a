use std::sync::Arc;

use agora_types::PermissionSet;
use agora_types::models::Identity;
use agora_types::store::IdentityStore;

use crate::error::AccessError;

/// Computes an identity's effective permissions through its role.
///
/// Nothing is cached: every call re-reads the role's associations so that
/// role and permission edits apply to the very next check.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn IdentityStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Empty for roleless or inactive identities; otherwise the active
    /// permissions associated to the role.
    pub fn resolve(&self, identity: &Identity) -> Result<PermissionSet, AccessError> {
        if !identity.active {
            return Ok(PermissionSet::new());
        }
        let Some(role) = &identity.role else {
            return Ok(PermissionSet::new());
        };

        Ok(self
            .store
            .role_permissions(role.id)?
            .into_iter()
            .filter(|p| p.active)
            .map(|p| p.code)
            .collect())
    }
}
