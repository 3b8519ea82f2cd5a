use std::sync::Arc;

use agora_types::models::Identity;
use agora_types::store::IdentityStore;
use agora_types::{PermissionCode, PermissionSet};
use tracing::{debug, error};

use crate::config::AccessConfig;
use crate::error::AccessError;
use crate::resolver::PermissionResolver;
use crate::token::TokenVerifier;

/// "Is this identity allowed to do X", for REST handlers and the gateway alike.
#[derive(Clone)]
pub struct AccessGate {
    verifier: TokenVerifier,
    resolver: PermissionResolver,
    store: Arc<dyn IdentityStore>,
}

impl AccessGate {
    pub fn new(config: &AccessConfig, store: Arc<dyn IdentityStore>) -> Self {
        Self {
            verifier: TokenVerifier::new(config),
            resolver: PermissionResolver::new(store.clone()),
            store,
        }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Verify the token and load a snapshot of its subject.
    ///
    /// Unknown and inactive subjects are refused here, so an inactive
    /// identity never reaches an authorization check.
    pub fn authenticate(&self, token: &str) -> Result<Identity, AccessError> {
        let claims = self.verifier.verify(token)?;

        let identity = self
            .store
            .find_identity_by_handle(&claims.sub)?
            .ok_or_else(|| AccessError::UnknownIdentity(claims.sub.clone()))?;

        if !identity.active {
            return Err(AccessError::InactiveIdentity(identity.handle));
        }

        Ok(identity)
    }

    pub fn resolve(&self, identity: &Identity) -> Result<PermissionSet, AccessError> {
        self.resolver.resolve(identity)
    }

    /// True iff `code` is in the identity's resolved permissions.
    /// A store failure is logged and treated as a denial.
    pub fn authorize(&self, identity: &Identity, code: &str) -> bool {
        match self.resolver.resolve(identity) {
            Ok(permissions) => permissions.contains(code),
            Err(e) => {
                error!("Permission resolution failed for {}: {}", identity.handle, e);
                false
            }
        }
    }

    /// Like [`authorize`](Self::authorize) but fails with `PermissionDenied`.
    /// Store failures propagate as `Store` instead of being folded into a denial.
    pub fn require(&self, identity: &Identity, code: &str) -> Result<(), AccessError> {
        if self.resolver.resolve(identity)?.contains(code) {
            Ok(())
        } else {
            debug!("{} lacks {}", identity.handle, code);
            Err(AccessError::PermissionDenied(PermissionCode::new(code)))
        }
    }

    /// Case-insensitive role name check. Inactive and roleless identities have no role.
    pub fn has_role(&self, identity: &Identity, role: &str) -> bool {
        identity.active
            && identity
                .role
                .as_ref()
                .is_some_and(|r| r.name.eq_ignore_ascii_case(role))
    }

    pub fn require_role(&self, identity: &Identity, role: &str) -> Result<(), AccessError> {
        if self.has_role(identity, role) {
            Ok(())
        } else {
            Err(AccessError::RoleRequired(role.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use agora_types::models::{Permission, RoleRef};
    use agora_types::permissions::VOCABULARY;

    use super::*;

    /// Role id -> associated permissions, handle -> identity.
    #[derive(Default)]
    struct MemoryStore {
        identities: Mutex<HashMap<String, Identity>>,
        grants: Mutex<HashMap<i64, Vec<Permission>>>,
        fail: bool,
    }

    impl IdentityStore for MemoryStore {
        fn find_identity_by_handle(&self, handle: &str) -> anyhow::Result<Option<Identity>> {
            Ok(self.identities.lock().unwrap().get(handle).cloned())
        }

        fn role_permissions(&self, role_id: i64) -> anyhow::Result<Vec<Permission>> {
            if self.fail {
                anyhow::bail!("store offline");
            }
            Ok(self.grants.lock().unwrap().get(&role_id).cloned().unwrap_or_default())
        }
    }

    fn identity(handle: &str, role: Option<(i64, &str)>) -> Identity {
        Identity {
            id: 1,
            handle: handle.into(),
            first_name: None,
            last_name: None,
            active: true,
            role: role.map(|(id, name)| RoleRef { id, name: name.into() }),
        }
    }

    fn perm(code: &str, active: bool) -> Permission {
        Permission {
            code: code.into(),
            active,
        }
    }

    fn gate_with(store: MemoryStore) -> (AccessGate, Arc<MemoryStore>) {
        let store = Arc::new(store);
        let gate = AccessGate::new(&AccessConfig::new("test-secret"), store.clone());
        (gate, store)
    }

    fn guest_store() -> MemoryStore {
        let store = MemoryStore::default();
        store.grants.lock().unwrap().insert(
            4,
            vec![
                perm(PermissionCode::READ_CHANNELS, true),
                perm(PermissionCode::READ_MESSAGES, true),
                perm(PermissionCode::SEND_MESSAGES, false),
            ],
        );
        store
    }

    #[test]
    fn roleless_identity_has_no_permissions() {
        let (gate, _) = gate_with(guest_store());
        let carol = identity("carol", None);

        assert!(gate.resolve(&carol).unwrap().is_empty());
        for (code, _, _) in VOCABULARY {
            assert!(!gate.authorize(&carol, code));
        }
    }

    #[test]
    fn inactive_permissions_are_excluded() {
        let (gate, _) = gate_with(guest_store());
        let bob = identity("bob", Some((4, "invite")));

        let perms = gate.resolve(&bob).unwrap();
        assert!(perms.contains(PermissionCode::READ_MESSAGES));
        assert!(!perms.contains(PermissionCode::SEND_MESSAGES));
    }

    #[test]
    fn inactive_identity_is_never_authorized() {
        let (gate, _) = gate_with(guest_store());
        let mut bob = identity("bob", Some((4, "invite")));
        bob.active = false;

        assert!(gate.resolve(&bob).unwrap().is_empty());
        assert!(!gate.authorize(&bob, PermissionCode::READ_MESSAGES));
        assert!(!gate.has_role(&bob, "invite"));
    }

    #[test]
    fn authorize_matches_resolve_for_every_code() {
        let (gate, _) = gate_with(guest_store());
        let identities = [
            identity("bob", Some((4, "invite"))),
            identity("carol", None),
            identity("eve", Some((99, "ghost"))),
        ];

        for who in &identities {
            let resolved = gate.resolve(who).unwrap();
            for (code, _, _) in VOCABULARY {
                assert_eq!(gate.authorize(who, code), resolved.contains(code));
                assert_eq!(gate.require(who, code).is_ok(), resolved.contains(code));
            }
        }
    }

    #[test]
    fn require_reports_the_missing_code() {
        let (gate, _) = gate_with(guest_store());
        let bob = identity("bob", Some((4, "invite")));

        match gate.require(&bob, PermissionCode::SEND_MESSAGES) {
            Err(AccessError::PermissionDenied(code)) => {
                assert_eq!(code.as_str(), PermissionCode::SEND_MESSAGES)
            }
            other => panic!("expected PermissionDenied, got {:?}", other),
        }
    }

    #[test]
    fn grant_changes_apply_immediately() {
        let (gate, store) = gate_with(guest_store());
        let bob = identity("bob", Some((4, "invite")));
        assert!(!gate.authorize(&bob, PermissionCode::SEND_MESSAGES));

        store
            .grants
            .lock()
            .unwrap()
            .get_mut(&4)
            .unwrap()
            .push(perm(PermissionCode::SEND_MESSAGES, true));

        assert!(gate.authorize(&bob, PermissionCode::SEND_MESSAGES));
    }

    #[test]
    fn store_failure_fails_closed() {
        let mut store = guest_store();
        store.fail = true;
        let (gate, _) = gate_with(store);
        let bob = identity("bob", Some((4, "invite")));

        assert!(!gate.authorize(&bob, PermissionCode::READ_MESSAGES));
        assert!(matches!(
            gate.require(&bob, PermissionCode::READ_MESSAGES),
            Err(AccessError::Store(_))
        ));
    }

    #[test]
    fn authenticate_checks_subject() {
        let (gate, store) = gate_with(guest_store());
        let mut dormant = identity("dormant", Some((4, "invite")));
        dormant.active = false;
        {
            let mut ids = store.identities.lock().unwrap();
            ids.insert("bob".into(), identity("bob", Some((4, "invite"))));
            ids.insert("dormant".into(), dormant);
        }

        let token = gate.verifier().issue(1, "bob").unwrap();
        assert_eq!(gate.authenticate(&token).unwrap().handle, "bob");

        let token = gate.verifier().issue(2, "ghost").unwrap();
        assert!(matches!(gate.authenticate(&token), Err(AccessError::UnknownIdentity(_))));

        let token = gate.verifier().issue(3, "dormant").unwrap();
        assert!(matches!(gate.authenticate(&token), Err(AccessError::InactiveIdentity(_))));

        assert!(matches!(gate.authenticate("garbage"), Err(AccessError::InvalidToken(_))));
    }

    #[test]
    fn role_names_compare_case_insensitively() {
        let (gate, _) = gate_with(guest_store());
        let admin = identity("root", Some((1, "Admin")));

        assert!(gate.has_role(&admin, "admin"));
        assert!(!gate.has_role(&admin, "moderateur"));
        assert!(matches!(
            gate.require_role(&identity("carol", None), "admin"),
            Err(AccessError::RoleRequired(_))
        ));
    }
}
