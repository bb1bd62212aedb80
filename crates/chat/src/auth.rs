use std::sync::Arc;

use arc_swap::ArcSwap;
use parley_storage::{StorageResult, UserId, UserRecord, UserStore};
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthPhase {
    /// Startup, before a remembered session has been checked.
    #[default]
    Resolving,
    SignedOut,
    SignedIn(UserRecord),
}

/// Session context shared by every repository. Clones observe the same session.
#[derive(Clone)]
pub struct AuthSession {
    store: Arc<dyn UserStore>,
    phase: Arc<ArcSwap<AuthPhase>>,
}

impl AuthSession {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            phase: Arc::new(ArcSwap::from_pointee(AuthPhase::Resolving)),
        }
    }

    pub fn phase(&self) -> Arc<AuthPhase> {
        self.phase.load_full()
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        match self.phase.load().as_ref() {
            AuthPhase::SignedIn(user) => Some(user.clone()),
            AuthPhase::Resolving | AuthPhase::SignedOut => None,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self.phase.load().as_ref() {
            AuthPhase::SignedIn(user) => Some(user.id),
            AuthPhase::Resolving | AuthPhase::SignedOut => None,
        }
    }

    pub fn sign_in(&self, email: &str) -> StorageResult<UserRecord> {
        let user = self.store.sign_in(email)?;
        info!(user_id = %user.id, "signed in");
        self.phase.store(Arc::new(AuthPhase::SignedIn(user.clone())));
        Ok(user)
    }

    /// Leaves `Resolving`, signing in with a remembered email when one is given.
    pub fn restore(&self, remembered_email: Option<&str>) -> Option<UserRecord> {
        let Some(email) = remembered_email.filter(|email| !email.trim().is_empty()) else {
            self.phase.store(Arc::new(AuthPhase::SignedOut));
            return None;
        };

        match self.sign_in(email) {
            Ok(user) => Some(user),
            Err(err) => {
                error!(stage = err.stage(), "failed to restore session: {err}");
                self.phase.store(Arc::new(AuthPhase::SignedOut));
                None
            }
        }
    }

    pub fn sign_out(&self) {
        if let Some(user_id) = self.user_id() {
            info!(user_id = %user_id, "signed out");
        }
        self.phase.store(Arc::new(AuthPhase::SignedOut));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    #[test]
    fn session_moves_through_phases() {
        let session = AuthSession::new(Arc::new(MemoryStore::default()));
        assert_eq!(*session.phase(), AuthPhase::Resolving);
        assert!(session.current_user().is_none());

        assert!(session.restore(None).is_none());
        assert_eq!(*session.phase(), AuthPhase::SignedOut);

        let user = session.sign_in("ada@example.com").expect("sign in");
        assert_eq!(session.user_id(), Some(user.id));

        let shared = session.clone();
        shared.sign_out();
        assert!(session.current_user().is_none());
    }

    #[test]
    fn restore_signs_in_remembered_email() {
        let session = AuthSession::new(Arc::new(MemoryStore::default()));
        let restored = session.restore(Some("ada@example.com"));
        assert_eq!(
            restored.map(|user| user.email),
            Some("ada@example.com".to_string())
        );
    }

    #[test]
    fn failed_restore_falls_back_to_signed_out() {
        let store = MemoryStore::default();
        store.fail_next("sign_in");
        let session = AuthSession::new(Arc::new(store));

        assert!(session.restore(Some("ada@example.com")).is_none());
        assert_eq!(*session.phase(), AuthPhase::SignedOut);
    }
}
