//! Session store for the signed-in user.

use std::sync::{Arc, PoisonError, RwLock};

use notes_core::{ClientId, ClientMessage, Handshake, SessionUser, StateStorage, StorageError};

/// Storage key holding the serialized user.
pub const SESSION_KEY: &str = "currentUser";

/// Holds the authenticated user and keeps it in durable storage.
pub struct SessionStore {
    storage: Arc<dyn StateStorage>,
    client_id: ClientId,
    current: RwLock<Option<SessionUser>>,
}

impl SessionStore {
    /// Create a new store. Nothing is read until [`restore`](Self::restore).
    #[must_use]
    pub fn new(storage: Arc<dyn StateStorage>, client_id: ClientId) -> Self {
        Self {
            storage,
            client_id,
            current: RwLock::new(None),
        }
    }

    #[must_use]
    pub const fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current(&self) -> Option<SessionUser> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn set_current(&self, user: Option<SessionUser>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = user;
    }

    /// Adopt the previously stored user, if there is a readable one.
    ///
    /// A record that fails to parse, or a storage backend whose contents are
    /// corrupt, is deleted and the session starts signed out. Nothing is
    /// surfaced to the caller in that case.
    ///
    /// # Errors
    /// Returns error only if the storage itself cannot be read.
    pub async fn restore(&self) -> Result<Option<SessionUser>, StorageError> {
        let raw = match self.storage.get(SESSION_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(StorageError::Corrupt(e)) => {
                self.discard(&e).await;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match serde_json::from_str::<SessionUser>(&raw) {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "restored saved session");
                self.set_current(Some(user.clone()));
                Ok(Some(user))
            }
            Err(e) => {
                self.discard(&e).await;
                Ok(None)
            }
        }
    }

    async fn discard(&self, reason: &serde_json::Error) {
        tracing::warn!("dropping unreadable saved session: {reason}");
        if let Err(e) = self.storage.remove(SESSION_KEY).await {
            tracing::warn!("failed to remove saved session: {e}");
        }
    }

    /// Adopt `user` and persist it exactly as received.
    ///
    /// # Errors
    /// Returns error if the record cannot be written. The user is adopted for
    /// this process either way.
    pub async fn login(&self, user: SessionUser) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&user)?;
        self.set_current(Some(user));
        self.storage.set(SESSION_KEY, &raw).await
    }

    /// Forget the current user.
    ///
    /// The in-memory session is cleared before storage is touched, and a
    /// storage failure is only logged.
    pub async fn logout(&self) -> Option<SessionUser> {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Err(e) = self.storage.remove(SESSION_KEY).await {
            tracing::warn!("failed to remove saved session: {e}");
        }
        previous
    }
}

impl Handshake for SessionStore {
    fn handshake(&self) -> ClientMessage {
        let client_id = self.client_id.clone();
        match self.current() {
            Some(user) => ClientMessage::RestoreSession {
                client_id,
                user_id: user.id,
            },
            None => ClientMessage::Init { client_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use notes_core::Action;
    use serde_json::json;
    use tokio_test::assert_ok;

    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};

    fn user() -> SessionUser {
        serde_json::from_value(json!({
            "id": "665f1c",
            "username": "olena",
            "email": "olena@example.com",
            "theme": "dark"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_then_restart_restores_identical_user() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let first = SessionStore::new(Arc::new(FileStorage::new(&path)), ClientId::generate());
        first.login(user()).await.unwrap();

        let second = SessionStore::new(Arc::new(FileStorage::new(&path)), ClientId::generate());
        assert!(!second.is_authenticated());
        let restored = second.restore().await.unwrap();
        assert_eq!(restored, Some(user()));
        assert_eq!(second.current(), Some(user()));
    }

    #[tokio::test]
    async fn test_corrupt_record_starts_signed_out() {
        let storage = Arc::new(MemoryStorage::with_value(SESSION_KEY, "{\"id\": 12,"));
        let store = SessionStore::new(storage.clone(), ClientId::generate());

        assert_eq!(store.restore().await.unwrap(), None);
        assert!(!store.is_authenticated());
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_garbled_session_file_starts_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"{\"currentUser\": \"trunc").await.unwrap();

        let store = SessionStore::new(Arc::new(FileStorage::new(&path)), ClientId::generate());
        assert_eq!(assert_ok!(store.restore().await), None);
        assert!(!store.is_authenticated());

        let again = SessionStore::new(Arc::new(FileStorage::new(&path)), ClientId::generate());
        assert_eq!(assert_ok!(again.restore().await), None);

        assert_ok!(again.login(user()).await);
        let after = SessionStore::new(Arc::new(FileStorage::new(&path)), ClientId::generate());
        assert_eq!(assert_ok!(after.restore().await), Some(user()));
    }

    #[tokio::test]
    async fn test_nothing_stored() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()), ClientId::generate());
        assert_eq!(store.restore().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_clears_memory_and_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone(), ClientId::generate());
        store.login(user()).await.unwrap();

        assert_eq!(store.logout().await, Some(user()));
        assert!(!store.is_authenticated());
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);
    }

    struct BrokenStorage;

    #[async_trait]
    impl StateStorage for BrokenStorage {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Internal("disk gone".into()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Internal("disk gone".into()))
        }

        async fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Internal("disk gone".into()))
        }
    }

    #[tokio::test]
    async fn test_logout_survives_storage_failure() {
        let store = SessionStore::new(Arc::new(BrokenStorage), ClientId::generate());
        assert!(store.login(user()).await.is_err());
        assert!(store.is_authenticated());

        store.logout().await;
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_handshake_follows_session() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()), ClientId::generate());
        assert_eq!(store.handshake().action(), Action::Init);

        store.login(user()).await.unwrap();
        match store.handshake() {
            ClientMessage::RestoreSession { client_id, user_id } => {
                assert_eq!(&client_id, store.client_id());
                assert_eq!(user_id, "665f1c");
            }
            other => panic!("unexpected handshake: {other:?}"),
        }
    }
}
