//! Bearer credentials and the single-flight refresh gate.

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Access/refresh token pair issued by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Response of the token refresh endpoint; rotation may issue a new
/// refresh token.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshedToken {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Holds the current credentials.
///
/// Refreshes are serialized through `refresh_gate`: callers that hit a 401
/// take the gate, then check whether the access token already changed
/// while they waited. Only the first caller actually refreshes.
#[derive(Debug, Default)]
pub struct TokenStore {
    credentials: RwLock<Option<Credentials>>,
    refresh_gate: Mutex<()>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: RwLock::new(Some(credentials)),
            refresh_gate: Mutex::new(()),
        }
    }

    pub async fn set(&self, credentials: Credentials) {
        *self.credentials.write().await = Some(credentials);
    }

    pub async fn get(&self) -> Option<Credentials> {
        self.credentials.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.credentials
            .read()
            .await
            .as_ref()
            .map(|c| c.access.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.credentials
            .read()
            .await
            .as_ref()
            .and_then(|c| c.refresh.clone())
    }

    /// Install a refreshed access token, keeping the old refresh token
    /// unless a rotated one was issued.
    pub(crate) async fn apply_refresh(&self, refreshed: RefreshedToken) {
        let mut guard = self.credentials.write().await;
        let refresh = refreshed
            .refresh
            .or_else(|| guard.as_ref().and_then(|c| c.refresh.clone()));
        *guard = Some(Credentials {
            access: refreshed.access,
            refresh,
        });
    }

    pub async fn clear(&self) {
        *self.credentials.write().await = None;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.credentials.read().await.is_some()
    }

    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_gate.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_refresh_keeps_refresh_token() {
        let store = TokenStore::with_credentials(Credentials {
            access: "a1".into(),
            refresh: Some("r1".into()),
        });
        store
            .apply_refresh(RefreshedToken {
                access: "a2".into(),
                refresh: None,
            })
            .await;
        let creds = store.get().await.unwrap();
        assert_eq!(creds.access, "a2");
        assert_eq!(creds.refresh.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_apply_refresh_rotates_refresh_token() {
        let store = TokenStore::with_credentials(Credentials {
            access: "a1".into(),
            refresh: Some("r1".into()),
        });
        store
            .apply_refresh(RefreshedToken {
                access: "a2".into(),
                refresh: Some("r2".into()),
            })
            .await;
        assert_eq!(store.refresh_token().await.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_clear() {
        let store = TokenStore::with_credentials(Credentials {
            access: "a".into(),
            refresh: None,
        });
        assert!(store.is_authenticated().await);
        store.clear().await;
        assert!(!store.is_authenticated().await);
        assert!(store.access_token().await.is_none());
    }
}
