use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Access credential issued by the token endpoint. Without a refresh token
/// the session cannot renew itself once `expires_at_ms` passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at_ms: i64,
}

/// On-disk layout. Keys match the ones the browser widget kept in local
/// storage so a hand-migrated record still loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "spotify_access_token", default)]
    access_token: Option<String>,
    #[serde(rename = "spotify_refresh_token", default)]
    refresh_token: Option<String>,
    #[serde(rename = "spotify_token_expiry", default)]
    expires_at_ms: Option<i64>,
    #[serde(rename = "code_verifier", default)]
    code_verifier: Option<String>,
}

impl StoredSession {
    fn credential(&self) -> Option<Credential> {
        let access_token = self.access_token.clone()?;
        Some(Credential {
            access_token,
            refresh_token: self.refresh_token.clone(),
            // A token with no recorded expiry is treated as already expired.
            expires_at_ms: self.expires_at_ms.unwrap_or(0),
        })
    }

    fn set_credential(&mut self, credential: &Credential) {
        self.access_token = Some(credential.access_token.clone());
        self.refresh_token = credential.refresh_token.clone();
        self.expires_at_ms = Some(credential.expires_at_ms);
    }

    fn clear_credential(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.expires_at_ms = None;
    }

    fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.expires_at_ms.is_none()
            && self.code_verifier.is_none()
    }
}

/// Persistence for the single credential record and the transient PKCE
/// verifier that has to survive the authorization redirect.
pub trait CredentialStore: Send + Sync {
    fn load_credential(&self) -> AppResult<Option<Credential>>;
    fn save_credential(&self, credential: &Credential) -> AppResult<()>;
    fn clear_credential(&self) -> AppResult<()>;

    fn load_verifier(&self) -> AppResult<Option<String>>;
    fn save_verifier(&self, verifier: &str) -> AppResult<()>;
    fn clear_verifier(&self) -> AppResult<()>;

    /// Drop everything, used whenever the auth flow ends up in a state it
    /// cannot recover from.
    fn purge(&self) -> AppResult<()> {
        self.clear_credential()?;
        self.clear_verifier()
    }
}

/// JSON file store, one record per user profile.
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> AppResult<StoredSession> {
        if !self.path.exists() {
            return Ok(StoredSession::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(session) => Ok(session),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable session file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(StoredSession::default())
            }
        }
    }

    fn write(&self, session: &StoredSession) -> AppResult<()> {
        if session.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut StoredSession)) -> AppResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut session = self.read()?;
        f(&mut session);
        self.write(&session)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load_credential(&self) -> AppResult<Option<Credential>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.credential())
    }

    fn save_credential(&self, credential: &Credential) -> AppResult<()> {
        self.update(|s| s.set_credential(credential))
    }

    fn clear_credential(&self) -> AppResult<()> {
        self.update(StoredSession::clear_credential)
    }

    fn load_verifier(&self) -> AppResult<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.code_verifier)
    }

    fn save_verifier(&self, verifier: &str) -> AppResult<()> {
        self.update(|s| s.code_verifier = Some(verifier.to_string()))
    }

    fn clear_verifier(&self) -> AppResult<()> {
        self.update(|s| s.code_verifier = None)
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<StoredSession>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        let mut session = StoredSession::default();
        session.set_credential(&credential);
        Self {
            inner: Mutex::new(session),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut StoredSession) -> T) -> T {
        let mut session = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *session)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load_credential(&self) -> AppResult<Option<Credential>> {
        Ok(self.with(|s| s.credential()))
    }

    fn save_credential(&self, credential: &Credential) -> AppResult<()> {
        self.with(|s| s.set_credential(credential));
        Ok(())
    }

    fn clear_credential(&self) -> AppResult<()> {
        self.with(StoredSession::clear_credential);
        Ok(())
    }

    fn load_verifier(&self) -> AppResult<Option<String>> {
        Ok(self.with(|s| s.code_verifier.clone()))
    }

    fn save_verifier(&self, verifier: &str) -> AppResult<()> {
        self.with(|s| s.code_verifier = Some(verifier.to_string()));
        Ok(())
    }

    fn clear_verifier(&self) -> AppResult<()> {
        self.with(|s| s.code_verifier = None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential {
            access_token: "access".into(),
            refresh_token: Some("refresh".into()),
            expires_at_ms: 1_700_000_000_000,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("nowplaying-store-{}-{}", name, std::process::id()))
            .join("session.json")
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = temp_path("reopen");
        let store = FileCredentialStore::new(path.clone());
        store.save_credential(&credential()).unwrap();
        store.save_verifier("verifier").unwrap();

        let reopened = FileCredentialStore::new(path.clone());
        assert_eq!(reopened.load_credential().unwrap(), Some(credential()));
        assert_eq!(reopened.load_verifier().unwrap().as_deref(), Some("verifier"));

        reopened.purge().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn file_store_uses_local_storage_keys() {
        let path = temp_path("keys");
        let store = FileCredentialStore::new(path.clone());
        store.save_credential(&credential()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["spotify_access_token"], "access");
        assert_eq!(raw["spotify_refresh_token"], "refresh");
        assert_eq!(raw["spotify_token_expiry"], 1_700_000_000_000i64);

        store.purge().unwrap();
    }

    #[test]
    fn clearing_credential_keeps_verifier() {
        let store = MemoryCredentialStore::with_credential(credential());
        store.save_verifier("v").unwrap();
        store.clear_credential().unwrap();

        assert_eq!(store.load_credential().unwrap(), None);
        assert_eq!(store.load_verifier().unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn missing_expiry_counts_as_expired() {
        let session: StoredSession =
            serde_json::from_str(r#"{"spotify_access_token":"legacy"}"#).unwrap();
        let credential = session.credential().unwrap();
        assert_eq!(credential.expires_at_ms, 0);
        assert_eq!(credential.refresh_token, None);
    }
}
