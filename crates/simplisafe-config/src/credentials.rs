// ── Credential persistence ──
//
// Stores the session's token pair between runs, either in the OS keyring
// or a JSON file. The core never touches storage; it publishes new
// credentials on a watch channel and `persist_credentials` writes them out.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use simplisafe_api::Credentials;

use crate::{ConfigError, KEYRING_SERVICE, Profile};

/// Somewhere to keep credentials between runs.
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Credentials>, ConfigError>;
    fn save(&self, credentials: &Credentials) -> Result<(), ConfigError>;
    fn clear(&self) -> Result<(), ConfigError>;
}

// ── File ────────────────────────────────────────────────────────────

/// JSON file, readable only by the owner on Unix.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, ConfigError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(credentials)?;

        // Write beside the target, then rename over it.
        let tmp = self.path.with_extension("tmp");
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ConfigError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// ── Keyring ─────────────────────────────────────────────────────────

/// OS keyring entry holding the credentials as JSON.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    user: String,
}

impl KeyringCredentialStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            user: format!("{profile_name}/credentials"),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, ConfigError> {
        Ok(keyring::Entry::new(KEYRING_SERVICE, &self.user)?)
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, ConfigError> {
        match self.entry()?.get_password() {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<(), ConfigError> {
        let json = serde_json::to_string(credentials)?;
        self.entry()?.set_password(&json)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ConfigError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ── Selection and persistence ───────────────────────────────────────

/// The store a profile asks for: `"file"` keeps a JSON file under the
/// data directory, anything else uses the keyring.
pub fn credential_store_for(
    profile: &Profile,
    profile_name: &str,
) -> Result<Arc<dyn CredentialStore>, ConfigError> {
    match profile.credential_store.as_deref() {
        None | Some("keyring") => Ok(Arc::new(KeyringCredentialStore::new(profile_name))),
        Some("file") => {
            let path = crate::data_dir().join(format!("{profile_name}.credentials.json"));
            Ok(Arc::new(FileCredentialStore::new(path)))
        }
        Some(other) => Err(ConfigError::Validation {
            field: "credential_store".into(),
            reason: format!("expected 'keyring' or 'file', got '{other}'"),
        }),
    }
}

/// Save every credential update published on `updates` until the sender
/// goes away. Each save runs on the blocking pool, one at a time.
pub fn persist_credentials(
    mut updates: watch::Receiver<Option<Credentials>>,
    store: Arc<dyn CredentialStore>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let Some(credentials) = updates.borrow_and_update().clone() else {
                continue;
            };
            let expires_at = credentials.expires_at;
            let target = Arc::clone(&store);
            // File and keyring writes block.
            match tokio::task::spawn_blocking(move || target.save(&credentials)).await {
                Ok(Ok(())) => debug!(%expires_at, "credentials persisted"),
                Ok(Err(e)) => warn!(error = %e, "failed to persist credentials"),
                Err(e) => warn!(error = %e, "credential write task failed"),
            }
        }
        debug!("credential persistence finished");
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;

    use super::*;

    fn credentials(access: &str) -> Credentials {
        Credentials {
            access_token: SecretString::from(access.to_string()),
            refresh_token: SecretString::from("refresh".to_string()),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            token_type: "Bearer".into(),
        }
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("sub").join("creds.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&credentials("a")).unwrap();
        assert_eq!(store.load().unwrap(), Some(credentials("a")));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("creds.json"));
        store.save(&credentials("a")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            FileCredentialStore::new(path).load(),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn unknown_store_kind_is_rejected() {
        let profile = Profile {
            credential_store: Some("shoebox".into()),
            ..Profile::default()
        };
        assert!(matches!(
            credential_store_for(&profile, "home"),
            Err(ConfigError::Validation { .. })
        ));
    }

    /// Records the thread each save ran on.
    #[derive(Default)]
    struct RecordingStore {
        threads: std::sync::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl CredentialStore for RecordingStore {
        fn load(&self) -> Result<Option<Credentials>, ConfigError> {
            Ok(None)
        }

        fn save(&self, _credentials: &Credentials) -> Result<(), ConfigError> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            Ok(())
        }

        fn clear(&self) -> Result<(), ConfigError> {
            Ok(())
        }
    }

    // The current-thread test runtime polls every task on this thread, so a
    // save made inline would record it.
    #[tokio::test]
    async fn saves_run_off_the_runtime_thread() {
        let store = Arc::new(RecordingStore::default());
        let (tx, rx) = watch::channel(None);

        let handle = persist_credentials(rx, Arc::clone(&store) as Arc<dyn CredentialStore>);
        tx.send_replace(Some(credentials("first")));
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(tx);
        handle.await.unwrap();

        let threads = store.threads.lock().unwrap();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn updates_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCredentialStore::new(dir.path().join("creds.json")));
        let (tx, rx) = watch::channel(None);

        let handle = persist_credentials(rx, Arc::clone(&store) as Arc<dyn CredentialStore>);
        tx.send_replace(Some(credentials("first")));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send_replace(Some(credentials("second")));
        drop(tx);
        handle.await.unwrap();

        assert_eq!(store.load().unwrap(), Some(credentials("second")));
    }
}
