//! Client identity: a per-process `client_id` and a persisted `session_id`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tracing::debug;

use crate::error::SyncError;
use crate::protocol::Persona;

/// Key the session id is stored under.
pub const SESSION_KEY: &str = "relief_session_id";

const STORE_FILE: &str = "session.toml";

/// Identity of one running client.
///
/// `client_id` scopes result polling and lives only as long as the process.
/// `session_id` names the conversation thread and survives restarts through a
/// [`SessionStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    pub client_id: String,
    pub session_id: String,
    pub persona: Persona,
}

impl ClientSession {
    /// Fresh `client_id`, and the stored `session_id` if there is one.
    /// A newly generated session id is written back to the store.
    pub fn open(persona: Persona, store: &SessionStore) -> Result<Self, SyncError> {
        let session_id = match store.get(SESSION_KEY)? {
            Some(id) => {
                debug!(session_id = %id, "reusing persisted session");
                id
            }
            None => {
                let id = generate_session_id();
                store.set(SESSION_KEY, &id)?;
                debug!(session_id = %id, "created new session");
                id
            }
        };
        Ok(Self::with_session_id(persona, session_id))
    }

    /// Session that is never persisted.
    pub fn ephemeral(persona: Persona) -> Self {
        Self::with_session_id(persona, generate_session_id())
    }

    pub fn with_session_id(persona: Persona, session_id: impl Into<String>) -> Self {
        ClientSession {
            client_id: generate_client_id(persona),
            session_id: session_id.into(),
            persona,
        }
    }
}

/// Random `client_id`: persona prefix plus 7 lowercase base-36 characters.
pub fn generate_client_id(persona: Persona) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..7)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect();
    format!("{}{}", persona.client_prefix(), suffix)
}

/// `session_<unix-ms>`.
pub fn generate_session_id() -> String {
    format!("session_{}", now_ms())
}

/// Current Unix epoch in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Small key/value store backed by a TOML file in the state directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        SessionStore { path: state_dir.as_ref().join(STORE_FILE) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self.load()?.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = toml::to_string(&entries).map_err(|e| SyncError::Config(e.to_string()))?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }

    fn load(&self) -> Result<BTreeMap<String, String>, SyncError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => toml::from_str(&raw).map_err(|e| {
                SyncError::Config(format!("corrupt session store {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_has_persona_prefix_and_length() {
        let id = generate_client_id(Persona::Victim);
        assert!(id.starts_with("vic_"));
        assert_eq!(id.len(), 11);
        let sup = generate_client_id(Persona::Supervisor);
        assert!(sup.starts_with("sup_"));
    }

    #[test]
    fn client_id_suffix_is_base36_lowercase() {
        let id = generate_client_id(Persona::Victim);
        assert!(id[4..].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn client_ids_are_unique() {
        let ids: std::collections::HashSet<String> =
            (0..100).map(|_| generate_client_id(Persona::Victim)).collect();
        assert!(ids.len() > 95);
    }

    #[test]
    fn session_id_reused_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let first = ClientSession::open(Persona::Victim, &store).unwrap();
        let second = ClientSession::open(Persona::Victim, &store).unwrap();
        assert_eq!(first.session_id, second.session_id);
        assert_ne!(first.client_id, second.client_id, "client_id must not be persisted");
    }

    #[test]
    fn store_file_never_contains_client_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session = ClientSession::open(Persona::Victim, &store).unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains(&session.session_id));
        assert!(!raw.contains(&session.client_id));
    }

    #[test]
    fn store_creates_missing_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("state"));
        store.set(SESSION_KEY, "session_42").unwrap();
        assert_eq!(store.get(SESSION_KEY).unwrap().as_deref(), Some("session_42"));
    }

    #[test]
    fn corrupt_store_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        std::fs::write(store.path(), "not = [valid").unwrap();
        assert!(matches!(store.get(SESSION_KEY), Err(SyncError::Config(_))));
    }

    #[test]
    fn session_id_format() {
        let id = generate_session_id();
        let ms: u64 = id.strip_prefix("session_").unwrap().parse().unwrap();
        assert!(ms > 1_700_000_000_000);
    }
}
