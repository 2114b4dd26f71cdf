//! Credential store over a string key/value backend.
//!
//! Layout (one key per credential):
//! - `accessToken`: current access token.
//! - `refreshToken`: current refresh token.
//! - `roles`: JSON array of role names.
//! - `token`: legacy access token key. Read as a fallback, never written, and
//!   removed whenever the store is written or cleared.
//!
//! Every write replaces the three canonical keys as one batch so a reader never
//! observes a half-written session.

use super::{
    credentials::{Session, Token},
    error::StoreError,
};
use secrecy::ExposeSecret;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, warn};

const ACCESS_TOKEN_KEY: &str = "accessToken";
const LEGACY_ACCESS_TOKEN_KEY: &str = "token";
const REFRESH_TOKEN_KEY: &str = "refreshToken";
const ROLES_KEY: &str = "roles";

const ALL_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    LEGACY_ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    ROLES_KEY,
];

/// Synchronous string key/value storage.
pub trait StorageBackend: Send {
    fn get_item(&self, key: &str) -> Option<String>;

    /// Applies every entry of `batch` together. `None` removes the key.
    ///
    /// # Errors
    /// Returns an error if the change could not be persisted.
    fn apply(&mut self, batch: &[(&str, Option<String>)]) -> Result<(), StoreError>;
}

/// Process-local backend; the session ends with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn apply(&mut self, batch: &[(&str, Option<String>)]) -> Result<(), StoreError> {
        apply_to_map(&mut self.items, batch);
        Ok(())
    }
}

/// JSON file backend so a session survives between CLI invocations.
///
/// Entries are cached in memory; every batch rewrites the file through a
/// temporary sibling and a rename. The cache is updated before the write, so
/// a failed write still leaves the running process with the new state.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStorage {
    /// Opens (or lazily creates) the session file at `path`.
    ///
    /// A file that is not a JSON object of strings is treated as an empty
    /// session and replaced on the next write.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let items = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(path = %path.display(), "ignoring unreadable session file: {err}");
                BTreeMap::new()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), entries = items.len(), "opened session file");
        Ok(Self { path, items })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        if self.items.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let payload = serde_json::to_vec_pretty(&self.items)?;
        let mut file = open_private(&tmp_path)?;
        file.write_all(&payload)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn apply(&mut self, batch: &[(&str, Option<String>)]) -> Result<(), StoreError> {
        apply_to_map(&mut self.items, batch);
        self.persist()
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

fn apply_to_map(map: &mut BTreeMap<String, String>, batch: &[(&str, Option<String>)]) {
    for (key, value) in batch {
        match value {
            Some(value) => map.insert((*key).to_string(), value.clone()),
            None => map.remove(*key),
        };
    }
}

/// Single source of truth for the client's credentials.
pub struct CredentialStore {
    backend: Mutex<Box<dyn StorageBackend>>,
}

impl CredentialStore {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Mutex::new(Box::new(backend)),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    fn backend(&self) -> MutexGuard<'_, Box<dyn StorageBackend>> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads the current session. Missing or blank keys read as absent and an
    /// unparseable role list reads as no roles.
    #[must_use]
    pub fn get(&self) -> Session {
        read_session(&**self.backend())
    }

    #[must_use]
    pub fn access_token(&self) -> Option<Token> {
        self.get().access_token
    }

    /// Replaces the stored session. Absent fields remove their keys.
    ///
    /// # Errors
    /// Returns an error if the backend could not persist the change.
    pub fn set(&self, session: &Session) -> Result<(), StoreError> {
        let batch = session_batch(session)?;
        self.backend().apply(&batch)
    }

    /// Writes `renew(current)` only while the stored refresh token is still
    /// `expected`. Read, compare and write happen under one lock, so a logout
    /// or a new login that lands in between is never overwritten.
    ///
    /// Returns the written session, or `None` when the stored session no
    /// longer belongs to `expected` and nothing was written.
    ///
    /// # Errors
    /// Returns an error if the backend could not persist the change.
    pub fn replace_if_refresh(
        &self,
        expected: &Token,
        renew: impl FnOnce(Session) -> Session,
    ) -> Result<Option<Session>, StoreError> {
        let mut backend = self.backend();
        let current = read_session(&**backend);
        if current.refresh_token.as_ref() != Some(expected) {
            return Ok(None);
        }
        let session = renew(current);
        backend.apply(&session_batch(&session)?)?;
        Ok(Some(session))
    }

    /// Removes every credential key.
    ///
    /// Returns `true` when something was stored. Callers use this to make sure
    /// only the party that actually ended the session announces it.
    ///
    /// # Errors
    /// Returns an error if the backend could not persist the change.
    pub fn clear(&self) -> Result<bool, StoreError> {
        clear_all(&mut **self.backend())
    }

    /// Like [`CredentialStore::clear`], but only while the stored refresh
    /// token is still `expected`.
    ///
    /// # Errors
    /// Returns an error if the backend could not persist the change.
    pub fn clear_if_refresh(&self, expected: &Token) -> Result<bool, StoreError> {
        let mut backend = self.backend();
        if read_session(&**backend).refresh_token.as_ref() != Some(expected) {
            return Ok(false);
        }
        clear_all(&mut **backend)
    }
}

fn clear_all(backend: &mut dyn StorageBackend) -> Result<bool, StoreError> {
    let was_present = ALL_KEYS.iter().any(|key| backend.get_item(key).is_some());
    if was_present {
        let batch = ALL_KEYS.map(|key| (key, None));
        backend.apply(&batch)?;
    }
    Ok(was_present)
}

fn read_session(backend: &dyn StorageBackend) -> Session {
    let access_token = backend
        .get_item(ACCESS_TOKEN_KEY)
        .as_deref()
        .and_then(Token::parse)
        .or_else(|| {
            backend
                .get_item(LEGACY_ACCESS_TOKEN_KEY)
                .as_deref()
                .and_then(Token::parse)
        });
    let refresh_token = backend
        .get_item(REFRESH_TOKEN_KEY)
        .as_deref()
        .and_then(Token::parse);
    let roles = backend
        .get_item(ROLES_KEY)
        .map(|raw| parse_roles(&raw))
        .unwrap_or_default();

    Session {
        access_token,
        refresh_token,
        roles,
    }
}

fn session_batch(session: &Session) -> Result<[(&'static str, Option<String>); 4], StoreError> {
    let roles = if session.roles.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&session.roles)?)
    };
    Ok([
        (
            ACCESS_TOKEN_KEY,
            session
                .access_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
        ),
        (LEGACY_ACCESS_TOKEN_KEY, None),
        (
            REFRESH_TOKEN_KEY,
            session
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
        ),
        (ROLES_KEY, roles),
    ])
}

fn parse_roles(raw: &str) -> BTreeSet<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(roles) => roles
            .into_iter()
            .map(|role| role.trim().to_string())
            .filter(|role| !role.is_empty())
            .collect(),
        Err(err) => {
            warn!("ignoring malformed stored roles: {err}");
            BTreeSet::new()
        }
    }
}
