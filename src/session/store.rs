//! Durable key/value persistence for the session.
//!
//! The store holds three opaque strings: the access token, the refresh token
//! and the JSON-serialized user profile. It enforces no expiry of its own.
//! Storage that cannot be read or written is logged and otherwise ignored; a
//! broken disk must never take the client down.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, warn};

/// The only keys the session persists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKey {
    AccessToken,
    RefreshToken,
    User,
}

impl StoreKey {
    pub const ALL: [StoreKey; 3] = [StoreKey::AccessToken, StoreKey::RefreshToken, StoreKey::User];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKey::AccessToken => "accessToken",
            StoreKey::RefreshToken => "refreshToken",
            StoreKey::User => "user",
        }
    }
}

/// Key/value persistence surviving restarts.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Option<String>;

    fn set(&self, key: StoreKey, value: &str);

    /// Removes all session keys in one step.
    fn clear(&self);

    /// Writes several keys; implementations backed by files override this to
    /// persist them together.
    fn set_all(&self, entries: &[(StoreKey, &str)]) {
        for (key, value) in entries {
            self.set(*key, value);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-local store, used by tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StoreKey, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: StoreKey) -> Option<String> {
        lock(&self.entries).get(&key).cloned()
    }

    fn set(&self, key: StoreKey, value: &str) {
        lock(&self.entries).insert(key, value.to_string());
    }

    fn clear(&self) {
        lock(&self.entries).clear();
    }

    fn set_all(&self, entries: &[(StoreKey, &str)]) {
        let mut map = lock(&self.entries);
        for (key, value) in entries {
            map.insert(*key, (*value).to_string());
        }
    }
}

/// JSON object file, e.g. `{"accessToken": "...", "refreshToken": "...", "user": "{...}"}`.
///
/// Writes go to a sibling temp file that is then renamed over the target, so a
/// reader sees either the old or the new set of keys.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`. A missing or unreadable file starts empty.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Ignoring unreadable session file");
                BTreeMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) {
        if let Err(err) = write_entries(&self.path, entries) {
            warn!(path = %self.path.display(), error = %err, "Failed to persist session file");
        } else {
            debug!(path = %self.path.display(), keys = entries.len(), "Session file written");
        }
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: StoreKey) -> Option<String> {
        lock(&self.entries).get(key.as_str()).cloned()
    }

    fn set(&self, key: StoreKey, value: &str) {
        self.set_all(&[(key, value)]);
    }

    fn clear(&self) {
        let mut entries = lock(&self.entries);
        for key in StoreKey::ALL {
            entries.remove(key.as_str());
        }
        self.persist(&entries);
    }

    fn set_all(&self, updates: &[(StoreKey, &str)]) {
        let mut entries = lock(&self.entries);
        for (key, value) in updates {
            entries.insert(key.as_str().to_string(), (*value).to_string());
        }
        self.persist(&entries);
    }
}

fn read_entries(path: &Path) -> io::Result<BTreeMap<String, String>> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_vec_pretty(entries)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

    let tmp = path.with_extension("tmp");
    let mut file = create_private(&tmp)?;
    file.write_all(&json)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)
}

/// Creates (or truncates) `path` readable by the owner only from the start.
#[cfg(unix)]
fn create_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; a leftover temp file keeps its bits.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_and_clears() {
        let store = MemoryStore::new();
        store.set_all(&[
            (StoreKey::AccessToken, "a1"),
            (StoreKey::RefreshToken, "r1"),
            (StoreKey::User, "{}"),
        ]);
        assert_eq!(store.get(StoreKey::AccessToken).as_deref(), Some("a1"));

        store.set(StoreKey::AccessToken, "a2");
        assert_eq!(store.get(StoreKey::AccessToken).as_deref(), Some("a2"));
        assert_eq!(store.get(StoreKey::RefreshToken).as_deref(), Some("r1"));

        store.clear();
        for key in StoreKey::ALL {
            assert_eq!(store.get(key), None);
        }
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileStore::open(&path);
        store.set_all(&[(StoreKey::AccessToken, "a1"), (StoreKey::RefreshToken, "r1")]);
        store.set(StoreKey::User, r#"{"id":"1"}"#);

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(StoreKey::AccessToken).as_deref(), Some("a1"));
        assert_eq!(reopened.get(StoreKey::RefreshToken).as_deref(), Some("r1"));
        assert_eq!(reopened.get(StoreKey::User).as_deref(), Some(r#"{"id":"1"}"#));

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"accessToken\""));
        assert!(!path.with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, "{}").unwrap();
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o644)).unwrap();

        FileStore::open(&path).set(StoreKey::AccessToken, "a1");

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!tmp.exists());
    }

    #[test]
    fn file_store_clear_removes_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::open(&path);
        store.set_all(&[
            (StoreKey::AccessToken, "a1"),
            (StoreKey::RefreshToken, "r1"),
            (StoreKey::User, "{}"),
        ]);
        store.clear();

        let reopened = FileStore::open(&path);
        for key in StoreKey::ALL {
            assert_eq!(reopened.get(key), None);
        }
    }

    #[test]
    fn file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get(StoreKey::AccessToken), None);

        store.set(StoreKey::AccessToken, "a2");
        assert_eq!(
            FileStore::open(&path).get(StoreKey::AccessToken).as_deref(),
            Some("a2")
        );
    }

    #[test]
    fn store_keys_match_persisted_names() {
        let names: Vec<&str> = StoreKey::ALL.iter().map(|key| key.as_str()).collect();
        assert_eq!(names, ["accessToken", "refreshToken", "user"]);
    }
}
