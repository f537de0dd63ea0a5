//! Cookie-style key/value storage with per-key expiration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access cookie file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode cookie file {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Durable name -> value storage where every entry carries its own lifetime.
pub trait CookieStore: Send + Sync {
    /// Value of a cookie, or `None` when missing or past its max-age.
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str, max_age: Duration) -> Result<(), StoreError>;
    fn remove(&self, name: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CookieEntry {
    value: String,
    /// Unix timestamp (seconds)
    expires_at: u64,
}

impl CookieEntry {
    fn new(value: &str, max_age: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: unix_now().saturating_add(max_age.as_secs()),
        }
    }

    fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lookup(entries: &mut HashMap<String, CookieEntry>, name: &str) -> Option<String> {
    let now = unix_now();
    match entries.get(name) {
        Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
        Some(_) => {
            entries.remove(name);
            None
        }
        None => None,
    }
}

/// Cookie storage that lives as long as the process.
#[derive(Default)]
pub struct MemoryCookieStore {
    entries: Mutex<HashMap<String, CookieEntry>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, name: &str) -> Option<String> {
        lookup(&mut lock(&self.entries), name)
    }

    fn set(&self, name: &str, value: &str, max_age: Duration) -> Result<(), StoreError> {
        lock(&self.entries).insert(name.to_string(), CookieEntry::new(value, max_age));
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        lock(&self.entries).remove(name);
        Ok(())
    }
}

/// Cookie storage persisted as JSON, surviving restarts of the client.
///
/// The whole jar is rewritten on every change; it only ever holds a handful of
/// entries.
pub struct FileCookieStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, CookieEntry>>,
}

impl FileCookieStore {
    /// Open the jar at `path`, creating parent directories.
    ///
    /// A missing or unreadable jar is treated as empty, so the user signs in
    /// again instead of being locked out.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Cookie file is corrupt, starting empty");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(io_err(e)),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, CookieEntry>) -> Result<(), StoreError> {
        let now = unix_now();
        let live: HashMap<&String, &CookieEntry> =
            entries.iter().filter(|(_, e)| e.is_live(now)).collect();
        let content = serde_json::to_string_pretty(&live).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source,
        })?;
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        // Write then rename so a crash never leaves a half-written jar
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl CookieStore for FileCookieStore {
    fn get(&self, name: &str) -> Option<String> {
        lookup(&mut lock(&self.entries), name)
    }

    fn set(&self, name: &str, value: &str, max_age: Duration) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        entries.insert(name.to_string(), CookieEntry::new(value, max_age));
        self.persist(&entries)
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        if entries.remove(name).is_none() {
            return Ok(());
        }
        self.persist(&entries)
    }
}
