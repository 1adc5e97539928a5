//! Local identity cache.
//!
//! The cache lives on storage that may be wiped at any time, so nothing in
//! the protocol depends on it being present or writable. [`LocalIdentity`]
//! wraps a backend and turns every failure into a logged miss.

use kiosk_api_contract::ScreenId;
use kiosk_local_db::{Database, KvStore};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Scope under which every cache key is stored.
pub const CACHE_SCOPE: &str = "kiosk";

/// Fixed keys of the identity cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    ScreenId,
    ScreenCode,
    ScreenName,
    AssignedPath,
}

impl CacheKey {
    pub const ALL: [CacheKey; 4] = [
        CacheKey::ScreenId,
        CacheKey::ScreenCode,
        CacheKey::ScreenName,
        CacheKey::AssignedPath,
    ];

    /// Keys describing the screen row. Purged when the row turns out to be gone.
    pub const IDENTITY: [CacheKey; 3] = [
        CacheKey::ScreenId,
        CacheKey::ScreenCode,
        CacheKey::AssignedPath,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheKey::ScreenId => "screen_id",
            CacheKey::ScreenCode => "screen_code",
            CacheKey::ScreenName => "screen_name",
            CacheKey::AssignedPath => "assigned_path",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage backend for the identity cache.
pub trait IdentityCache: Send + Sync {
    fn get(&self, key: CacheKey) -> crate::Result<Option<String>>;

    fn set(&self, key: CacheKey, value: &str) -> crate::Result<()>;

    fn remove(&self, key: CacheKey) -> crate::Result<()>;

    /// Drop every key describing the screen row. The hostname survives.
    fn purge(&self) -> crate::Result<()> {
        for key in CacheKey::IDENTITY {
            self.remove(key)?;
        }
        Ok(())
    }
}

impl IdentityCache for Database {
    fn get(&self, key: CacheKey) -> crate::Result<Option<String>> {
        let conn = self.connection()?;
        Ok(KvStore::new(&conn).get(CACHE_SCOPE, key.as_str())?)
    }

    fn set(&self, key: CacheKey, value: &str) -> crate::Result<()> {
        let conn = self.connection()?;
        KvStore::new(&conn).set(CACHE_SCOPE, key.as_str(), Some(value))?;
        Ok(())
    }

    fn remove(&self, key: CacheKey) -> crate::Result<()> {
        let conn = self.connection()?;
        KvStore::new(&conn).delete(CACHE_SCOPE, key.as_str())?;
        Ok(())
    }

    fn purge(&self) -> crate::Result<()> {
        self.transaction(|conn| {
            let kv = KvStore::new(conn);
            for key in CacheKey::IDENTITY {
                kv.delete(CACHE_SCOPE, key.as_str())?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// In-memory backend, optionally unavailable to simulate broken storage.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, String>>,
    unavailable: Mutex<bool>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        *self
            .unavailable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = unavailable;
    }

    fn entries(&self) -> crate::Result<MutexGuard<'_, HashMap<CacheKey, String>>> {
        let unavailable = *self
            .unavailable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if unavailable {
            return Err(crate::Error::generic("local storage unavailable"));
        }
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl IdentityCache for MemoryCache {
    fn get(&self, key: CacheKey) -> crate::Result<Option<String>> {
        Ok(self.entries()?.get(&key).cloned())
    }

    fn set(&self, key: CacheKey, value: &str) -> crate::Result<()> {
        self.entries()?.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: CacheKey) -> crate::Result<()> {
        self.entries()?.remove(&key);
        Ok(())
    }
}

/// Point-in-time view of every cached value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CachedIdentity {
    pub screen_id: Option<String>,
    pub screen_code: Option<String>,
    pub screen_name: Option<String>,
    pub assigned_path: Option<String>,
}

/// Failure-tolerant view over an [`IdentityCache`] backend.
#[derive(Clone)]
pub struct LocalIdentity {
    backend: Arc<dyn IdentityCache>,
}

impl fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalIdentity").finish_non_exhaustive()
    }
}

impl LocalIdentity {
    pub fn new(backend: Arc<dyn IdentityCache>) -> Self {
        Self { backend }
    }

    /// Read a key; a failing backend reads as empty.
    pub fn read(&self, key: CacheKey) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "local cache read failed");
                None
            }
        }
    }

    pub fn write(&self, key: CacheKey, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            warn!(key = %key, error = %e, "local cache write failed");
        }
    }

    pub fn forget(&self, key: CacheKey) {
        if let Err(e) = self.backend.remove(key) {
            warn!(key = %key, error = %e, "local cache delete failed");
        }
    }

    pub fn purge(&self) {
        if let Err(e) = self.backend.purge() {
            warn!(error = %e, "local cache purge failed");
        }
    }

    pub fn screen_id(&self) -> Option<ScreenId> {
        self.read(CacheKey::ScreenId).map(ScreenId::new)
    }

    pub fn snapshot(&self) -> CachedIdentity {
        CachedIdentity {
            screen_id: self.read(CacheKey::ScreenId),
            screen_code: self.read(CacheKey::ScreenCode),
            screen_name: self.read(CacheKey::ScreenName),
            assigned_path: self.read(CacheKey::AssignedPath),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(cache: &dyn IdentityCache) {
        for key in CacheKey::ALL {
            cache.set(key, &format!("{key}-value")).unwrap();
        }
    }

    #[test]
    fn test_purge_keeps_hostname() {
        let cache = MemoryCache::new();
        fill(&cache);

        cache.purge().unwrap();

        for key in CacheKey::IDENTITY {
            assert_eq!(cache.get(key).unwrap(), None);
        }
        assert_eq!(
            cache.get(CacheKey::ScreenName).unwrap().as_deref(),
            Some("screen_name-value")
        );
    }

    #[test]
    fn test_database_backend() {
        let db = Database::open_in_memory().unwrap();
        fill(&db);
        assert_eq!(
            db.get(CacheKey::AssignedPath).unwrap().as_deref(),
            Some("assigned_path-value")
        );

        db.purge().unwrap();
        assert_eq!(db.get(CacheKey::ScreenId).unwrap(), None);
        assert_eq!(db.get(CacheKey::ScreenCode).unwrap(), None);
        assert!(db.get(CacheKey::ScreenName).unwrap().is_some());
    }

    #[test]
    fn test_unavailable_backend_reads_as_empty() {
        let backend = Arc::new(MemoryCache::new());
        backend.set(CacheKey::ScreenId, "abc").unwrap();
        let identity = LocalIdentity::new(backend.clone());

        backend.set_unavailable(true);
        assert_eq!(identity.screen_id(), None);
        identity.write(CacheKey::ScreenId, "def");
        identity.purge();

        backend.set_unavailable(false);
        assert_eq!(identity.screen_id(), Some(ScreenId::new("abc")));
    }

    #[test]
    fn test_snapshot() {
        let identity = LocalIdentity::new(Arc::new(MemoryCache::new()));
        identity.write(CacheKey::ScreenId, "abc");
        identity.write(CacheKey::ScreenCode, "K7QX");

        let snapshot = identity.snapshot();
        assert_eq!(snapshot.screen_id.as_deref(), Some("abc"));
        assert_eq!(snapshot.screen_code.as_deref(), Some("K7QX"));
        assert_eq!(snapshot.assigned_path, None);
    }
}
