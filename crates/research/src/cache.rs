//! Durable SQLite research cache with TTL expiry.
//!
//! One connection sits behind a mutex, so every read-check-delete and every
//! upsert runs as a unit. Failures surface as `AppError::CacheUnavailable`;
//! callers treat them as a miss.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use seva_core::{AppError, AppResult, CacheConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Minimum spacing between opportunistic sweeps triggered by `put`.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS research_cache (
    fingerprint TEXT PRIMARY KEY NOT NULL,
    payload BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_research_cache_expires ON research_cache(expires_at);
"#;

/// A live cache row.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub expired: usize,
}

struct Store {
    conn: Mutex<Connection>,
    last_sweep: Mutex<Option<DateTime<Utc>>>,
}

/// Research cache; a disabled cache misses on every read and drops writes.
pub struct ResearchCache {
    store: Option<Store>,
    path: Option<PathBuf>,
    ttl: Duration,
}

impl ResearchCache {
    /// Open the cache described by `config`, resolving relative paths
    /// against `workspace`.
    pub fn from_config(config: &CacheConfig, workspace: &Path) -> Self {
        if !config.enabled {
            tracing::info!("Research cache disabled");
            return Self::disabled();
        }
        Self::open(&config.resolved_path(workspace), config.ttl())
    }

    /// Open or create the cache file.
    ///
    /// A file that cannot be initialized is renamed with a `.corrupt` suffix
    /// and recreated. If that fails too the cache runs disabled.
    pub fn open(path: &Path, ttl: Duration) -> Self {
        let conn = match init_db(path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Research cache at {:?} unusable: {}", path, e);
                match quarantine(path).and_then(|_| init_db(path)) {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("Research cache disabled: {}", e);
                        return Self {
                            store: None,
                            path: Some(path.to_path_buf()),
                            ttl,
                        };
                    }
                }
            }
        };

        tracing::info!("Research cache enabled at {:?}", path);
        Self {
            store: Some(Store {
                conn: Mutex::new(conn),
                last_sweep: Mutex::new(None),
            }),
            path: Some(path.to_path_buf()),
            ttl,
        }
    }

    pub fn disabled() -> Self {
        Self {
            store: None,
            path: None,
            ttl: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Default lifetime applied by `put`.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, fingerprint: &str) -> AppResult<Option<CacheEntry>> {
        self.get_at(fingerprint, Utc::now())
    }

    /// Look up an entry, treating `expires_at <= now` as a miss.
    ///
    /// The expired row is deleted under the same lock as the read.
    pub fn get_at(&self, fingerprint: &str, now: DateTime<Utc>) -> AppResult<Option<CacheEntry>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let conn = lock(&store.conn);

        let row = conn
            .query_row(
                "SELECT payload, created_at, expires_at FROM research_cache WHERE fingerprint = ?1",
                params![fingerprint],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| cache_error("Failed to read cache entry", e))?;

        let Some((payload, created_at, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at <= now.timestamp_millis() {
            conn.execute(
                "DELETE FROM research_cache WHERE fingerprint = ?1",
                params![fingerprint],
            )
            .map_err(|e| cache_error("Failed to delete expired entry", e))?;
            tracing::debug!("Cache entry {} expired", short(fingerprint));
            return Ok(None);
        }

        Ok(Some(CacheEntry {
            fingerprint: fingerprint.to_string(),
            payload,
            created_at: from_millis(created_at),
            expires_at: from_millis(expires_at),
        }))
    }

    /// Store `payload` with the default TTL.
    pub fn put(&self, fingerprint: &str, payload: &[u8]) -> AppResult<()> {
        self.put_at(fingerprint, payload, self.ttl, Utc::now())
    }

    /// Upsert an entry; the last write for a fingerprint wins.
    pub fn put_at(
        &self,
        fingerprint: &str,
        payload: &[u8],
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let ttl = ChronoDuration::from_std(ttl)
            .map_err(|e| AppError::CacheUnavailable(format!("Invalid TTL: {}", e)))?;
        let created_at = now.timestamp_millis();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::CacheUnavailable(format!("TTL out of range: {:?}", ttl)))?
            .timestamp_millis();

        lock(&store.conn)
            .execute(
                "INSERT INTO research_cache (fingerprint, payload, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(fingerprint) DO UPDATE SET
                     payload = excluded.payload,
                     created_at = excluded.created_at,
                     expires_at = excluded.expires_at",
                params![fingerprint, payload, created_at, expires_at],
            )
            .map_err(|e| cache_error("Failed to write cache entry", e))?;

        tracing::debug!(
            "Cached {} ({} bytes, ttl {:?})",
            short(fingerprint),
            payload.len(),
            ttl
        );

        if self.sweep_due(store, now) {
            match self.sweep(now) {
                Ok(0) => {}
                Ok(removed) => tracing::info!("Swept {} expired cache entries", removed),
                Err(e) => tracing::warn!("Opportunistic sweep failed: {}", e),
            }
        }
        Ok(())
    }

    /// Remove one entry regardless of expiry.
    pub fn remove(&self, fingerprint: &str) -> AppResult<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let removed = lock(&store.conn)
            .execute(
                "DELETE FROM research_cache WHERE fingerprint = ?1",
                params![fingerprint],
            )
            .map_err(|e| cache_error("Failed to delete cache entry", e))?;
        Ok(removed > 0)
    }

    /// Delete every entry with `expires_at <= now`.
    pub fn sweep(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let removed = lock(&store.conn)
            .execute(
                "DELETE FROM research_cache WHERE expires_at <= ?1",
                params![now.timestamp_millis()],
            )
            .map_err(|e| cache_error("Failed to sweep cache", e))?;
        *lock(&store.last_sweep) = Some(now);
        Ok(removed)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> AppResult<CacheStats> {
        let Some(store) = &self.store else {
            return Ok(CacheStats {
                entries: 0,
                expired: 0,
            });
        };
        let conn = lock(&store.conn);

        let (entries, expired): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN expires_at <= ?1 THEN 1 ELSE 0 END), 0)
                 FROM research_cache",
                params![now.timestamp_millis()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| cache_error("Failed to count cache entries", e))?;

        Ok(CacheStats {
            entries: entries.max(0) as usize,
            expired: expired.max(0) as usize,
        })
    }

    /// Delete every entry.
    pub fn clear(&self) -> AppResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let removed = lock(&store.conn)
            .execute("DELETE FROM research_cache", [])
            .map_err(|e| cache_error("Failed to clear cache", e))?;
        tracing::info!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    fn sweep_due(&self, store: &Store, now: DateTime<Utc>) -> bool {
        match *lock(&store.last_sweep) {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map_or(false, |elapsed| elapsed >= SWEEP_INTERVAL),
        }
    }
}

impl std::fmt::Debug for ResearchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchCache")
            .field("enabled", &self.is_enabled())
            .field("path", &self.path)
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn init_db(path: &Path) -> AppResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::CacheUnavailable(format!("Failed to create cache directory: {}", e))
        })?;
    }

    let conn = Connection::open(path).map_err(|e| cache_error("Failed to open cache", e))?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| cache_error("Failed to configure cache", e))?;
    conn.execute_batch(SCHEMA)
        .map_err(|e| cache_error("Failed to create cache schema", e))?;

    tracing::debug!("Initialized research cache at {:?}", path);
    Ok(conn)
}

fn quarantine(path: &Path) -> AppResult<()> {
    if !path.exists() {
        return Ok(());
    }
    let mut target = path.as_os_str().to_owned();
    target.push(".corrupt");
    let target = PathBuf::from(target);

    std::fs::rename(path, &target).map_err(|e| {
        AppError::CacheUnavailable(format!("Failed to quarantine {:?}: {}", path, e))
    })?;
    tracing::warn!("Moved unreadable research cache to {:?}", target);
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn cache_error(context: &str, e: rusqlite::Error) -> AppError {
    AppError::CacheUnavailable(format!("{}: {}", context, e))
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
