//! Content-addressed response cache with TTL
//!
//! Identical prompts against identical histories are served from a
//! per-user disk cache instead of hitting the provider. The key is the
//! SHA-256 of the canonical JSON of `{model, prompt, history}` where
//! `history` excludes the prompt being asked — so two calls with the same
//! arguments always map to the same entry and any change to the model,
//! prompt, or earlier history changes the key.
//!
//! The cache directory is shared across sessions. Writers use whole-file
//! atomic writes keyed by unique keys; collisions are idempotent (same key
//! means equivalent content). Every cache failure is soft: callers log and
//! proceed as if the cache were absent.

use chrono::{DateTime, Duration, Utc};
use foundry_utils::atomic_write::write_json_atomic;
use foundry_utils::canonical::sha256_canonical;
use foundry_utils::error::CacheError;
use foundry_utils::paths::ensure_dir_all;
use foundry_utils::types::Message;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Default time-to-live: 7 days.
pub const DEFAULT_TTL_HOURS: i64 = 168;

/// A cached provider response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Response text
    pub content: String,
    /// Input tokens the original call consumed
    pub input_tokens: u64,
    /// Output tokens the original call generated
    pub output_tokens: u64,
    /// Model that served the original call
    pub model: String,
    /// When the entry was written
    pub timestamp: DateTime<Utc>,
}

/// Cache statistics for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries on disk
    pub entries: usize,
    /// Total size of entries in bytes
    pub total_bytes: u64,
    /// Hits recorded this session
    pub session_hits: u64,
    /// Misses recorded this session
    pub session_misses: u64,
    /// Hit rate over this session's lookups
    pub hit_rate: f64,
}

/// On-disk response cache.
///
/// Hit/miss counters are atomic so a shared instance can be consulted from
/// concurrent builder workers.
#[derive(Debug)]
pub struct ResponseCache {
    cache_dir: PathBuf,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Open (creating if needed) a cache at the given directory.
    ///
    /// # Errors
    /// Returns `CacheError::DirectoryUnavailable` if the directory cannot be
    /// created.
    pub fn new(cache_dir: impl Into<PathBuf>, ttl_hours: i64) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();
        ensure_dir_all(&cache_dir)
            .map_err(|e| CacheError::DirectoryUnavailable(format!("{}: {e}", cache_dir.display())))?;
        Ok(Self {
            cache_dir,
            ttl: Duration::hours(ttl_hours.max(0)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Open the default per-user cache with the default TTL.
    ///
    /// # Errors
    /// Propagates directory creation failure.
    pub fn open_default() -> Result<Self, CacheError> {
        Self::new(foundry_utils::paths::response_cache_dir(), DEFAULT_TTL_HOURS)
    }

    /// Compute the cache key for a call.
    ///
    /// `history` is the conversation *before* the current prompt was
    /// appended. The key is a pure function of `(model, prompt, history)`.
    ///
    /// # Errors
    /// Returns `CacheError::WriteFailed` if canonicalization fails (only
    /// possible for non-JSON-representable input, which `Message` is not).
    pub fn cache_key(
        model: &str,
        prompt: &str,
        history: &[Message],
    ) -> Result<String, CacheError> {
        #[derive(Serialize)]
        struct KeyMaterial<'a> {
            model: &'a str,
            prompt: &'a str,
            history: &'a [Message],
        }

        sha256_canonical(&KeyMaterial {
            model,
            prompt,
            history,
        })
        .map_err(|e| CacheError::WriteFailed {
            key: String::new(),
            reason: e.to_string(),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }

    /// Look up an entry, honoring the TTL.
    ///
    /// Returns `None` on miss, expiry, or any read problem (corrupt and
    /// expired entries are deleted). Counters are updated either way.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let path = self.entry_path(key);

        let entry = match Self::read_entry(&path) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                debug!(key, error = %e, "cache read failed; treating as miss");
                let _ = fs::remove_file(&path);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if Utc::now() - entry.timestamp > self.ttl {
            debug!(key, "cache entry expired; deleting");
            let _ = fs::remove_file(&path);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry)
    }

    fn read_entry(path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::ReadFailed {
                    key: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };
        let entry = serde_json::from_str(&content).map_err(|e| CacheError::Corrupted {
            key: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(entry))
    }

    /// Store an entry under a key.
    ///
    /// # Errors
    /// Returns `CacheError::WriteFailed`; callers treat this as soft.
    pub fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        write_json_atomic(&self.entry_path(key), entry).map_err(|e| CacheError::WriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Remove entries, optionally only those older than `max_age_hours`.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    /// Returns `CacheError::ReadFailed` if the directory cannot be listed.
    pub fn clear(&self, max_age_hours: Option<i64>) -> Result<usize, CacheError> {
        let cutoff = max_age_hours.map(|h| Utc::now() - Duration::hours(h));
        let mut removed = 0;

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| CacheError::ReadFailed {
            key: self.cache_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        for dir_entry in entries.flatten() {
            let path = dir_entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let expired = match cutoff {
                None => true,
                Some(cutoff) => match Self::read_entry(&path) {
                    Ok(Some(entry)) => entry.timestamp < cutoff,
                    // Unreadable entries are junk regardless of age
                    _ => true,
                },
            };

            if expired && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Snapshot cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut entries = 0;
        let mut total_bytes = 0;
        if let Ok(dir) = fs::read_dir(&self.cache_dir) {
            for entry in dir.flatten() {
                if entry.path().extension().and_then(|s| s.to_str()) == Some("json") {
                    entries += 1;
                    total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
            }
        }

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        CacheStats {
            entries,
            total_bytes,
            session_hits: hits,
            session_misses: misses,
            hit_rate,
        }
    }
}
