//! Sled-based Speech Cache Implementation
//!
//! - `entry:{hash}`  → bincode 序列化的条目，只写一次
//! - `access:{hash}` → 最后访问时间（unix 秒，大端 i64）
//!
//! 访问时间与条目分开存储，读取时只更新访问时间，条目本身永不改写。

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::application::ports::{
    AudioFormat, CacheEntry, CacheError, CacheStats, SpeechCachePort, SweepResult,
};

const ENTRY_PREFIX: &str = "entry:";
const ACCESS_PREFIX: &str = "access:";

/// Sled 缓存配置
#[derive(Debug, Clone)]
pub struct SledCacheConfig {
    /// 数据库路径
    pub db_path: String,
}

impl Default for SledCacheConfig {
    fn default() -> Self {
        Self {
            db_path: "data/speech-cache.sled".to_string(),
        }
    }
}

/// 持久化的条目
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    format: AudioFormat,
    audio_data: Vec<u8>,
    size_bytes: u64,
    created_at: i64,
}

fn db_error(e: sled::Error) -> CacheError {
    CacheError::DatabaseError(e.to_string())
}

/// Sled 合成缓存
pub struct SledSpeechCache {
    db: Db,
    current_size: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl SledSpeechCache {
    /// 创建新的缓存实例
    pub fn new(config: &SledCacheConfig) -> Result<Self, CacheError> {
        let db = sled::open(&config.db_path).map_err(db_error)?;

        let current_size = Self::calculate_total_size(&db)?;

        tracing::info!(
            db_path = %config.db_path,
            current_size = current_size,
            "SledSpeechCache initialized"
        );

        Ok(Self {
            db,
            current_size: AtomicU64::new(current_size),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        })
    }

    /// 打开现有缓存
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        Self::new(&SledCacheConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
        })
    }

    fn calculate_total_size(db: &Db) -> Result<u64, CacheError> {
        let mut total = 0u64;
        for item in db.scan_prefix(ENTRY_PREFIX) {
            let (_, value) = item.map_err(db_error)?;
            if let Ok(entry) = bincode::deserialize::<StoredEntry>(&value) {
                total += entry.size_bytes;
            }
        }
        Ok(total)
    }

    fn touch(&self, hash: &str) -> Result<(), CacheError> {
        self.db
            .insert(
                format!("{}{}", ACCESS_PREFIX, hash),
                Utc::now().timestamp().to_be_bytes().to_vec(),
            )
            .map_err(db_error)?;
        Ok(())
    }

    fn last_access(&self, hash: &str) -> Result<Option<i64>, CacheError> {
        let value = self
            .db
            .get(format!("{}{}", ACCESS_PREFIX, hash))
            .map_err(db_error)?;
        Ok(value.and_then(|v| <[u8; 8]>::try_from(v.as_ref()).ok().map(i64::from_be_bytes)))
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), CacheError> {
        self.db.flush().map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl SpeechCachePort for SledSpeechCache {
    async fn get(&self, content_hash: &str) -> Result<Option<CacheEntry>, CacheError> {
        let key = format!("{}{}", ENTRY_PREFIX, content_hash);

        match self.db.get(&key).map_err(db_error)? {
            Some(data) => {
                let entry: StoredEntry = bincode::deserialize(&data)
                    .map_err(|e| CacheError::SerializationError(e.to_string()))?;
                self.touch(content_hash)?;
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Ok(Some(CacheEntry {
                    content_hash: content_hash.to_string(),
                    format: entry.format,
                    audio_data: entry.audio_data,
                }))
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let size = entry.audio_data.len() as u64;
        let stored = StoredEntry {
            format: entry.format,
            audio_data: entry.audio_data,
            size_bytes: size,
            created_at: Utc::now().timestamp(),
        };
        let bytes =
            bincode::serialize(&stored).map_err(|e| CacheError::SerializationError(e.to_string()))?;

        // 只在不存在时写入；相同 hash 的内容必然相同
        let key = format!("{}{}", ENTRY_PREFIX, entry.content_hash);
        let inserted = self
            .db
            .compare_and_swap(&key, None as Option<&[u8]>, Some(bytes))
            .map_err(db_error)?
            .is_ok();

        self.touch(&entry.content_hash)?;

        if inserted {
            self.current_size.fetch_add(size, Ordering::Relaxed);
            tracing::debug!(hash = %entry.content_hash, size_bytes = size, "Speech cached");
        }

        Ok(())
    }

    async fn sweep_expired(&self, ttl: Duration) -> Result<SweepResult, CacheError> {
        let cutoff = Utc::now().timestamp() - ttl.as_secs() as i64;
        let mut result = SweepResult::default();

        let keys: Vec<String> = self
            .db
            .scan_prefix(ENTRY_PREFIX)
            .keys()
            .filter_map(|k| k.ok())
            .filter_map(|k| String::from_utf8(k.to_vec()).ok())
            .collect();

        for key in keys {
            let hash = &key[ENTRY_PREFIX.len()..];
            let Some(data) = self.db.get(&key).map_err(db_error)? else {
                continue;
            };
            let entry: StoredEntry = match bincode::deserialize(&data) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Dropping unreadable cache entry");
                    self.db.remove(&key).map_err(db_error)?;
                    continue;
                }
            };

            let last_access = self.last_access(hash)?.unwrap_or(entry.created_at);
            if last_access >= cutoff {
                continue;
            }

            self.db.remove(&key).map_err(db_error)?;
            self.db
                .remove(format!("{}{}", ACCESS_PREFIX, hash))
                .map_err(db_error)?;
            self.current_size.fetch_sub(
                entry.size_bytes.min(self.current_size.load(Ordering::Relaxed)),
                Ordering::Relaxed,
            );
            result.removed_entries += 1;
            result.freed_bytes += entry.size_bytes;
        }

        if result.removed_entries > 0 {
            tracing::info!(
                removed = result.removed_entries,
                freed_bytes = result.freed_bytes,
                "Expired cache entries swept"
            );
        }

        Ok(result)
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.db.scan_prefix(ENTRY_PREFIX).count(),
            total_size_bytes: self.current_size.load(Ordering::Relaxed),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }
}
