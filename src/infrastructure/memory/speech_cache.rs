//! In-Memory Speech Cache Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::application::ports::{CacheEntry, CacheError, CacheStats, SpeechCachePort, SweepResult};

/// 内存合成缓存
///
/// 进程退出即丢失，主要用于测试
pub struct InMemorySpeechCache {
    /// content_hash -> (条目, 最后访问时间)
    entries: DashMap<String, (CacheEntry, DateTime<Utc>)>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl InMemorySpeechCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }
}

impl Default for InMemorySpeechCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechCachePort for InMemorySpeechCache {
    async fn get(&self, content_hash: &str) -> Result<Option<CacheEntry>, CacheError> {
        match self.entries.get_mut(content_hash) {
            Some(mut slot) => {
                slot.1 = Utc::now();
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Ok(Some(slot.0.clone()))
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries
            .entry(entry.content_hash.clone())
            .and_modify(|slot| slot.1 = Utc::now())
            .or_insert_with(|| (entry, Utc::now()));
        Ok(())
    }

    async fn sweep_expired(&self, ttl: Duration) -> Result<SweepResult, CacheError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CacheError::IoError(e.to_string()))?;
        let cutoff = Utc::now() - ttl;

        let mut result = SweepResult::default();
        self.entries.retain(|_, (entry, accessed)| {
            if *accessed < cutoff {
                result.removed_entries += 1;
                result.freed_bytes += entry.audio_data.len() as u64;
                false
            } else {
                true
            }
        });

        tracing::debug!(removed = result.removed_entries, "In-memory cache swept");
        Ok(result)
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            total_size_bytes: self
                .entries
                .iter()
                .map(|slot| slot.0.audio_data.len() as u64)
                .sum(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{content_hash, AudioFormat};

    fn entry(text: &str, data: Vec<u8>) -> CacheEntry {
        CacheEntry {
            content_hash: content_hash(text),
            format: AudioFormat::Wav,
            audio_data: data,
        }
    }

    #[tokio::test]
    async fn test_put_keeps_first_write() {
        let cache = InMemorySpeechCache::new();
        cache.put(entry("a", vec![1, 2])).await.unwrap();
        cache.put(entry("a", vec![3])).await.unwrap();

        let hit = cache.get(&content_hash("a")).await.unwrap().unwrap();
        assert_eq!(hit.audio_data, vec![1, 2]);
        assert!(cache.get(&content_hash("b")).await.unwrap().is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_size_bytes, 2);
        assert_eq!((stats.hit_count, stats.miss_count), (1, 1));
    }

    #[tokio::test]
    async fn test_sweep_with_zero_ttl_clears_everything() {
        let cache = InMemorySpeechCache::new();
        cache.put(entry("a", vec![0; 8])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let result = cache.sweep_expired(Duration::ZERO).await.unwrap();
        assert_eq!(result.removed_entries, 1);
        assert_eq!(result.freed_bytes, 8);
        assert_eq!(cache.stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_sweep_keeps_recent_entries() {
        let cache = InMemorySpeechCache::new();
        cache.put(entry("a", vec![0; 8])).await.unwrap();

        let result = cache.sweep_expired(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(result, SweepResult::default());
        assert_eq!(cache.stats().await.total_entries, 1);
    }
}
