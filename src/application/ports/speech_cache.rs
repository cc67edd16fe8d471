//! Speech Cache Port - 合成结果缓存
//!
//! 以合成前文本（已应用发音词典）的 SHA-256 为 key 的内容寻址缓存。
//! 条目写入后不可变：相同 hash 必然对应相同字节。

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

use super::audio_codec::AudioFormat;

/// Cache 错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub content_hash: String,
    pub format: AudioFormat,
    pub audio_data: Vec<u8>,
}

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// 过期清理结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    pub removed_entries: u64,
    pub freed_bytes: u64,
}

/// Speech Cache Port
#[async_trait]
pub trait SpeechCachePort: Send + Sync {
    /// 查找条目，同时刷新最后访问时间
    async fn get(&self, content_hash: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// 写入条目；已存在时保持原内容不变
    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// 删除最后访问时间早于 `ttl` 的条目
    async fn sweep_expired(&self, ttl: Duration) -> Result<SweepResult, CacheError>;

    /// 获取缓存统计信息
    async fn stats(&self) -> CacheStats;
}

/// 生成缓存 key
///
/// sha256(text) 的十六进制表示
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
