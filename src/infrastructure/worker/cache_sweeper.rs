//! Cache Sweeper - 定期清理过期的合成缓存

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::application::ports::SpeechCachePort;

/// Sweeper 配置
#[derive(Debug, Clone)]
pub struct CacheSweeperConfig {
    /// 条目最后访问后的保留时间
    pub ttl: Duration,
    /// 两次清理的间隔
    pub interval: Duration,
}

/// 缓存清理 Worker
pub struct CacheSweeper {
    config: CacheSweeperConfig,
    cache: Arc<dyn SpeechCachePort>,
}

impl CacheSweeper {
    pub fn new(config: CacheSweeperConfig, cache: Arc<dyn SpeechCachePort>) -> Self {
        Self { config, cache }
    }

    /// 执行一次清理，返回删除的条目数
    pub async fn sweep_once(&self) -> u64 {
        match self.cache.sweep_expired(self.config.ttl).await {
            Ok(result) => {
                tracing::debug!(
                    removed = result.removed_entries,
                    freed_bytes = result.freed_bytes,
                    "Cache sweep finished"
                );
                result.removed_entries
            }
            Err(e) => {
                // 清理失败不影响合成
                tracing::warn!(error = %e, "Cache sweep failed");
                0
            }
        }
    }

    /// 启动 Worker，直到 `shutdown` 变为 true 或发送端被丢弃
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            ttl_secs = self.config.ttl.as_secs(),
            interval_secs = self.config.interval.as_secs(),
            "CacheSweeper started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("CacheSweeper stopped");
    }
}
