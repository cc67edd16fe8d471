//! Segment Synthesizer - 旁白合成
//!
//! 对每段旁白：应用发音词典 → 查缓存 → 未命中则调用合成服务并写回缓存
//! → 解码 → 转换到工作格式 → 峰值标准化。
//!
//! 合成调用可以并发发出，但结果始终按脚本顺序返回。
//! 服务支持上下文拼接时改为逐个顺序调用。

use futures_util::{stream, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::application::error::BroadcastError;
use crate::application::ports::{
    content_hash, AudioCodecPort, CacheEntry, CacheStats, SpeechCachePort, SpeechProviderPort,
    SynthesisRequest, SynthesizedAudio, TtsError,
};
use crate::domain::{AudioBuffer, Lexicon, MixStep};

/// 带降级语义的缓存包装
///
/// - 未启用：每次都是未命中，写入为空操作
/// - 读失败：按未命中处理
/// - 写失败：本次运行剩余部分不再使用缓存
pub struct SpeechCache {
    backend: Option<Arc<dyn SpeechCachePort>>,
    degraded: AtomicBool,
}

impl SpeechCache {
    pub fn new(backend: Arc<dyn SpeechCachePort>) -> Self {
        Self {
            backend: Some(backend),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: None,
            degraded: AtomicBool::new(false),
        }
    }

    fn active(&self) -> Option<&Arc<dyn SpeechCachePort>> {
        if self.degraded.load(Ordering::Relaxed) {
            return None;
        }
        self.backend.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub async fn lookup(&self, hash: &str) -> Option<CacheEntry> {
        let backend = self.active()?;
        match backend.get(hash).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(hash = %hash, error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    pub async fn store(&self, entry: CacheEntry) {
        let Some(backend) = self.active() else {
            return;
        };
        let hash = entry.content_hash.clone();
        if let Err(e) = backend.put(entry).await {
            self.degraded.store(true, Ordering::Relaxed);
            tracing::warn!(
                hash = %hash,
                error = %e,
                "Cache store failed, bypassing cache for the rest of this run"
            );
        }
    }

    pub async fn stats(&self) -> Option<CacheStats> {
        match &self.backend {
            Some(backend) => Some(backend.stats().await),
            None => None,
        }
    }
}

/// 合成参数
#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub voice: String,
    pub model: String,
    pub max_concurrent: usize,
    /// 网络类错误的重试次数
    pub max_retries: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub peak_headroom_db: f64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            voice: "alloy".to_string(),
            model: "tts-1".to_string(),
            max_concurrent: 4,
            max_retries: 0,
            sample_rate: 48000,
            channels: 2,
            peak_headroom_db: 1.0,
        }
    }
}

/// 一次合成任务（去重后）
#[derive(Debug, Clone)]
struct SynthesisJob {
    section: usize,
    hash: String,
    text: String,
    previous_text: Option<String>,
    next_text: Option<String>,
}

/// 合成统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    pub narrations: usize,
    pub unique_texts: usize,
    pub cache_hits: usize,
    pub provider_calls: usize,
}

/// 合成结果
#[derive(Debug)]
pub struct SynthesizedNarrations {
    /// 与输入的 `MixStep` 一一对应
    pub buffers: Vec<AudioBuffer>,
    pub report: SynthesisReport,
}

/// Segment Synthesizer
pub struct SegmentSynthesizer {
    provider: Arc<dyn SpeechProviderPort>,
    codec: Arc<dyn AudioCodecPort>,
    cache: Arc<SpeechCache>,
    lexicon: Arc<Lexicon>,
    settings: SynthesisSettings,
}

impl SegmentSynthesizer {
    pub fn new(
        provider: Arc<dyn SpeechProviderPort>,
        codec: Arc<dyn AudioCodecPort>,
        cache: Arc<SpeechCache>,
        lexicon: Arc<Lexicon>,
        settings: SynthesisSettings,
    ) -> Self {
        Self {
            provider,
            codec,
            cache,
            lexicon,
            settings,
        }
    }

    pub fn cache(&self) -> &SpeechCache {
        &self.cache
    }

    /// 为每个混音步骤准备旁白音频
    pub async fn synthesize_all(
        &self,
        steps: &[MixStep],
    ) -> Result<SynthesizedNarrations, BroadcastError> {
        let spoken: Vec<String> = steps.iter().map(|s| self.lexicon.apply(s.text())).collect();
        let hashes: Vec<String> = spoken.iter().map(|t| content_hash(t)).collect();
        let stitching = self.provider.supports_context_stitching();

        // 相同文本在一次运行中只合成一次
        let mut jobs = Vec::new();
        let mut seen = HashMap::new();
        for (i, step) in steps.iter().enumerate() {
            if seen.contains_key(&hashes[i]) {
                continue;
            }
            seen.insert(hashes[i].clone(), jobs.len());
            let (previous_text, next_text) = if stitching {
                (
                    i.checked_sub(1).map(|p| spoken[p].clone()),
                    spoken.get(i + 1).cloned(),
                )
            } else {
                (None, None)
            };
            jobs.push(SynthesisJob {
                section: step.section(),
                hash: hashes[i].clone(),
                text: spoken[i].clone(),
                previous_text,
                next_text,
            });
        }

        tracing::info!(
            provider = self.provider.name(),
            narrations = steps.len(),
            unique_texts = jobs.len(),
            stitching,
            "Synthesizing narration"
        );

        let resolved: Vec<(SynthesizedAudio, bool)> = if stitching {
            let mut out = Vec::with_capacity(jobs.len());
            for job in &jobs {
                out.push(self.resolve(job).await?);
            }
            out
        } else {
            stream::iter(jobs.iter())
                .map(|job| self.resolve(job))
                .buffered(self.settings.max_concurrent.max(1))
                .try_collect()
                .await?
        };

        let mut report = SynthesisReport {
            narrations: steps.len(),
            unique_texts: jobs.len(),
            ..Default::default()
        };

        let mut decoded = Vec::with_capacity(jobs.len());
        for (job, (audio, from_cache)) in jobs.iter().zip(resolved) {
            if from_cache {
                report.cache_hits += 1;
            } else {
                report.provider_calls += 1;
            }
            decoded.push(self.prepare(job.section, audio)?);
        }

        let buffers = hashes
            .iter()
            .map(|hash| decoded[seen[hash]].clone())
            .collect();

        Ok(SynthesizedNarrations { buffers, report })
    }

    /// 缓存优先，未命中时调用合成服务。返回 (音频, 是否来自缓存)
    async fn resolve(&self, job: &SynthesisJob) -> Result<(SynthesizedAudio, bool), BroadcastError> {
        if let Some(entry) = self.cache.lookup(&job.hash).await {
            tracing::debug!(section = job.section, hash = %job.hash, "Cache hit");
            return Ok((
                SynthesizedAudio {
                    audio_data: entry.audio_data,
                    format: entry.format,
                },
                true,
            ));
        }

        let request = SynthesisRequest {
            text: job.text.clone(),
            voice: self.settings.voice.clone(),
            model: self.settings.model.clone(),
            previous_text: job.previous_text.clone(),
            next_text: job.next_text.clone(),
        };

        let audio = self.synthesize_with_retry(job.section, request).await?;

        self.cache
            .store(CacheEntry {
                content_hash: job.hash.clone(),
                format: audio.format,
                audio_data: audio.audio_data.clone(),
            })
            .await;

        Ok((audio, false))
    }

    async fn synthesize_with_retry(
        &self,
        section: usize,
        request: SynthesisRequest,
    ) -> Result<SynthesizedAudio, BroadcastError> {
        let mut attempt = 0;
        loop {
            match self.provider.synthesize(request.clone()).await {
                Ok(audio) => return Ok(audio),
                Err(e) if attempt < self.settings.max_retries && is_transient(&e) => {
                    attempt += 1;
                    tracing::warn!(
                        section,
                        attempt,
                        error = %e,
                        "Synthesis failed, retrying"
                    );
                }
                Err(source) => {
                    tracing::error!(
                        section,
                        stage = "synthesis",
                        provider = self.provider.name(),
                        error = %source,
                        "Synthesis failed"
                    );
                    return Err(BroadcastError::Synthesis { section, source });
                }
            }
        }
    }

    /// 解码 → 工作格式 → 峰值标准化
    fn prepare(&self, section: usize, audio: SynthesizedAudio) -> Result<AudioBuffer, BroadcastError> {
        let buffer = self
            .codec
            .decode(&audio.audio_data, audio.format)
            .map_err(|e| {
                tracing::error!(section, stage = "decode", error = %e, "Narration decode failed");
                BroadcastError::codec(format!("narration section {}", section), e)
            })?;

        let mut buffer = buffer.conform(self.settings.sample_rate, self.settings.channels);
        buffer.normalize_peak(self.settings.peak_headroom_db);
        Ok(buffer)
    }
}

fn is_transient(err: &TtsError) -> bool {
    matches!(err, TtsError::NetworkError(_) | TtsError::Timeout)
}
