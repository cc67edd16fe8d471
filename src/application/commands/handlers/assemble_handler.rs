//! AssembleBroadcast Handler
//!
//! 完整流水线：
//! 分段 → 配对 → 载入音效 → 合成 → 混音 → 背景音乐 → 编码
//! → 响度分析/增益标签 → 元数据 → 原子落盘
//!
//! 任何致命错误都会在落盘前中止，暂存区随之删除。

use chrono::Local;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::application::commands::{AssembleBroadcast, BroadcastArtifact};
use crate::application::error::BroadcastError;
use crate::application::ports::{
    AudioCodecPort, AudioResourcePort, BroadcastMetadata, EncodeConfig, GainTags,
    LoudnessAnalyzerPort, LoudnessTarget, OutputStorePort, TagWriterPort,
};
use crate::application::synthesis::SegmentSynthesizer;
use crate::config::MetadataConfig;
use crate::domain::{
    compose_bed, mix_timeline, plan_mix, render_synchronized_lyrics, segment_script, BedPlacement,
    BedSpec,
};

/// 一次运行的固定参数
#[derive(Debug, Clone)]
pub struct AssembleSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub bed: BedSpec,
    pub encode: EncodeConfig,
    pub loudness: LoudnessTarget,
    pub metadata: MetadataConfig,
}

/// AssembleBroadcast Handler
pub struct AssembleBroadcastHandler {
    synthesizer: Arc<SegmentSynthesizer>,
    resources: Arc<dyn AudioResourcePort>,
    codec: Arc<dyn AudioCodecPort>,
    /// 为空时跳过响度标签
    loudness: Option<Arc<dyn LoudnessAnalyzerPort>>,
    tag_writer: Arc<dyn TagWriterPort>,
    output: Arc<dyn OutputStorePort>,
    settings: AssembleSettings,
}

impl AssembleBroadcastHandler {
    pub fn new(
        synthesizer: Arc<SegmentSynthesizer>,
        resources: Arc<dyn AudioResourcePort>,
        codec: Arc<dyn AudioCodecPort>,
        loudness: Option<Arc<dyn LoudnessAnalyzerPort>>,
        tag_writer: Arc<dyn TagWriterPort>,
        output: Arc<dyn OutputStorePort>,
        settings: AssembleSettings,
    ) -> Self {
        Self {
            synthesizer,
            resources,
            codec,
            loudness,
            tag_writer,
            output,
            settings,
        }
    }

    pub async fn handle(
        &self,
        command: AssembleBroadcast,
    ) -> Result<BroadcastArtifact, BroadcastError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("broadcast", run_id = %run_id);

        self.run(run_id, command)
            .instrument(span)
            .await
            .map_err(|e| {
                tracing::error!(run_id = %run_id, error = %e, "Broadcast run aborted");
                e
            })
    }

    async fn run(
        &self,
        run_id: Uuid,
        command: AssembleBroadcast,
    ) -> Result<BroadcastArtifact, BroadcastError> {
        let rate = self.settings.sample_rate;
        let channels = self.settings.channels;
        let format = self.settings.encode.format;

        // 结构错误必须在任何合成调用之前暴露
        let sections = segment_script(&command.script);
        let steps = plan_mix(&sections).map_err(|e| {
            tracing::error!(stage = "plan", sections = sections.len(), error = %e, "Script rejected");
            BroadcastError::from(e)
        })?;

        tracing::info!(sections = sections.len(), steps = steps.len(), "Script planned");

        let cues = self.resources.load_cues(rate, channels)?;
        let bed = self.resources.load_bed(rate, channels)?;

        let narrations = self.synthesizer.synthesize_all(&steps).await?;
        let synthesis = narrations.report;

        let outcome = mix_timeline(&steps, narrations.buffers, &cues, rate, channels)?;
        let span = outcome.span;
        let mut buffer = outcome.timeline.buffer;
        let lyrics = outcome.timeline.lyrics;

        let placement = compose_bed(&mut buffer, bed.as_ref(), &self.settings.bed, span)
            .map_err(|e| {
                tracing::error!(
                    stage = "bed",
                    start_ms = ?span.start_ms,
                    end_ms = ?span.end_ms,
                    error = %e,
                    "Bed compositing failed"
                );
                BroadcastError::from(e)
            })?;

        match placement {
            BedPlacement::Applied {
                start_ms,
                duration_ms,
            } => tracing::info!(start_ms, duration_ms, "Bed applied"),
            BedPlacement::Skipped => tracing::info!("Bed skipped"),
        }

        let duration_ms = buffer.duration_ms();
        let encoded = self
            .codec
            .encode(&buffer, &self.settings.encode)
            .map_err(|e| {
                tracing::error!(stage = "encode", format = %format, error = %e, "Encoding failed");
                BroadcastError::codec("final mix", e)
            })?;
        drop(buffer);

        // 以下所有文件都在暂存区内，出错时随暂存区一起删除
        let staging = self.output.begin().await?;
        let mix_path = staging.path_for(&format!("mix.{}", format.extension()));
        tokio::fs::write(&mix_path, &encoded).await?;

        let (final_path, gain_tags) = match &self.loudness {
            Some(analyzer) => {
                let measurement = analyzer
                    .analyze(&mix_path, &self.settings.loudness)
                    .await
                    .map_err(|e| {
                        tracing::error!(stage = "loudness", error = %e, "Loudness analysis failed");
                        BroadcastError::from(e)
                    })?;

                let tags = GainTags::compute(&measurement, &self.settings.loudness, format);
                tracing::info!(
                    input_i = measurement.input_i,
                    input_tp = measurement.input_tp,
                    track_gain_db = tags.track_gain_db,
                    "Loudness measured"
                );

                let tagged = staging.path_for(&format!("tagged.{}", format.extension()));
                analyzer
                    .apply_gain_tags(&mix_path, &tagged, format, &tags)
                    .await?;
                (tagged, tags.to_pairs())
            }
            None => (mix_path, Vec::new()),
        };

        let synchronized_lyrics = render_synchronized_lyrics(&lyrics);
        let meta = &self.settings.metadata;
        let metadata = BroadcastMetadata {
            title: meta.title.clone(),
            subtitle: meta.subtitle.clone(),
            artist: meta.artist.clone(),
            album: meta.album.clone(),
            source: meta.source.clone(),
            comment: Some(command.script.clone()),
            lyrics_description: meta.lyrics_description.clone(),
            synchronized_lyrics: synchronized_lyrics.clone(),
            gain_tags: gain_tags.clone(),
            generated_at: Local::now(),
        };

        // 不支持的容器由 tag writer 记录警告后跳过
        self.tag_writer.write(&final_path, format, &metadata)?;

        let path = staging
            .persist(&final_path, format, command.output.as_deref())
            .await?;

        if let Some(stats) = self.synthesizer.cache().stats().await {
            tracing::info!(
                entries = stats.total_entries,
                size_bytes = stats.total_size_bytes,
                hits = stats.hit_count,
                misses = stats.miss_count,
                degraded = self.synthesizer.cache().is_degraded(),
                "Speech cache stats"
            );
        }

        tracing::info!(
            path = %path.display(),
            duration_ms,
            narrations = synthesis.narrations,
            provider_calls = synthesis.provider_calls,
            cache_hits = synthesis.cache_hits,
            "Broadcast assembled"
        );

        Ok(BroadcastArtifact {
            run_id,
            path,
            duration_ms,
            metadata: artifact_metadata(&metadata, duration_ms),
            lyrics,
            bed: placement,
            gain_tags,
            synthesis,
        })
    }
}

/// 下游使用的键值表
fn artifact_metadata(metadata: &BroadcastMetadata, duration_ms: u64) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert("title".to_string(), metadata.title.clone());
    map.insert("date".to_string(), metadata.date());
    map.insert("duration_ms".to_string(), duration_ms.to_string());
    map.insert("lyrics".to_string(), metadata.synchronized_lyrics.clone());

    let optional = [
        ("subtitle", &metadata.subtitle),
        ("artist", &metadata.artist),
        ("album", &metadata.album),
        ("source", &metadata.source),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            map.insert(key.to_string(), value.clone());
        }
    }

    map.extend(metadata.gain_tags.iter().cloned());
    map
}
