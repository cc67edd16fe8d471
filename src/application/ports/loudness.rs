//! Loudness Analyzer Port - 响度分析与增益标签
//!
//! 两遍处理：
//! 1. 分析：测量综合响度 (I)、真峰值 (TP)、响度范围 (LRA)
//! 2. 复用：把计算出的增益/峰值标签写入容器，音频流不重新编码

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use super::audio_codec::AudioFormat;

/// 响度分析错误
#[derive(Debug, Error)]
pub enum LoudnessError {
    #[error("Failed to launch analyzer: {0}")]
    LaunchFailed(String),

    #[error("Analyzer exited with status {status}: {stderr}")]
    ProcessFailed { status: i32, stderr: String },

    #[error("Analyzer timed out after {0}s")]
    Timeout(u64),

    #[error("No loudness report found in analyzer output")]
    MissingReport,

    #[error("Malformed loudness report: {0}")]
    MalformedReport(String),

    #[error("Non-finite measurement: {field} = {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("IO error: {0}")]
    IoError(String),
}

/// 响度目标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessTarget {
    /// 综合响度目标（LUFS）
    pub integrated_lufs: f64,
    /// 真峰值上限（dBTP）
    pub true_peak_db: f64,
    /// 响度范围目标（LU）
    pub lra: f64,
}

impl Default for LoudnessTarget {
    fn default() -> Self {
        Self {
            integrated_lufs: -23.0,
            true_peak_db: -2.0,
            lra: 7.0,
        }
    }
}

/// 测量结果
#[derive(Debug, Clone, PartialEq)]
pub struct LoudnessMeasurement {
    pub input_i: f64,
    pub input_tp: f64,
    pub input_lra: Option<f64>,
    pub input_thresh: Option<f64>,
    pub target_offset: Option<f64>,
    /// 分析器输出的全部字段（原样保留）
    pub report: BTreeMap<String, String>,
}

/// EBU R128 参考电平（Opus 头部增益以此为基准）
pub const R128_REFERENCE_LUFS: f64 = -23.0;

/// 写入容器的增益标签
#[derive(Debug, Clone, PartialEq)]
pub struct GainTags {
    pub track_gain_db: f64,
    /// 线性峰值
    pub track_peak: f64,
    /// Q7.8 定点数，仅 Opus
    pub r128_track_gain: Option<i32>,
    pub r128_album_gain: Option<i32>,
    /// 分析器报告的原始字段，随增益标签一起写入
    pub report: BTreeMap<String, String>,
}

impl GainTags {
    /// 根据测量结果计算标签
    pub fn compute(
        measurement: &LoudnessMeasurement,
        target: &LoudnessTarget,
        format: AudioFormat,
    ) -> Self {
        let track_gain_db = target.integrated_lufs - measurement.input_i;
        let track_peak = 10f64.powf(measurement.input_tp / 20.0);

        let (r128_track_gain, r128_album_gain) = if format == AudioFormat::Opus {
            let q78 = ((R128_REFERENCE_LUFS - measurement.input_i) * 256.0).round();
            let q78 = q78.clamp(i16::MIN as f64, i16::MAX as f64) as i32;
            (Some(q78), Some(0))
        } else {
            (None, None)
        };

        Self {
            track_gain_db,
            track_peak,
            r128_track_gain,
            r128_album_gain,
            report: measurement.report.clone(),
        }
    }

    /// 标签键值对
    ///
    /// 增益/峰值键名为下游约定的固定值，其后是测量报告字段
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            (
                "replaygain_track_gain".to_string(),
                format!("{:.2} dB", self.track_gain_db),
            ),
            (
                "replaygain_track_peak".to_string(),
                format!("{:.6}", self.track_peak),
            ),
        ];
        if let Some(gain) = self.r128_track_gain {
            pairs.push(("R128_TRACK_GAIN".to_string(), gain.to_string()));
        }
        if let Some(gain) = self.r128_album_gain {
            pairs.push(("R128_ALBUM_GAIN".to_string(), gain.to_string()));
        }
        pairs.extend(
            self.report
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        pairs
    }
}

/// Loudness Analyzer Port
#[async_trait]
pub trait LoudnessAnalyzerPort: Send + Sync {
    /// 第一遍：测量
    async fn analyze(
        &self,
        input: &Path,
        target: &LoudnessTarget,
    ) -> Result<LoudnessMeasurement, LoudnessError>;

    /// 第二遍：写入增益标签（流复制，不重新编码）
    async fn apply_gain_tags(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
        tags: &GainTags,
    ) -> Result<(), LoudnessError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(i: f64, tp: f64) -> LoudnessMeasurement {
        LoudnessMeasurement {
            input_i: i,
            input_tp: tp,
            input_lra: None,
            input_thresh: None,
            target_offset: None,
            report: BTreeMap::new(),
        }
    }

    #[test]
    fn test_gain_relative_to_target() {
        let tags = GainTags::compute(&measurement(-18.5, -1.0), &LoudnessTarget::default(), AudioFormat::Wav);
        assert!((tags.track_gain_db - (-4.5)).abs() < 1e-9);
        assert!((tags.track_peak - 0.891251).abs() < 1e-6);
        assert_eq!(tags.r128_track_gain, None);

        let pairs = tags.to_pairs();
        assert_eq!(pairs[0], ("replaygain_track_gain".into(), "-4.50 dB".into()));
        assert_eq!(pairs[1].0, "replaygain_track_peak");
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_opus_gets_r128_tags() {
        let tags = GainTags::compute(&measurement(-20.0, -3.0), &LoudnessTarget::default(), AudioFormat::Opus);
        assert_eq!(tags.r128_track_gain, Some(-768));
        assert_eq!(tags.r128_album_gain, Some(0));

        let keys: Vec<String> = tags.to_pairs().into_iter().map(|(k, _)| k).collect();
        assert!(keys.contains(&"R128_TRACK_GAIN".to_string()));
        assert!(keys.contains(&"R128_ALBUM_GAIN".to_string()));
    }

    #[test]
    fn test_report_fields_follow_gain_tags() {
        let mut m = measurement(-27.61, -4.47);
        m.report.insert("input_i".to_string(), "-27.61".to_string());
        m.report.insert("normalization_type".to_string(), "dynamic".to_string());

        let pairs = GainTags::compute(&m, &LoudnessTarget::default(), AudioFormat::Wav).to_pairs();
        assert_eq!(pairs[0].0, "replaygain_track_gain");
        assert_eq!(pairs[1].0, "replaygain_track_peak");
        assert_eq!(pairs[2], ("input_i".into(), "-27.61".into()));
        assert_eq!(pairs[3], ("normalization_type".into(), "dynamic".into()));
    }
}
