//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::application::ports::{AudioFormat, EncodeConfig, LoudnessTarget};
use crate::domain::{BedSpec, CueKind, DomainError, Lexicon, TimingOffset};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,

    /// 语音合成服务配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 合成缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// 音频配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 音效配置
    #[serde(default)]
    pub sfx: SfxConfig,

    /// 背景音乐配置
    #[serde(default)]
    pub bed: BedConfig,

    /// 响度标准化配置
    #[serde(default)]
    pub loudness: LoudnessConfig,

    /// 元数据配置
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// 输出配置
    #[serde(default)]
    pub output: OutputConfig,

    /// 发音词典
    #[serde(default)]
    pub lexicon: LexiconConfig,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// 语音合成服务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    #[default]
    OpenAi,
    ElevenLabs,
    /// 确定性静音输出，测试与演练用
    Fake,
}

impl TtsProvider {
    /// 是否需要网络访问（需要 API key）
    pub fn is_network(&self) -> bool {
        !matches!(self, TtsProvider::Fake)
    }
}

/// 语音合成配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub provider: TtsProvider,

    #[serde(default)]
    pub api_key: Option<String>,

    /// 服务基础 URL，未设置时使用各服务的官方地址
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// 请求的返回格式
    #[serde(default = "default_response_format")]
    pub response_format: AudioFormat,

    /// 请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// 最大重试次数
    #[serde(default)]
    pub max_retries: u32,

    /// 并发合成数（服务支持上下文拼接时忽略，按顺序逐个合成）
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_model() -> String {
    "tts-1".to_string()
}

fn default_response_format() -> AudioFormat {
    AudioFormat::Mp3
}

fn default_tts_timeout() -> u64 {
    120
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: TtsProvider::default(),
            api_key: None,
            base_url: None,
            voice: default_voice(),
            model: default_model(),
            response_format: default_response_format(),
            timeout_secs: default_tts_timeout(),
            max_retries: 0,
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// 合成缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// sled 数据库目录
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// 条目最后访问后的保留时间（秒）
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// 后台清理间隔（秒），0 表示不启动后台清理
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("data/speech-cache.sled")
}

fn default_cache_ttl() -> u64 {
    7 * 86400 // 7 天
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            path: default_cache_path(),
            ttl_secs: default_cache_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// 音频配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// 工作采样率（Hz）
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// 工作声道数
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// 输出格式
    /// 可选: wav, opus
    #[serde(default = "default_output_format")]
    pub output_format: AudioFormat,

    /// 目标比特率（bps），用于有损压缩格式
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    /// 旁白峰值标准化后的余量（dB）
    #[serde(default = "default_peak_headroom")]
    pub peak_headroom_db: f64,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_channels() -> u16 {
    2
}

fn default_output_format() -> AudioFormat {
    AudioFormat::Opus
}

fn default_bitrate() -> u32 {
    96000
}

fn default_peak_headroom() -> f64 {
    1.0
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            output_format: default_output_format(),
            bitrate: default_bitrate(),
            peak_headroom_db: default_peak_headroom(),
        }
    }
}

impl AudioConfig {
    pub fn encode_config(&self) -> EncodeConfig {
        EncodeConfig {
            format: self.output_format,
            bitrate: self.bitrate,
        }
    }
}

/// 单个音效配置
#[derive(Debug, Clone, Deserialize)]
pub struct SfxCueConfig {
    /// 音效文件路径，未设置时跳过该音效
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// 旁白开始的毫秒位置，或 "none"
    #[serde(default = "default_offset")]
    pub offset: String,
}

fn default_offset() -> String {
    "none".to_string()
}

impl Default for SfxCueConfig {
    fn default() -> Self {
        Self {
            path: None,
            offset: default_offset(),
        }
    }
}

impl SfxCueConfig {
    pub fn timing_offset(&self) -> Result<TimingOffset, DomainError> {
        self.offset.parse()
    }
}

/// 四种音效
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SfxConfig {
    #[serde(default)]
    pub intro: SfxCueConfig,
    #[serde(default)]
    pub article_start: SfxCueConfig,
    #[serde(default)]
    pub article_break: SfxCueConfig,
    #[serde(default)]
    pub outro: SfxCueConfig,
}

impl SfxConfig {
    pub fn cue(&self, kind: CueKind) -> &SfxCueConfig {
        match kind {
            CueKind::Intro => &self.intro,
            CueKind::ArticleStart => &self.article_start,
            CueKind::ArticleBreak => &self.article_break,
            CueKind::Outro => &self.outro,
        }
    }
}

/// 背景音乐配置
#[derive(Debug, Clone, Deserialize)]
pub struct BedConfig {
    /// 背景音乐文件，未设置时跳过背景音乐
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_bed_gain")]
    pub gain_db: f64,

    #[serde(default = "default_bed_fade")]
    pub fade_in_ms: u64,

    #[serde(default = "default_bed_fade")]
    pub fade_out_ms: u64,

    /// 相对文章开始位置的偏移（可为负）
    #[serde(default)]
    pub offset_ms: i64,
}

fn default_bed_gain() -> f64 {
    -18.0
}

fn default_bed_fade() -> u64 {
    1000
}

impl Default for BedConfig {
    fn default() -> Self {
        Self {
            path: None,
            gain_db: default_bed_gain(),
            fade_in_ms: default_bed_fade(),
            fade_out_ms: default_bed_fade(),
            offset_ms: 0,
        }
    }
}

impl BedConfig {
    pub fn spec(&self) -> BedSpec {
        BedSpec {
            gain_db: self.gain_db,
            fade_in_ms: self.fade_in_ms,
            fade_out_ms: self.fade_out_ms,
            offset_ms: self.offset_ms,
        }
    }
}

/// 响度标准化配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoudnessConfig {
    #[serde(default = "default_loudness_enabled")]
    pub enabled: bool,

    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    #[serde(default = "default_integrated_lufs")]
    pub integrated_lufs: f64,

    #[serde(default = "default_true_peak")]
    pub true_peak_db: f64,

    #[serde(default = "default_lra")]
    pub lra: f64,

    /// 单次 ffmpeg 调用超时（秒）
    #[serde(default = "default_loudness_timeout")]
    pub timeout_secs: u64,
}

fn default_loudness_enabled() -> bool {
    true
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_integrated_lufs() -> f64 {
    -23.0
}

fn default_true_peak() -> f64 {
    -2.0
}

fn default_lra() -> f64 {
    7.0
}

fn default_loudness_timeout() -> u64 {
    300
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self {
            enabled: default_loudness_enabled(),
            ffmpeg_path: default_ffmpeg_path(),
            integrated_lufs: default_integrated_lufs(),
            true_peak_db: default_true_peak(),
            lra: default_lra(),
            timeout_secs: default_loudness_timeout(),
        }
    }
}

impl LoudnessConfig {
    pub fn target(&self) -> LoudnessTarget {
        LoudnessTarget {
            integrated_lufs: self.integrated_lufs,
            true_peak_db: self.true_peak_db,
            lra: self.lra,
        }
    }
}

/// 元数据配置
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub artist: Option<String>,

    #[serde(default)]
    pub album: Option<String>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default = "default_lyrics_description")]
    pub lyrics_description: String,
}

fn default_title() -> String {
    "News Bulletin".to_string()
}

fn default_lyrics_description() -> String {
    "Lyrics".to_string()
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            subtitle: None,
            artist: None,
            album: None,
            source: None,
            lyrics_description: default_lyrics_description(),
        }
    }
}

/// 输出配置
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// 文件名模板，支持 %Y% %m% %d% %H% %M% %S% 与 %EXT%
    #[serde(default = "default_file_template")]
    pub file_template: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_file_template() -> String {
    "livenews.%EXT%".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            file_template: default_file_template(),
        }
    }
}

/// 发音词典条目
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LexiconEntry {
    pub word: String,
    pub replacement: String,
}

/// 发音词典
///
/// 以列表保存而不是表，避免配置加载时 key 被转成小写
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LexiconConfig {
    #[serde(default)]
    pub entries: Vec<LexiconEntry>,
}

impl LexiconConfig {
    pub fn build(&self) -> Result<Lexicon, DomainError> {
        let map: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|e| (e.word.clone(), e.replacement.clone()))
            .collect();
        Lexicon::from_map(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.tts.provider, TtsProvider::OpenAi);
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.output.file_template, "livenews.%EXT%");
        assert_eq!(config.loudness.target(), LoudnessTarget::default());
    }

    #[test]
    fn test_cue_offsets() {
        let mut sfx = SfxConfig::default();
        assert_eq!(sfx.cue(CueKind::Intro).timing_offset(), Ok(TimingOffset::None));

        sfx.outro.offset = "2500".to_string();
        assert_eq!(
            sfx.cue(CueKind::Outro).timing_offset(),
            Ok(TimingOffset::Millis(2500))
        );

        sfx.article_break.offset = "soon".to_string();
        assert!(sfx.cue(CueKind::ArticleBreak).timing_offset().is_err());
    }

    #[test]
    fn test_bed_spec_from_config() {
        let bed = BedConfig {
            offset_ms: -500,
            ..BedConfig::default()
        };
        let spec = bed.spec();
        assert_eq!(spec.gain_db, -18.0);
        assert_eq!(spec.offset_ms, -500);
    }

    #[test]
    fn test_lexicon_build() {
        let config = LexiconConfig {
            entries: vec![LexiconEntry {
                word: "NATO".into(),
                replacement: "nay-toe".into(),
            }],
        };
        let lexicon = config.build().unwrap();
        assert_eq!(lexicon.apply("NATO said"), "nay-toe said");
    }
}
