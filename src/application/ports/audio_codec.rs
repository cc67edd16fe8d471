//! Audio Codec Port - 音频编解码抽象
//!
//! 解码：合成服务返回的字节 / 音效文件 → PCM
//! 编码：最终混音 → 输出容器（WAV / Ogg Opus）

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::domain::AudioBuffer;

/// 编解码错误
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// 音频容器格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    Flac,
    /// Ogg Opus
    Opus,
}

impl AudioFormat {
    /// 文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Opus => "opus",
        }
    }

    /// ffmpeg 复用器名称
    pub fn muxer(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Opus => "opus",
        }
    }

    /// 根据文件扩展名推断
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wav" | "wave" => Ok(AudioFormat::Wav),
            "mp3" => Ok(AudioFormat::Mp3),
            "flac" => Ok(AudioFormat::Flac),
            "opus" | "ogg" => Ok(AudioFormat::Opus),
            _ => Err(CodecError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// 编码参数
#[derive(Debug, Clone)]
pub struct EncodeConfig {
    pub format: AudioFormat,
    /// 有损格式的目标比特率（bps）
    pub bitrate: u32,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::Opus,
            bitrate: 96000,
        }
    }
}

/// Audio Codec Port
pub trait AudioCodecPort: Send + Sync {
    /// 解码容器字节为 PCM
    fn decode(&self, data: &[u8], format: AudioFormat) -> Result<AudioBuffer, CodecError>;

    /// 把 PCM 编码为指定容器
    fn encode(&self, audio: &AudioBuffer, config: &EncodeConfig) -> Result<Vec<u8>, CodecError>;

    /// 是否支持解码该格式
    fn can_decode(&self, format: AudioFormat) -> bool;

    /// 是否支持编码该格式
    fn can_encode(&self, format: AudioFormat) -> bool;
}
