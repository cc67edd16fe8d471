//! Speech Provider Port - 语音合成服务抽象
//!
//! 具体实现在 infrastructure/adapters/tts，由工厂按配置选择一次

use async_trait::async_trait;
use thiserror::Error;

use super::audio_codec::AudioFormat;

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// 合成请求
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// 要合成的文本（已应用发音词典）
    pub text: String,
    pub voice: String,
    pub model: String,
    /// 前一段旁白，供支持上下文拼接的服务使用
    pub previous_text: Option<String>,
    /// 后一段旁白
    pub next_text: Option<String>,
}

/// 合成结果
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub audio_data: Vec<u8>,
    pub format: AudioFormat,
}

/// Speech Provider Port
#[async_trait]
pub trait SpeechProviderPort: Send + Sync {
    /// 服务名称（日志用）
    fn name(&self) -> &'static str;

    /// 是否使用相邻段落作为上下文
    ///
    /// 为 true 时合成调用必须按脚本顺序逐个发出
    fn supports_context_stitching(&self) -> bool {
        false
    }

    /// 合成一段旁白
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesizedAudio, TtsError>;
}
