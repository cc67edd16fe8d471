//! Fake Speech Client - 用于测试的语音合成客户端
//!
//! 不访问网络，返回时长与文本长度成正比的静音 WAV，并记录所有请求

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::application::ports::{
    AudioFormat, SpeechProviderPort, SynthesisRequest, SynthesizedAudio, TtsError,
};
use crate::domain::AudioBuffer;
use crate::infrastructure::adapters::codec::encode_wav;

/// Fake 客户端配置
#[derive(Debug, Clone)]
pub struct FakeSpeechClientConfig {
    /// 每个字符对应的时长（毫秒）
    pub ms_per_char: u64,
    pub sample_rate: u32,
    pub channels: u16,
    /// 模拟延迟
    pub latency_ms: u64,
    /// 按文本覆盖的延迟，用于打乱完成顺序
    pub text_latency_ms: HashMap<String, u64>,
    /// 声明支持上下文拼接
    pub context_stitching: bool,
    /// 文本包含该子串时返回错误
    pub fail_on: Option<String>,
}

impl Default for FakeSpeechClientConfig {
    fn default() -> Self {
        Self {
            ms_per_char: 60,
            sample_rate: 24000,
            channels: 1,
            latency_ms: 0,
            text_latency_ms: HashMap::new(),
            context_stitching: false,
            fail_on: None,
        }
    }
}

/// Fake Speech Client
pub struct FakeSpeechClient {
    config: FakeSpeechClientConfig,
    calls: AtomicUsize,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl FakeSpeechClient {
    pub fn new(config: FakeSpeechClientConfig) -> Self {
        Self {
            config,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 已收到的合成请求数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 已收到的请求（按到达顺序）
    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SpeechProviderPort for FakeSpeechClient {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn supports_context_stitching(&self) -> bool {
        self.config.context_stitching
    }

    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesizedAudio, TtsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let latency_ms = self
            .config
            .text_latency_ms
            .get(&request.text)
            .copied()
            .unwrap_or(self.config.latency_ms);
        if latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        }

        if let Some(marker) = &self.config.fail_on {
            if request.text.contains(marker.as_str()) {
                return Err(TtsError::ServiceError(format!(
                    "fake failure for text containing {:?}",
                    marker
                )));
            }
        }

        let duration_ms = request.text.chars().count() as u64 * self.config.ms_per_char;
        let audio = AudioBuffer::silent(duration_ms, self.config.sample_rate, self.config.channels);

        tracing::debug!(
            text_len = request.text.len(),
            duration_ms,
            "FakeSpeechClient: returning silence"
        );

        Ok(SynthesizedAudio {
            audio_data: encode_wav(&audio),
            format: AudioFormat::Wav,
        })
    }
}
