//! TTS Adapter - 语音合成服务实现
//!
//! 由 [`build_speech_provider`] 按配置选择一次，之后只通过端口使用

mod elevenlabs_tts_client;
mod fake_tts_client;
mod openai_tts_client;

use std::sync::Arc;

pub use elevenlabs_tts_client::{ElevenLabsTtsClient, ElevenLabsTtsClientConfig};
pub use fake_tts_client::{FakeSpeechClient, FakeSpeechClientConfig};
pub use openai_tts_client::{OpenAiTtsClient, OpenAiTtsClientConfig};

use crate::application::ports::{SpeechProviderPort, TtsError};
use crate::config::{TtsConfig, TtsProvider};

fn map_request_error(e: reqwest::Error) -> TtsError {
    if e.is_timeout() {
        TtsError::Timeout
    } else if e.is_connect() {
        TtsError::NetworkError(format!("Cannot connect to speech service: {}", e))
    } else {
        TtsError::NetworkError(e.to_string())
    }
}

/// 根据配置创建语音合成服务
pub fn build_speech_provider(config: &TtsConfig) -> Result<Arc<dyn SpeechProviderPort>, TtsError> {
    let api_key = config.api_key.clone().unwrap_or_default();

    let provider: Arc<dyn SpeechProviderPort> = match config.provider {
        TtsProvider::OpenAi => {
            let mut client_config = OpenAiTtsClientConfig {
                api_key,
                response_format: config.response_format,
                timeout_secs: config.timeout_secs,
                ..Default::default()
            };
            if let Some(url) = &config.base_url {
                client_config.base_url = url.clone();
            }
            Arc::new(OpenAiTtsClient::new(client_config)?)
        }
        TtsProvider::ElevenLabs => {
            let mut client_config = ElevenLabsTtsClientConfig {
                api_key,
                timeout_secs: config.timeout_secs,
                ..Default::default()
            };
            if let Some(url) = &config.base_url {
                client_config.base_url = url.clone();
            }
            Arc::new(ElevenLabsTtsClient::new(client_config)?)
        }
        TtsProvider::Fake => Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig::default())),
    };

    tracing::info!(provider = provider.name(), "Speech provider ready");
    Ok(provider)
}
