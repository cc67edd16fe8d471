//! OpenAI TTS Client - OpenAI 兼容的语音合成接口
//!
//! POST {base_url}/v1/audio/speech
//! Request: {"model": "...", "voice": "...", "input": "...", "response_format": "mp3"}
//! Response: 音频二进制

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::map_request_error;
use crate::application::ports::{
    AudioFormat, SpeechProviderPort, SynthesisRequest, SynthesizedAudio, TtsError,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Serialize)]
struct SpeechHttpRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// OpenAI TTS 客户端配置
#[derive(Debug, Clone)]
pub struct OpenAiTtsClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub response_format: AudioFormat,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for OpenAiTtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            response_format: AudioFormat::Mp3,
            timeout_secs: 120,
        }
    }
}

/// OpenAI TTS 客户端
pub struct OpenAiTtsClient {
    client: Client,
    config: OpenAiTtsClientConfig,
}

impl OpenAiTtsClient {
    pub fn new(config: OpenAiTtsClientConfig) -> Result<Self, TtsError> {
        if config.api_key.is_empty() {
            return Err(TtsError::InvalidConfig("OpenAI API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn speech_url(&self) -> String {
        format!("{}/v1/audio/speech", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechProviderPort for OpenAiTtsClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesizedAudio, TtsError> {
        let body = SpeechHttpRequest {
            model: &request.model,
            voice: &request.voice,
            input: &request.text,
            response_format: self.config.response_format.extension(),
        };

        tracing::debug!(
            url = %self.speech_url(),
            text_len = request.text.len(),
            voice = %request.voice,
            "Sending speech request"
        );

        let response = self
            .client
            .post(self.speech_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TtsError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let audio_data = response
            .bytes()
            .await
            .map_err(|e| TtsError::InvalidResponse(format!("Failed to read audio: {}", e)))?
            .to_vec();

        if audio_data.is_empty() {
            return Err(TtsError::InvalidResponse("empty audio body".to_string()));
        }

        tracing::debug!(audio_size = audio_data.len(), "Speech synthesized");

        Ok(SynthesizedAudio {
            audio_data,
            format: self.config.response_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            OpenAiTtsClient::new(OpenAiTtsClientConfig::default()),
            Err(TtsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_speech_url() {
        let client = OpenAiTtsClient::new(OpenAiTtsClientConfig {
            base_url: "http://localhost:9000/".to_string(),
            api_key: "key".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.speech_url(), "http://localhost:9000/v1/audio/speech");
        assert!(!client.supports_context_stitching());
    }

    #[test]
    fn test_request_body() {
        let body = SpeechHttpRequest {
            model: "tts-1",
            voice: "alloy",
            input: "Good evening",
            response_format: AudioFormat::Mp3.extension(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["input"], "Good evening");
        assert_eq!(json["response_format"], "mp3");
    }
}
