//! ElevenLabs TTS Client
//!
//! POST {base_url}/v1/text-to-speech/{voice_id}?output_format=mp3_44100_128
//! 请求中携带相邻段落 (previous_text / next_text)，使语调在段落之间连贯。
//! 因此合成必须按脚本顺序逐个发出。

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::map_request_error;
use crate::application::ports::{
    AudioFormat, SpeechProviderPort, SynthesisRequest, SynthesizedAudio, TtsError,
};

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const API_KEY_HEADER: &str = "xi-api-key";
const OUTPUT_FORMAT: &str = "mp3_44100_128";

#[derive(Debug, Serialize)]
struct TextToSpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_text: Option<&'a str>,
}

/// ElevenLabs 客户端配置
#[derive(Debug, Clone)]
pub struct ElevenLabsTtsClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for ElevenLabsTtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            timeout_secs: 120,
        }
    }
}

/// ElevenLabs 客户端
pub struct ElevenLabsTtsClient {
    client: Client,
    config: ElevenLabsTtsClientConfig,
}

impl ElevenLabsTtsClient {
    pub fn new(config: ElevenLabsTtsClientConfig) -> Result<Self, TtsError> {
        if config.api_key.is_empty() {
            return Err(TtsError::InvalidConfig(
                "ElevenLabs API key is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn speech_url(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            voice_id
        )
    }
}

#[async_trait]
impl SpeechProviderPort for ElevenLabsTtsClient {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    fn supports_context_stitching(&self) -> bool {
        true
    }

    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesizedAudio, TtsError> {
        let body = TextToSpeechBody {
            text: &request.text,
            model_id: &request.model,
            previous_text: request.previous_text.as_deref(),
            next_text: request.next_text.as_deref(),
        };

        tracing::debug!(
            voice = %request.voice,
            text_len = request.text.len(),
            has_previous = body.previous_text.is_some(),
            has_next = body.next_text.is_some(),
            "Sending text-to-speech request"
        );

        let response = self
            .client
            .post(self.speech_url(&request.voice))
            .query(&[("output_format", OUTPUT_FORMAT)])
            .header(API_KEY_HEADER, &self.config.api_key)
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

        Ok(SynthesizedAudio {
            audio_data,
            format: AudioFormat::Mp3,
        })
    }
}
