//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（bulletin.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::application::ports::AudioFormat;
use crate::domain::CueKind;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["bulletin", "bulletin.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `BULLETIN_`，层级分隔符 `__`）
/// 2. 配置文件（bulletin.toml 或 bulletin.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `BULLETIN_TTS__PROVIDER=elevenlabs`
/// - `BULLETIN_TTS__API_KEY=...`
/// - `BULLETIN_SFX__OUTRO__OFFSET=2500`
/// - `BULLETIN_LOUDNESS__ENABLED=false`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("log.level", "info")?
        .set_default("log.json", false)?
        .set_default("tts.provider", "openai")?
        .set_default("tts.timeout_secs", 120)?
        .set_default("tts.max_retries", 0)?
        .set_default("tts.max_concurrent", 4)?
        .set_default("cache.enabled", true)?
        .set_default("cache.path", "data/speech-cache.sled")?
        .set_default("cache.ttl_secs", 7 * 86400)?
        .set_default("cache.sweep_interval_secs", 3600)?
        .set_default("audio.sample_rate", 48000)?
        .set_default("audio.channels", 2)?
        .set_default("audio.output_format", "opus")?
        .set_default("audio.bitrate", 96000)?
        .set_default("loudness.enabled", true)?
        .set_default("loudness.ffmpeg_path", "ffmpeg")?
        .set_default("loudness.integrated_lufs", -23.0)?
        .set_default("loudness.true_peak_db", -2.0)?
        .set_default("loudness.lra", 7.0)?
        .set_default("output.dir", "output")?
        .set_default("output.file_template", "livenews.%EXT%")?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: BULLETIN_SFX__INTRO__PATH=/srv/sfx/intro.wav
    builder = builder.add_source(
        Environment::with_prefix("BULLETIN")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
///
/// 所有检查都在合成开始前完成
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    for cue in CueKind::ALL {
        config.sfx.cue(cue).timing_offset().map_err(|e| {
            ConfigError::ValidationError(format!("sfx.{}.offset: {}", cue.key(), e))
        })?;
    }

    if config.tts.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "tts.max_concurrent cannot be 0".to_string(),
        ));
    }

    if config.tts.provider.is_network()
        && config.tts.api_key.as_deref().map_or(true, str::is_empty)
    {
        return Err(ConfigError::ValidationError(format!(
            "tts.api_key is required for provider {:?}",
            config.tts.provider
        )));
    }

    if config.tts.response_format == AudioFormat::Opus {
        return Err(ConfigError::ValidationError(
            "tts.response_format must be one of wav, mp3, flac".to_string(),
        ));
    }

    if !matches!(config.audio.output_format, AudioFormat::Wav | AudioFormat::Opus) {
        return Err(ConfigError::ValidationError(format!(
            "audio.output_format {} is not supported, use wav or opus",
            config.audio.output_format
        )));
    }

    if config.audio.sample_rate == 0 {
        return Err(ConfigError::ValidationError(
            "audio.sample_rate cannot be 0".to_string(),
        ));
    }

    if config.audio.channels == 0 {
        return Err(ConfigError::ValidationError(
            "audio.channels cannot be 0".to_string(),
        ));
    }

    if config.output.file_template.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "output.file_template cannot be empty".to_string(),
        ));
    }

    if config.cache.enabled && config.cache.path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "cache.path cannot be empty when cache is enabled".to_string(),
        ));
    }

    config
        .lexicon
        .build()
        .map_err(|e| ConfigError::ValidationError(format!("lexicon: {}", e)))?;

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Bulletin Configuration ===");
    tracing::info!("TTS Provider: {:?}", config.tts.provider);
    tracing::info!("TTS Voice/Model: {} / {}", config.tts.voice, config.tts.model);
    tracing::info!("TTS Concurrency: {}", config.tts.max_concurrent);
    tracing::info!("Cache Enabled: {}", config.cache.enabled);
    if config.cache.enabled {
        tracing::info!("Cache Path: {:?}", config.cache.path);
        tracing::info!("Cache TTL: {}s", config.cache.ttl_secs);
    }
    tracing::info!(
        "Working Format: {} Hz / {} ch",
        config.audio.sample_rate,
        config.audio.channels
    );
    tracing::info!("Output: {:?} ({})", config.output.dir, config.audio.output_format);
    tracing::info!("Loudness Enabled: {}", config.loudness.enabled);
    for cue in CueKind::ALL {
        let sfx = config.sfx.cue(cue);
        tracing::info!("SFX {}: {:?} (offset {})", cue, sfx.path, sfx.offset);
    }
    tracing::info!("Bed: {:?}", config.bed.path);
    tracing::info!("Lexicon Entries: {}", config.lexicon.entries.len());
    tracing::info!("==============================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TtsProvider;
    use std::io::Write;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.tts.provider = TtsProvider::Fake;
        config
    }

    #[test]
    fn test_validation_passes_for_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validation_error_for_bad_offset() {
        let mut config = valid_config();
        config.sfx.intro.offset = "-10".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("sfx.intro.offset"));
    }

    #[test]
    fn test_validation_error_for_zero_concurrency() {
        let mut config = valid_config();
        config.tts.max_concurrent = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_missing_api_key() {
        let mut config = valid_config();
        config.tts.provider = TtsProvider::ElevenLabs;
        assert!(validate_config(&config).is_err());

        config.tts.api_key = Some("secret".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_format() {
        let mut config = valid_config();
        config.audio.sample_rate = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.audio.channels = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_undecodable_formats() {
        let mut config = valid_config();
        config.tts.response_format = AudioFormat::Opus;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.audio.output_format = AudioFormat::Mp3;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_template() {
        let mut config = valid_config();
        config.output.file_template = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_cache_path() {
        let mut config = valid_config();
        config.cache.path = std::path::PathBuf::new();
        assert!(validate_config(&config).is_err());

        config.cache.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bulletin.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[tts]
provider = "fake"
max_concurrent = 2

[sfx.outro]
path = "sfx/outro.wav"
offset = "2500"

[[lexicon.entries]]
word = "NATO"
replacement = "nay-toe"
"#
        )
        .unwrap();

        let config = load_config_from_path(Some(&path)).unwrap();
        assert_eq!(config.tts.provider, TtsProvider::Fake);
        assert_eq!(config.tts.max_concurrent, 2);
        assert_eq!(config.sfx.outro.offset, "2500");
        assert_eq!(config.sfx.intro.offset, "none");
        assert_eq!(config.lexicon.entries[0].word, "NATO");
        assert_eq!(config.audio.sample_rate, 48000);
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bulletin.toml");
        std::fs::write(
            &path,
            r#"
[tts]
provider = "fake"
voice = "alloy"
max_retries = 1
"#,
        )
        .unwrap();

        // 其他测试不读取这两个字段
        std::env::set_var("BULLETIN_TTS__VOICE", "nova");
        std::env::set_var("BULLETIN_TTS__MAX_RETRIES", "3");
        let loaded = load_config_from_path(Some(&path));
        std::env::remove_var("BULLETIN_TTS__VOICE");
        std::env::remove_var("BULLETIN_TTS__MAX_RETRIES");

        let config = loaded.unwrap();
        assert_eq!(config.tts.voice, "nova");
        assert_eq!(config.tts.max_retries, 3);
        assert_eq!(config.tts.provider, TtsProvider::Fake);
    }
}
