//! Bulletin - 广播新闻合成
//!
//! 单次批处理：读入脚本 → 生成一期完整广播 → 原子落盘
//! - assemble: 生成广播
//! - sweep-cache: 清理一次过期的合成缓存

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;

use bulletin::application::ports::{AudioCodecPort, LoudnessAnalyzerPort, SpeechCachePort};
use bulletin::application::{
    AssembleBroadcast, AssembleBroadcastHandler, AssembleSettings, SegmentSynthesizer,
    SpeechCache, SynthesisSettings,
};
use bulletin::config::{load_config_from_path, print_config, AppConfig, LogConfig};
use bulletin::infrastructure::adapters::{
    build_speech_provider, FfmpegLoudnessAnalyzer, FfmpegLoudnessConfig, FsAudioResources,
    LoftyTagWriter, StagedOutputStore, SymphoniaCodec,
};
use bulletin::infrastructure::persistence::SledSpeechCache;
use bulletin::infrastructure::worker::{CacheSweeper, CacheSweeperConfig};

#[derive(Debug, Parser)]
#[command(name = "bulletin", version, about = "Assemble a narrated news bulletin")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 生成一期广播
    Assemble {
        /// 脚本文件，`-` 表示标准输入
        #[arg(long)]
        script: String,

        /// 配置文件路径
        #[arg(long)]
        config: Option<PathBuf>,

        /// 输出文件路径（覆盖 output.file_template）
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// 清理过期的合成缓存
    SweepCache {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Assemble {
            script,
            config,
            output,
        } => {
            let config = load(config.as_deref())?;
            assemble(&config, &script, output).await
        }
        Command::SweepCache { config } => {
            let config = load(config.as_deref())?;
            sweep_cache(&config).await
        }
    }
}

/// 加载配置（优先级：环境变量 > 配置文件 > 默认值）并初始化日志
fn load(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config =
        load_config_from_path(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    init_tracing(&config.log);
    print_config(&config);
    Ok(config)
}

fn init_tracing(log: &LogConfig) {
    let log_filter = format!("{},bulletin={}", log.level, log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    // 日志写到 stderr，stdout 只输出成品路径
    if log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn read_script(source: &str) -> anyhow::Result<String> {
    let mut script = String::new();
    if source == "-" {
        tokio::io::stdin().read_to_string(&mut script).await?;
    } else {
        script = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read script {}: {}", source, e))?;
    }
    Ok(script)
}

/// 打开 sled 缓存；失败时退化为无缓存
async fn open_cache(config: &AppConfig) -> Option<Arc<SledSpeechCache>> {
    if !config.cache.enabled {
        return None;
    }

    if let Some(parent) = config.cache.path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            tracing::warn!(error = %e, "Failed to create cache directory, synthesizing without cache");
            return None;
        }
    }

    match SledSpeechCache::open(&config.cache.path) {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            tracing::warn!(
                path = %config.cache.path.display(),
                error = %e,
                "Failed to open speech cache, synthesizing without cache"
            );
            None
        }
    }
}

async fn assemble(config: &AppConfig, script: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let script = read_script(script).await?;

    let codec: Arc<dyn AudioCodecPort> = Arc::new(SymphoniaCodec::new());
    let provider = build_speech_provider(&config.tts)?;
    let lexicon = Arc::new(config.lexicon.build()?);
    let resources = Arc::new(FsAudioResources::from_config(
        &config.sfx,
        &config.bed,
        codec.clone(),
    )?);

    // 创建合成缓存与后台清理
    let sled_cache = open_cache(config).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sweeper_handle = None;
    let speech_cache = match &sled_cache {
        Some(cache) => {
            let backend: Arc<dyn SpeechCachePort> = cache.clone();
            if config.cache.sweep_interval_secs > 0 {
                let sweeper = CacheSweeper::new(
                    CacheSweeperConfig {
                        ttl: Duration::from_secs(config.cache.ttl_secs),
                        interval: Duration::from_secs(config.cache.sweep_interval_secs),
                    },
                    backend.clone(),
                );
                sweeper_handle = Some(tokio::spawn(sweeper.run(shutdown_rx)));
            }
            SpeechCache::new(backend)
        }
        None => SpeechCache::disabled(),
    };

    let synthesizer = SegmentSynthesizer::new(
        provider,
        codec.clone(),
        Arc::new(speech_cache),
        lexicon,
        SynthesisSettings {
            voice: config.tts.voice.clone(),
            model: config.tts.model.clone(),
            max_concurrent: config.tts.max_concurrent,
            max_retries: config.tts.max_retries,
            sample_rate: config.audio.sample_rate,
            channels: config.audio.channels,
            peak_headroom_db: config.audio.peak_headroom_db,
        },
    );

    let loudness: Option<Arc<dyn LoudnessAnalyzerPort>> = if config.loudness.enabled {
        Some(Arc::new(FfmpegLoudnessAnalyzer::new(FfmpegLoudnessConfig {
            ffmpeg_path: config.loudness.ffmpeg_path.clone(),
            timeout_secs: config.loudness.timeout_secs,
        })))
    } else {
        tracing::warn!("Loudness analysis disabled, gain tags will not be written");
        None
    };

    let handler = AssembleBroadcastHandler::new(
        Arc::new(synthesizer),
        resources,
        codec,
        loudness,
        Arc::new(LoftyTagWriter::new()),
        Arc::new(StagedOutputStore::new(
            &config.output.dir,
            config.output.file_template.clone(),
        )),
        AssembleSettings {
            sample_rate: config.audio.sample_rate,
            channels: config.audio.channels,
            bed: config.bed.spec(),
            encode: config.audio.encode_config(),
            loudness: config.loudness.target(),
            metadata: config.metadata.clone(),
        },
    );

    let result = handler.handle(AssembleBroadcast { script, output }).await;

    // 停止后台清理并刷新缓存
    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper_handle {
        let _ = handle.await;
    }
    if let Some(cache) = &sled_cache {
        if let Err(e) = cache.flush() {
            tracing::warn!(error = %e, "Failed to flush speech cache");
        }
    }

    let artifact = result?;
    println!("{}", artifact.path.display());
    Ok(())
}

async fn sweep_cache(config: &AppConfig) -> anyhow::Result<()> {
    if !config.cache.enabled {
        tracing::info!("Speech cache disabled, nothing to sweep");
        return Ok(());
    }

    let cache = Arc::new(SledSpeechCache::open(&config.cache.path)?);
    let sweeper = CacheSweeper::new(
        CacheSweeperConfig {
            ttl: Duration::from_secs(config.cache.ttl_secs),
            interval: Duration::from_secs(config.cache.sweep_interval_secs.max(1)),
        },
        cache.clone(),
    );

    let removed = sweeper.sweep_once().await;
    cache.flush()?;

    let stats = cache.stats().await;
    tracing::info!(
        removed,
        remaining = stats.total_entries,
        size_bytes = stats.total_size_bytes,
        "Cache sweep complete"
    );
    Ok(())
}
