//! Bulletin - 广播新闻时间线合成与响度标准化引擎
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - 脚本分段、提示符配对、时间线混音、背景音乐铺设
//! - 纯函数，不做任何 I/O
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SpeechProvider, SpeechCache, AudioCodec, LoudnessAnalyzer, TagWriter）
//! - Synthesis: 旁白合成编排
//! - Commands: AssembleBroadcast 流水线
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: TTS 客户端、编解码、ffmpeg 响度分析、lofty 标签、音效解析、输出暂存
//! - Persistence: Sled 合成缓存
//! - Memory: 内存合成缓存
//! - Worker: 缓存清理后台任务

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
