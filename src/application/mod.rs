//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SpeechProvider、SpeechCache、AudioCodec、LoudnessAnalyzer 等）
//! - synthesis: 旁白合成（缓存优先、有序并发、峰值标准化）
//! - commands: 广播生成命令及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod synthesis;

// Re-exports
pub use commands::{
    handlers::{AssembleBroadcastHandler, AssembleSettings},
    AssembleBroadcast, BroadcastArtifact,
};

pub use error::BroadcastError;

pub use synthesis::{
    SegmentSynthesizer, SpeechCache, SynthesisReport, SynthesisSettings, SynthesizedNarrations,
};
