//! 应用层错误定义
//!
//! 一次广播生成的错误分类。除 `Cache` 外均为致命错误：
//! 运行中止，且不会留下任何输出文件。

use thiserror::Error;

use crate::application::ports::{
    CacheError, CodecError, LoudnessError, OutputError, ResourceError, TagError, TtsError,
};
use crate::config::ConfigError;
use crate::domain::DomainError;

/// 广播生成错误
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// 配置缺失或无效
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 脚本结构错误（空脚本、提示符后没有旁白）
    #[error("Malformed script: {0}")]
    MalformedScript(#[source] DomainError),

    /// 语音合成失败
    #[error("Synthesis failed for section {section}: {source}")]
    Synthesis {
        section: usize,
        #[source]
        source: TtsError,
    },

    /// 缓存读写失败（仅记录日志）
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// 响度测量失败
    #[error("Loudness analysis failed: {0}")]
    LoudnessAnalysis(#[from] LoudnessError),

    /// 文章区间无效（结束早于开始）
    #[error("Invalid article span: {0}")]
    InvalidArticleSpan(#[source] DomainError),

    /// 解码/编码失败
    #[error("Codec error ({context}): {source}")]
    Codec {
        context: String,
        #[source]
        source: CodecError,
    },

    /// 元数据写入失败
    #[error("Tagging failed: {0}")]
    Tagging(#[from] TagError),

    /// 输出文件操作失败
    #[error("Output error: {0}")]
    Output(String),
}

impl BroadcastError {
    /// 是否需要中止本次运行
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BroadcastError::Cache(_))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn output(message: impl Into<String>) -> Self {
        Self::Output(message.into())
    }

    pub fn codec(context: impl Into<String>, source: CodecError) -> Self {
        Self::Codec {
            context: context.into(),
            source,
        }
    }
}

impl From<DomainError> for BroadcastError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidArticleSpan { .. } => Self::InvalidArticleSpan(err),
            DomainError::InvalidOffset(_) | DomainError::InvalidLexicon(_) => {
                Self::Configuration(err.to_string())
            }
            _ => Self::MalformedScript(err),
        }
    }
}

impl From<ResourceError> for BroadcastError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Read { .. } => Self::Configuration(err.to_string()),
            ResourceError::Decode { path, source } => {
                Self::codec(format!("resource {}", path.display()), source)
            }
        }
    }
}

impl From<ConfigError> for BroadcastError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<OutputError> for BroadcastError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

impl From<std::io::Error> for BroadcastError {
    fn from(err: std::io::Error) -> Self {
        Self::Output(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cache_errors_are_recoverable() {
        let cache = BroadcastError::from(CacheError::IoError("disk full".into()));
        assert!(!cache.is_fatal());

        let script = BroadcastError::from(DomainError::EmptyScript);
        assert!(matches!(script, BroadcastError::MalformedScript(_)));
        assert!(script.is_fatal());

        let span = BroadcastError::from(DomainError::InvalidArticleSpan {
            start_ms: 10,
            end_ms: 5,
        });
        assert!(matches!(span, BroadcastError::InvalidArticleSpan(_)));

        let offset = BroadcastError::from(DomainError::InvalidOffset("x".into()));
        assert!(matches!(offset, BroadcastError::Configuration(_)));
    }
}
