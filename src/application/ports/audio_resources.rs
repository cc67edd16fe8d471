//! Audio Resource Port - 音效与背景音乐的加载
//!
//! 每次运行加载一次，之后只读

use std::path::PathBuf;
use thiserror::Error;

use super::audio_codec::CodecError;
use crate::domain::{AudioBuffer, CueBank};

/// 资源加载错误
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
}

/// Audio Resource Port
pub trait AudioResourcePort: Send + Sync {
    /// 加载提示音效，转换到工作格式
    ///
    /// 找不到文件的音效记录警告后不出现在结果中
    fn load_cues(&self, sample_rate: u32, channels: u16) -> Result<CueBank, ResourceError>;

    /// 加载背景音乐；未配置或找不到时返回 None
    fn load_bed(&self, sample_rate: u32, channels: u16)
        -> Result<Option<AudioBuffer>, ResourceError>;
}
