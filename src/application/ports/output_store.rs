//! Output Store Port - 成品输出
//!
//! 中间文件全部写在暂存区内；只有所有阶段都成功后才把成品移动到最终位置。
//! 暂存区被丢弃时自动删除，失败的运行不会留下半成品。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::audio_codec::AudioFormat;

/// 输出错误
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to create staging area in {dir}: {message}")]
    StagingFailed { dir: String, message: String },

    #[error("Failed to persist {from} -> {to}: {message}")]
    PersistFailed {
        from: String,
        to: String,
        message: String,
    },
}

/// 一次运行的暂存区
#[async_trait]
pub trait StagingArea: Send + Sync {
    /// 暂存区内的文件路径
    fn path_for(&self, file_name: &str) -> PathBuf;

    /// 把暂存文件移动到最终位置
    ///
    /// `destination` 为空时按输出模板命名；成功后暂存区被删除
    async fn persist(
        self: Box<Self>,
        staged: &Path,
        format: AudioFormat,
        destination: Option<&Path>,
    ) -> Result<PathBuf, OutputError>;
}

/// Output Store Port
#[async_trait]
pub trait OutputStorePort: Send + Sync {
    /// 为一次运行创建暂存区
    async fn begin(&self) -> Result<Box<dyn StagingArea>, OutputError>;
}
