//! Tag Writer Port - 容器元数据写入
//!
//! 在响度标签之后写入广播元数据（标题、同步歌词等），
//! 必须保留已有的增益标签。

use chrono::{DateTime, Datelike, Local};
use std::path::Path;
use thiserror::Error;

use super::audio_codec::AudioFormat;

/// 标签写入错误
#[derive(Debug, Error)]
pub enum TagError {
    #[error("Failed to read tags: {0}")]
    ReadError(String),

    #[error("Failed to write tags: {0}")]
    WriteError(String),
}

/// 每次生成都会写入的广播元数据
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastMetadata {
    pub title: String,
    pub subtitle: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub source: Option<String>,
    /// 完整脚本文本，写入注释字段
    pub comment: Option<String>,
    /// 同步歌词描述（SynchronizedLyricsDescription）
    pub lyrics_description: String,
    /// 已渲染好的 `[MM:SS.ss]text` 多行文本
    pub synchronized_lyrics: String,
    /// 响度标签，容器复用时可能丢失，这里再写一次
    pub gain_tags: Vec<(String, String)>,
    pub generated_at: DateTime<Local>,
}

impl BroadcastMetadata {
    /// ISO 8601 日期（YYYY-MM-DD）
    pub fn date(&self) -> String {
        self.generated_at.format("%Y-%m-%d").to_string()
    }

    pub fn year(&self) -> u32 {
        self.generated_at.year().max(0) as u32
    }
}

/// 写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    Embedded,
    /// 容器格式不支持，已跳过
    Skipped,
}

/// Tag Writer Port
pub trait TagWriterPort: Send + Sync {
    fn write(
        &self,
        path: &Path,
        format: AudioFormat,
        metadata: &BroadcastMetadata,
    ) -> Result<TagOutcome, TagError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_fields() {
        let metadata = BroadcastMetadata {
            title: "News".into(),
            subtitle: None,
            artist: None,
            album: None,
            source: None,
            comment: None,
            lyrics_description: "Lyrics".into(),
            synchronized_lyrics: String::new(),
            gain_tags: Vec::new(),
            generated_at: Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap(),
        };
        assert_eq!(metadata.date(), "2024-03-09");
        assert_eq!(metadata.year(), 2024);
    }
}
