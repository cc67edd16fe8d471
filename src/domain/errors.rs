//! Domain Errors

use thiserror::Error;

use super::script::CueKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("脚本为空，没有可播报的内容")]
    EmptyScript,

    #[error("提示符 {cue} (段落 {section}) 之后没有旁白")]
    CueWithoutNarration { cue: CueKind, section: usize },

    #[error("旁白音频数量不匹配: 需要 {expected}, 实际 {actual}")]
    NarrationCountMismatch { expected: usize, actual: usize },

    #[error("无效的时间偏移: {0}")]
    InvalidOffset(String),

    #[error("无效的发音词典条目: {0}")]
    InvalidLexicon(String),

    #[error("文章区间无效: 开始 {start_ms}ms 晚于结束 {end_ms}ms")]
    InvalidArticleSpan { start_ms: u64, end_ms: u64 },
}
