//! 脚本分段器
//!
//! 把生成的播报脚本按音效占位符切成有序的段落：
//! 纯旁白 (`PlainSpeech`) 或四种音效提示 (`SfxCue`) 之一。
//!
//! 分段本身不做结构校验（末尾悬空的提示符只有在消费时才能发现），
//! 见 `domain::mixer::plan_mix`。

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// 音效提示类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    Intro,
    ArticleStart,
    ArticleBreak,
    Outro,
}

impl CueKind {
    pub const ALL: [CueKind; 4] = [
        CueKind::Intro,
        CueKind::ArticleStart,
        CueKind::ArticleBreak,
        CueKind::Outro,
    ];

    /// 脚本中的占位符
    pub fn placeholder(self) -> &'static str {
        match self {
            CueKind::Intro => "[INTRO]",
            CueKind::ArticleStart => "[ARTICLE_START]",
            CueKind::ArticleBreak => "[ARTICLE_BREAK]",
            CueKind::Outro => "[OUTRO]",
        }
    }

    /// 配置键名
    pub fn key(self) -> &'static str {
        match self {
            CueKind::Intro => "intro",
            CueKind::ArticleStart => "article_start",
            CueKind::ArticleBreak => "article_break",
            CueKind::Outro => "outro",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.placeholder() == token)
    }
}

impl fmt::Display for CueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// 段落类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    PlainSpeech,
    SfxCue(CueKind),
}

/// 脚本段落（分段后不可变）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSection {
    pub index: usize,
    pub kind: SectionKind,
    /// 旁白文本，提示符段落为 None
    pub text: Option<String>,
}

impl ScriptSection {
    pub fn is_cue(&self) -> bool {
        matches!(self.kind, SectionKind::SfxCue(_))
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let alternatives: Vec<String> = CueKind::ALL
            .iter()
            .map(|kind| regex::escape(kind.placeholder()))
            .collect();
        Regex::new(&alternatives.join("|")).expect("placeholder pattern is valid")
    })
}

/// 对脚本分段
///
/// 按占位符切分，去除首尾空白，丢弃空片段，保持原始顺序
pub fn segment_script(script: &str) -> Vec<ScriptSection> {
    let mut sections = Vec::new();
    let mut cursor = 0;

    let push_text = |sections: &mut Vec<ScriptSection>, fragment: &str| {
        let trimmed = fragment.trim();
        if !trimmed.is_empty() {
            sections.push(ScriptSection {
                index: sections.len(),
                kind: SectionKind::PlainSpeech,
                text: Some(trimmed.to_string()),
            });
        }
    };

    for found in placeholder_pattern().find_iter(script) {
        push_text(&mut sections, &script[cursor..found.start()]);
        if let Some(kind) = CueKind::from_token(found.as_str()) {
            sections.push(ScriptSection {
                index: sections.len(),
                kind: SectionKind::SfxCue(kind),
                text: None,
            });
        }
        cursor = found.end();
    }
    push_text(&mut sections, &script[cursor..]);

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_script() {
        let sections = segment_script("  Good evening.  ");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::PlainSpeech);
        assert_eq!(sections[0].text.as_deref(), Some("Good evening."));
    }

    #[test]
    fn test_cues_and_text_in_order() {
        let script = "[INTRO] Welcome to the news.\n[ARTICLE_START]First story.\n\
                      [ARTICLE_BREAK] Second story. [OUTRO] Goodbye.";
        let kinds: Vec<SectionKind> = segment_script(script).iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::SfxCue(CueKind::Intro),
                SectionKind::PlainSpeech,
                SectionKind::SfxCue(CueKind::ArticleStart),
                SectionKind::PlainSpeech,
                SectionKind::SfxCue(CueKind::ArticleBreak),
                SectionKind::PlainSpeech,
                SectionKind::SfxCue(CueKind::Outro),
                SectionKind::PlainSpeech,
            ]
        );
    }

    #[test]
    fn test_indices_are_sequential() {
        let sections = segment_script("[INTRO]a[OUTRO]b");
        let indices: Vec<usize> = sections.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_fragments_dropped() {
        let sections = segment_script("[INTRO]   \n [ARTICLE_START] text");
        assert_eq!(sections.len(), 3);
        assert!(sections[0].is_cue());
        assert!(sections[1].is_cue());
        assert_eq!(sections[2].text.as_deref(), Some("text"));
    }

    #[test]
    fn test_trailing_cue_kept() {
        let sections = segment_script("Hello [OUTRO]");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].kind, SectionKind::SfxCue(CueKind::Outro));
    }

    #[test]
    fn test_empty_script() {
        assert!(segment_script("").is_empty());
        assert!(segment_script("  \n\t ").is_empty());
    }

    #[test]
    fn test_unknown_brackets_are_text() {
        let sections = segment_script("[BREAKING] news");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].text.as_deref(), Some("[BREAKING] news"));
    }
}
