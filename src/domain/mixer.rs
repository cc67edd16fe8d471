//! 时间线混音器
//!
//! 两个阶段：
//! 1. `plan_mix`：状态机遍历段落，把每个提示符与其后的旁白配对。
//!    结构错误在这里暴露，早于任何合成调用。
//! 2. `mix_timeline`：按原始顺序消费旁白音频，计算组合片段和旁白绝对起点，
//!    同时记录背景音乐需要的文章区间。

use std::collections::HashMap;

use super::audio::AudioBuffer;
use super::errors::DomainError;
use super::script::{CueKind, ScriptSection, SectionKind};
use super::timeline::{FinishedTimeline, Timeline};
use super::timing::{combine_cue_with_speech, CombinedClip, TimingOffset};

/// 混音步骤
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixStep {
    /// 无提示符的旁白
    Narration { section: usize, text: String },
    /// 提示符 + 紧随其后的旁白
    Cued {
        cue: CueKind,
        cue_section: usize,
        section: usize,
        text: String,
    },
}

impl MixStep {
    pub fn text(&self) -> &str {
        match self {
            MixStep::Narration { text, .. } | MixStep::Cued { text, .. } => text,
        }
    }

    /// 旁白所在段落序号
    pub fn section(&self) -> usize {
        match self {
            MixStep::Narration { section, .. } | MixStep::Cued { section, .. } => *section,
        }
    }

    pub fn cue(&self) -> Option<CueKind> {
        match self {
            MixStep::Narration { .. } => None,
            MixStep::Cued { cue, .. } => Some(*cue),
        }
    }
}

/// 配对状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MixerState {
    WaitingSection,
    AwaitingPairedText { cue: CueKind, cue_section: usize },
}

/// 把段落序列配对成混音步骤
pub fn plan_mix(sections: &[ScriptSection]) -> Result<Vec<MixStep>, DomainError> {
    if sections.is_empty() {
        return Err(DomainError::EmptyScript);
    }

    let mut steps = Vec::with_capacity(sections.len());
    let mut state = MixerState::WaitingSection;

    for section in sections {
        state = match (state, section.kind) {
            (MixerState::WaitingSection, SectionKind::SfxCue(cue)) => {
                MixerState::AwaitingPairedText {
                    cue,
                    cue_section: section.index,
                }
            }
            (MixerState::WaitingSection, SectionKind::PlainSpeech) => {
                steps.push(MixStep::Narration {
                    section: section.index,
                    text: section.text.clone().unwrap_or_default(),
                });
                MixerState::WaitingSection
            }
            (MixerState::AwaitingPairedText { cue, cue_section }, SectionKind::PlainSpeech) => {
                steps.push(MixStep::Cued {
                    cue,
                    cue_section,
                    section: section.index,
                    text: section.text.clone().unwrap_or_default(),
                });
                MixerState::WaitingSection
            }
            (MixerState::AwaitingPairedText { cue, cue_section }, SectionKind::SfxCue(_)) => {
                return Err(DomainError::CueWithoutNarration {
                    cue,
                    section: cue_section,
                });
            }
        };
    }

    if let MixerState::AwaitingPairedText { cue, cue_section } = state {
        return Err(DomainError::CueWithoutNarration {
            cue,
            section: cue_section,
        });
    }

    Ok(steps)
}

/// 已解码的提示音效
#[derive(Debug, Clone)]
pub struct CueClip {
    pub audio: AudioBuffer,
    pub offset: TimingOffset,
}

/// 本次运行可用的提示音效表
///
/// 缺失的提示音效在混音时直接跳过（旁白照常追加）
#[derive(Debug, Clone, Default)]
pub struct CueBank {
    clips: HashMap<CueKind, CueClip>,
}

impl CueBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cue: CueKind, clip: CueClip) {
        self.clips.insert(cue, clip);
    }

    pub fn get(&self, cue: CueKind) -> Option<&CueClip> {
        self.clips.get(&cue)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

/// 文章区间（背景音乐的铺设范围）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArticleSpan {
    /// 第一个 ArticleStart 旁白的起点
    pub start_ms: Option<u64>,
    /// 第一个 Outro 片段的起点
    pub end_ms: Option<u64>,
}

/// 混音结果
#[derive(Debug, Clone)]
pub struct MixOutcome {
    pub timeline: FinishedTimeline,
    pub span: ArticleSpan,
}

/// 按顺序混音
///
/// `narrations` 与 `steps` 一一对应，所有权在此转移
pub fn mix_timeline(
    steps: &[MixStep],
    narrations: Vec<AudioBuffer>,
    cues: &CueBank,
    sample_rate: u32,
    channels: u16,
) -> Result<MixOutcome, DomainError> {
    if steps.is_empty() {
        return Err(DomainError::EmptyScript);
    }
    if steps.len() != narrations.len() {
        return Err(DomainError::NarrationCountMismatch {
            expected: steps.len(),
            actual: narrations.len(),
        });
    }

    let mut timeline = Timeline::new(sample_rate, channels);
    let mut article_start: Option<u64> = None;
    let mut article_end: Option<u64> = None;
    let mut first_plain_start: Option<u64> = None;

    for (step, speech) in steps.iter().zip(narrations) {
        let speech = speech.conform(sample_rate, channels);

        let clip = match step.cue().and_then(|cue| cues.get(cue)) {
            Some(cue_clip) => combine_cue_with_speech(&cue_clip.audio, speech, cue_clip.offset),
            None => {
                if let Some(cue) = step.cue() {
                    tracing::debug!(
                        cue = %cue,
                        section = step.section(),
                        "No SFX loaded for cue, appending narration only"
                    );
                }
                CombinedClip::narration_only(speech)
            }
        };

        let appended = timeline.append(clip, step.text());
        timeline = appended.timeline;

        match step.cue() {
            Some(CueKind::ArticleStart) if article_start.is_none() => {
                article_start = Some(appended.narration_start_ms);
            }
            Some(CueKind::Outro) if article_end.is_none() => {
                article_end = Some(appended.clip_start_ms);
            }
            None if first_plain_start.is_none() => {
                first_plain_start = Some(appended.narration_start_ms);
            }
            _ => {}
        }

        tracing::trace!(
            section = step.section(),
            cue = ?step.cue(),
            narration_start_ms = appended.narration_start_ms,
            cursor_ms = timeline.cursor_ms(),
            "Section mixed"
        );
    }

    Ok(MixOutcome {
        timeline: timeline.finalize(),
        span: ArticleSpan {
            start_ms: article_start.or(first_plain_start),
            end_ms: article_end,
        },
    })
}
