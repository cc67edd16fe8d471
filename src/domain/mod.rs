//! Domain Layer - 领域层
//!
//! 纯计算，不做 I/O:
//! - script: 脚本分段
//! - lexicon: 发音词典
//! - audio: PCM 缓冲
//! - timing / timeline / mixer: 时间线组装
//! - bed: 背景音乐合成

pub mod audio;
pub mod bed;
mod errors;
pub mod lexicon;
pub mod mixer;
pub mod script;
pub mod timeline;
pub mod timing;

pub use audio::AudioBuffer;
pub use bed::{compose_bed, BedPlacement, BedSpec};
pub use errors::DomainError;
pub use lexicon::Lexicon;
pub use mixer::{mix_timeline, plan_mix, ArticleSpan, CueBank, CueClip, MixOutcome, MixStep};
pub use script::{segment_script, CueKind, ScriptSection, SectionKind};
pub use timeline::{format_timestamp, render_synchronized_lyrics, FinishedTimeline, LyricsEntry, Timeline};
pub use timing::{combine_cue_with_speech, CombinedClip, TimingOffset};
