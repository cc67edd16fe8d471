//! 时间线
//!
//! 混音期间的累加器：输出缓冲 + 游标 + 歌词时间戳列表。
//! 每次追加都消费旧值、返回新值，游标与时间戳只会单调不减。

use std::fmt;

use super::audio::AudioBuffer;
use super::timing::CombinedClip;

/// 同步歌词条目
#[derive(Debug, Clone, PartialEq)]
pub struct LyricsEntry {
    /// 绝对时间（毫秒）
    pub timestamp_ms: u64,
    pub text: String,
}

impl LyricsEntry {
    /// `MM:SS.ss`
    pub fn timestamp_label(&self) -> String {
        format_timestamp(self.timestamp_ms)
    }
}

impl fmt::Display for LyricsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.timestamp_label(), self.text)
    }
}

/// 毫秒格式化为 `MM:SS.ss`
pub fn format_timestamp(ms: u64) -> String {
    let minutes = ms / 60_000;
    let centis = (ms % 60_000 + 5) / 10;
    // 四舍五入可能进位到 60.00
    let (minutes, centis) = if centis >= 6000 {
        (minutes + 1, centis - 6000)
    } else {
        (minutes, centis)
    };
    format!("{:02}:{:02}.{:02}", minutes, centis / 100, centis % 100)
}

/// 把歌词条目拼成同步歌词文本，每行 `[MM:SS.ss]<text>`
pub fn render_synchronized_lyrics(entries: &[LyricsEntry]) -> String {
    entries
        .iter()
        .map(|entry| entry.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 混音时间线
#[derive(Debug, Clone)]
pub struct Timeline {
    buffer: AudioBuffer,
    lyrics: Vec<LyricsEntry>,
}

/// 追加片段后的结果：新时间线 + 旁白绝对起点
#[derive(Debug)]
pub struct Appended {
    pub timeline: Timeline,
    pub clip_start_ms: u64,
    pub narration_start_ms: u64,
}

impl Timeline {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            buffer: AudioBuffer::empty(sample_rate, channels),
            lyrics: Vec::new(),
        }
    }

    /// 当前游标（毫秒）
    pub fn cursor_ms(&self) -> u64 {
        self.buffer.duration_ms()
    }

    /// 追加一个片段，并记录其中旁白的起始时间
    pub fn append(mut self, clip: CombinedClip, text: impl Into<String>) -> Appended {
        let start_frame = self.buffer.frames();
        let clip_start_ms = self.buffer.frames_to_ms(start_frame);
        let narration_start_ms = self
            .buffer
            .frames_to_ms(start_frame + clip.narration_start_frame);

        self.buffer.append(&clip.audio);
        self.lyrics.push(LyricsEntry {
            timestamp_ms: narration_start_ms,
            text: text.into(),
        });

        Appended {
            timeline: self,
            clip_start_ms,
            narration_start_ms,
        }
    }

    /// 结束组装，得到不可变的输出
    pub fn finalize(self) -> FinishedTimeline {
        FinishedTimeline {
            buffer: self.buffer,
            lyrics: self.lyrics,
        }
    }
}

/// 组装完成的时间线
#[derive(Debug, Clone)]
pub struct FinishedTimeline {
    pub buffer: AudioBuffer,
    pub lyrics: Vec<LyricsEntry>,
}

impl FinishedTimeline {
    pub fn duration_ms(&self) -> u64 {
        self.buffer.duration_ms()
    }
}
