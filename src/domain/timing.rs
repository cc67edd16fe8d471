//! 提示音效与旁白的组合
//!
//! 时间偏移决定旁白在音效片段内（或之后）的起始位置：
//! - `None`：音效播放完毕后接旁白
//! - `offset <= sfx`：旁白叠加在音效上，超出音效的部分接在后面，不截断旁白
//! - `offset > sfx`：音效 + 静音补齐到 offset + 旁白

use std::fmt;
use std::str::FromStr;

use super::audio::AudioBuffer;
use super::errors::DomainError;

/// 旁白相对音效片段的起始偏移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingOffset {
    /// 不叠加，顺序拼接
    #[default]
    None,
    /// 毫秒偏移
    Millis(u64),
}

impl FromStr for TimingOffset {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(TimingOffset::None);
        }
        trimmed
            .parse::<u64>()
            .map(TimingOffset::Millis)
            .map_err(|_| DomainError::InvalidOffset(s.to_string()))
    }
}

impl fmt::Display for TimingOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingOffset::None => f.write_str("none"),
            TimingOffset::Millis(ms) => write!(f, "{}", ms),
        }
    }
}

/// 组合后的片段
#[derive(Debug, Clone)]
pub struct CombinedClip {
    pub audio: AudioBuffer,
    /// 旁白在片段内的起始帧
    pub narration_start_frame: usize,
}

impl CombinedClip {
    /// 纯旁白片段，从 0 开始
    pub fn narration_only(speech: AudioBuffer) -> Self {
        Self {
            audio: speech,
            narration_start_frame: 0,
        }
    }

    pub fn narration_start_ms(&self) -> u64 {
        self.audio.frames_to_ms(self.narration_start_frame)
    }
}

/// 把提示音效和其后的旁白组合为一个片段
///
/// 旁白所有权转移进结果；音效只读，可在多个提示处复用
pub fn combine_cue_with_speech(
    sfx: &AudioBuffer,
    speech: AudioBuffer,
    offset: TimingOffset,
) -> CombinedClip {
    let speech = speech.conform(sfx.sample_rate(), sfx.channels());
    let sfx_frames = sfx.frames();

    match offset {
        TimingOffset::None => CombinedClip {
            audio: sfx.clone().concat(&speech),
            narration_start_frame: sfx_frames,
        },
        TimingOffset::Millis(ms) => {
            let offset_frames = sfx.ms_to_frames(ms);
            if offset_frames <= sfx_frames {
                let mut audio = sfx.clone();
                audio.pad_to_frames(offset_frames + speech.frames());
                audio.overlay_at_frame(&speech, offset_frames);
                CombinedClip {
                    audio,
                    narration_start_frame: offset_frames,
                }
            } else {
                let mut audio = sfx.clone();
                audio.pad_to_frames(offset_frames);
                audio.append(&speech);
                CombinedClip {
                    audio,
                    narration_start_frame: offset_frames,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 48000;

    fn silence(ms: u64) -> AudioBuffer {
        AudioBuffer::silent(ms, RATE, 2)
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!("none".parse::<TimingOffset>().unwrap(), TimingOffset::None);
        assert_eq!("None".parse::<TimingOffset>().unwrap(), TimingOffset::None);
        assert_eq!("".parse::<TimingOffset>().unwrap(), TimingOffset::None);
        assert_eq!(" 2500 ".parse::<TimingOffset>().unwrap(), TimingOffset::Millis(2500));
        assert!("-5".parse::<TimingOffset>().is_err());
        assert!("soon".parse::<TimingOffset>().is_err());
    }

    #[test]
    fn test_no_offset_concatenates() {
        for (sfx_ms, speech_ms) in [(0, 0), (1, 999), (2000, 3000), (4321, 17)] {
            let clip = combine_cue_with_speech(&silence(sfx_ms), silence(speech_ms), TimingOffset::None);
            assert_eq!(clip.audio.duration_ms(), sfx_ms + speech_ms);
            assert_eq!(clip.narration_start_ms(), sfx_ms);
        }
    }

    #[test]
    fn test_offset_beyond_sfx_inserts_gap() {
        let clip = combine_cue_with_speech(&silence(2000), silence(3000), TimingOffset::Millis(2500));
        assert_eq!(clip.audio.duration_ms(), 2000 + 500 + 3000);
        assert_eq!(clip.narration_start_ms(), 2500);
    }

    #[test]
    fn test_overlay_fits_inside_sfx() {
        let clip = combine_cue_with_speech(&silence(3000), silence(1000), TimingOffset::Millis(500));
        assert_eq!(clip.audio.duration_ms(), 3000);
        assert_eq!(clip.narration_start_ms(), 500);
    }

    #[test]
    fn test_overlay_overruns_sfx_without_truncation() {
        let clip = combine_cue_with_speech(&silence(3000), silence(2800), TimingOffset::Millis(1000));
        assert_eq!(clip.audio.duration_ms(), 1000 + 2800);
        assert_eq!(clip.narration_start_ms(), 1000);
    }

    #[test]
    fn test_offset_equal_to_sfx_length() {
        let clip = combine_cue_with_speech(&silence(1500), silence(700), TimingOffset::Millis(1500));
        assert_eq!(clip.audio.duration_ms(), 2200);
        assert_eq!(clip.narration_start_ms(), 1500);
    }

    #[test]
    fn test_overlay_mixes_samples() {
        let sfx = AudioBuffer::from_interleaved(vec![0.25; 100], 1000, 1);
        let speech = AudioBuffer::from_interleaved(vec![0.5; 20], 1000, 1);
        let clip = combine_cue_with_speech(&sfx, speech, TimingOffset::Millis(90));
        let samples = clip.audio.samples();
        assert_eq!(samples.len(), 110);
        assert!((samples[89] - 0.25).abs() < 1e-6);
        assert!((samples[95] - 0.75).abs() < 1e-6);
        assert!((samples[105] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_offsets_hold_at_44100() {
        let at = |ms| AudioBuffer::silent(ms, 44100, 2);

        let clip = combine_cue_with_speech(&at(1000), at(500), TimingOffset::Millis(333));
        assert_eq!(clip.audio.duration_ms(), 1000);
        assert_eq!(clip.narration_start_ms(), 333);

        for (sfx_ms, speech_ms, offset) in [(1000, 900, 333), (777, 1234, 901), (2000, 3000, 2500)] {
            let clip = combine_cue_with_speech(&at(sfx_ms), at(speech_ms), TimingOffset::Millis(offset));
            let expected = if offset <= sfx_ms {
                sfx_ms.max(offset + speech_ms)
            } else {
                offset + speech_ms
            };
            assert_eq!(clip.audio.duration_ms(), expected);
            assert_eq!(clip.narration_start_ms(), offset);
        }
    }

    #[test]
    fn test_speech_conformed_to_sfx_format() {
        let sfx = AudioBuffer::silent(1000, RATE, 2);
        let speech = AudioBuffer::silent(1000, 24000, 1);
        let clip = combine_cue_with_speech(&sfx, speech, TimingOffset::None);
        assert_eq!(clip.audio.channels(), 2);
        assert_eq!(clip.audio.duration_ms(), 2000);
    }
}
