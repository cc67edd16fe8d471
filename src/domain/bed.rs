//! 背景音乐合成
//!
//! 在文章区间（第一个 ArticleStart 旁白起点 → Outro 片段起点）下铺设背景音乐：
//! 循环/截断到区间长度，应用增益和淡入淡出，再叠加到时间线上。

use super::audio::AudioBuffer;
use super::errors::DomainError;
use super::mixer::ArticleSpan;

/// 背景音乐参数
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BedSpec {
    pub gain_db: f64,
    /// 0 表示不淡入
    pub fade_in_ms: u64,
    /// 0 表示不淡出
    pub fade_out_ms: u64,
    /// 相对文章起点的偏移，可为负
    pub offset_ms: i64,
}

/// 背景音乐铺设结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedPlacement {
    /// 缺少背景音乐或区间边界，跳过
    Skipped,
    Applied {
        start_ms: u64,
        duration_ms: u64,
    },
}

/// 循环拼接直到不短于 `frames`，再截断到正好 `frames`
pub fn loop_to_frames(clip: &AudioBuffer, frames: usize) -> AudioBuffer {
    let mut looped = AudioBuffer::empty(clip.sample_rate(), clip.channels());
    if clip.is_empty() {
        looped.pad_to_frames(frames);
        return looped;
    }
    while looped.frames() < frames {
        looped.append(clip);
    }
    looped.truncate_frames(frames);
    looped
}

/// 把背景音乐叠加到时间线上
///
/// 叠加不改变时间线总长度
pub fn compose_bed(
    timeline: &mut AudioBuffer,
    bed: Option<&AudioBuffer>,
    spec: &BedSpec,
    span: ArticleSpan,
) -> Result<BedPlacement, DomainError> {
    let (bed, start_ms, end_ms) = match (bed, span.start_ms, span.end_ms) {
        (Some(bed), Some(start), Some(end)) => (bed, start, end),
        _ => return Ok(BedPlacement::Skipped),
    };

    if end_ms < start_ms {
        return Err(DomainError::InvalidArticleSpan { start_ms, end_ms });
    }

    let duration_ms = end_ms - start_ms;
    let bed = bed
        .clone()
        .conform(timeline.sample_rate(), timeline.channels());
    let frames = timeline.ms_to_frames(duration_ms);

    let mut track = loop_to_frames(&bed, frames);
    track.apply_gain_db(spec.gain_db);
    if spec.fade_in_ms > 0 {
        track.fade_in_ms(spec.fade_in_ms);
    }
    if spec.fade_out_ms > 0 {
        track.fade_out_ms(spec.fade_out_ms);
    }

    let adjusted_start = (start_ms as i64).saturating_add(spec.offset_ms).max(0) as u64;
    timeline.overlay_at_ms(&track, adjusted_start);

    Ok(BedPlacement::Applied {
        start_ms: adjusted_start,
        duration_ms: track.duration_ms(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(ms: u64, value: f32) -> AudioBuffer {
        AudioBuffer::from_interleaved(vec![value; ms as usize], 1000, 1)
    }

    fn span(start: u64, end: u64) -> ArticleSpan {
        ArticleSpan {
            start_ms: Some(start),
            end_ms: Some(end),
        }
    }

    #[test]
    fn test_loop_length_is_exact() {
        let clip = AudioBuffer::silent(700, 48000, 2);
        for target_ms in [0u64, 1, 699, 700, 701, 5000, 12_345] {
            let frames = clip.ms_to_frames(target_ms);
            let looped = loop_to_frames(&clip, frames);
            assert_eq!(looped.duration_ms(), target_ms);
        }
    }

    #[test]
    fn test_bed_overlays_span_only() {
        let mut timeline = constant(1000, 0.0);
        let bed = constant(150, 0.5);
        let placement = compose_bed(&mut timeline, Some(&bed), &BedSpec::default(), span(200, 800)).unwrap();

        assert_eq!(
            placement,
            BedPlacement::Applied {
                start_ms: 200,
                duration_ms: 600
            }
        );
        assert_eq!(timeline.duration_ms(), 1000);
        let samples = timeline.samples();
        assert_eq!(samples[199], 0.0);
        assert!((samples[200] - 0.5).abs() < 1e-6);
        assert!((samples[799] - 0.5).abs() < 1e-6);
        assert_eq!(samples[800], 0.0);
    }

    #[test]
    fn test_bed_gain_and_fades() {
        let mut timeline = constant(1000, 0.0);
        let bed = constant(1000, 1.0);
        let spec = BedSpec {
            gain_db: -6.0206,
            fade_in_ms: 100,
            fade_out_ms: 100,
            offset_ms: 0,
        };
        compose_bed(&mut timeline, Some(&bed), &spec, span(0, 1000)).unwrap();
        let samples = timeline.samples();
        assert_eq!(samples[0], 0.0);
        assert!((samples[500] - 0.5).abs() < 1e-3);
        assert_eq!(samples[999], 0.0);
    }

    #[test]
    fn test_negative_offset_clamped_to_zero() {
        let mut timeline = constant(1000, 0.0);
        let bed = constant(100, 0.5);
        let spec = BedSpec {
            offset_ms: -500,
            ..BedSpec::default()
        };
        let placement = compose_bed(&mut timeline, Some(&bed), &spec, span(200, 400)).unwrap();
        assert_eq!(
            placement,
            BedPlacement::Applied {
                start_ms: 0,
                duration_ms: 200
            }
        );
    }

    #[test]
    fn test_overlay_never_extends_timeline() {
        let mut timeline = constant(1000, 0.0);
        let bed = constant(100, 0.5);
        let spec = BedSpec {
            offset_ms: 900,
            ..BedSpec::default()
        };
        compose_bed(&mut timeline, Some(&bed), &spec, span(0, 600)).unwrap();
        assert_eq!(timeline.duration_ms(), 1000);
    }

    #[test]
    fn test_skipped_without_bed_or_boundaries() {
        let mut timeline = constant(100, 0.0);
        let bed = constant(10, 0.5);
        let spec = BedSpec::default();
        assert_eq!(
            compose_bed(&mut timeline, None, &spec, span(0, 50)).unwrap(),
            BedPlacement::Skipped
        );
        let open_span = ArticleSpan {
            start_ms: Some(10),
            end_ms: None,
        };
        assert_eq!(
            compose_bed(&mut timeline, Some(&bed), &spec, open_span).unwrap(),
            BedPlacement::Skipped
        );
    }

    #[test]
    fn test_reversed_span_is_fatal() {
        let mut timeline = constant(100, 0.0);
        let bed = constant(10, 0.5);
        assert_eq!(
            compose_bed(&mut timeline, Some(&bed), &BedSpec::default(), span(80, 20)),
            Err(DomainError::InvalidArticleSpan {
                start_ms: 80,
                end_ms: 20
            })
        );
    }
}
