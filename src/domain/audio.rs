//! AudioBuffer - 解码后的 PCM 音频
//!
//! 交错存储的 f32 样本，所有时间运算以毫秒为单位换算为帧。
//! 混音链路中的所有片段在进入时间线之前都会被统一到同一工作格式
//! （采样率 + 声道数），因此拼接/叠加不需要再做格式协商。

/// 解码后的 PCM 音频（交错 f32）
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// 从交错样本创建
    ///
    /// 尾部不足一帧的样本会被丢弃
    pub fn from_interleaved(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            samples,
            sample_rate: sample_rate.max(1),
            channels,
        }
    }

    /// 空缓冲
    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self::from_interleaved(Vec::new(), sample_rate, channels)
    }

    /// 指定时长的静音
    pub fn silent(duration_ms: u64, sample_rate: u32, channels: u16) -> Self {
        let mut buffer = Self::empty(sample_rate, channels);
        let frames = buffer.ms_to_frames(duration_ms);
        buffer.samples = vec![0.0; frames * buffer.channels as usize];
        buffer
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// 帧数
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 时长（毫秒，四舍五入）
    pub fn duration_ms(&self) -> u64 {
        self.frames_to_ms(self.frames())
    }

    /// 毫秒换算为帧（四舍五入）
    ///
    /// 两个方向都取最近值，1 ms 不是整数帧的采样率下往返换算也不丢失
    pub fn ms_to_frames(&self, ms: u64) -> usize {
        ((ms as u128 * self.sample_rate as u128 + 500) / 1000) as usize
    }

    pub fn frames_to_ms(&self, frames: usize) -> u64 {
        let rate = self.sample_rate as u128;
        ((frames as u128 * 1000 + rate / 2) / rate) as u64
    }

    fn same_format(&self, other: &AudioBuffer) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }

    /// 在末尾追加另一段音频（格式不一致时先转换）
    pub fn append(&mut self, other: &AudioBuffer) {
        if self.same_format(other) {
            self.samples.extend_from_slice(&other.samples);
        } else {
            let converted = other.clone().conform(self.sample_rate, self.channels);
            self.samples.extend_from_slice(&converted.samples);
        }
    }

    /// 拼接，返回新缓冲
    pub fn concat(mut self, other: &AudioBuffer) -> Self {
        self.append(other);
        self
    }

    /// 用静音延长到至少 `frames` 帧
    pub fn pad_to_frames(&mut self, frames: usize) {
        let wanted = frames * self.channels as usize;
        if self.samples.len() < wanted {
            self.samples.resize(wanted, 0.0);
        }
    }

    /// 截断到最多 `frames` 帧
    pub fn truncate_frames(&mut self, frames: usize) {
        self.samples.truncate(frames * self.channels as usize);
    }

    /// 从第 `position` 帧开始叠加另一段音频
    ///
    /// 与 pydub 的 overlay 语义一致：结果长度始终等于自身长度，
    /// 超出部分被丢弃，不会延长缓冲。
    pub fn overlay_at_frame(&mut self, other: &AudioBuffer, position: usize) {
        let owned;
        let other = if self.same_format(other) {
            other
        } else {
            owned = other.clone().conform(self.sample_rate, self.channels);
            &owned
        };

        let start = position * self.channels as usize;
        if start >= self.samples.len() {
            return;
        }
        for (dst, src) in self.samples[start..].iter_mut().zip(other.samples.iter()) {
            *dst += *src;
        }
    }

    /// 从 `position_ms` 开始叠加
    pub fn overlay_at_ms(&mut self, other: &AudioBuffer, position_ms: u64) {
        let position = self.ms_to_frames(position_ms);
        self.overlay_at_frame(other, position);
    }

    /// 增益（dB）
    pub fn apply_gain_db(&mut self, gain_db: f64) {
        if gain_db == 0.0 {
            return;
        }
        let factor = db_to_amplitude(gain_db) as f32;
        for sample in &mut self.samples {
            *sample *= factor;
        }
    }

    /// 线性淡入
    pub fn fade_in_ms(&mut self, duration_ms: u64) {
        let fade_frames = self.ms_to_frames(duration_ms).min(self.frames());
        if fade_frames == 0 {
            return;
        }
        let channels = self.channels as usize;
        for frame in 0..fade_frames {
            let gain = frame as f32 / fade_frames as f32;
            for ch in 0..channels {
                self.samples[frame * channels + ch] *= gain;
            }
        }
    }

    /// 线性淡出
    pub fn fade_out_ms(&mut self, duration_ms: u64) {
        let total = self.frames();
        let fade_frames = self.ms_to_frames(duration_ms).min(total);
        if fade_frames == 0 {
            return;
        }
        let channels = self.channels as usize;
        let start = total - fade_frames;
        for i in 0..fade_frames {
            let gain = 1.0 - (i + 1) as f32 / fade_frames as f32;
            let frame = start + i;
            for ch in 0..channels {
                self.samples[frame * channels + ch] *= gain;
            }
        }
    }

    /// 峰值（线性）
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// 峰值（dBFS），静音时返回 None
    pub fn peak_dbfs(&self) -> Option<f64> {
        let peak = self.peak();
        if peak <= 0.0 {
            None
        } else {
            Some(20.0 * (peak as f64).log10())
        }
    }

    /// 峰值归一化：把峰值调整到 `-headroom_db` dBFS
    pub fn normalize_peak(&mut self, headroom_db: f64) {
        if let Some(peak_db) = self.peak_dbfs() {
            self.apply_gain_db(-headroom_db - peak_db);
        }
    }

    /// 转换到指定的采样率和声道数
    pub fn conform(self, sample_rate: u32, channels: u16) -> Self {
        let remixed = self.remix(channels.max(1));
        remixed.resample(sample_rate.max(1))
    }

    /// 声道转换
    ///
    /// 单声道复制到所有声道；其余情况先下混为单声道再展开
    fn remix(self, channels: u16) -> Self {
        if self.channels == channels {
            return self;
        }
        let from = self.channels as usize;
        let to = channels as usize;
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * to);

        for frame in self.samples.chunks_exact(from) {
            if to == 1 {
                out.push(frame.iter().sum::<f32>() / from as f32);
            } else if from == 1 {
                out.extend(std::iter::repeat(frame[0]).take(to));
            } else {
                let mono = frame.iter().sum::<f32>() / from as f32;
                out.extend(std::iter::repeat(mono).take(to));
            }
        }

        Self {
            samples: out,
            sample_rate: self.sample_rate,
            channels,
        }
    }

    /// 简单线性重采样
    fn resample(self, to_rate: u32) -> Self {
        if self.sample_rate == to_rate || self.samples.is_empty() {
            return Self {
                sample_rate: to_rate,
                ..self
            };
        }

        let ratio = to_rate as f64 / self.sample_rate as f64;
        let channel_count = self.channels as usize;
        let frame_count = self.frames();
        let new_frame_count = (frame_count as f64 * ratio).round() as usize;
        let mut resampled = Vec::with_capacity(new_frame_count * channel_count);

        for i in 0..new_frame_count {
            let src_pos = i as f64 / ratio;
            let src_idx = src_pos as usize;
            let frac = src_pos - src_idx as f64;

            for ch in 0..channel_count {
                let idx0 = src_idx.min(frame_count - 1) * channel_count + ch;
                let idx1 = (src_idx + 1).min(frame_count - 1) * channel_count + ch;

                let s0 = self.samples[idx0];
                let s1 = self.samples[idx1];

                // 线性插值
                resampled.push(s0 + (s1 - s0) * frac as f32);
            }
        }

        Self {
            samples: resampled,
            sample_rate: to_rate,
            channels: self.channels,
        }
    }
}

/// dB 转线性幅度
pub fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(ms: u64, value: f32) -> AudioBuffer {
        AudioBuffer::from_interleaved(vec![value; ms as usize], 1000, 1)
    }

    #[test]
    fn test_ms_frames_round_trip_at_44100() {
        let buffer = AudioBuffer::empty(44100, 2);
        for ms in 0..2000 {
            assert_eq!(buffer.frames_to_ms(buffer.ms_to_frames(ms)), ms);
        }
        assert_eq!(buffer.ms_to_frames(333), 14685);
        assert_eq!(AudioBuffer::silent(333, 44100, 2).duration_ms(), 333);
    }

    #[test]
    fn test_silent_duration() {
        let buffer = AudioBuffer::silent(2500, 48000, 2);
        assert_eq!(buffer.frames(), 120_000);
        assert_eq!(buffer.duration_ms(), 2500);
    }

    #[test]
    fn test_concat_adds_lengths() {
        let a = AudioBuffer::silent(2000, 48000, 2);
        let b = AudioBuffer::silent(3000, 48000, 2);
        assert_eq!(a.concat(&b).duration_ms(), 5000);
    }

    #[test]
    fn test_overlay_never_extends() {
        let mut base = tone(100, 0.1);
        let top = tone(300, 0.2);
        base.overlay_at_ms(&top, 50);
        assert_eq!(base.duration_ms(), 100);
        assert!((base.samples()[10] - 0.1).abs() < 1e-6);
        assert!((base.samples()[60] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_overlay_past_end_is_noop() {
        let mut base = tone(100, 0.1);
        base.overlay_at_ms(&tone(10, 0.5), 500);
        assert!(base.samples().iter().all(|s| (*s - 0.1).abs() < 1e-6));
    }

    #[test]
    fn test_gain_and_peak_normalize() {
        let mut buffer = tone(10, 0.25);
        buffer.normalize_peak(0.0);
        assert!((buffer.peak() - 1.0).abs() < 1e-4);

        buffer.apply_gain_db(-6.0206);
        assert!((buffer.peak() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_normalize_silence_is_noop() {
        let mut buffer = AudioBuffer::silent(10, 1000, 1);
        buffer.normalize_peak(0.1);
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn test_fades() {
        let mut buffer = tone(100, 1.0);
        buffer.fade_in_ms(10);
        buffer.fade_out_ms(10);
        assert_eq!(buffer.samples()[0], 0.0);
        assert!((buffer.samples()[50] - 1.0).abs() < 1e-6);
        assert_eq!(buffer.samples()[99], 0.0);
        assert_eq!(buffer.duration_ms(), 100);
    }

    #[test]
    fn test_conform_mono_to_stereo_and_rate() {
        let mono = AudioBuffer::silent(1000, 24000, 1);
        let stereo = mono.conform(48000, 2);
        assert_eq!(stereo.channels(), 2);
        assert_eq!(stereo.sample_rate(), 48000);
        assert_eq!(stereo.duration_ms(), 1000);
    }

    #[test]
    fn test_stereo_downmix() {
        let stereo = AudioBuffer::from_interleaved(vec![0.2, 0.4, 0.2, 0.4], 1000, 2);
        let mono = stereo.conform(1000, 1);
        assert_eq!(mono.frames(), 2);
        assert!((mono.samples()[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_partial_frame_dropped() {
        let buffer = AudioBuffer::from_interleaved(vec![0.0; 5], 1000, 2);
        assert_eq!(buffer.frames(), 2);
    }
}
