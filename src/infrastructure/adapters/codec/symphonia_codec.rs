//! Symphonia Codec - 基于 symphonia 的解码 + WAV / Ogg Opus 编码
//!
//! 支持：
//! - 解码：WAV / MP3 / FLAC（合成服务返回值、音效、背景音乐）
//! - 编码：WAV (16-bit PCM)、Opus (OGG 容器)

use ogg::writing::PacketWriter;
use opus::{Application, Channels, Encoder};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::{AudioCodecPort, AudioFormat, CodecError, EncodeConfig};
use crate::domain::AudioBuffer;

/// Ogg Opus 的 vendor 字符串
const OPUS_VENDOR: &str = "bulletin";

/// Symphonia 编解码器
#[derive(Debug, Clone, Default)]
pub struct SymphoniaCodec;

impl SymphoniaCodec {
    pub fn new() -> Self {
        Self
    }
}

impl AudioCodecPort for SymphoniaCodec {
    fn decode(&self, data: &[u8], format: AudioFormat) -> Result<AudioBuffer, CodecError> {
        if !self.can_decode(format) {
            return Err(CodecError::UnsupportedFormat(format!(
                "cannot decode {}",
                format
            )));
        }
        decode_with_hint(data, format.extension())
    }

    fn encode(&self, audio: &AudioBuffer, config: &EncodeConfig) -> Result<Vec<u8>, CodecError> {
        match config.format {
            AudioFormat::Wav => Ok(encode_wav(audio)),
            AudioFormat::Opus => encode_opus(audio, config.bitrate),
            other => Err(CodecError::UnsupportedFormat(format!(
                "cannot encode {}",
                other
            ))),
        }
    }

    fn can_decode(&self, format: AudioFormat) -> bool {
        matches!(format, AudioFormat::Wav | AudioFormat::Mp3 | AudioFormat::Flac)
    }

    fn can_encode(&self, format: AudioFormat) -> bool {
        matches!(format, AudioFormat::Wav | AudioFormat::Opus)
    }
}

/// 使用 symphonia 解码为交错 f32 PCM
fn decode_with_hint(data: &[u8], extension: &str) -> Result<AudioBuffer, CodecError> {
    if data.is_empty() {
        return Err(CodecError::InvalidInput("empty audio data".to_string()));
    }

    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension);

    let detected = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| CodecError::DecodingError(format!("Format detection failed: {}", e)))?;

    let mut format = detected.format;

    let track = format
        .default_track()
        .ok_or_else(|| CodecError::DecodingError("No audio track found".to_string()))?;

    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| CodecError::DecodingError(format!("Decoder creation failed: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(CodecError::DecodingError(format!(
                    "Packet read error: {}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Decode error (skipping packet): {}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count() as u16);

        let num_frames = decoded.frames();
        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let actual_samples = num_frames * spec.channels.count();
        samples.extend(&sample_buf.samples()[..actual_samples]);
    }

    let sample_rate =
        sample_rate.ok_or_else(|| CodecError::DecodingError("Unknown sample rate".to_string()))?;
    let channels = channels
        .filter(|c| *c > 0)
        .ok_or_else(|| CodecError::DecodingError("Unknown channel count".to_string()))?;

    Ok(AudioBuffer::from_interleaved(samples, sample_rate, channels))
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// 将 PCM 编码为 16-bit WAV
pub fn encode_wav(audio: &AudioBuffer) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let num_channels = audio.channels();
    let sample_rate = audio.sample_rate();
    let byte_rate = sample_rate * num_channels as u32 * (bits_per_sample / 8) as u32;
    let block_align = num_channels * (bits_per_sample / 8);

    let data_size = audio.samples().len() * 2;
    let file_size = 36 + data_size;

    let mut wav = Vec::with_capacity(44 + data_size);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(file_size as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&num_channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_size as u32).to_le_bytes());
    for &sample in audio.samples() {
        wav.extend_from_slice(&to_i16(sample).to_le_bytes());
    }

    wav
}

/// Opus 支持的采样率: 8000, 12000, 16000, 24000, 48000
fn opus_compatible_rate(sample_rate: u32) -> u32 {
    match sample_rate {
        8000 | 12000 | 16000 | 24000 | 48000 => sample_rate,
        r if r <= 8000 => 8000,
        r if r <= 12000 => 12000,
        r if r <= 16000 => 16000,
        r if r <= 24000 => 24000,
        _ => 48000,
    }
}

/// 将 PCM 编码为 Opus (OGG 容器, RFC 7845)
pub fn encode_opus(audio: &AudioBuffer, bitrate: u32) -> Result<Vec<u8>, CodecError> {
    let sample_rate = opus_compatible_rate(audio.sample_rate());
    let channel_count: usize = if audio.channels() == 1 { 1 } else { 2 };
    let audio = audio.clone().conform(sample_rate, channel_count as u16);

    let channels = if channel_count == 1 {
        Channels::Mono
    } else {
        Channels::Stereo
    };

    // 混音包含音乐，使用 Audio 模式
    let mut encoder = Encoder::new(sample_rate, channels, Application::Audio)
        .map_err(|e| CodecError::EncodingError(format!("Failed to create Opus encoder: {}", e)))?;

    encoder
        .set_bitrate(opus::Bitrate::Bits(bitrate as i32))
        .map_err(|e| CodecError::EncodingError(format!("Failed to set bitrate: {}", e)))?;

    let pre_skip = encoder.get_lookahead().map(|l| l as u16).unwrap_or(312);

    let pcm: Vec<i16> = audio.samples().iter().map(|&s| to_i16(s)).collect();

    // 20ms 帧
    let frame_size = (sample_rate as usize * 20) / 1000;
    let samples_per_frame = frame_size * channel_count;

    // granule position 以 48kHz 样本计
    let granule_scale = 48000 / sample_rate as u64;
    let pre_skip_48k = pre_skip as u64 * granule_scale;
    let end_granule = pre_skip_48k + audio.frames() as u64 * granule_scale;

    let mut ogg_data = Vec::new();
    {
        let mut packet_writer = PacketWriter::new(&mut ogg_data);

        packet_writer
            .write_packet(
                create_opus_head(channel_count as u8, audio.sample_rate(), pre_skip_48k as u16),
                0,
                ogg::PacketWriteEndInfo::EndPage,
                0,
            )
            .map_err(|e| CodecError::EncodingError(format!("Failed to write Opus head: {}", e)))?;

        packet_writer
            .write_packet(create_opus_tags(), 0, ogg::PacketWriteEndInfo::EndPage, 0)
            .map_err(|e| CodecError::EncodingError(format!("Failed to write Opus tags: {}", e)))?;

        let mut output_buf = vec![0u8; 4000];
        let mut frames: Vec<Vec<i16>> = pcm
            .chunks(samples_per_frame)
            .map(|chunk| {
                let mut frame = chunk.to_vec();
                frame.resize(samples_per_frame, 0);
                frame
            })
            .collect();

        // 额外的静音帧把编码器延迟中的样本推出来
        let flush_frames = (pre_skip as usize).div_ceil(frame_size).max(1);
        frames.extend(std::iter::repeat(vec![0i16; samples_per_frame]).take(flush_frames));

        let total = frames.len();
        let mut consumed: u64 = 0;
        for (i, frame) in frames.iter().enumerate() {
            let encoded_len = encoder
                .encode(frame, &mut output_buf)
                .map_err(|e| CodecError::EncodingError(format!("Opus encode failed: {}", e)))?;

            consumed += frame_size as u64 * granule_scale;
            // 最后一页的 granule 指明有效样本终点，解码端据此裁掉填充
            let granule = (pre_skip_48k + consumed).min(end_granule);
            let end_info = if i + 1 == total {
                ogg::PacketWriteEndInfo::EndStream
            } else {
                ogg::PacketWriteEndInfo::NormalPacket
            };

            packet_writer
                .write_packet(output_buf[..encoded_len].to_vec(), 0, end_info, granule)
                .map_err(|e| {
                    CodecError::EncodingError(format!("Failed to write Opus packet: {}", e))
                })?;
        }
    }

    Ok(ogg_data)
}

/// 创建 Opus Head 包 (RFC 7845)
fn create_opus_head(channels: u8, input_sample_rate: u32, pre_skip: u16) -> Vec<u8> {
    let mut head = Vec::with_capacity(19);
    head.extend_from_slice(b"OpusHead");
    head.push(1); // Version
    head.push(channels);
    head.extend_from_slice(&pre_skip.to_le_bytes());
    head.extend_from_slice(&input_sample_rate.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes()); // Output gain
    head.push(0); // Channel mapping family
    head
}

/// 创建 Opus Tags 包（无用户注释，元数据由后续步骤写入）
fn create_opus_tags() -> Vec<u8> {
    let mut tags = Vec::new();
    tags.extend_from_slice(b"OpusTags");
    tags.extend_from_slice(&(OPUS_VENDOR.len() as u32).to_le_bytes());
    tags.extend_from_slice(OPUS_VENDOR.as_bytes());
    tags.extend_from_slice(&0u32.to_le_bytes());
    tags
}
