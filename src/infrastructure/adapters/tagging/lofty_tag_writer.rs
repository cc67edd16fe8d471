//! Lofty Tag Writer - 广播元数据与同步歌词
//!
//! - WAV: ID3v2（RIFF INFO 无法保存自定义键），自定义键写为 TXXX
//! - Ogg Opus: Vorbis Comments，在已有注释基础上修改，保留 R128 增益
//! - 其余格式：记录警告并跳过

use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::AudioFile;
use lofty::iff::wav::WavFile;
use lofty::ogg::{OpusFile, VorbisComments};
use lofty::tag::{Accessor, TagExt};
use std::fs::File;
use std::path::Path;

use crate::application::ports::{
    AudioFormat, BroadcastMetadata, TagError, TagOutcome, TagWriterPort,
};

/// 同步歌词类型固定为 "2"
pub const SYNCHRONIZED_LYRICS_TYPE: &str = "2";

#[derive(Debug, Clone, Default)]
pub struct LoftyTagWriter;

impl LoftyTagWriter {
    pub fn new() -> Self {
        Self
    }

    fn write_wav(&self, path: &Path, metadata: &BroadcastMetadata) -> Result<(), TagError> {
        let mut file = File::open(path).map_err(|e| TagError::ReadError(e.to_string()))?;
        let wav = WavFile::read_from(&mut file, ParseOptions::new())
            .map_err(|e| TagError::ReadError(e.to_string()))?;
        drop(file);

        let mut tag = wav.id3v2().cloned().unwrap_or_default();

        tag.set_title(metadata.title.clone());
        if let Some(artist) = &metadata.artist {
            tag.set_artist(artist.clone());
        }
        if let Some(album) = &metadata.album {
            tag.set_album(album.clone());
        }
        if let Some(comment) = &metadata.comment {
            tag.set_comment(comment.clone());
        }
        tag.set_year(metadata.year());

        for (key, value) in custom_fields(metadata) {
            tag.insert_user_text(key, value);
        }

        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| TagError::WriteError(e.to_string()))
    }

    fn write_opus(&self, path: &Path, metadata: &BroadcastMetadata) -> Result<(), TagError> {
        let mut file = File::open(path).map_err(|e| TagError::ReadError(e.to_string()))?;
        let opus = OpusFile::read_from(&mut file, ParseOptions::new())
            .map_err(|e| TagError::ReadError(e.to_string()))?;
        drop(file);

        let mut tag: VorbisComments = opus.vorbis_comments().clone();

        tag.set_title(metadata.title.clone());
        if let Some(artist) = &metadata.artist {
            tag.set_artist(artist.clone());
        }
        if let Some(album) = &metadata.album {
            tag.set_album(album.clone());
        }
        if let Some(comment) = &metadata.comment {
            tag.set_comment(comment.clone());
        }

        for (key, value) in custom_fields(metadata) {
            tag.insert(key, value);
        }

        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| TagError::WriteError(e.to_string()))
    }
}

/// 两种容器共用的自定义键
fn custom_fields(metadata: &BroadcastMetadata) -> Vec<(String, String)> {
    let mut fields = vec![
        ("date".to_string(), metadata.date()),
        (
            "SynchronizedLyricsText".to_string(),
            metadata.synchronized_lyrics.clone(),
        ),
        (
            "SynchronizedLyricsType".to_string(),
            SYNCHRONIZED_LYRICS_TYPE.to_string(),
        ),
        (
            "SynchronizedLyricsDescription".to_string(),
            metadata.lyrics_description.clone(),
        ),
    ];
    if let Some(subtitle) = &metadata.subtitle {
        fields.push(("subtitle".to_string(), subtitle.clone()));
    }
    if let Some(source) = &metadata.source {
        fields.push(("source".to_string(), source.clone()));
    }
    fields.extend(metadata.gain_tags.iter().cloned());
    fields
}

impl TagWriterPort for LoftyTagWriter {
    fn write(
        &self,
        path: &Path,
        format: AudioFormat,
        metadata: &BroadcastMetadata,
    ) -> Result<TagOutcome, TagError> {
        match format {
            AudioFormat::Wav => self.write_wav(path, metadata)?,
            AudioFormat::Opus => self.write_opus(path, metadata)?,
            other => {
                tracing::warn!(
                    format = %other,
                    path = %path.display(),
                    "Tag embedding not supported for this format, skipping"
                );
                return Ok(TagOutcome::Skipped);
            }
        }

        tracing::debug!(path = %path.display(), format = %format, "Metadata embedded");
        Ok(TagOutcome::Embedded)
    }
}
