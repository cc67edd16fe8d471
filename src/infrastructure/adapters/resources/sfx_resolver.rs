//! 音效 / 背景音乐文件解析
//!
//! 规范路径不存在时，在同目录查找 `<stem>_<number><suffix>` 形式的备选文件并随机选一个。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::ports::{
    AudioCodecPort, AudioFormat, AudioResourcePort, ResourceError,
};
use crate::config::{BedConfig, SfxConfig};
use crate::domain::{AudioBuffer, CueBank, CueClip, CueKind, DomainError, TimingOffset};

/// 解析资源路径
///
/// 规范路径存在则直接使用，否则随机选择一个编号备选
pub fn resolve_resource(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let candidates = find_alternates(path);
    if candidates.is_empty() {
        return None;
    }
    let idx = fastrand::usize(..candidates.len());
    candidates.into_iter().nth(idx)
}

/// 查找 `<stem>_<number><suffix>` 形式的兄弟文件（按文件名排序）
pub fn find_alternates(path: &Path) -> Vec<PathBuf> {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };
    let suffix = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let prefix = format!("{}_", stem);
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|candidate| candidate.is_file())
        .filter(|candidate| {
            candidate
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|name| name.strip_prefix(prefix.as_str()))
                .and_then(|rest| rest.strip_suffix(suffix.as_str()))
                .map_or(false, |number| {
                    !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
                })
        })
        .collect();
    matches.sort();
    matches
}

/// 基于文件系统的音效库
pub struct FsAudioResources {
    codec: Arc<dyn AudioCodecPort>,
    cues: Vec<(CueKind, Option<PathBuf>, TimingOffset)>,
    bed: Option<PathBuf>,
}

impl FsAudioResources {
    /// 由配置构建（偏移量在这里解析一次）
    pub fn from_config(
        sfx: &SfxConfig,
        bed: &BedConfig,
        codec: Arc<dyn AudioCodecPort>,
    ) -> Result<Self, DomainError> {
        let cues = CueKind::ALL
            .into_iter()
            .map(|kind| {
                let cue = sfx.cue(kind);
                Ok((kind, cue.path.clone(), cue.timing_offset()?))
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(Self {
            codec,
            cues,
            bed: bed.path.clone(),
        })
    }

    fn load_file(
        &self,
        path: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> Result<AudioBuffer, ResourceError> {
        let data = std::fs::read(path).map_err(|e| ResourceError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let format = AudioFormat::from_path(path).unwrap_or_default();
        let audio = self
            .codec
            .decode(&data, format)
            .map_err(|source| ResourceError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(audio.conform(sample_rate, channels))
    }
}

impl AudioResourcePort for FsAudioResources {
    fn load_cues(&self, sample_rate: u32, channels: u16) -> Result<CueBank, ResourceError> {
        let mut bank = CueBank::new();
        for (kind, path, offset) in &self.cues {
            let Some(configured) = path else {
                tracing::debug!(cue = %kind, "No SFX configured, cue will be skipped");
                continue;
            };
            let Some(resolved) = resolve_resource(configured) else {
                tracing::warn!(
                    cue = %kind,
                    path = %configured.display(),
                    "SFX file not found, cue will be skipped"
                );
                continue;
            };

            let audio = self.load_file(&resolved, sample_rate, channels)?;
            tracing::debug!(
                cue = %kind,
                path = %resolved.display(),
                duration_ms = audio.duration_ms(),
                offset = %offset,
                "SFX loaded"
            );
            bank.insert(
                *kind,
                CueClip {
                    audio,
                    offset: *offset,
                },
            );
        }
        Ok(bank)
    }

    fn load_bed(
        &self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Option<AudioBuffer>, ResourceError> {
        let Some(configured) = &self.bed else {
            return Ok(None);
        };
        let Some(resolved) = resolve_resource(configured) else {
            tracing::warn!(path = %configured.display(), "Bed file not found, skipping bed");
            return Ok(None);
        };
        let audio = self.load_file(&resolved, sample_rate, channels)?;
        tracing::debug!(path = %resolved.display(), duration_ms = audio.duration_ms(), "Bed loaded");
        Ok(Some(audio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SfxCueConfig;
    use crate::infrastructure::adapters::codec::{encode_wav, SymphoniaCodec};

    fn write_wav(path: &Path, ms: u64) {
        std::fs::write(path, encode_wav(&AudioBuffer::silent(ms, 48000, 2))).unwrap();
    }

    #[test]
    fn test_canonical_path_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().join("intro.wav");
        write_wav(&canonical, 10);
        write_wav(&dir.path().join("intro_1.wav"), 10);

        assert_eq!(resolve_resource(&canonical), Some(canonical));
    }

    #[test]
    fn test_numbered_alternates() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["outro_1.wav", "outro_12.wav", "outro_x.wav", "outro_2.mp3", "outro.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let canonical = dir.path().join("outro.wav");
        let alternates = find_alternates(&canonical);
        assert_eq!(
            alternates,
            vec![dir.path().join("outro_1.wav"), dir.path().join("outro_12.wav")]
        );

        let picked = resolve_resource(&canonical).unwrap();
        assert!(alternates.contains(&picked));
    }

    #[test]
    fn test_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_resource(&dir.path().join("bed.wav")), None);
    }

    #[test]
    fn test_load_cues_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let intro = dir.path().join("intro.wav");
        write_wav(&intro, 2000);

        let sfx = SfxConfig {
            intro: SfxCueConfig {
                path: Some(intro),
                offset: "500".into(),
            },
            outro: SfxCueConfig {
                path: Some(dir.path().join("missing.wav")),
                offset: "none".into(),
            },
            ..Default::default()
        };
        let resources =
            FsAudioResources::from_config(&sfx, &BedConfig::default(), Arc::new(SymphoniaCodec::new()))
                .unwrap();

        let bank = resources.load_cues(48000, 2).unwrap();
        assert_eq!(bank.len(), 1);
        let clip = bank.get(CueKind::Intro).unwrap();
        assert_eq!(clip.audio.duration_ms(), 2000);
        assert_eq!(clip.offset, TimingOffset::Millis(500));
        assert!(bank.get(CueKind::Outro).is_none());

        assert!(resources.load_bed(48000, 2).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_resource_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("bed.wav");
        std::fs::write(&bed, b"definitely not a wav").unwrap();

        let resources = FsAudioResources::from_config(
            &SfxConfig::default(),
            &BedConfig {
                path: Some(bed),
                ..Default::default()
            },
            Arc::new(SymphoniaCodec::new()),
        )
        .unwrap();
        assert!(matches!(
            resources.load_bed(48000, 2),
            Err(ResourceError::Decode { .. })
        ));
    }
}
