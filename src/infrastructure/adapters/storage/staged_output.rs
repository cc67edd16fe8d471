//! Staged Output - 文件系统成品输出
//!
//! 暂存区是输出目录下的隐藏临时目录，与最终文件在同一文件系统上，
//! 因此最后一步的 rename 是原子的。

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;

use crate::application::ports::{AudioFormat, OutputError, OutputStorePort, StagingArea};

/// 展开输出文件名模板
///
/// 支持 `%Y% %m% %d% %H% %M% %S%` 日期占位符和 `%EXT%` 扩展名占位符
pub fn expand_file_template(template: &str, extension: &str, now: DateTime<Local>) -> String {
    [
        ("%Y%", "%Y"),
        ("%m%", "%m"),
        ("%d%", "%d"),
        ("%H%", "%H"),
        ("%M%", "%M"),
        ("%S%", "%S"),
    ]
    .iter()
    .fold(template.to_string(), |name, (placeholder, spec)| {
        name.replace(placeholder, &now.format(spec).to_string())
    })
    .replace("%EXT%", extension)
}

/// 文件系统输出
pub struct StagedOutputStore {
    dir: PathBuf,
    file_template: String,
}

impl StagedOutputStore {
    pub fn new(dir: impl AsRef<Path>, file_template: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            file_template: file_template.into(),
        }
    }
}

#[async_trait]
impl OutputStorePort for StagedOutputStore {
    async fn begin(&self) -> Result<Box<dyn StagingArea>, OutputError> {
        let staging_failed = |e: std::io::Error| OutputError::StagingFailed {
            dir: self.dir.display().to_string(),
            message: e.to_string(),
        };

        fs::create_dir_all(&self.dir).await.map_err(staging_failed)?;

        let temp = tempfile::Builder::new()
            .prefix(".bulletin-")
            .tempdir_in(&self.dir)
            .map_err(staging_failed)?;

        tracing::debug!(staging = %temp.path().display(), "Staging area created");

        Ok(Box::new(StagedDir {
            temp,
            dir: self.dir.clone(),
            file_template: self.file_template.clone(),
        }))
    }
}

/// 输出目录下的隐藏临时目录
struct StagedDir {
    temp: TempDir,
    dir: PathBuf,
    file_template: String,
}

#[async_trait]
impl StagingArea for StagedDir {
    fn path_for(&self, file_name: &str) -> PathBuf {
        self.temp.path().join(file_name)
    }

    async fn persist(
        self: Box<Self>,
        staged: &Path,
        format: AudioFormat,
        destination: Option<&Path>,
    ) -> Result<PathBuf, OutputError> {
        let target = match destination {
            Some(path) => path.to_path_buf(),
            None => self.dir.join(expand_file_template(
                &self.file_template,
                format.extension(),
                Local::now(),
            )),
        };

        let persist_failed = |message: String| OutputError::PersistFailed {
            from: staged.display().to_string(),
            to: target.display().to_string(),
            message,
        };

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| persist_failed(e.to_string()))?;
        }

        // 显式指定的目标可能在其他文件系统上，rename 失败时退回复制
        if let Err(rename_err) = fs::rename(staged, &target).await {
            tracing::debug!(error = %rename_err, "Rename failed, copying instead");
            copy_into_place(staged, &target)
                .await
                .map_err(|e| persist_failed(e.to_string()))?;
        }

        tracing::info!(path = %target.display(), "Broadcast written");
        Ok(target)
    }
}

/// 先复制到目标目录下的临时文件，再 rename 到目标
///
/// 目标路径上不会出现写了一半的文件；失败时临时文件随 drop 删除
async fn copy_into_place(source: &Path, target: &Path) -> std::io::Result<()> {
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let temp = tempfile::Builder::new()
        .prefix(".bulletin-")
        .tempfile_in(parent)?;
    fs::copy(source, temp.path()).await?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_expand_file_template() {
        let now = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(
            expand_file_template("news-%Y%%m%%d%-%H%%M%%S%.%EXT%", "opus", now),
            "news-20240307-090502.opus"
        );
        assert_eq!(expand_file_template("livenews.%EXT%", "wav", now), "livenews.wav");
    }

    #[tokio::test]
    async fn test_persist_moves_file_and_removes_staging() {
        let dir = tempdir().unwrap();
        let store = StagedOutputStore::new(dir.path(), "out.%EXT%");

        let staging = store.begin().await.unwrap();
        let staged = staging.path_for("mix.wav");
        let staging_dir = staged.parent().unwrap().to_path_buf();
        assert!(staging_dir.file_name().unwrap().to_string_lossy().starts_with(".bulletin-"));

        fs::write(&staged, b"RIFF").await.unwrap();
        let path = staging.persist(&staged, AudioFormat::Wav, None).await.unwrap();

        assert_eq!(path, dir.path().join("out.wav"));
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");
        assert!(!staging_dir.exists());
    }

    #[tokio::test]
    async fn test_dropped_staging_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let store = StagedOutputStore::new(dir.path().join("out"), "out.%EXT%");

        {
            let staging = store.begin().await.unwrap();
            fs::write(staging.path_for("mix.wav"), b"partial").await.unwrap();
        }

        let leftovers = std::fs::read_dir(dir.path().join("out")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_explicit_destination() {
        let dir = tempdir().unwrap();
        let store = StagedOutputStore::new(dir.path(), "ignored.%EXT%");
        let target = dir.path().join("nested").join("custom.opus");

        let staging = store.begin().await.unwrap();
        let staged = staging.path_for("tagged.opus");
        fs::write(&staged, b"OggS").await.unwrap();

        let path = staging
            .persist(&staged, AudioFormat::Opus, Some(&target))
            .await
            .unwrap();
        assert_eq!(path, target);
        assert!(target.exists());
    }

    #[tokio::test]
    async fn test_copy_fallback_goes_through_temp_file() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.wav");
        fs::write(&source, b"RIFF").await.unwrap();

        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let target = out.join("final.wav");

        copy_into_place(&source, &target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"RIFF");

        let names: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["final.wav".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_copy_leaves_no_partial_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("final.wav");

        let result = copy_into_place(&dir.path().join("missing.wav"), &target).await;
        assert!(result.is_err());
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
