//! Assemble Commands

use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::application::synthesis::SynthesisReport;
use crate::domain::{BedPlacement, LyricsEntry};

/// 生成一期广播
#[derive(Debug, Clone)]
pub struct AssembleBroadcast {
    /// 带提示符的完整脚本
    pub script: String,
    /// 覆盖输出模板的目标路径
    pub output: Option<PathBuf>,
}

/// 生成结果
///
/// `metadata` 供上传、指纹提交等下游使用，不会反过来影响生成过程
#[derive(Debug, Clone)]
pub struct BroadcastArtifact {
    pub run_id: Uuid,
    pub path: PathBuf,
    pub duration_ms: u64,
    pub lyrics: Vec<LyricsEntry>,
    pub bed: BedPlacement,
    pub gain_tags: Vec<(String, String)>,
    pub metadata: BTreeMap<String, String>,
    pub synthesis: SynthesisReport,
}
