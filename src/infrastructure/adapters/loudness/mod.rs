//! Loudness Adapter - 基于 ffmpeg loudnorm 的响度测量

mod ffmpeg_loudnorm;

pub use ffmpeg_loudnorm::{
    build_analysis_args, build_remux_args, parse_loudnorm_report, FfmpegLoudnessAnalyzer,
    FfmpegLoudnessConfig,
};
