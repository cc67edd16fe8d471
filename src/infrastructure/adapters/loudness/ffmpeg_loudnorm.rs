//! ffmpeg loudnorm 分析与增益标签复用
//!
//! 分析: ffmpeg -hide_banner -i <in> -af loudnorm=I=..:LRA=..:TP=..:print_format=json -f null -
//! 报告写在 stderr 中，位于单独一行 `{` 与单独一行 `}` 之间。
//!
//! 复用: ffmpeg -hide_banner -y -i <in> -c copy -map_metadata 0 -metadata k=v ... -f <fmt> <out>
//!
//! 使用临时文件而不是管道：WAV 复用器在管道上无法回写头部长度。

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::application::ports::{
    AudioFormat, GainTags, LoudnessAnalyzerPort, LoudnessError, LoudnessMeasurement,
    LoudnessTarget,
};

/// ffmpeg 分析器配置
#[derive(Debug, Clone)]
pub struct FfmpegLoudnessConfig {
    pub ffmpeg_path: PathBuf,
    /// 单次调用超时（秒）
    pub timeout_secs: u64,
}

impl Default for FfmpegLoudnessConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            timeout_secs: 300,
        }
    }
}

/// ffmpeg loudnorm 分析器
pub struct FfmpegLoudnessAnalyzer {
    config: FfmpegLoudnessConfig,
}

impl FfmpegLoudnessAnalyzer {
    pub fn new(config: FfmpegLoudnessConfig) -> Self {
        Self { config }
    }

    /// 运行 ffmpeg，返回 stderr
    async fn run(&self, args: &[String]) -> Result<String, LoudnessError> {
        tracing::debug!(ffmpeg = %self.config.ffmpeg_path.display(), args = ?args, "Running ffmpeg");

        let child = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LoudnessError::LaunchFailed(e.to_string()))?;

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| LoudnessError::Timeout(self.config.timeout_secs))?
        .map_err(|e| LoudnessError::IoError(e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(LoudnessError::ProcessFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: tail(&stderr, 20),
            });
        }
        Ok(stderr)
    }
}

#[async_trait]
impl LoudnessAnalyzerPort for FfmpegLoudnessAnalyzer {
    async fn analyze(
        &self,
        input: &Path,
        target: &LoudnessTarget,
    ) -> Result<LoudnessMeasurement, LoudnessError> {
        let stderr = self.run(&build_analysis_args(input, target)).await?;
        let measurement = parse_loudnorm_report(&stderr)?;

        tracing::info!(
            input_i = measurement.input_i,
            input_tp = measurement.input_tp,
            input_lra = ?measurement.input_lra,
            "Loudness measured"
        );
        Ok(measurement)
    }

    async fn apply_gain_tags(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
        tags: &GainTags,
    ) -> Result<(), LoudnessError> {
        self.run(&build_remux_args(input, output, format, tags))
            .await?;
        tracing::debug!(output = %output.display(), "Gain tags written");
        Ok(())
    }
}

/// 构造分析参数
pub fn build_analysis_args(input: &Path, target: &LoudnessTarget) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-i".into(),
        input.display().to_string(),
        "-af".into(),
        format!(
            "loudnorm=I={}:LRA={}:TP={}:print_format=json",
            target.integrated_lufs, target.lra, target.true_peak_db
        ),
        "-f".into(),
        "null".into(),
        "-".into(),
    ]
}

/// 构造复用参数（流复制，不重新编码）
pub fn build_remux_args(
    input: &Path,
    output: &Path,
    format: AudioFormat,
    tags: &GainTags,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
        "-c".into(),
        "copy".into(),
        "-map_metadata".into(),
        "0".into(),
    ];

    for (key, value) in tags.to_pairs() {
        args.push("-metadata".into());
        args.push(format!("{}={}", key, value));
    }

    args.push("-f".into());
    args.push(format.muxer().into());
    args.push(output.display().to_string());
    args
}

/// 从 stderr 中提取 `{` .. `}` 之间的报告
pub fn parse_loudnorm_report(stderr: &str) -> Result<LoudnessMeasurement, LoudnessError> {
    let mut json = String::new();
    let mut inside = false;
    let mut closed = false;

    for line in stderr.lines() {
        let line = line.trim();
        if !inside && line == "{" {
            inside = true;
            json.push_str(line);
        } else if inside {
            json.push_str(line);
            if line == "}" {
                closed = true;
                break;
            }
        }
    }

    if !closed {
        return Err(LoudnessError::MissingReport);
    }

    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&json)
        .map_err(|e| LoudnessError::MalformedReport(e.to_string()))?;

    let report: BTreeMap<String, String> = raw
        .into_iter()
        .map(|(k, v)| {
            let text = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, text)
        })
        .collect();

    let field = |name: &str| -> Option<f64> { report.get(name).and_then(|v| v.trim().parse().ok()) };

    let input_i = required(&report, "input_i")?;
    let input_tp = required(&report, "input_tp")?;

    Ok(LoudnessMeasurement {
        input_i,
        input_tp,
        input_lra: field("input_lra"),
        input_thresh: field("input_thresh"),
        target_offset: field("target_offset"),
        report,
    })
}

/// 必填字段：必须存在且为有限值（静音输入会得到 -inf）
fn required(report: &BTreeMap<String, String>, name: &'static str) -> Result<f64, LoudnessError> {
    let text = report
        .get(name)
        .ok_or_else(|| LoudnessError::MalformedReport(format!("missing field {}", name)))?;
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| LoudnessError::MalformedReport(format!("{} = {:?}", name, text)))?;
    if !value.is_finite() {
        return Err(LoudnessError::NonFinite { field: name, value });
    }
    Ok(value)
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const STDERR: &str = r#"Input #0, wav, from 'mix.wav':
  Duration: 00:01:10.00, bitrate: 1536 kb/s
[Parsed_loudnorm_0 @ 0x55d5c8a0] 
{
	"input_i" : "-27.61",
	"input_tp" : "-4.47",
	"input_lra" : "18.06",
	"input_thresh" : "-39.20",
	"output_i" : "-22.88",
	"output_tp" : "-2.00",
	"output_lra" : "7.00",
	"output_thresh" : "-34.33",
	"normalization_type" : "dynamic",
	"target_offset" : "-0.12"
}
size=N/A time=00:01:10.00 bitrate=N/A speed= 612x
"#;

    #[test]
    fn test_parse_report() {
        let m = parse_loudnorm_report(STDERR).unwrap();
        assert_eq!(m.input_i, -27.61);
        assert_eq!(m.input_tp, -4.47);
        assert_eq!(m.input_lra, Some(18.06));
        assert_eq!(m.target_offset, Some(-0.12));
        assert_eq!(m.report["normalization_type"], "dynamic");
    }

    #[test]
    fn test_missing_report() {
        assert!(matches!(
            parse_loudnorm_report("no json here\n{ \"input_i\": 1"),
            Err(LoudnessError::MissingReport)
        ));
        assert!(matches!(
            parse_loudnorm_report(""),
            Err(LoudnessError::MissingReport)
        ));
    }

    #[test]
    fn test_non_finite_measurement_is_rejected() {
        let stderr = "{\n\"input_i\" : \"-inf\",\n\"input_tp\" : \"-inf\"\n}\n";
        assert!(matches!(
            parse_loudnorm_report(stderr),
            Err(LoudnessError::NonFinite { field: "input_i", .. })
        ));

        let stderr = "{\n\"input_i\" : \"-20.0\",\n\"input_tp\" : \"nan\"\n}\n";
        assert!(matches!(
            parse_loudnorm_report(stderr),
            Err(LoudnessError::NonFinite { field: "input_tp", .. })
        ));
    }

    #[test]
    fn test_malformed_report() {
        let stderr = "{\n\"input_i\" : \"loud\",\n\"input_tp\" : \"-1\"\n}\n";
        assert!(matches!(
            parse_loudnorm_report(stderr),
            Err(LoudnessError::MalformedReport(_))
        ));

        let stderr = "{\nnot json\n}\n";
        assert!(matches!(
            parse_loudnorm_report(stderr),
            Err(LoudnessError::MalformedReport(_))
        ));
    }

    #[test]
    fn test_analysis_args_carry_targets() {
        let args = build_analysis_args(Path::new("/tmp/mix.wav"), &LoudnessTarget::default());
        let af = args.iter().position(|a| a == "-af").unwrap();
        assert_eq!(args[af + 1], "loudnorm=I=-23:LRA=7:TP=-2:print_format=json");
        assert_eq!(&args[args.len() - 3..], &["-f", "null", "-"]);
    }

    #[test]
    fn test_remux_args() {
        let tags = GainTags {
            track_gain_db: 4.61,
            track_peak: 0.597,
            r128_track_gain: Some(1180),
            r128_album_gain: Some(0),
            report: parse_loudnorm_report(STDERR).unwrap().report,
        };
        let args = build_remux_args(
            Path::new("in.opus"),
            Path::new("out.opus"),
            AudioFormat::Opus,
            &tags,
        );
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert!(args.contains(&"replaygain_track_gain=4.61 dB".to_string()));
        assert!(args.contains(&"R128_TRACK_GAIN=1180".to_string()));
        assert!(args.windows(2).any(|w| w == ["-metadata", "input_i=-27.61"]));
        assert!(args.windows(2).any(|w| w == ["-metadata", "target_offset=-0.12"]));
        assert!(args.contains(&"normalization_type=dynamic".to_string()));
        assert_eq!(args.last().unwrap(), "out.opus");
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_launch() {
        let analyzer = FfmpegLoudnessAnalyzer::new(FfmpegLoudnessConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg-binary"),
            timeout_secs: 5,
        });
        let err = analyzer
            .analyze(Path::new("/tmp/none.wav"), &LoudnessTarget::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoudnessError::LaunchFailed(_)));
    }
}
