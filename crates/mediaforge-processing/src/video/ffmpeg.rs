//! Thin wrapper around the ffmpeg/ffprobe binaries.
//!
//! All invocations run as subprocesses with captured stderr. Transcodes carry
//! a wall-clock budget; on expiry the child is killed and the partial output
//! left for the caller's temp directory to discard.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use mediaforge_core::models::VideoPolicy;
use mediaforge_core::{MediaError, MediaResult};

/// Metadata probed from a video container.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
    pub bitrate_kbps: Option<u32>,
}

/// Runs ffmpeg and ffprobe as subprocesses.
#[derive(Debug, Clone)]
pub struct FfmpegService {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegService {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Whether both binaries respond to `-version`.
    pub async fn is_available(&self) -> bool {
        self.ensure_available().await.is_ok()
    }

    /// Fails with `ToolUnavailable` before any unit work begins when either
    /// binary is missing.
    pub async fn ensure_available(&self) -> MediaResult<()> {
        for path in [&self.ffmpeg_path, &self.ffprobe_path] {
            let status = Command::new(path)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match status {
                Ok(s) if s.success() => {}
                _ => {
                    return Err(MediaError::ToolUnavailable(format!(
                        "{} is not executable",
                        path
                    )))
                }
            }
        }
        Ok(())
    }

    /// Probe a video file with ffprobe's JSON output.
    #[tracing::instrument(skip(self, input), fields(process.command = "ffprobe"))]
    pub async fn probe(&self, input: &Path) -> MediaResult<VideoMetadata> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                "v:0",
                "-show_format",
            ])
            .arg(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MediaError::ToolUnavailable(format!("Failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Decode(format!("ffprobe failed: {}", stderr)));
        }

        let probe_data: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| MediaError::Decode(format!("Failed to parse ffprobe output: {}", e)))?;

        let stream = probe_data["streams"]
            .get(0)
            .ok_or_else(|| MediaError::Decode("No video stream found".to_string()))?;
        let width = stream["width"]
            .as_u64()
            .ok_or_else(|| MediaError::Decode("Missing stream width".to_string()))?
            as u32;
        let height = stream["height"]
            .as_u64()
            .ok_or_else(|| MediaError::Decode("Missing stream height".to_string()))?
            as u32;

        let format = &probe_data["format"];
        let duration_seconds = format["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| MediaError::Decode("Could not parse duration".to_string()))?;
        let bitrate_kbps = format["bit_rate"]
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .map(|b| (b / 1000) as u32);

        Ok(VideoMetadata {
            width,
            height,
            duration_seconds,
            bitrate_kbps,
        })
    }

    /// Transcode `input` into `output` per the policy, at the given output
    /// dimensions. Kills the child and returns `TranscodeTimeout` when the
    /// wall-clock budget expires.
    #[tracing::instrument(skip(self, input, output, policy), fields(process.command = "ffmpeg"))]
    pub async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        policy: &VideoPolicy,
        width: u32,
        height: u32,
    ) -> MediaResult<()> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-c:v".into(),
            policy.container.video_codec().into(),
            "-c:a".into(),
            policy.container.audio_codec().into(),
            "-b:a".into(),
            format!("{}k", policy.audio_bitrate_kbps),
        ];

        let mut filters = vec![format!("scale={}:{}", width, height)];
        if policy.framerate_cap > 0.0 {
            filters.push(format!("fps={}", policy.framerate_cap));
        }
        args.push("-vf".into());
        args.push(filters.join(","));

        if let Some(crf) = policy.crf {
            args.push("-crf".into());
            args.push(crf.to_string());
        }
        if let Some(ref preset) = policy.preset {
            args.push("-preset".into());
            args.push(preset.clone());
        }
        if let Some(bitrate) = policy.bitrate_kbps {
            args.push("-b:v".into());
            args.push(format!("{}k", bitrate));
        }
        if let Some(threads) = policy.threads {
            args.push("-threads".into());
            args.push(threads.to_string());
        }
        args.push(output.to_string_lossy().into_owned());

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::ToolUnavailable(format!("Failed to run ffmpeg: {}", e)))?;

        let budget = Duration::from_secs(policy.timeout_secs);
        let result = tokio::time::timeout(budget, child.wait_with_output()).await;
        match result {
            Ok(Ok(out)) if out.status.success() => Ok(()),
            Ok(Ok(out)) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                Err(MediaError::Internal(format!("ffmpeg failed: {}", stderr)))
            }
            Ok(Err(e)) => Err(MediaError::Internal(format!(
                "Failed to wait for ffmpeg: {}",
                e
            ))),
            Err(_) => Err(MediaError::TranscodeTimeout {
                seconds: policy.timeout_secs,
            }),
        }
    }

    /// Extract one frame at `offset_secs` as a JPEG poster image.
    pub async fn frame_at(
        &self,
        input: &Path,
        output: &Path,
        offset_secs: f64,
    ) -> MediaResult<()> {
        let output_cmd = Command::new(&self.ffmpeg_path)
            .args(["-y", "-ss", &format!("{:.3}", offset_secs), "-i"])
            .arg(input)
            .args(["-frames:v", "1", "-q:v", "2"])
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MediaError::ToolUnavailable(format!("Failed to run ffmpeg: {}", e)))?;

        if !output_cmd.status.success() {
            let stderr = String::from_utf8_lossy(&output_cmd.stderr);
            return Err(MediaError::Internal(format!(
                "Thumbnail extraction failed: {}",
                stderr
            )));
        }
        Ok(())
    }
}
