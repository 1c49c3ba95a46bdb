// ffmpeg transcoder
//
// Runs as a child process awaited on the runtime, so the event loop keeps
// answering other users while a conversion is in progress.

use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use super::errors::{summarize_stderr, PipelineError};
use super::models::MediaKind;
use super::traits::Transcoder;
use super::utils::run_output_with_timeout;

pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    timeout_secs: u64,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout_secs,
        }
    }

    fn build_args(input: &Path, output: &Path, kind: MediaKind) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.display().to_string(),
        ];

        match kind {
            MediaKind::Audio => args.extend(
                ["-vn", "-codec:a", "libmp3lame", "-q:a", "2"]
                    .iter()
                    .map(|s| s.to_string()),
            ),
            MediaKind::Video => args.extend(
                [
                    "-c:v", "libx264", "-preset", "veryfast", "-crf", "23",
                    "-c:a", "aac", "-b:a", "192k",
                    "-movflags", "+faststart",
                ]
                .iter()
                .map(|s| s.to_string()),
            ),
        }

        args.push(output.display().to_string());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn transcode(&self, input: &Path, output: &Path, kind: MediaKind) -> Result<(), PipelineError> {
        let args = Self::build_args(input, output, kind);
        info!(
            input = %input.display(),
            output = %output.display(),
            kind = kind.label(),
            "transcoding"
        );

        let result = run_output_with_timeout(&self.ffmpeg_path, args, self.timeout_secs).await;
        let out = match result {
            Ok(out) => out,
            Err(e) if e.starts_with("Failed to start") => return Err(PipelineError::ToolNotFound(e)),
            Err(e) => return Err(PipelineError::Transcode(e)),
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            warn!("ffmpeg failed: {}", stderr.trim());
            return Err(PipelineError::Transcode(summarize_stderr(&stderr)));
        }

        Ok(())
    }
}
