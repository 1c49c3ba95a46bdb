use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::downloader::errors::PipelineError;
use crate::downloader::models::{FormatChoice, NetworkConfig};
use crate::downloader::traits::MediaFetcher;
use crate::downloader::utils::{get_proxy_args, get_timeout_args, run_output_with_timeout};

/// Downloads through the yt-dlp binary. A single attempt per call.
pub struct YtDlpBackend {
    binary_path: String,
    timeout_secs: u64,
    ffmpeg_location: Option<String>,
}

impl YtDlpBackend {
    pub fn new(binary_path: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout_secs,
            ffmpeg_location: None,
        }
    }

    /// ffmpeg for `<video>+<audio>` merges when it is not on `PATH`
    pub fn with_ffmpeg_location(mut self, location: Option<String>) -> Self {
        self.ffmpeg_location = location;
        self
    }

    fn build_args(&self, source: &str, choice: &FormatChoice, raw_stem: &Path, network: &NetworkConfig) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            choice.spec.clone(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-warnings".to_string(),
            "--no-part".to_string(),
            "-o".to_string(),
            format!("{}.%(ext)s", raw_stem.display()),
            // Report the final file name after merges/moves
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--no-simulate".to_string(),
        ];

        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.clone());
        }
        args.extend(get_timeout_args(network));
        args.extend(get_proxy_args(network));

        args.push("--".to_string());
        args.push(source.to_string());
        args
    }

    /// Find the file yt-dlp wrote when it did not print a path
    async fn locate_download(raw_stem: &Path) -> Option<PathBuf> {
        let dir = raw_stem.parent()?;
        let prefix = format!("{}.", raw_stem.file_name()?.to_string_lossy());

        let mut entries = tokio::fs::read_dir(dir).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) && !name.ends_with(".part") && !name.ends_with(".ytdl") {
                return Some(entry.path());
            }
        }
        None
    }
}

#[async_trait]
impl MediaFetcher for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(
        &self,
        source: &str,
        choice: &FormatChoice,
        raw_stem: &Path,
        network: &NetworkConfig,
    ) -> Result<PathBuf, PipelineError> {
        let args = self.build_args(source, choice, raw_stem, network);
        info!(
            backend = self.name(),
            format = %choice.spec,
            proxy = network.proxy.as_deref().unwrap_or("direct"),
            "starting download"
        );
        debug!(?args, "yt-dlp arguments");

        let output = run_output_with_timeout(&self.binary_path, args, self.timeout_secs)
            .await
            .map_err(PipelineError::from)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            warn!(backend = self.name(), "download failed: {}", stderr.trim());
            return Err(PipelineError::from(stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let printed = stdout
            .lines()
            .rev()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .map(PathBuf::from);

        match printed {
            Some(path) => Ok(path),
            None => Self::locate_download(raw_stem).await.ok_or_else(|| {
                PipelineError::PostDownloadVerification(raw_stem.to_path_buf())
            }),
        }
    }
}
