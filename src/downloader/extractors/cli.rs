// CLI InfoExtractor - uses native `yt-dlp` binary
//
// Metadata-only probe: `--dump-single-json` never downloads media. Search queries
// and playlists come back wrapped in `entries`; the first entry is used.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::traits::{ExtendedFormat, ExtendedVideoInfo, ExtractorConfig, InfoExtractor};
use crate::downloader::errors::PipelineError;
use crate::downloader::utils::run_output_with_timeout;

/// CLI-based info extractor using yt-dlp binary
pub struct CliInfoExtractor {
    ytdlp_path: String,
}

impl CliInfoExtractor {
    pub fn new(ytdlp_path: impl Into<String>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
        }
    }

    /// Build command arguments
    fn build_args(source: &str, config: &ExtractorConfig) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            config.timeout_seconds.to_string(),
        ];

        if let Some(proxy) = &config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        // `--` keeps a query starting with '-' from being read as a flag
        args.push("--".to_string());
        args.push(source.to_string());
        args
    }

    /// Parse JSON output
    pub(crate) fn parse_json(stdout: &[u8]) -> Result<ExtendedVideoInfo, PipelineError> {
        let json_str = String::from_utf8_lossy(stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|e| PipelineError::Resolution(format!("Invalid JSON from yt-dlp: {}", e)))?;

        // Search results and playlists: take the first entry
        let entry = match json["entries"].as_array() {
            Some(entries) => entries
                .iter()
                .find(|e| !e.is_null())
                .ok_or_else(|| PipelineError::Resolution("No results found".to_string()))?,
            None => &json,
        };

        let id = entry["id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PipelineError::Resolution("Media has no id".to_string()))?;

        Ok(ExtendedVideoInfo {
            id: id.to_string(),
            title: entry["title"].as_str().unwrap_or("Unknown Title").to_string(),
            uploader: entry["uploader"].as_str().unwrap_or("Unknown").to_string(),
            duration_seconds: entry["duration"].as_f64().unwrap_or(0.0) as u64,
            webpage_url: entry["webpage_url"].as_str().unwrap_or("").to_string(),
            formats: Self::parse_formats(entry),
        })
    }

    fn parse_formats(json: &serde_json::Value) -> Vec<ExtendedFormat> {
        let Some(formats_array) = json["formats"].as_array() else {
            return Vec::new();
        };

        formats_array
            .iter()
            .map(|f| ExtendedFormat {
                format_id: f["format_id"].as_str().unwrap_or("").to_string(),
                ext: f["ext"].as_str().unwrap_or("").to_string(),
                width: f["width"].as_u64().map(|w| w as u32),
                height: f["height"].as_u64().map(|h| h as u32),
                vcodec: f["vcodec"].as_str().map(|s| s.to_string()),
                acodec: f["acodec"].as_str().map(|s| s.to_string()),
                filesize: f["filesize"].as_u64(),
                filesize_approx: f["filesize_approx"].as_u64(),
                abr: f["abr"].as_f64().map(|a| a as f32),
                format_note: f["format_note"].as_str().map(|s| s.to_string()),
            })
            .filter(|f| !f.format_id.is_empty())
            .collect()
    }
}

#[async_trait]
impl InfoExtractor for CliInfoExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn extract(
        &self,
        source: &str,
        config: &ExtractorConfig,
    ) -> Result<ExtendedVideoInfo, PipelineError> {
        let args = Self::build_args(source, config);
        debug!(extractor = self.name(), ytdlp = %self.ytdlp_path, ?args, "probing source");

        // Allow a little slack over the socket timeout for process startup
        let timeout_secs = config.timeout_seconds as u64 * 2 + 10;
        let output = run_output_with_timeout(&self.ytdlp_path, args, timeout_secs)
            .await
            .map_err(|e| {
                warn!(extractor = self.name(), "probe failed to run: {}", e);
                if e.starts_with("Failed to start") {
                    PipelineError::ToolNotFound(e)
                } else {
                    PipelineError::from_resolution_stderr(&e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(extractor = self.name(), "probe rejected: {}", stderr.trim());
            return Err(PipelineError::from_resolution_stderr(&stderr));
        }

        Self::parse_json(&output.stdout)
    }
}
