// InfoExtractor trait and common types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::downloader::errors::PipelineError;

/// Configuration for info extraction
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout_seconds: 30,
        }
    }
}

impl ExtractorConfig {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Extended format information from yt-dlp
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedFormat {
    /// Format ID (e.g., "137", "140")
    pub format_id: String,
    /// File extension (mp4, webm, m4a)
    pub ext: String,
    /// Video width in pixels
    pub width: Option<u32>,
    /// Video height in pixels
    pub height: Option<u32>,
    /// Video codec (avc1, vp9, av01, none)
    pub vcodec: Option<String>,
    /// Audio codec (mp4a, opus, none)
    pub acodec: Option<String>,
    /// File size in bytes
    pub filesize: Option<u64>,
    /// Approximate file size (when exact is unknown)
    pub filesize_approx: Option<u64>,
    /// Audio bitrate in kbps
    pub abr: Option<f32>,
    /// Format note (e.g., "1080p", "tiny")
    pub format_note: Option<String>,
}

impl ExtendedFormat {
    /// Get effective file size (exact or approximate)
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    pub fn has_video(&self) -> bool {
        self.vcodec
            .as_ref()
            .map_or(false, |v| v != "none" && !v.is_empty())
    }

    pub fn has_audio(&self) -> bool {
        self.acodec
            .as_ref()
            .map_or(false, |a| a != "none" && !a.is_empty())
    }

    /// Storyboards and manifests carry neither stream
    pub fn is_usable(&self) -> bool {
        self.has_video() || self.has_audio()
    }

    /// Check if format is H.264 (avc1)
    pub fn is_h264(&self) -> bool {
        self.vcodec
            .as_ref()
            .map_or(false, |v| v.starts_with("avc1"))
    }

    /// Check if audio is AAC (m4a)
    pub fn is_aac(&self) -> bool {
        self.acodec
            .as_ref()
            .map_or(false, |a| a.starts_with("mp4a"))
    }
}

/// Extended video info with all formats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedVideoInfo {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_seconds: u64,
    pub webpage_url: String,
    pub formats: Vec<ExtendedFormat>,
}

/// Trait for info extractors
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Extract video info with formats, without downloading anything
    async fn extract(
        &self,
        source: &str,
        config: &ExtractorConfig,
    ) -> Result<ExtendedVideoInfo, PipelineError>;
}
