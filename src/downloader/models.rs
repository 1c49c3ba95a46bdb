// Common data models for the conversion pipeline

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Target output of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Container every output of this kind is normalized to
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// How a format is chosen for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionPolicy {
    /// Deterministic best-audio / best-compatible-video choice
    Automatic,
    /// Ask the requester through a timed single-choice prompt
    Interactive,
}

/// One user command worth of work. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Unique per invocation; also names the request's working directory
    pub id: Uuid,
    /// Discord user id of the requester
    pub requester: u64,
    /// URL or free-text search
    pub source: String,
    pub kind: MediaKind,
    /// Explicit format id that bypasses selection
    pub format_id: Option<String>,
}

impl ConversionRequest {
    pub fn new(requester: u64, source: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester,
            source: source.into(),
            kind,
            format_id: None,
        }
    }

    pub fn with_format(mut self, format_id: Option<String>) -> Self {
        self.format_id = format_id;
        self
    }
}

/// Selectable stream variant offered by a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatOption {
    pub format_id: String,
    /// Resolution label ("720p") or "Audio"
    pub label: String,
    pub is_audio_only: bool,
    /// Video stream without audio; needs a merge for video output
    pub is_video_only: bool,
    /// Container extension reported by the source (mp4, webm, m4a)
    pub ext: String,
    pub height: Option<u32>,
    /// Audio bitrate in kbps
    pub abr: Option<f32>,
    pub is_h264: bool,
    pub is_aac: bool,
    pub filesize: Option<u64>,
}

/// Metadata returned by the resolver: never empty on success
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub canonical_id: String,
    pub title: String,
    /// Page the download step fetches; a search resolves to its first hit
    pub source_url: String,
    pub formats: Vec<FormatOption>,
}

/// Output of the format selector
#[derive(Debug, Clone, PartialEq)]
pub struct FormatChoice {
    /// Primary format id that was picked
    pub format_id: String,
    /// yt-dlp `-f` expression (may merge video with audio)
    pub spec: String,
    pub label: String,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub success: bool,
    pub path: Option<PathBuf>,
    pub title: Option<String>,
    pub error: Option<String>,
}

impl PipelineResult {
    pub fn succeeded(path: PathBuf, title: String) -> Self {
        Self {
            success: true,
            path: Some(path),
            title: Some(title),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            path: None,
            title: None,
            error: Some(error.into()),
        }
    }
}

/// Network configuration for yt-dlp calls
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// SOCKS5/HTTP proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Socket timeout in seconds
    pub timeout: Option<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Some(30),
        }
    }
}

/// Pipeline stage reported to the requester
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Resolving,
    Selecting,
    Downloading { title: String },
    Converting { title: String },
    Uploading { title: String },
    Finished,
}
