// Error types for the conversion pipeline

use std::fmt;
use std::path::PathBuf;

use super::extractors::{diagnose_error, BlockingReason};

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Source is unreachable, private, restricted or offers no formats
    Resolution(String),

    /// Nobody answered the format prompt in time
    SelectionTimeout { waited_secs: u64 },

    /// Answer to an expired, foreign or out-of-range prompt
    InvalidSelection(String),

    /// yt-dlp failed while downloading the chosen stream
    Fetch(String),

    /// ffmpeg failed to produce the target container
    Transcode(String),

    /// Tools reported success but the expected file is missing
    PostDownloadVerification(PathBuf),

    /// Upload too large or rejected by the chat transport
    Delivery(String),

    /// yt-dlp or ffmpeg not found in system
    ToolNotFound(String),
}

impl PipelineError {
    /// Build a resolution error from yt-dlp stderr, naming the blocking reason when one is recognised.
    pub fn from_resolution_stderr(stderr: &str) -> Self {
        let detail = summarize_stderr(stderr);
        match diagnose_error(stderr) {
            Some(BlockingReason::Unknown) | None => Self::Resolution(detail),
            Some(reason) => Self::Resolution(format!("{} ({})", reason.description(), detail)),
        }
    }

    /// Short machine-friendly name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "resolution",
            Self::SelectionTimeout { .. } => "selection_timeout",
            Self::InvalidSelection(_) => "invalid_selection",
            Self::Fetch(_) => "fetch",
            Self::Transcode(_) => "transcode",
            Self::PostDownloadVerification(_) => "post_download_verification",
            Self::Delivery(_) => "delivery",
            Self::ToolNotFound(_) => "tool_not_found",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolution(msg) => write!(f, "Could not resolve media: {}", msg),
            Self::SelectionTimeout { waited_secs } => write!(
                f,
                "No format was selected within {} seconds. Run the command again to retry.",
                waited_secs
            ),
            Self::InvalidSelection(msg) => write!(f, "Invalid selection: {}", msg),
            Self::Fetch(msg) => write!(f, "Download failed: {}", msg),
            Self::Transcode(msg) => write!(f, "Conversion failed: {}", msg),
            Self::PostDownloadVerification(path) => write!(
                f,
                "The downloaded file does not exist: {}",
                path.display()
            ),
            Self::Delivery(msg) => write!(f, "Upload failed: {}", msg),
            Self::ToolNotFound(tool) => write!(f, "Tool not found: {}", tool),
        }
    }
}

impl std::error::Error for PipelineError {}

// Classify raw tool output that reaches us as a plain String
impl From<String> for PipelineError {
    fn from(s: String) -> Self {
        if s.contains("not found") || s.contains("No such file") || s.contains("command not found") {
            return Self::ToolNotFound(s);
        }

        if s.contains("Unsupported URL")
            || s.contains("Invalid URL")
            || s.contains("is not a valid URL")
            || s.contains("Private video")
            || s.contains("Video unavailable")
        {
            return Self::from_resolution_stderr(&s);
        }

        if s.contains("Requested format is not available") {
            return Self::InvalidSelection(summarize_stderr(&s));
        }

        Self::Fetch(summarize_stderr(&s))
    }
}

/// Keep the lines a user can act on: `ERROR:` lines first, else the last non-empty line.
pub fn summarize_stderr(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(|l| l.trim())
        .filter(|l| l.starts_with("ERROR:"))
        .take(2)
        .map(|l| l.trim_start_matches("ERROR:").trim())
        .collect();

    if !errors.is_empty() {
        return errors.join(" | ");
    }

    stderr
        .lines()
        .rev()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .map(|l| l.chars().take(300).collect())
        .unwrap_or_else(|| "unknown error".to_string())
}
