// Pipeline seam definitions

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::errors::PipelineError;
use super::models::{ConversionRequest, FormatChoice, FormatOption, MediaKind, NetworkConfig, ResolvedMedia, Stage};

/// Downloads one chosen stream to local disk
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Download `choice` to `<raw_stem>.<ext>` and return the path actually written.
    async fn fetch(
        &self,
        source: &str,
        choice: &FormatChoice,
        raw_stem: &Path,
        network: &NetworkConfig,
    ) -> Result<PathBuf, PipelineError>;
}

/// Re-encodes a raw download into the container of the requested kind
#[async_trait]
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transcode(&self, input: &Path, output: &Path, kind: MediaKind) -> Result<(), PipelineError>;
}

/// Interactive format choice, answered by the requester
#[async_trait]
pub trait SelectionPrompt: Send + Sync {
    /// Present `options` and return the chosen format id.
    async fn choose(
        &self,
        request: &ConversionRequest,
        media: &ResolvedMedia,
        options: &[FormatOption],
    ) -> Result<String, PipelineError>;
}

/// Receives stage updates while a request is processed
#[async_trait]
pub trait ProgressEmitter: Send + Sync {
    async fn emit(&self, stage: Stage);
}

/// Emitter that drops every update
pub struct NoProgress;

#[async_trait]
impl ProgressEmitter for NoProgress {
    async fn emit(&self, _stage: Stage) {}
}
