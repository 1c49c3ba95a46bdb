// Local artifact lifecycle
//
// Every request owns `<kind dir>/<request id>/`. The download lands there as
// `<canonical id>.source.<ext>` and is finalized into `<canonical id>.<mp3|mp4>`.
// Removing the request directory removes everything the request created.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::PipelineError;
use super::models::{ConversionRequest, MediaKind};
use super::traits::Transcoder;

lazy_static! {
    static ref UNSAFE_CHARS_RE: Regex = Regex::new(r"[^A-Za-z0-9_\-]").unwrap();
}

/// Where finished files of each kind are kept
#[derive(Debug, Clone)]
pub struct OutputLayout {
    audio_dir: PathBuf,
    video_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(audio_dir: impl Into<PathBuf>, video_dir: impl Into<PathBuf>) -> Self {
        Self {
            audio_dir: audio_dir.into(),
            video_dir: video_dir.into(),
        }
    }

    pub fn kind_dir(&self, kind: MediaKind) -> &Path {
        match kind {
            MediaKind::Audio => &self.audio_dir,
            MediaKind::Video => &self.video_dir,
        }
    }

    /// Remove request directories left behind by a previous process. Their
    /// removal timers did not survive the restart. Returns how many were removed.
    pub async fn sweep_stale(&self) -> usize {
        let mut removed = 0;
        for dir in [&self.audio_dir, &self.video_dir] {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(dir = %dir.display(), "cannot scan output directory: {}", e);
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(dir = %dir.display(), "cannot scan output directory: {}", e);
                        break;
                    }
                };
                let is_request_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false)
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| Uuid::try_parse(name).is_ok());
                if is_request_dir {
                    discard(&entry.path()).await;
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Deterministic paths for one request
    pub fn plan(&self, request: &ConversionRequest, canonical_id: &str) -> ArtifactPlan {
        let work_dir = self.kind_dir(request.kind).join(request.id.simple().to_string());
        let stem = sanitize_component(canonical_id);

        ArtifactPlan {
            raw_stem: work_dir.join(format!("{}.source", stem)),
            final_path: work_dir.join(format!("{}.{}", stem, request.kind.extension())),
            kind: request.kind,
            work_dir,
        }
    }
}

/// Paths decided before the download starts
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPlan {
    pub work_dir: PathBuf,
    /// Download target without extension; yt-dlp appends the real one
    pub raw_stem: PathBuf,
    pub final_path: PathBuf,
    pub kind: MediaKind,
}

impl ArtifactPlan {
    pub async fn prepare(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.work_dir).await
    }

    /// Attach the path the download step actually produced
    pub fn with_raw(self, raw_path: PathBuf) -> Artifact {
        Artifact {
            work_dir: self.work_dir,
            raw_path,
            final_path: self.final_path,
            kind: self.kind,
        }
    }
}

/// Two-stage artifact: what was downloaded and what will be delivered
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub work_dir: PathBuf,
    pub raw_path: PathBuf,
    pub final_path: PathBuf,
    pub kind: MediaKind,
}

impl Artifact {
    /// True when the raw container differs from the target container
    pub fn needs_transcode(&self) -> bool {
        let raw_ext = self
            .raw_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        raw_ext != self.kind.extension()
    }

    /// Produce `final_path` from `raw_path`: rename when the container already
    /// matches, transcode otherwise. The raw file is gone afterwards.
    pub async fn finalize(&self, transcoder: &dyn Transcoder) -> Result<(), PipelineError> {
        if !self.needs_transcode() {
            debug!(from = %self.raw_path.display(), to = %self.final_path.display(), "renaming download");
            return tokio::fs::rename(&self.raw_path, &self.final_path)
                .await
                .map_err(|e| PipelineError::Transcode(format!("rename failed: {}", e)));
        }

        transcoder
            .transcode(&self.raw_path, &self.final_path, self.kind)
            .await?;

        if let Err(e) = tokio::fs::remove_file(&self.raw_path).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.raw_path.display(), "failed to remove raw download: {}", e);
            }
        }
        Ok(())
    }
}

/// Remove a request directory and everything in it. Missing directories are fine.
pub async fn discard(work_dir: &Path) {
    match tokio::fs::remove_dir_all(work_dir).await {
        Ok(()) => debug!(dir = %work_dir.display(), "removed request files"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %work_dir.display(), "failed to remove request files: {}", e),
    }
}

/// Delete `work_dir` once `retention` has elapsed.
pub fn schedule_removal(work_dir: PathBuf, retention: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !retention.is_zero() {
            tokio::time::sleep(retention).await;
        }
        discard(&work_dir).await;
    })
}

/// Make a media id safe to use as a file name
pub fn sanitize_component(id: &str) -> String {
    let cleaned = UNSAFE_CHARS_RE.replace_all(id, "_");
    let cleaned: String = cleaned.chars().take(100).collect();
    if cleaned.is_empty() {
        "media".to_string()
    } else {
        cleaned
    }
}
