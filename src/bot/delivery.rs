// Delivery: upload the converted file back to the requester's channel
//
// Whatever happens to the upload, the request directory is kept for the
// retention window and then removed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::downloader::artifacts::schedule_removal;
use crate::downloader::{MediaKind, PipelineError, PipelineResult};

/// Chat transport used to hand results back
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path, content: &str) -> Result<(), PipelineError>;

    async fn notify(&self, content: &str) -> Result<(), PipelineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The pipeline failed; the user was told why
    ConversionFailed(String),
    /// The file exists but could not be handed over
    Rejected(PipelineError),
}

/// What `deliver` did, plus the pending removal of the request files
pub struct DeliveryReport {
    pub outcome: DeliveryOutcome,
    pub cleanup: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    retention: Duration,
    upload_limit: u64,
}

impl Delivery {
    pub fn new(retention: Duration, upload_limit: u64) -> Self {
        Self {
            retention,
            upload_limit,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub async fn deliver(
        &self,
        result: PipelineResult,
        requester: u64,
        kind: MediaKind,
        uploader: &dyn Uploader,
    ) -> DeliveryReport {
        let (path, title) = match (result.success, result.path, result.title) {
            (true, Some(path), title) => (path, title.unwrap_or_else(|| "Unknown Title".to_string())),
            (_, _, _) => {
                let detail = result.error.unwrap_or_else(|| "unknown error".to_string());
                self.send_notice(uploader, &failure_message(&detail)).await;
                return DeliveryReport {
                    outcome: DeliveryOutcome::ConversionFailed(detail),
                    cleanup: None,
                };
            }
        };

        let outcome = match self.check_size(&path).await {
            Err(e) => Err(e),
            Ok(()) => {
                let content = format!(
                    "<@{}>, `Here is the converted {}: {}`",
                    requester,
                    kind.label(),
                    title
                );
                uploader.upload(&path, &content).await
            }
        };

        let cleanup = Some(schedule_removal(request_dir(&path), self.retention));

        match outcome {
            Ok(()) => {
                info!(requester, path = %path.display(), "delivered");
                DeliveryReport {
                    outcome: DeliveryOutcome::Delivered,
                    cleanup,
                }
            }
            Err(e) => {
                warn!(requester, path = %path.display(), "delivery failed: {}", e);
                self.send_notice(uploader, &failure_message(&e.to_string())).await;
                DeliveryReport {
                    outcome: DeliveryOutcome::Rejected(e),
                    cleanup,
                }
            }
        }
    }

    async fn check_size(&self, path: &Path) -> Result<(), PipelineError> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| PipelineError::Delivery(format!("cannot read {}: {}", path.display(), e)))?
            .len();

        if size > self.upload_limit {
            return Err(PipelineError::Delivery(format!(
                "file is {:.1} MB, the upload limit is {:.0} MB",
                size as f64 / 1_048_576.0,
                self.upload_limit as f64 / 1_048_576.0
            )));
        }
        Ok(())
    }

    async fn send_notice(&self, uploader: &dyn Uploader, content: &str) {
        if let Err(e) = uploader.notify(content).await {
            warn!("could not send failure notice: {}", e);
        }
    }
}

pub fn failure_message(detail: &str) -> String {
    format!(
        "`Conversion failed. Please check the input and try again.\nError details: {}`",
        detail
    )
}

fn request_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}
