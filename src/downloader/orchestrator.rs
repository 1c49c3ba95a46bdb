// Pipeline: resolve -> select -> fetch -> transcode -> verify
//
// One run per ConversionRequest, single attempt, no retries. On any failure the
// request directory is removed before the result is returned.

use std::path::PathBuf;

use tracing::{debug, error, info, warn};
use url::Url;

use super::artifacts::{self, ArtifactPlan, OutputLayout};
use super::errors::PipelineError;
use super::extractors::{ExtractorConfig, InfoExtractor};
use super::format_selector::FormatSelector;
use super::models::{ConversionRequest, FormatChoice, PipelineResult, ResolvedMedia, SelectionPolicy, Stage};
use super::traits::{MediaFetcher, ProgressEmitter, SelectionPrompt, Transcoder};
use super::utils::ProxyPool;

pub struct Pipeline {
    extractor: Box<dyn InfoExtractor>,
    fetcher: Box<dyn MediaFetcher>,
    transcoder: Box<dyn Transcoder>,
    layout: OutputLayout,
    proxies: ProxyPool,
    socket_timeout: u32,
}

impl Pipeline {
    pub fn new(
        extractor: Box<dyn InfoExtractor>,
        fetcher: Box<dyn MediaFetcher>,
        transcoder: Box<dyn Transcoder>,
        layout: OutputLayout,
    ) -> Self {
        Self {
            extractor,
            fetcher,
            transcoder,
            layout,
            proxies: ProxyPool::default(),
            socket_timeout: 30,
        }
    }

    pub fn with_proxies(mut self, proxies: ProxyPool) -> Self {
        self.proxies = proxies;
        self
    }

    pub fn with_socket_timeout(mut self, seconds: u32) -> Self {
        self.socket_timeout = seconds;
        self
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Look up metadata and the offered formats. Never downloads media.
    pub async fn resolve(&self, source: &str) -> Result<ResolvedMedia, PipelineError> {
        let target = normalize_source(source);
        let config = ExtractorConfig::default()
            .with_timeout(self.socket_timeout)
            .with_proxy(self.proxies.pick());

        info!(extractor = self.extractor.name(), source = %target, "resolving");
        let info = self.extractor.extract(&target, &config).await?;

        let formats = FormatSelector::build_options(&info.formats);
        if formats.is_empty() {
            return Err(PipelineError::Resolution(format!(
                "'{}' offers no downloadable formats",
                info.title
            )));
        }

        debug!(id = %info.id, count = formats.len(), "resolved formats");
        let source_url = if info.webpage_url.is_empty() {
            target
        } else {
            info.webpage_url
        };

        Ok(ResolvedMedia {
            canonical_id: info.id,
            title: info.title,
            source_url,
            formats,
        })
    }

    /// Decide which stream to fetch. An explicit format id on the request wins
    /// over the policy.
    pub async fn select(
        &self,
        request: &ConversionRequest,
        media: &ResolvedMedia,
        policy: SelectionPolicy,
        prompt: &dyn SelectionPrompt,
    ) -> Result<FormatChoice, PipelineError> {
        if let Some(format_id) = &request.format_id {
            return FormatSelector::pick(&media.formats, format_id, request.kind);
        }

        match policy {
            SelectionPolicy::Automatic => FormatSelector::automatic(&media.formats, request.kind),
            SelectionPolicy::Interactive => {
                let offered = FormatSelector::prompt_options(&media.formats, request.kind);
                if offered.is_empty() {
                    return Err(PipelineError::Resolution(format!(
                        "'{}' offers no {} formats to choose from",
                        media.title,
                        request.kind.label()
                    )));
                }
                let answer = prompt.choose(request, media, &offered).await?;
                FormatSelector::pick(&offered, &answer, request.kind)
            }
        }
    }

    /// Fetch the chosen stream, normalize its container and verify the output.
    pub async fn run(
        &self,
        request: &ConversionRequest,
        media: &ResolvedMedia,
        choice: &FormatChoice,
        progress: &dyn ProgressEmitter,
    ) -> PipelineResult {
        let plan = self.layout.plan(request, &media.canonical_id);
        let work_dir = plan.work_dir.clone();
        let outcome = self.produce(plan, media, choice, progress).await;

        match outcome {
            Ok(path) => {
                info!(
                    request_id = %request.id,
                    kind = request.kind.label(),
                    path = %path.display(),
                    "conversion finished"
                );
                PipelineResult::succeeded(path, media.title.clone())
            }
            Err(e) => {
                error!(request_id = %request.id, error_kind = e.kind(), "conversion failed: {}", e);
                artifacts::discard(&work_dir).await;
                PipelineResult::failed(e.to_string())
            }
        }
    }

    async fn produce(
        &self,
        plan: ArtifactPlan,
        media: &ResolvedMedia,
        choice: &FormatChoice,
        progress: &dyn ProgressEmitter,
    ) -> Result<PathBuf, PipelineError> {
        plan.prepare()
            .await
            .map_err(|e| PipelineError::Fetch(format!("cannot create {}: {}", plan.work_dir.display(), e)))?;

        progress
            .emit(Stage::Downloading { title: media.title.clone() })
            .await;
        let network = self.proxies.network_config(Some(self.socket_timeout));
        let raw = self
            .fetcher
            .fetch(&media.source_url, choice, &plan.raw_stem, &network)
            .await?;
        if !tokio::fs::try_exists(&raw).await.unwrap_or(false) {
            return Err(PipelineError::PostDownloadVerification(raw));
        }

        let artifact = plan.with_raw(raw);
        if artifact.needs_transcode() {
            progress
                .emit(Stage::Converting { title: media.title.clone() })
                .await;
        }
        artifact.finalize(self.transcoder.as_ref()).await?;

        match tokio::fs::try_exists(&artifact.final_path).await {
            Ok(true) => Ok(artifact.final_path),
            _ => Err(PipelineError::PostDownloadVerification(artifact.final_path)),
        }
    }

    /// Whole request: resolve, select and run. Resolution and selection errors
    /// end the request before anything is written to disk.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        policy: SelectionPolicy,
        prompt: &dyn SelectionPrompt,
        progress: &dyn ProgressEmitter,
    ) -> PipelineResult {
        info!(
            request_id = %request.id,
            kind = request.kind.label(),
            source = %request.source,
            ?policy,
            "conversion requested"
        );

        progress.emit(Stage::Resolving).await;
        let media = match self.resolve(&request.source).await {
            Ok(media) => media,
            Err(e) => {
                warn!(request_id = %request.id, error_kind = e.kind(), "{}", e);
                return PipelineResult::failed(e.to_string());
            }
        };

        if policy == SelectionPolicy::Interactive && request.format_id.is_none() {
            progress.emit(Stage::Selecting).await;
        }
        let choice = match self.select(request, &media, policy, prompt).await {
            Ok(choice) => choice,
            Err(e) => {
                warn!(request_id = %request.id, error_kind = e.kind(), "{}", e);
                return PipelineResult::failed(e.to_string());
            }
        };

        info!(
            request_id = %request.id,
            format = %choice.spec,
            label = %choice.label,
            "format selected"
        );
        self.run(request, &media, &choice, progress).await
    }
}

/// Absolute http(s) URLs are fetched as given; anything else is a search.
pub fn normalize_source(source: &str) -> String {
    let trimmed = source.trim();
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => trimmed.to_string(),
        _ => format!("ytsearch1:{}", trimmed),
    }
}
