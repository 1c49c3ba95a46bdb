// End-to-end request scenarios with fake tools and a fake chat transport

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ytconvert_bot_lib::bot::delivery::{Delivery, DeliveryOutcome, Uploader};
use ytconvert_bot_lib::bot::prompts::PromptRegistry;
use ytconvert_bot_lib::downloader::{
    ConversionRequest, ExtendedFormat, ExtendedVideoInfo, ExtractorConfig, FormatChoice, FormatOption, InfoExtractor,
    MediaFetcher, MediaKind, NetworkConfig, NoProgress, OutputLayout, Pipeline, PipelineError, ProgressEmitter,
    ResolvedMedia, SelectionPolicy, SelectionPrompt, Stage, Transcoder,
};

fn audio_format(id: &str, ext: &str, abr: f32) -> ExtendedFormat {
    ExtendedFormat {
        format_id: id.to_string(),
        ext: ext.to_string(),
        vcodec: Some("none".to_string()),
        acodec: Some(if ext == "m4a" { "mp4a.40.2" } else { "opus" }.to_string()),
        abr: Some(abr),
        ..Default::default()
    }
}

fn combined_format(id: &str, ext: &str, height: u32) -> ExtendedFormat {
    ExtendedFormat {
        format_id: id.to_string(),
        ext: ext.to_string(),
        height: Some(height),
        vcodec: Some(if ext == "mp4" { "avc1.64001F" } else { "vp9" }.to_string()),
        acodec: Some(if ext == "mp4" { "mp4a.40.2" } else { "opus" }.to_string()),
        ..Default::default()
    }
}

struct FakeExtractor {
    result: Result<ExtendedVideoInfo, PipelineError>,
    sources: Arc<Mutex<Vec<String>>>,
}

impl FakeExtractor {
    fn media(id: &str, title: &str, formats: Vec<ExtendedFormat>) -> Self {
        Self {
            result: Ok(ExtendedVideoInfo {
                id: id.to_string(),
                title: title.to_string(),
                uploader: "Uploader".to_string(),
                duration_seconds: 212,
                webpage_url: format!("https://www.youtube.com/watch?v={}", id),
                formats,
            }),
            sources: Arc::default(),
        }
    }

    fn failing(err: PipelineError) -> Self {
        Self {
            result: Err(err),
            sources: Arc::default(),
        }
    }
}

#[async_trait]
impl InfoExtractor for FakeExtractor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn extract(&self, source: &str, _config: &ExtractorConfig) -> Result<ExtendedVideoInfo, PipelineError> {
        self.sources.lock().unwrap().push(source.to_string());
        self.result.clone()
    }
}

/// Writes `<raw_stem>.<container>` like yt-dlp would
struct FakeFetcher {
    container: &'static str,
    writes_file: bool,
    fail_with: Option<PipelineError>,
    calls: Arc<Mutex<Vec<FormatChoice>>>,
}

impl FakeFetcher {
    fn writing(container: &'static str) -> Self {
        Self {
            container,
            writes_file: true,
            fail_with: None,
            calls: Arc::default(),
        }
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch(
        &self,
        _source: &str,
        choice: &FormatChoice,
        raw_stem: &Path,
        _network: &NetworkConfig,
    ) -> Result<PathBuf, PipelineError> {
        self.calls.lock().unwrap().push(choice.clone());
        let path = PathBuf::from(format!("{}.{}", raw_stem.display(), self.container));
        if self.writes_file {
            tokio::fs::write(&path, b"media bytes").await.unwrap();
        }
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(path),
        }
    }
}

struct CopyTranscoder {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Transcoder for CopyTranscoder {
    fn name(&self) -> &'static str {
        "copy"
    }

    async fn transcode(&self, input: &Path, output: &Path, _kind: MediaKind) -> Result<(), PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::copy(input, output)
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::Transcode(e.to_string()))
    }
}

/// Answers every prompt with a fixed id and records what was offered
struct FixedPrompt {
    answer: String,
    offered: Mutex<Vec<String>>,
}

#[async_trait]
impl SelectionPrompt for FixedPrompt {
    async fn choose(
        &self,
        _request: &ConversionRequest,
        _media: &ResolvedMedia,
        options: &[FormatOption],
    ) -> Result<String, PipelineError> {
        *self.offered.lock().unwrap() = options.iter().map(|o| o.format_id.clone()).collect();
        Ok(self.answer.clone())
    }
}

/// Opens a real registry prompt that nobody answers
struct SilentPrompt {
    registry: PromptRegistry,
    timeout: Duration,
}

#[async_trait]
impl SelectionPrompt for SilentPrompt {
    async fn choose(
        &self,
        request: &ConversionRequest,
        _media: &ResolvedMedia,
        options: &[FormatOption],
    ) -> Result<String, PipelineError> {
        let ids = options.iter().map(|o| o.format_id.clone()).collect();
        let ticket = self.registry.open(request.requester, ids).await;
        self.registry.wait(ticket, self.timeout).await
    }
}

#[derive(Default)]
struct RecordingProgress {
    stages: Mutex<Vec<Stage>>,
}

#[async_trait]
impl ProgressEmitter for RecordingProgress {
    async fn emit(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }
}

#[derive(Default)]
struct RecordingUploader {
    uploads: Mutex<Vec<(PathBuf, String)>>,
    notices: Mutex<Vec<String>>,
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(&self, path: &Path, content: &str) -> Result<(), PipelineError> {
        assert!(path.exists(), "uploaded file must exist");
        self.uploads.lock().unwrap().push((path.to_path_buf(), content.to_string()));
        Ok(())
    }

    async fn notify(&self, content: &str) -> Result<(), PipelineError> {
        self.notices.lock().unwrap().push(content.to_string());
        Ok(())
    }
}

struct Harness {
    root: tempfile::TempDir,
    fetches: Arc<Mutex<Vec<FormatChoice>>>,
    transcodes: Arc<AtomicUsize>,
    pipeline: Pipeline,
}

fn harness(extractor: FakeExtractor, fetcher: FakeFetcher) -> Harness {
    let root = tempfile::tempdir().unwrap();
    let fetches = fetcher.calls.clone();
    let transcodes = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new(
        Box::new(extractor),
        Box::new(fetcher),
        Box::new(CopyTranscoder {
            calls: transcodes.clone(),
        }),
        OutputLayout::new(root.path().join("mp3"), root.path().join("mp4")),
    );
    Harness {
        root,
        fetches,
        transcodes,
        pipeline,
    }
}

fn no_prompt() -> FixedPrompt {
    FixedPrompt {
        answer: String::new(),
        offered: Mutex::new(Vec::new()),
    }
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(files_under(&path));
        } else {
            found.push(path);
        }
    }
    found
}

#[tokio::test]
async fn audio_request_picks_best_audio_and_removes_file_after_retention() {
    let h = harness(
        FakeExtractor::media("dQw4w9WgXcQ", "Never Gonna Give You Up", vec![audio_format("140", "m4a", 129.5)]),
        FakeFetcher::writing("m4a"),
    );
    let request = ConversionRequest::new(42, "https://www.youtube.com/watch?v=dQw4w9WgXcQ", MediaKind::Audio);

    let result = h
        .pipeline
        .convert(&request, SelectionPolicy::Automatic, &no_prompt(), &NoProgress)
        .await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(h.fetches.lock().unwrap()[0].spec, "140");
    assert_eq!(h.transcodes.load(Ordering::SeqCst), 1);

    let path = result.path.clone().unwrap();
    assert_eq!(path.file_name().unwrap(), "dQw4w9WgXcQ.mp3");
    assert!(path.starts_with(h.root.path().join("mp3")));
    assert_eq!(files_under(h.root.path()), vec![path.clone()]);

    let uploader = RecordingUploader::default();
    let report = Delivery::new(Duration::from_millis(50), 25 * 1024 * 1024)
        .deliver(result, 42, MediaKind::Audio, &uploader)
        .await;

    assert_eq!(report.outcome, DeliveryOutcome::Delivered);
    assert_eq!(
        uploader.uploads.lock().unwrap()[0].1,
        "<@42>, `Here is the converted audio: Never Gonna Give You Up`"
    );
    assert!(path.exists());

    report.cleanup.unwrap().await.unwrap();
    assert!(files_under(h.root.path()).is_empty());
}

#[tokio::test]
async fn interactive_video_choice_converts_webm_into_mp4() {
    let h = harness(
        FakeExtractor::media(
            "abc123",
            "Clip",
            vec![
                combined_format("18", "mp4", 360),
                combined_format("22", "mp4", 720),
                combined_format("43", "webm", 360),
                audio_format("140", "m4a", 129.0),
            ],
        ),
        FakeFetcher::writing("webm"),
    );
    let prompt = FixedPrompt {
        answer: "22".to_string(),
        offered: Mutex::new(Vec::new()),
    };
    let progress = RecordingProgress::default();
    let request = ConversionRequest::new(7, "https://youtu.be/abc123", MediaKind::Video);

    let result = h
        .pipeline
        .convert(&request, SelectionPolicy::Interactive, &prompt, &progress)
        .await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    let offered = prompt.offered.lock().unwrap().clone();
    assert!(offered.contains(&"22".to_string()));
    assert!(!offered.contains(&"140".to_string()));

    assert_eq!(h.fetches.lock().unwrap()[0].format_id, "22");
    assert_eq!(h.transcodes.load(Ordering::SeqCst), 1);

    let path = result.path.unwrap();
    assert_eq!(path.file_name().unwrap(), "abc123.mp4");
    assert_eq!(files_under(h.root.path()), vec![path]);

    let stages = progress.stages.lock().unwrap().clone();
    assert_eq!(stages.first(), Some(&Stage::Resolving));
    assert!(stages.contains(&Stage::Selecting));
    assert!(stages.contains(&Stage::Converting { title: "Clip".to_string() }));
}

#[tokio::test]
async fn unanswered_prompt_times_out_without_downloading() {
    let h = harness(
        FakeExtractor::media("abc123", "Clip", vec![combined_format("22", "mp4", 720)]),
        FakeFetcher::writing("mp4"),
    );
    let prompt = SilentPrompt {
        registry: PromptRegistry::new(),
        timeout: Duration::from_millis(30),
    };
    let request = ConversionRequest::new(7, "https://youtu.be/abc123", MediaKind::Video);

    let result = h
        .pipeline
        .convert(&request, SelectionPolicy::Interactive, &prompt, &NoProgress)
        .await;

    assert!(!result.success);
    let expected = PipelineError::SelectionTimeout { waited_secs: 0 }.to_string();
    assert_eq!(result.error.as_deref(), Some(expected.as_str()));
    assert!(h.fetches.lock().unwrap().is_empty());
    assert_eq!(prompt.registry.pending_count().await, 0);
    assert!(files_under(h.root.path()).is_empty());
}

#[tokio::test]
async fn private_video_is_reported_once_and_leaves_no_files() {
    let err = PipelineError::from_resolution_stderr(
        "ERROR: [youtube] abc123: Private video. Sign in if you've been granted access to this video",
    );
    let h = harness(FakeExtractor::failing(err), FakeFetcher::writing("m4a"));
    let request = ConversionRequest::new(1, "https://youtu.be/abc123", MediaKind::Audio);

    let result = h
        .pipeline
        .convert(&request, SelectionPolicy::Automatic, &no_prompt(), &NoProgress)
        .await;

    assert!(!result.success);
    assert!(result.path.is_none());
    assert!(h.fetches.lock().unwrap().is_empty());

    let uploader = RecordingUploader::default();
    let report = Delivery::new(Duration::ZERO, 1024)
        .deliver(result, 1, MediaKind::Audio, &uploader)
        .await;

    assert!(matches!(report.outcome, DeliveryOutcome::ConversionFailed(_)));
    let notices = uploader.notices.lock().unwrap().clone();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].starts_with("`Conversion failed. Please check the input and try again."));
    assert!(notices[0].contains("Private video"));
    assert!(uploader.uploads.lock().unwrap().is_empty());
    assert!(files_under(h.root.path()).is_empty());
}

#[tokio::test]
async fn failed_download_removes_partial_files() {
    let mut fetcher = FakeFetcher::writing("webm");
    fetcher.fail_with = Some(PipelineError::Fetch("HTTP Error 403: Forbidden".to_string()));
    let h = harness(
        FakeExtractor::media("abc123", "Clip", vec![audio_format("251", "webm", 160.0)]),
        fetcher,
    );
    let request = ConversionRequest::new(1, "https://youtu.be/abc123", MediaKind::Audio);

    let result = h
        .pipeline
        .convert(&request, SelectionPolicy::Automatic, &no_prompt(), &NoProgress)
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("403"));
    assert_eq!(h.transcodes.load(Ordering::SeqCst), 0);
    assert!(files_under(h.root.path()).is_empty());
}

#[tokio::test]
async fn explicit_format_must_be_offered() {
    let h = harness(
        FakeExtractor::media("abc123", "Clip", vec![audio_format("140", "m4a", 129.0)]),
        FakeFetcher::writing("m4a"),
    );
    let request =
        ConversionRequest::new(1, "https://youtu.be/abc123", MediaKind::Audio).with_format(Some("999".to_string()));

    let result = h
        .pipeline
        .convert(&request, SelectionPolicy::Automatic, &no_prompt(), &NoProgress)
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Invalid selection"));
    assert!(h.fetches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn search_text_resolves_through_first_result() {
    let extractor = FakeExtractor::media("abc123", "Song", vec![audio_format("140", "m4a", 129.0)]);
    let sources = extractor.sources.clone();
    let h = harness(extractor, FakeFetcher::writing("mp3"));
    let request = ConversionRequest::new(1, "some song name", MediaKind::Audio);

    let result = h
        .pipeline
        .convert(&request, SelectionPolicy::Automatic, &no_prompt(), &NoProgress)
        .await;

    assert!(result.success);
    assert_eq!(sources.lock().unwrap()[0], "ytsearch1:some song name");
    // Already mp3: renamed, not re-encoded
    assert_eq!(h.transcodes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn identical_concurrent_requests_do_not_collide() {
    let h = harness(
        FakeExtractor::media("abc123", "Song", vec![audio_format("140", "m4a", 129.0)]),
        FakeFetcher::writing("m4a"),
    );
    let first = ConversionRequest::new(1, "https://youtu.be/abc123", MediaKind::Audio);
    let second = ConversionRequest::new(2, "https://youtu.be/abc123", MediaKind::Audio);
    let (prompt_a, prompt_b) = (no_prompt(), no_prompt());

    let (a, b) = tokio::join!(
        h.pipeline.convert(&first, SelectionPolicy::Automatic, &prompt_a, &NoProgress),
        h.pipeline.convert(&second, SelectionPolicy::Automatic, &prompt_b, &NoProgress),
    );

    assert!(a.success && b.success);
    let (pa, pb) = (a.path.unwrap(), b.path.unwrap());
    assert_ne!(pa, pb);
    assert_eq!(pa.file_name(), pb.file_name());
    assert!(pa.exists() && pb.exists());
}

#[tokio::test]
async fn missing_download_is_a_verification_failure() {
    let mut fetcher = FakeFetcher::writing("mp3");
    fetcher.writes_file = false;
    let h = harness(
        FakeExtractor::media("abc123", "Song", vec![audio_format("140", "m4a", 129.0)]),
        fetcher,
    );
    let request = ConversionRequest::new(1, "https://youtu.be/abc123", MediaKind::Audio);

    let result = h
        .pipeline
        .convert(&request, SelectionPolicy::Automatic, &no_prompt(), &NoProgress)
        .await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.starts_with("The downloaded file does not exist"), "got: {}", error);
    assert_eq!(h.transcodes.load(Ordering::SeqCst), 0);
    assert!(files_under(h.root.path()).is_empty());
}

#[tokio::test]
async fn repeated_request_is_delivered_independently() {
    let h = harness(
        FakeExtractor::media("abc123", "Song", vec![audio_format("140", "m4a", 129.0)]),
        FakeFetcher::writing("m4a"),
    );
    let delivery = Delivery::new(Duration::from_millis(50), 25 * 1024 * 1024);
    let uploader = RecordingUploader::default();

    let first = ConversionRequest::new(5, "https://youtu.be/abc123", MediaKind::Audio);
    let result = h
        .pipeline
        .convert(&first, SelectionPolicy::Automatic, &no_prompt(), &NoProgress)
        .await;
    let first_path = result.path.clone().unwrap();
    let report = delivery.deliver(result, 5, MediaKind::Audio, &uploader).await;
    assert_eq!(report.outcome, DeliveryOutcome::Delivered);
    report.cleanup.unwrap().await.unwrap();
    assert!(files_under(h.root.path()).is_empty());

    let second = ConversionRequest::new(5, "https://youtu.be/abc123", MediaKind::Audio);
    let result = h
        .pipeline
        .convert(&second, SelectionPolicy::Automatic, &no_prompt(), &NoProgress)
        .await;
    let second_path = result.path.clone().unwrap();
    assert_ne!(first_path, second_path);
    assert_eq!(files_under(h.root.path()), vec![second_path.clone()]);

    let report = delivery.deliver(result, 5, MediaKind::Audio, &uploader).await;
    assert_eq!(report.outcome, DeliveryOutcome::Delivered);
    assert!(second_path.exists());
    report.cleanup.unwrap().await.unwrap();
    assert!(files_under(h.root.path()).is_empty());

    let uploads = uploader.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].0, first_path);
    assert_eq!(uploads[1].0, second_path);
    assert_eq!(h.fetches.lock().unwrap().len(), 2);
}
