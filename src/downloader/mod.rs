// Downloader module - resolve, select, fetch and transcode media

pub mod artifacts;
pub mod backends;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod transcode;
pub mod utils;

pub use artifacts::{Artifact, ArtifactPlan, OutputLayout};
pub use backends::YtDlpBackend;
pub use errors::PipelineError;
pub use extractors::{CliInfoExtractor, ExtendedFormat, ExtendedVideoInfo, ExtractorConfig, InfoExtractor};
pub use format_selector::FormatSelector;
pub use models::{
    ConversionRequest, FormatChoice, FormatOption, MediaKind, NetworkConfig, PipelineResult, ResolvedMedia,
    SelectionPolicy, Stage,
};
pub use orchestrator::Pipeline;
pub use traits::{MediaFetcher, NoProgress, ProgressEmitter, SelectionPrompt, Transcoder};
pub use transcode::FfmpegTranscoder;
pub use utils::ProxyPool;
