pub mod bot;
pub mod config;
pub mod context;
pub mod downloader;
pub mod keep_alive;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use serenity::all::{Client, GatewayIntents};
use tracing::{info, warn};

use bot::Handler;
use config::Settings;
use context::AppContext;
use downloader::tools::{ToolInfo, ToolManager, ToolType};
use downloader::{CliInfoExtractor, FfmpegTranscoder, OutputLayout, Pipeline, ProxyPool, YtDlpBackend};

/// Locate yt-dlp and ffmpeg. Blocking probes run off the runtime threads.
async fn discover_tools(settings: &Settings) -> anyhow::Result<(ToolInfo, ToolInfo)> {
    let ytdlp_override = settings.ytdlp_path.clone();
    let ffmpeg_override = settings.ffmpeg_path.clone();

    let tools = tokio::task::spawn_blocking(move || {
        let manager = ToolManager::new();
        (
            manager.get_tool_info(ToolType::YtDlp, ytdlp_override.as_deref()),
            manager.get_tool_info(ToolType::Ffmpeg, ffmpeg_override.as_deref()),
        )
    })
    .await
    .context("tool discovery task failed")?;

    for tool in [&tools.0, &tools.1] {
        match &tool.version {
            Some(version) => info!(tool = %tool.name, path = %tool.path, %version, "tool found"),
            None => warn!(tool = %tool.name, path = %tool.path, "tool not available, conversions will fail"),
        }
    }
    Ok(tools)
}

/// A discovered ffmpeg outside `PATH` has to be handed to yt-dlp explicitly.
fn ffmpeg_location(ffmpeg: &ToolInfo) -> Option<String> {
    let has_dir = Path::new(&ffmpeg.path)
        .parent()
        .is_some_and(|dir| !dir.as_os_str().is_empty());
    (ffmpeg.is_available && has_dir).then(|| ffmpeg.path.clone())
}

fn build_pipeline(settings: &Settings, ytdlp: &ToolInfo, ffmpeg: &ToolInfo) -> Pipeline {
    let layout = OutputLayout::new(&settings.audio_dir, &settings.video_dir);
    Pipeline::new(
        Box::new(CliInfoExtractor::new(&ytdlp.path)),
        Box::new(
            YtDlpBackend::new(&ytdlp.path, settings.download_timeout_secs)
                .with_ffmpeg_location(ffmpeg_location(ffmpeg)),
        ),
        Box::new(FfmpegTranscoder::new(&ffmpeg.path, settings.download_timeout_secs)),
        layout,
    )
    .with_proxies(ProxyPool::new(settings.proxies.clone()))
    .with_socket_timeout(settings.socket_timeout_secs)
}

pub async fn run() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;
    info!(
        prefix = %settings.prefix,
        proxies = settings.proxies.len(),
        retention_secs = settings.retention.as_secs(),
        "configuration loaded"
    );

    let (ytdlp, ffmpeg) = discover_tools(&settings).await?;
    let pipeline = build_pipeline(&settings, &ytdlp, &ffmpeg);

    let swept = pipeline.layout().sweep_stale().await;
    if swept > 0 {
        info!(count = swept, "removed request files left by a previous run");
    }

    if let Some(addr) = settings.keep_alive_addr {
        keep_alive::spawn(addr)
            .await
            .with_context(|| format!("cannot bind keep-alive endpoint on {}", addr))?;
    }

    let app = Arc::new(AppContext::new(settings, pipeline));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&app.settings.token, intents)
        .event_handler(Handler::new(app.clone()))
        .await
        .context("Failed to create Discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await.context("Discord client error")?;
    info!("Discord client stopped");
    Ok(())
}
