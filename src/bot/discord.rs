// Serenity-backed implementations of the pipeline seams

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::all::{
    ChannelId, CreateActionRow, CreateAllowedMentions, CreateAttachment, CreateMessage, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption, EditMessage, Http, Message, UserId,
};
use tokio::sync::Mutex;
use tracing::warn;

use super::delivery::Uploader;
use super::prompts::PromptRegistry;
use crate::downloader::{
    ConversionRequest, FormatOption, FormatSelector, MediaKind, PipelineError, ProgressEmitter, ResolvedMedia,
    SelectionPrompt, Stage,
};

/// Discord rejects select-menu labels and descriptions over 100 characters
const MENU_TEXT_LIMIT: usize = 100;

/// Shows a select menu and waits for the requester's pick
pub struct DiscordPrompt<'a> {
    pub http: Arc<Http>,
    pub channel_id: ChannelId,
    pub registry: &'a PromptRegistry,
    pub timeout: Duration,
}

#[async_trait]
impl<'a> SelectionPrompt for DiscordPrompt<'a> {
    async fn choose(
        &self,
        request: &ConversionRequest,
        media: &ResolvedMedia,
        options: &[FormatOption],
    ) -> Result<String, PipelineError> {
        let ids = options.iter().map(|o| o.format_id.clone()).collect();
        let ticket = self.registry.open(request.requester, ids).await;

        let menu_options = options
            .iter()
            .map(|o| {
                CreateSelectMenuOption::new(clip(&format!("{} ({})", o.label, o.format_id)), o.format_id.clone())
                    .description(clip(&FormatSelector::describe(o)))
            })
            .collect();
        let menu = CreateSelectMenu::new(ticket.custom_id(), CreateSelectMenuKind::String { options: menu_options })
            .placeholder("Choose a format")
            .min_values(1)
            .max_values(1);

        let builder = CreateMessage::new()
            .content(format!(
                "<@{}>, `Choose a {} format for: {}` (expires in {}s)",
                request.requester,
                request.kind.label(),
                media.title,
                self.timeout.as_secs()
            ))
            .components(vec![CreateActionRow::SelectMenu(menu)])
            .allowed_mentions(requester_only(request.requester));

        let mut prompt_message = match self.channel_id.send_message(&self.http, builder).await {
            Ok(message) => message,
            Err(e) => {
                self.registry.cancel(ticket.id).await;
                return Err(PipelineError::Delivery(format!("could not show the format menu: {}", e)));
            }
        };

        let answer = self.registry.wait(ticket, self.timeout).await;

        let closing = match &answer {
            Ok(id) => format!("`Selected format {}`", id),
            Err(e) => format!("`{}`", e),
        };
        let edit = EditMessage::new().content(closing).components(Vec::new());
        if let Err(e) = prompt_message.edit(&self.http, edit).await {
            warn!("could not close the format menu: {}", e);
        }

        answer
    }
}

/// Edits a single status message as the request advances
pub struct DiscordProgress {
    http: Arc<Http>,
    channel_id: ChannelId,
    kind: MediaKind,
    status: Mutex<Option<Message>>,
}

impl DiscordProgress {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, kind: MediaKind) -> Self {
        Self {
            http,
            channel_id,
            kind,
            status: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ProgressEmitter for DiscordProgress {
    async fn emit(&self, stage: Stage) {
        let text = stage_text(&stage, self.kind);
        let mut status = self.status.lock().await;

        let result = if let Some(message) = status.as_mut() {
            message.edit(&self.http, EditMessage::new().content(text)).await
        } else {
            match self
                .channel_id
                .send_message(
                    &self.http,
                    CreateMessage::new()
                        .content(text)
                        .allowed_mentions(CreateAllowedMentions::new()),
                )
                .await
            {
                Ok(message) => {
                    *status = Some(message);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        if let Err(e) = result {
            warn!(?stage, "could not update status message: {}", e);
        }
    }
}

pub fn stage_text(stage: &Stage, kind: MediaKind) -> String {
    match stage {
        Stage::Resolving => "`Fetching video information...`".to_string(),
        Stage::Selecting => "`Waiting for a format choice...`".to_string(),
        Stage::Downloading { title } => format!("`Downloading: {}`", title),
        Stage::Converting { title } => format!("`Converting to {}: {}`", kind.label(), title),
        Stage::Uploading { title } => format!("`Uploading: {}...`", title),
        Stage::Finished => "`Upload complete.`".to_string(),
    }
}

/// Posts into the channel the command came from
pub struct ChannelUploader {
    pub http: Arc<Http>,
    pub channel_id: ChannelId,
    pub requester: u64,
}

#[async_trait]
impl Uploader for ChannelUploader {
    async fn upload(&self, path: &Path, content: &str) -> Result<(), PipelineError> {
        let attachment = CreateAttachment::path(path)
            .await
            .map_err(|e| PipelineError::Delivery(format!("cannot attach {}: {}", path.display(), e)))?;

        self.channel_id
            .send_message(
                &self.http,
                CreateMessage::new()
                    .content(content)
                    .add_file(attachment)
                    .allowed_mentions(requester_only(self.requester)),
            )
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::Delivery(e.to_string()))
    }

    async fn notify(&self, content: &str) -> Result<(), PipelineError> {
        let builder = CreateMessage::new()
            .content(content)
            .allowed_mentions(requester_only(self.requester));
        self.channel_id
            .send_message(&self.http, builder)
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::Delivery(e.to_string()))
    }
}

/// Media titles are untrusted text; only the requester may be pinged.
fn requester_only(requester: u64) -> CreateAllowedMentions {
    CreateAllowedMentions::new().users([UserId::new(requester)])
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MENU_TEXT_LIMIT {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(MENU_TEXT_LIMIT - 1).collect();
    clipped.push('…');
    clipped
}
