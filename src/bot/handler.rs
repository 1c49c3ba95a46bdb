// Serenity EventHandler that routes prefix commands and prompt clicks

use std::sync::Arc;

use serenity::all::{
    ActivityData, ChannelId, ComponentInteractionDataKind, Context, CreateInteractionResponse,
    CreateInteractionResponseMessage, EventHandler, Interaction, Message, Ready,
};
use serenity::async_trait;
use tracing::{debug, info, warn};

use super::admin;
use super::commands::{self, Command, Parsed};
use super::delivery::DeliveryOutcome;
use super::discord::{ChannelUploader, DiscordProgress, DiscordPrompt};
use super::prompts::parse_custom_id;
use crate::context::AppContext;
use crate::downloader::{ConversionRequest, MediaKind, ProgressEmitter, SelectionPolicy, Stage};

pub struct Handler {
    app: Arc<AppContext>,
}

impl Handler {
    pub fn new(app: Arc<AppContext>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        // Skip messages from bots
        if msg.author.bot {
            return;
        }

        let command = match commands::parse(&self.app.settings.prefix, &msg.content) {
            Parsed::Ignored => return,
            Parsed::Usage(text) => {
                admin::say(&ctx, msg.channel_id, &text).await;
                return;
            }
            Parsed::Command(command) => command,
        };
        debug!(author = %msg.author.id, ?command, "command received");

        match command {
            Command::Convert {
                kind,
                policy,
                source,
                format_id,
            } => {
                let request = ConversionRequest::new(msg.author.id.get(), source, kind).with_format(format_id);
                let app = self.app.clone();
                let channel_id = msg.channel_id;
                // Conversions outlive the event; run them on their own task
                tokio::spawn(async move {
                    convert(ctx, app, channel_id, request, policy).await;
                });
            }
            Command::Ping => admin::ping(&ctx, msg.channel_id).await,
            Command::Uptime => admin::uptime(&ctx, msg.channel_id, &self.app).await,
            Command::Help => admin::help(&ctx, msg.channel_id, &self.app.settings.prefix).await,
            Command::Guilds => admin::guilds(&ctx, msg.channel_id, &self.app, msg.author.id).await,
            Command::Leave(guild) => admin::leave(&ctx, msg.channel_id, &self.app, msg.author.id, guild).await,
            Command::GuildInfo(guild) => {
                admin::guild_info(&ctx, msg.channel_id, &self.app, msg.author.id, guild).await
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Component(component) = interaction else {
            return;
        };
        let Some(prompt_id) = parse_custom_id(&component.data.custom_id) else {
            return;
        };

        let choice = match &component.data.kind {
            ComponentInteractionDataKind::StringSelect { values } => values.first().cloned().unwrap_or_default(),
            _ => String::new(),
        };

        let response = match self
            .app
            .prompts
            .answer(prompt_id, component.user.id.get(), &choice)
            .await
        {
            Ok(()) => CreateInteractionResponse::Acknowledge,
            Err(e) => CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(format!("`{}`", e))
                    .ephemeral(true),
            ),
        };

        if let Err(e) = component.create_response(&ctx.http, response).await {
            warn!(%prompt_id, "failed to answer interaction: {}", e);
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            bot_name = ready.user.name,
            guilds = ready.guilds.len(),
            "Discord bot connected and ready"
        );
        let status = format!("YouTube | {}help", self.app.settings.prefix);
        ctx.set_activity(Some(ActivityData::watching(status)));
    }
}

async fn convert(
    ctx: Context,
    app: Arc<AppContext>,
    channel_id: ChannelId,
    request: ConversionRequest,
    policy: SelectionPolicy,
) {
    let typing = channel_id.start_typing(&ctx.http);
    let kind: MediaKind = request.kind;
    let requester = request.requester;

    let progress = DiscordProgress::new(ctx.http.clone(), channel_id, kind);
    let prompt = DiscordPrompt {
        http: ctx.http.clone(),
        channel_id,
        registry: &app.prompts,
        timeout: app.settings.selection_timeout,
    };

    let result = app.pipeline.convert(&request, policy, &prompt, &progress).await;

    if let Some(title) = result.title.clone().filter(|_| result.success) {
        progress.emit(Stage::Uploading { title }).await;
    }

    let uploader = ChannelUploader {
        http: ctx.http.clone(),
        channel_id,
        requester,
    };
    let report = app.delivery.deliver(result, requester, kind, &uploader).await;
    if report.outcome == DeliveryOutcome::Delivered {
        progress.emit(Stage::Finished).await;
    }

    typing.stop();
    info!(
        request_id = %request.id,
        requester,
        outcome = ?report.outcome,
        "request finished"
    );
}
