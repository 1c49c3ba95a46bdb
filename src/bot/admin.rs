// Informational and owner-only guild commands

use std::time::Instant;

use serenity::all::{ChannelId, Context, CreateEmbed, CreateMessage, GuildId, UserId};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::context::AppContext;

const EMBED_COLOUR: u32 = 0xff342c;
/// Discord caps embed descriptions at 4096 and field values at 1024 characters
const DESCRIPTION_LIMIT: usize = 4096;
const FIELD_LIMIT: usize = 1024;

const NO_PERMISSION: &str = "`You do not have permission to use this command.`";
const GUILD_NOT_FOUND: &str = "`Guild not found.`";

pub async fn ping(ctx: &Context, channel_id: ChannelId) {
    let started = Instant::now();
    let latency = match ctx.http.get_current_user().await {
        Ok(_) => format!("{}ms", started.elapsed().as_millis()),
        Err(e) => {
            warn!("latency probe failed: {}", e);
            "unavailable".to_string()
        }
    };

    let embed = CreateEmbed::new()
        .title("Ping Command")
        .colour(EMBED_COLOUR)
        .field("Latency", latency, false);
    send_embed(ctx, channel_id, embed).await;
}

pub async fn uptime(ctx: &Context, channel_id: ChannelId, app: &AppContext) {
    let elapsed = OffsetDateTime::now_utc() - app.started_at;
    let embed = CreateEmbed::new()
        .title("Uptime Command")
        .colour(EMBED_COLOUR)
        .field("Uptime", format_uptime(elapsed), false);
    send_embed(ctx, channel_id, embed).await;
}

pub async fn help(ctx: &Context, channel_id: ChannelId, prefix: &str) {
    let entries = [
        ("ytmp3 [URL or search] [-f id]", "Converts a video to MP3, picking the best audio. `recommended`"),
        ("ytmp4 [URL or search] [-f id]", "Converts a video to MP4, picking the most compatible format. `recommended`"),
        ("mp3 [URL]", "Converts a video to MP3 after you choose a format."),
        ("mp4 [URL]", "Converts a video to MP4 after you choose a format."),
        ("ping", "Displays the bot's latency."),
        ("uptime", "Shows how long the bot has been running."),
    ];

    let embed = entries.iter().fold(
        CreateEmbed::new().title("Bot Commands").colour(EMBED_COLOUR),
        |embed, (usage, about)| embed.field(format!("{}{}", prefix, usage), *about, false),
    );
    send_embed(ctx, channel_id, embed).await;
}

pub async fn guilds(ctx: &Context, channel_id: ChannelId, app: &AppContext, author: UserId) {
    if !app.is_owner(author.get()) {
        say(ctx, channel_id, NO_PERMISSION).await;
        return;
    }

    let listed: Vec<(String, u64)> = ctx
        .cache
        .guilds()
        .into_iter()
        .map(|id| {
            let name = ctx
                .cache
                .guild(id)
                .map(|g| g.name.clone())
                .unwrap_or_else(|| "Unknown".to_string());
            (name, id.get())
        })
        .collect();

    let embed = CreateEmbed::new()
        .title("List of Joined Guilds")
        .colour(EMBED_COLOUR)
        .description(guild_list(&listed));
    send_embed(ctx, channel_id, embed).await;
}

pub async fn leave(ctx: &Context, channel_id: ChannelId, app: &AppContext, author: UserId, guild: u64) {
    if !app.is_owner(author.get()) {
        say(ctx, channel_id, NO_PERMISSION).await;
        return;
    }

    let guild_id = GuildId::new(guild);
    let Some(name) = ctx.cache.guild(guild_id).map(|g| g.name.clone()) else {
        say(ctx, channel_id, GUILD_NOT_FOUND).await;
        return;
    };

    match guild_id.leave(&ctx.http).await {
        Ok(()) => {
            info!(guild_id = guild, "left guild");
            say(ctx, channel_id, &format!("`Left the guild: {}`", name)).await;
        }
        Err(e) => say(ctx, channel_id, &format!("`Could not leave the guild: {}`", e)).await,
    }
}

pub async fn guild_info(ctx: &Context, channel_id: ChannelId, app: &AppContext, author: UserId, guild: u64) {
    if !app.is_owner(author.get()) {
        say(ctx, channel_id, NO_PERMISSION).await;
        return;
    }

    let guild_id = GuildId::new(guild);
    // Copy out of the cache before awaiting
    let snapshot = ctx.cache.guild(guild_id).map(|g| {
        let mut channels: Vec<(String, u64)> =
            g.channels.values().map(|c| (c.name.clone(), c.id.get())).collect();
        channels.sort();
        (g.name.clone(), g.owner_id, channels)
    });
    let Some((name, owner_id, channels)) = snapshot else {
        say(ctx, channel_id, GUILD_NOT_FOUND).await;
        return;
    };

    let owner = match ctx.http.get_user(owner_id).await {
        Ok(user) => format!("{} (ID: {})", user.name, user.id),
        Err(e) => {
            warn!(guild_id = guild, "owner lookup failed: {}", e);
            say(ctx, channel_id, "`Owner not found.`").await;
            return;
        }
    };

    let mut embed = CreateEmbed::new()
        .title(format!("Guild Information: {}", name))
        .colour(EMBED_COLOUR)
        .field("Owner", owner, false)
        .field("Created", created_at(guild_id), false);
    let channel_text = truncate_lines(&format_entries(&channels), FIELD_LIMIT);
    if !channel_text.is_empty() {
        embed = embed.field("Channels", channel_text, false);
    }
    send_embed(ctx, channel_id, embed).await;
}

/// "D days, H hours, M minutes, S seconds"
pub fn format_uptime(elapsed: time::Duration) -> String {
    let total = elapsed.whole_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{} days, {} hours, {} minutes, {} seconds", days, hours, minutes, seconds)
}

pub fn guild_list(guilds: &[(String, u64)]) -> String {
    if guilds.is_empty() {
        return "Not in any guild.".to_string();
    }
    truncate_lines(&format_entries(guilds), DESCRIPTION_LIMIT)
}

fn format_entries(entries: &[(String, u64)]) -> String {
    entries
        .iter()
        .map(|(name, id)| format!("{} (ID: {})", name, id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep whole lines while the text fits in `limit` characters
fn truncate_lines(text: &str, limit: usize) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let needed = if out.is_empty() { line.len() } else { line.len() + 1 };
        if out.len() + needed > limit {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

fn created_at(guild_id: GuildId) -> String {
    OffsetDateTime::from_unix_timestamp(guild_id.created_at().unix_timestamp())
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn send_embed(ctx: &Context, channel_id: ChannelId, embed: CreateEmbed) {
    if let Err(e) = channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await
    {
        warn!("failed to send embed: {}", e);
    }
}

pub async fn say(ctx: &Context, channel_id: ChannelId, text: &str) {
    if let Err(e) = channel_id.say(&ctx.http, text).await {
        warn!("failed to send message: {}", e);
    }
}
