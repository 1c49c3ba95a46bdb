// Prefix command parsing

use crate::downloader::{MediaKind, SelectionPolicy};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Convert {
        kind: MediaKind,
        policy: SelectionPolicy,
        source: String,
        format_id: Option<String>,
    },
    Ping,
    Uptime,
    Help,
    Guilds,
    Leave(u64),
    GuildInfo(u64),
}

/// Result of reading one message
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Not addressed to the bot, or an unknown command
    Ignored,
    Command(Command),
    /// Known command with bad arguments; the text is shown to the user
    Usage(String),
}

pub fn parse(prefix: &str, text: &str) -> Parsed {
    let Some(rest) = text.trim().strip_prefix(prefix) else {
        return Parsed::Ignored;
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().unwrap_or("").trim();

    match name.as_str() {
        "ytmp3" => convert(MediaKind::Audio, SelectionPolicy::Automatic, args),
        "ytmp4" => convert(MediaKind::Video, SelectionPolicy::Automatic, args),
        "mp3" => convert(MediaKind::Audio, SelectionPolicy::Interactive, args),
        "mp4" => convert(MediaKind::Video, SelectionPolicy::Interactive, args),
        "ping" => Parsed::Command(Command::Ping),
        "uptime" => Parsed::Command(Command::Uptime),
        "help" => Parsed::Command(Command::Help),
        "guilds" => Parsed::Command(Command::Guilds),
        "leave" => guild_id(args).map_or_else(|usage| usage, |id| Parsed::Command(Command::Leave(id))),
        "guildinfo" => guild_id(args).map_or_else(|usage| usage, |id| Parsed::Command(Command::GuildInfo(id))),
        _ => Parsed::Ignored,
    }
}

fn convert(kind: MediaKind, policy: SelectionPolicy, args: &str) -> Parsed {
    let mut words: Vec<&str> = args.split_whitespace().collect();

    // `-f <id>` may appear anywhere after the command name
    let mut format_id = None;
    if let Some(pos) = words.iter().position(|w| *w == "-f" || *w == "--format") {
        match words.get(pos + 1) {
            Some(id) => {
                format_id = Some(id.to_string());
                words.drain(pos..=pos + 1);
            }
            None => return Parsed::Usage("`You need to provide a format id after -f.`".to_string()),
        }
    }

    let source = words.join(" ");
    if source.is_empty() {
        return Parsed::Usage("`You need to provide a YouTube URL.`".to_string());
    }

    Parsed::Command(Command::Convert {
        kind,
        policy,
        source,
        format_id,
    })
}

fn guild_id(args: &str) -> Result<u64, Parsed> {
    let Some(raw) = args.split_whitespace().next() else {
        return Err(Parsed::Usage("`You need to provide a guild ID.`".to_string()));
    };
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(Parsed::Usage(format!("`'{}' is not a valid guild ID.`", raw))),
    }
}
