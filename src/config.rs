// Runtime settings read from the environment (and an optional .env file)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub prefix: String,
    /// Account allowed to run the guild administration commands
    pub owner_id: Option<u64>,
    pub audio_dir: PathBuf,
    pub video_dir: PathBuf,
    pub retention: Duration,
    pub selection_timeout: Duration,
    pub upload_limit_bytes: u64,
    pub proxies: Vec<String>,
    pub ytdlp_path: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub socket_timeout_secs: u32,
    pub download_timeout_secs: u64,
    pub keep_alive_addr: Option<SocketAddr>,
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = get("DISCORD_TOKEN")
            .or_else(|| get("TOKEN"))
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let owner_id = get("OWNER_ID")
            .map(|v| parse_number::<u64>("OWNER_ID", &v))
            .transpose()?;

        let proxies = match get("PROXIES") {
            Some(list) => parse_proxies(&list)?,
            None => Vec::new(),
        };

        let keep_alive_addr = get("KEEP_ALIVE_ADDR")
            .map(|v| {
                v.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                    var: "KEEP_ALIVE_ADDR",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let number = |var: &'static str, default: u64| -> Result<u64, ConfigError> {
            get(var).map_or(Ok(default), |v| parse_number::<u64>(var, &v))
        };

        let upload_limit_mb = number("UPLOAD_LIMIT_MB", 25)?;
        if upload_limit_mb == 0 {
            return Err(ConfigError::Invalid {
                var: "UPLOAD_LIMIT_MB",
                reason: "must be greater than zero".to_string(),
            });
        }

        let socket_timeout_secs = number("SOCKET_TIMEOUT_SECS", 30)?;
        let socket_timeout_secs = u32::try_from(socket_timeout_secs).map_err(|_| ConfigError::Invalid {
            var: "SOCKET_TIMEOUT_SECS",
            reason: "value is too large".to_string(),
        })?;

        Ok(Self {
            token,
            prefix: get("COMMAND_PREFIX").unwrap_or_else(|| "=".to_string()),
            owner_id,
            audio_dir: PathBuf::from(get("AUDIO_DIR").unwrap_or_else(|| "mp3".to_string())),
            video_dir: PathBuf::from(get("VIDEO_DIR").unwrap_or_else(|| "mp4".to_string())),
            retention: Duration::from_secs(number("RETENTION_SECS", 600)?),
            selection_timeout: Duration::from_secs(number("SELECTION_TIMEOUT_SECS", 120)?),
            upload_limit_bytes: upload_limit_mb * 1024 * 1024,
            proxies,
            ytdlp_path: get("YTDLP_PATH"),
            ffmpeg_path: get("FFMPEG_PATH"),
            socket_timeout_secs,
            download_timeout_secs: number("DOWNLOAD_TIMEOUT_SECS", 900)?,
            keep_alive_addr,
        })
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        reason: format!("'{}': {}", value, e),
    })
}

/// Comma-separated proxy URLs (http, https, socks4, socks5)
fn parse_proxies(list: &str) -> Result<Vec<String>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let url = Url::parse(p).map_err(|e| ConfigError::Invalid {
                var: "PROXIES",
                reason: format!("'{}': {}", p, e),
            })?;
            match url.scheme() {
                "http" | "https" | "socks4" | "socks5" | "socks5h" if url.has_host() => Ok(p.to_string()),
                scheme => Err(ConfigError::Invalid {
                    var: "PROXIES",
                    reason: format!("'{}': unsupported proxy scheme '{}'", p, scheme),
                }),
            }
        })
        .collect()
}
