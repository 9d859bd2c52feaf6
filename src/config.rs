use crate::error::{BotError, Result};
use serenity::all::UserId;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_LYRICS_API_URL: &str = "https://lrclib.net";

#[derive(Clone, Debug)]
pub struct Config {
    pub token: String,
    pub lavalink_host: String,
    pub lavalink_port: u16,
    pub lavalink_password: String,
    pub lavalink_ssl: bool,
    pub playlist_dir: PathBuf,
    pub lyrics_api_url: Option<String>,
    pub autoplay_enabled: bool,
    pub owner_id: Option<UserId>,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| BotError::Config(format!("{name} has an invalid value: {raw}"))),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env::var("DISCORD_TOKEN")
            .map_err(|_| BotError::Config("DISCORD_TOKEN not configured".to_string()))?;

        // An empty value turns lyrics off.
        let lyrics_api_url = match env::var("LYRICS_API_URL") {
            Ok(url) if url.trim().is_empty() => None,
            Ok(url) => Some(url),
            Err(_) => Some(DEFAULT_LYRICS_API_URL.to_string()),
        };

        let owner_id = match parse_var::<u64>("OWNER_ID", 0)? {
            0 => None,
            id => Some(UserId::new(id)),
        };

        Ok(Self {
            token,
            lavalink_host: var_or("LAVALINK_HOST", "localhost"),
            lavalink_port: parse_var("LAVALINK_PORT", 2333)?,
            lavalink_password: var_or("LAVALINK_PASSWORD", "youshallnotpass"),
            lavalink_ssl: parse_var("LAVALINK_SSL", false)?,
            playlist_dir: PathBuf::from(var_or("PLAYLIST_DIR", "playlist")),
            lyrics_api_url,
            autoplay_enabled: parse_var("AUTOPLAY_ENABLED", true)?,
            owner_id,
        })
    }

    pub fn lavalink_address(&self) -> String {
        format!("{}:{}", self.lavalink_host, self.lavalink_port)
    }
}
