use serenity::all::ChannelId;
use thiserror::Error;

/// Startup failures surfaced from `main`.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Client error: {0}")]
    Client(String),
    #[error("Lavalink error: {0}")]
    Lavalink(String),
}

pub type Result<T> = std::result::Result<T, BotError>;

/// Failures talking to the audio node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("no player exists for this guild")]
    NoPlayer,
    #[error("lavalink request failed: {0}")]
    Request(String),
    #[error("malformed lavalink payload: {0}")]
    Payload(String),
}

impl From<serde_json::Error> for NodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Payload(e.to_string())
    }
}

/// Rejections a member can cause and fix. Rendered inline as an error embed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MusicError {
    #[error("You must be in a voice channel first!")]
    UserNotInVoice,
    #[error("I'm not connected to a voice channel. Use `/connect` first.")]
    BotNotInVoice,
    #[error("You must be in <#{0}> to control the player.")]
    UserInDifferentChannel(ChannelId),
    #[error("I need the **Connect** and **Speak** permissions in your voice channel.")]
    MissingVoicePermissions,
    #[error("Position {position} is out of range, the queue has {len} track(s).")]
    InvalidPosition { position: usize, len: usize },
    #[error("{0}")]
    InvalidFilterParameters(String),
    #[error("A playlist named **{0}** already exists.")]
    DuplicateName(String),
    #[error("Playlists hold at most {limit} tracks.")]
    CapacityExceeded { limit: usize },
    #[error("That playlist does not exist.")]
    NotFound,
    #[error("That playlist is private.")]
    NotPublicAndNotOwner,
    #[error("Nothing is playing right now.")]
    NothingPlaying,
    #[error("The player is not paused.")]
    NotPaused,
    #[error("No results found for **{0}**.")]
    NoResults(String),
    #[error(transparent)]
    Node(#[from] NodeError),
}

impl MusicError {
    pub fn title(&self) -> &'static str {
        match self {
            Self::UserNotInVoice | Self::BotNotInVoice | Self::UserInDifferentChannel(_) => {
                "Voice Channel Required"
            }
            Self::MissingVoicePermissions => "Missing Permissions",
            Self::InvalidPosition { .. } => "Invalid Position",
            Self::InvalidFilterParameters(_) => "Invalid Filter",
            Self::DuplicateName(_) | Self::CapacityExceeded { .. } => "Playlist Error",
            Self::NotFound | Self::NotPublicAndNotOwner => "Playlist Unavailable",
            Self::NothingPlaying | Self::NotPaused => "Player",
            Self::NoResults(_) => "No Results",
            Self::Node(_) => "Player Error",
        }
    }

    /// Node failures are internal, everything else is the member's to fix.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Node(_))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Rejected(#[from] MusicError),
    #[error("playlist storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("playlist record is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error(transparent)]
    Discord(#[from] serenity::Error),
    #[error("display target is gone")]
    Gone,
}
