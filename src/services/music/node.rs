use crate::error::NodeError;
use crate::services::music::filters::FilterSet;
use crate::services::music::track::Track;
use async_trait::async_trait;
use serenity::all::GuildId;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl EndReason {
    /// Only natural ends and failed loads hand over to the next track.
    pub fn may_start_next(self) -> bool {
        matches!(self, Self::Finished | Self::LoadFailed)
    }
}

/// Track-lifecycle events delivered by the node, in order, per guild.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    TrackStart {
        track: Arc<Track>,
    },
    TrackEnd {
        track: Arc<Track>,
        reason: EndReason,
    },
    TrackStuck {
        track: Arc<Track>,
        threshold_ms: u64,
    },
    TrackLoadFailed {
        track: Arc<Track>,
        message: String,
    },
    QueueEnd,
    PlayerUpdate {
        position_ms: u64,
        timestamp_ms: u64,
        connected: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadKind {
    Track,
    Playlist { name: String },
    Search,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub kind: LoadKind,
    pub tracks: Vec<Track>,
}

impl LoadResult {
    pub fn empty() -> Self {
        Self {
            kind: LoadKind::Empty,
            tracks: Vec::new(),
        }
    }
}

/// Commands the coordinator issues to the audio node.
#[async_trait]
pub trait AudioNode: Send + Sync {
    async fn load_tracks(&self, guild_id: GuildId, query: &str) -> Result<LoadResult, NodeError>;

    /// Starts `track` immediately, replacing whatever is playing.
    async fn play(
        &self,
        guild_id: GuildId,
        track: &Track,
        start_ms: Option<u64>,
        end_ms: Option<u64>,
    ) -> Result<(), NodeError>;

    async fn set_pause(&self, guild_id: GuildId, paused: bool) -> Result<(), NodeError>;

    async fn seek(&self, guild_id: GuildId, position_ms: u64) -> Result<(), NodeError>;

    async fn set_filters(&self, guild_id: GuildId, filters: &FilterSet) -> Result<(), NodeError>;

    async fn stop(&self, guild_id: GuildId) -> Result<(), NodeError>;
}

fn is_url(query: &str) -> bool {
    query.starts_with("http://") || query.starts_with("https://")
}

/// Resolves a member's query. URLs load directly; text searches Spotify
/// first and falls back to YouTube when that yields nothing.
pub async fn search(
    node: &dyn AudioNode,
    guild_id: GuildId,
    query: &str,
) -> Result<LoadResult, NodeError> {
    let query = query.trim();
    if is_url(query) {
        return node.load_tracks(guild_id, query).await;
    }

    match node.load_tracks(guild_id, &format!("spsearch:{query}")).await {
        Ok(result) if !result.tracks.is_empty() => return Ok(result),
        Ok(_) => tracing::debug!(query, "spotify returned no results, trying youtube"),
        Err(e) => tracing::debug!(query, error = %e, "spotify search failed, trying youtube"),
    }

    node.load_tracks(guild_id, &format!("ytsearch:{query}")).await
}
