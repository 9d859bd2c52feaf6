use crate::error::NodeError;
use crate::services::music::filters::FilterSet;
use crate::services::music::node::{AudioNode, EndReason, LoadKind, LoadResult, NodeEvent};
use crate::services::music::track::Track;
use async_trait::async_trait;
use lavalink_rs::client::LavalinkClient;
use lavalink_rs::model::events::{
    PlayerUpdate, TrackEnd, TrackEndReason, TrackException, TrackStart, TrackStuck,
    WebSocketClosed,
};
use lavalink_rs::model::http::{UpdatePlayer, UpdatePlayerTrack};
use lavalink_rs::model::player::{ConnectionInfo, Filters};
use lavalink_rs::model::track::{TrackData, TrackLoadData};
use lavalink_rs::player_context::PlayerContext;
use serenity::all::GuildId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Voice close codes after which the voice session cannot resume.
const VOICE_GONE_CODES: [u16; 2] = [4006, 4014];

/// What the Lavalink hooks forward to the registry.
#[derive(Debug, Clone)]
pub enum NodeSignal {
    Event(NodeEvent),
    VoiceClosed { code: u16, by_remote: bool },
}

impl NodeSignal {
    pub fn is_voice_gone(&self) -> bool {
        matches!(self, Self::VoiceClosed { code, .. } if VOICE_GONE_CODES.contains(code))
    }
}

pub type SignalSender = mpsc::UnboundedSender<(GuildId, NodeSignal)>;

/// User data attached to the Lavalink client so hooks can reach the router.
pub struct ClientData {
    pub signals: SignalSender,
}

fn guild(id: lavalink_rs::model::GuildId) -> GuildId {
    GuildId::new(id.0)
}

fn lava_guild(guild_id: GuildId) -> lavalink_rs::model::GuildId {
    lavalink_rs::model::GuildId(guild_id.get())
}

/// Both sides share the node's JSON layout for tracks.
pub fn to_track(data: &TrackData) -> Result<Track, NodeError> {
    Ok(serde_json::from_value(serde_json::to_value(data)?)?)
}

pub fn to_track_data(track: &Track) -> Result<TrackData, NodeError> {
    Ok(serde_json::from_value(serde_json::to_value(track)?)?)
}

fn to_filters(filters: &FilterSet) -> Result<Filters, NodeError> {
    Ok(serde_json::from_value(filters.to_wire())?)
}

fn end_reason(reason: &TrackEndReason) -> EndReason {
    match reason {
        TrackEndReason::Finished => EndReason::Finished,
        TrackEndReason::LoadFailed => EndReason::LoadFailed,
        TrackEndReason::Stopped => EndReason::Stopped,
        TrackEndReason::Replaced => EndReason::Replaced,
        TrackEndReason::Cleanup => EndReason::Cleanup,
    }
}

fn forward(client: &LavalinkClient, guild_id: GuildId, signal: NodeSignal) {
    match client.data::<ClientData>() {
        Ok(data) => {
            if data.signals.send((guild_id, signal)).is_err() {
                tracing::warn!(guild = %guild_id, "node signal router is gone");
            }
        }
        Err(e) => tracing::error!(error = %e, "lavalink client has no router attached"),
    }
}

fn forward_track(
    client: &LavalinkClient,
    guild_id: GuildId,
    data: &TrackData,
    event: impl FnOnce(Arc<Track>) -> NodeEvent,
) {
    match to_track(data) {
        Ok(track) => forward(client, guild_id, NodeSignal::Event(event(Arc::new(track)))),
        Err(e) => tracing::warn!(guild = %guild_id, error = %e, "unreadable track in node event"),
    }
}

#[tracing::instrument(skip_all, fields(guild = event.guild_id.0))]
pub async fn on_track_start(client: LavalinkClient, event: &TrackStart) {
    tracing::debug!(track = %event.track.info.title, "track start");
    forward_track(&client, guild(event.guild_id), &event.track, |track| {
        NodeEvent::TrackStart { track }
    });
}

#[tracing::instrument(skip_all, fields(guild = event.guild_id.0))]
pub async fn on_track_end(client: LavalinkClient, event: &TrackEnd) {
    let reason = end_reason(&event.reason);
    tracing::debug!(track = %event.track.info.title, ?reason, "track end");
    forward_track(&client, guild(event.guild_id), &event.track, |track| {
        NodeEvent::TrackEnd { track, reason }
    });
}

#[tracing::instrument(skip_all, fields(guild = event.guild_id.0))]
pub async fn on_track_exception(client: LavalinkClient, event: &TrackException) {
    let message = serde_json::to_value(&event.exception)
        .ok()
        .and_then(|v| v.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| "Unknown".to_string());
    forward_track(&client, guild(event.guild_id), &event.track, |track| {
        NodeEvent::TrackLoadFailed { track, message }
    });
}

#[tracing::instrument(skip_all, fields(guild = event.guild_id.0))]
pub async fn on_track_stuck(client: LavalinkClient, event: &TrackStuck) {
    let threshold_ms = event.threshold_ms;
    forward_track(&client, guild(event.guild_id), &event.track, |track| {
        NodeEvent::TrackStuck {
            track,
            threshold_ms,
        }
    });
}

pub async fn on_player_update(client: LavalinkClient, event: &PlayerUpdate) {
    forward(
        &client,
        guild(event.guild_id),
        NodeSignal::Event(NodeEvent::PlayerUpdate {
            position_ms: event.state.position,
            timestamp_ms: event.state.time,
            connected: event.state.connected,
        }),
    );
}

#[tracing::instrument(skip_all, fields(guild = event.guild_id.0))]
pub async fn on_websocket_closed(client: LavalinkClient, event: &WebSocketClosed) {
    tracing::info!(code = event.code, by_remote = event.by_remote, reason = %event.reason, "voice websocket closed");
    forward(
        &client,
        guild(event.guild_id),
        NodeSignal::VoiceClosed {
            code: event.code,
            by_remote: event.by_remote,
        },
    );
}

/// `AudioNode` backed by a Lavalink v4 server.
#[derive(Clone)]
pub struct LavalinkNode {
    client: LavalinkClient,
}

impl LavalinkNode {
    pub fn new(client: LavalinkClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &LavalinkClient {
        &self.client
    }

    fn player(&self, guild_id: GuildId) -> Result<PlayerContext, NodeError> {
        self.client
            .get_player_context(lava_guild(guild_id))
            .ok_or(NodeError::NoPlayer)
    }

    pub fn has_player(&self, guild_id: GuildId) -> bool {
        self.client.get_player_context(lava_guild(guild_id)).is_some()
    }

    /// Hands the voice connection obtained through the gateway to the node.
    pub async fn connect(
        &self,
        guild_id: GuildId,
        connection: ConnectionInfo,
    ) -> Result<(), NodeError> {
        if self.has_player(guild_id) {
            self.disconnect(guild_id).await?;
        }
        self.client
            .create_player_context(lava_guild(guild_id), connection)
            .await
            .map_err(|e| NodeError::Request(e.to_string()))?;
        Ok(())
    }

    pub async fn disconnect(&self, guild_id: GuildId) -> Result<(), NodeError> {
        self.client
            .delete_player(lava_guild(guild_id))
            .await
            .map_err(|e| NodeError::Request(e.to_string()))
    }
}

fn request(e: impl std::fmt::Display) -> NodeError {
    NodeError::Request(e.to_string())
}

#[async_trait]
impl AudioNode for LavalinkNode {
    async fn load_tracks(&self, guild_id: GuildId, query: &str) -> Result<LoadResult, NodeError> {
        let loaded = self
            .client
            .load_tracks(lava_guild(guild_id), query)
            .await
            .map_err(request)?;

        let result = match loaded.data {
            Some(TrackLoadData::Track(track)) => LoadResult {
                kind: LoadKind::Track,
                tracks: vec![to_track(&track)?],
            },
            Some(TrackLoadData::Playlist(playlist)) => LoadResult {
                kind: LoadKind::Playlist {
                    name: playlist.info.name.clone(),
                },
                tracks: playlist
                    .tracks
                    .iter()
                    .map(to_track)
                    .collect::<Result<_, _>>()?,
            },
            Some(TrackLoadData::Search(tracks)) => LoadResult {
                kind: LoadKind::Search,
                tracks: tracks.iter().map(to_track).collect::<Result<_, _>>()?,
            },
            Some(TrackLoadData::Error(err)) => return Err(NodeError::Request(err.message)),
            None => LoadResult::empty(),
        };
        Ok(result)
    }

    async fn play(
        &self,
        guild_id: GuildId,
        track: &Track,
        start_ms: Option<u64>,
        end_ms: Option<u64>,
    ) -> Result<(), NodeError> {
        let player = self.player(guild_id)?;
        let start_ms = start_ms.filter(|ms| *ms > 0);
        if start_ms.is_none() && end_ms.is_none() {
            player
                .play_now(&to_track_data(track)?)
                .await
                .map_err(request)?;
            return Ok(());
        }

        let update = UpdatePlayer {
            track: Some(UpdatePlayerTrack {
                encoded: Some(track.encoded.clone()),
                ..Default::default()
            }),
            position: start_ms,
            end_time: end_ms,
            ..Default::default()
        };
        player.update_player(&update, false).await.map_err(request)?;
        Ok(())
    }

    async fn set_pause(&self, guild_id: GuildId, paused: bool) -> Result<(), NodeError> {
        self.player(guild_id)?
            .set_pause(paused)
            .await
            .map_err(request)?;
        Ok(())
    }

    async fn seek(&self, guild_id: GuildId, position_ms: u64) -> Result<(), NodeError> {
        self.player(guild_id)?
            .set_position(Duration::from_millis(position_ms))
            .await
            .map_err(request)?;
        Ok(())
    }

    async fn set_filters(&self, guild_id: GuildId, filters: &FilterSet) -> Result<(), NodeError> {
        self.player(guild_id)?
            .set_filters(to_filters(filters)?)
            .await
            .map_err(request)?;
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), NodeError> {
        self.player(guild_id)?.stop_now().await.map_err(request)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::music::filters::Filter;
    use crate::services::music::track::fixtures::track;

    #[test]
    fn tracks_cross_the_wire_unchanged() {
        let original = track("abc");
        let data = to_track_data(&original).unwrap();
        assert_eq!(data.encoded, original.encoded);
        assert_eq!(data.info.title, original.info.title);
        assert_eq!(to_track(&data).unwrap(), original);
    }

    #[test]
    fn filter_set_maps_to_node_filters() {
        let mut set = FilterSet::new();
        set.set(Filter::Timescale {
            speed: 1.25,
            pitch: 1.0,
            rate: 1.0,
        })
        .unwrap();
        let filters = to_filters(&set).unwrap();
        assert!(filters.timescale.is_some());
        assert!(filters.tremolo.is_none());
    }

    #[test]
    fn only_terminal_close_codes_lose_voice() {
        let closed = |code| NodeSignal::VoiceClosed {
            code,
            by_remote: true,
        };
        assert!(closed(4014).is_voice_gone());
        assert!(closed(4006).is_voice_gone());
        assert!(!closed(4015).is_voice_gone());
        assert!(!NodeSignal::Event(NodeEvent::QueueEnd).is_voice_gone());
    }
}
