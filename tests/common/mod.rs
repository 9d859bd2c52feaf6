//! In-memory stand-ins for the node, the chat display and the recommender.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::all::{ChannelId, GuildId, MessageId, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tempo::error::{DisplayError, NodeError};
use tempo::services::music::Session;
use tempo::services::music::autoplay::Recommender;
use tempo::services::music::display::{DisplayPayload, DisplaySink, MessageRef};
use tempo::services::music::filters::FilterSet;
use tempo::services::music::node::{AudioNode, LoadResult};
use tempo::services::music::session::SessionDeps;
use tempo::services::music::track::{QueuedTrack, Requester, Track, TrackInfo};

pub const GUILD: GuildId = GuildId::new(1);
pub const CHANNEL: ChannelId = ChannelId::new(10);
pub const MEMBER: UserId = UserId::new(42);

pub fn track(id: &str) -> Track {
    Track {
        encoded: format!("enc-{id}"),
        info: TrackInfo {
            identifier: id.to_string(),
            is_seekable: true,
            author: format!("{id} artist"),
            length: 180_000,
            is_stream: false,
            position: 0,
            title: format!("{id} title"),
            uri: Some(format!("https://www.youtube.com/watch?v={id}")),
            artwork_url: None,
            isrc: None,
            source_name: "youtube".to_string(),
        },
        plugin_info: None,
        user_data: None,
    }
}

pub fn requested(ids: &[&str]) -> Vec<QueuedTrack> {
    ids.iter()
        .map(|id| QueuedTrack::new(track(id), Requester::User(MEMBER)))
        .collect()
}

pub fn ids(tracks: &[QueuedTrack]) -> Vec<String> {
    tracks.iter().map(|t| t.track.info.identifier.clone()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Play(String),
    Pause(bool),
    Seek(u64),
    Filters(usize),
    Stop,
}

#[derive(Default)]
pub struct FakeNode {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<String>>,
    reject_filters: AtomicBool,
    fail_stop: AtomicBool,
}

impl FakeNode {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn plays(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Play(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn fail_play(&self, id: &str) {
        self.failing.lock().insert(id.to_string());
    }

    pub fn reject_filters(&self) {
        self.reject_filters.store(true, Ordering::SeqCst);
    }

    pub fn fail_stop(&self) {
        self.fail_stop.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioNode for FakeNode {
    async fn load_tracks(&self, _guild_id: GuildId, _query: &str) -> Result<LoadResult, NodeError> {
        Ok(LoadResult::empty())
    }

    async fn play(
        &self,
        _guild_id: GuildId,
        track: &Track,
        _start_ms: Option<u64>,
        _end_ms: Option<u64>,
    ) -> Result<(), NodeError> {
        if self.failing.lock().contains(&track.info.identifier) {
            return Err(NodeError::Request("node refused the track".to_string()));
        }
        self.calls.lock().push(Call::Play(track.info.identifier.clone()));
        Ok(())
    }

    async fn set_pause(&self, _guild_id: GuildId, paused: bool) -> Result<(), NodeError> {
        self.calls.lock().push(Call::Pause(paused));
        Ok(())
    }

    async fn seek(&self, _guild_id: GuildId, position_ms: u64) -> Result<(), NodeError> {
        self.calls.lock().push(Call::Seek(position_ms));
        Ok(())
    }

    async fn set_filters(&self, _guild_id: GuildId, filters: &FilterSet) -> Result<(), NodeError> {
        if self.reject_filters.load(Ordering::SeqCst) {
            return Err(NodeError::Request("filters rejected".to_string()));
        }
        self.calls.lock().push(Call::Filters(filters.kinds().count()));
        Ok(())
    }

    async fn stop(&self, _guild_id: GuildId) -> Result<(), NodeError> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(NodeError::Request("player already gone".to_string()));
        }
        self.calls.lock().push(Call::Stop);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSink {
    next_id: AtomicU64,
    sent: Mutex<Vec<DisplayPayload>>,
    edits: Mutex<Vec<MessageRef>>,
}

impl FakeSink {
    /// Title of the first embed of every posted message.
    pub fn sent_titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|p| p.embeds.first().and_then(|e| e.title.clone()))
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn edited(&self) -> Vec<MessageRef> {
        self.edits.lock().clone()
    }
}

#[async_trait]
impl DisplaySink for FakeSink {
    async fn send(
        &self,
        channel_id: ChannelId,
        payload: &DisplayPayload,
    ) -> Result<MessageRef, DisplayError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().push(payload.clone());
        Ok(MessageRef {
            channel_id,
            message_id: MessageId::new(id),
        })
    }

    async fn edit(&self, target: MessageRef, _payload: &DisplayPayload) -> Result<(), DisplayError> {
        self.edits.lock().push(target);
        Ok(())
    }

    async fn delete(&self, _target: MessageRef) -> Result<(), DisplayError> {
        Ok(())
    }
}

pub struct FakeRecommender {
    tracks: Vec<Track>,
    calls: AtomicUsize,
}

impl FakeRecommender {
    pub fn new(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            tracks: ids.iter().map(|id| track(id)).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recommender for FakeRecommender {
    async fn recommend(
        &self,
        _guild_id: GuildId,
        _seed: &Track,
        _count: usize,
    ) -> Result<Vec<Track>, NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tracks.clone())
    }
}

pub struct Harness {
    pub session: Arc<Session>,
    pub node: Arc<FakeNode>,
    pub sink: Arc<FakeSink>,
}

/// A session bound to `CHANNEL` with voice already connected.
pub async fn connected(recommender: Option<Arc<FakeRecommender>>) -> Harness {
    let node = Arc::new(FakeNode::default());
    let sink = Arc::new(FakeSink::default());
    let deps = SessionDeps {
        node: node.clone(),
        sink: sink.clone(),
        recommender: recommender.map(|r| r as Arc<dyn Recommender>),
        lyrics: None,
        artwork: None,
    };
    let session = Session::new(GUILD, deps);
    session.attach(CHANNEL).await;
    session.on_connected().await;
    Harness {
        session,
        node,
        sink,
    }
}

/// Lets spawned work finish. Tests run on a paused clock, so this only
/// advances virtual time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(10)).await;
}
