use crate::error::{DisplayError, MusicError};
use crate::services::lyrics::{Lyrics, LyricsProvider};
use crate::services::music::autoplay::{self, Recommender, plan_backfill};
use crate::services::music::display::{
    DisplayPayload, DisplaySink, DisplayTarget, MessageRef, Notice, RenderContext, render,
};
use crate::services::music::filters::{Filter, FilterKind, FilterSet};
use crate::services::music::node::{AudioNode, EndReason, NodeEvent};
use crate::services::music::queue::{AUTOPLAY_CEILING, LoopMode, PlaybackMode, Queue};
use crate::services::music::selector::{Trigger, select_next};
use crate::services::music::track::{QueuedTrack, Track};
use crate::utils::image::ArtworkProbe;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serenity::all::{ChannelId, GuildId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};

pub const SEEK_STEP_MS: u64 = 10_000;
pub const NOTICE_DISPLAY_DELAY: Duration = Duration::from_secs(5);

/// Collaborators a session talks to. Optional parts disable their feature.
#[derive(Clone)]
pub struct SessionDeps {
    pub node: Arc<dyn AudioNode>,
    pub sink: Arc<dyn DisplaySink>,
    pub recommender: Option<Arc<dyn Recommender>>,
    pub lyrics: Option<Arc<dyn LyricsProvider>>,
    pub artwork: Option<Arc<dyn ArtworkProbe>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Playing,
    Paused,
    Disconnected,
}

#[derive(Debug, Clone, Default)]
pub enum LyricsSlot {
    #[default]
    Unfetched,
    Missing,
    Found(Arc<Lyrics>),
}

/// Read-only copy of the session used for rendering and `/queue`.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub current: Option<QueuedTrack>,
    pub queue: Vec<QueuedTrack>,
    pub mode: PlaybackMode,
    pub filters: Vec<FilterKind>,
    pub position_ms: u64,
    pub lyrics: LyricsSlot,
}

/// Outcome of an enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    pub position: usize,
    pub count: usize,
    pub started: bool,
}

/// Last position reported by the node, extrapolated while playing.
#[derive(Debug, Clone, Copy)]
struct PositionSnapshot {
    position_ms: u64,
    node_time_ms: u64,
    taken_at: Instant,
}

impl PositionSnapshot {
    fn at(position_ms: u64) -> Self {
        Self {
            position_ms,
            node_time_ms: 0,
            taken_at: Instant::now(),
        }
    }

    fn estimate(&self, running: bool, duration_ms: u64) -> u64 {
        let elapsed = if running {
            self.taken_at.elapsed().as_millis() as u64
        } else {
            0
        };
        (self.position_ms + elapsed).min(duration_ms)
    }
}

struct SessionState {
    channel: Option<ChannelId>,
    queue: Queue,
    mode: PlaybackMode,
    filters: FilterSet,
    current: Option<QueuedTrack>,
    last_played: Option<QueuedTrack>,
    lyrics: LyricsSlot,
    position: PositionSnapshot,
    connected: bool,
    paused: bool,
    /// Encoded payload of the track whose load failure was already announced.
    failed_notice: Option<String>,
    revision: u64,
    rng: StdRng,
}

impl SessionState {
    fn new() -> Self {
        Self {
            channel: None,
            queue: Queue::new(),
            mode: PlaybackMode::default(),
            filters: FilterSet::new(),
            current: None,
            last_played: None,
            lyrics: LyricsSlot::Unfetched,
            position: PositionSnapshot::at(0),
            connected: false,
            paused: false,
            failed_notice: None,
            revision: 0,
            rng: StdRng::from_os_rng(),
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn status(&self) -> SessionStatus {
        if !self.connected {
            return SessionStatus::Disconnected;
        }
        match (&self.current, self.paused) {
            (None, _) => SessionStatus::Idle,
            (Some(_), true) => SessionStatus::Paused,
            (Some(_), false) => SessionStatus::Playing,
        }
    }

    fn position_ms(&self) -> u64 {
        let Some(current) = &self.current else {
            return 0;
        };
        self.position
            .estimate(!self.paused, current.track.duration_ms())
    }

    fn is_current(&self, track: &Track) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| c.track.encoded == track.encoded)
    }

    fn retire_current(&mut self) {
        if let Some(previous) = self.current.take() {
            self.last_played = Some(previous);
        }
        self.paused = false;
        self.lyrics = LyricsSlot::Unfetched;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status(),
            current: self.current.clone(),
            queue: self.queue.iter().cloned().collect(),
            mode: self.mode,
            filters: self.filters.kinds().collect(),
            position_ms: self.position_ms(),
            lyrics: self.lyrics.clone(),
        }
    }
}

#[derive(Default)]
struct DisplayState {
    message: Option<MessageRef>,
    written: u64,
}

/// One guild's playback session.
///
/// All mutations go through the state mutex. Display writes are serialized
/// separately so a slow message edit never blocks playback.
pub struct Session {
    guild_id: GuildId,
    deps: SessionDeps,
    state: Mutex<SessionState>,
    display: Mutex<DisplayState>,
    artwork: parking_lot::Mutex<HashMap<String, bool>>,
    backfilling: AtomicBool,
    mailbox: mpsc::UnboundedSender<NodeEvent>,
}

impl Session {
    /// Creates the session and its event mailbox. Must be called inside a
    /// tokio runtime.
    pub fn new(guild_id: GuildId, deps: SessionDeps) -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<NodeEvent>();
        let session = Arc::new(Self {
            guild_id,
            deps,
            state: Mutex::new(SessionState::new()),
            display: Mutex::new(DisplayState::default()),
            artwork: parking_lot::Mutex::new(HashMap::new()),
            backfilling: AtomicBool::new(false),
            mailbox: tx,
        });

        let weak: Weak<Self> = Arc::downgrade(&session);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                session.on_node_event(event).await;
            }
        });

        session
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn autoplay_available(&self) -> bool {
        self.deps.recommender.is_some()
    }

    /// Queues a node event behind any still being handled for this guild.
    pub fn post_event(&self, event: NodeEvent) {
        if self.mailbox.send(event).is_err() {
            tracing::warn!(guild = %self.guild_id, "session mailbox closed");
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn text_channel(&self) -> Option<ChannelId> {
        self.state.lock().await.channel
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    /// Binds the channel the display and notices are posted to.
    pub async fn attach(&self, channel: ChannelId) {
        let mut state = self.state.lock().await;
        state.channel = Some(channel);
    }

    pub async fn on_connected(&self) {
        let mut state = self.state.lock().await;
        state.connected = true;
        state.touch();
    }

    /// Voice is gone: forced disconnect, our own leave or an empty channel.
    pub async fn on_voice_lost(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().await;
            state.connected = false;
            state.queue.clear();
            state.retire_current();
            state.touch();
        }
        if let Err(e) = self.deps.node.stop(self.guild_id).await {
            tracing::debug!(guild = %self.guild_id, error = %e, "stop after voice loss failed");
        }
        tracing::info!(guild = %self.guild_id, "voice connection lost, session cleared");
        self.request_display(DisplayTarget::Keep, Duration::ZERO);
    }

    /// Inserts `tracks` at `position`, by default right after the tracks
    /// members asked for. Starts playback when nothing is current.
    pub async fn enqueue(
        self: &Arc<Self>,
        tracks: Vec<QueuedTrack>,
        position: Option<usize>,
    ) -> Result<Enqueued, MusicError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let count = tracks.len();
        let position = position.unwrap_or(state.queue.user_count() + 1);
        let position = state.queue.insert_at(position, tracks)?;
        state.touch();

        let started = if state.current.is_none() && count > 0 {
            self.advance(state, None, Trigger::Natural).await
        } else {
            false
        };
        drop(guard);

        tracing::debug!(guild = %self.guild_id, position, count, started, "enqueued");
        if !started {
            self.request_display(DisplayTarget::Keep, Duration::ZERO);
        }
        Ok(Enqueued {
            position,
            count,
            started,
        })
    }

    /// Plays `explicit` now, or whatever the selector picks next.
    pub async fn play(self: &Arc<Self>, explicit: Option<QueuedTrack>) -> bool {
        let mut guard = self.state.lock().await;
        self.advance(&mut guard, explicit, Trigger::Natural).await
    }

    /// Ends the current track early. With a target, every entry in front of
    /// it is dropped first. Under loop=all only the skipped track goes back
    /// to the tail.
    pub async fn skip(
        self: &Arc<Self>,
        target: Option<usize>,
        move_to_front: bool,
    ) -> Result<(), MusicError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if state.current.is_none() {
            return Err(MusicError::NothingPlaying);
        }
        if let Some(target) = target {
            let dropped = state.queue.skip_to(target)?;
            tracing::debug!(guild = %self.guild_id, dropped = dropped.len(), "truncated queue before skip target");
        }

        tracing::debug!(guild = %self.guild_id, ?target, move_to_front, "skip");
        if !self.advance(state, None, Trigger::Skip).await {
            if let Err(e) = self.deps.node.stop(self.guild_id).await {
                tracing::warn!(guild = %self.guild_id, error = %e, "failed to stop after last skip");
            }
        }
        Ok(())
    }

    pub async fn remove_at(&self, position: usize) -> Result<QueuedTrack, MusicError> {
        let removed = {
            let mut state = self.state.lock().await;
            let removed = state.queue.remove_at(position)?;
            state.touch();
            removed
        };
        self.refresh_display(DisplayTarget::Keep).await;
        Ok(removed)
    }

    /// Empties the queue, leaving the current track alone.
    pub async fn clear(&self) -> usize {
        let cleared = {
            let mut state = self.state.lock().await;
            let cleared = state.queue.len();
            state.queue.clear();
            state.touch();
            cleared
        };
        self.refresh_display(DisplayTarget::Keep).await;
        cleared
    }

    pub async fn set_pause(&self, paused: bool) -> Result<(), MusicError> {
        {
            let mut state = self.state.lock().await;
            if state.current.is_none() {
                return Err(MusicError::NothingPlaying);
            }
            if !paused && !state.paused {
                return Err(MusicError::NotPaused);
            }
            if paused == state.paused {
                return Ok(());
            }
            self.deps.node.set_pause(self.guild_id, paused).await?;

            let position = state.position_ms();
            state.position = PositionSnapshot::at(position);
            state.paused = paused;
            state.touch();
        }
        self.refresh_display(DisplayTarget::Keep).await;
        Ok(())
    }

    /// Stops the node and forgets the queue and current track.
    pub async fn stop(&self) -> Result<(), MusicError> {
        {
            let mut state = self.state.lock().await;
            state.queue.clear();
            state.retire_current();
            state.touch();
        }
        let stopped = self.deps.node.stop(self.guild_id).await;
        self.refresh_display(DisplayTarget::Keep).await;
        stopped.map_err(MusicError::from)
    }

    /// Jumps within the current track, clamped to its length.
    pub async fn seek(&self, position_ms: u64) -> Result<u64, MusicError> {
        let target = {
            let mut state = self.state.lock().await;
            let Some(current) = &state.current else {
                return Err(MusicError::NothingPlaying);
            };
            let target = position_ms.min(current.track.duration_ms());
            self.deps.node.seek(self.guild_id, target).await?;
            state.position = PositionSnapshot::at(target);
            state.touch();
            target
        };
        self.refresh_display(DisplayTarget::Keep).await;
        Ok(target)
    }

    /// Moves the position by `delta_ms` relative to the current estimate.
    pub async fn seek_by(&self, delta_ms: i64) -> Result<u64, MusicError> {
        let position = {
            let state = self.state.lock().await;
            if state.current.is_none() {
                return Err(MusicError::NothingPlaying);
            }
            state.position_ms()
        };
        let target = position.saturating_add_signed(delta_ms);
        self.seek(target).await
    }

    pub async fn set_loop_mode(&self, loop_mode: LoopMode) {
        self.update_mode(|mode| mode.loop_mode = loop_mode).await;
    }

    pub async fn cycle_loop_mode(&self) -> LoopMode {
        self.update_mode(|mode| mode.loop_mode = mode.loop_mode.cycle())
            .await
            .loop_mode
    }

    pub async fn set_shuffle(&self, shuffle: bool) {
        self.update_mode(|mode| mode.shuffle = shuffle).await;
    }

    pub async fn toggle_shuffle(&self) -> bool {
        self.update_mode(|mode| mode.shuffle = !mode.shuffle)
            .await
            .shuffle
    }

    /// Flips autoplay. Turning it off evicts every recommended entry; turning
    /// it on tops the queue up right away.
    pub async fn toggle_autoplay(self: &Arc<Self>) -> bool {
        let enabled = {
            let mut state = self.state.lock().await;
            state.mode.autoplay = !state.mode.autoplay;
            if !state.mode.autoplay {
                let evicted = state.queue.retain_users();
                tracing::debug!(guild = %self.guild_id, evicted, "autoplay disabled");
            }
            state.touch();
            state.mode.autoplay
        };
        if enabled {
            let this = self.clone();
            tokio::spawn(async move { this.check_autoplay().await });
        }
        self.refresh_display(DisplayTarget::Keep).await;
        enabled
    }

    pub async fn toggle_lyrics(self: &Arc<Self>) -> bool {
        let (enabled, fetch) = {
            let mut state = self.state.lock().await;
            state.mode.show_lyrics = !state.mode.show_lyrics;
            state.touch();
            let fetch = match (&state.current, &state.lyrics) {
                (Some(current), LyricsSlot::Unfetched) if state.mode.show_lyrics => {
                    Some(current.track.clone())
                }
                _ => None,
            };
            (state.mode.show_lyrics, fetch)
        };
        if let Some(track) = fetch {
            self.spawn_lyrics_fetch(track);
        }
        self.refresh_display(DisplayTarget::Keep).await;
        enabled
    }

    async fn update_mode(&self, change: impl FnOnce(&mut PlaybackMode)) -> PlaybackMode {
        let mode = {
            let mut state = self.state.lock().await;
            change(&mut state.mode);
            state.touch();
            state.mode
        };
        self.refresh_display(DisplayTarget::Keep).await;
        mode
    }

    /// Enables or replaces one filter. Invalid parameters never reach the node.
    pub async fn set_filter(&self, filter: Filter) -> Result<(), MusicError> {
        filter.validate()?;
        self.apply_filters(move |filters| filters.set(filter).map(|_| ()))
            .await
    }

    pub async fn filter(&self, kind: FilterKind) -> Option<Filter> {
        self.state.lock().await.filters.get(kind).cloned()
    }

    pub async fn remove_filter(&self, kind: FilterKind) -> Result<(), MusicError> {
        self.apply_filters(move |filters| {
            filters.remove(kind);
            Ok(())
        })
        .await
    }

    pub async fn clear_filters(&self) -> Result<(), MusicError> {
        self.apply_filters(|filters| {
            filters.clear();
            Ok(())
        })
        .await
    }

    async fn apply_filters(
        &self,
        change: impl FnOnce(&mut FilterSet) -> Result<(), MusicError>,
    ) -> Result<(), MusicError> {
        {
            let mut state = self.state.lock().await;
            let previous = state.filters.clone();
            change(&mut state.filters)?;

            if let Err(e) = self
                .deps
                .node
                .set_filters(self.guild_id, &state.filters)
                .await
            {
                tracing::warn!(guild = %self.guild_id, error = %e, "node rejected filters");
                state.filters = previous;
                return Err(e.into());
            }
            state.touch();
        }
        self.refresh_display(DisplayTarget::Keep).await;
        Ok(())
    }

    /// Picks and starts the next track. Returns whether something is playing.
    async fn advance(
        self: &Arc<Self>,
        state: &mut SessionState,
        explicit: Option<QueuedTrack>,
        trigger: Trigger,
    ) -> bool {
        let next = select_next(
            &mut state.queue,
            state.current.as_ref(),
            &state.mode,
            explicit,
            trigger,
            &mut state.rng,
        );
        state.retire_current();
        state.touch();

        let Some(next) = next else {
            tracing::debug!(guild = %self.guild_id, "queue ended");
            self.post_event(NodeEvent::QueueEnd);
            return false;
        };

        match self.deps.node.play(self.guild_id, &next.track, None, None).await {
            Ok(()) => {
                tracing::info!(guild = %self.guild_id, track = next.track.title(), "playing");
                state.current = Some(next);
                state.position = PositionSnapshot::at(0);
                true
            }
            Err(e) => {
                tracing::error!(guild = %self.guild_id, track = next.track.title(), error = %e, "failed to start track");
                state.last_played = Some(next);
                self.spawn_notice(state.channel, Notice::PlayerError(e.to_string()));
                false
            }
        }
    }

    pub async fn on_node_event(self: &Arc<Self>, event: NodeEvent) {
        match event {
            NodeEvent::TrackStart { track } => {
                let fetch = {
                    let mut state = self.state.lock().await;
                    if !state.is_current(&track) {
                        tracing::debug!(guild = %self.guild_id, track = track.title(), "start for a track that is no longer current");
                        return;
                    }
                    state.paused = false;
                    state.failed_notice = None;
                    state.lyrics = LyricsSlot::Unfetched;
                    state.touch();
                    state.mode.show_lyrics
                };
                if fetch {
                    self.spawn_lyrics_fetch(track);
                }
                let target = if self.display.lock().await.message.is_some() {
                    DisplayTarget::Keep
                } else {
                    DisplayTarget::Repost
                };
                self.refresh_display(target).await;
            }
            NodeEvent::TrackEnd { track, reason } => {
                let advanced = {
                    let mut guard = self.state.lock().await;
                    if reason.may_start_next() && guard.is_current(&track) {
                        // A track that fails to load must not be replayed by loop=single.
                        let trigger = if reason == EndReason::LoadFailed {
                            Trigger::Skip
                        } else {
                            Trigger::Natural
                        };
                        self.advance(&mut guard, None, trigger).await;
                        true
                    } else {
                        false
                    }
                };
                let target = if advanced {
                    DisplayTarget::Repost
                } else {
                    DisplayTarget::Keep
                };
                self.refresh_display(target).await;
            }
            NodeEvent::TrackStuck {
                track,
                threshold_ms,
            } => {
                tracing::warn!(guild = %self.guild_id, track = track.title(), threshold_ms, "track stuck");
                let mut guard = self.state.lock().await;
                if guard.is_current(&track) {
                    self.advance(&mut guard, None, Trigger::Natural).await;
                }
            }
            NodeEvent::TrackLoadFailed { track, message } => {
                tracing::warn!(guild = %self.guild_id, track = track.title(), error = %message, "track failed to load");
                let channel = {
                    let mut state = self.state.lock().await;
                    if state.failed_notice.as_deref() == Some(track.encoded.as_str()) {
                        return;
                    }
                    state.failed_notice = Some(track.encoded.clone());
                    state.channel
                };
                self.spawn_notice(
                    channel,
                    Notice::LoadFailed {
                        title: track.title().to_string(),
                        reason: message,
                    },
                );
            }
            NodeEvent::QueueEnd => {
                {
                    let mut state = self.state.lock().await;
                    // Something was enqueued after the queue ran dry.
                    if state.current.is_some() {
                        tracing::debug!(guild = %self.guild_id, "queue end overtaken by a new track");
                        return;
                    }
                    state.retire_current();
                    state.touch();
                }
                self.refresh_display(DisplayTarget::Keep).await;
                self.spawn_autoplay_check();
            }
            NodeEvent::PlayerUpdate {
                position_ms,
                timestamp_ms,
                connected,
            } => {
                {
                    let mut state = self.state.lock().await;
                    // Updates can overtake each other on the way from the node.
                    if state.current.is_none() || timestamp_ms < state.position.node_time_ms {
                        return;
                    }
                    state.position = PositionSnapshot {
                        position_ms,
                        node_time_ms: timestamp_ms,
                        taken_at: Instant::now(),
                    };
                    if !connected {
                        tracing::debug!(guild = %self.guild_id, "node reports voice not connected");
                    }
                    state.touch();
                }
                self.spawn_autoplay_check();
                self.refresh_display(DisplayTarget::Keep).await;
            }
        }
    }

    fn spawn_autoplay_check(self: &Arc<Self>) {
        if self.deps.recommender.is_none() {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move { this.check_autoplay().await });
    }

    /// Tops the queue up with recommendations when autoplay is on and the
    /// queue is at or below the watermark. The lock is released while the
    /// recommender runs.
    pub async fn check_autoplay(self: &Arc<Self>) {
        let Some(recommender) = self.deps.recommender.clone() else {
            return;
        };

        let (count, seed, known) = {
            let state = self.state.lock().await;
            let in_flight = self.backfilling.load(Ordering::Acquire);
            let Some(count) = plan_backfill(state.queue.len(), state.mode.autoplay, in_flight)
            else {
                return;
            };
            let Some(seed) = state
                .current
                .as_ref()
                .or(state.last_played.as_ref())
                .map(|t| t.track.clone())
            else {
                return;
            };
            let known: HashSet<String> = state
                .queue
                .iter()
                .chain(state.current.as_ref())
                .map(|t| t.track.info.identifier.clone())
                .collect();
            (count, seed, known)
        };

        if self.backfilling.swap(true, Ordering::AcqRel) {
            return;
        }
        let found = autoplay::backfill(recommender.as_ref(), self.guild_id, &seed, count, &known).await;
        self.backfilling.store(false, Ordering::Release);

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if !state.mode.autoplay {
            return;
        }

        match found {
            Ok(tracks) if !tracks.is_empty() => {
                let room = AUTOPLAY_CEILING.saturating_sub(state.queue.len());
                let mut added = 0;
                for track in tracks.into_iter().take(room) {
                    if !state.queue.contains_identifier(&track.track.info.identifier) {
                        state.queue.push_back(track);
                        added += 1;
                    }
                }
                state.touch();
                tracing::debug!(guild = %self.guild_id, added, seed = seed.title(), "autoplay backfilled");

                if state.current.is_none() && state.connected {
                    self.advance(state, None, Trigger::Natural).await;
                }
            }
            result => {
                if let Err(e) = result {
                    tracing::warn!(guild = %self.guild_id, error = %e, "autoplay lookup failed");
                }
                state.mode.autoplay = false;
                state.touch();
                self.spawn_notice(state.channel, Notice::AutoplayUnavailable);
            }
        }
        drop(guard);
        self.refresh_display(DisplayTarget::Keep).await;
    }

    fn spawn_lyrics_fetch(self: &Arc<Self>, track: Arc<Track>) {
        let this = self.clone();
        tokio::spawn(async move {
            let slot = match &this.deps.lyrics {
                None => LyricsSlot::Missing,
                Some(provider) => match provider.search(track.title(), track.author()).await {
                    Ok(Some(lyrics)) if !lyrics.is_empty() => LyricsSlot::Found(Arc::new(lyrics)),
                    Ok(_) => LyricsSlot::Missing,
                    Err(e) => {
                        tracing::debug!(guild = %this.guild_id, track = track.title(), error = %e, "lyrics lookup failed");
                        LyricsSlot::Missing
                    }
                },
            };
            {
                let mut state = this.state.lock().await;
                if !state.is_current(&track) {
                    return;
                }
                state.lyrics = slot;
                state.touch();
            }
            this.refresh_display(DisplayTarget::Keep).await;
        });
    }

    /// Posts `notice` to the bound channel. After a short delay the notice
    /// message becomes the display.
    fn spawn_notice(self: &Arc<Self>, channel: Option<ChannelId>, notice: Notice) {
        let Some(channel) = channel else {
            tracing::debug!(guild = %self.guild_id, ?notice, "no channel bound for notice");
            return;
        };
        let this = self.clone();
        tokio::spawn(async move {
            let payload = DisplayPayload::notice(notice.to_embed());
            match this.deps.sink.send(channel, &payload).await {
                Ok(message) => this.request_display(DisplayTarget::Replace(message), NOTICE_DISPLAY_DELAY),
                Err(e) => tracing::warn!(guild = %this.guild_id, error = %e, "failed to post notice"),
            }
        });
    }

    /// Schedules a refresh after `delay`. Superseded refreshes still run and
    /// simply render the state current at that time.
    pub fn request_display(self: &Arc<Self>, target: DisplayTarget, delay: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            this.refresh_display(target).await;
        });
    }

    async fn render_context(&self, snapshot: &SessionSnapshot) -> RenderContext {
        let mut ctx = RenderContext {
            artwork_wide: false,
            autoplay_available: self.autoplay_available(),
        };
        let (Some(probe), Some(url)) = (
            &self.deps.artwork,
            snapshot
                .current
                .as_ref()
                .and_then(|c| c.track.artwork_url()),
        ) else {
            return ctx;
        };

        let cached = self.artwork.lock().get(url).copied();
        ctx.artwork_wide = match cached {
            Some(wide) => wide,
            None => {
                let wide = probe.is_wide(url).await;
                self.artwork.lock().insert(url.to_string(), wide);
                wide
            }
        };
        ctx
    }

    /// Writes the current state to the display message.
    pub async fn refresh_display(&self, target: DisplayTarget) {
        let mut display = self.display.lock().await;
        let (snapshot, revision, channel) = {
            let state = self.state.lock().await;
            (state.snapshot(), state.revision, state.channel)
        };
        if target == DisplayTarget::Keep && revision <= display.written {
            return;
        }

        let ctx = self.render_context(&snapshot).await;
        let payload = render(&snapshot, &ctx);

        let adopted = match target {
            DisplayTarget::Keep => {
                let Some(message) = display.message else {
                    return;
                };
                match self.deps.sink.edit(message, &payload).await {
                    Ok(()) => None,
                    Err(DisplayError::Gone) => {
                        tracing::debug!(guild = %self.guild_id, "display message deleted externally");
                        display.message = None;
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(guild = %self.guild_id, error = %e, "failed to edit display");
                        return;
                    }
                }
            }
            DisplayTarget::Replace(message) => {
                if let Err(e) = self.deps.sink.edit(message, &payload).await {
                    tracing::warn!(guild = %self.guild_id, error = %e, "failed to adopt display message");
                    return;
                }
                Some(message)
            }
            DisplayTarget::Repost => {
                let Some(channel) = channel else {
                    return;
                };
                match self.deps.sink.send(channel, &payload).await {
                    Ok(message) => Some(message),
                    Err(e) => {
                        tracing::warn!(guild = %self.guild_id, error = %e, "failed to post display");
                        return;
                    }
                }
            }
        };

        display.written = display.written.max(revision);
        if let Some(message) = adopted {
            if let Some(old) = display.message.replace(message).filter(|old| *old != message) {
                let sink = self.deps.sink.clone();
                tokio::spawn(async move {
                    if let Err(e) = sink.delete(old).await {
                        tracing::debug!(error = %e, "failed to delete old display");
                    }
                });
            }
        }
    }

    pub async fn display_message(&self) -> Option<MessageRef> {
        self.display.lock().await.message
    }
}
