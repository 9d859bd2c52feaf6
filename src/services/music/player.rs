use crate::services::music::lavalink::NodeSignal;
use crate::services::music::session::{Session, SessionDeps};
use parking_lot::RwLock;
use serenity::all::GuildId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

pub type GuildSessions = Arc<RwLock<HashMap<GuildId, Arc<Session>>>>;

/// Registry of per-guild sessions. Sessions are created on first use and
/// reused after stop or disconnect.
#[derive(Clone)]
pub struct MusicPlayer {
    deps: SessionDeps,
    sessions: GuildSessions,
}

impl fmt::Debug for MusicPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MusicPlayer")
            .field("sessions", &self.sessions.read().len())
            .finish()
    }
}

impl MusicPlayer {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            deps,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn deps(&self) -> &SessionDeps {
        &self.deps
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        self.sessions.read().get(&guild_id).cloned()
    }

    pub fn session(&self, guild_id: GuildId) -> Arc<Session> {
        if let Some(session) = self.get(guild_id) {
            return session;
        }
        let mut sessions = self.sessions.write();
        sessions
            .entry(guild_id)
            .or_insert_with(|| {
                tracing::debug!(guild = %guild_id, "creating session");
                Session::new(guild_id, self.deps.clone())
            })
            .clone()
    }

    /// Routes one node signal. Events for guilds without a session are
    /// dropped since nothing was ever played there.
    pub fn dispatch(&self, guild_id: GuildId, signal: NodeSignal) {
        let Some(session) = self.get(guild_id) else {
            tracing::debug!(guild = %guild_id, ?signal, "signal for unknown guild");
            return;
        };
        match signal {
            NodeSignal::Event(event) => session.post_event(event),
            closed if closed.is_voice_gone() => {
                tokio::spawn(async move { session.on_voice_lost().await });
            }
            NodeSignal::VoiceClosed { code, by_remote } => {
                tracing::debug!(guild = %guild_id, code, by_remote, "voice websocket closed, resumable");
            }
        }
    }

    /// Drains the hook channel for the lifetime of the process.
    pub fn spawn_router(&self, mut signals: mpsc::UnboundedReceiver<(GuildId, NodeSignal)>) {
        let player = self.clone();
        tokio::spawn(async move {
            while let Some((guild_id, signal)) = signals.recv().await {
                player.dispatch(guild_id, signal);
            }
            tracing::warn!("node signal channel closed");
        });
    }
}
