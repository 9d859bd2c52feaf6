use crate::error::DisplayError;
use crate::services::lyrics::LYRICS_WINDOW_MS;
use crate::services::music::queue::LoopMode;
use crate::services::music::session::{LyricsSlot, SessionSnapshot, SessionStatus};
use crate::utils::embed::{self, COLOR_ERROR, COLOR_LYRICS, COLOR_SUCCESS, COLOR_WARNING};
use crate::utils::format::{format_time, progress_bar, truncate};
use async_trait::async_trait;
use serenity::all::{ChannelId, CreateMessage, EditMessage, Http, MessageId};
use std::sync::Arc;

pub const UPCOMING_SHOWN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// Where the next refresh lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTarget {
    /// Edit the current display message, if there is one.
    Keep,
    /// Adopt this message as the display; the previous one is deleted.
    Replace(MessageRef),
    /// Post a fresh message at the bottom of the bound channel.
    Repost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Shuffle,
    Previous,
    Pause,
    Resume,
    Next,
    Repeat,
    Autoplay,
    Rewind,
    Stop,
    Forward,
    Lyrics,
}

impl Control {
    pub const ALL: [Control; 11] = [
        Self::Shuffle,
        Self::Previous,
        Self::Pause,
        Self::Resume,
        Self::Next,
        Self::Repeat,
        Self::Autoplay,
        Self::Rewind,
        Self::Stop,
        Self::Forward,
        Self::Lyrics,
    ];

    pub fn custom_id(self) -> &'static str {
        match self {
            Self::Shuffle => "control.shuffle",
            Self::Previous => "control.previous",
            Self::Pause => "control.pause",
            Self::Resume => "control.resume",
            Self::Next => "control.next",
            Self::Repeat => "control.repeat",
            Self::Autoplay => "control.autoplay",
            Self::Rewind => "control.rewind",
            Self::Stop => "control.stop",
            Self::Forward => "control.forward",
            Self::Lyrics => "control.lyrics",
        }
    }

    pub fn parse(custom_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.custom_id() == custom_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonTone {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonView {
    pub control: Control,
    pub emoji: &'static str,
    pub tone: ButtonTone,
    pub disabled: bool,
}

impl ButtonView {
    fn new(control: Control, emoji: &'static str, tone: ButtonTone) -> Self {
        Self {
            control,
            emoji,
            tone,
            disabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedView {
    pub author: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub color: u32,
    pub fields: Vec<(String, String, bool)>,
    pub image: Option<String>,
    pub thumbnail: Option<String>,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayPayload {
    pub embeds: Vec<EmbedView>,
    pub rows: Vec<Vec<ButtonView>>,
}

impl DisplayPayload {
    pub fn notice(embed: EmbedView) -> Self {
        Self {
            embeds: vec![embed],
            rows: Vec::new(),
        }
    }
}

/// Inputs to rendering that come from outside the session state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderContext {
    pub artwork_wide: bool,
    pub autoplay_available: bool,
}

/// One-off messages posted into the bound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LoadFailed { title: String, reason: String },
    AutoplayUnavailable,
    PlayerError(String),
}

impl Notice {
    pub fn to_embed(&self) -> EmbedView {
        let (title, description) = match self {
            Self::LoadFailed { title, reason } => (
                format!("[ERROR] Couldn't play {}", truncate(title, 200)),
                reason.clone(),
            ),
            Self::AutoplayUnavailable => (
                "[ERROR] Autoplay Stopped".to_string(),
                "I couldn't find any recommended tracks, so autoplay has been turned off."
                    .to_string(),
            ),
            Self::PlayerError(reason) => ("[ERROR] Player Error".to_string(), reason.clone()),
        };
        EmbedView {
            title: Some(title),
            description: Some(description),
            color: COLOR_ERROR,
            ..Default::default()
        }
    }
}

/// Builds the live display from a session snapshot.
pub fn render(snapshot: &SessionSnapshot, ctx: &RenderContext) -> DisplayPayload {
    let mut embeds = vec![status_embed(snapshot, ctx)];

    if snapshot.status == SessionStatus::Playing && snapshot.mode.show_lyrics {
        embeds.push(lyrics_embed(snapshot));
    }

    let rows = match snapshot.status {
        SessionStatus::Playing | SessionStatus::Paused => controls(snapshot, ctx),
        SessionStatus::Idle | SessionStatus::Disconnected => Vec::new(),
    };

    DisplayPayload { embeds, rows }
}

fn status_embed(snapshot: &SessionSnapshot, ctx: &RenderContext) -> EmbedView {
    let (author, color) = match snapshot.status {
        SessionStatus::Playing => ("Now Playing", COLOR_SUCCESS),
        SessionStatus::Paused => ("Paused", COLOR_WARNING),
        SessionStatus::Disconnected => ("Disconnected", COLOR_ERROR),
        SessionStatus::Idle => ("Queue Ended", COLOR_ERROR),
    };

    let mut view = EmbedView {
        author: Some(author.to_string()),
        color,
        ..Default::default()
    };

    let Some(current) = &snapshot.current else {
        view.title = Some("Nothing is playing".to_string());
        return view;
    };
    let track = &current.track;

    view.title = Some(truncate(track.title(), 250));
    view.url = track.uri().map(str::to_string);
    view.description = Some(if track.info.is_stream {
        "`LIVE` 🔴".to_string()
    } else {
        format!(
            "`{}` {} `{}`",
            format_time(snapshot.position_ms),
            progress_bar(snapshot.position_ms, track.duration_ms()),
            format_time(track.duration_ms())
        )
    });

    let upcoming = snapshot
        .queue
        .iter()
        .take(UPCOMING_SHOWN)
        .enumerate()
        .map(|(i, t)| format!("**[{}]** {}", i + 1, truncate(t.track.title(), 60)))
        .collect::<Vec<_>>()
        .join("\n");
    let upcoming = match snapshot.queue.len() {
        0 => "Empty".to_string(),
        n if n > UPCOMING_SHOWN => format!("{upcoming}\nand {} more…", n - UPCOMING_SHOWN),
        _ => upcoming,
    };

    let filters = snapshot
        .filters
        .iter()
        .map(|k| k.label())
        .collect::<Vec<_>>()
        .join(", ");

    view.fields = vec![
        ("👤 Author".to_string(), truncate(track.author(), 100), true),
        ("👥 Requester".to_string(), current.requester.mention(), true),
        (
            "🔁 Loop".to_string(),
            snapshot.mode.loop_mode.label().to_string(),
            true,
        ),
        ("📃 Up Next".to_string(), upcoming, true),
        (
            "⚙️ Filters".to_string(),
            if filters.is_empty() { "None".to_string() } else { filters },
            true,
        ),
        (
            "🔀 Shuffle".to_string(),
            if snapshot.mode.shuffle { "On" } else { "Off" }.to_string(),
            true,
        ),
    ];

    if let Some(art) = track.artwork_url() {
        if ctx.artwork_wide {
            view.image = Some(art.to_string());
        } else {
            view.thumbnail = Some(art.to_string());
        }
    }

    view
}

fn lyrics_embed(snapshot: &SessionSnapshot) -> EmbedView {
    let title = Some("🎤 Lyrics".to_string());
    match &snapshot.lyrics {
        LyricsSlot::Missing => EmbedView {
            title,
            description: Some("*Looks like you'll have to sing this one yourself*".to_string()),
            color: COLOR_ERROR,
            ..Default::default()
        },
        LyricsSlot::Unfetched => EmbedView {
            title,
            description: Some("## ...".to_string()),
            color: COLOR_LYRICS,
            ..Default::default()
        },
        LyricsSlot::Found(lyrics) => {
            let text = lyrics
                .around(snapshot.position_ms, LYRICS_WINDOW_MS)
                .iter()
                .map(|l| format!("## {}", l.text))
                .collect::<Vec<_>>()
                .join("\n");
            EmbedView {
                title,
                description: Some(if text.is_empty() { "## ...".to_string() } else { text }),
                color: COLOR_LYRICS,
                ..Default::default()
            }
        }
    }
}

fn toggle(on: bool) -> ButtonTone {
    if on {
        ButtonTone::Success
    } else {
        ButtonTone::Secondary
    }
}

fn controls(snapshot: &SessionSnapshot, ctx: &RenderContext) -> Vec<Vec<ButtonView>> {
    let mode = &snapshot.mode;

    let pause = if snapshot.status == SessionStatus::Paused {
        ButtonView::new(Control::Resume, "▶️", ButtonTone::Danger)
    } else {
        ButtonView::new(Control::Pause, "⏸️", ButtonTone::Success)
    };

    let repeat = match mode.loop_mode {
        LoopMode::Off => ButtonTone::Secondary,
        LoopMode::Track => ButtonTone::Success,
        LoopMode::Queue => ButtonTone::Primary,
    };

    let mut autoplay = ButtonView::new(Control::Autoplay, "🔥", toggle(mode.autoplay));
    autoplay.disabled = !ctx.autoplay_available;

    vec![
        vec![
            ButtonView::new(Control::Shuffle, "🔀", toggle(mode.shuffle)),
            ButtonView::new(Control::Previous, "⏮️", ButtonTone::Primary),
            pause,
            ButtonView::new(Control::Next, "⏭️", ButtonTone::Primary),
            ButtonView::new(Control::Repeat, "🔁", repeat),
        ],
        vec![
            autoplay,
            ButtonView::new(Control::Rewind, "⏪", ButtonTone::Primary),
            ButtonView::new(Control::Stop, "⏹️", ButtonTone::Danger),
            ButtonView::new(Control::Forward, "⏩", ButtonTone::Primary),
            ButtonView::new(Control::Lyrics, "🎤", toggle(mode.show_lyrics)),
        ],
    ]
}

/// Outward side of the display: posts, edits and deletes chat messages.
#[async_trait]
pub trait DisplaySink: Send + Sync {
    async fn send(
        &self,
        channel_id: ChannelId,
        payload: &DisplayPayload,
    ) -> Result<MessageRef, DisplayError>;

    async fn edit(&self, target: MessageRef, payload: &DisplayPayload) -> Result<(), DisplayError>;

    async fn delete(&self, target: MessageRef) -> Result<(), DisplayError>;
}

pub struct SerenityDisplay {
    http: Arc<Http>,
}

impl SerenityDisplay {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

fn classify(e: serenity::Error) -> DisplayError {
    if let serenity::Error::Http(serenity::http::HttpError::UnsuccessfulRequest(response)) = &e {
        if response.status_code.as_u16() == 404 {
            return DisplayError::Gone;
        }
    }
    DisplayError::Discord(e)
}

#[async_trait]
impl DisplaySink for SerenityDisplay {
    async fn send(
        &self,
        channel_id: ChannelId,
        payload: &DisplayPayload,
    ) -> Result<MessageRef, DisplayError> {
        let message = CreateMessage::new()
            .embeds(payload.embeds.iter().map(embed::from_view).collect())
            .components(embed::action_rows(&payload.rows));
        let sent = channel_id
            .send_message(&self.http, message)
            .await
            .map_err(classify)?;
        Ok(MessageRef {
            channel_id,
            message_id: sent.id,
        })
    }

    async fn edit(&self, target: MessageRef, payload: &DisplayPayload) -> Result<(), DisplayError> {
        let edit = EditMessage::new()
            .embeds(payload.embeds.iter().map(embed::from_view).collect())
            .components(embed::action_rows(&payload.rows));
        target
            .channel_id
            .edit_message(&self.http, target.message_id, edit)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete(&self, target: MessageRef) -> Result<(), DisplayError> {
        target
            .channel_id
            .delete_message(&self.http, target.message_id)
            .await
            .map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::music::filters::FilterKind;
    use crate::services::music::queue::PlaybackMode;
    use crate::services::music::track::fixtures::{autoplay, queued};
    use crate::services::lyrics::Lyrics;

    fn snapshot(status: SessionStatus) -> SessionSnapshot {
        SessionSnapshot {
            status,
            current: match status {
                SessionStatus::Playing | SessionStatus::Paused => Some(queued("now")),
                _ => None,
            },
            queue: Vec::new(),
            mode: PlaybackMode::default(),
            filters: Vec::new(),
            position_ms: 30_000,
            lyrics: LyricsSlot::Unfetched,
        }
    }

    fn ctx() -> RenderContext {
        RenderContext {
            artwork_wide: false,
            autoplay_available: true,
        }
    }

    fn field<'a>(view: &'a EmbedView, name: &str) -> &'a str {
        view.fields
            .iter()
            .find(|(n, _, _)| n.ends_with(name))
            .map(|(_, v, _)| v.as_str())
            .unwrap()
    }

    #[test]
    fn idle_and_disconnected_have_no_buttons() {
        for status in [SessionStatus::Idle, SessionStatus::Disconnected] {
            let payload = render(&snapshot(status), &ctx());
            assert!(payload.rows.is_empty());
            assert_eq!(payload.embeds.len(), 1);
        }
    }

    #[test]
    fn each_status_has_its_own_header() {
        let headers: Vec<_> = [
            SessionStatus::Playing,
            SessionStatus::Paused,
            SessionStatus::Disconnected,
            SessionStatus::Idle,
        ]
        .into_iter()
        .map(|s| render(&snapshot(s), &ctx()).embeds[0].author.clone())
        .collect();
        for (i, a) in headers.iter().enumerate() {
            assert!(headers.iter().skip(i + 1).all(|b| a != b));
        }
    }

    #[test]
    fn playing_shows_controls_and_lyrics() {
        let payload = render(&snapshot(SessionStatus::Playing), &ctx());
        assert_eq!(payload.rows.len(), 2);
        assert_eq!(payload.rows[0][2].control, Control::Pause);
        assert_eq!(payload.embeds.len(), 2);
    }

    #[test]
    fn paused_offers_resume_and_hides_lyrics() {
        let payload = render(&snapshot(SessionStatus::Paused), &ctx());
        assert_eq!(payload.rows[0][2].control, Control::Resume);
        assert_eq!(payload.embeds.len(), 1);
    }

    #[test]
    fn autoplay_requester_and_overflow() {
        let mut snap = snapshot(SessionStatus::Playing);
        snap.current = Some(autoplay("rec"));
        snap.queue = (0..7).map(|i| queued(&format!("q{i}"))).collect();

        let view = &render(&snap, &ctx()).embeds[0];
        assert_eq!(field(view, "Requester"), "Autoplay");
        let upcoming = field(view, "Up Next");
        assert_eq!(upcoming.lines().count(), UPCOMING_SHOWN + 1);
        assert!(upcoming.ends_with("and 2 more…"));
    }

    #[test]
    fn loop_modes_have_distinct_styles() {
        let tones: Vec<_> = [LoopMode::Off, LoopMode::Track, LoopMode::Queue]
            .into_iter()
            .map(|loop_mode| {
                let mut snap = snapshot(SessionStatus::Playing);
                snap.mode.loop_mode = loop_mode;
                render(&snap, &ctx()).rows[0][4].tone
            })
            .collect();
        assert_ne!(tones[0], tones[1]);
        assert_ne!(tones[1], tones[2]);
        assert_ne!(tones[0], tones[2]);
    }

    #[test]
    fn filters_and_artwork_placement() {
        let mut snap = snapshot(SessionStatus::Playing);
        snap.filters = vec![FilterKind::Timescale, FilterKind::LowPass];
        let mut track = (*snap.current.as_ref().unwrap().track).clone();
        track.info.artwork_url = Some("https://i.ytimg.com/a.jpg".to_string());
        snap.current = Some(crate::services::music::track::QueuedTrack::new(
            track,
            crate::services::music::track::Requester::Autoplay,
        ));

        let narrow = render(&snap, &ctx());
        assert_eq!(field(&narrow.embeds[0], "Filters"), "Timescale, Low Pass");
        assert!(narrow.embeds[0].thumbnail.is_some());

        let wide = render(
            &snap,
            &RenderContext {
                artwork_wide: true,
                ..ctx()
            },
        );
        assert!(wide.embeds[0].image.is_some());
        assert!(wide.embeds[0].thumbnail.is_none());
    }

    #[test]
    fn lyrics_window_and_missing_placeholder() {
        let mut snap = snapshot(SessionStatus::Playing);
        snap.lyrics = LyricsSlot::Found(Arc::new(Lyrics::parse_lrc(
            "[00:28.00]near\n[00:50.00]far",
        )));
        let payload = render(&snap, &ctx());
        assert_eq!(payload.embeds[1].description.as_deref(), Some("## near"));

        snap.lyrics = LyricsSlot::Missing;
        let payload = render(&snap, &ctx());
        assert_eq!(payload.embeds[1].color, COLOR_ERROR);
    }

    #[test]
    fn autoplay_button_disabled_without_recommender() {
        let payload = render(
            &snapshot(SessionStatus::Playing),
            &RenderContext {
                autoplay_available: false,
                ..ctx()
            },
        );
        assert!(payload.rows[1][0].disabled);
    }

    #[test]
    fn custom_ids_round_trip() {
        for control in Control::ALL {
            assert_eq!(Control::parse(control.custom_id()), Some(control));
        }
        assert_eq!(Control::parse("song_select"), None);
    }
}
