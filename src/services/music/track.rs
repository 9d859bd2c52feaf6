use serde::{Deserialize, Serialize};
use serde_json::Value;
use serenity::all::UserId;
use std::sync::Arc;

/// A playable item. The serde layout is the Lavalink track object, so the
/// same value round-trips through the node and the playlist files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub encoded: String,
    pub info: TrackInfo,
    #[serde(default)]
    pub plugin_info: Option<Value>,
    #[serde(default)]
    pub user_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    pub length: u64,
    pub is_stream: bool,
    #[serde(default)]
    pub position: u64,
    pub title: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub isrc: Option<String>,
    pub source_name: String,
}

impl Track {
    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn author(&self) -> &str {
        &self.info.author
    }

    pub fn duration_ms(&self) -> u64 {
        self.info.length
    }

    pub fn uri(&self) -> Option<&str> {
        self.info.uri.as_deref().filter(|u| !u.is_empty())
    }

    pub fn artwork_url(&self) -> Option<&str> {
        self.info.artwork_url.as_deref().filter(|u| !u.is_empty())
    }

    /// `[title](uri)` when the track has a link, plain title otherwise.
    pub fn markdown_link(&self) -> String {
        match self.uri() {
            Some(uri) => format!("[{}]({})", self.info.title, uri),
            None => self.info.title.clone(),
        }
    }

    /// Native YouTube video id, used to seed mix recommendations.
    pub fn youtube_id(&self) -> Option<String> {
        if self.info.source_name == "youtube" && !self.info.identifier.is_empty() {
            return Some(self.info.identifier.clone());
        }
        extract_video_id(self.uri()?)
    }
}

fn extract_video_id(url: &str) -> Option<String> {
    if url.contains("youtu.be/") {
        return url
            .split("youtu.be/")
            .nth(1)?
            .split('?')
            .next()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
    }
    if url.contains("youtube.com") {
        let v_param = url.split("v=").nth(1)?;
        return v_param
            .split('&')
            .next()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
    }
    None
}

/// Who asked for a track. Autoplay entries are backfilled recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requester {
    User(UserId),
    Autoplay,
}

impl Requester {
    /// Maps a raw id, where `0` is the legacy marker for recommendations.
    pub fn from_raw(id: u64) -> Self {
        if id == 0 {
            Self::Autoplay
        } else {
            Self::User(UserId::new(id))
        }
    }

    pub fn is_autoplay(&self) -> bool {
        matches!(self, Self::Autoplay)
    }

    pub fn mention(&self) -> String {
        match self {
            Self::User(id) => format!("<@{}>", id.get()),
            Self::Autoplay => "Autoplay".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuedTrack {
    pub track: Arc<Track>,
    pub requester: Requester,
}

impl QueuedTrack {
    pub fn new(track: Track, requester: Requester) -> Self {
        Self {
            track: Arc::new(track),
            requester,
        }
    }

    pub fn is_autoplay(&self) -> bool {
        self.requester.is_autoplay()
    }
}

/// Entries compare by the encoded payload and requester, so a re-enqueued
/// copy of the same track by the same member is equal to the original.
impl PartialEq for QueuedTrack {
    fn eq(&self, other: &Self) -> bool {
        self.requester == other.requester
            && (Arc::ptr_eq(&self.track, &other.track) || self.track.encoded == other.track.encoded)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn raw_zero_is_autoplay() {
        assert_eq!(Requester::from_raw(0), Requester::Autoplay);
        assert_eq!(Requester::from_raw(7), Requester::User(UserId::new(7)));
        assert_eq!(Requester::Autoplay.mention(), "Autoplay");
    }

    #[test]
    fn serializes_as_lavalink_track_object() {
        let value = serde_json::to_value(track("abc")).unwrap();
        assert_eq!(value["encoded"], "enc-abc");
        assert_eq!(value["info"]["isSeekable"], true);
        assert_eq!(value["info"]["sourceName"], "youtube");

        let back: Track = serde_json::from_value(value).unwrap();
        assert_eq!(back, track("abc"));
    }

    #[test]
    fn youtube_id_from_uri() {
        let mut t = track("abc");
        t.info.source_name = "http".to_string();
        t.info.uri = Some("https://youtu.be/xyz?t=3".to_string());
        assert_eq!(t.youtube_id().as_deref(), Some("xyz"));

        t.info.uri = Some("https://soundcloud.com/a/b".to_string());
        assert_eq!(t.youtube_id(), None);
    }

    #[test]
    fn equality_follows_payload_and_requester() {
        assert_eq!(queued("a"), queued("a"));
        assert_ne!(queued("a"), autoplay("a"));
        assert_ne!(queued("a"), queued("b"));
    }
}
