use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const LYRICS_WINDOW_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricLine {
    pub time_ms: u64,
    pub text: String,
}

/// Time-synced lyrics, sorted by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lyrics {
    lines: Vec<LyricLine>,
}

impl Lyrics {
    /// Parses LRC text. Lines carrying several timestamps are repeated at
    /// each of them; metadata tags such as `[ar:...]` are skipped.
    pub fn parse_lrc(source: &str) -> Self {
        let mut lines = Vec::new();

        for raw in source.lines() {
            let mut rest = raw.trim();
            let mut stamps = Vec::new();

            while let Some(body) = rest.strip_prefix('[') {
                let Some(end) = body.find(']') else {
                    break;
                };
                match parse_timestamp(&body[..end]) {
                    Some(ms) => stamps.push(ms),
                    None => break,
                }
                rest = &body[end + 1..];
            }

            let text = rest.trim();
            for time_ms in stamps {
                lines.push(LyricLine {
                    time_ms,
                    text: text.to_string(),
                });
            }
        }

        lines.sort_by_key(|l| l.time_ms);
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    /// Non-empty lines within `window_ms` of `position_ms`, either side.
    pub fn around(&self, position_ms: u64, window_ms: u64) -> Vec<&LyricLine> {
        let from = position_ms.saturating_sub(window_ms);
        let to = position_ms.saturating_add(window_ms);
        self.lines
            .iter()
            .filter(|l| l.time_ms >= from && l.time_ms <= to && !l.text.is_empty())
            .collect()
    }
}

/// `mm:ss`, `mm:ss.xx` or `mm:ss.xxx` to milliseconds.
fn parse_timestamp(tag: &str) -> Option<u64> {
    let (minutes, rest) = tag.split_once(':')?;
    let minutes: u64 = minutes.trim().parse().ok()?;
    let (seconds, fraction) = match rest.split_once(['.', ':']) {
        Some((s, f)) => (s, f),
        None => (rest, ""),
    };
    let seconds: u64 = seconds.trim().parse().ok()?;
    if seconds >= 60 {
        return None;
    }

    let fraction_ms = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u64>().ok()? * 100,
        2 => fraction.parse::<u64>().ok()? * 10,
        _ => fraction.get(..3)?.parse::<u64>().ok()?,
    };

    Some(minutes * 60_000 + seconds * 1_000 + fraction_ms)
}

#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// `None` when no synced lyrics exist for the track.
    async fn search(&self, title: &str, author: &str) -> Result<Option<Lyrics>, String>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrclibRecord {
    synced_lyrics: Option<String>,
}

/// LRCLIB search client.
#[derive(Clone)]
pub struct LrclibLyrics {
    client: Client,
    base_url: String,
}

impl LrclibLyrics {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LyricsProvider for LrclibLyrics {
    async fn search(&self, title: &str, author: &str) -> Result<Option<Lyrics>, String> {
        let url = format!(
            "{}/api/search?track_name={}&artist_name={}",
            self.base_url,
            urlencoding::encode(title),
            urlencoding::encode(author)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Lyrics request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Lyrics API returned {}", response.status()));
        }

        let records: Vec<LrclibRecord> = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse lyrics response: {}", e))?;

        Ok(records
            .into_iter()
            .filter_map(|r| r.synced_lyrics)
            .map(|lrc| Lyrics::parse_lrc(&lrc))
            .find(|lyrics| !lyrics.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: &str = "[ar:Someone]\n[ti:Song]\n[00:12.00]First line\n[00:17.20][01:02.5]Chorus\n\n[00:20.123]Third\n[00:25.00]";

    #[rstest]
    #[case("00:12.00", Some(12_000))]
    #[case("01:02.5", Some(62_500))]
    #[case("00:20.123", Some(20_123))]
    #[case("02:03", Some(123_000))]
    #[case("ar:Someone", None)]
    #[case("00:75.00", None)]
    fn timestamps(#[case] tag: &str, #[case] expected: Option<u64>) {
        assert_eq!(parse_timestamp(tag), expected);
    }

    #[test]
    fn parses_and_sorts_multi_stamp_lines() {
        let lyrics = Lyrics::parse_lrc(SAMPLE);
        let times: Vec<u64> = lyrics.lines().iter().map(|l| l.time_ms).collect();
        assert_eq!(times, [12_000, 17_200, 20_123, 25_000, 62_500]);
        assert_eq!(lyrics.lines()[4].text, "Chorus");
    }

    #[test]
    fn window_keeps_nearby_non_empty_lines() {
        let lyrics = Lyrics::parse_lrc(SAMPLE);
        let texts: Vec<&str> = lyrics
            .around(20_000, LYRICS_WINDOW_MS)
            .iter()
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(texts, ["Chorus", "Third"]);

        assert!(lyrics.around(40_000, LYRICS_WINDOW_MS).is_empty());
    }

    #[test]
    fn plain_text_has_no_lines() {
        assert!(Lyrics::parse_lrc("just words\nno stamps").is_empty());
    }
}
