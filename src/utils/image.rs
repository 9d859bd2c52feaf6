use async_trait::async_trait;
use image::ImageReader;
use reqwest::Client;
use reqwest::header::RANGE;
use std::io::Cursor;
use std::time::Duration;

/// Header bytes fetched when probing; enough for every supported format.
const PROBE_BYTES: usize = 64 * 1024;

/// Reads `(width, height)` from the start of an encoded image. Only the
/// header is decoded.
pub fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[async_trait]
pub trait ArtworkProbe: Send + Sync {
    /// Whether the artwork at `url` is wider than it is tall.
    async fn is_wide(&self, url: &str) -> bool;
}

#[derive(Clone)]
pub struct HttpArtworkProbe {
    client: Client,
}

impl Default for HttpArtworkProbe {
    fn default() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl ArtworkProbe for HttpArtworkProbe {
    async fn is_wide(&self, url: &str) -> bool {
        let response = match self
            .client
            .get(url)
            .header(RANGE, format!("bytes=0-{}", PROBE_BYTES - 1))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(url, status = %r.status(), "artwork probe rejected");
                return false;
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "artwork probe failed");
                return false;
            }
        };

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(_) => return false,
        };

        let head = &bytes[..bytes.len().min(PROBE_BYTES)];
        matches!(dimensions(head), Some((w, h)) if w > h)
    }
}
