use crate::error::NodeError;
use crate::services::music::node::AudioNode;
use crate::services::music::queue::{AUTOPLAY_CEILING, AUTOPLAY_WATERMARK};
use crate::services::music::track::{QueuedTrack, Requester, Track};
use async_trait::async_trait;
use serenity::all::GuildId;
use std::collections::HashSet;
use std::sync::Arc;

/// Source of tracks related to a seed.
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(
        &self,
        guild_id: GuildId,
        seed: &Track,
        count: usize,
    ) -> Result<Vec<Track>, NodeError>;
}

/// How many recommendations to request, if any.
///
/// Tops the queue back up to the watermark (at least one track once the
/// watermark is reached) without crossing the ceiling.
pub fn plan_backfill(queue_len: usize, autoplay: bool, in_flight: bool) -> Option<usize> {
    if !autoplay || in_flight || queue_len > AUTOPLAY_WATERMARK {
        return None;
    }
    let wanted = AUTOPLAY_WATERMARK.saturating_sub(queue_len).max(1);
    let room = AUTOPLAY_CEILING.saturating_sub(queue_len);
    Some(wanted.min(room)).filter(|n| *n > 0)
}

/// Fetches, dedups and tags recommendations. `known` holds identifiers that
/// are already queued or playing.
pub async fn backfill(
    recommender: &dyn Recommender,
    guild_id: GuildId,
    seed: &Track,
    count: usize,
    known: &HashSet<String>,
) -> Result<Vec<QueuedTrack>, NodeError> {
    let candidates = recommender.recommend(guild_id, seed, count).await?;

    let mut seen = known.clone();
    seen.insert(seed.info.identifier.clone());

    Ok(candidates
        .into_iter()
        .filter(|t| seen.insert(t.info.identifier.clone()))
        .take(count)
        .map(|t| QueuedTrack::new(t, Requester::Autoplay))
        .collect())
}

/// Recommends from the seed's YouTube mix, falling back to a text search
/// on title and author.
pub struct MixRecommender {
    node: Arc<dyn AudioNode>,
}

impl MixRecommender {
    pub fn new(node: Arc<dyn AudioNode>) -> Self {
        Self { node }
    }
}

fn mix_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={0}&list=RD{0}", video_id)
}

#[async_trait]
impl Recommender for MixRecommender {
    async fn recommend(
        &self,
        guild_id: GuildId,
        seed: &Track,
        count: usize,
    ) -> Result<Vec<Track>, NodeError> {
        let mut found = Vec::new();

        if let Some(video_id) = seed.youtube_id() {
            match self.node.load_tracks(guild_id, &mix_url(&video_id)).await {
                Ok(loaded) => found.extend(
                    loaded
                        .tracks
                        .into_iter()
                        .filter(|t| t.info.identifier != video_id),
                ),
                Err(e) => tracing::debug!(%guild_id, error = %e, "youtube mix failed, falling back to search"),
            }
        }

        if found.is_empty() {
            let query = format!("ytsearch:{} {}", seed.title(), seed.author());
            tracing::debug!(%guild_id, query, "autoplay searching");
            found = self
                .node
                .load_tracks(guild_id, &query)
                .await?
                .tracks
                .into_iter()
                .filter(|t| t.info.identifier != seed.info.identifier)
                .collect();
        }

        // Leave slack for dedup against the queue.
        found.truncate(count.saturating_mul(3).max(count));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::music::filters::FilterSet;
    use crate::services::music::node::{LoadKind, LoadResult};
    use crate::services::music::track::fixtures::track;
    use parking_lot::Mutex;
    use rstest::rstest;

    #[rstest]
    #[case(0, Some(5))]
    #[case(3, Some(2))]
    #[case(5, Some(1))]
    #[case(6, None)]
    fn plans_up_to_watermark(#[case] len: usize, #[case] expected: Option<usize>) {
        assert_eq!(plan_backfill(len, true, false), expected);
    }

    #[test]
    fn no_plan_when_off_or_busy() {
        assert_eq!(plan_backfill(0, false, false), None);
        assert_eq!(plan_backfill(0, true, true), None);
    }

    #[test]
    fn plan_never_crosses_ceiling() {
        for len in 0..=AUTOPLAY_CEILING {
            if let Some(n) = plan_backfill(len, true, false) {
                assert!(len + n <= AUTOPLAY_CEILING);
            }
        }
    }

    struct Fixed(Vec<Track>);

    #[async_trait]
    impl Recommender for Fixed {
        async fn recommend(&self, _: GuildId, _: &Track, _: usize) -> Result<Vec<Track>, NodeError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn backfill_dedups_and_tags() {
        let recommender = Fixed(vec![
            track("seed"),
            track("a"),
            track("queued"),
            track("a"),
            track("b"),
            track("c"),
        ]);
        let known = HashSet::from(["queued".to_string()]);

        let added = backfill(&recommender, GuildId::new(1), &track("seed"), 2, &known)
            .await
            .unwrap();

        let ids: Vec<_> = added.iter().map(|t| t.track.info.identifier.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(added.iter().all(|t| t.requester == Requester::Autoplay));
    }

    #[derive(Default)]
    struct MixNode {
        mix: Vec<Track>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AudioNode for MixNode {
        async fn load_tracks(&self, _: GuildId, query: &str) -> Result<LoadResult, NodeError> {
            self.queries.lock().push(query.to_string());
            let tracks = if query.contains("list=RD") {
                self.mix.clone()
            } else {
                vec![track("searched")]
            };
            Ok(LoadResult {
                kind: LoadKind::Search,
                tracks,
            })
        }
        async fn play(
            &self,
            _: GuildId,
            _: &Track,
            _: Option<u64>,
            _: Option<u64>,
        ) -> Result<(), NodeError> {
            Ok(())
        }
        async fn set_pause(&self, _: GuildId, _: bool) -> Result<(), NodeError> {
            Ok(())
        }
        async fn seek(&self, _: GuildId, _: u64) -> Result<(), NodeError> {
            Ok(())
        }
        async fn set_filters(&self, _: GuildId, _: &FilterSet) -> Result<(), NodeError> {
            Ok(())
        }
        async fn stop(&self, _: GuildId) -> Result<(), NodeError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn mix_skips_seed_itself() {
        let node = Arc::new(MixNode {
            mix: vec![track("seed"), track("next")],
            ..Default::default()
        });
        let recommender = MixRecommender::new(node.clone());
        let found = recommender
            .recommend(GuildId::new(1), &track("seed"), 5)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].info.identifier, "next");
        assert_eq!(
            node.queries.lock()[0],
            "https://www.youtube.com/watch?v=seed&list=RDseed"
        );
    }

    #[tokio::test]
    async fn empty_mix_falls_back_to_search() {
        let node = Arc::new(MixNode::default());
        let recommender = MixRecommender::new(node.clone());
        let found = recommender
            .recommend(GuildId::new(1), &track("seed"), 5)
            .await
            .unwrap();
        assert_eq!(found[0].info.identifier, "searched");
        assert_eq!(node.queries.lock()[1], "ytsearch:seed title seed artist");
    }
}
