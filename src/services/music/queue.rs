use crate::error::MusicError;
use crate::services::music::track::QueuedTrack;
use std::collections::VecDeque;

pub const AUTOPLAY_WATERMARK: usize = 5;
pub const AUTOPLAY_CEILING: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, poise::ChoiceParameter)]
pub enum LoopMode {
    #[default]
    #[name = "off"]
    Off,
    /// Repeat current track
    #[name = "single"]
    Track,
    /// Repeat entire queue
    #[name = "all"]
    Queue,
}

impl LoopMode {
    /// Order used by the repeat button.
    pub fn cycle(self) -> Self {
        match self {
            Self::Off => Self::Track,
            Self::Track => Self::Queue,
            Self::Queue => Self::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Track => "Single",
            Self::Queue => "All",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackMode {
    pub loop_mode: LoopMode,
    pub shuffle: bool,
    pub autoplay: bool,
    pub show_lyrics: bool,
}

impl Default for PlaybackMode {
    fn default() -> Self {
        Self {
            loop_mode: LoopMode::Off,
            shuffle: false,
            autoplay: false,
            show_lyrics: true,
        }
    }
}

/// Upcoming tracks. Positions in the public API are 1-based.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: VecDeque<QueuedTrack>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedTrack> {
        self.tracks.iter()
    }

    pub fn get(&self, position: usize) -> Option<&QueuedTrack> {
        position.checked_sub(1).and_then(|i| self.tracks.get(i))
    }

    fn index_of(&self, position: usize) -> Result<usize, MusicError> {
        if position == 0 || position > self.tracks.len() {
            return Err(MusicError::InvalidPosition {
                position,
                len: self.tracks.len(),
            });
        }
        Ok(position - 1)
    }

    /// Number of entries requested by members, i.e. the boundary in front of
    /// the autoplay tail.
    pub fn user_count(&self) -> usize {
        self.tracks.iter().filter(|t| !t.is_autoplay()).count()
    }

    /// Inserts `tracks` so the first lands at `position` (`1..=len+1`).
    pub fn insert_at(
        &mut self,
        position: usize,
        tracks: impl IntoIterator<Item = QueuedTrack>,
    ) -> Result<usize, MusicError> {
        if position == 0 || position > self.tracks.len() + 1 {
            return Err(MusicError::InvalidPosition {
                position,
                len: self.tracks.len(),
            });
        }
        let mut index = position - 1;
        for track in tracks {
            self.tracks.insert(index, track);
            index += 1;
        }
        Ok(position)
    }

    pub fn push_back(&mut self, track: QueuedTrack) {
        self.tracks.push_back(track);
    }

    pub fn push_front(&mut self, track: QueuedTrack) {
        self.tracks.push_front(track);
    }

    pub fn remove_at(&mut self, position: usize) -> Result<QueuedTrack, MusicError> {
        let index = self.index_of(position)?;
        self.tracks
            .remove(index)
            .ok_or(MusicError::InvalidPosition {
                position,
                len: self.tracks.len(),
            })
    }

    /// Removes every entry in front of `position` and hands them back.
    pub fn skip_to(&mut self, position: usize) -> Result<Vec<QueuedTrack>, MusicError> {
        let index = self.index_of(position)?;
        Ok(self.tracks.drain(..index).collect())
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Evicts autoplay entries, returning how many were removed.
    pub fn retain_users(&mut self) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|t| !t.is_autoplay());
        before - self.tracks.len()
    }

    pub fn contains_identifier(&self, identifier: &str) -> bool {
        self.tracks
            .iter()
            .any(|t| t.track.info.identifier == identifier)
    }

    pub(crate) fn find(&self, track: &QueuedTrack) -> Option<usize> {
        self.tracks.iter().position(|t| t == track)
    }

    pub(crate) fn take(&mut self, index: usize) -> Option<QueuedTrack> {
        self.tracks.remove(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::music::track::fixtures::{autoplay, queued};
    use rstest::rstest;

    fn ids(queue: &Queue) -> Vec<String> {
        queue
            .iter()
            .map(|t| t.track.info.identifier.clone())
            .collect()
    }

    fn queue_of(names: &[&str]) -> Queue {
        let mut queue = Queue::new();
        for name in names {
            queue.push_back(queued(name));
        }
        queue
    }

    #[test]
    fn insert_then_remove_restores_queue() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.insert_at(2, [queued("x")]).unwrap();
        assert_eq!(ids(&queue), ["a", "x", "b", "c"]);

        let removed = queue.remove_at(2).unwrap();
        assert_eq!(removed.track.info.identifier, "x");
        assert_eq!(ids(&queue), ["a", "b", "c"]);
    }

    #[test]
    fn insert_keeps_batch_order() {
        let mut queue = queue_of(&["a"]);
        queue.insert_at(2, [queued("x"), queued("y")]).unwrap();
        assert_eq!(ids(&queue), ["a", "x", "y"]);
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    #[case(usize::MAX)]
    fn invalid_positions_leave_queue_unchanged(#[case] position: usize) {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert_eq!(
            queue.remove_at(position).unwrap_err(),
            MusicError::InvalidPosition { position, len: 3 }
        );
        assert!(queue.skip_to(position).is_err());
        assert_eq!(ids(&queue), ["a", "b", "c"]);
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(4, true)]
    #[case(5, false)]
    fn insert_bounds(#[case] position: usize, #[case] ok: bool) {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert_eq!(queue.insert_at(position, [queued("x")]).is_ok(), ok);
        assert_eq!(queue.len(), if ok { 4 } else { 3 });
    }

    #[test]
    fn remove_preserves_relative_order() {
        let mut queue = queue_of(&["a", "b", "c", "d"]);
        queue.remove_at(3).unwrap();
        assert_eq!(ids(&queue), ["a", "b", "d"]);
    }

    #[test]
    fn skip_to_truncates_prefix() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert_eq!(queue.skip_to(2).unwrap().len(), 1);
        assert_eq!(ids(&queue), ["b", "c"]);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut queue = queue_of(&["a"]);
        queue.clear();
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn user_count_stops_before_autoplay_tail() {
        let mut queue = queue_of(&["a", "b"]);
        queue.push_back(autoplay("r1"));
        queue.push_back(autoplay("r2"));
        assert_eq!(queue.user_count(), 2);

        assert_eq!(queue.retain_users(), 2);
        assert_eq!(ids(&queue), ["a", "b"]);
    }

    #[test]
    fn duplicates_coexist() {
        let queue = queue_of(&["a", "a"]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.find(&queued("a")), Some(0));
    }

    #[test]
    fn loop_mode_cycles_through_all_states() {
        assert_eq!(LoopMode::Off.cycle(), LoopMode::Track);
        assert_eq!(LoopMode::Track.cycle(), LoopMode::Queue);
        assert_eq!(LoopMode::Queue.cycle(), LoopMode::Off);
    }
}
