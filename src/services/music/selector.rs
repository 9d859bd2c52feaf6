use crate::services::music::queue::{LoopMode, PlaybackMode, Queue};
use crate::services::music::track::QueuedTrack;
use rand::Rng;

/// What caused the advance. A member's skip never replays the skipped track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Natural,
    Skip,
}

/// Picks the next track, removing it from `queue`.
///
/// `None` means the queue has ended. The caller owns the random source so
/// shuffle order can be pinned in tests.
pub fn select_next<R: Rng + ?Sized>(
    queue: &mut Queue,
    current: Option<&QueuedTrack>,
    mode: &PlaybackMode,
    explicit: Option<QueuedTrack>,
    trigger: Trigger,
    rng: &mut R,
) -> Option<QueuedTrack> {
    if let Some(explicit) = explicit {
        if let Some(current) = current {
            match mode.loop_mode {
                LoopMode::Track => queue.push_front(current.clone()),
                LoopMode::Queue => queue.push_back(current.clone()),
                LoopMode::Off => {}
            }
        }
        return Some(explicit);
    }

    if mode.loop_mode == LoopMode::Track && trigger == Trigger::Natural {
        if let Some(current) = current {
            return Some(current.clone());
        }
    }

    // Looked up before the loop-all append so the appended copy is never
    // mistaken for the current position.
    let found = current.and_then(|c| queue.find(c));

    if mode.loop_mode == LoopMode::Queue {
        if let Some(current) = current {
            queue.push_back(current.clone());
        }
    }

    if queue.is_empty() {
        return None;
    }

    let index = if mode.shuffle {
        rng.random_range(0..queue.len())
    } else if queue.len() == 1 {
        0
    } else {
        match found {
            None => 0,
            Some(i) if i + 1 >= queue.len() => return None,
            Some(i) => i + 1,
        }
    };

    queue.take(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::music::track::fixtures::queued;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn queue_of(names: &[&str]) -> Queue {
        let mut queue = Queue::new();
        for name in names {
            queue.push_back(queued(name));
        }
        queue
    }

    fn ids(queue: &Queue) -> Vec<String> {
        queue
            .iter()
            .map(|t| t.track.info.identifier.clone())
            .collect()
    }

    fn id(track: &Option<QueuedTrack>) -> Option<&str> {
        track.as_ref().map(|t| t.track.info.identifier.as_str())
    }

    fn mode(loop_mode: LoopMode, shuffle: bool) -> PlaybackMode {
        PlaybackMode {
            loop_mode,
            shuffle,
            ..Default::default()
        }
    }

    #[test]
    fn single_loop_replays_current_without_touching_queue() {
        let mut queue = queue_of(&["a", "b"]);
        let current = queued("x");
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(
            &mut queue,
            Some(&current),
            &mode(LoopMode::Track, false),
            None,
            Trigger::Natural,
            &mut rng,
        );
        assert_eq!(id(&next), Some("x"));
        assert_eq!(ids(&queue), ["a", "b"]);
    }

    #[test]
    fn single_loop_with_explicit_track_requeues_current_at_head() {
        let mut queue = queue_of(&["a"]);
        let current = queued("x");
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(
            &mut queue,
            Some(&current),
            &mode(LoopMode::Track, false),
            Some(queued("e")),
            Trigger::Natural,
            &mut rng,
        );
        assert_eq!(id(&next), Some("e"));
        assert_eq!(ids(&queue), ["x", "a"]);
    }

    #[test]
    fn skip_under_single_loop_moves_on() {
        let mut queue = queue_of(&["a"]);
        let current = queued("x");
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(
            &mut queue,
            Some(&current),
            &mode(LoopMode::Track, false),
            None,
            Trigger::Skip,
            &mut rng,
        );
        assert_eq!(id(&next), Some("a"));
    }

    #[test]
    fn queue_loop_appends_current() {
        let mut queue = queue_of(&["a", "b"]);
        let current = queued("x");
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(
            &mut queue,
            Some(&current),
            &mode(LoopMode::Queue, false),
            None,
            Trigger::Natural,
            &mut rng,
        );
        assert_eq!(id(&next), Some("a"));
        assert_eq!(ids(&queue), ["b", "x"]);
    }

    #[test]
    fn queue_loop_with_single_track_keeps_cycling() {
        let mut queue = Queue::new();
        let current = queued("x");
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(
            &mut queue,
            Some(&current),
            &mode(LoopMode::Queue, false),
            None,
            Trigger::Natural,
            &mut rng,
        );
        assert_eq!(id(&next), Some("x"));
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_queue_ends() {
        let mut queue = Queue::new();
        let mut rng = StdRng::seed_from_u64(1);
        let current = queued("x");
        let next = select_next(
            &mut queue,
            Some(&current),
            &mode(LoopMode::Off, true),
            None,
            Trigger::Natural,
            &mut rng,
        );
        assert!(next.is_none());
    }

    #[test]
    fn picks_entry_after_current() {
        let mut queue = queue_of(&["a", "b", "c"]);
        let current = queued("b");
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(
            &mut queue,
            Some(&current),
            &mode(LoopMode::Off, false),
            None,
            Trigger::Natural,
            &mut rng,
        );
        assert_eq!(id(&next), Some("c"));
        assert_eq!(ids(&queue), ["a", "b"]);
    }

    #[test]
    fn current_as_last_entry_ends_queue() {
        let mut queue = queue_of(&["a", "b", "c"]);
        let current = queued("c");
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(
            &mut queue,
            Some(&current),
            &mode(LoopMode::Off, false),
            None,
            Trigger::Natural,
            &mut rng,
        );
        assert!(next.is_none());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn absent_current_takes_head() {
        let mut queue = queue_of(&["a", "b"]);
        let current = queued("z");
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(
            &mut queue,
            Some(&current),
            &mode(LoopMode::Off, false),
            None,
            Trigger::Natural,
            &mut rng,
        );
        assert_eq!(id(&next), Some("a"));
    }

    #[test]
    fn single_entry_is_taken_even_if_current() {
        let mut queue = queue_of(&["a"]);
        let current = queued("a");
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(
            &mut queue,
            Some(&current),
            &mode(LoopMode::Off, false),
            None,
            Trigger::Natural,
            &mut rng,
        );
        assert_eq!(id(&next), Some("a"));
        assert!(queue.is_empty());
    }

    #[test]
    fn shuffle_reaches_every_entry() {
        let mut seen = HashSet::new();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut queue = queue_of(&["a", "b", "c"]);
            let next = select_next(
                &mut queue,
                None,
                &mode(LoopMode::Off, true),
                None,
                Trigger::Natural,
                &mut rng,
            );
            let next = next.unwrap();
            assert_eq!(queue.len(), 2);
            seen.insert(next.track.info.identifier.clone());
        }
        assert_eq!(seen.len(), 3);
    }
}
