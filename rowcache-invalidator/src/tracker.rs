//! Replication position tracking.

use rowcache_core::constants::NIL_POSITION_TEXT;
use rowcache_core::ReplicationPosition;
use std::sync::{PoisonError, RwLock};

/// Last replication position seen by the invalidator.
///
/// Read far more often (status and metrics polling) than written (once per
/// position event), so it sits behind its own reader-writer lock instead of
/// the service's session lock.
#[derive(Debug, Default)]
pub struct PositionTracker {
    position: RwLock<Option<ReplicationPosition>>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position, `None` until one has been recorded.
    pub fn get(&self) -> Option<ReplicationPosition> {
        // A guarded write is a single assignment, so a poisoned lock still
        // holds a whole value.
        *self.position.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, position: ReplicationPosition) {
        *self.position.write().unwrap_or_else(PoisonError::into_inner) = Some(position);
    }

    /// Position rendered for status output, `"<nil>"` when unset.
    pub fn text(&self) -> String {
        match self.get() {
            Some(position) => position.to_string(),
            None => NIL_POSITION_TEXT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_unset_position_renders_nil() {
        let tracker = PositionTracker::new();
        assert_eq!(tracker.get(), None);
        assert_eq!(tracker.text(), "<nil>");
    }

    #[test]
    fn test_set_replaces_position() {
        let tracker = PositionTracker::new();
        tracker.set(ReplicationPosition::mariadb(0, 1, 5));
        tracker.set(ReplicationPosition::mariadb(0, 1, 6));
        assert_eq!(tracker.get(), Some(ReplicationPosition::mariadb(0, 1, 6)));
        assert_eq!(tracker.text(), "0-1-6");
    }

    #[test]
    fn test_concurrent_readers_see_whole_positions() {
        let tracker = Arc::new(PositionTracker::new());
        let writer = {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || {
                for seq in 0..1000u64 {
                    tracker.set(ReplicationPosition::mariadb(7, 7, seq));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if let Some(position) = tracker.get() {
                            assert!(position.to_string().starts_with("7-7-"));
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(tracker.get(), Some(ReplicationPosition::mariadb(7, 7, 999)));
    }
}
